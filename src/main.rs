use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use hotelbook::config::Config;
use hotelbook::engine::Engine;
use hotelbook::observability;
use hotelbook::store::WalStore;
use hotelbook::wire::{self, HotelFactory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    observability::init(config.metrics_addr())?;

    let tls_acceptor = config
        .tls
        .as_ref()
        .map(hotelbook::tls::load_tls_acceptor)
        .transpose()?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(WalStore::open(&config.wal_path())?);
    let engine = Arc::new(Engine::with_store(store));
    let factory = Arc::new(HotelFactory::new(engine, &config.password));
    let max_connections = config.max_connections;
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("hotelbook listening on {addr}");
    info!("  wal: {}", config.wal_path().display());
    info!("  max_connections: {max_connections}");
    info!("  tls: {}", if tls_acceptor.is_some() { "enabled" } else { "disabled" });
    info!(
        "  metrics: {}",
        config
            .metrics_addr()
            .map_or("disabled".to_string(), |a| format!("http://{a}/metrics"))
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(observability::CONNECTIONS_ACTIVE).increment(1.0);
                let factory = factory.clone();
                let tls = tls_acceptor.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    wire::process_connection(socket, peer, factory, tls).await;
                    metrics::gauge!(observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    drain(&semaphore, max_connections, Duration::from_secs(10)).await;
    info!("hotelbook stopped");
    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM where the platform has it.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("SIGTERM handler unavailable: {e}"),
        }
    }
    let _ = tokio::signal::ctrl_c().await;
}

/// Wait until every connection permit is back, or `deadline` passes.
async fn drain(semaphore: &Semaphore, max_connections: usize, deadline: Duration) {
    info!("draining connections...");
    let poll = async {
        while semaphore.available_permits() < max_connections {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    };
    match tokio::time::timeout(deadline, poll).await {
        Ok(()) => info!("all connections drained"),
        Err(_) => {
            let open = max_connections - semaphore.available_permits();
            tracing::warn!("drain timeout, {open} connections still open");
        }
    }
}
