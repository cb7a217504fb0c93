use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::engine::ErrorKind;
use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "hotelbook_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "hotelbook_query_duration_seconds";

// ── Booking outcomes ────────────────────────────────────────────

/// Counter: bookings accepted and stored.
pub const BOOKINGS_CREATED_TOTAL: &str = "hotelbook_bookings_created_total";

/// Counter: booking requests refused. Labels: reason.
pub const BOOKINGS_REJECTED_TOTAL: &str = "hotelbook_bookings_rejected_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "hotelbook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "hotelbook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "hotelbook_connections_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "hotelbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (records per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "hotelbook_wal_flush_batch_size";

/// Install the Prometheus exporter listening on `addr`. No-op if `addr` is None.
pub fn init(addr: Option<SocketAddr>) -> Result<(), BuildError> {
    let Some(addr) = addr else { return Ok(()) };
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://{addr}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertRoom { .. } => "insert_room",
        Command::InsertBooking { .. } => "insert_booking",
        Command::SelectRooms { .. } => "select_rooms",
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectAvailability { .. } => "select_availability",
    }
}

/// Label for a rejected booking.
pub fn rejection_reason(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidArgument => "invalid_argument",
        ErrorKind::Conflict => "conflict",
        ErrorKind::Storage => "storage",
    }
}
