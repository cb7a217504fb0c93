use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Server settings, read from `HOTELBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    pub tls: Option<TlsPaths>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { var: &'static str, value: String },
    TlsIncomplete,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { var, value } => write!(f, "invalid value for {var}: {value:?}"),
            ConfigError::TlsIncomplete => {
                write!(f, "both HOTELBOOK_TLS_CERT and HOTELBOOK_TLS_KEY must be set, or neither")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Unset variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let tls = match (lookup("HOTELBOOK_TLS_CERT"), lookup("HOTELBOOK_TLS_KEY")) {
            (None, None) => None,
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            _ => return Err(ConfigError::TlsIncomplete),
        };

        let max_connections = parsed(&lookup, "HOTELBOOK_MAX_CONNECTIONS")?.unwrap_or(256);
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "HOTELBOOK_MAX_CONNECTIONS",
                value: "0".into(),
            });
        }

        Ok(Self {
            bind: lookup("HOTELBOOK_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&lookup, "HOTELBOOK_PORT")?.unwrap_or(5433),
            data_dir: lookup("HOTELBOOK_DATA_DIR")
                .unwrap_or_else(|| "./data".into())
                .into(),
            password: lookup("HOTELBOOK_PASSWORD").unwrap_or_else(|| "hotelbook".into()),
            max_connections,
            metrics_port: parsed(&lookup, "HOTELBOOK_METRICS_PORT")?,
            tls,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_port.map(|port| ([0, 0, 0, 0], port).into())
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("hotel.wal")
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
