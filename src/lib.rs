pub mod auth;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod sql;
pub mod store;
pub mod tls;
pub mod wal;
pub mod wire;
