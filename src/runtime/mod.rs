//! Relay runtime: configuration and the HTTP listener.

mod config;
mod error;
mod server;

pub use config::{RelayConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use error::RelayError;
pub use server::{BoundRelay, RelayServer, PF_ROUTE};
