//! Errors that stop the relay as a whole.

use std::io;

/// Fatal relay error. Per-request failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// The outbound HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
