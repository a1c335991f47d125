//! # Prefetch - a minimal HTTP prefetch relay
//!
//! The relay answers `GET /pf?res=<url>` by fetching `<url>` once, throwing
//! the body away and reporting how the fetch went as a small JSON document:
//!
//! ```text
//! {"res":"<url>","state":4}
//! ```
//!
//! The HTTP status of the answer is always `200`; callers must read `state`.
//!
//! ## State codes
//!
//! | Code | Meaning                                   |
//! |------|-------------------------------------------|
//! | -1   | `res` parameter missing or empty          |
//! | 1-3  | reserved for preloading clients, unused   |
//! | 4    | fetched, body present                     |
//! | 5    | fetched, declared body length was zero    |
//! | 6    | transport failure                         |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use prefetch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = RelayConfig::new().host("127.0.0.1").port(8089);
//!     RelayServer::new(config)?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod http;
pub mod relay;
pub mod runtime;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::http::{FetchRequest, FetchResponse, State};
    pub use crate::relay::{Fetch, FetchError, HttpFetcher, PfHandler};
    pub use crate::runtime::{BoundRelay, RelayConfig, RelayError, RelayServer};
    pub use async_trait::async_trait;
}

pub use http::{FetchRequest, FetchResponse, State};
pub use relay::{Fetch, FetchError, HttpFetcher, PfHandler};
pub use runtime::{RelayConfig, RelayError, RelayServer};
