//! The request/fetch/respond cycle.

pub mod fetcher;
pub mod handler;

pub use fetcher::{Fetch, FetchError, HttpFetcher};
pub use handler::PfHandler;
