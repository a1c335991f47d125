//! Wire types for the `/pf` route.

mod request;
mod response;

pub use request::FetchRequest;
pub use response::{FetchResponse, InvalidState, State};
