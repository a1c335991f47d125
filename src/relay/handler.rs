//! Inbound handler for the `/pf` route.

use crate::http::{FetchRequest, FetchResponse, State};
use crate::relay::{Fetch, FetchError};
use tracing::{info, warn, Instrument, Span};

/// Turns a [`FetchRequest`] into a [`FetchResponse`].
///
/// Every per-request failure is absorbed here and reported through the
/// `state` field; nothing is propagated to the transport layer.
pub struct PfHandler<F> {
    fetcher: F,
    span: Span,
}

impl<F: Fetch> PfHandler<F> {
    /// Create a handler that delegates to `fetcher` and logs inside `span`.
    pub fn new(fetcher: F, span: Span) -> Self {
        Self { fetcher, span }
    }

    /// Get the underlying fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Handle one request.
    pub async fn handle(&self, request: FetchRequest) -> FetchResponse {
        self.resolve(request).instrument(self.span.clone()).await
    }

    async fn resolve(&self, request: FetchRequest) -> FetchResponse {
        if request.is_missing() {
            info!("Request without a res parameter");
            return FetchResponse::missing();
        }

        info!("Request {}", request.url);

        let outcome = self.fetcher.fetch(&request.url).await;
        let state = outcome_state(&outcome);
        match &outcome {
            Ok(drained) => info!("Resolved {} as {} ({} bytes)", request.url, state, drained),
            Err(FetchError::EmptyBody) => info!("Resolved {} as {} (empty body)", request.url, state),
            Err(FetchError::Transport(cause)) => warn!("Resolved {} as {}: {}", request.url, state, cause),
        }

        FetchResponse::new(request.url, state)
    }
}

/// Map a fetch outcome to the state code reported to the caller.
pub fn outcome_state(outcome: &Result<u64, FetchError>) -> State {
    match outcome {
        Ok(_) => State::Ok,
        Err(FetchError::EmptyBody) => State::NoContent,
        Err(FetchError::Transport(_)) => State::HttpFail,
    }
}
