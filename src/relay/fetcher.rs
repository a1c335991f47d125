//! Outbound fetch of a caller-supplied URL.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, Instrument, Span};

/// Boxed cause of a transport failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a fetch did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The exchange could not be established or completed.
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),
    /// The exchange completed but the target declared a zero-length body.
    #[error("empty body")]
    EmptyBody,
}

impl FetchError {
    /// Wrap any error as a transport failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        FetchError::Transport(err.into())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::transport(err)
    }
}

/// Something that can fetch a URL and report how it went.
///
/// On success the number of body bytes that were read and discarded is
/// returned.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<u64, FetchError>;
}

/// [`Fetch`] implementation performing a real HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    span: Span,
}

impl HttpFetcher {
    /// Create a fetcher with the client defaults and no timeout.
    pub fn new(span: Span) -> Result<Self, reqwest::Error> {
        Self::with_timeout(None, span)
    }

    /// Create a fetcher whose whole exchange is bounded by `timeout`.
    pub fn with_timeout(timeout: Option<Duration>, span: Span) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::from_client(builder.build()?, span))
    }

    /// Use an already configured client.
    pub fn from_client(client: reqwest::Client, span: Span) -> Self {
        Self { client, span }
    }

    async fn get_and_drain(&self, url: &str) -> Result<u64, FetchError> {
        info!("Fetching {}", url);

        // The response owns the connection; it is released when dropped on
        // any return below.
        let mut response = self.client.get(url).send().await?;
        let declared = response.content_length();
        debug!(
            "Upstream answered {} for {} (declared length {:?})",
            response.status(),
            url,
            declared
        );

        let mut drained: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            drained += chunk.len() as u64;
        }

        if declared == Some(0) {
            return Err(FetchError::EmptyBody);
        }

        info!("Fetched {} from {}", drained, url);
        Ok(drained)
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<u64, FetchError> {
        self.get_and_drain(url)
            .instrument(self.span.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_transport_error_keeps_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = FetchError::transport(cause);

        assert!(matches!(err, FetchError::Transport(_)));
        assert!(err.to_string().contains("refused"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_empty_body_is_distinct() {
        let err = FetchError::EmptyBody;
        assert_eq!(err.to_string(), "empty body");
        assert!(err.source().is_none());
    }

    #[tokio::test]
    async fn test_malformed_url_is_transport_failure() {
        let fetcher = HttpFetcher::new(Span::none()).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
