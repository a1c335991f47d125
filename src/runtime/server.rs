//! Relay HTTP server implementation.

use crate::http::{FetchRequest, FetchResponse};
use crate::relay::{Fetch, HttpFetcher, PfHandler};
use crate::runtime::{RelayConfig, RelayError};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, info_span};

/// The only routed path.
pub const PF_ROUTE: &str = "/pf";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

const MIN_ACCEPT_DELAY: Duration = Duration::from_millis(5);
const MAX_ACCEPT_DELAY: Duration = Duration::from_secs(1);

/// Relay server, not yet listening.
pub struct RelayServer<F = HttpFetcher> {
    config: RelayConfig,
    handler: Arc<PfHandler<F>>,
}

impl RelayServer<HttpFetcher> {
    /// Create a relay that fetches over HTTP with the configured timeout.
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let fetcher = HttpFetcher::with_timeout(config.fetch_timeout, info_span!("fetcher"))?;
        Ok(Self::with_fetcher(config, fetcher))
    }
}

impl<F: Fetch + 'static> RelayServer<F> {
    /// Create a relay around any [`Fetch`] implementation.
    pub fn with_fetcher(config: RelayConfig, fetcher: F) -> Self {
        let handler = Arc::new(PfHandler::new(fetcher, info_span!("pf")));
        Self { config, handler }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Bind the listener without accepting connections yet.
    pub async fn bind(self) -> Result<BoundRelay<F>, RelayError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| RelayError::Bind {
            addr,
            source,
        })?;

        Ok(BoundRelay {
            listener,
            local_addr,
            handler: self.handler,
        })
    }

    /// Bind and serve until the process is terminated.
    pub async fn run(self) -> Result<(), RelayError> {
        self.bind().await?.serve().await;
        Ok(())
    }
}

/// Relay with a bound listener.
pub struct BoundRelay<F> {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: Arc<PfHandler<F>>,
}

impl<F: Fetch + 'static> BoundRelay<F> {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections forever.
    pub async fn serve(self) {
        self.serve_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks. Accept
    /// errors (such as running out of file descriptors) are logged and
    /// retried after a growing delay; they never stop the listener.
    pub async fn serve_until(self, shutdown: impl Future<Output = ()>) {
        info!("Listening at {}", self.local_addr);
        tokio::pin!(shutdown);

        let listener = &self.listener;
        let mut backoff = AcceptBackoff::default();

        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = next_connection(move || listener.accept(), &mut backoff) => accepted,
                () = &mut shutdown => {
                    info!("Stopped listening at {}", self.local_addr);
                    return;
                }
            };
            let io = TokioIo::new(stream);
            let handler = self.handler.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { handle_request(req, handler, remote_addr).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {:?}", remote_addr, err);
                }
            });
        }
    }
}

/// Delay between failed accepts: 5ms, doubling up to 1s, reset on success.
#[derive(Debug, Default)]
struct AcceptBackoff {
    delay: Option<Duration>,
}

impl AcceptBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = match self.delay {
            None => MIN_ACCEPT_DELAY,
            Some(delay) => (delay * 2).min(MAX_ACCEPT_DELAY),
        };
        self.delay = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.delay = None;
    }
}

/// Keep calling `accept` until it yields a connection.
async fn next_connection<S, A, Fut>(mut accept: A, backoff: &mut AcceptBackoff) -> (S, SocketAddr)
where
    A: FnMut() -> Fut,
    Fut: Future<Output = io::Result<(S, SocketAddr)>>,
{
    loop {
        match accept().await {
            Ok(connection) => {
                backoff.reset();
                return connection;
            }
            Err(err) => {
                let delay = backoff.next_delay();
                error!("Accept error: {}; retrying in {:?}", err, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Handle an incoming HTTP request.
async fn handle_request<F: Fetch>(
    req: Request<Incoming>,
    handler: Arc<PfHandler<F>>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    debug!("Handling {} {} from {}", req.method(), req.uri(), remote_addr);

    if req.uri().path() != PF_ROUTE {
        return Ok(not_found());
    }

    let request = FetchRequest::from_query(req.uri().query());
    let response = handler.handle(request).await;
    Ok(build_response(&response))
}

/// Build the HTTP answer for a [`FetchResponse`]. The status is always 200.
fn build_response(response: &FetchResponse) -> Response<Full<Bytes>> {
    let body = match response.to_json_line() {
        Ok(body) => body,
        Err(err) => {
            error!("Failed to encode response for {}: {}", response.res, err);
            let mut failed = Response::new(Full::new(Bytes::new()));
            *failed.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            return failed;
        }
    };

    let mut http_response = Response::new(Full::new(body));
    let headers = http_response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    http_response
}

fn not_found() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(b"404 page not found\n")));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::State;

    #[test]
    fn test_build_response_headers() {
        for state in [State::Err, State::Ok, State::NoContent, State::HttpFail] {
            let response = build_response(&FetchResponse::new("http://a/", state));

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[CONTENT_TYPE], JSON_CONTENT_TYPE);
            assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        }
    }

    #[test]
    fn test_accept_backoff_doubles_and_caps() {
        let mut backoff = AcceptBackoff::default();
        let delays: Vec<u64> = (0..10)
            .map(|_| backoff.next_delay().as_millis() as u64)
            .collect();
        assert_eq!(delays, [5, 10, 20, 40, 80, 160, 320, 640, 1000, 1000]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), MIN_ACCEPT_DELAY);
    }

    #[tokio::test]
    async fn test_next_connection_survives_accept_errors() {
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let mut attempts = 0;
        let mut backoff = AcceptBackoff::default();

        let (conn, addr) = next_connection(
            || {
                attempts += 1;
                let result = if attempts <= 3 {
                    // EMFILE
                    Err(io::Error::from_raw_os_error(24))
                } else {
                    Ok(("conn", peer))
                };
                std::future::ready(result)
            },
            &mut backoff,
        )
        .await;

        assert_eq!(conn, "conn");
        assert_eq!(addr, peer);
        assert_eq!(attempts, 4);
        // A success resets the delay.
        assert_eq!(backoff.next_delay(), MIN_ACCEPT_DELAY);
    }

    #[tokio::test]
    async fn test_serving_continues_after_accept_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut failures = 2;
        let mut backoff = AcceptBackoff::default();

        let client = tokio::spawn(tokio::net::TcpStream::connect(addr));
        let (_stream, remote) = next_connection(
            || {
                let fail = failures > 0;
                failures -= 1;
                let listener = &listener;
                async move {
                    if fail {
                        Err(io::Error::from(io::ErrorKind::ConnectionAborted))
                    } else {
                        listener.accept().await
                    }
                }
            },
            &mut backoff,
        )
        .await;

        let connected = client.await.unwrap().unwrap();
        assert_eq!(remote, connected.local_addr().unwrap());
    }

    #[test]
    fn test_not_found() {
        let response = not_found();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
