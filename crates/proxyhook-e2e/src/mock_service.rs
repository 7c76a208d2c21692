//! Recording HTTP service used as a webhook target
//!
//! Every request is captured for later assertions. The response status can be
//! changed at runtime to simulate a failing target.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::time::Instant;

/// A webhook delivery as seen by the target
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub uri: String,
    /// Header names are lowercase, as hyper reports them
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header in arrival order
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }
}

struct Shared {
    requests: RwLock<Vec<RecordedRequest>>,
    status: RwLock<StatusCode>,
    arrived: Notify,
}

pub struct MockHttpService {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl MockHttpService {
    /// Start listening on an ephemeral port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock service");
        let addr = listener.local_addr().unwrap();

        let shared = Arc::new(Shared {
            requests: RwLock::new(Vec::new()),
            status: RwLock::new(StatusCode::OK),
            arrived: Notify::new(),
        });

        let accept_shared = shared.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };

                let shared = accept_shared.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let shared = shared.clone();
                        async move { Ok::<_, Infallible>(record(&shared, req).await) }
                    });

                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { addr, shared }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Target URL for this service, e.g. `http://127.0.0.1:41234/hook`
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.shared.requests.read().clone()
    }

    pub fn request_count(&self) -> usize {
        self.shared.requests.read().len()
    }

    pub fn set_response_status(&self, status: StatusCode) {
        *self.shared.status.write() = status;
    }

    /// Wait until at least `count` requests arrived or `timeout` elapsed.
    ///
    /// Returns whatever was recorded at that point.
    pub async fn wait_for_requests(&self, count: usize, timeout: Duration) -> Vec<RecordedRequest> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.shared.arrived.notified();
            if self.request_count() >= count {
                break;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                break;
            }
        }
        self.get_requests()
    }
}

async fn record(shared: &Shared, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let method = req.method().to_string();
    let uri = req.uri().to_string();
    let headers = req
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();

    let body = req
        .into_body()
        .collect()
        .await
        .map(|b| b.to_bytes().to_vec())
        .unwrap_or_default();

    shared.requests.write().push(RecordedRequest {
        method,
        uri,
        headers,
        body,
    });
    shared.arrived.notify_waiters();

    let status = *shared.status.read();
    let mut response = Response::new(Full::new(Bytes::from_static(b"OK")));
    *response.status_mut() = status;
    response
}
