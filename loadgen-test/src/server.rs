//! Exposes an in-process mock scheduler for use in integration tests.
//!
//! ```
//! use loadgen_test::server::TestScheduler;
//!
//! #[tokio::main]
//! async fn main() {
//!    let scheduler = TestScheduler::new().await;
//!    let url = scheduler.url("/run/dd-0");
//!    // POST to the URL in tests...
//! }
//! ```

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing;

/// A request received by the [`TestScheduler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// The function name from the `/run/{function}` path.
    pub function: String,
    /// The `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// The raw request body.
    pub body: Bytes,
}

#[derive(Clone, Debug)]
struct SchedulerState {
    status: StatusCode,
    delay: Duration,
    invocations: Arc<Mutex<Vec<Invocation>>>,
}

/// An in-process stand-in for the scheduler under test.
///
/// It accepts `POST /run/{function}`, records every invocation and answers with a fixed status
/// code, optionally after a fixed delay. It listens on a random available port on localhost and
/// stops when dropped.
#[derive(Debug)]
pub struct TestScheduler {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    invocations: Arc<Mutex<Vec<Invocation>>>,
}

impl TestScheduler {
    /// Starts a scheduler that answers every invocation with `200 OK`.
    pub async fn new() -> Self {
        Self::with_status(StatusCode::OK).await
    }

    /// Starts a scheduler that answers every invocation with `status`.
    pub async fn with_status(status: StatusCode) -> Self {
        Self::start(status, Duration::ZERO).await
    }

    /// Starts a scheduler that holds every invocation for `delay` before answering `200 OK`.
    ///
    /// Invocations are recorded as soon as they arrive, before the delay.
    pub async fn with_delay(delay: Duration) -> Self {
        Self::start(StatusCode::OK, delay).await
    }

    async fn start(status: StatusCode, delay: Duration) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let invocations = Arc::new(Mutex::new(Vec::new()));
        let state = SchedulerState {
            status,
            delay,
            invocations: Arc::clone(&invocations),
        };
        let app = Router::new()
            .route("/run/{function}", routing::post(run_function))
            .with_state(state);

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            handle,
            socket,
            invocations,
        }
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `127.0.0.1` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://127.0.0.1:{}/{}", self.socket.port(), path)
    }

    /// Returns the host the scheduler listens on.
    pub fn host(&self) -> String {
        self.socket.ip().to_string()
    }

    /// Returns the port the scheduler listens on.
    pub fn port(&self) -> u16 {
        self.socket.port()
    }

    /// Returns all invocations received so far, in arrival order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }
}

impl Drop for TestScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run_function(
    State(state): State<SchedulerState>,
    Path(function): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    state.invocations.lock().unwrap().push(Invocation {
        function,
        content_type,
        body,
    });

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    state.status
}
