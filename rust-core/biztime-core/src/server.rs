//! # HTTP Server
//!
//! HTTP/1 server built on Hyper and Tokio.
//!
//! ## Key Features
//!
//! - One Tokio task per connection
//! - A single error responder that renders every handler failure as a JSON
//!   error envelope
//! - Graceful shutdown on Ctrl-C with a bounded drain of open connections
//! - [`Server::test_request`] runs the whole pipeline without a socket

use crate::error::{Error, ErrorEnvelope, Result};
use crate::json::to_json;
use crate::middleware::{Middleware, MiddlewareChain, MiddlewareResult};
use crate::request::Request;
use crate::router::{Method, Router};
use http_body_util::Full;
pub use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response as HyperResponse, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 3000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// HTTP response produced by handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Response headers
    pub headers: HashMap<String, String>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            content_type: "application/json".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl Response {
    /// Create a JSON response from a pre-serialized body
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Serialize a value into a JSON response
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the value cannot be serialized.
    pub fn json_value<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::json(to_json(value)?))
    }

    /// Set status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_string(), value.to_string());
        }
    }

    /// Parse the body back into JSON
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the body is not JSON.
    pub fn json_body(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Render an error as the JSON envelope response
    ///
    /// This is the single place where failures become HTTP responses.
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        let envelope = ErrorEnvelope::from(err);
        if envelope.status >= 500 {
            error!(status = envelope.status, error = %err, "Request failed");
        } else {
            debug!(status = envelope.status, error = %err, "Request rejected");
        }
        Self::json(envelope.to_body().to_string()).with_status(envelope.status)
    }

    /// Convert to hyper Response
    fn into_hyper(self) -> HyperResponse<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = HyperResponse::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        if let Ok(value) = hyper::header::HeaderValue::from_str(&self.content_type) {
            headers.insert(hyper::header::CONTENT_TYPE, value);
        }
        for (k, v) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                hyper::header::HeaderName::from_bytes(k.as_bytes()),
                hyper::header::HeaderValue::from_str(v),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}

/// Boxed handler future
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send>>;

/// Handler function type (async)
pub type Handler = Arc<dyn Fn(Request) -> HandlerFuture + Send + Sync>;

/// Routing table plus handlers and middleware, shared by every connection
#[derive(Clone, Default)]
struct Pipeline {
    router: Router,
    handlers: Vec<Handler>,
    middleware: MiddlewareChain,
}

/// HTTP server
#[derive(Default)]
pub struct Server {
    config: ServerConfig,
    pipeline: Pipeline,
}

impl Server {
    /// Create a new Server instance
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the server configuration
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a middleware to the chain
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.pipeline.middleware.add(middleware);
    }

    /// Add a route and its handler
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` for malformed or conflicting paths.
    pub fn add_route(&mut self, method: Method, path: &str, handler: Handler) -> Result<()> {
        self.pipeline.router.add_route(method, path)?;
        self.pipeline.handlers.push(handler);
        Ok(())
    }

    /// Start the server with graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` when the address cannot be bound.
    pub async fn serve(&self) -> Result<()> {
        let addr = self.config.address;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| Error::BindError {
                address: addr.to_string(),
                source,
            })?;

        info!("Server listening on http://{}", addr);

        let pipeline = Arc::new(self.pipeline.clone());
        let active = ActiveConnections::default();
        let max_body_size = self.config.max_body_size;
        let keep_alive = self.config.keep_alive;

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);
                    let pipeline = pipeline.clone();
                    let guard = active.track();

                    tokio::task::spawn(async move {
                        let service = service_fn(move |req| {
                            let pipeline = pipeline.clone();
                            async move {
                                let method = req.method().clone();
                                let path = req.uri().path().to_string();
                                let version = req.version();

                                let response = handle_request(req, &pipeline, max_body_size).await;
                                info!("    {} - \"{} {} {:?}\" {}",
                                    remote_addr,
                                    method,
                                    path,
                                    version,
                                    response.status()
                                );
                                Ok::<_, hyper::Error>(response)
                            }
                        });

                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection: {:?}", err);
                        }
                        drop(guard);
                    });
                }
                () = shutdown_signal() => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        if !active.drain(self.config.shutdown_timeout).await {
            error!(open = active.count(), "Shutdown timeout reached with open connections");
        }
        Ok(())
    }

    /// Execute a test request directly without network stack
    pub async fn test_request(
        &self,
        method: Method,
        path: &str,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Response {
        if let Some(b) = body.as_ref() {
            if b.len() > self.config.max_body_size {
                return Response::from_error(&Error::PayloadTooLarge {
                    limit: self.config.max_body_size,
                    actual: b.len(),
                });
            }
        }
        let req = Request::new(method, path.to_string(), headers, body);
        process_request(req, &self.pipeline).await
    }

    /// Convenience wrapper around [`Server::test_request`] with a JSON body
    pub async fn test_json(
        &self,
        method: Method,
        path: &str,
        body: &serde_json::Value,
    ) -> Response {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        self.test_request(method, path, headers, Some(Bytes::from(body.to_string())))
            .await
    }
}

/// Count of connections still being served
#[derive(Clone, Default)]
struct ActiveConnections(Arc<AtomicUsize>);

/// Registered connection; unregisters on drop
struct ConnectionGuard(Arc<AtomicUsize>);

impl ActiveConnections {
    /// Register a connection at accept time, before its task is spawned
    fn track(&self) -> ConnectionGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard(Arc::clone(&self.0))
    }

    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Wait until every connection is gone; `false` on timeout
    async fn drain(&self, timeout: Duration) -> bool {
        let wait = async {
            while self.count() != 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", err);
        std::future::pending::<()>().await;
    }
}

/// Core request processing logic (network agnostic)
async fn process_request(mut req: Request, pipeline: &Pipeline) -> Response {
    if req.header("x-request-id").is_none() {
        req.set_header("x-request-id", &generate_request_id());
    }

    let mut response = match pipeline.middleware.run_before(&req) {
        MiddlewareResult::Respond(resp) => resp,
        MiddlewareResult::Continue => dispatch(&mut req, pipeline).await,
    };

    if let Some(request_id) = req.header("x-request-id") {
        response.set_header("x-request-id", request_id);
    }
    pipeline.middleware.run_after(&req, &mut response);
    response
}

async fn dispatch(req: &mut Request, pipeline: &Pipeline) -> Response {
    let matched = match pipeline.router.match_route(req.method, &req.path) {
        Ok(m) => m,
        Err(err) => return Response::from_error(&err),
    };
    req.params = matched.params;

    let Some(handler) = pipeline.handlers.get(matched.handler_id) else {
        return Response::from_error(&Error::RouteNotFound {
            path: req.path.clone(),
        });
    };

    match handler(req.clone()).await {
        Ok(response) => response,
        Err(err) => Response::from_error(&err),
    }
}

async fn handle_request(
    req: hyper::Request<hyper::body::Incoming>,
    pipeline: &Pipeline,
    max_body_size: usize,
) -> HyperResponse<Full<Bytes>> {
    let remote_path = req.uri().path().to_string();
    let response = match Request::from_hyper_with_limit(req, max_body_size).await {
        Ok(request) => process_request(request, pipeline).await,
        Err(err) => {
            error!(path = %remote_path, error = %err, "Failed to read request");
            Response::from_error(&err)
        }
    };
    response.into_hyper()
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}
