//! # HTTP Request
//!
//! Request wrapper decoupling handlers from hyper types.
//!
//! - Headers are stored as received
//! - Body is collected once and cached
//! - The JSON body is parsed on demand

use crate::error::{Error, Result};
use crate::json::parse_json_bytes;
use crate::router::Method;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::Request as HyperRequest;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// JSON object body
pub type JsonBody = Map<String, Value>;

/// HTTP request as seen by handlers
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Raw query string (e.g., "page=1&limit=10")
    query_string: Option<String>,
    /// Path parameters captured by the router
    pub params: HashMap<String, String>,
    /// Request headers
    headers: hyper::HeaderMap,
    /// Request body (collected)
    body: Option<Bytes>,
}

impl Request {
    /// Create a new Request manually (for testing/internal use)
    pub fn new(
        method: Method,
        path: String,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let (path, query_string) = if let Some((p, q)) = path.split_once('?') {
            (p.to_string(), Some(q.to_string()))
        } else {
            (path, None)
        };

        let mut headers = hyper::HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (
                hyper::header::HeaderName::from_bytes(k.as_bytes()),
                hyper::header::HeaderValue::from_str(&v),
            ) {
                headers.insert(n, v);
            }
        }

        Self {
            method,
            path,
            query_string,
            params: HashMap::new(),
            headers,
            body,
        }
    }

    /// Create from hyper request with body size limit
    pub async fn from_hyper_with_limit(
        req: HyperRequest<hyper::body::Incoming>,
        max_body_size: usize,
    ) -> Result<Self> {
        let method = Method::from_hyper(req.method()).ok_or_else(|| Error::RouteNotFound {
            path: req.uri().path().to_string(),
        })?;

        let uri = req.uri();
        let path = uri.path().to_string();
        let query_string = uri.query().map(String::from);

        let headers = req.headers().clone();
        if let Some(content_len) = headers
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<usize>().ok())
        {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        let collected = BodyExt::collect(req.into_body()).await?;
        let bytes = collected.to_bytes();
        if bytes.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            method,
            path,
            query_string,
            params: HashMap::new(),
            headers,
            body: Some(bytes),
        })
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            hyper::header::HeaderName::from_bytes(name.as_bytes()),
            hyper::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Get raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Get a path parameter by name
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_ref().map(AsRef::as_ref)
    }

    /// Whether the body is absent or only whitespace
    #[must_use]
    pub fn body_is_empty(&self) -> bool {
        self.body_bytes()
            .map_or(true, |b| b.iter().all(u8::is_ascii_whitespace))
    }

    /// Parse the body as a JSON object
    ///
    /// An absent or blank body parses as an empty object.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the body is not a JSON object.
    pub fn json_body(&self) -> Result<JsonBody> {
        if self.body_is_empty() {
            return Ok(JsonBody::new());
        }
        let mut bytes = self.body_bytes().map(<[u8]>::to_vec).unwrap_or_default();
        match parse_json_bytes::<Value>(&mut bytes)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::validation("Request body must be a JSON object.")),
        }
    }
}
