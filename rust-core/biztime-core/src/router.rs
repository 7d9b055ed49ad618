//! # Router
//!
//! Radix-trie based router using `matchit`, one trie per HTTP method.
//!
//! Path parameters use matchit's `{name}` syntax (`/companies/{code}`) and
//! are percent-decoded before they reach handlers.
//! Anything that matches no registered route is reported as
//! [`Error::RouteNotFound`], which the server renders as a 404 envelope.

use crate::error::{Error, Result};
use matchit::Router as MatchitRouter;
use std::borrow::Cow;
use std::collections::HashMap;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
}

impl Method {
    /// Map a hyper method; `None` for methods we never route
    #[must_use]
    pub fn from_hyper(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Self::Get),
            hyper::Method::POST => Some(Self::Post),
            hyper::Method::PUT => Some(Self::Put),
            hyper::Method::DELETE => Some(Self::Delete),
            hyper::Method::PATCH => Some(Self::Patch),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
            Self::Patch => write!(f, "PATCH"),
        }
    }
}

/// Route handler identifier
pub type HandlerId = usize;

/// Matched route with extracted parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// The handler ID for this route
    pub handler_id: HandlerId,
    /// Extracted path parameters
    pub params: HashMap<String, String>,
}

/// HTTP router using one radix trie per method
#[derive(Clone, Default)]
pub struct Router {
    method_routes: HashMap<Method, MatchitRouter<HandlerId>>,
    next_handler_id: HandlerId,
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route with the given method and path pattern
    ///
    /// # Returns
    ///
    /// The handler ID assigned to this route
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed or
    /// conflicts with an existing route
    pub fn add_route(&mut self, method: Method, path: &str) -> Result<HandlerId> {
        let handler_id = self.next_handler_id;

        self.method_routes
            .entry(method)
            .or_default()
            .insert(path, handler_id)
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: path.to_string(),
                reason: e.to_string(),
            })?;

        self.next_handler_id += 1;
        Ok(handler_id)
    }

    /// Match a request path against registered routes
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if no matching route exists
    pub fn match_route(&self, method: Method, path: &str) -> Result<Match> {
        let not_found = || Error::RouteNotFound {
            path: path.to_string(),
        };

        let matched = self
            .method_routes
            .get(&method)
            .ok_or_else(not_found)?
            .at(path)
            .map_err(|_| not_found())?;

        Ok(Match {
            handler_id: *matched.value,
            params: matched
                .params
                .iter()
                .map(|(k, v)| (k.to_string(), decode_param(v)))
                .collect(),
        })
    }
}

/// Percent-decode a captured segment; undecodable input is kept as-is
fn decode_param(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), Cow::into_owned)
}
