//! # BizTime Core
//!
//! Core library for the BizTime companies/invoices API.
//! Provides the schema bootstrapper, input validation, the HTTP server and
//! the resource handlers.
//!
//! ## Architecture
//!
//! The bootstrapper runs once at startup and hands back a [`DatabasePool`].
//! That handle and an [`AppConfig`] are passed into the handlers by
//! [`build_server`]; nothing is read from global state at request time.
//!
//! ## Modules
//!
//! - `app` - Route registration
//! - `bootstrap` - Idempotent database/table/seed setup
//! - `config` - Explicit application configuration
//! - `database` - SQLx pool over PostgreSQL or SQLite
//! - `error` - Error types and the JSON error envelope
//! - `handlers` - `/companies` and `/invoices` controllers
//! - `json` - JSON body parsing with simd-json
//! - `middleware` - Request/response middleware system
//! - `models` - Table row and response types
//! - `request` - HTTP request wrapper
//! - `router` - Routing using matchit (radix trie)
//! - `server` - HTTP server built on Hyper
//! - `validation` - Field validation and sanitization

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod json;
pub mod middleware;
pub mod models;
pub mod request;
pub mod router;
pub mod server;
pub mod validation;

pub use app::build_server;
pub use bootstrap::{bootstrap, BootstrapReport};
pub use config::{AppConfig, Mode};
pub use database::DatabasePool;
pub use error::{Error, ErrorEnvelope, Result};
pub use json::{parse_json_bytes, to_json};
pub use middleware::{LoggingMiddleware, Middleware, MiddlewareChain};
pub use request::Request;
pub use router::{Method, Router};
pub use server::{Response, Server, ServerConfig};
pub use validation::{sanitize_input, validate_input, Field, FieldError, ValidationCode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.1");
    }
}
