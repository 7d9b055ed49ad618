//! # Resource Handlers
//!
//! Controllers for `/companies` and `/invoices`.
//!
//! Each handler guards its input first (unexpected body or params are a 400),
//! sanitizes and validates what it needs, then runs one bound query. Storage
//! failures are translated into [`Error`] values here; nothing raw reaches the
//! responder.

pub mod companies;
pub mod invoices;

pub use companies::CompanyHandlers;
pub use invoices::InvoiceHandlers;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::request::{JsonBody, Request};
use crate::server::Response;
use serde::Serialize;
use std::collections::BTreeMap;

/// Message carried by every injected storage failure
pub const SIMULATED_FAULT: &str = "Simulated database error";

/// Wrap `value` as `{ key: value }`
pub(crate) fn wrapped<T: Serialize>(key: &str, value: &T) -> Result<Response> {
    Response::json_value(&BTreeMap::from([(key, value)]))
}

/// `{"status": "deleted"}`
pub(crate) fn deleted() -> Result<Response> {
    wrapped("status", &"deleted")
}

/// Endpoints that take no body must not receive one
pub(crate) fn reject_body(req: &Request, message: &str) -> Result<()> {
    if req.body_is_empty() {
        return Ok(());
    }
    match req.json_body() {
        Ok(body) if body.is_empty() => Ok(()),
        _ => Err(Error::validation(message)),
    }
}

/// Endpoints without path parameters must not receive params or a query
pub(crate) fn reject_params(req: &Request) -> Result<()> {
    if req.params.is_empty() && req.query_string().map_or(true, str::is_empty) {
        return Ok(());
    }
    Err(Error::validation("Extra params not allowed for this endpoint."))
}

/// Parse a required, non-empty JSON object body
pub(crate) fn require_body(req: &Request, message: &str) -> Result<JsonBody> {
    let body = req.json_body()?;
    if body.is_empty() {
        return Err(Error::validation(message));
    }
    Ok(body)
}

/// Fault-injection hook run before every storage call
pub(crate) fn storage_fault(config: &AppConfig, operation: &str) -> Result<()> {
    if config.inject_storage_fault {
        return Err(Error::storage(format!("{operation}: {SIMULATED_FAULT}")));
    }
    Ok(())
}
