//! # Application wiring
//!
//! Builds a [`Server`] with the company and invoice routes bound to one
//! storage handle and one configuration.

use crate::config::AppConfig;
use crate::database::DatabasePool;
use crate::error::Result;
use crate::handlers::{CompanyHandlers, InvoiceHandlers};
use crate::middleware::LoggingMiddleware;
use crate::request::Request;
use crate::router::Method;
use crate::server::{Handler, HandlerFuture, Server, ServerConfig};
use std::sync::Arc;
use tracing::info;

/// Turn `controller.method(req)` into a boxed [`Handler`]
macro_rules! handler {
    ($controller:expr, $method:ident) => {{
        let controller = Arc::clone(&$controller);
        let handler: Handler = Arc::new(move |req: Request| -> HandlerFuture {
            let controller = Arc::clone(&controller);
            Box::pin(async move { controller.$method(req).await })
        });
        handler
    }};
}

/// Build the BizTime server
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` if a route cannot be registered.
pub fn build_server(
    db: DatabasePool,
    config: AppConfig,
    server_config: ServerConfig,
) -> Result<Server> {
    let config = Arc::new(config);
    let companies = Arc::new(CompanyHandlers::new(db.clone(), Arc::clone(&config)));
    let invoices = Arc::new(InvoiceHandlers::new(db, Arc::clone(&config)));

    let mut server = Server::new().with_config(server_config);
    server.add_middleware(LoggingMiddleware::new());

    server.add_route(Method::Get, "/companies", handler!(companies, list))?;
    server.add_route(Method::Post, "/companies", handler!(companies, create))?;
    server.add_route(Method::Get, "/companies/{code}", handler!(companies, get))?;
    server.add_route(Method::Put, "/companies/{code}", handler!(companies, update))?;
    server.add_route(Method::Delete, "/companies/{code}", handler!(companies, delete))?;

    server.add_route(Method::Get, "/invoices", handler!(invoices, list))?;
    server.add_route(Method::Post, "/invoices", handler!(invoices, create))?;
    server.add_route(Method::Get, "/invoices/{id}", handler!(invoices, get))?;
    server.add_route(Method::Put, "/invoices/{id}", handler!(invoices, update))?;
    server.add_route(Method::Delete, "/invoices/{id}", handler!(invoices, delete))?;

    info!(
        mode = ?config.mode,
        inject_storage_fault = config.inject_storage_fault,
        "Routes registered"
    );
    Ok(server)
}

#[cfg(test)]
mod tests {
    use crate::handlers::testing::fixture;
    use crate::router::Method;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_unregistered_method_is_404() {
        let fx = fixture().await;
        let resp = fx
            .server
            .test_request(Method::Patch, "/companies", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 404);
        assert_eq!(resp.json_body().unwrap()["error"]["message"], "Not Found");
    }

    #[tokio::test]
    async fn test_query_on_list_is_rejected() {
        let fx = fixture().await;
        let resp = fx
            .server
            .test_request(Method::Get, "/invoices?page=2", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 400);
        assert_eq!(
            resp.json_body().unwrap()["message"],
            "Extra params not allowed for this endpoint."
        );
    }
}
