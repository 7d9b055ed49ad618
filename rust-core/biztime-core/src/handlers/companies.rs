//! `/companies` endpoints.

use super::{deleted, reject_body, reject_params, require_body, storage_fault, wrapped};
use crate::config::AppConfig;
use crate::database::{is_unique_violation, returned_row, storage_error, DatabasePool};
use crate::error::{Error, Result};
use crate::models::{Company, CompanyDetail, CompanySummary, InvoiceRef};
use crate::request::Request;
use crate::server::Response;
use crate::validation::{clean_field, clean_param, Field};
use crate::with_pool;
use std::sync::Arc;
use tracing::{debug, warn};

/// Company controller bound to the shared pool
#[derive(Debug, Clone)]
pub struct CompanyHandlers {
    db: DatabasePool,
    config: Arc<AppConfig>,
}

impl CompanyHandlers {
    /// Create the controller
    #[must_use]
    pub const fn new(db: DatabasePool, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// `GET /companies`
    pub async fn list(&self, req: Request) -> Result<Response> {
        reject_body(&req, "Extra data not allowed for this endpoint.")?;
        reject_params(&req)?;

        let op = "Failed to get companies";
        storage_fault(&self.config, op)?;
        let companies = with_pool!(&self.db, pool => {
            sqlx::query_as::<_, CompanySummary>("SELECT code, name FROM companies ORDER BY code")
                .fetch_all(pool)
                .await
        })
        .map_err(|e| storage_error(op, &e))?;

        if companies.is_empty() {
            return Err(Error::not_found("There are no companies."));
        }
        wrapped("companies", &companies)
    }

    /// `GET /companies/{code}`
    ///
    /// Invoice ids are attached on a best-effort basis; when that lookup
    /// fails the `invoices` field is left out instead of failing the request.
    pub async fn get(&self, req: Request) -> Result<Response> {
        reject_body(&req, "Extra data not allowed in this endpoint.")?;
        let code = clean_param(req.param("code").unwrap_or_default(), "code", "Code")?;

        let op = "Failed to get company";
        storage_fault(&self.config, op)?;
        let company = with_pool!(&self.db, pool => {
            sqlx::query_as::<_, Company>(
                "SELECT code, name, description FROM companies WHERE code = $1",
            )
            .bind(code.as_str())
            .fetch_optional(pool)
            .await
        })
        .map_err(|e| storage_error(op, &e))?
        .ok_or_else(|| Error::not_found(format!("Company not found for code: {code}")))?;

        let invoices = self.invoice_ids(&code).await;
        wrapped("company", &CompanyDetail { company, invoices })
    }

    async fn invoice_ids(&self, code: &str) -> Option<Vec<InvoiceRef>> {
        let found = with_pool!(&self.db, pool => {
            sqlx::query_as::<_, InvoiceRef>(
                "SELECT id FROM invoices WHERE comp_code = $1 ORDER BY id",
            )
            .bind(code)
            .fetch_all(pool)
            .await
        });

        match found {
            Ok(ids) => Some(ids),
            Err(err) => {
                warn!(code, error = %err, "Failed to get invoices for company");
                None
            }
        }
    }

    /// `POST /companies`
    pub async fn create(&self, req: Request) -> Result<Response> {
        let body = require_body(&req, "Body not found in request.")?;
        let code = clean_field(body.get("code"), Field::Code)?;
        let name = clean_field(body.get("name"), Field::Name)?;
        let description = clean_field(body.get("description"), Field::Description)?;

        let op = "Failed to create company";
        storage_fault(&self.config, op)?;
        let company = with_pool!(&self.db, pool => {
            sqlx::query_as::<_, Company>(
                "INSERT INTO companies (code, name, description)
                 VALUES ($1, $2, $3)
                 RETURNING code, name, description",
            )
            .bind(code.as_str())
            .bind(name.as_str())
            .bind(description.as_str())
            .fetch_all(pool)
            .await
        })
        .map(returned_row)
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::conflict("Company with duplicate code already exists!")
            } else {
                storage_error(op, &e)
            }
        })?
        .ok_or_else(|| Error::storage(format!("{op}: no row returned")))?;

        debug!(code = %company.code, "Company created");
        Ok(wrapped("company", &company)?.with_status(201))
    }

    /// `PUT /companies/{code}`
    pub async fn update(&self, req: Request) -> Result<Response> {
        let body = require_body(&req, "Updated company data not found in request.")?;
        let code = clean_param(req.param("code").unwrap_or_default(), "code", "Code")?;
        let name = clean_field(body.get("name"), Field::Name)?;
        let description = clean_field(body.get("description"), Field::Description)?;

        let op = "Failed to update company";
        storage_fault(&self.config, op)?;
        let company = with_pool!(&self.db, pool => {
            sqlx::query_as::<_, Company>(
                "UPDATE companies SET name = $1, description = $2
                 WHERE code = $3
                 RETURNING code, name, description",
            )
            .bind(name.as_str())
            .bind(description.as_str())
            .bind(code.as_str())
            .fetch_all(pool)
            .await
        })
        .map(returned_row)
        .map_err(|e| storage_error(op, &e))?
        .ok_or_else(|| {
            Error::validation(format!(
                "Failed to update company. Check if Company Code: '{code}' exists"
            ))
        })?;

        wrapped("company", &company)
    }

    /// `DELETE /companies/{code}`
    ///
    /// Invoices of the company go with it (`ON DELETE CASCADE`).
    pub async fn delete(&self, req: Request) -> Result<Response> {
        reject_body(&req, "Body not allowed in this request.")?;
        let code = clean_param(req.param("code").unwrap_or_default(), "code", "Code")?;

        let op = "Failed to delete company";
        storage_fault(&self.config, op)?;
        let removed = with_pool!(&self.db, pool => {
            sqlx::query_scalar::<_, String>("DELETE FROM companies WHERE code = $1 RETURNING code")
                .bind(code.as_str())
                .fetch_all(pool)
                .await
        })
        .map(returned_row)
        .map_err(|e| storage_error(op, &e))?;

        if removed.is_none() {
            return Err(Error::validation(format!(
                "Failed to delete company. Company Code: '{code}' does not exist"
            )));
        }
        deleted()
    }
}

#[cfg(test)]
mod tests {
    use crate::handlers::testing::fixture;
    use crate::router::Method;
    use crate::with_pool;
    use hyper::body::Bytes;
    use serde_json::json;
    use std::collections::HashMap;

    fn goog() -> serde_json::Value {
        json!({"code": "goog", "name": "Google", "description": "G"})
    }

    #[tokio::test]
    async fn test_list_empty_is_404() {
        let fx = fixture().await;
        let resp = fx
            .server
            .test_request(Method::Get, "/companies", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 404);
        assert_eq!(resp.json_body().unwrap()["message"], "There are no companies.");
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let fx = fixture().await;
        let created = fx.server.test_json(Method::Post, "/companies", &goog()).await;
        assert_eq!(created.status, 201);
        assert_eq!(created.json_body().unwrap()["company"], goog());

        let resp = fx
            .server
            .test_request(Method::Get, "/companies/goog", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 200);
        let body = resp.json_body().unwrap();
        assert_eq!(body["company"]["code"], "goog");
        assert_eq!(body["company"]["name"], "Google");
        assert_eq!(body["company"]["description"], "G");
        assert_eq!(body["company"]["invoices"], json!([]));

        let listed = fx
            .server
            .test_request(Method::Get, "/companies", HashMap::new(), None)
            .await;
        assert_eq!(
            listed.json_body().unwrap()["companies"],
            json!([{"code": "goog", "name": "Google"}])
        );
    }

    #[tokio::test]
    async fn test_get_attaches_invoice_ids() {
        let fx = fixture().await;
        fx.server.test_json(Method::Post, "/companies", &goog()).await;
        fx.server
            .test_json(Method::Post, "/invoices", &json!({"comp_code": "goog", "amt": 10}))
            .await;

        let resp = fx
            .server
            .test_request(Method::Get, "/companies/goog", HashMap::new(), None)
            .await;
        let invoices = &resp.json_body().unwrap()["company"]["invoices"];
        assert_eq!(invoices.as_array().map(Vec::len), Some(1));
        assert!(invoices[0]["id"].is_number());
    }

    #[tokio::test]
    async fn test_duplicate_code_is_400() {
        let fx = fixture().await;
        let first = fx.server.test_json(Method::Post, "/companies", &goog()).await;
        assert_eq!(first.status, 201);

        let second = fx.server.test_json(Method::Post, "/companies", &goog()).await;
        assert_eq!(second.status, 400);
        let message = second.json_body().unwrap()["message"].as_str().unwrap().to_string();
        assert!(message.contains("duplicate"));
    }

    #[tokio::test]
    async fn test_create_validates_fields() {
        let fx = fixture().await;

        let resp = fx
            .server
            .test_json(Method::Post, "/companies", &json!({"code": "ab", "name": "A", "description": "x"}))
            .await;
        assert_eq!(resp.status, 400);

        let resp = fx
            .server
            .test_json(Method::Post, "/companies", &json!({"code": "abc", "description": "x"}))
            .await;
        assert_eq!(resp.status, 400);
        assert_eq!(resp.json_body().unwrap()["message"], "Name must have an input.");

        let resp = fx
            .server
            .test_request(Method::Post, "/companies", HashMap::new(), None)
            .await;
        assert_eq!(resp.json_body().unwrap()["message"], "Body not found in request.");
    }

    #[tokio::test]
    async fn test_special_characters_are_sanitized() {
        let fx = fixture().await;
        let resp = fx
            .server
            .test_json(
                Method::Post,
                "/companies",
                &json!({"code": "g!o@o#g", "name": "Google!", "description": "Search."}),
            )
            .await;
        assert_eq!(resp.status, 201);
        let company = &resp.json_body().unwrap()["company"];
        assert_eq!(company["code"], "goog");
        assert_eq!(company["name"], "Google");
        assert_eq!(company["description"], "Search");
    }

    #[tokio::test]
    async fn test_get_unknown_is_404() {
        let fx = fixture().await;
        let resp = fx
            .server
            .test_request(Method::Get, "/companies/nope", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 404);
        assert_eq!(
            resp.json_body().unwrap()["message"],
            "Company not found for code: nope"
        );
    }

    #[tokio::test]
    async fn test_get_rejects_body_and_empty_code() {
        let fx = fixture().await;
        let resp = fx
            .server
            .test_request(
                Method::Get,
                "/companies/goog",
                HashMap::new(),
                Some(Bytes::from_static(br#"{"x": 1}"#)),
            )
            .await;
        assert_eq!(resp.status, 400);

        let resp = fx
            .server
            .test_request(Method::Get, "/companies/!!", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 400);
        assert_eq!(resp.json_body().unwrap()["message"], "Code must have an input.");
    }

    #[tokio::test]
    async fn test_fault_injection_is_500() {
        let fx = fixture().await;
        fx.server.test_json(Method::Post, "/companies", &goog()).await;

        let resp = fx
            .faulty
            .test_request(Method::Get, "/companies/goog", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 500);
        let body = resp.json_body().unwrap();
        assert!(body.get("error").is_some());
        assert_eq!(body["message"], "Failed to get company: Simulated database error");
    }

    #[tokio::test]
    async fn test_invoice_lookup_failure_omits_invoices() {
        let fx = fixture().await;
        fx.server.test_json(Method::Post, "/companies", &goog()).await;
        fx.db.execute("DROP TABLE invoices").await.unwrap();

        let resp = fx
            .server
            .test_request(Method::Get, "/companies/goog", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 200);
        let company = &resp.json_body().unwrap()["company"];
        assert_eq!(company["code"], "goog");
        assert!(company.get("invoices").is_none());
    }

    #[tokio::test]
    async fn test_update_company() {
        let fx = fixture().await;
        fx.server.test_json(Method::Post, "/companies", &goog()).await;

        let resp = fx
            .server
            .test_json(
                Method::Put,
                "/companies/goog",
                &json!({"name": "Alphabet", "description": "Holding"}),
            )
            .await;
        assert_eq!(resp.status, 200);
        assert_eq!(
            resp.json_body().unwrap()["company"],
            json!({"code": "goog", "name": "Alphabet", "description": "Holding"})
        );

        let missing = fx
            .server
            .test_json(
                Method::Put,
                "/companies/nope",
                &json!({"name": "Nope", "description": "Nope"}),
            )
            .await;
        assert_eq!(missing.status, 400);
        assert_eq!(
            missing.json_body().unwrap()["message"],
            "Failed to update company. Check if Company Code: 'nope' exists"
        );
    }

    #[tokio::test]
    async fn test_delete_cascades_to_invoices() {
        let fx = fixture().await;
        fx.server.test_json(Method::Post, "/companies", &goog()).await;
        fx.server
            .test_json(Method::Post, "/invoices", &json!({"comp_code": "goog", "amt": 50}))
            .await;

        let resp = fx
            .server
            .test_request(Method::Delete, "/companies/goog", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json_body().unwrap(), json!({"status": "deleted"}));

        let remaining: i64 = with_pool!(&fx.db, pool => {
            sqlx::query_scalar("SELECT COUNT(*) FROM invoices").fetch_one(pool).await
        })
        .unwrap();
        assert_eq!(remaining, 0);

        let again = fx
            .server
            .test_request(Method::Delete, "/companies/goog", HashMap::new(), None)
            .await;
        assert_eq!(again.status, 400);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_created_company_is_immediately_readable() {
        let fx = fixture().await;
        for i in 0..50 {
            let code = format!("co{i}");
            let body = json!({"code": code, "name": "Company", "description": "Made"});
            let created = fx.server.test_json(Method::Post, "/companies", &body).await;
            assert_eq!(created.status, 201, "create {code}");

            let path = format!("/companies/{code}");
            let fetched = fx
                .server
                .test_request(Method::Get, &path, HashMap::new(), None)
                .await;
            assert_eq!(fetched.status, 200, "get {code}: {}", fetched.body);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_update_and_delete_are_immediately_visible() {
        let fx = fixture().await;
        for _ in 0..20 {
            fx.server.test_json(Method::Post, "/companies", &goog()).await;
            fx.server
                .test_json(
                    Method::Put,
                    "/companies/goog",
                    &json!({"name": "Alphabet", "description": "Holding"}),
                )
                .await;
            let fetched = fx
                .server
                .test_request(Method::Get, "/companies/goog", HashMap::new(), None)
                .await;
            assert_eq!(fetched.json_body().unwrap()["company"]["name"], "Alphabet");

            let removed = fx
                .server
                .test_request(Method::Delete, "/companies/goog", HashMap::new(), None)
                .await;
            assert_eq!(removed.status, 200);
            let gone = fx
                .server
                .test_request(Method::Get, "/companies/goog", HashMap::new(), None)
                .await;
            assert_eq!(gone.status, 404);
        }
    }

    #[tokio::test]
    async fn test_fault_injection_on_writes() {
        let fx = fixture().await;
        fx.server.test_json(Method::Post, "/companies", &goog()).await;

        let created = fx
            .faulty
            .test_json(
                Method::Post,
                "/companies",
                &json!({"code": "msft", "name": "Microsoft", "description": "Windows"}),
            )
            .await;
        assert_eq!(created.status, 500);
        assert_eq!(
            created.json_body().unwrap()["message"],
            "Failed to create company: Simulated database error"
        );

        let updated = fx
            .faulty
            .test_json(
                Method::Put,
                "/companies/goog",
                &json!({"name": "Alphabet", "description": "Holding"}),
            )
            .await;
        assert_eq!(updated.status, 500);
        assert_eq!(
            updated.json_body().unwrap()["message"],
            "Failed to update company: Simulated database error"
        );

        let removed = fx
            .faulty
            .test_request(Method::Delete, "/companies/goog", HashMap::new(), None)
            .await;
        assert_eq!(removed.status, 500);
        assert_eq!(
            removed.json_body().unwrap()["message"],
            "Failed to delete company: Simulated database error"
        );

        let untouched = fx
            .server
            .test_request(Method::Get, "/companies/goog", HashMap::new(), None)
            .await;
        assert_eq!(untouched.json_body().unwrap()["company"]["name"], "Google");
    }

    #[tokio::test]
    async fn test_encoded_code_is_decoded() {
        let fx = fixture().await;
        fx.server.test_json(Method::Post, "/companies", &goog()).await;

        let resp = fx
            .server
            .test_request(Method::Get, "/companies/go%6Fg", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json_body().unwrap()["company"]["code"], "goog");
    }
}
