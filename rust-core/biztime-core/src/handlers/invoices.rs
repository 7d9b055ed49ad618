//! `/invoices` endpoints.

use super::{deleted, reject_body, reject_params, require_body, storage_fault, wrapped};
use crate::config::AppConfig;
use crate::database::{
    is_check_violation, is_foreign_key_violation, returned_row, storage_error, DatabasePool,
};
use crate::error::{Error, Result};
use crate::models::{Invoice, InvoiceDetail, InvoiceSummary, InvoiceWithCompanyRow};
use crate::request::Request;
use crate::server::Response;
use crate::validation::{clean_field, parse_amount, parse_id, Field};
use crate::with_pool;
use std::sync::Arc;
use tracing::debug;

const INVOICE_COLUMNS: &str = "id, comp_code, amt, paid, add_date, paid_date";

/// Invoice controller bound to the shared pool
#[derive(Debug, Clone)]
pub struct InvoiceHandlers {
    db: DatabasePool,
    config: Arc<AppConfig>,
}

impl InvoiceHandlers {
    /// Create the controller
    #[must_use]
    pub const fn new(db: DatabasePool, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    fn id_param(req: &Request) -> Result<i32> {
        Ok(parse_id(req.param("id").unwrap_or_default())?)
    }

    /// `GET /invoices`
    pub async fn list(&self, req: Request) -> Result<Response> {
        reject_body(&req, "Extra data not allowed for this endpoint.")?;
        reject_params(&req)?;

        let op = "Failed to read invoices";
        storage_fault(&self.config, op)?;
        let invoices = with_pool!(&self.db, pool => {
            sqlx::query_as::<_, InvoiceSummary>("SELECT id, comp_code FROM invoices ORDER BY id")
                .fetch_all(pool)
                .await
        })
        .map_err(|e| storage_error(op, &e))?;

        if invoices.is_empty() {
            return Err(Error::not_found("There are no invoices to retrieve."));
        }
        wrapped("invoices", &invoices)
    }

    /// `GET /invoices/{id}`
    ///
    /// The company is left-joined, so its `code` and `name` may be null.
    pub async fn get(&self, req: Request) -> Result<Response> {
        reject_body(&req, "Extra data not allowed in this endpoint.")?;
        let id = Self::id_param(&req)?;

        let op = "Failed to get invoice";
        storage_fault(&self.config, op)?;
        let row = with_pool!(&self.db, pool => {
            sqlx::query_as::<_, InvoiceWithCompanyRow>(
                "SELECT i.id, i.amt, i.paid, i.add_date, i.paid_date,
                        c.code AS company_code,
                        c.name AS company_name,
                        c.description AS company_description
                 FROM invoices AS i
                 LEFT JOIN companies AS c ON c.code = i.comp_code
                 WHERE i.id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
        })
        .map_err(|e| storage_error(op, &e))?
        .ok_or_else(|| Error::not_found(format!("Invoice not found for ID:{id}")))?;

        wrapped("invoice", &InvoiceDetail::from(row))
    }

    /// `POST /invoices`
    ///
    /// New invoices start unpaid and dated today.
    pub async fn create(&self, req: Request) -> Result<Response> {
        let body = require_body(&req, "Body not found in request.")?;
        let comp_code = clean_field(body.get("comp_code"), Field::Code)?;
        let amt = parse_amount(body.get("amt"))?;

        let op = "Failed to create invoice";
        storage_fault(&self.config, op)?;
        let query = format!(
            "INSERT INTO invoices (comp_code, amt) VALUES ($1, $2) RETURNING {INVOICE_COLUMNS}"
        );
        let invoice = with_pool!(&self.db, pool => {
            sqlx::query_as::<_, Invoice>(&query)
                .bind(comp_code.as_str())
                .bind(amt)
                .fetch_all(pool)
                .await
        })
        .map(returned_row)
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                Error::validation(format!("Company with code '{comp_code}' does not exist"))
            } else if is_check_violation(&e) {
                Error::validation("Amount must be greater than 0.")
            } else {
                storage_error(op, &e)
            }
        })?
        .ok_or_else(|| Error::storage(format!("{op}: no row returned")))?;

        debug!(id = invoice.id, comp_code = %invoice.comp_code, "Invoice created");
        Ok(wrapped("invoice", &invoice)?.with_status(201))
    }

    /// `PUT /invoices/{id}`
    pub async fn update(&self, req: Request) -> Result<Response> {
        let body = require_body(&req, "Updated invoice data not found in request.")?;
        let id = Self::id_param(&req)?;
        let amt = parse_amount(body.get("amt"))?;

        let op = "Failed to update invoice";
        storage_fault(&self.config, op)?;
        let query = format!("UPDATE invoices SET amt = $1 WHERE id = $2 RETURNING {INVOICE_COLUMNS}");
        let invoice = with_pool!(&self.db, pool => {
            sqlx::query_as::<_, Invoice>(&query)
                .bind(amt)
                .bind(id)
                .fetch_all(pool)
                .await
        })
        .map(returned_row)
        .map_err(|e| storage_error(op, &e))?
        .ok_or_else(|| {
            Error::validation(format!(
                "Failed to update invoice. Check if Invoice: '{id}' does not exist."
            ))
        })?;

        wrapped("invoice", &invoice)
    }

    /// `DELETE /invoices/{id}`
    pub async fn delete(&self, req: Request) -> Result<Response> {
        reject_body(&req, "Extra data not allowed in this endpoint.")?;
        let id = Self::id_param(&req)?;

        let op = "Failed to delete invoice";
        storage_fault(&self.config, op)?;
        let removed = with_pool!(&self.db, pool => {
            sqlx::query_scalar::<_, i32>("DELETE FROM invoices WHERE id = $1 RETURNING id")
                .bind(id)
                .fetch_all(pool)
                .await
        })
        .map(returned_row)
        .map_err(|e| storage_error(op, &e))?;

        if removed.is_none() {
            return Err(Error::not_found(
                "Failed to delete Invoice. Check Invoice ID if valid.",
            ));
        }
        deleted()
    }
}
