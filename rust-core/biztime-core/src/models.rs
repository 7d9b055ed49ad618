//! Row types for the `companies` and `invoices` tables.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

/// `(code, name)` pair returned by the company listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CompanySummary {
    /// Company code
    pub code: String,
    /// Company name
    pub name: String,
}

/// Full company row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Company {
    /// Company code (primary key)
    pub code: String,
    /// Company name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
}

/// Invoice id attached to a company lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromRow)]
pub struct InvoiceRef {
    /// Invoice id
    pub id: i32,
}

/// Company with its invoice ids
///
/// `invoices` is omitted from the JSON when the best-effort invoice lookup
/// failed.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyDetail {
    /// The company row
    #[serde(flatten)]
    pub company: Company,
    /// Ids of the company's invoices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoices: Option<Vec<InvoiceRef>>,
}

/// `(id, comp_code)` pair returned by the invoice listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct InvoiceSummary {
    /// Invoice id
    pub id: i32,
    /// Owning company code
    pub comp_code: String,
}

/// Full invoice row
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Invoice {
    /// Invoice id
    pub id: i32,
    /// Owning company code
    pub comp_code: String,
    /// Amount, always positive
    pub amt: f64,
    /// Whether the invoice has been paid
    pub paid: bool,
    /// Creation date
    pub add_date: NaiveDate,
    /// Payment date, if paid
    pub paid_date: Option<NaiveDate>,
}

/// Invoice joined with its (possibly missing) company
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct InvoiceWithCompanyRow {
    /// Invoice id
    pub id: i32,
    /// Amount
    pub amt: f64,
    /// Paid flag
    pub paid: bool,
    /// Creation date
    pub add_date: NaiveDate,
    /// Payment date
    pub paid_date: Option<NaiveDate>,
    /// Joined company code
    pub company_code: Option<String>,
    /// Joined company name
    pub company_name: Option<String>,
    /// Joined company description
    pub company_description: Option<String>,
}

/// Company block nested inside an invoice response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceCompany {
    /// Company code, absent when the join found nothing
    pub code: Option<String>,
    /// Company name, absent when the join found nothing
    pub name: Option<String>,
    /// Description, empty when null
    pub description: String,
}

/// Invoice response body with the nested company
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceDetail {
    /// Invoice id
    pub id: i32,
    /// Amount
    pub amt: f64,
    /// Paid flag
    pub paid: bool,
    /// Creation date
    pub add_date: NaiveDate,
    /// Payment date
    pub paid_date: Option<NaiveDate>,
    /// Owning company
    pub company: InvoiceCompany,
}

impl From<InvoiceWithCompanyRow> for InvoiceDetail {
    fn from(row: InvoiceWithCompanyRow) -> Self {
        Self {
            id: row.id,
            amt: row.amt,
            paid: row.paid,
            add_date: row.add_date,
            paid_date: row.paid_date,
            company: InvoiceCompany {
                code: row.company_code,
                name: row.company_name,
                description: row.company_description.unwrap_or_default(),
            },
        }
    }
}
