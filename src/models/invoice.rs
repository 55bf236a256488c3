use chrono::NaiveDate;
use serde::Serialize;

/// One billing document from `silverman.invoice`
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub issued_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub status: String,
    pub total: f64,
    pub site_id: Option<String>,
    pub name: Option<String>,
}

impl Invoice {
    /// Whether the invoice has been settled in full
    pub fn is_fully_paid(&self) -> bool {
        self.paid_date.is_some() || self.status.trim().eq_ignore_ascii_case("paid")
    }
}
