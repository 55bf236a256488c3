use serde::Serialize;

/// Marketing spend and funnel counts for one channel in one month
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Default)]
pub struct SalesMktRecord {
    pub project_code: String,
    pub month: String,
    pub channel: String,
    pub mkt_expense: f64,
    pub total_leads: f64,
    pub walk_in: f64,
    pub booking: f64,
}
