use serde::Serialize;

/// Quarterly KPI targets and actuals for a project
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Default)]
pub struct PerformanceRecord {
    pub bud: String,
    pub project_code: String,
    pub project_name: Option<String>,
    pub quarter: i32,
    pub booking_target: f64,
    pub booking_actual: f64,
    pub revenue_target: f64,
    pub revenue_actual: f64,
    pub mkt_expense_target: f64,
    pub mkt_expense_actual: f64,
    pub leads_target: f64,
    pub leads_actual: f64,
}
