mod invoice;
mod performance;
mod project_user_mapping;
mod sales_mkt;

pub use invoice::Invoice;
pub use performance::PerformanceRecord;
pub use project_user_mapping::ProjectUserMapping;
pub use sales_mkt::SalesMktRecord;
