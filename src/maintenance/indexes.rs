use sqlx::PgPool;

use crate::error::AppResult;

/// An index backing one of the report queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static str,
}

impl IndexSpec {
    pub fn create_sql(&self) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            self.name, self.table, self.columns
        )
    }
}

pub const REPORT_INDEXES: &[IndexSpec] = &[
    IndexSpec {
        name: "idx_invoice_due_date",
        table: "silverman.invoice",
        columns: "due_date",
    },
    IndexSpec {
        name: "idx_invoice_issued_date",
        table: "silverman.invoice",
        columns: "issued_date",
    },
    IndexSpec {
        name: "idx_invoice_site_id",
        table: "silverman.invoice",
        columns: "site_id",
    },
    IndexSpec {
        name: "idx_project_user_mapping_project_code",
        table: r#""Project_User_Mapping""#,
        columns: "project_code",
    },
    IndexSpec {
        name: "idx_project_user_mapping_department_role",
        table: r#""Project_User_Mapping""#,
        columns: "department, role_type",
    },
    IndexSpec {
        name: "idx_performance2025_project_quarter",
        table: r#""Performance2025""#,
        columns: "project_code, quarter",
    },
    IndexSpec {
        name: "idx_sales_mkt_project_code",
        table: "sales_mkt",
        columns: "project_code",
    },
];

/// Create every report index, stopping at the first failure
pub async fn create_indexes(pool: &PgPool) -> AppResult<usize> {
    for index in REPORT_INDEXES {
        sqlx::query(&index.create_sql()).execute(pool).await?;
        tracing::info!(index = index.name, table = index.table, "index ready");
    }
    Ok(REPORT_INDEXES.len())
}
