use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{Invoice, PerformanceRecord, ProjectUserMapping, SalesMktRecord};
use crate::rollup::RoleType;

const INVOICE_COLUMNS: &str = r#"
    id::text AS id,
    issued_date::date AS issued_date,
    due_date::date AS due_date,
    paid_date::date AS paid_date,
    COALESCE(status::text, '') AS status,
    COALESCE(total::float8, 0.0) AS total,
    site_id::text AS site_id,
    name::text AS name
"#;

const PERFORMANCE_COLUMNS: &str = r#"
    COALESCE(bud::text, '') AS bud,
    project_code::text AS project_code,
    project_name::text AS project_name,
    COALESCE(quarter::int, 0) AS quarter,
    COALESCE(booking_target::float8, 0.0) AS booking_target,
    COALESCE(booking_actual::float8, 0.0) AS booking_actual,
    COALESCE(revenue_target::float8, 0.0) AS revenue_target,
    COALESCE(revenue_actual::float8, 0.0) AS revenue_actual,
    COALESCE(mkt_expense_target::float8, 0.0) AS mkt_expense_target,
    COALESCE(mkt_expense_actual::float8, 0.0) AS mkt_expense_actual,
    COALESCE(leads_target::float8, 0.0) AS leads_target,
    COALESCE(leads_actual::float8, 0.0) AS leads_actual
"#;

/// Filters pushed down into the invoice query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceFilter {
    pub site_id: Option<String>,
    pub year: Option<i32>,
    pub search: Option<String>,
}

/// ILIKE pattern matching `term` anywhere, with `%` and `_` taken literally
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Database connection pool
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new Database instance with a connection pool
    pub async fn new(config: &Config) -> Result<Self> {
        Self::with_max_connections(config, config.db_max_connections).await
    }

    /// Create a pool holding at most `max_connections` connections
    pub async fn with_max_connections(config: &Config, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
            .connect(config.database_url())
            .await?;

        Ok(Self { pool })
    }

    /// Create a pool that connects on first use
    pub fn connect_lazy(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
            .connect_lazy(config.database_url())?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    // Common fee (invoice) queries
    pub async fn get_invoices(&self, filter: &InvoiceFilter) -> AppResult<Vec<Invoice>> {
        let sql = format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM silverman.invoice
            WHERE due_date IS NOT NULL
              AND ($1::text IS NULL OR site_id::text = $1)
              AND ($2::int IS NULL OR EXTRACT(YEAR FROM issued_date)::int = $2)
              AND ($3::text IS NULL
                   OR name::text ILIKE $3
                   OR id::text ILIKE $3)
            "#
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(filter.site_id.as_deref())
            .bind(filter.year)
            .bind(filter.search.as_deref().map(contains_pattern))
            .fetch_all(self.get_pool())
            .await?;

        Ok(invoices)
    }

    pub async fn get_invoice_sites(&self) -> AppResult<Vec<String>> {
        let sites = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT site_id::text
            FROM silverman.invoice
            WHERE site_id IS NOT NULL
            ORDER BY 1 ASC
            "#,
        )
        .fetch_all(self.get_pool())
        .await?;

        Ok(sites)
    }

    pub async fn get_invoice_years(&self) -> AppResult<Vec<i32>> {
        let years = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT DISTINCT EXTRACT(YEAR FROM issued_date)::int
            FROM silverman.invoice
            WHERE issued_date IS NOT NULL
            ORDER BY 1 DESC
            "#,
        )
        .fetch_all(self.get_pool())
        .await?;

        Ok(years)
    }

    // Sales performance queries
    pub async fn get_sale_mappings(&self, role: RoleType) -> AppResult<Vec<ProjectUserMapping>> {
        let mappings = sqlx::query_as::<_, ProjectUserMapping>(
            r#"
            SELECT
                project_code::text AS project_code,
                COALESCE(department::text, '') AS department,
                COALESCE(role_type::text, '') AS role_type,
                COALESCE("position"::text, '') AS position,
                COALESCE(name::text, '') AS name,
                COALESCE(month::text, '') AS month
            FROM "Project_User_Mapping"
            WHERE department ILIKE 'sale%'
              AND UPPER(TRIM(role_type)) = $1
              AND project_code IS NOT NULL
            ORDER BY name ASC, "position" ASC
            "#,
        )
        .bind(role.as_str())
        .fetch_all(self.get_pool())
        .await?;

        Ok(mappings)
    }

    pub async fn get_performance_for_projects(
        &self,
        project_codes: &[String],
    ) -> AppResult<Vec<PerformanceRecord>> {
        if project_codes.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT {PERFORMANCE_COLUMNS}
            FROM "Performance2025"
            WHERE project_code::text = ANY($1)
            ORDER BY project_code ASC, quarter ASC
            "#
        );
        let records = sqlx::query_as::<_, PerformanceRecord>(&sql)
            .bind(project_codes)
            .fetch_all(self.get_pool())
            .await?;

        Ok(records)
    }

    pub async fn get_all_performance(&self) -> AppResult<Vec<PerformanceRecord>> {
        let sql = format!(
            r#"
            SELECT {PERFORMANCE_COLUMNS}
            FROM "Performance2025"
            WHERE project_code IS NOT NULL
            ORDER BY bud ASC, project_code ASC, quarter ASC
            "#
        );
        let records = sqlx::query_as::<_, PerformanceRecord>(&sql)
            .fetch_all(self.get_pool())
            .await?;

        Ok(records)
    }

    // Marketing queries
    pub async fn get_sales_mkt(
        &self,
        project_code: Option<&str>,
        month_prefix: Option<&str>,
    ) -> AppResult<Vec<SalesMktRecord>> {
        let records = sqlx::query_as::<_, SalesMktRecord>(
            r#"
            SELECT
                COALESCE(project_code::text, '') AS project_code,
                COALESCE(month::text, '') AS month,
                COALESCE(channel::text, '') AS channel,
                COALESCE(mkt_expense::float8, 0.0) AS mkt_expense,
                COALESCE(total_leads::float8, 0.0) AS total_leads,
                COALESCE(walk_in::float8, 0.0) AS walk_in,
                COALESCE(booking::float8, 0.0) AS booking
            FROM sales_mkt
            WHERE ($1::text IS NULL OR project_code::text = $1)
              AND ($2::text IS NULL OR month::text LIKE $2 || '%')
            "#,
        )
        .bind(project_code)
        .bind(month_prefix)
        .fetch_all(self.get_pool())
        .await?;

        Ok(records)
    }
}

/// Connect the shared pool used by the API
pub async fn init(config: &Config) -> Result<Database> {
    let db = Database::new(config).await?;
    tracing::info!(
        max_connections = config.db_max_connections,
        "database connection established"
    );
    Ok(db)
}
