//! One-off maintenance commands: CSV import, index creation, schema listing.
//!
//! Each command opens its own pool of a single connection, so all of its
//! statements run one after another.

pub mod import;
pub mod indexes;
pub mod schema;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::db::Database;

use self::import::{ImportPlan, ImportReport, TableName};
use self::schema::TableInfo;

async fn connect_single(config: &Config) -> Result<Database> {
    Database::with_max_connections(config, 1)
        .await
        .context("failed to connect to database")
}

/// Load `<csv_dir>/<table>.csv` into `table`, replacing it
pub async fn import_csv(config: &Config, table: &str) -> Result<ImportReport> {
    let table = TableName::parse(table)?;
    let path = config.csv_path(&table.to_string());
    let plan = ImportPlan::from_path(table, &path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    tracing::info!(
        table = %plan.table,
        path = %path.display(),
        rows = plan.data_rows,
        "starting csv import"
    );

    let db = connect_single(config).await?;
    let report = import::run_import(db.get_pool(), &plan, &path)
        .await
        .with_context(|| format!("import of {} failed", plan.table))?;

    Ok(report)
}

pub async fn create_indexes(config: &Config) -> Result<usize> {
    let db = connect_single(config).await?;
    Ok(indexes::create_indexes(db.get_pool()).await?)
}

pub async fn explore_schema(config: &Config, only_schema: Option<&str>) -> Result<Vec<TableInfo>> {
    let db = connect_single(config).await?;
    Ok(schema::explore(db.get_pool(), only_schema).await?)
}
