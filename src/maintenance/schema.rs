use std::fmt::Write;

use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppResult;

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct ColumnInfo {
    pub table_schema: String,
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub ordinal_position: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

pub async fn fetch_columns(pool: &PgPool, schema: Option<&str>) -> AppResult<Vec<ColumnInfo>> {
    let columns = sqlx::query_as::<_, ColumnInfo>(
        r#"
        SELECT
            table_schema::text AS table_schema,
            table_name::text AS table_name,
            column_name::text AS column_name,
            data_type::text AS data_type,
            (is_nullable = 'YES') AS is_nullable,
            ordinal_position::int AS ordinal_position
        FROM information_schema.columns
        WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
          AND table_schema NOT LIKE 'pg_toast%'
          AND ($1::text IS NULL OR table_schema = $1)
        ORDER BY table_schema, table_name, ordinal_position
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    Ok(columns)
}

/// Group ordered column rows into tables
pub fn group_columns(columns: Vec<ColumnInfo>) -> Vec<TableInfo> {
    let mut tables: Vec<TableInfo> = Vec::new();
    for column in columns {
        match tables.last_mut() {
            Some(table)
                if table.schema == column.table_schema && table.name == column.table_name =>
            {
                table.columns.push(column);
            }
            _ => tables.push(TableInfo {
                schema: column.table_schema.clone(),
                name: column.table_name.clone(),
                columns: vec![column],
            }),
        }
    }
    tables
}

pub fn render(tables: &[TableInfo]) -> String {
    let mut out = String::new();
    for table in tables {
        let _ = writeln!(out, "{}.{} ({} columns)", table.schema, table.name, table.columns.len());
        for column in &table.columns {
            let _ = writeln!(
                out,
                "  {:<32} {}{}",
                column.column_name,
                column.data_type,
                if column.is_nullable { "" } else { " NOT NULL" }
            );
        }
    }
    out
}

pub async fn explore(pool: &PgPool, schema: Option<&str>) -> AppResult<Vec<TableInfo>> {
    let columns = fetch_columns(pool, schema).await?;
    tracing::debug!(columns = columns.len(), "fetched column metadata");
    Ok(group_columns(columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(schema: &str, table: &str, name: &str, position: i32) -> ColumnInfo {
        ColumnInfo {
            table_schema: schema.to_string(),
            table_name: table.to_string(),
            column_name: name.to_string(),
            data_type: "text".to_string(),
            is_nullable: position != 1,
            ordinal_position: position,
        }
    }

    #[test]
    fn groups_consecutive_rows_by_table() {
        let tables = group_columns(vec![
            column("public", "sales_mkt", "id", 1),
            column("public", "sales_mkt", "channel", 2),
            column("silverman", "invoice", "id", 1),
        ]);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].columns.len(), 2);
        assert_eq!(tables[1].schema, "silverman");
    }

    #[test]
    fn renders_nullability() {
        let tables = group_columns(vec![
            column("silverman", "invoice", "id", 1),
            column("silverman", "invoice", "status", 2),
        ]);
        let text = render(&tables);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "silverman.invoice (2 columns)");
        assert!(lines[1].trim_end().ends_with("text NOT NULL"));
        assert!(lines[2].trim_end().ends_with("text"));
    }
}
