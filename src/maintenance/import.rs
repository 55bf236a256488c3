//! CSV bulk-load.
//!
//! A run drops the destination table, recreates it from the CSV header,
//! streams the file through `COPY`, checks the row count and resets the
//! `id` sequence. Every statement commits on its own and the first failure
//! aborts the run.

use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use tokio::io::AsyncReadExt;

use crate::error::{AppError, AppResult};

const COPY_CHUNK_SIZE: usize = 64 * 1024;
const ID_COLUMN: &str = "id";

/// Quote an identifier for interpolation into SQL
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A table name, optionally schema-qualified (`silverman.invoice`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let parts: Vec<&str> = raw.trim().split('.').map(str::trim).collect();
        match parts.as_slice() {
            [name] if !name.is_empty() => Ok(Self {
                schema: None,
                name: name.to_string(),
            }),
            [schema, name] if !schema.is_empty() && !name.is_empty() => Ok(Self {
                schema: Some(schema.to_string()),
                name: name.to_string(),
            }),
            _ => Err(AppError::BadRequest(format!("invalid table name '{}'", raw))),
        }
    }

    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => quote_ident(&self.name),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Serial,
    BigInt,
    Numeric,
    Date,
    Text,
}

impl ColumnType {
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Serial => "BIGSERIAL PRIMARY KEY",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Date => "DATE",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Tracks which types every non-empty value of a column still fits
#[derive(Debug, Clone, Copy)]
struct TypeCandidates {
    seen_value: bool,
    seen_blank: bool,
    /// Some value keeps leading zeros, so it is a code rather than a number
    zero_padded: bool,
    integer: bool,
    numeric: bool,
    date: bool,
}

impl Default for TypeCandidates {
    fn default() -> Self {
        Self {
            seen_value: false,
            seen_blank: false,
            zero_padded: false,
            integer: true,
            numeric: true,
            date: true,
        }
    }
}

impl TypeCandidates {
    fn observe(&mut self, raw: &str) {
        let value = raw.trim();
        if value.is_empty() {
            self.seen_blank = true;
            return;
        }
        self.seen_value = true;
        self.zero_padded |= is_zero_padded(value);
        if self.integer {
            self.integer = value.parse::<i64>().is_ok();
        }
        if self.numeric {
            self.numeric = looks_numeric(value);
        }
        if self.date {
            self.date = NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
        }
    }

    fn resolve(self) -> ColumnType {
        match self {
            TypeCandidates { seen_value: false, .. } => ColumnType::Text,
            TypeCandidates { zero_padded: false, integer: true, .. } => ColumnType::BigInt,
            TypeCandidates { zero_padded: false, numeric: true, .. } => ColumnType::Numeric,
            TypeCandidates { date: true, .. } => ColumnType::Date,
            _ => ColumnType::Text,
        }
    }
}

fn is_zero_padded(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value).as_bytes();
    matches!(digits, [b'0', next, ..] if next.is_ascii_digit())
}

fn looks_numeric(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        && value.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Infer the column type from its values; empty values are ignored
pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidates = TypeCandidates::default();
    for value in values {
        candidates.observe(value);
    }
    candidates.resolve()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

/// Everything needed to run an import, derived from one pass over the file
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPlan {
    pub table: TableName,
    pub columns: Vec<ColumnDef>,
    /// Whether the CSV supplies its own `id` column
    pub has_id_column: bool,
    pub data_rows: u64,
}

impl ImportPlan {
    pub fn from_reader<R: Read>(table: TableName, reader: R) -> AppResult<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        if headers.is_empty() {
            return Err(AppError::InvalidHeader(format!("{} has no columns", table)));
        }
        let mut seen = HashSet::new();
        for header in &headers {
            if header.is_empty() {
                return Err(AppError::InvalidHeader(format!("{} has an empty column name", table)));
            }
            if !seen.insert(header.as_str()) {
                return Err(AppError::InvalidHeader(format!(
                    "{} repeats column '{}'",
                    table, header
                )));
            }
        }

        let mut candidates = vec![TypeCandidates::default(); headers.len()];
        let mut data_rows = 0u64;
        for record in csv_reader.records() {
            let record = record?;
            for (slot, value) in candidates.iter_mut().zip(record.iter()) {
                slot.observe(value);
            }
            data_rows += 1;
        }

        let mut has_id_column = false;
        let mut columns = Vec::with_capacity(headers.len() + 1);
        for (name, candidate) in headers.into_iter().zip(candidates) {
            let column_type = if name.eq_ignore_ascii_case(ID_COLUMN) {
                if candidate.seen_blank {
                    return Err(AppError::InvalidHeader(format!(
                        "{}: column '{}' has blank values",
                        table, name
                    )));
                }
                if !candidate.integer {
                    return Err(AppError::InvalidHeader(format!(
                        "{}: column '{}' must hold integers",
                        table, name
                    )));
                }
                has_id_column = true;
                ColumnType::Serial
            } else {
                candidate.resolve()
            };
            columns.push(ColumnDef { name, column_type });
        }

        Ok(Self {
            table,
            columns,
            has_id_column,
            data_rows,
        })
    }

    pub fn from_path(table: TableName, path: &Path) -> AppResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(table, std::io::BufReader::new(file))
    }

    fn id_column(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.column_type == ColumnType::Serial)
            .map(|c| c.name.as_str())
            .unwrap_or(ID_COLUMN)
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.table.quoted())
    }

    pub fn create_sql(&self) -> String {
        let mut defs: Vec<String> = Vec::with_capacity(self.columns.len() + 1);
        if !self.has_id_column {
            defs.push(format!("{} {}", quote_ident(ID_COLUMN), ColumnType::Serial.sql()));
        }
        defs.extend(
            self.columns
                .iter()
                .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.sql())),
        );
        format!("CREATE TABLE {} ({})", self.table.quoted(), defs.join(", "))
    }

    /// COPY statement listing the CSV columns in header order
    pub fn copy_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_ident(&c.name)).collect();
        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT csv, HEADER true)",
            self.table.quoted(),
            columns.join(", ")
        )
    }

    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {}", self.table.quoted())
    }

    /// Point the id sequence at the highest id; an empty table restarts at 1
    pub fn reset_sequence_sql(&self) -> String {
        format!(
            "SELECT setval(pg_get_serial_sequence($1, $2), GREATEST(COALESCE(MAX({id}), 0), 1), COUNT(*) > 0) FROM {table}",
            id = quote_ident(self.id_column()),
            table = self.table.quoted()
        )
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportReport {
    pub table: String,
    pub rows: u64,
    pub sequence_value: i64,
}

/// Run the drop/create/copy/verify/reset sequence for `plan` with `path` as input
pub async fn run_import(pool: &PgPool, plan: &ImportPlan, path: &Path) -> AppResult<ImportReport> {
    let table = plan.table.to_string();

    if let Some(schema) = &plan.table.schema {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema)))
            .execute(pool)
            .await?;
    }

    sqlx::query(&plan.drop_sql()).execute(pool).await?;
    tracing::info!(%table, "dropped table");

    sqlx::query(&plan.create_sql()).execute(pool).await?;
    tracing::info!(%table, columns = plan.columns.len(), "created table");

    let copied = copy_file(pool, &plan.copy_sql(), path).await?;
    tracing::info!(%table, copied, "copied rows");

    let count: i64 = sqlx::query_scalar(&plan.count_sql()).fetch_one(pool).await?;
    let count = count.max(0) as u64;
    if count != plan.data_rows {
        return Err(AppError::RowCountMismatch {
            table,
            expected: plan.data_rows,
            actual: count,
        });
    }

    let sequence_value: i64 = sqlx::query_scalar(&plan.reset_sequence_sql())
        .bind(plan.table.quoted())
        .bind(plan.id_column())
        .fetch_one(pool)
        .await?;
    tracing::info!(%table, sequence_value, "reset id sequence");

    Ok(ImportReport {
        table,
        rows: count,
        sequence_value,
    })
}

async fn copy_file(pool: &PgPool, statement: &str, path: &Path) -> AppResult<u64> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut conn = pool.acquire().await?;
    let mut copy = conn.copy_in_raw(statement).await?;
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];

    loop {
        let read = match file.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                copy.abort(e.to_string()).await?;
                return Err(e.into());
            }
        };
        copy.send(&buf[..read]).await?;
    }

    Ok(copy.finish().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(table: &str, csv: &str) -> AppResult<ImportPlan> {
        ImportPlan::from_reader(TableName::parse(table).unwrap(), csv.as_bytes())
    }

    #[test]
    fn counts_data_rows_excluding_header() {
        let plan = plan(
            "sales_mkt",
            "project_code,month,channel,mkt_expense\nC01,2025-01,Facebook,100\nC01,2025-01,Line,50.5\nC02,2025-02,\"Radio, FM\",\n",
        )
        .unwrap();
        assert_eq!(plan.data_rows, 3);
        assert!(!plan.has_id_column);
        let types: Vec<ColumnType> = plan.columns.iter().map(|c| c.column_type).collect();
        assert_eq!(
            types,
            vec![ColumnType::Text, ColumnType::Text, ColumnType::Text, ColumnType::Numeric]
        );
    }

    #[test]
    fn infers_column_types() {
        assert_eq!(infer_column_type(["1", "", "-42"]), ColumnType::BigInt);
        assert_eq!(infer_column_type(["1", "2.5"]), ColumnType::Numeric);
        assert_eq!(infer_column_type(["2025-01-31", ""]), ColumnType::Date);
        assert_eq!(infer_column_type(["2025-01-31", "soon"]), ColumnType::Text);
        assert_eq!(infer_column_type(["", " "]), ColumnType::Text);
        assert_eq!(infer_column_type(["inf", "NaN"]), ColumnType::Text);
        assert_eq!(infer_column_type(["1,234"]), ColumnType::Text);
    }

    #[test]
    fn zero_padded_codes_stay_text() {
        assert_eq!(infer_column_type(["001", "002", "010"]), ColumnType::Text);
        assert_eq!(infer_column_type(["12", "-007"]), ColumnType::Text);
        assert_eq!(infer_column_type(["00.5"]), ColumnType::Text);
        assert_eq!(infer_column_type(["0", "10"]), ColumnType::BigInt);
        assert_eq!(infer_column_type(["0.5", "-0.25"]), ColumnType::Numeric);
    }

    #[test]
    fn blank_id_values_abort_the_plan() {
        for csv in ["id,b
,2
,3
", "id,b
1,2
 ,3
"] {
            match plan("t", csv) {
                Err(AppError::InvalidHeader(message)) => assert!(message.contains("blank")),
                other => panic!("expected blank id rejection for {:?}, got {:?}", csv, other),
            }
        }
        // a header-only file still plans
        assert!(plan("t", "id,b
").unwrap().has_id_column);
    }

    #[test]
    fn builds_statements_with_surrogate_id() {
        let plan = plan("Performance2025", "bud,project_code,quarter\nCD,C01,1\n").unwrap();

        assert_eq!(plan.drop_sql(), r#"DROP TABLE IF EXISTS "Performance2025""#);
        assert_eq!(
            plan.create_sql(),
            r#"CREATE TABLE "Performance2025" ("id" BIGSERIAL PRIMARY KEY, "bud" TEXT, "project_code" TEXT, "quarter" BIGINT)"#
        );
        assert_eq!(
            plan.copy_sql(),
            r#"COPY "Performance2025" ("bud", "project_code", "quarter") FROM STDIN WITH (FORMAT csv, HEADER true)"#
        );
        assert!(plan.reset_sequence_sql().contains(r#"MAX("id")"#));
    }

    #[test]
    fn keeps_supplied_id_column_in_place() {
        let plan = plan("silverman.invoice", "name,ID,total\nA,7,1.5\nB,9,2\n").unwrap();

        assert!(plan.has_id_column);
        assert_eq!(plan.columns[1].column_type, ColumnType::Serial);
        assert_eq!(
            plan.create_sql(),
            r#"CREATE TABLE "silverman"."invoice" ("name" TEXT, "ID" BIGSERIAL PRIMARY KEY, "total" NUMERIC)"#
        );
        assert!(plan.copy_sql().contains(r#"("name", "ID", "total")"#));
        assert_eq!(plan.id_column(), "ID");
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(matches!(
            plan("t", "a,,c\n1,2,3\n"),
            Err(AppError::InvalidHeader(_))
        ));
        assert!(matches!(
            plan("t", "a,b,a\n1,2,3\n"),
            Err(AppError::InvalidHeader(_))
        ));
        assert!(matches!(
            plan("t", "id,b\nx,2\n"),
            Err(AppError::InvalidHeader(_))
        ));
    }

    #[test]
    fn ragged_rows_abort_the_plan() {
        assert!(matches!(plan("t", "a,b\n1,2\n3\n"), Err(AppError::Csv(_))));
    }

    #[test]
    fn strips_byte_order_mark_and_quotes_identifiers() {
        let plan = plan("t", "\u{feff}say \"hi\",b\n1,2\n").unwrap();
        assert_eq!(plan.columns[0].name, "say \"hi\"");
        assert_eq!(quote_ident(&plan.columns[0].name), r#""say ""hi""""#);
    }

    #[test]
    fn parses_table_names() {
        let qualified = TableName::parse("silverman.invoice").unwrap();
        assert_eq!(qualified.quoted(), r#""silverman"."invoice""#);
        assert_eq!(qualified.to_string(), "silverman.invoice");
        assert!(TableName::parse("a.b.c").is_err());
        assert!(TableName::parse(" ").is_err());
    }
}
