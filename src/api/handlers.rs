use std::collections::BTreeSet;
use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::aging::{AgingOptions, AgingReport};
use crate::api::AppState;
use crate::db::InvoiceFilter;
use crate::error::{AppError, AppResult};
use crate::marketing::{build_channel_report, ChannelReport};
use crate::rollup::{build_bud_rollups, build_person_rollups, BudRollup, PersonRollup, RoleType};
use crate::settings::DashboardSettings;
use crate::views::{self, ChartData, Kpi};

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional numeric query value; blank means absent
fn parse_number<T: FromStr>(field: &str, value: Option<String>) -> AppResult<Option<T>> {
    non_empty(value)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| AppError::BadRequest(format!("invalid {} '{}'", field, raw)))
        })
        .transpose()
}

// =============================================================================
// COMMON FEE
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AgingQuery {
    pub site_id: Option<String>,
    pub year: Option<String>,
    /// One of 0-30, 31-60, 61-90, 91-180, 181-360, 360+
    pub bucket: Option<String>,
    /// Matched against invoice id and name
    pub search: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl AgingQuery {
    /// Validate the raw query into listing options and a database filter
    pub fn into_parts(self) -> AppResult<(AgingOptions, InvoiceFilter)> {
        let options = AgingOptions::parse(
            self.bucket.as_deref(),
            self.sort_by.as_deref(),
            self.sort_order.as_deref(),
            parse_number("limit", self.limit)?,
            parse_number("offset", self.offset)?,
        )?;
        let filter = InvoiceFilter {
            site_id: non_empty(self.site_id),
            year: parse_number("year", self.year)?,
            search: non_empty(self.search),
        };
        Ok((options, filter))
    }
}

#[derive(Debug, Serialize)]
pub struct AgingResponse {
    pub as_of: NaiveDate,
    #[serde(flatten)]
    pub report: AgingReport,
    pub chart: ChartData,
}

pub async fn aging_handler(
    State(state): State<AppState>,
    Query(query): Query<AgingQuery>,
) -> AppResult<Json<AgingResponse>> {
    let (options, filter) = query.into_parts()?;

    let invoices = state.db.get_invoices(&filter).await?;
    let today = Local::now().date_naive();
    let report = AgingReport::build(invoices, today, &options);
    tracing::debug!(
        outstanding = report.summary.total_count,
        listed = report.invoices.len(),
        "built aging report"
    );

    Ok(Json(AgingResponse {
        as_of: today,
        chart: views::aging_chart(&report.summary),
        report,
    }))
}

pub async fn sites_handler(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.db.get_invoice_sites().await?))
}

pub async fn years_handler(State(state): State<AppState>) -> AppResult<Json<Vec<i32>>> {
    Ok(Json(state.db.get_invoice_years().await?))
}

// =============================================================================
// SALES 2025
// =============================================================================

#[derive(Debug, Serialize)]
pub struct RollupListResponse {
    pub role_type: RoleType,
    pub people: Vec<PersonRollup>,
}

#[derive(Debug, Serialize)]
pub struct PersonView {
    #[serde(flatten)]
    pub rollup: PersonRollup,
    pub booking_chart: ChartData,
    pub revenue_chart: ChartData,
}

#[derive(Debug, Serialize)]
pub struct PersonDetailResponse {
    pub name: String,
    pub role_type: RoleType,
    /// One entry per position the person holds
    pub positions: Vec<PersonView>,
}

async fn load_rollups(
    state: &AppState,
    role: RoleType,
    name: Option<&str>,
) -> AppResult<Vec<PersonRollup>> {
    let mut mappings = state.db.get_sale_mappings(role).await?;
    if let Some(name) = name {
        mappings.retain(|m| m.name.trim().eq_ignore_ascii_case(name));
    }

    let project_codes: Vec<String> = mappings
        .iter()
        .map(|m| m.project_code.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let performance = state.db.get_performance_for_projects(&project_codes).await?;

    Ok(build_person_rollups(role, &mappings, &performance))
}

async fn role_rollups(state: AppState, role: RoleType) -> AppResult<Json<RollupListResponse>> {
    let people = load_rollups(&state, role, None).await?;
    Ok(Json(RollupListResponse {
        role_type: role,
        people,
    }))
}

async fn person_detail(
    state: AppState,
    role: RoleType,
    name: String,
) -> AppResult<Json<PersonDetailResponse>> {
    let wanted = name.trim();
    if wanted.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }

    let rollups = load_rollups(&state, role, Some(wanted)).await?;
    if rollups.is_empty() {
        return Err(AppError::NotFound(format!("{} '{}'", role, wanted)));
    }

    let positions = rollups
        .into_iter()
        .map(|rollup| PersonView {
            booking_chart: views::quarterly_chart(&rollup.quarters, Kpi::Booking),
            revenue_chart: views::quarterly_chart(&rollup.quarters, Kpi::Revenue),
            rollup,
        })
        .collect::<Vec<_>>();

    Ok(Json(PersonDetailResponse {
        name: positions[0].rollup.name.clone(),
        role_type: role,
        positions,
    }))
}

pub async fn vp_rollups_handler(
    State(state): State<AppState>,
) -> AppResult<Json<RollupListResponse>> {
    role_rollups(state, RoleType::Vp).await
}

pub async fn mgr_rollups_handler(
    State(state): State<AppState>,
) -> AppResult<Json<RollupListResponse>> {
    role_rollups(state, RoleType::Mgr).await
}

pub async fn vp_detail_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<PersonDetailResponse>> {
    person_detail(state, RoleType::Vp, name).await
}

pub async fn mgr_detail_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<PersonDetailResponse>> {
    person_detail(state, RoleType::Mgr, name).await
}

#[derive(Debug, Serialize)]
pub struct BudRollupResponse {
    pub buds: Vec<BudRollup>,
}

pub async fn bud_rollups_handler(
    State(state): State<AppState>,
) -> AppResult<Json<BudRollupResponse>> {
    let performance = state.db.get_all_performance().await?;
    Ok(Json(BudRollupResponse {
        buds: build_bud_rollups(&performance),
    }))
}

// =============================================================================
// SALES MARKETING
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ChannelQuery {
    pub project_code: Option<String>,
    /// Prefix of the month column, e.g. `2025` or `2025-03`
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    #[serde(flatten)]
    pub report: ChannelReport,
    pub chart: ChartData,
}

pub async fn channels_handler(
    State(state): State<AppState>,
    Query(query): Query<ChannelQuery>,
) -> AppResult<Json<ChannelResponse>> {
    let project_code = non_empty(query.project_code);
    let month = non_empty(query.month);

    let records = state
        .db
        .get_sales_mkt(project_code.as_deref(), month.as_deref())
        .await?;
    let report = build_channel_report(&records);

    Ok(Json(ChannelResponse {
        chart: views::channel_chart(&report),
        report,
    }))
}

// =============================================================================
// SETTINGS
// =============================================================================

pub async fn get_settings_handler(
    State(state): State<AppState>,
) -> AppResult<Json<DashboardSettings>> {
    Ok(Json(state.settings.load().await?))
}

pub async fn put_settings_handler(
    State(state): State<AppState>,
    Json(settings): Json<DashboardSettings>,
) -> AppResult<Json<DashboardSettings>> {
    state.settings.save(&settings).await?;
    Ok(Json(settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filters_are_dropped() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" S01 ".to_string())), Some("S01".to_string()));
        assert_eq!(non_empty(None), None);
    }

    fn query(pairs: &[(&str, &str)]) -> AgingQuery {
        let mut query = AgingQuery::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "site_id" => query.site_id = value,
                "year" => query.year = value,
                "bucket" => query.bucket = value,
                "search" => query.search = value,
                "limit" => query.limit = value,
                "offset" => query.offset = value,
                other => panic!("unexpected key {}", other),
            }
        }
        query
    }

    #[test]
    fn blank_numeric_filters_mean_unset() {
        let (options, filter) = query(&[("site_id", ""), ("year", ""), ("limit", " "), ("offset", "")])
            .into_parts()
            .unwrap();
        assert_eq!(options, AgingOptions::default());
        assert_eq!(filter, InvoiceFilter::default());
    }

    #[test]
    fn numeric_filters_are_parsed() {
        let (options, filter) = query(&[("year", " 2025 "), ("limit", "20"), ("offset", "40")])
            .into_parts()
            .unwrap();
        assert_eq!(filter.year, Some(2025));
        assert_eq!(options.limit, 20);
        assert_eq!(options.offset, 40);
    }

    #[test]
    fn malformed_numbers_are_bad_requests() {
        for (key, value) in [("year", "last"), ("limit", "ten"), ("offset", "1.5")] {
            match query(&[(key, value)]).into_parts() {
                Err(AppError::BadRequest(message)) => {
                    assert!(message.contains(key) && message.contains(value))
                }
                other => panic!("expected bad request for {}={}, got {:?}", key, value, other),
            }
        }
    }
}
