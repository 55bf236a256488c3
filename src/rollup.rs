//! Sales performance roll-ups.
//!
//! Mapping rows say who is responsible for which project in which month;
//! performance rows carry quarterly KPI targets and actuals per project.
//! A person's figures are the sum over every project they were mapped to.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use serde::Serialize;

use crate::error::AppError;
use crate::models::{PerformanceRecord, ProjectUserMapping};

pub const QUARTERS: usize = 4;

/// Seniority tag on a sale-department mapping row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RoleType {
    #[serde(rename = "VP")]
    Vp,
    #[serde(rename = "MGR")]
    Mgr,
}

impl RoleType {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleType::Vp => "VP",
            RoleType::Mgr => "MGR",
        }
    }

    pub fn matches(self, raw: &str) -> bool {
        raw.trim().eq_ignore_ascii_case(self.as_str())
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VP" => Ok(RoleType::Vp),
            "MGR" => Ok(RoleType::Mgr),
            other => Err(AppError::BadRequest(format!("unknown role type '{}'", other))),
        }
    }
}

pub fn is_sale_department(department: &str) -> bool {
    department
        .trim()
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sale"))
}

/// `numerator / denominator`, or 0 when the denominator is 0
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

pub fn percentage(actual: f64, target: f64) -> f64 {
    ratio(actual, target) * 100.0
}

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Calendar sort key for the free-form `month` column.
///
/// Parseable months order by (year, month) with year-less values first;
/// anything else sorts after them lexically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MonthKey {
    Calendar { year: Option<i32>, month: u32 },
    Other(String),
}

impl MonthKey {
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim();
        parse_calendar(value)
            .map(|(year, month)| MonthKey::Calendar { year, month })
            .unwrap_or_else(|| MonthKey::Other(value.to_string()))
    }
}

fn month_number(value: &str) -> Option<u32> {
    if let Ok(n) = value.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    let lower = value.to_ascii_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .position(|name| name.starts_with(&lower))
        .map(|idx| idx as u32 + 1)
}

fn parse_year(value: &str) -> Option<i32> {
    (value.len() == 4 && value.chars().all(|c| c.is_ascii_digit()))
        .then(|| value.parse().ok())
        .flatten()
}

fn parse_calendar(value: &str) -> Option<(Option<i32>, u32)> {
    let parts: Vec<&str> = value
        .split(|c: char| c == '-' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();

    match parts.as_slice() {
        [single] => month_number(single).map(|m| (None, m)),
        // 2025-01 or 2025-01-15
        [year, month] | [year, month, _] if parse_year(year).is_some() => {
            let month = month.parse::<u32>().ok().filter(|m| (1..=12).contains(m))?;
            Some((parse_year(year), month))
        }
        // Jan 2025
        [month, year] if parse_year(year).is_some() => {
            month_number(month).map(|m| (parse_year(year), m))
        }
        _ => None,
    }
}

/// Deduplicate months by calendar position and return them in calendar order.
/// The first spelling seen for a month is the one kept.
pub fn calendar_ordered_months<'a, I>(months: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ordered: BTreeMap<MonthKey, String> = BTreeMap::new();
    for raw in months {
        if raw.trim().is_empty() {
            continue;
        }
        ordered
            .entry(MonthKey::parse(raw))
            .or_insert_with(|| raw.trim().to_string());
    }
    ordered.into_values().collect()
}

/// Summed KPI targets and actuals
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct KpiTotals {
    pub booking_target: f64,
    pub booking_actual: f64,
    pub revenue_target: f64,
    pub revenue_actual: f64,
    pub mkt_expense_target: f64,
    pub mkt_expense_actual: f64,
    pub leads_target: f64,
    pub leads_actual: f64,
}

impl KpiTotals {
    pub fn from_record(record: &PerformanceRecord) -> Self {
        Self {
            booking_target: record.booking_target,
            booking_actual: record.booking_actual,
            revenue_target: record.revenue_target,
            revenue_actual: record.revenue_actual,
            mkt_expense_target: record.mkt_expense_target,
            mkt_expense_actual: record.mkt_expense_actual,
            leads_target: record.leads_target,
            leads_actual: record.leads_actual,
        }
    }

    pub fn ratios(&self) -> KpiRatios {
        KpiRatios {
            booking_achievement_pct: percentage(self.booking_actual, self.booking_target),
            revenue_achievement_pct: percentage(self.revenue_actual, self.revenue_target),
            mkt_expense_usage_pct: percentage(self.mkt_expense_actual, self.mkt_expense_target),
            leads_achievement_pct: percentage(self.leads_actual, self.leads_target),
            cost_per_lead: ratio(self.mkt_expense_actual, self.leads_actual),
        }
    }
}

impl AddAssign for KpiTotals {
    fn add_assign(&mut self, other: Self) {
        self.booking_target += other.booking_target;
        self.booking_actual += other.booking_actual;
        self.revenue_target += other.revenue_target;
        self.revenue_actual += other.revenue_actual;
        self.mkt_expense_target += other.mkt_expense_target;
        self.mkt_expense_actual += other.mkt_expense_actual;
        self.leads_target += other.leads_target;
        self.leads_actual += other.leads_actual;
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct KpiRatios {
    pub booking_achievement_pct: f64,
    pub revenue_achievement_pct: f64,
    pub mkt_expense_usage_pct: f64,
    pub leads_achievement_pct: f64,
    pub cost_per_lead: f64,
}

/// KPI totals for one period together with their derived ratios
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeriodKpis {
    pub period: String,
    #[serde(flatten)]
    pub totals: KpiTotals,
    pub ratios: KpiRatios,
}

impl PeriodKpis {
    fn new(period: impl Into<String>, totals: KpiTotals) -> Self {
        Self {
            period: period.into(),
            ratios: totals.ratios(),
            totals,
        }
    }
}

/// Per-quarter accumulator whose YTD is always the sum of its quarters
#[derive(Debug, Clone, Default)]
struct QuarterTotals([KpiTotals; QUARTERS]);

impl QuarterTotals {
    fn add(&mut self, record: &PerformanceRecord) -> bool {
        match quarter_index(record.quarter) {
            Some(idx) => {
                self.0[idx] += KpiTotals::from_record(record);
                true
            }
            None => false,
        }
    }

    fn ytd(&self) -> KpiTotals {
        self.0.iter().fold(KpiTotals::default(), |mut acc, q| {
            acc += *q;
            acc
        })
    }

    fn into_periods(self) -> (Vec<PeriodKpis>, PeriodKpis) {
        let ytd = PeriodKpis::new("YTD", self.ytd());
        let quarters = self
            .0
            .into_iter()
            .enumerate()
            .map(|(idx, totals)| PeriodKpis::new(format!("Q{}", idx + 1), totals))
            .collect();
        (quarters, ytd)
    }
}

fn quarter_index(quarter: i32) -> Option<usize> {
    (1..=QUARTERS as i32)
        .contains(&quarter)
        .then(|| (quarter - 1) as usize)
}

/// YTD figures of one project within a person's roll-up
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProjectKpis {
    pub project_code: String,
    pub project_name: Option<String>,
    pub bud: Option<String>,
    pub ytd: PeriodKpis,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PersonRollup {
    pub name: String,
    pub position: String,
    pub role_type: RoleType,
    pub months: Vec<String>,
    pub project_codes: Vec<String>,
    pub projects: Vec<ProjectKpis>,
    pub quarters: Vec<PeriodKpis>,
    pub ytd: PeriodKpis,
}

#[derive(Debug, Default)]
struct PersonAcc<'a> {
    months: Vec<&'a str>,
    projects: BTreeSet<&'a str>,
}

fn index_by_project(performance: &[PerformanceRecord]) -> HashMap<&str, Vec<&PerformanceRecord>> {
    let mut by_project: HashMap<&str, Vec<&PerformanceRecord>> = HashMap::new();
    for record in performance {
        if quarter_index(record.quarter).is_none() {
            tracing::warn!(
                project_code = %record.project_code,
                quarter = record.quarter,
                "skipping performance row with out-of-range quarter"
            );
            continue;
        }
        by_project
            .entry(record.project_code.trim())
            .or_default()
            .push(record);
    }
    by_project
}

/// Roll performance figures up to each sale-department person holding `role`.
///
/// People are keyed by name and position, so the same person mapped in
/// several months is reported once, and each of their projects is counted
/// once no matter how many months it appears in.
pub fn build_person_rollups(
    role: RoleType,
    mappings: &[ProjectUserMapping],
    performance: &[PerformanceRecord],
) -> Vec<PersonRollup> {
    let mut people: BTreeMap<(&str, &str), PersonAcc> = BTreeMap::new();
    for row in mappings {
        if !is_sale_department(&row.department) || !role.matches(&row.role_type) {
            continue;
        }
        let acc = people
            .entry((row.name.trim(), row.position.trim()))
            .or_default();
        acc.months.push(row.month.as_str());
        let code = row.project_code.trim();
        if !code.is_empty() {
            acc.projects.insert(code);
        }
    }

    let by_project = index_by_project(performance);

    people
        .into_iter()
        .map(|((name, position), acc)| {
            let mut quarters = QuarterTotals::default();
            let mut projects = Vec::with_capacity(acc.projects.len());

            for code in &acc.projects {
                let records = by_project.get(code).map(Vec::as_slice).unwrap_or(&[]);
                let mut project_quarters = QuarterTotals::default();
                for record in records {
                    quarters.add(record);
                    project_quarters.add(record);
                }
                let first = records.first();
                projects.push(ProjectKpis {
                    project_code: code.to_string(),
                    project_name: first.and_then(|r| r.project_name.clone()),
                    bud: first.map(|r| r.bud.clone()),
                    ytd: PeriodKpis::new("YTD", project_quarters.ytd()),
                });
            }

            let (quarters, ytd) = quarters.into_periods();
            PersonRollup {
                name: name.to_string(),
                position: position.to_string(),
                role_type: role,
                months: calendar_ordered_months(acc.months),
                project_codes: acc.projects.iter().map(|c| c.to_string()).collect(),
                projects,
                quarters,
                ytd,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BudRollup {
    pub bud: String,
    pub project_codes: Vec<String>,
    pub quarters: Vec<PeriodKpis>,
    pub ytd: PeriodKpis,
}

/// Group performance rows by business unit
pub fn build_bud_rollups(performance: &[PerformanceRecord]) -> Vec<BudRollup> {
    let mut buds: BTreeMap<&str, (BTreeSet<&str>, QuarterTotals)> = BTreeMap::new();
    for record in performance {
        if quarter_index(record.quarter).is_none() {
            tracing::warn!(
                project_code = %record.project_code,
                quarter = record.quarter,
                "skipping performance row with out-of-range quarter"
            );
            continue;
        }
        let (codes, quarters) = buds.entry(record.bud.trim()).or_default();
        quarters.add(record);
        codes.insert(record.project_code.trim());
    }

    buds.into_iter()
        .map(|(bud, (codes, quarters))| {
            let (quarters, ytd) = quarters.into_periods();
            BudRollup {
                bud: bud.to_string(),
                project_codes: codes.into_iter().map(str::to_string).collect(),
                quarters,
                ytd,
            }
        })
        .collect()
}
