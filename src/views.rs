//! Chart and table view models served to the dashboard pages.

use serde::Serialize;

use crate::aging::AgingSummary;
use crate::marketing::ChannelReport;
use crate::rollup::{KpiTotals, PeriodKpis};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(total: usize, limit: usize, offset: usize) -> Self {
        Self {
            total,
            limit,
            offset,
            has_more: offset.saturating_add(limit) < total,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

/// Labels plus one or more series, the shape the chart components consume
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

impl ChartData {
    fn new(labels: Vec<String>) -> Self {
        Self {
            labels,
            datasets: Vec::new(),
        }
    }

    fn with_dataset(mut self, label: &str, data: Vec<f64>) -> Self {
        self.datasets.push(Dataset {
            label: label.to_string(),
            data,
        });
        self
    }
}

pub fn aging_chart(summary: &AgingSummary) -> ChartData {
    let labels = summary
        .buckets
        .iter()
        .map(|b| b.bucket.label().to_string())
        .collect();
    let counts = summary.buckets.iter().map(|b| b.count as f64).collect();
    let amounts = summary.buckets.iter().map(|b| b.amount).collect();

    ChartData::new(labels)
        .with_dataset("Invoices", counts)
        .with_dataset("Outstanding amount", amounts)
}

/// KPI a quarterly target-vs-actual chart is drawn for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kpi {
    Booking,
    Revenue,
    MktExpense,
    Leads,
}

impl Kpi {
    pub fn label(self) -> &'static str {
        match self {
            Kpi::Booking => "Booking",
            Kpi::Revenue => "Revenue",
            Kpi::MktExpense => "Marketing expense",
            Kpi::Leads => "Leads",
        }
    }

    fn values(self, totals: &KpiTotals) -> (f64, f64) {
        match self {
            Kpi::Booking => (totals.booking_target, totals.booking_actual),
            Kpi::Revenue => (totals.revenue_target, totals.revenue_actual),
            Kpi::MktExpense => (totals.mkt_expense_target, totals.mkt_expense_actual),
            Kpi::Leads => (totals.leads_target, totals.leads_actual),
        }
    }
}

pub fn quarterly_chart(quarters: &[PeriodKpis], kpi: Kpi) -> ChartData {
    let labels = quarters.iter().map(|q| q.period.clone()).collect();
    let (targets, actuals): (Vec<f64>, Vec<f64>) =
        quarters.iter().map(|q| kpi.values(&q.totals)).unzip();

    ChartData::new(labels)
        .with_dataset(&format!("{} target", kpi.label()), targets)
        .with_dataset(&format!("{} actual", kpi.label()), actuals)
}

pub fn channel_chart(report: &ChannelReport) -> ChartData {
    let labels = report.channels.iter().map(|c| c.channel.clone()).collect();
    let expense = report.channels.iter().map(|c| c.mkt_expense).collect();
    let cpl = report.channels.iter().map(|c| c.cost_per_lead).collect();

    ChartData::new(labels)
        .with_dataset("Marketing expense", expense)
        .with_dataset("Cost per lead", cpl)
}
