//! Invoice aging.
//!
//! Outstanding invoices are classified into fixed day ranges by how long ago
//! they fell due. The summary is built from the same pass that assigns the
//! buckets, so the totals always equal the sum of the per-bucket values.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::AppError;
use crate::models::Invoice;
use crate::views::Pagination;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;

/// Day range an outstanding invoice falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AgingBucket {
    #[serde(rename = "0-30")]
    Days0To30,
    #[serde(rename = "31-60")]
    Days31To60,
    #[serde(rename = "61-90")]
    Days61To90,
    #[serde(rename = "91-180")]
    Days91To180,
    #[serde(rename = "181-360")]
    Days181To360,
    #[serde(rename = "360+")]
    Over360,
}

impl AgingBucket {
    pub const ALL: [AgingBucket; 6] = [
        AgingBucket::Days0To30,
        AgingBucket::Days31To60,
        AgingBucket::Days61To90,
        AgingBucket::Days91To180,
        AgingBucket::Days181To360,
        AgingBucket::Over360,
    ];

    /// Classify a number of days past due. Invoices not yet due count as `0-30`.
    pub fn from_days(days_overdue: i64) -> Self {
        match days_overdue {
            i64::MIN..=30 => AgingBucket::Days0To30,
            31..=60 => AgingBucket::Days31To60,
            61..=90 => AgingBucket::Days61To90,
            91..=180 => AgingBucket::Days91To180,
            181..=360 => AgingBucket::Days181To360,
            _ => AgingBucket::Over360,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgingBucket::Days0To30 => "0-30",
            AgingBucket::Days31To60 => "31-60",
            AgingBucket::Days61To90 => "61-90",
            AgingBucket::Days91To180 => "91-180",
            AgingBucket::Days181To360 => "181-360",
            AgingBucket::Over360 => "360+",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AgingBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AgingBucket {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `360+` arrives as "360 " when the `+` is not percent-encoded
        let wanted = match s.trim() {
            "360" => return Ok(AgingBucket::Over360),
            other => other,
        };
        AgingBucket::ALL
            .into_iter()
            .find(|bucket| bucket.label() == wanted)
            .ok_or_else(|| AppError::BadRequest(format!("unknown aging bucket '{}'", s)))
    }
}

/// Whole days between the due date and `today`; negative when not yet due
pub fn days_overdue(due_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - due_date).num_days()
}

/// An outstanding invoice with its age attached
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgedInvoice {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub days_overdue: i64,
    pub bucket: AgingBucket,
}

impl AgedInvoice {
    /// Returns `None` for invoices that are excluded from aging: those
    /// without a due date and those already fully paid.
    pub fn from_invoice(invoice: Invoice, today: NaiveDate) -> Option<Self> {
        if invoice.is_fully_paid() {
            return None;
        }
        let due_date = invoice.due_date?;
        let days = days_overdue(due_date, today);

        Some(Self {
            invoice,
            days_overdue: days,
            bucket: AgingBucket::from_days(days),
        })
    }
}

/// Count and amount for one bucket
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BucketTotal {
    pub bucket: AgingBucket,
    pub count: u64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgingSummary {
    pub buckets: Vec<BucketTotal>,
    pub total_count: u64,
    pub total_amount: f64,
}

impl AgingSummary {
    pub fn from_aged(invoices: &[AgedInvoice]) -> Self {
        let mut buckets: Vec<BucketTotal> = AgingBucket::ALL
            .into_iter()
            .map(|bucket| BucketTotal {
                bucket,
                count: 0,
                amount: 0.0,
            })
            .collect();

        for aged in invoices {
            let slot = &mut buckets[aged.bucket.index()];
            slot.count += 1;
            slot.amount += aged.invoice.total;
        }

        let total_count = buckets.iter().map(|b| b.count).sum();
        let total_amount = buckets.iter().map(|b| b.amount).sum();

        Self {
            buckets,
            total_count,
            total_amount,
        }
    }

    pub fn bucket(&self, bucket: AgingBucket) -> &BucketTotal {
        &self.buckets[bucket.index()]
    }
}

/// Column an invoice listing can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Id,
    Name,
    SiteId,
    IssuedDate,
    DueDate,
    Total,
    #[default]
    DaysOverdue,
    Status,
}

impl FromStr for SortField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "id" => Ok(SortField::Id),
            "name" => Ok(SortField::Name),
            "site_id" => Ok(SortField::SiteId),
            "issued_date" => Ok(SortField::IssuedDate),
            "due_date" => Ok(SortField::DueDate),
            "total" => Ok(SortField::Total),
            "days_overdue" => Ok(SortField::DaysOverdue),
            "status" => Ok(SortField::Status),
            other => Err(AppError::BadRequest(format!("cannot sort by '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(AppError::BadRequest(format!("unknown sort order '{}'", other))),
        }
    }
}

fn compare(a: &AgedInvoice, b: &AgedInvoice, field: SortField) -> Ordering {
    let (x, y) = (&a.invoice, &b.invoice);
    let primary = match field {
        SortField::Id => x.id.cmp(&y.id),
        SortField::Name => x.name.cmp(&y.name),
        SortField::SiteId => x.site_id.cmp(&y.site_id),
        SortField::IssuedDate => x.issued_date.cmp(&y.issued_date),
        SortField::DueDate => x.due_date.cmp(&y.due_date),
        SortField::Total => x.total.total_cmp(&y.total),
        SortField::DaysOverdue => a.days_overdue.cmp(&b.days_overdue),
        SortField::Status => x.status.cmp(&y.status),
    };
    primary.then_with(|| x.id.cmp(&y.id))
}

pub fn sort_invoices(invoices: &mut [AgedInvoice], field: SortField, order: SortOrder) {
    invoices.sort_by(|a, b| {
        let ordering = compare(a, b, field);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// Listing options applied after bucketing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgingOptions {
    pub bucket: Option<AgingBucket>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub limit: usize,
    pub offset: usize,
}

impl Default for AgingOptions {
    fn default() -> Self {
        Self {
            bucket: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl AgingOptions {
    /// Parse raw query-string values, clamping the page size
    pub fn parse(
        bucket: Option<&str>,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Self, AppError> {
        let bucket: Option<AgingBucket> = match bucket.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse()?),
            None => None,
        };
        let sort_by: SortField = sort_by
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();
        let sort_order: SortOrder = sort_order
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();
        let limit = limit
            .map(|l| l.clamp(1, MAX_LIMIT as i64) as usize)
            .unwrap_or(DEFAULT_LIMIT);
        let offset = offset.map(|o| o.max(0) as usize).unwrap_or(0);

        Ok(Self {
            bucket,
            sort_by,
            sort_order,
            limit,
            offset,
        })
    }
}

/// Aging summary plus one page of outstanding invoices
#[derive(Debug, Clone, Serialize)]
pub struct AgingReport {
    pub summary: AgingSummary,
    pub invoices: Vec<AgedInvoice>,
    pub pagination: Pagination,
}

impl AgingReport {
    /// The summary always covers every outstanding invoice; the bucket
    /// option only narrows the listed page.
    pub fn build(invoices: Vec<Invoice>, today: NaiveDate, options: &AgingOptions) -> Self {
        let aged: Vec<AgedInvoice> = invoices
            .into_iter()
            .filter_map(|invoice| AgedInvoice::from_invoice(invoice, today))
            .collect();
        let summary = AgingSummary::from_aged(&aged);

        let mut listed: Vec<AgedInvoice> = match options.bucket {
            Some(bucket) => aged.into_iter().filter(|a| a.bucket == bucket).collect(),
            None => aged,
        };
        sort_invoices(&mut listed, options.sort_by, options.sort_order);

        let pagination = Pagination::new(listed.len(), options.limit, options.offset);
        let page = listed
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .collect();

        Self {
            summary,
            invoices: page,
            pagination,
        }
    }
}
