use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::SalesMktRecord;
use crate::rollup::{percentage, ratio};

/// Spend and funnel figures for one marketing channel
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ChannelSummary {
    pub channel: String,
    pub mkt_expense: f64,
    pub total_leads: f64,
    pub walk_in: f64,
    pub booking: f64,
    pub cost_per_lead: f64,
    pub conversion_pct: f64,
}

impl ChannelSummary {
    fn add(&mut self, record: &SalesMktRecord) {
        self.mkt_expense += record.mkt_expense;
        self.total_leads += record.total_leads;
        self.walk_in += record.walk_in;
        self.booking += record.booking;
    }

    fn finish(mut self) -> Self {
        self.cost_per_lead = ratio(self.mkt_expense, self.total_leads);
        self.conversion_pct = percentage(self.booking, self.total_leads);
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChannelReport {
    pub channels: Vec<ChannelSummary>,
    pub total: ChannelSummary,
}

/// Sum `sales_mkt` rows per channel, biggest spend first
pub fn build_channel_report(records: &[SalesMktRecord]) -> ChannelReport {
    let mut channels: BTreeMap<String, ChannelSummary> = BTreeMap::new();
    let mut total = ChannelSummary {
        channel: "Total".to_string(),
        ..ChannelSummary::default()
    };

    for record in records {
        let name = match record.channel.trim() {
            "" => "Unspecified",
            other => other,
        };
        channels
            .entry(name.to_string())
            .or_insert_with(|| ChannelSummary {
                channel: name.to_string(),
                ..ChannelSummary::default()
            })
            .add(record);
        total.add(record);
    }

    let mut channels: Vec<ChannelSummary> =
        channels.into_values().map(ChannelSummary::finish).collect();
    channels.sort_by(|a, b| {
        b.mkt_expense
            .total_cmp(&a.mkt_expense)
            .then_with(|| a.channel.cmp(&b.channel))
    });

    ChannelReport {
        channels,
        total: total.finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(channel: &str, expense: f64, leads: f64, booking: f64) -> SalesMktRecord {
        SalesMktRecord {
            project_code: "C01".to_string(),
            month: "2025-01".to_string(),
            channel: channel.to_string(),
            mkt_expense: expense,
            total_leads: leads,
            walk_in: 1.0,
            booking,
        }
    }

    #[test]
    fn groups_by_channel_and_orders_by_spend() {
        let report = build_channel_report(&[
            row("Facebook", 1000.0, 50.0, 5.0),
            row("Billboard", 3000.0, 0.0, 0.0),
            row("Facebook", 500.0, 25.0, 10.0),
            row("", 10.0, 1.0, 0.0),
        ]);

        let names: Vec<&str> = report.channels.iter().map(|c| c.channel.as_str()).collect();
        assert_eq!(names, vec!["Billboard", "Facebook", "Unspecified"]);

        let facebook = &report.channels[1];
        assert_eq!(facebook.mkt_expense, 1500.0);
        assert_eq!(facebook.walk_in, 2.0);
        assert_eq!(facebook.cost_per_lead, 20.0);
        assert_eq!(facebook.conversion_pct, 20.0);

        let billboard = &report.channels[0];
        assert_eq!(billboard.cost_per_lead, 0.0);
        assert_eq!(billboard.conversion_pct, 0.0);

        assert_eq!(report.total.mkt_expense, 4510.0);
        assert_eq!(report.total.total_leads, 76.0);
    }

    #[test]
    fn empty_input_gives_zeroed_total() {
        let report = build_channel_report(&[]);
        assert!(report.channels.is_empty());
        assert_eq!(report.total.channel, "Total");
        assert_eq!(report.total.cost_per_lead, 0.0);
    }
}
