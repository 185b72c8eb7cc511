//! Wire shapes of the settlement overview. Unknown fields are ignored.
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettlementSummary {
    #[serde(default)]
    pub total_gross: f64,
    #[serde(default)]
    pub total_platform_fee: f64,
    #[serde(default)]
    pub total_razorpay_fee: f64,
    #[serde(default)]
    pub total_net_payable: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GymSettlementRow {
    pub gym_id: String,
    #[serde(default)]
    pub gym_name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub total_bookings: u64,
    #[serde(default)]
    pub gross_amount: f64,
    #[serde(default)]
    pub platform_fee: f64,
    #[serde(default)]
    pub razorpay_fee: f64,
    #[serde(default)]
    pub net_payable: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventSettlementRow {
    pub event_id: String,
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub total_bookings: u64,
    #[serde(default)]
    pub tickets_sold: u64,
    #[serde(default)]
    pub gross_amount: f64,
    #[serde(default)]
    pub platform_fee: f64,
    #[serde(default)]
    pub razorpay_fee: f64,
    #[serde(default)]
    pub net_payable: f64,
}

impl EventSettlementRow {
    /// Calendar day of the event. Accepts RFC 3339 timestamps and plain dates.
    pub fn event_day(&self) -> Option<NaiveDate> {
        let raw = self.event_date.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.date_naive())
            .ok()
            .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
    }
}

/// Full snapshot returned by `GET /admin/settlements/overview`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SettlementOverview {
    #[serde(default)]
    pub summary: SettlementSummary,
    #[serde(default)]
    pub gyms: Vec<GymSettlementRow>,
    #[serde(default)]
    pub events: Vec<EventSettlementRow>,
}
