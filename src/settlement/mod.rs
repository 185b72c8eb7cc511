//! Client-side derivations over a settlement snapshot: filtering, ordering,
//! pagination and the summary metrics shown above the tables.
//!
//! Everything here is pure; fetching and payout commands live in
//! [`crate::view`].

pub mod model;

pub use model::{EventSettlementRow, GymSettlementRow, SettlementOverview, SettlementSummary};

use crate::model::PayoutTarget;

/// Rows per page in the settlement tables.
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Common view over gym and event rows.
pub trait SettlementRow {
    const TARGET: PayoutTarget;

    /// Identifier used by the mark-paid endpoint.
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    fn net_payable(&self) -> f64;

    /// Fields matched by the free-text search.
    fn search_fields(&self) -> Vec<&str>;

    /// Key identifying the row across both collections.
    fn row_key(&self) -> String {
        format!("{}:{}", Self::TARGET.as_str(), self.id())
    }
}

impl SettlementRow for GymSettlementRow {
    const TARGET: PayoutTarget = PayoutTarget::Gym;

    fn id(&self) -> &str {
        &self.gym_id
    }

    fn display_name(&self) -> &str {
        &self.gym_name
    }

    fn net_payable(&self) -> f64 {
        self.net_payable
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.gym_name.as_str()];
        fields.extend(self.city.as_deref());
        fields
    }
}

impl SettlementRow for EventSettlementRow {
    const TARGET: PayoutTarget = PayoutTarget::Event;

    fn id(&self) -> &str {
        &self.event_id
    }

    fn display_name(&self) -> &str {
        &self.event_name
    }

    fn net_payable(&self) -> f64 {
        self.net_payable
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.event_name.as_str()];
        fields.extend(self.organizer.as_deref());
        fields.extend(self.location.as_deref());
        fields
    }
}

/// Key for a row that is only known by target and id.
pub fn row_key(target: PayoutTarget, id: &str) -> String {
    format!("{}:{}", target.as_str(), id)
}

fn matches_search<R: SettlementRow>(row: &R, needle: &str) -> bool {
    needle.is_empty()
        || row
            .search_fields()
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
}

/// Rows matching `search_term` (case-insensitive substring over the row's
/// search fields) whose net payable is at least `min_net` (unset = 0),
/// ordered by net payable, highest first. Ties keep their input order.
pub fn compute_filtered_rows<R>(rows: &[R], search_term: &str, min_net: Option<f64>) -> Vec<R>
where
    R: SettlementRow + Clone,
{
    let needle = search_term.trim().to_lowercase();
    let threshold = min_net.unwrap_or(0.0);
    let mut filtered: Vec<R> = rows
        .iter()
        .filter(|row| matches_search(*row, &needle) && row.net_payable() >= threshold)
        .cloned()
        .collect();
    filtered.sort_by(|a, b| b.net_payable().total_cmp(&a.net_payable()));
    filtered
}

/// `max(1, ceil(len / page_size))`.
pub fn total_pages(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    len.div_ceil(page_size).max(1)
}

/// The 1-based `page` of `rows`. Pages outside `1..=total_pages` are not
/// clamped and come back empty.
pub fn paginate<T>(rows: &[T], page: usize, page_size: usize) -> &[T] {
    if page == 0 || page_size == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(page_size);
    if start >= rows.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(rows.len());
    &rows[start..end]
}

/// One rendered page of a filtered collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    pub rows: Vec<R>,
    pub page: usize,
    pub total_pages: usize,
    /// Rows matching the filters across all pages.
    pub total_rows: usize,
}

impl<R: Clone> Page<R> {
    pub fn build(filtered: &[R], page: usize, page_size: usize) -> Self {
        Self {
            rows: paginate(filtered, page, page_size).to_vec(),
            page,
            total_pages: total_pages(filtered.len(), page_size),
            total_rows: filtered.len(),
        }
    }
}

impl<R> Page<R> {
    /// Nothing matched the filters. A neutral state, not an error.
    pub fn is_empty_result(&self) -> bool {
        self.total_rows == 0
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Rupee amount with two decimals and Indian digit grouping (`₹1,25,000.50`).
pub fn format_inr(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    if whole.len() > 3 {
        let (head, tail) = whole.split_at(whole.len() - 3);
        let head_len = head.len();
        for (i, ch) in head.chars().enumerate() {
            if i > 0 && (head_len - i) % 2 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        grouped.push(',');
        grouped.push_str(tail);
    } else {
        grouped.push_str(whole);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}₹{}.{}", sign, grouped, frac)
}

/// Figures derived from the fetched summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryMetrics {
    pub total_partners: usize,
    /// Platform plus gateway fees as a whole percentage of gross.
    pub effective_take_rate: i64,
    pub total_gross: f64,
    pub total_fees: f64,
    pub total_net_payable: f64,
}

/// `round((platform_fee + gateway_fee) / gross * 100)`, 0 when gross is 0.
pub fn effective_take_rate(summary: &SettlementSummary) -> i64 {
    if summary.total_gross == 0.0 {
        return 0;
    }
    let fees = summary.total_platform_fee + summary.total_razorpay_fee;
    let rate = (fees / summary.total_gross * 100.0).round();
    if rate.is_finite() {
        rate as i64
    } else {
        0
    }
}

pub fn summary_metrics(overview: &SettlementOverview) -> SummaryMetrics {
    let s = &overview.summary;
    SummaryMetrics {
        total_partners: overview.gyms.len() + overview.events.len(),
        effective_take_rate: effective_take_rate(s),
        total_gross: s.total_gross,
        total_fees: s.total_platform_fee + s.total_razorpay_fee,
        total_net_payable: s.total_net_payable,
    }
}
