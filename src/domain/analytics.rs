use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::models::{
    CollectionLocation, MonthlySummary, NatureOfReceipt, Receipt, Role,
};
use crate::domain::period::MonthWindow;

const UNKNOWN_TRADER: &str = "Unknown Trader";

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn average(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        round2(total / count as f64)
    }
}

/// Same numbers the SQL rollup produces, computed over an in-memory slice.
/// Cancelled receipts never count.
pub fn monthly_summary(
    receipts: &[Receipt],
    committee_id: Option<&str>,
    window: &MonthWindow,
) -> MonthlySummary {
    let in_scope: Vec<&Receipt> = receipts
        .iter()
        .filter(|r| r.is_active() && window.contains(r.date))
        .filter(|r| committee_id.is_none_or(|id| r.committee_id == id))
        .collect();

    let traders: HashSet<&str> = in_scope.iter().map(|r| r.trader_name.as_str()).collect();
    let total_value: f64 = in_scope.iter().map(|r| r.value).sum();
    let total_fees: f64 = in_scope.iter().map(|r| r.fees_paid).sum();

    MonthlySummary {
        total_receipts: in_scope.len() as i64,
        active_members: traders.len() as i64,
        total_value,
        total_fees,
        average_value: average(total_value, in_scope.len()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_receipts: usize,
    pub this_month_count: usize,
    pub last_month_count: usize,
    pub monthly_difference: i64,
    pub active_traders: usize,
    pub total_value: f64,
}

pub fn dashboard_stats(receipts: &[Receipt], today: NaiveDate) -> DashboardStats {
    let this_month = MonthWindow::containing(today);
    let last_month = this_month.previous();

    let active: Vec<&Receipt> = receipts.iter().filter(|r| r.is_active()).collect();
    let current: Vec<&Receipt> = active
        .iter()
        .copied()
        .filter(|r| this_month.contains(r.date))
        .collect();
    let previous = active.iter().filter(|r| last_month.contains(r.date)).count();

    let active_traders: HashSet<&str> = current
        .iter()
        .map(|r| r.trader_name.trim())
        .filter(|name| !name.is_empty())
        .collect();

    DashboardStats {
        total_receipts: active.len(),
        this_month_count: current.len(),
        last_month_count: previous,
        monthly_difference: current.len() as i64 - previous as i64,
        active_traders: active_traders.len(),
        total_value: current.iter().map(|r| r.value).sum(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderSummary {
    pub name: String,
    pub receipt_count: usize,
    pub total_value: f64,
    pub total_quantity: f64,
    pub avg_value: f64,
    pub commodities: Vec<String>,
    pub last_transaction: Option<NaiveDate>,
}

fn trader_key(receipt: &Receipt) -> &str {
    let name = receipt.trader_name.trim();
    if name.is_empty() { UNKNOWN_TRADER } else { name }
}

/// Per-trader totals over active receipts, highest total value first.
pub fn trader_summaries(receipts: &[Receipt]) -> Vec<TraderSummary> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, TraderSummary> = HashMap::new();

    for receipt in receipts.iter().filter(|r| r.is_active()) {
        let name = trader_key(receipt);
        let entry = by_name.entry(name.to_string()).or_insert_with(|| {
            order.push(name.to_string());
            TraderSummary {
                name: name.to_string(),
                receipt_count: 0,
                total_value: 0.0,
                total_quantity: 0.0,
                avg_value: 0.0,
                commodities: Vec::new(),
                last_transaction: None,
            }
        });

        entry.receipt_count += 1;
        entry.total_value += receipt.value;
        entry.total_quantity += receipt.quantity;
        if !entry.commodities.contains(&receipt.commodity) {
            entry.commodities.push(receipt.commodity.clone());
        }
        if entry.last_transaction.is_none_or(|last| receipt.date > last) {
            entry.last_transaction = Some(receipt.date);
        }
    }

    let mut summaries: Vec<TraderSummary> = order
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .map(|mut s| {
            s.avg_value = average(s.total_value, s.receipt_count);
            s
        })
        .collect();

    // Stable sort keeps first-seen order among equal totals.
    summaries.sort_by(|a, b| b.total_value.total_cmp(&a.total_value));
    summaries
}

pub fn search_traders(summaries: Vec<TraderSummary>, term: &str) -> Vec<TraderSummary> {
    let term = term.trim().to_lowercase();
    summaries
        .into_iter()
        .filter(|s| s.name.to_lowercase().contains(&term))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraderMonth {
    pub year: i32,
    pub month: u32,
    /// e.g. "Jun 2025"
    pub label: String,
    pub count: usize,
    pub value: f64,
}

pub fn trader_monthly(receipts: &[Receipt], trader_name: &str) -> Vec<TraderMonth> {
    let mut months: BTreeMap<NaiveDate, TraderMonth> = BTreeMap::new();

    for receipt in receipts
        .iter()
        .filter(|r| r.is_active() && trader_key(r).eq_ignore_ascii_case(trader_name.trim()))
    {
        let window = MonthWindow::containing(receipt.date);
        let entry = months.entry(window.start).or_insert_with(|| TraderMonth {
            year: window.year,
            month: window.month,
            label: window.start.format("%b %Y").to_string(),
            count: 0,
            value: 0.0,
        });
        entry.count += 1;
        entry.value += receipt.value;
    }

    months.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationBreakdown {
    pub location: String,
    pub count: usize,
    pub fees: f64,
}

/// Market-fee collections grouped by where they were collected: the
/// checkpost name for checkpost receipts, "office" otherwise.
pub fn market_fee_locations(receipts: &[Receipt], window: &MonthWindow) -> Vec<LocationBreakdown> {
    let mut by_location: BTreeMap<String, LocationBreakdown> = BTreeMap::new();

    for receipt in receipts.iter().filter(|r| {
        r.is_active() && r.nature_of_receipt == NatureOfReceipt::MarketFee && window.contains(r.date)
    }) {
        let location = match (receipt.collection_location, receipt.checkpost_location.as_deref()) {
            (CollectionLocation::Checkpost, Some(name)) if !name.trim().is_empty() => name.trim().to_string(),
            (location, _) => location.as_str().to_string(),
        };

        let entry = by_location
            .entry(location.clone())
            .or_insert_with(|| LocationBreakdown {
                location,
                count: 0,
                fees: 0.0,
            });
        entry.count += 1;
        entry.fees += receipt.fees_paid;
    }

    by_location.into_values().collect()
}

pub fn receipt_list_title(role: Role) -> &'static str {
    match role {
        Role::Deo => "My Receipts",
        Role::Supervisor => "Committee Receipts",
        Role::Jd => "All Receipts",
    }
}

pub fn receipt_list_description(role: Role) -> &'static str {
    match role {
        Role::Deo => "View and manage receipts you have created",
        Role::Supervisor => "View receipts for your assigned committee",
        Role::Jd => "Complete overview of all receipts in the system",
    }
}
