use std::collections::HashSet;

use serde::Deserialize;

use crate::db::models::Receipt;

const ALL: &str = "all";

/// Narrowing applied on top of what a user is allowed to see.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReceiptFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub committee: Option<String>,
    #[serde(default)]
    pub commodity: Option<String>,
    #[serde(default)]
    pub include_cancelled: bool,
}

fn is_all(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => true,
        Some(v) => v.eq_ignore_ascii_case(ALL),
    }
}

impl ReceiptFilter {
    pub fn matches(&self, receipt: &Receipt) -> bool {
        if !self.include_cancelled && !receipt.is_active() {
            return false;
        }

        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                [
                    &receipt.trader_name,
                    &receipt.payee_name,
                    &receipt.receipt_number,
                    &receipt.book_number,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
            }
        };

        let matches_committee = is_all(self.committee.as_deref())
            || self.committee.as_deref() == Some(receipt.committee_display_name());

        let matches_commodity = is_all(self.commodity.as_deref())
            || self.commodity.as_deref() == Some(receipt.commodity.as_str());

        matches_search && matches_committee && matches_commodity
    }

    pub fn apply(&self, receipts: Vec<Receipt>) -> Vec<Receipt> {
        receipts.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// Unique commodities in the order they first appear.
pub fn distinct_commodities(receipts: &[Receipt]) -> Vec<String> {
    let mut seen = HashSet::new();
    receipts
        .iter()
        .filter(|r| seen.insert(r.commodity.as_str()))
        .map(|r| r.commodity.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ReceiptStatus;
    use crate::domain::test_fixtures::receipt;

    fn sample() -> Vec<Receipt> {
        let mut a = receipt("R100", "c1", "2025-06-01");
        a.trader_name = "Sri Lakshmi Traders".into();
        a.commodity = "Rice".into();
        a.committee_name = Some("Tuni Agricultural Market Committee".into());

        let mut b = receipt("R200", "c2", "2025-06-02");
        b.trader_name = "Ganesh & Co".into();
        b.payee_name = "Lakshmi Mills".into();
        b.commodity = "Cotton".into();
        b.book_number = "B77".into();

        let mut c = receipt("R300", "c1", "2025-06-03");
        c.commodity = "Rice".into();
        c.status = ReceiptStatus::Cancelled;
        c.committee_name = Some("Tuni Agricultural Market Committee".into());

        vec![a, b, c]
    }

    #[test]
    fn test_default_filter_hides_cancelled() {
        let filtered = ReceiptFilter::default().apply(sample());
        assert_eq!(filtered.len(), 2);

        let with_cancelled = ReceiptFilter {
            include_cancelled: true,
            ..Default::default()
        };
        assert_eq!(with_cancelled.apply(sample()).len(), 3);
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let filter = ReceiptFilter {
            search: Some("lakshmi".into()),
            ..Default::default()
        };
        let ids: Vec<_> = filter.apply(sample()).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["R100", "R200"]);

        let by_book = ReceiptFilter {
            search: Some("b77".into()),
            ..Default::default()
        };
        assert_eq!(by_book.apply(sample()).len(), 1);
    }

    #[test]
    fn test_committee_and_commodity_filters() {
        let filter = ReceiptFilter {
            committee: Some("Tuni Agricultural Market Committee".into()),
            commodity: Some("Rice".into()),
            include_cancelled: true,
            ..Default::default()
        };
        assert_eq!(filter.apply(sample()).len(), 2);

        let unknown = ReceiptFilter {
            committee: Some("Unknown Committee".into()),
            ..Default::default()
        };
        let ids: Vec<_> = unknown.apply(sample()).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["R200"]);

        let all = ReceiptFilter {
            committee: Some("all".into()),
            commodity: Some("ALL".into()),
            ..Default::default()
        };
        assert_eq!(all.apply(sample()).len(), 2);
    }

    #[test]
    fn test_distinct_commodities_first_seen_order() {
        assert_eq!(distinct_commodities(&sample()), vec!["Rice", "Cotton"]);
    }
}
