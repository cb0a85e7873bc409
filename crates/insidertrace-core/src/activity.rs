//! Record filters and per-filer activity at a single entity.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::names::normalize_name;
use crate::record::{EntityRef, TransactionKind, TransactionRecord};

/// Most recent records kept on an [`EntityActivity`].
pub const RECENT_LIMIT: usize = 20;

/// Narrows a record list by date, kind, and value.
///
/// Empty `kinds` admits every kind. A date bound excludes undated records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub kinds: Vec<TransactionKind>,
    /// Records without a total value never pass a minimum.
    pub min_value: Option<f64>,
}

impl TransactionFilter {
    pub fn start(mut self, start: NaiveDate) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    pub fn kinds<I: IntoIterator<Item = TransactionKind>>(mut self, kinds: I) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn min_value(mut self, value: f64) -> Self {
        self.min_value = Some(value);
        self
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&record.kind) {
            return false;
        }
        if let Some(min) = self.min_value
            && record.total_value.is_none_or(|v| v < min)
        {
            return false;
        }
        if self.start.is_some() || self.end.is_some() {
            let Some(date) = record.transaction_date else {
                return false;
            };
            if self.start.is_some_and(|s| date < s) || self.end.is_some_and(|e| date > e) {
                return false;
            }
        }
        true
    }
}

/// One filer's activity at an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderActivity {
    /// Name as printed on the filer's most recent record.
    pub person_name: String,
    pub role: Option<String>,
    pub transaction_count: usize,
    pub shares_bought: f64,
    pub shares_sold: f64,
    pub net_shares: f64,
    pub value_bought: f64,
    pub value_sold: f64,
    pub last_transaction: Option<NaiveDate>,
}

/// Every filer's activity at one entity over a date window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityActivity {
    pub entity: EntityRef,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub transaction_count: usize,
    pub shares_bought: f64,
    pub shares_sold: f64,
    pub net_shares: f64,
    /// `None` when nothing was sold.
    pub buy_sell_ratio: Option<f64>,
    /// Ordered by most recent activity.
    pub insiders: Vec<InsiderActivity>,
    /// Newest first, at most [`RECENT_LIMIT`].
    pub recent: Vec<TransactionRecord>,
}

impl EntityActivity {
    /// Group `records` by filer. Renderings of the same name in any token order are merged.
    pub fn from_records(
        entity: &EntityRef,
        start: NaiveDate,
        end: NaiveDate,
        mut records: Vec<TransactionRecord>,
    ) -> Self {
        records.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));

        let mut insiders: Vec<InsiderActivity> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for r in &records {
            let idx = *by_name.entry(filer_key(&r.person_name)).or_insert_with(|| {
                insiders.push(InsiderActivity {
                    person_name: r.person_name.clone(),
                    role: r.person_role.clone(),
                    transaction_count: 0,
                    shares_bought: 0.0,
                    shares_sold: 0.0,
                    net_shares: 0.0,
                    value_bought: 0.0,
                    value_sold: 0.0,
                    last_transaction: r.transaction_date,
                });
                insiders.len() - 1
            });
            let insider = &mut insiders[idx];
            insider.transaction_count += 1;
            if r.kind.is_acquisition() {
                insider.shares_bought += r.shares;
                insider.value_bought += r.total_value.unwrap_or(0.0);
            } else if r.kind.is_disposition() {
                insider.shares_sold += r.shares;
                insider.value_sold += r.total_value.unwrap_or(0.0);
            }
            insider.net_shares = insider.shares_bought - insider.shares_sold;
        }

        let shares_bought: f64 = insiders.iter().map(|i| i.shares_bought).sum();
        let shares_sold: f64 = insiders.iter().map(|i| i.shares_sold).sum();

        Self {
            entity: entity.clone(),
            start,
            end,
            transaction_count: records.len(),
            shares_bought,
            shares_sold,
            net_shares: shares_bought - shares_sold,
            buy_sell_ratio: (shares_sold > 0.0).then(|| shares_bought / shares_sold),
            insiders,
            recent: records.into_iter().take(RECENT_LIMIT).collect(),
        }
    }

    pub fn insider_count(&self) -> usize {
        self.insiders.len()
    }
}

/// "KLAPPA GALE E" and "Klappa, Gale E." share a key.
fn filer_key(name: &str) -> String {
    let normalized = normalize_name(name);
    let mut tokens: Vec<&str> = normalized.split(' ').collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Ownership;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    fn record(name: &str, kind: TransactionKind, shares: f64, price: Option<f64>, d: u32) -> TransactionRecord {
        TransactionRecord {
            person_name: name.into(),
            person_role: Some("Director".into()),
            entity_name: "WEC Energy Group".into(),
            entity_id: "0000783325".into(),
            ticker: Some("WEC".into()),
            transaction_date: Some(day(d)),
            kind,
            transaction_code: None,
            security_title: "Common Stock".into(),
            shares,
            price_per_share: price,
            total_value: price.map(|p| p * shares),
            exercise_price: None,
            ownership: Ownership::Direct,
            shares_owned_after: None,
            is_derivative: false,
            is_holding: false,
            document_date: Some(day(d)),
            document_id: format!("doc-{d}"),
            form_type: "4".into(),
        }
    }

    #[test]
    fn filter_by_kind_value_and_date() {
        let sale = record("KLAPPA GALE E", TransactionKind::Sale, 100.0, Some(50.0), 10);
        let gift = record("KLAPPA GALE E", TransactionKind::Gift, 100.0, None, 12);

        assert!(TransactionFilter::default().matches(&sale));
        assert!(TransactionFilter::default().matches(&gift));

        let sales = TransactionFilter::default().kinds([TransactionKind::Sale]);
        assert!(sales.matches(&sale));
        assert!(!sales.matches(&gift));

        let big = TransactionFilter::default().min_value(5_000.0);
        assert!(big.matches(&sale));
        assert!(!big.matches(&gift));
        assert!(!TransactionFilter::default().min_value(5_001.0).matches(&sale));

        let window = TransactionFilter::default().start(day(11)).end(day(20));
        assert!(!window.matches(&sale));
        assert!(window.matches(&gift));

        let mut undated = gift.clone();
        undated.transaction_date = None;
        assert!(!window.matches(&undated));
        assert!(TransactionFilter::default().matches(&undated));
    }

    #[test]
    fn groups_filers_across_name_renderings() {
        let entity = EntityRef {
            entity_id: "0000783325".into(),
            name: "WEC".into(),
            ticker: None,
        };
        let records = vec![
            record("KLAPPA GALE E", TransactionKind::Sale, 1000.0, Some(50.0), 3),
            record("Smith John", TransactionKind::Purchase, 200.0, Some(40.0), 8),
            record("Klappa, Gale E.", TransactionKind::Exercise, 500.0, None, 15),
        ];
        let activity = EntityActivity::from_records(&entity, day(1), day(31), records);

        assert_eq!(activity.transaction_count, 3);
        assert_eq!(activity.insider_count(), 2);
        // Most recent first: Klappa's exercise on the 15th.
        let klappa = &activity.insiders[0];
        assert_eq!(klappa.person_name, "Klappa, Gale E.");
        assert_eq!(klappa.transaction_count, 2);
        assert_eq!(klappa.shares_bought, 500.0);
        assert_eq!(klappa.shares_sold, 1000.0);
        assert_eq!(klappa.net_shares, -500.0);
        assert_eq!(klappa.value_sold, 50_000.0);
        assert_eq!(klappa.last_transaction, Some(day(15)));

        assert_eq!(activity.shares_bought, 700.0);
        assert_eq!(activity.shares_sold, 1000.0);
        assert_eq!(activity.buy_sell_ratio, Some(0.7));
        assert_eq!(activity.recent[0].transaction_date, Some(day(15)));
    }

    #[test]
    fn no_sales_means_no_ratio() {
        let entity = EntityRef {
            entity_id: "1".into(),
            name: "Acme".into(),
            ticker: None,
        };
        let activity = EntityActivity::from_records(
            &entity,
            day(1),
            day(31),
            vec![record("Doe Jane", TransactionKind::Purchase, 10.0, Some(1.0), 2)],
        );
        assert_eq!(activity.buy_sell_ratio, None);
        assert!(EntityActivity::from_records(&entity, day(1), day(31), Vec::new()).insiders.is_empty());
    }
}
