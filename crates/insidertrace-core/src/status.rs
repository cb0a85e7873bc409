//! Relationship status classification and per-entity summaries.

use chrono::NaiveDate;

use crate::record::{
    EntityRef, EntityRelationshipSummary, RelationshipStatus, SearchSummary, TransactionRecord,
};

/// A last transaction at most this many days old means the link is current.
pub const CURRENT_WITHIN_DAYS: i64 = 365;
/// A last transaction at least this many days old means the link is former.
pub const FORMER_AFTER_DAYS: i64 = 730;
/// Role assumed when no record carries one.
pub const DEFAULT_ROLE: &str = "Director";

/// Classify a person-entity link by the recency of its last transaction.
pub fn classify_status(last: Option<NaiveDate>, today: NaiveDate) -> RelationshipStatus {
    let Some(last) = last else {
        return RelationshipStatus::Unknown;
    };
    let days = (today - last).num_days();
    if days <= CURRENT_WITHIN_DAYS {
        RelationshipStatus::Current
    } else if days >= FORMER_AFTER_DAYS {
        RelationshipStatus::Former
    } else {
        RelationshipStatus::Unknown
    }
}

impl EntityRelationshipSummary {
    /// Aggregate the target person's records at one entity.
    pub fn from_records(
        entity: &EntityRef,
        records: &[TransactionRecord],
        today: NaiveDate,
    ) -> Self {
        let mut shares_bought = 0.0;
        let mut shares_sold = 0.0;
        let mut value_bought = 0.0;
        let mut value_sold = 0.0;
        for r in records {
            if r.kind.is_acquisition() {
                shares_bought += r.shares;
                value_bought += r.total_value.unwrap_or(0.0);
            } else if r.kind.is_disposition() {
                shares_sold += r.shares;
                value_sold += r.total_value.unwrap_or(0.0);
            }
        }

        let dates = records.iter().filter_map(|r| r.transaction_date);
        let first_transaction = dates.clone().min();
        let last_transaction = dates.max();

        let role = records
            .iter()
            .max_by_key(|r| r.transaction_date)
            .and_then(|r| r.person_role.clone())
            .unwrap_or_else(|| DEFAULT_ROLE.to_string());

        // Prefer what the documents say over what the discovery source said.
        let latest = records.iter().max_by_key(|r| r.document_date);
        let entity_name = latest
            .map(|r| r.entity_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| entity.name.clone());
        let ticker = latest
            .and_then(|r| r.ticker.clone())
            .or_else(|| entity.ticker.clone());

        Self {
            entity_id: entity.entity_id.clone(),
            entity_name,
            ticker,
            status: classify_status(last_transaction, today),
            role: Some(role),
            transaction_count: records.len(),
            shares_bought,
            shares_sold,
            net_shares: shares_bought - shares_sold,
            value_bought,
            value_sold,
            first_transaction,
            last_transaction,
            verified: true,
        }
    }

    /// Summary built from index hits alone, when no document could be read.
    pub fn from_index_metadata(
        entity: &EntityRef,
        document_count: usize,
        first: Option<NaiveDate>,
        last: Option<NaiveDate>,
    ) -> Self {
        Self {
            entity_id: entity.entity_id.clone(),
            entity_name: entity.name.clone(),
            ticker: entity.ticker.clone(),
            status: RelationshipStatus::Unknown,
            role: Some(DEFAULT_ROLE.to_string()),
            transaction_count: document_count,
            shares_bought: 0.0,
            shares_sold: 0.0,
            net_shares: 0.0,
            value_bought: 0.0,
            value_sold: 0.0,
            first_transaction: first,
            last_transaction: last,
            verified: false,
        }
    }
}

/// Most recent activity first; undated entities last.
pub fn sort_by_recency(entities: &mut [EntityRelationshipSummary]) {
    entities.sort_by(|a, b| match (a.last_transaction, b.last_transaction) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

pub fn summarize(entities: &[EntityRelationshipSummary]) -> SearchSummary {
    SearchSummary {
        total_entities: entities.len(),
        current_count: entities
            .iter()
            .filter(|e| e.status == RelationshipStatus::Current)
            .count(),
        former_count: entities
            .iter()
            .filter(|e| e.status == RelationshipStatus::Former)
            .count(),
        total_transactions: entities.iter().map(|e| e.transaction_count).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Ownership, TransactionKind};
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn entity() -> EntityRef {
        EntityRef {
            entity_id: "0000783325".into(),
            name: "WEC ENERGY GROUP".into(),
            ticker: None,
        }
    }

    fn record(kind: TransactionKind, shares: f64, price: Option<f64>, days_ago: i64) -> TransactionRecord {
        let date = today() - Duration::days(days_ago);
        TransactionRecord {
            person_name: "KLAPPA GALE E".into(),
            person_role: None,
            entity_name: "WEC Energy Group, Inc.".into(),
            entity_id: "0000783325".into(),
            ticker: Some("WEC".into()),
            transaction_date: Some(date),
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
            document_date: Some(date),
            document_id: format!("doc-{days_ago}"),
            form_type: "4".into(),
        }
    }

    #[test]
    fn status_thresholds() {
        let t = today();
        let ago = |d: i64| Some(t - Duration::days(d));
        assert_eq!(classify_status(ago(30), t), RelationshipStatus::Current);
        assert_eq!(classify_status(ago(365), t), RelationshipStatus::Current);
        assert_eq!(classify_status(ago(500), t), RelationshipStatus::Unknown);
        assert_eq!(classify_status(ago(730), t), RelationshipStatus::Former);
        assert_eq!(classify_status(ago(800), t), RelationshipStatus::Former);
        assert_eq!(classify_status(None, t), RelationshipStatus::Unknown);
    }

    #[test]
    fn summary_totals() {
        let mut latest = record(TransactionKind::Sale, 400.0, Some(50.0), 10);
        latest.person_role = Some("Executive Chairman".into());
        let records = vec![
            record(TransactionKind::Purchase, 1000.0, Some(40.0), 900),
            record(TransactionKind::Exercise, 500.0, None, 100),
            record(TransactionKind::Gift, 50.0, None, 60),
            latest,
        ];
        let s = EntityRelationshipSummary::from_records(&entity(), &records, today());
        assert_eq!(s.transaction_count, 4);
        assert_eq!(s.shares_bought, 1500.0);
        assert_eq!(s.shares_sold, 400.0);
        assert_eq!(s.net_shares, 1100.0);
        assert_eq!(s.value_bought, 40_000.0);
        assert_eq!(s.value_sold, 20_000.0);
        assert_eq!(s.first_transaction, Some(today() - Duration::days(900)));
        assert_eq!(s.last_transaction, Some(today() - Duration::days(10)));
        assert_eq!(s.status, RelationshipStatus::Current);
        assert_eq!(s.role.as_deref(), Some("Executive Chairman"));
        assert_eq!(s.entity_name, "WEC Energy Group, Inc.");
        assert_eq!(s.ticker.as_deref(), Some("WEC"));
        assert!(s.verified);
    }

    #[test]
    fn role_defaults_to_director() {
        let records = vec![record(TransactionKind::Purchase, 1.0, None, 800)];
        let s = EntityRelationshipSummary::from_records(&entity(), &records, today());
        assert_eq!(s.role.as_deref(), Some(DEFAULT_ROLE));
        assert_eq!(s.status, RelationshipStatus::Former);
    }

    #[test]
    fn degraded_summary_is_unknown_and_unverified() {
        let s = EntityRelationshipSummary::from_index_metadata(&entity(), 3, None, Some(today()));
        assert_eq!(s.status, RelationshipStatus::Unknown);
        assert_eq!(s.transaction_count, 3);
        assert!(!s.verified);
        assert_eq!(s.entity_name, "WEC ENERGY GROUP");
    }

    #[test]
    fn sort_puts_undated_last() {
        let mut undated = EntityRelationshipSummary::from_index_metadata(&entity(), 1, None, None);
        undated.entity_id = "undated".into();
        let old = EntityRelationshipSummary::from_records(
            &entity(),
            &[record(TransactionKind::Sale, 1.0, None, 900)],
            today(),
        );
        let new = EntityRelationshipSummary::from_records(
            &entity(),
            &[record(TransactionKind::Sale, 1.0, None, 5)],
            today(),
        );
        let mut list = vec![undated, old, new];
        sort_by_recency(&mut list);
        let days: Vec<_> = list.iter().map(|e| e.last_transaction).collect();
        assert_eq!(
            days,
            vec![
                Some(today() - Duration::days(5)),
                Some(today() - Duration::days(900)),
                None
            ]
        );

        let summary = summarize(&list);
        assert_eq!(summary.total_entities, 3);
        assert_eq!(summary.current_count, 1);
        assert_eq!(summary.former_count, 1);
        assert_eq!(summary.total_transactions, 3);
    }
}
