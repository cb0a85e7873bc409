//! Cross-entity insider profiles built on top of a search result.

use chrono::NaiveDate;
use serde::Serialize;

use crate::names::NameResolver;
use crate::record::{
    BoardPosition, EntityRelationshipSummary, RelationshipStatus, SearchResult, Strategy,
};

const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    VeryHigh,
    High,
    Moderate,
    Low,
    VeryLow,
}

impl ActivityLevel {
    pub fn from_count(count: usize) -> Self {
        match count {
            50.. => Self::VeryHigh,
            20..=49 => Self::High,
            10..=19 => Self::Moderate,
            5..=9 => Self::Low,
            _ => Self::VeryLow,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryHigh => "Very High",
            Self::High => "High",
            Self::Moderate => "Moderate",
            Self::Low => "Low",
            Self::VeryLow => "Very Low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetPosition {
    Buyer,
    Seller,
    Neutral,
}

impl NetPosition {
    pub fn from_net(net_shares: f64) -> Self {
        if net_shares > 0.0 {
            Self::Buyer
        } else if net_shares < 0.0 {
            Self::Seller
        } else {
            Self::Neutral
        }
    }
}

/// One row of the side-by-side entity comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityComparison {
    pub entity_id: String,
    pub entity_name: String,
    pub ticker: Option<String>,
    pub status: RelationshipStatus,
    pub role: Option<String>,
    pub transaction_count: usize,
    pub shares_bought: f64,
    pub shares_sold: f64,
    pub net_shares: f64,
    pub first_transaction: Option<NaiveDate>,
    pub last_transaction: Option<NaiveDate>,
    pub activity_level: ActivityLevel,
    pub net_position: NetPosition,
}

impl From<&EntityRelationshipSummary> for EntityComparison {
    fn from(s: &EntityRelationshipSummary) -> Self {
        Self {
            entity_id: s.entity_id.clone(),
            entity_name: s.entity_name.clone(),
            ticker: s.ticker.clone(),
            status: s.status,
            role: s.role.clone(),
            transaction_count: s.transaction_count,
            shares_bought: s.shares_bought,
            shares_sold: s.shares_sold,
            net_shares: s.net_shares,
            first_transaction: s.first_transaction,
            last_transaction: s.last_transaction,
            activity_level: ActivityLevel::from_count(s.transaction_count),
            net_position: NetPosition::from_net(s.net_shares),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    FirstTransaction,
    LastTransaction,
    /// Inferred from the last transaction of a former relationship.
    EstimatedDeparture,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub date: NaiveDate,
    pub kind: TimelineEventKind,
    pub entity_name: String,
    pub ticker: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CareerStatistics {
    pub total_entities: usize,
    pub current_count: usize,
    pub former_count: usize,
    pub unknown_count: usize,
    pub total_transactions: usize,
    pub average_transactions_per_entity: f64,
    pub net_buyer_entities: usize,
    pub net_seller_entities: usize,
    pub most_active_entity: Option<String>,
    /// Whole years between the earliest and latest timeline events.
    pub career_span_years: Option<i64>,
    pub average_tenure_years: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rankings {
    pub by_activity: Vec<EntityComparison>,
    pub by_net_shares: Vec<EntityComparison>,
}

/// Everything known about one person across entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsiderProfile {
    pub person_name: String,
    pub as_of: NaiveDate,
    pub strategy: Strategy,
    pub incomplete: bool,
    pub statistics: CareerStatistics,
    /// Ordered by transaction count, most active first.
    pub comparisons: Vec<EntityComparison>,
    pub rankings: Rankings,
    pub timeline: Vec<TimelineEvent>,
    pub current_board_positions: Vec<BoardPosition>,
    pub former_board_positions: Vec<BoardPosition>,
    pub insights: Vec<String>,
}

/// Builds [`InsiderProfile`]s from search results and roster records.
#[derive(Debug, Clone)]
pub struct AggregationReporter {
    resolver: NameResolver,
    top_n: usize,
}

impl Default for AggregationReporter {
    fn default() -> Self {
        Self::new(NameResolver::default())
    }
}

impl AggregationReporter {
    pub fn new(resolver: NameResolver) -> Self {
        Self {
            resolver,
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn build_profile(
        &self,
        result: &SearchResult,
        board_positions: &[BoardPosition],
    ) -> InsiderProfile {
        let mut comparisons: Vec<EntityComparison> =
            result.entities.iter().map(EntityComparison::from).collect();
        comparisons.sort_by(|a, b| b.transaction_count.cmp(&a.transaction_count));

        let mut by_net_shares = comparisons.clone();
        by_net_shares.sort_by(|a, b| b.net_shares.abs().total_cmp(&a.net_shares.abs()));
        by_net_shares.truncate(self.top_n);
        let rankings = Rankings {
            by_activity: comparisons.iter().take(self.top_n).cloned().collect(),
            by_net_shares,
        };

        let timeline = timeline(&result.entities);

        let (current_board_positions, former_board_positions): (Vec<_>, Vec<_>) = board_positions
            .iter()
            .filter(|p| self.resolver.is_match(&result.person_name, &p.person_name))
            .cloned()
            .partition(|p| p.status != RelationshipStatus::Former && p.departed.is_none());

        let statistics = statistics(&result.entities, &comparisons, &timeline);
        let insights = insights(&statistics, current_board_positions.len());

        InsiderProfile {
            person_name: result.person_name.clone(),
            as_of: result.as_of,
            strategy: result.strategy,
            incomplete: result.incomplete,
            statistics,
            comparisons,
            rankings,
            timeline,
            current_board_positions,
            former_board_positions,
            insights,
        }
    }
}

fn timeline(entities: &[EntityRelationshipSummary]) -> Vec<TimelineEvent> {
    let mut events = Vec::new();
    for e in entities {
        let event = |date, kind, description: String| TimelineEvent {
            date,
            kind,
            entity_name: e.entity_name.clone(),
            ticker: e.ticker.clone(),
            description,
        };
        if let Some(first) = e.first_transaction {
            events.push(event(
                first,
                TimelineEventKind::FirstTransaction,
                format!("First insider transaction at {}", e.entity_name),
            ));
        }
        if let Some(last) = e.last_transaction {
            if e.first_transaction != Some(last) {
                events.push(event(
                    last,
                    TimelineEventKind::LastTransaction,
                    format!("Most recent transaction at {}", e.entity_name),
                ));
            }
            if e.status == RelationshipStatus::Former {
                events.push(event(
                    last,
                    TimelineEventKind::EstimatedDeparture,
                    format!("Estimated departure from {} (last transaction)", e.entity_name),
                ));
            }
        }
    }
    events.sort_by_key(|e| e.date);
    events
}

fn statistics(
    entities: &[EntityRelationshipSummary],
    comparisons: &[EntityComparison],
    timeline: &[TimelineEvent],
) -> CareerStatistics {
    let count = |status: RelationshipStatus| entities.iter().filter(|e| e.status == status).count();
    let total_transactions: usize = entities.iter().map(|e| e.transaction_count).sum();

    let career_span_years = match (timeline.first(), timeline.last()) {
        (Some(first), Some(last)) => Some((last.date - first.date).num_days() / 365),
        _ => None,
    };

    let tenures: Vec<f64> = entities
        .iter()
        .filter_map(|e| match (e.first_transaction, e.last_transaction) {
            (Some(first), Some(last)) => Some((last - first).num_days() as f64 / 365.25),
            _ => None,
        })
        .collect();
    let average_tenure_years =
        (!tenures.is_empty()).then(|| tenures.iter().sum::<f64>() / tenures.len() as f64);

    CareerStatistics {
        total_entities: entities.len(),
        current_count: count(RelationshipStatus::Current),
        former_count: count(RelationshipStatus::Former),
        unknown_count: count(RelationshipStatus::Unknown),
        total_transactions,
        average_transactions_per_entity: if entities.is_empty() {
            0.0
        } else {
            total_transactions as f64 / entities.len() as f64
        },
        net_buyer_entities: comparisons
            .iter()
            .filter(|c| c.net_position == NetPosition::Buyer)
            .count(),
        net_seller_entities: comparisons
            .iter()
            .filter(|c| c.net_position == NetPosition::Seller)
            .count(),
        most_active_entity: comparisons.first().map(|c| c.entity_name.clone()),
        career_span_years,
        average_tenure_years,
    }
}

fn insights(stats: &CareerStatistics, current_board_seats: usize) -> Vec<String> {
    let mut out = Vec::new();
    if stats.total_entities > 1 {
        out.push(format!(
            "Multi-entity insider with relationships at {} entities",
            stats.total_entities
        ));
    }
    if stats.current_count > 0 {
        out.push(format!("Currently active at {} entities", stats.current_count));
    }
    if stats.former_count > 0 {
        out.push(format!("Former relationships at {} entities", stats.former_count));
    }
    if stats.total_transactions > 50 {
        out.push("High-activity insider with 50+ transactions".to_string());
    } else if stats.total_transactions > 20 {
        out.push("Moderate-activity insider with 20+ transactions".to_string());
    }
    if current_board_seats > 0 {
        out.push(format!(
            "Currently serves on {current_board_seats} board(s) according to roster filings"
        ));
    }
    out
}
