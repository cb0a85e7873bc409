use std::time::Duration;

use insidertrace_core::EntityRef;
use serde::{Deserialize, Serialize};

/// Which discovery path a search may take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyHint {
    /// Full-text index first, enumerating every entity if the index is down.
    #[default]
    Auto,
    /// Full-text index only; an unreachable index is an error.
    IndexedOnly,
    /// Scan every entity in the directory.
    Exhaustive,
}

/// Tuning shared by every search an orchestrator runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Entities scanned in parallel.
    pub concurrency: usize,
    /// Name variations sent to the full-text index, most literal first.
    pub index_variations: usize,
    pub index_page_size: usize,
    pub max_documents_per_entity: usize,
    /// Variations reported back to the caller.
    pub diagnostic_variations: usize,
    pub document_type: String,
    pub progress_every: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            index_variations: 3,
            index_page_size: 100,
            max_documents_per_entity: 100,
            diagnostic_variations: 5,
            document_type: "4".to_string(),
            progress_every: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub person_name: String,
    pub include_former: bool,
    pub min_transactions: usize,
    pub years_back: u32,
    pub strategy: StrategyHint,
    /// Skip discovery and look only at this entity.
    pub entity: Option<EntityRef>,
    /// Stop submitting entity scans after this many.
    pub max_entities: Option<usize>,
    /// Stop submitting entity scans once this much time has passed.
    pub deadline: Option<Duration>,
}

impl SearchRequest {
    pub fn new(person_name: impl Into<String>) -> Self {
        Self {
            person_name: person_name.into(),
            include_former: true,
            min_transactions: 1,
            years_back: 10,
            strategy: StrategyHint::Auto,
            entity: None,
            max_entities: None,
            deadline: None,
        }
    }

    pub fn include_former(mut self, include: bool) -> Self {
        self.include_former = include;
        self
    }

    pub fn min_transactions(mut self, min: usize) -> Self {
        self.min_transactions = min;
        self
    }

    pub fn years_back(mut self, years: u32) -> Self {
        self.years_back = years;
        self
    }

    pub fn strategy(mut self, strategy: StrategyHint) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn entity(mut self, entity: EntityRef) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn max_entities(mut self, max: usize) -> Self {
        self.max_entities = Some(max);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
