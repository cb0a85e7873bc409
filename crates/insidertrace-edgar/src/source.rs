//! Collaborator contracts for discovering and reading disclosure documents.

use async_trait::async_trait;
use chrono::{Months, NaiveDate};
use insidertrace_core::EntityRef;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// `[today - years, today]`.
    pub fn years_back(today: NaiveDate, years: u32) -> Self {
        let start = today
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexQuery {
    /// Searched as an exact phrase.
    pub phrase: String,
    pub document_type: String,
    pub range: DateRange,
    pub page_size: usize,
}

/// One relevance-ranked hit from the full-text index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    pub document_id: String,
    pub entity_name: String,
    pub entity_id: String,
    pub ticker: Option<String>,
    pub date: Option<NaiveDate>,
    pub url: String,
    pub score: f64,
}

impl IndexHit {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef {
            entity_id: self.entity_id.clone(),
            name: self.entity_name.clone(),
            ticker: self.ticker.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub ticker: Option<String>,
    pub name: String,
    pub entity_id: String,
}

impl DirectoryEntry {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef {
            entity_id: self.entity_id.clone(),
            name: self.name.clone(),
            ticker: self.ticker.clone(),
        }
    }
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Raw text of the document at `url`.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[async_trait]
pub trait DocumentLister: Send + Sync {
    /// Document URLs filed for an entity. May contain duplicates.
    async fn list_documents(
        &self,
        entity_id: &str,
        document_type: &str,
        range: &DateRange,
    ) -> Result<Vec<String>, FetchError>;
}

#[async_trait]
pub trait FullTextIndex: Send + Sync {
    /// Best-effort search. An empty result does not mean nothing exists.
    async fn search(&self, query: &IndexQuery) -> Result<Vec<IndexHit>, FetchError>;
}

#[async_trait]
pub trait EntityDirectory: Send + Sync {
    /// Full snapshot of known entities.
    async fn entities(&self) -> Result<Vec<DirectoryEntry>, FetchError>;
}
