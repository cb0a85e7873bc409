//! Shared record types passed between extraction, search, and reporting.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What happened in a disclosed ownership event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    Sale,
    Gift,
    Conversion,
    Exercise,
    Other,
}

impl TransactionKind {
    /// Map a single-letter transaction code to its kind.
    ///
    /// F (tax withholding) and D (disposition to issuer) count as sales,
    /// A (grant/award) counts as a purchase. Unlisted codes are `Other`.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "P" | "A" => Self::Purchase,
            "S" | "F" | "D" => Self::Sale,
            "G" => Self::Gift,
            "C" => Self::Conversion,
            "M" | "X" => Self::Exercise,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Sale => "sale",
            Self::Gift => "gift",
            Self::Conversion => "conversion",
            Self::Exercise => "exercise",
            Self::Other => "other",
        }
    }

    /// Kinds that add to the filer's position.
    pub fn is_acquisition(&self) -> bool {
        matches!(self, Self::Purchase | Self::Exercise)
    }

    pub fn is_disposition(&self) -> bool {
        matches!(self, Self::Sale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    Direct,
    Indirect,
}

/// One disclosed ownership event or holding snapshot.
///
/// Built once by the extractor and never mutated. A holding-only record
/// (no transaction took place) has `shares == 0.0` and `shares_owned_after`
/// set to the reported holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Filer name as printed in the document.
    pub person_name: String,
    /// Comma-joined role label, e.g. "Director, Chief Executive Officer".
    pub person_role: Option<String>,
    pub entity_name: String,
    /// Ten-digit zero-padded issuer identifier.
    pub entity_id: String,
    pub ticker: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub kind: TransactionKind,
    /// Raw code as filed, when the document carried one.
    pub transaction_code: Option<String>,
    pub security_title: String,
    pub shares: f64,
    pub price_per_share: Option<f64>,
    /// `shares * price_per_share`; `None` whenever the price is absent.
    pub total_value: Option<f64>,
    /// Conversion or exercise price of a derivative security.
    pub exercise_price: Option<f64>,
    pub ownership: Ownership,
    /// Post-transaction balance; for derivatives, the underlying share count.
    pub shares_owned_after: Option<f64>,
    pub is_derivative: bool,
    pub is_holding: bool,
    pub document_date: Option<NaiveDate>,
    pub document_id: String,
    /// Document revision tag such as "4" or "4/A".
    pub form_type: String,
}

/// Current/former classification of a person-entity link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    Current,
    Former,
    Unknown,
}

impl RelationshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Former => "former",
            Self::Unknown => "unknown",
        }
    }
}

/// Identity of an entity as known to a discovery source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_id: String,
    pub name: String,
    pub ticker: Option<String>,
}

/// Per (person, entity) aggregate, recomputed on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRelationshipSummary {
    pub entity_id: String,
    pub entity_name: String,
    pub ticker: Option<String>,
    pub status: RelationshipStatus,
    pub role: Option<String>,
    pub transaction_count: usize,
    pub shares_bought: f64,
    pub shares_sold: f64,
    pub net_shares: f64,
    pub value_bought: f64,
    pub value_sold: f64,
    pub first_transaction: Option<NaiveDate>,
    pub last_transaction: Option<NaiveDate>,
    /// False when built from index metadata only, without extracting documents.
    pub verified: bool,
}

/// Where a generated name rendering came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantSource {
    Original,
    Normalized,
    Reordered,
    NicknameExpanded,
    Initialed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameVariant {
    pub text: String,
    pub source: VariantSource,
}

/// Discovery strategy that produced a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Indexed,
    Exhaustive,
    /// The caller named the entity; no discovery ran.
    Direct,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indexed => "indexed",
            Self::Exhaustive => "exhaustive",
            Self::Direct => "direct",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub total_entities: usize,
    pub current_count: usize,
    pub former_count: usize,
    pub total_transactions: usize,
}

/// Top-level answer to "where has this person been an insider".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub person_name: String,
    pub as_of: NaiveDate,
    pub strategy: Strategy,
    pub summary: SearchSummary,
    pub entities: Vec<EntityRelationshipSummary>,
    /// Set when nothing was found, to help the caller retry.
    pub message: Option<String>,
    pub name_variations_tried: Vec<String>,
    /// True when the search stopped early (budget, deadline, or upstream quota).
    pub incomplete: bool,
    pub incomplete_reason: Option<String>,
    pub entities_searched: usize,
}

/// A board seat reported by the roster extractor.
///
/// Produced elsewhere; consumed by the aggregation reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardPosition {
    pub person_name: String,
    pub entity_name: String,
    pub entity_id: String,
    pub ticker: Option<String>,
    pub title: String,
    pub status: RelationshipStatus,
    pub appointed: Option<NaiveDate>,
    pub departed: Option<NaiveDate>,
    #[serde(default)]
    pub committees: Vec<String>,
    pub source_document: String,
}
