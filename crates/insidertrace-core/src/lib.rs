pub mod activity;
pub mod clock;
pub mod error;
pub mod extract;
pub mod names;
pub mod record;
pub mod report;
pub mod status;

pub use activity::{EntityActivity, InsiderActivity, TransactionFilter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ElementError, MarkupError};
pub use extract::TransactionExtractor;
pub use names::{NameResolver, normalize_name, similarity};
pub use record::{
    BoardPosition, EntityRef, EntityRelationshipSummary, NameVariant, Ownership,
    RelationshipStatus, SearchResult, SearchSummary, Strategy, TransactionKind,
    TransactionRecord, VariantSource,
};
pub use report::{AggregationReporter, InsiderProfile};
pub use status::classify_status;
