//! Archive access layer: request governance, response caching, and the
//! document sources the search pipeline consumes.

pub mod cache;
pub mod error;
pub mod governor;
pub mod source;

#[cfg(feature = "http")]
pub mod http;

pub use cache::{CacheKey, ResponseCache, TtlClass};
pub use error::FetchError;
pub use governor::{Governor, RateBudget, RateGovernor, Unthrottled};
pub use source::{
    DateRange, DirectoryEntry, DocumentFetcher, DocumentLister, EntityDirectory, FullTextIndex,
    IndexHit, IndexQuery,
};

#[cfg(feature = "http")]
pub use http::{EdgarClient, EdgarConfig};
