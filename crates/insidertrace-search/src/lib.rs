//! Cross-entity search: resolves a person to every entity where they have
//! filed ownership disclosures.

pub mod config;
pub mod error;
pub mod orchestrator;

pub use config::{SearchConfig, SearchRequest, StrategyHint};
pub use error::SearchError;
pub use orchestrator::{SearchOrchestrator, Sources};
