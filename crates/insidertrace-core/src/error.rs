use thiserror::Error;

/// Failure to turn raw disclosure text into an element tree.
#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("markup error: {0}")]
    Xml(String),

    #[error("document truncated with {open} element(s) still open")]
    Truncated { open: usize },

    #[error("document has no elements")]
    Empty,
}

/// A single transaction or holding element that could not be turned into a record.
#[derive(Debug, Error, PartialEq)]
pub enum ElementError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unparseable number in `{field}`: {raw:?}")]
    BadNumber { field: &'static str, raw: String },

    #[error("negative share quantity {0}")]
    NegativeQuantity(f64),
}
