use insidertrace_edgar::FetchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("person name is empty")]
    EmptyName,
    #[error("entity directory unavailable: {0}")]
    DirectoryUnavailable(#[source] FetchError),
    #[error("full-text index unavailable: {0}")]
    IndexUnavailable(#[source] FetchError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}
