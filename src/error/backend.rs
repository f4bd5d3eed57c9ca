use thiserror::Error;

/// Errors raised by the project backend API.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The chain-id lookup for a project returned nothing. Fatal to account
    /// initialization.
    #[error("ChainId not found")]
    ChainIdNotFound,
    /// The backend returned a non-success status.
    #[error("backend returned status {0}")]
    Status(u16),
    /// Transport-level failure talking to the backend.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
