use thiserror::Error;

/// Errors raised while assembling configuration. All of these are detected
/// synchronously, before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No project id was provided.
    #[error("missing project id")]
    MissingProjectId,
    /// A required URL was missing or invalid.
    #[error("invalid {what} url: {value}")]
    InvalidUrl {
        /// Which URL field was rejected.
        what: &'static str,
        /// The offending value.
        value: String,
    },
    /// The fee buffer percentage is out of range.
    #[error("fee buffer of {0}% is not plausible")]
    InvalidFeeBuffer(u64),
}
