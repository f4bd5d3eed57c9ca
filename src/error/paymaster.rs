use thiserror::Error;

/// Errors raised by the paymaster policy or its HTTP API.
#[derive(Debug, Error)]
pub enum PaymasterError {
    /// The policy mandates sponsorship and the paymaster declined. The
    /// operation fails rather than falling back to a self-paid transaction.
    #[error("paymaster declined to sponsor this operation")]
    SponsorshipDeclined,
    /// The paymaster API returned a payload the SDK could not interpret.
    #[error("invalid paymaster response: {0}")]
    InvalidResponse(String),
    /// Transport-level failure talking to the paymaster API.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
