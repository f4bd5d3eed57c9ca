use thiserror::Error;

/// Errors related to validator modules and signature assembly.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// An enable-mode signature was requested before the sudo validator's
    /// enable approval was stored on the plugin validator.
    #[error("enable signature not set; run the plugin approval flow first")]
    EnableSignatureMissing,
    /// A regular (plugin) validator was configured without a sudo validator.
    #[error("a regular validator requires a sudo validator")]
    RegularWithoutSudo,
    /// A validity timestamp does not fit the 48-bit wire field.
    #[error("{field} {value} exceeds the 48-bit validity range")]
    WindowOutOfRange {
        /// Which window bound was out of range.
        field: &'static str,
        /// The rejected value.
        value: u64,
    },
    /// The underlying ECDSA signer failed.
    #[error(transparent)]
    Signer(#[from] alloy::signers::Error),
    /// The underlying P-256/WebAuthn signer failed.
    #[error("webauthn signer error: {0}")]
    WebAuthn(#[source] eyre::Error),
}
