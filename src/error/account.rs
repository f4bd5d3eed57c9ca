use alloy::primitives::Address;
use thiserror::Error;

/// Errors related to the Kernel account.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The counterfactual address could not be derived from the entry point.
    #[error("could not derive sender address from init code")]
    AddressDerivationFailed,
    /// An operation that needs a connected validator ran before one was set.
    #[error("account/validator not connected")]
    ValidatorNotConnected,
    /// EIP-6492 signing failed.
    ///
    /// The original cause is logged but intentionally not carried here;
    /// callers cannot distinguish failure causes programmatically.
    #[error("message signing with EIP-6492 failed")]
    Eip6492SigningFailed,
    /// The account's implementation address is not a known Kernel version.
    #[error("unknown kernel implementation {0}")]
    UnknownImplementation(Address),
}
