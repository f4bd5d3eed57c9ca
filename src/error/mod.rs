//! Kernel SDK error types.

use alloy::transports::TransportErrorKind;
use thiserror::Error;

mod account;
pub use account::AccountError;

mod backend;
pub use backend::BackendError;

mod config;
pub use config::ConfigError;

mod paymaster;
pub use paymaster::PaymasterError;

mod pipeline;
pub use pipeline::PipelineError;

mod validator;
pub use validator::ValidatorError;

/// The overarching error type returned by SDK operations.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Errors raised while assembling configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Errors related to the Kernel account itself.
    #[error(transparent)]
    Account(#[from] AccountError),
    /// Errors related to validator modules and signature assembly.
    #[error(transparent)]
    Validator(#[from] ValidatorError),
    /// Errors raised by the middleware pipeline.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// Errors raised by the paymaster policy or its API.
    #[error(transparent)]
    Paymaster(#[from] PaymasterError),
    /// Errors raised by the project backend API.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// An error occurred during ABI encoding/decoding.
    #[error(transparent)]
    Abi(#[from] alloy::sol_types::Error),
    /// An error occurred calling a contract.
    #[error(transparent)]
    Contract(#[from] alloy::contract::Error),
    /// An error occurred talking to RPC.
    #[error(transparent)]
    Rpc(#[from] alloy::transports::RpcError<TransportErrorKind>),
    /// An internal error occurred.
    #[error(transparent)]
    Internal(#[from] eyre::Error),
}
