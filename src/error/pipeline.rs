use thiserror::Error;

/// Errors raised by the user-operation middleware pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required numeric fields were still unresolved after all middleware
    /// stages ran. Carries a diagnostic dump of the partial struct.
    #[error("user operation incomplete after pipeline, missing {missing:?}: {op}")]
    IncompleteUserOperation {
        /// Wire names of the unresolved fields.
        missing: Vec<&'static str>,
        /// Debug dump of the partial draft.
        op: String,
    },
    /// The latest block had no EIP-1559 base fee, so fees cannot be derived.
    #[error("no base fee available on this chain")]
    MissingBaseFee,
    /// A custom middleware stage failed.
    #[error("custom middleware failed: {0}")]
    Middleware(#[source] eyre::Error),
}
