//! Signer capabilities owned by validator modules.
//!
//! A validator never exposes its raw key material; it only exposes signature
//! outputs produced through one of these signers.

mod r#dyn;
pub use r#dyn::DynSigner;

mod webauthn;
pub use webauthn::WebAuthnSigner;

use alloy::primitives::{B256, Bytes};

/// Trait for anything that can sign a 32-byte payload hash.
#[async_trait::async_trait]
pub trait PayloadSigner: std::fmt::Debug + Send + Sync {
    /// Signs the payload hash, returning the validator-specific signature
    /// bytes.
    async fn sign_payload_hash(&self, payload_hash: B256) -> eyre::Result<Bytes>;
}
