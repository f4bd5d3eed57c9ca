//! ECDSA signer abstraction.

use super::PayloadSigner;
use alloy::{
    network::{FullSigner, TxSigner},
    primitives::{Address, B256, Bytes, Signature},
    signers::{Signer, local::PrivateKeySigner},
};
use std::{fmt, ops::Deref, str::FromStr, sync::Arc};

/// Abstraction over an owned ECDSA signer (local key or remote).
#[derive(Clone)]
pub struct DynSigner(pub Arc<dyn FullSigner<Signature> + Send + Sync>);

impl fmt::Debug for DynSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DynSigner").field(&self.address()).finish()
    }
}

impl DynSigner {
    /// Loads a private key from its hex representation.
    pub fn from_signing_key(key: &str) -> eyre::Result<Self> {
        Ok(Self(Arc::new(PrivateKeySigner::from_str(key)?)))
    }

    /// Loads a private key from raw bytes.
    pub fn from_bytes(key: &B256) -> eyre::Result<Self> {
        Ok(Self(Arc::new(PrivateKeySigner::from_bytes(key)?)))
    }

    /// Returns the signer's Ethereum address.
    pub fn address(&self) -> Address {
        TxSigner::address(&self.0)
    }
}

impl Deref for DynSigner {
    type Target = dyn FullSigner<Signature> + Send + Sync;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[async_trait::async_trait]
impl PayloadSigner for DynSigner {
    async fn sign_payload_hash(&self, payload_hash: B256) -> eyre::Result<Bytes> {
        Ok(self.sign_hash(&payload_hash).await?.as_bytes().into())
    }
}
