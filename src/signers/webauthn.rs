//! P-256 signer producing WebAuthn assertion envelopes.

use super::PayloadSigner;
use crate::types::WebAuthnAuth;
use alloy::{
    primitives::{B256, Bytes, U256, bytes},
    signers::k256::sha2::{Digest, Sha256},
    sol_types::SolValue,
};
use base64::Engine;
use p256::ecdsa::{SigningKey, signature::hazmat::PrehashSigner};
use serde_json::json;
use std::sync::Arc;

/// A P-256 signer that wraps its signatures in the WebAuthn assertion
/// envelope the passkey validator modules verify on-chain.
///
/// In a browser the assertion comes from the WebAuthn API; this signer stands
/// in for it wherever the SDK holds the P-256 key directly (tests, gas
/// estimation, server-side passkeys).
#[derive(Debug, Clone)]
pub struct WebAuthnSigner {
    key: Arc<SigningKey>,
    origin: String,
}

impl WebAuthnSigner {
    /// Loads a P-256 key, attributing assertions to `origin`.
    pub fn load(key: &B256, origin: impl Into<String>) -> eyre::Result<Self> {
        Ok(Self { key: Arc::new(SigningKey::from_slice(key.as_slice())?), origin: origin.into() })
    }

    /// Returns the signer's uncompressed public key, `x ‖ y` (64 bytes).
    pub fn public_key(&self) -> Bytes {
        self.key.verifying_key().to_encoded_point(false).to_bytes()[1..].to_vec().into()
    }

    /// Signs a prehashed digest, low-S normalized.
    fn sign_prehash(&self, digest: &[u8]) -> eyre::Result<p256::ecdsa::Signature> {
        Ok(self
            .key
            .sign_prehash(digest)
            .map(|s: p256::ecdsa::Signature| s.normalize_s().unwrap_or(s))?)
    }
}

#[async_trait::async_trait]
impl PayloadSigner for WebAuthnSigner {
    async fn sign_payload_hash(&self, payload_hash: B256) -> eyre::Result<Bytes> {
        // RP ID hash || UserPresent flag || signature counter.
        let authenticator_data = bytes!(
            "4242424242424242424242424242424242424242424242424242424242424242"
            "01"
            "00000000"
        );

        let challenge_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload_hash);
        let client_data = json!({
            "type": "webauthn.get",
            "challenge": challenge_b64,
            "origin": self.origin,
            "crossOrigin": false
        });
        let client_data_json = serde_json::to_string(&client_data)?;

        // digest = SHA256(authenticatorData || SHA256(clientDataJSON))
        let mut hasher = Sha256::new();
        hasher.update(&authenticator_data);
        hasher.update(Sha256::digest(client_data_json.as_bytes()));
        let digest = hasher.finalize();

        let signature = self.sign_prehash(&digest)?;

        let challenge_index =
            U256::from(client_data_json.find("\"challenge\":").expect("should exist"));
        let type_index = U256::from(client_data_json.find("\"type\":").expect("should exist"));

        Ok(WebAuthnAuth {
            authenticatorData: authenticator_data,
            clientDataJSON: client_data_json,
            challengeIndex: challenge_index,
            typeIndex: type_index,
            r: B256::from_slice(signature.r().to_bytes().as_slice()),
            s: B256::from_slice(signature.s().to_bytes().as_slice()),
        }
        .abi_encode()
        .into())
    }
}
