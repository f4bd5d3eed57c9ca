//! Passkey (WebAuthn) validators.

use super::{KernelValidator, ValidatorBase, ValidatorConfig};
use crate::{
    error::ValidatorError,
    signers::{PayloadSigner, WebAuthnSigner},
    types::{UserOperationRequest, WebAuthnAuth},
};
use alloy::{
    primitives::{Address, B256, Bytes, ChainId, U256},
    sol_types::SolValue,
};
use std::sync::Arc;

/// Validator backed by a P-256 passkey credential.
///
/// Signatures are WebAuthn assertion envelopes; the enable data is the
/// credential's uncompressed public key (`x ‖ y`).
#[derive(Debug)]
pub struct PasskeyValidator {
    base: ValidatorBase,
    signer: WebAuthnSigner,
}

impl PasskeyValidator {
    /// Creates a passkey validator for `signer`'s credential.
    pub fn new(base: ValidatorBase, signer: WebAuthnSigner) -> Self {
        Self { base, signer }
    }
}

pub(super) fn factory(base: ValidatorBase, config: ValidatorConfig) -> Arc<dyn KernelValidator> {
    let ValidatorConfig::Passkey { signer } = config else {
        unreachable!("registry keyed by tag");
    };
    Arc::new(PasskeyValidator::new(base, signer))
}

pub(super) fn multichain_factory(
    base: ValidatorBase,
    config: ValidatorConfig,
) -> Arc<dyn KernelValidator> {
    let ValidatorConfig::MultiChainPasskey { signer } = config else {
        unreachable!("registry keyed by tag");
    };
    Arc::new(MultiChainPasskeyValidator(PasskeyValidator::new(base, signer)))
}

/// A stand-in assertion with the shape of a real one, for gas estimation.
fn stub_envelope() -> Bytes {
    let client_data_json = concat!(
        r#"{"type":"webauthn.get","challenge":"","#,
        r#""origin":"https://stub.invalid","crossOrigin":false}"#
    );
    WebAuthnAuth {
        authenticatorData: vec![0xff; 37].into(),
        clientDataJSON: client_data_json.into(),
        challengeIndex: U256::from(client_data_json.find("\"challenge\":").unwrap_or_default()),
        typeIndex: U256::from(1),
        r: B256::repeat_byte(0xff),
        s: B256::repeat_byte(0x7f),
    }
    .abi_encode()
    .into()
}

#[async_trait::async_trait]
impl KernelValidator for PasskeyValidator {
    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    async fn enable_data(&self) -> Result<Bytes, ValidatorError> {
        Ok(self.signer.public_key())
    }

    async fn sign_hash(&self, hash: B256) -> Result<Bytes, ValidatorError> {
        self.signer.sign_payload_hash(hash).await.map_err(ValidatorError::WebAuthn)
    }

    async fn sign_typed_digest(&self, digest: B256) -> Result<Bytes, ValidatorError> {
        // WebAuthn has no unwrapped signing path; typed digests get the same
        // assertion envelope.
        self.sign_hash(digest).await
    }

    fn stub_signature(&self) -> Bytes {
        stub_envelope()
    }
}

/// Passkey validator whose signing hash is chain-agnostic, so one assertion
/// can authorize the same operation on several chains.
#[derive(Debug)]
pub struct MultiChainPasskeyValidator(PasskeyValidator);

impl MultiChainPasskeyValidator {
    /// Creates a multi-chain passkey validator for `signer`'s credential.
    pub fn new(base: ValidatorBase, signer: WebAuthnSigner) -> Self {
        Self(PasskeyValidator::new(base, signer))
    }
}

#[async_trait::async_trait]
impl KernelValidator for MultiChainPasskeyValidator {
    fn base(&self) -> &ValidatorBase {
        self.0.base()
    }

    async fn enable_data(&self) -> Result<Bytes, ValidatorError> {
        self.0.enable_data().await
    }

    async fn sign_hash(&self, hash: B256) -> Result<Bytes, ValidatorError> {
        self.0.sign_hash(hash).await
    }

    async fn sign_typed_digest(&self, digest: B256) -> Result<Bytes, ValidatorError> {
        self.0.sign_typed_digest(digest).await
    }

    fn stub_signature(&self) -> Bytes {
        self.0.stub_signature()
    }

    /// The chain id is zeroed out of the hash inputs so the same signature
    /// verifies on every chain the account exists on.
    fn user_op_hash(
        &self,
        op: &UserOperationRequest,
        entry_point: Address,
        _chain_id: ChainId,
    ) -> B256 {
        op.hash(entry_point, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::ENTRYPOINT_V06,
        types::{UserOperation, ValidatorMode},
    };
    use alloy::primitives::{address, b256, bytes};

    fn signer() -> WebAuthnSigner {
        WebAuthnSigner::load(
            &b256!("0x2222222222222222222222222222222222222222222222222222222222222222"),
            "https://example.org",
        )
        .unwrap()
    }

    fn base(mode: ValidatorMode) -> ValidatorBase {
        ValidatorBase::new(
            address!("0x1000000000000000000000000000000000000001"),
            mode,
            1,
            ENTRYPOINT_V06,
        )
    }

    #[tokio::test]
    async fn enable_data_is_the_public_key() {
        let validator = PasskeyValidator::new(base(ValidatorMode::Sudo), signer());
        assert_eq!(validator.enable_data().await.unwrap().len(), 64);
    }

    #[test]
    fn stub_envelope_decodes() {
        let validator = PasskeyValidator::new(base(ValidatorMode::Sudo), signer());
        let auth = WebAuthnAuth::abi_decode(&validator.stub_signature()).unwrap();
        assert_eq!(auth.authenticatorData.len(), 37);
    }

    #[test]
    fn multichain_hash_is_chain_agnostic() {
        let op = UserOperation {
            sender: address!("0x7b9fc63d6d9e8f94e90d1b0abfc3f611de2638d0"),
            call_gas_limit: Some(U256::from(1)),
            verification_gas_limit: Some(U256::from(1)),
            pre_verification_gas: Some(U256::from(1)),
            max_fee_per_gas: Some(U256::from(1)),
            max_priority_fee_per_gas: Some(U256::from(1)),
            call_data: bytes!("0x940d3c60"),
            ..Default::default()
        }
        .into_request()
        .unwrap();

        let single = PasskeyValidator::new(base(ValidatorMode::Sudo), signer());
        let multi = MultiChainPasskeyValidator::new(base(ValidatorMode::Sudo), signer());

        assert_ne!(
            single.user_op_hash(&op, ENTRYPOINT_V06, 1),
            single.user_op_hash(&op, ENTRYPOINT_V06, 137),
        );
        assert_eq!(
            multi.user_op_hash(&op, ENTRYPOINT_V06, 1),
            multi.user_op_hash(&op, ENTRYPOINT_V06, 137),
        );
    }
}
