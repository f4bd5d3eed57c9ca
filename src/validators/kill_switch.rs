//! Guardian-operated kill switch validator.

use super::{KernelValidator, ValidatorBase, ValidatorConfig};
use crate::{constants::STUB_ECDSA_SIGNATURE, error::ValidatorError, signers::DynSigner};
use alloy::{
    primitives::{Address, B256, Bytes, aliases::U192, keccak256},
    signers::Signer,
};
use std::sync::Arc;

/// Validator that lets a guardian pause the account until a timestamp.
///
/// The guardian signs over `pauseUntil ‖ userOpHash` so a captured signature
/// cannot be replayed with a longer pause.
#[derive(Debug)]
pub struct KillSwitchValidator {
    base: ValidatorBase,
    guardian: DynSigner,
    pause_until: u64,
}

impl KillSwitchValidator {
    /// Creates a kill switch validator pausing until `pause_until`.
    pub fn new(base: ValidatorBase, guardian: DynSigner, pause_until: u64) -> Self {
        Self { base, guardian, pause_until }
    }

    /// The guardian authorized to pause.
    pub fn guardian(&self) -> Address {
        self.guardian.address()
    }
}

pub(super) fn factory(base: ValidatorBase, config: ValidatorConfig) -> Arc<dyn KernelValidator> {
    let ValidatorConfig::KillSwitch { guardian, pause_until } = config else {
        unreachable!("registry keyed by tag");
    };
    Arc::new(KillSwitchValidator::new(base, guardian, pause_until))
}

#[async_trait::async_trait]
impl KernelValidator for KillSwitchValidator {
    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    async fn enable_data(&self) -> Result<Bytes, ValidatorError> {
        Ok(self.guardian().as_slice().to_vec().into())
    }

    /// `pauseUntil(6) ‖ guardianSignature(65)`, the signature taken over
    /// `keccak256(pauseUntil ‖ hash)`.
    async fn sign_hash(&self, hash: B256) -> Result<Bytes, ValidatorError> {
        let pause = &self.pause_until.to_be_bytes()[2..];
        let digest = keccak256([pause, hash.as_slice()].concat());
        let sig = self.guardian.sign_message(digest.as_slice()).await?;
        Ok([pause, &sig.as_bytes()].concat().into())
    }

    async fn sign_typed_digest(&self, digest: B256) -> Result<Bytes, ValidatorError> {
        Ok(self.guardian.sign_hash(&digest).await?.as_bytes().into())
    }

    fn stub_signature(&self) -> Bytes {
        [[0u8; 6].as_slice(), &STUB_ECDSA_SIGNATURE[..]].concat().into()
    }

    /// Pause operations ride a dedicated nonce lane so they never queue
    /// behind stuck operations on the default lane.
    fn nonce_key(&self) -> U192 {
        U192::from(1u8)
    }

    /// Pause calls target the account's fallback handler directly instead of
    /// going through `execute`.
    fn should_delegate_via_fallback(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::ENTRYPOINT_V06, types::ValidatorMode};
    use alloy::primitives::{Signature, address, b256, eip191_hash_message};

    fn validator() -> KillSwitchValidator {
        let guardian = DynSigner::from_bytes(&b256!(
            "0x4747474747474747474747474747474747474747474747474747474747474747"
        ))
        .unwrap();
        KillSwitchValidator::new(
            ValidatorBase::new(
                address!("0x4000000000000000000000000000000000000004"),
                ValidatorMode::Plugin,
                1,
                ENTRYPOINT_V06,
            ),
            guardian,
            0x0000_0064_0000,
        )
    }

    #[tokio::test]
    async fn signature_binds_the_pause_window() {
        let validator = validator();
        let hash = b256!("0x1111111111111111111111111111111111111111111111111111111111111111");

        let sig = validator.sign_hash(hash).await.unwrap();
        assert_eq!(sig.len(), 71);
        assert_eq!(&sig[..6], &0x0000_0064_0000u64.to_be_bytes()[2..]);
        assert_eq!(validator.stub_signature().len(), sig.len());

        // The guardian signed pauseUntil ‖ hash, not the bare hash.
        let digest = keccak256([&sig[..6], hash.as_slice()].concat());
        let recovered = Signature::from_raw(&sig[6..])
            .unwrap()
            .recover_address_from_prehash(&eip191_hash_message(digest))
            .unwrap();
        assert_eq!(recovered, validator.guardian());
    }

    #[test]
    fn pause_rides_its_own_nonce_lane() {
        assert_eq!(validator().nonce_key(), U192::from(1u8));
    }
}
