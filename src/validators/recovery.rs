//! Social-recovery validator.

use super::{KernelValidator, ValidatorBase, ValidatorConfig};
use crate::{constants::STUB_ECDSA_SIGNATURE, error::ValidatorError, signers::DynSigner};
use alloy::{
    primitives::{Address, B256, Bytes, U256},
    signers::Signer,
    sol,
    sol_types::SolValue,
};
use std::sync::Arc;

sol! {
    /// Guardian set configuration the recovery module stores at enable time.
    struct RecoveryEnableData {
        address[] guardians;
        uint256 threshold;
        uint256 delay;
    }
}

/// Guardian set configuration for the recovery validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Addresses allowed to co-sign a recovery.
    pub guardians: Vec<Address>,
    /// How many guardian signatures a recovery needs.
    pub threshold: u64,
    /// Seconds a recovery has to wait before it can execute.
    pub delay_seconds: u64,
}

/// Validator through which a guardian quorum can rotate the account's owner.
///
/// The recovery *flow* (proposal, approvals, countdown) lives on the backend;
/// this validator only encodes the guardian set and signs as one guardian.
#[derive(Debug)]
pub struct RecoveryValidator {
    base: ValidatorBase,
    guardian: DynSigner,
    config: RecoveryConfig,
}

impl RecoveryValidator {
    /// Creates a recovery validator signing as `guardian`.
    pub fn new(base: ValidatorBase, guardian: DynSigner, config: RecoveryConfig) -> Self {
        Self { base, guardian, config }
    }

    /// The guardian set configuration.
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }
}

pub(super) fn factory(base: ValidatorBase, config: ValidatorConfig) -> Arc<dyn KernelValidator> {
    let ValidatorConfig::Recovery { guardian, config } = config else {
        unreachable!("registry keyed by tag");
    };
    Arc::new(RecoveryValidator::new(base, guardian, config))
}

#[async_trait::async_trait]
impl KernelValidator for RecoveryValidator {
    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    async fn enable_data(&self) -> Result<Bytes, ValidatorError> {
        Ok(RecoveryEnableData {
            guardians: self.config.guardians.clone(),
            threshold: U256::from(self.config.threshold),
            delay: U256::from(self.config.delay_seconds),
        }
        .abi_encode()
        .into())
    }

    async fn sign_hash(&self, hash: B256) -> Result<Bytes, ValidatorError> {
        Ok(self.guardian.sign_message(hash.as_slice()).await?.as_bytes().into())
    }

    async fn sign_typed_digest(&self, digest: B256) -> Result<Bytes, ValidatorError> {
        Ok(self.guardian.sign_hash(&digest).await?.as_bytes().into())
    }

    fn stub_signature(&self) -> Bytes {
        STUB_ECDSA_SIGNATURE
    }

    /// Recovery calls target the account's fallback handler directly instead
    /// of going through `execute`.
    fn should_delegate_via_fallback(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::ENTRYPOINT_V06, types::ValidatorMode};
    use alloy::primitives::{address, b256};

    #[tokio::test]
    async fn enable_data_round_trips_the_guardian_set() {
        let guardian = DynSigner::from_bytes(&b256!(
            "0x4848484848484848484848484848484848484848484848484848484848484848"
        ))
        .unwrap();
        let validator = RecoveryValidator::new(
            ValidatorBase::new(
                address!("0x5000000000000000000000000000000000000005"),
                ValidatorMode::Plugin,
                1,
                ENTRYPOINT_V06,
            ),
            guardian,
            RecoveryConfig {
                guardians: vec![
                    address!("0x6000000000000000000000000000000000000006"),
                    address!("0x7000000000000000000000000000000000000007"),
                ],
                threshold: 2,
                delay_seconds: 86_400,
            },
        );

        let decoded =
            RecoveryEnableData::abi_decode(&validator.enable_data().await.unwrap()).unwrap();
        assert_eq!(decoded.guardians, validator.config().guardians);
        assert_eq!(decoded.threshold, U256::from(2));
        assert_eq!(decoded.delay, U256::from(86_400));
    }
}
