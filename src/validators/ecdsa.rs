//! Single-owner ECDSA validator.

use super::{KernelValidator, ValidatorBase, ValidatorConfig};
use crate::{constants::STUB_ECDSA_SIGNATURE, error::ValidatorError, signers::DynSigner};
use alloy::{
    primitives::{Address, B256, Bytes},
    signers::Signer,
};
use std::sync::Arc;

/// Validator backed by a single ECDSA owner key.
///
/// User-operation hashes are signed as EIP-191 personal messages, matching
/// what the on-chain module recovers.
#[derive(Debug)]
pub struct EcdsaValidator {
    base: ValidatorBase,
    signer: DynSigner,
}

impl EcdsaValidator {
    /// Creates an ECDSA validator owned by `signer`.
    pub fn new(base: ValidatorBase, signer: DynSigner) -> Self {
        Self { base, signer }
    }

    /// The owner address the on-chain module recovers signatures against.
    pub fn owner(&self) -> Address {
        self.signer.address()
    }
}

pub(super) fn factory(base: ValidatorBase, config: ValidatorConfig) -> Arc<dyn KernelValidator> {
    let ValidatorConfig::Ecdsa { signer } = config else {
        unreachable!("registry keyed by tag");
    };
    Arc::new(EcdsaValidator::new(base, signer))
}

#[async_trait::async_trait]
impl KernelValidator for EcdsaValidator {
    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    async fn enable_data(&self) -> Result<Bytes, ValidatorError> {
        Ok(self.owner().as_slice().to_vec().into())
    }

    async fn sign_hash(&self, hash: B256) -> Result<Bytes, ValidatorError> {
        Ok(self.signer.sign_message(hash.as_slice()).await?.as_bytes().into())
    }

    async fn sign_typed_digest(&self, digest: B256) -> Result<Bytes, ValidatorError> {
        Ok(self.signer.sign_hash(&digest).await?.as_bytes().into())
    }

    fn stub_signature(&self) -> Bytes {
        STUB_ECDSA_SIGNATURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{ECDSA_VALIDATOR, ENTRYPOINT_V06},
        types::ValidatorMode,
    };
    use alloy::primitives::{Signature, b256, eip191_hash_message};

    fn validator() -> EcdsaValidator {
        let signer = DynSigner::from_bytes(&b256!(
            "0x4646464646464646464646464646464646464646464646464646464646464646"
        ))
        .unwrap();
        EcdsaValidator::new(
            ValidatorBase::new(ECDSA_VALIDATOR, ValidatorMode::Sudo, 1, ENTRYPOINT_V06),
            signer,
        )
    }

    #[tokio::test]
    async fn enable_data_is_the_owner_address() {
        let validator = validator();
        let data = validator.enable_data().await.unwrap();
        assert_eq!(data.as_ref(), validator.owner().as_slice());
    }

    #[tokio::test]
    async fn signature_recovers_to_the_owner() {
        // Fixed hash, fixed key: the recovered address must always be the
        // owner, and the signature must be a full 65-byte EIP-191 signature.
        let validator = validator();
        let hash = b256!("0xa70d0af2ebb03dd0339bb41ead7811212c0f7a4e2917b4dc0c5720c0dc10ba24");

        let sig_bytes = validator.sign_hash(hash).await.unwrap();
        assert_eq!(sig_bytes.len(), 65);

        let sig = Signature::from_raw(&sig_bytes).unwrap();
        let recovered = sig.recover_address_from_prehash(&eip191_hash_message(hash)).unwrap();
        assert_eq!(recovered, validator.owner());
    }

    #[tokio::test]
    async fn typed_digest_signature_is_unprefixed() {
        let validator = validator();
        let digest = b256!("0x1111111111111111111111111111111111111111111111111111111111111111");

        let sig_bytes = validator.sign_typed_digest(digest).await.unwrap();
        let sig = Signature::from_raw(&sig_bytes).unwrap();
        assert_eq!(sig.recover_address_from_prehash(&digest).unwrap(), validator.owner());
    }
}
