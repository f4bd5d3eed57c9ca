//! Scoped session key validator.

use super::{KernelValidator, ValidatorBase, ValidatorConfig};
use crate::{constants::STUB_ECDSA_SIGNATURE, error::ValidatorError, signers::DynSigner};
use alloy::{
    primitives::{Address, B256, Bytes},
    signers::Signer,
};
use std::sync::Arc;

/// The session scope the owner commits to when enabling a session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionData {
    /// Start of the session (unix seconds, 0 = immediately).
    pub valid_after: u64,
    /// End of the session (unix seconds, 0 = unbounded).
    pub valid_until: u64,
    /// Merkle root over the permissions granted to the session key.
    pub merkle_root: B256,
    /// Paymaster the session is restricted to (zero = any).
    pub paymaster: Address,
}

/// Validator backed by an ephemeral session key with a scoped permission set.
#[derive(Debug)]
pub struct SessionKeyValidator {
    base: ValidatorBase,
    signer: DynSigner,
    session: SessionData,
}

impl SessionKeyValidator {
    /// Creates a session key validator.
    pub fn new(base: ValidatorBase, signer: DynSigner, session: SessionData) -> Self {
        Self { base, signer, session }
    }

    /// The session key address.
    pub fn session_key(&self) -> Address {
        self.signer.address()
    }

    /// The committed session scope.
    pub fn session(&self) -> &SessionData {
        &self.session
    }
}

pub(super) fn factory(base: ValidatorBase, config: ValidatorConfig) -> Arc<dyn KernelValidator> {
    let ValidatorConfig::SessionKey { signer, session } = config else {
        unreachable!("registry keyed by tag");
    };
    Arc::new(SessionKeyValidator::new(base, signer, session))
}

#[async_trait::async_trait]
impl KernelValidator for SessionKeyValidator {
    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    /// Packed as `sessionKey(20) ‖ merkleRoot(32) ‖ validAfter(6) ‖
    /// validUntil(6) ‖ paymaster(20)`, the field order the on-chain module
    /// reads at enable time.
    async fn enable_data(&self) -> Result<Bytes, ValidatorError> {
        let mut out = Vec::with_capacity(20 + 32 + 6 + 6 + 20);
        out.extend_from_slice(self.session_key().as_slice());
        out.extend_from_slice(self.session.merkle_root.as_slice());
        out.extend_from_slice(&self.session.valid_after.to_be_bytes()[2..]);
        out.extend_from_slice(&self.session.valid_until.to_be_bytes()[2..]);
        out.extend_from_slice(self.session.paymaster.as_slice());
        Ok(out.into())
    }

    /// `sessionKey(20) ‖ signature(65)`: the module needs the claimed key up
    /// front to check it against the enabled session before recovering.
    async fn sign_hash(&self, hash: B256) -> Result<Bytes, ValidatorError> {
        let sig = self.signer.sign_message(hash.as_slice()).await?;
        Ok([self.session_key().as_slice(), &sig.as_bytes()].concat().into())
    }

    async fn sign_typed_digest(&self, digest: B256) -> Result<Bytes, ValidatorError> {
        Ok(self.signer.sign_hash(&digest).await?.as_bytes().into())
    }

    fn stub_signature(&self) -> Bytes {
        [self.session_key().as_slice(), &STUB_ECDSA_SIGNATURE[..]].concat().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::ENTRYPOINT_V06,
        types::ValidatorMode,
    };
    use alloy::primitives::{address, b256};

    fn validator() -> SessionKeyValidator {
        let signer = DynSigner::from_bytes(&b256!(
            "0x5353535353535353535353535353535353535353535353535353535353535353"
        ))
        .unwrap();
        SessionKeyValidator::new(
            ValidatorBase::new(
                address!("0x2000000000000000000000000000000000000002"),
                ValidatorMode::Plugin,
                1,
                ENTRYPOINT_V06,
            ),
            signer,
            SessionData {
                valid_after: 0x0000_0000_1000,
                valid_until: 0x0000_0000_2000,
                merkle_root: b256!(
                    "0xabababababababababababababababababababababababababababababababab"
                ),
                paymaster: address!("0x3000000000000000000000000000000000000003"),
            },
        )
    }

    #[tokio::test]
    async fn enable_data_layout() {
        let validator = validator();
        let data = validator.enable_data().await.unwrap();

        assert_eq!(data.len(), 84);
        assert_eq!(&data[..20], validator.session_key().as_slice());
        assert_eq!(&data[20..52], validator.session().merkle_root.as_slice());
        assert_eq!(&data[52..58], &0x0000_0000_1000u64.to_be_bytes()[2..]);
        assert_eq!(&data[58..64], &0x0000_0000_2000u64.to_be_bytes()[2..]);
        assert_eq!(&data[64..], validator.session().paymaster.as_slice());
    }

    #[tokio::test]
    async fn signature_claims_the_session_key() {
        let validator = validator();
        let sig = validator
            .sign_hash(b256!("0x1111111111111111111111111111111111111111111111111111111111111111"))
            .await
            .unwrap();
        assert_eq!(sig.len(), 85);
        assert_eq!(&sig[..20], validator.session_key().as_slice());
        // Stub matches the real layout byte for byte in length.
        assert_eq!(validator.stub_signature().len(), sig.len());
    }
}
