//! Validator modules.
//!
//! One implementation per on-chain validator type. Each validator owns a
//! signer capability it never exposes raw; it only exposes signature outputs.
//! Construction goes through [`create_validator`], which dispatches a
//! [`ValidatorTag`] through a fixed registry exactly once; there is no
//! per-call re-dispatch.

mod base;
pub use base::{
    EnableSignatureParts, MAX_VALIDITY_TIMESTAMP, ValidatorBase, assemble_signature, decide_mode,
    decode_enable_signature, fallback_mode, get_signature, pack_enable_signature,
    resolve_validator_mode,
};

mod ecdsa;
pub use ecdsa::EcdsaValidator;

mod passkey;
pub use passkey::{MultiChainPasskeyValidator, PasskeyValidator};

mod session_key;
pub use session_key::{SessionData, SessionKeyValidator};

mod kill_switch;
pub use kill_switch::KillSwitchValidator;

mod recovery;
pub use recovery::{RecoveryConfig, RecoveryValidator};

use crate::{
    error::ValidatorError,
    signers::{DynSigner, WebAuthnSigner},
    types::{IKernelValidator, UserOperationRequest, ValidatorMode},
};
use alloy::{
    primitives::{Address, B256, Bytes, ChainId, aliases::U192},
    sol_types::SolCall,
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// A validator module capability set.
#[async_trait::async_trait]
pub trait KernelValidator: fmt::Debug + Send + Sync {
    /// Shared validator state.
    fn base(&self) -> &ValidatorBase;

    /// The data the on-chain module consumes at enable time (e.g. the owner
    /// address for ECDSA).
    async fn enable_data(&self) -> Result<Bytes, ValidatorError>;

    /// Raw signature over a 32-byte hash, in the module's wire format.
    async fn sign_hash(&self, hash: B256) -> Result<Bytes, ValidatorError>;

    /// Raw signature over an EIP-712 digest (no EIP-191 prefixing).
    async fn sign_typed_digest(&self, digest: B256) -> Result<Bytes, ValidatorError>;

    /// A placeholder signature with the exact shape of a real one, so gas
    /// estimation sees realistic calldata.
    fn stub_signature(&self) -> Bytes;

    /// The 192-bit entry point nonce key this validator's operations use.
    fn nonce_key(&self) -> U192 {
        U192::ZERO
    }

    /// The hash of `op` this validator signs.
    fn user_op_hash(
        &self,
        op: &UserOperationRequest,
        entry_point: Address,
        chain_id: ChainId,
    ) -> B256 {
        op.hash(entry_point, chain_id)
    }

    /// Whether calls targeting the account itself should bypass
    /// execute-wrapping and go through the fallback handler.
    fn should_delegate_via_fallback(&self) -> bool {
        false
    }

    /// The validator module's on-chain address.
    fn address(&self) -> Address {
        self.base().address()
    }

    /// The mode this validator was constructed for. The effective mode is
    /// re-resolved against chain state at signing time.
    fn declared_mode(&self) -> ValidatorMode {
        self.base().declared_mode()
    }

    /// Calldata for the module's `enable(bytes)` entry point.
    fn encode_enable(&self, data: Bytes) -> Bytes {
        IKernelValidator::enableCall { data }.abi_encode().into()
    }

    /// Calldata for the module's `disable(bytes)` entry point.
    fn encode_disable(&self, data: Bytes) -> Bytes {
        IKernelValidator::disableCall { data }.abi_encode().into()
    }
}

/// Identifies a validator implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidatorTag {
    /// Single-owner ECDSA validator.
    Ecdsa,
    /// Passkey (WebAuthn) validator.
    Passkey,
    /// Passkey validator with a chain-agnostic signing hash.
    MultiChainPasskey,
    /// Scoped session key validator.
    SessionKey,
    /// Guardian-operated pause validator.
    KillSwitch,
    /// Social-recovery validator.
    Recovery,
}

/// Per-type construction inputs for [`create_validator`].
#[derive(Debug)]
pub enum ValidatorConfig {
    /// Single-owner ECDSA validator.
    Ecdsa {
        /// The owner key.
        signer: DynSigner,
    },
    /// Passkey validator.
    Passkey {
        /// The passkey credential.
        signer: WebAuthnSigner,
    },
    /// Multi-chain passkey validator.
    MultiChainPasskey {
        /// The passkey credential.
        signer: WebAuthnSigner,
    },
    /// Session key validator.
    SessionKey {
        /// The session key.
        signer: DynSigner,
        /// The session scope committed to at enable time.
        session: SessionData,
    },
    /// Kill switch validator.
    KillSwitch {
        /// The guardian key authorized to pause the account.
        guardian: DynSigner,
        /// Unix timestamp the pause extends to.
        pause_until: u64,
    },
    /// Recovery validator.
    Recovery {
        /// The signing guardian.
        guardian: DynSigner,
        /// Guardian set configuration.
        config: RecoveryConfig,
    },
}

impl ValidatorConfig {
    /// The tag of the implementation this config constructs.
    pub fn tag(&self) -> ValidatorTag {
        match self {
            Self::Ecdsa { .. } => ValidatorTag::Ecdsa,
            Self::Passkey { .. } => ValidatorTag::Passkey,
            Self::MultiChainPasskey { .. } => ValidatorTag::MultiChainPasskey,
            Self::SessionKey { .. } => ValidatorTag::SessionKey,
            Self::KillSwitch { .. } => ValidatorTag::KillSwitch,
            Self::Recovery { .. } => ValidatorTag::Recovery,
        }
    }
}

/// Constructor for one validator implementation. Invariant: only ever called
/// with the [`ValidatorConfig`] variant matching its registry tag.
type ValidatorFactory = fn(ValidatorBase, ValidatorConfig) -> Arc<dyn KernelValidator>;

/// Registry mapping tags to factories. Fixed at compile time.
const REGISTRY: &[(ValidatorTag, ValidatorFactory)] = &[
    (ValidatorTag::Ecdsa, ecdsa::factory),
    (ValidatorTag::Passkey, passkey::factory),
    (ValidatorTag::MultiChainPasskey, passkey::multichain_factory),
    (ValidatorTag::SessionKey, session_key::factory),
    (ValidatorTag::KillSwitch, kill_switch::factory),
    (ValidatorTag::Recovery, recovery::factory),
];

/// Builds a validator from its config, dispatching through the registry once.
pub fn create_validator(base: ValidatorBase, config: ValidatorConfig) -> Arc<dyn KernelValidator> {
    let tag = config.tag();
    let (_, factory) =
        REGISTRY.iter().find(|(t, _)| *t == tag).expect("registry covers every tag");
    factory(base, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{ECDSA_VALIDATOR, ENTRYPOINT_V06},
        signers::DynSigner,
    };
    use alloy::primitives::b256;

    #[test]
    fn registry_covers_every_tag() {
        for tag in [
            ValidatorTag::Ecdsa,
            ValidatorTag::Passkey,
            ValidatorTag::MultiChainPasskey,
            ValidatorTag::SessionKey,
            ValidatorTag::KillSwitch,
            ValidatorTag::Recovery,
        ] {
            assert!(REGISTRY.iter().any(|(t, _)| *t == tag), "missing factory for {tag:?}");
        }
    }

    #[test]
    fn registry_dispatch_constructs_the_right_type() {
        let signer = DynSigner::from_bytes(&b256!(
            "0x4646464646464646464646464646464646464646464646464646464646464646"
        ))
        .unwrap();
        let validator = create_validator(
            ValidatorBase::new(ECDSA_VALIDATOR, ValidatorMode::Sudo, 1, ENTRYPOINT_V06),
            ValidatorConfig::Ecdsa { signer },
        );
        assert_eq!(validator.address(), ECDSA_VALIDATOR);
        assert_eq!(validator.declared_mode(), ValidatorMode::Sudo);
        assert_eq!(validator.nonce_key(), U192::ZERO);
    }
}
