//! Shared validator state, signature-mode resolution and mode-tagged
//! signature assembly.

use super::KernelValidator;
use crate::{
    error::ValidatorError,
    types::{Kernel, ValidatorMode},
};
use alloy::{
    primitives::{Address, Bytes, ChainId, FixedBytes, U256},
    providers::Provider,
};
use std::sync::RwLock;
use tracing::{debug, trace};

/// Largest validity timestamp the 48-bit wire fields can carry.
pub const MAX_VALIDITY_TIMESTAMP: u64 = (1 << 48) - 1;

fn check_u48(field: &'static str, value: u64) -> Result<(), ValidatorError> {
    if value > MAX_VALIDITY_TIMESTAMP {
        return Err(ValidatorError::WindowOutOfRange { field, value });
    }
    Ok(())
}

/// State shared by every validator instance.
///
/// A validator is owned by one account at a time; connecting it to another
/// account replaces the prior reference.
#[derive(Debug)]
pub struct ValidatorBase {
    address: Address,
    declared_mode: ValidatorMode,
    chain_id: ChainId,
    entry_point: Address,
    valid_until: u64,
    valid_after: u64,
    executor: Address,
    selector: FixedBytes<4>,
    /// Enable approval co-signed by the sudo validator. Set by the plugin
    /// approval flow; required whenever the mode resolves to `Enable`.
    enable_signature: RwLock<Option<Bytes>>,
}

impl ValidatorBase {
    /// Creates shared state with a zeroed validity window and no execution
    /// binding.
    pub fn new(
        address: Address,
        declared_mode: ValidatorMode,
        chain_id: ChainId,
        entry_point: Address,
    ) -> Self {
        Self {
            address,
            declared_mode,
            chain_id,
            entry_point,
            valid_until: 0,
            valid_after: 0,
            executor: Address::ZERO,
            selector: FixedBytes::ZERO,
            enable_signature: RwLock::new(None),
        }
    }

    /// Sets the validity window (48-bit unix timestamps; 0 = unbounded).
    ///
    /// Values above 48 bits are rejected here rather than silently truncated
    /// at encoding time, where they would turn into a different window.
    pub fn with_window(
        mut self,
        valid_until: u64,
        valid_after: u64,
    ) -> Result<Self, ValidatorError> {
        check_u48("validUntil", valid_until)?;
        check_u48("validAfter", valid_after)?;
        self.valid_until = valid_until;
        self.valid_after = valid_after;
        Ok(self)
    }

    /// Binds the execution path (selector and executor) this validator is
    /// enabled for.
    pub fn with_execution(mut self, selector: FixedBytes<4>, executor: Address) -> Self {
        self.selector = selector;
        self.executor = executor;
        self
    }

    /// The validator module's on-chain address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The mode the validator was constructed for.
    pub fn declared_mode(&self) -> ValidatorMode {
        self.declared_mode
    }

    /// The chain this validator signs for.
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// The entry point whose hashing rule is used.
    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// End of the validity window (0 = unbounded).
    pub fn valid_until(&self) -> u64 {
        self.valid_until
    }

    /// Start of the validity window.
    pub fn valid_after(&self) -> u64 {
        self.valid_after
    }

    /// The executor bound to this validator's execution path.
    pub fn executor(&self) -> Address {
        self.executor
    }

    /// The selector bound to this validator's execution path.
    pub fn selector(&self) -> FixedBytes<4> {
        self.selector
    }

    /// Stores the sudo validator's enable approval.
    pub fn set_enable_signature(&self, signature: Bytes) {
        *self.enable_signature.write().expect("enable signature lock poisoned") = Some(signature);
    }

    /// The stored enable approval, if the approval flow has run.
    pub fn enable_signature(&self) -> Option<Bytes> {
        self.enable_signature.read().expect("enable signature lock poisoned").clone()
    }
}

/// Pure mode decision against observed chain state.
///
/// The account's default validator takes priority over an execution-path
/// registration, which takes priority over the enable flow.
pub fn decide_mode(
    validator: Address,
    default_validator: Address,
    execution_validator: Address,
) -> ValidatorMode {
    if default_validator == validator {
        ValidatorMode::Sudo
    } else if execution_validator == validator {
        ValidatorMode::Plugin
    } else {
        ValidatorMode::Enable
    }
}

/// Mode to assume when chain state cannot be read (e.g. the account is not
/// deployed yet).
///
/// A not-yet-deployed account cannot have a plugin installed, so a declared
/// `Plugin` downgrades to `Enable`; any other declared mode is kept.
pub const fn fallback_mode(declared: ValidatorMode) -> ValidatorMode {
    match declared {
        ValidatorMode::Plugin => ValidatorMode::Enable,
        declared => declared,
    }
}

/// Resolves the mode the signature must be encoded for by reading the
/// account's default validator and the execution config registered for the
/// call data's leading selector.
///
/// Only `call_data[0..4]` keys the execution-config read. For batched or
/// multisend call data that selector does not correspond to a single
/// user-facing call; this imprecision is inherited from the protocol and
/// kept as-is.
pub async fn resolve_validator_mode<P: Provider>(
    validator: &dyn KernelValidator,
    provider: &P,
    account: Address,
    call_data: &[u8],
) -> ValidatorMode {
    let selector = if call_data.len() >= 4 {
        FixedBytes::from_slice(&call_data[..4])
    } else {
        FixedBytes::ZERO
    };

    let kernel = Kernel::new(account, provider);
    let default_validator_call = kernel.getDefaultValidator();
    let execution_call = kernel.getExecution(selector);
    match tokio::try_join!(default_validator_call.call(), execution_call.call()) {
        Ok((default_validator, execution)) => {
            let mode =
                decide_mode(validator.base().address(), default_validator, execution.validator);
            trace!(%account, ?mode, "resolved validator mode from chain state");
            mode
        }
        Err(err) => {
            let mode = fallback_mode(validator.base().declared_mode());
            debug!(%account, %err, ?mode, "validator mode read failed, using fallback");
            mode
        }
    }
}

/// The decoded segments of an enable-mode signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnableSignatureParts {
    /// End of the validity window.
    pub valid_until: u64,
    /// Start of the validity window.
    pub valid_after: u64,
    /// The validator being enabled.
    pub validator: Address,
    /// The executor bound to the execution path.
    pub executor: Address,
    /// The validator's enable data.
    pub enable_data: Bytes,
    /// The sudo validator's enable approval.
    pub enable_signature: Bytes,
    /// The raw user-operation signature.
    pub user_op_signature: Bytes,
}

/// Packs an enable-mode signature:
///
/// ```text
/// modeTag(4) ‖ validUntil(6) ‖ validAfter(6) ‖ validator(20) ‖ executor(20)
///           ‖ len(enableData)(32) ‖ enableData
///           ‖ len(enableSignature)(32) ‖ enableSignature
///           ‖ userOpSignature
/// ```
///
/// The byte offsets are load-bearing: the on-chain validator contracts parse
/// this layout directly. Timestamps wider than 48 bits cannot be represented
/// and are rejected.
pub fn pack_enable_signature(
    valid_until: u64,
    valid_after: u64,
    validator: Address,
    executor: Address,
    enable_data: &[u8],
    enable_signature: &[u8],
    user_op_signature: &[u8],
) -> Result<Bytes, ValidatorError> {
    check_u48("validUntil", valid_until)?;
    check_u48("validAfter", valid_after)?;
    let mut out = Vec::with_capacity(
        4 + 6 + 6 + 20 + 20 + 32 + enable_data.len() + 32 + enable_signature.len()
            + user_op_signature.len(),
    );
    out.extend_from_slice(ValidatorMode::Enable.tag().as_slice());
    out.extend_from_slice(&valid_until.to_be_bytes()[2..]);
    out.extend_from_slice(&valid_after.to_be_bytes()[2..]);
    out.extend_from_slice(validator.as_slice());
    out.extend_from_slice(executor.as_slice());
    out.extend_from_slice(&U256::from(enable_data.len()).to_be_bytes::<32>());
    out.extend_from_slice(enable_data);
    out.extend_from_slice(&U256::from(enable_signature.len()).to_be_bytes::<32>());
    out.extend_from_slice(enable_signature);
    out.extend_from_slice(user_op_signature);
    Ok(out.into())
}

/// Decodes the layout produced by [`pack_enable_signature`]. Returns `None`
/// for anything that is not a well-formed enable-mode signature.
pub fn decode_enable_signature(signature: &[u8]) -> Option<EnableSignatureParts> {
    let rest = signature.strip_prefix(ValidatorMode::Enable.tag().as_slice())?;
    if rest.len() < 6 + 6 + 20 + 20 + 32 {
        return None;
    }

    let (until, rest) = rest.split_at(6);
    let (after, rest) = rest.split_at(6);
    let (validator, rest) = rest.split_at(20);
    let (executor, rest) = rest.split_at(20);

    let read_u48 = |bytes: &[u8]| {
        let mut buf = [0u8; 8];
        buf[2..].copy_from_slice(bytes);
        u64::from_be_bytes(buf)
    };
    let read_blob = |rest: &[u8]| -> Option<(Bytes, Bytes)> {
        let (len, rest) = rest.split_at_checked(32)?;
        let len = U256::from_be_slice(len);
        let len = usize::try_from(len).ok()?;
        let (blob, rest) = rest.split_at_checked(len)?;
        Some((Bytes::copy_from_slice(blob), Bytes::copy_from_slice(rest)))
    };

    let (enable_data, rest) = read_blob(rest)?;
    let (enable_signature, user_op_signature) = read_blob(&rest)?;

    Some(EnableSignatureParts {
        valid_until: read_u48(until),
        valid_after: read_u48(after),
        validator: Address::from_slice(validator),
        executor: Address::from_slice(executor),
        enable_data,
        enable_signature,
        user_op_signature,
    })
}

/// Builds the mode-tagged signature for an already-computed raw signature.
///
/// `Sudo` and `Plugin` prepend the 4-byte tag; `Enable` additionally packs
/// the enable proof, and fails if the sudo validator's approval has not been
/// stored yet.
pub async fn assemble_signature(
    validator: &dyn KernelValidator,
    mode: ValidatorMode,
    user_op_signature: Bytes,
) -> Result<Bytes, ValidatorError> {
    match mode {
        ValidatorMode::Sudo | ValidatorMode::Plugin => {
            Ok([mode.tag().as_slice(), &user_op_signature[..]].concat().into())
        }
        ValidatorMode::Enable => {
            let base = validator.base();
            let enable_signature =
                base.enable_signature().ok_or(ValidatorError::EnableSignatureMissing)?;
            let enable_data = validator.enable_data().await?;
            pack_enable_signature(
                base.valid_until(),
                base.valid_after(),
                base.address(),
                base.executor(),
                &enable_data,
                &enable_signature,
                &user_op_signature,
            )
        }
    }
}

/// Resolves the signature mode against chain state, signs the user
/// operation's entry point hash and assembles the final mode-tagged
/// signature.
pub async fn get_signature<P: Provider>(
    validator: &dyn KernelValidator,
    provider: &P,
    op: &crate::types::UserOperationRequest,
) -> Result<Bytes, ValidatorError> {
    let base = validator.base();
    let mode = resolve_validator_mode(validator, provider, op.sender, &op.call_data).await;
    let hash = validator.user_op_hash(op, base.entry_point(), base.chain_id());
    let user_op_signature = validator.sign_hash(hash).await?;
    assemble_signature(validator, mode, user_op_signature).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{ECDSA_VALIDATOR, ENTRYPOINT_V06},
        signers::DynSigner,
        validators::EcdsaValidator,
    };
    use alloy::primitives::{address, b256, bytes};

    fn ecdsa(mode: ValidatorMode) -> EcdsaValidator {
        let signer = DynSigner::from_bytes(&b256!(
            "0x4646464646464646464646464646464646464646464646464646464646464646"
        ))
        .unwrap();
        EcdsaValidator::new(
            ValidatorBase::new(ECDSA_VALIDATOR, mode, 1, ENTRYPOINT_V06)
                .with_window(2, 1)
                .unwrap()
                .with_execution(FixedBytes([0x94, 0x0d, 0x3c, 0x60]), Address::ZERO),
            signer,
        )
    }

    #[test]
    fn default_validator_takes_priority_over_declared_mode() {
        // On-chain default == validator → sudo, even for a validator that
        // declares itself a plugin.
        let executor = address!("0x0000000000000000000000000000000000000042");
        assert_eq!(
            decide_mode(ECDSA_VALIDATOR, ECDSA_VALIDATOR, executor),
            ValidatorMode::Sudo
        );
        assert_eq!(
            decide_mode(ECDSA_VALIDATOR, executor, ECDSA_VALIDATOR),
            ValidatorMode::Plugin
        );
        assert_eq!(decide_mode(ECDSA_VALIDATOR, executor, executor), ValidatorMode::Enable);
    }

    #[test]
    fn fallback_downgrades_plugin_to_enable() {
        assert_eq!(fallback_mode(ValidatorMode::Plugin), ValidatorMode::Enable);
        assert_eq!(fallback_mode(ValidatorMode::Sudo), ValidatorMode::Sudo);
        assert_eq!(fallback_mode(ValidatorMode::Enable), ValidatorMode::Enable);
    }

    #[test]
    fn enable_signature_round_trip() {
        let validator = address!("0xd9AB5096a832b9ce79914329DAEE236f8Eea0390");
        let executor = address!("0x0000000000000000000000000000000000000042");
        let enable_data = bytes!("0xdeadbeef01");
        let enable_signature = bytes!("0x11223344556677");
        let user_op_signature = bytes!("0x424242");

        let packed = pack_enable_signature(
            0xffff_ffff_0001,
            0x0000_0000_1234,
            validator,
            executor,
            &enable_data,
            &enable_signature,
            &user_op_signature,
        )
        .unwrap();

        // Fixed offsets ahead of the variable blobs.
        assert_eq!(&packed[..4], ValidatorMode::Enable.tag().as_slice());
        assert_eq!(&packed[4..10], &0xffff_ffff_0001u64.to_be_bytes()[2..]);
        assert_eq!(&packed[10..16], &0x0000_0000_1234u64.to_be_bytes()[2..]);
        assert_eq!(&packed[16..36], validator.as_slice());
        assert_eq!(&packed[36..56], executor.as_slice());
        assert_eq!(packed[56 + 31], enable_data.len() as u8);

        let parts = decode_enable_signature(&packed).unwrap();
        assert_eq!(
            parts,
            EnableSignatureParts {
                valid_until: 0xffff_ffff_0001,
                valid_after: 0x0000_0000_1234,
                validator,
                executor,
                enable_data,
                enable_signature,
                user_op_signature,
            },
        );
    }

    #[test]
    fn validity_window_is_capped_at_48_bits() {
        let base = ValidatorBase::new(ECDSA_VALIDATOR, ValidatorMode::Sudo, 1, ENTRYPOINT_V06);
        let err = base.with_window(1 << 48, 0).unwrap_err();
        assert!(matches!(
            err,
            ValidatorError::WindowOutOfRange { field: "validUntil", value } if value == 1 << 48
        ));

        let base = ValidatorBase::new(ECDSA_VALIDATOR, ValidatorMode::Sudo, 1, ENTRYPOINT_V06);
        let base = base.with_window(MAX_VALIDITY_TIMESTAMP, MAX_VALIDITY_TIMESTAMP).unwrap();
        assert_eq!(base.valid_until(), MAX_VALIDITY_TIMESTAMP);

        // The packer enforces the same bound for callers that bypass the
        // builder.
        let err = pack_enable_signature(
            0,
            1 << 48,
            ECDSA_VALIDATOR,
            Address::ZERO,
            &[],
            &[],
            &[],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ValidatorError::WindowOutOfRange { field: "validAfter", value } if value == 1 << 48
        ));
    }

    #[tokio::test]
    async fn sudo_and_plugin_prepend_only_the_tag() {
        let validator = ecdsa(ValidatorMode::Sudo);
        let raw = bytes!("0x424242");
        for mode in [ValidatorMode::Sudo, ValidatorMode::Plugin] {
            let sig = assemble_signature(&validator, mode, raw.clone()).await.unwrap();
            assert_eq!(&sig[..4], mode.tag().as_slice());
            assert_eq!(&sig[4..], raw.as_ref());
        }
    }

    #[tokio::test]
    async fn enable_mode_requires_a_stored_approval() {
        let validator = ecdsa(ValidatorMode::Plugin);
        let err = assemble_signature(&validator, ValidatorMode::Enable, bytes!("0x42"))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidatorError::EnableSignatureMissing));

        // Once the approval flow stored the co-signature, assembly succeeds
        // and embeds it at the documented offset.
        validator.base().set_enable_signature(bytes!("0xaabbcc"));
        let sig = assemble_signature(&validator, ValidatorMode::Enable, bytes!("0x42"))
            .await
            .unwrap();
        let parts = decode_enable_signature(&sig).unwrap();
        assert_eq!(parts.enable_signature, bytes!("0xaabbcc"));
        assert_eq!(parts.user_op_signature, bytes!("0x42"));
        // ECDSA enable data is the owner address.
        assert_eq!(parts.enable_data.len(), 20);
    }
}
