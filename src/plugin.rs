//! Plugin validator management: active-validator selection, the enable
//! approval flow and pending-install tracking.

use crate::{
    account::KernelAccount,
    eip712::{ValidatorApproved, kernel_domain, pack_validator_data},
    error::{AccountError, SdkError, ValidatorError},
    types::{Kernel, ValidatorMode},
    validators::KernelValidator,
};
use alloy::{
    primitives::{Address, Bytes, FixedBytes, aliases::U48},
    providers::Provider,
    sol_types::{SolCall, SolStruct},
};
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument};

/// An execution path: the selector the plugin handles and the executor
/// contract implementing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    /// The 4-byte selector routed to the executor.
    pub selector: FixedBytes<4>,
    /// The executor contract.
    pub executor: Address,
}

/// A plugin whose on-chain installation has not been observed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPlugin {
    /// The selector the plugin was registered for.
    pub selector: FixedBytes<4>,
    /// The plugin validator address.
    pub validator: Address,
}

/// Manages the account's validator pair.
///
/// The sudo validator is always present; a regular (plugin) validator is
/// optional and, when present, is the one operations run through.
#[derive(Debug)]
pub struct KernelPluginManager {
    sudo: Arc<dyn KernelValidator>,
    regular: Option<Arc<dyn KernelValidator>>,
    hook: Option<Address>,
    action: Option<Action>,
    pending: RwLock<Vec<PendingPlugin>>,
}

impl KernelPluginManager {
    /// Creates a manager with only a sudo validator.
    pub fn sudo_only(sudo: Arc<dyn KernelValidator>) -> Self {
        Self { sudo, regular: None, hook: None, action: None, pending: RwLock::new(Vec::new()) }
    }

    /// Creates a manager from an optional validator pair.
    ///
    /// A regular validator without the sudo validator it would be enabled by
    /// is rejected.
    pub fn from_validators(
        sudo: Option<Arc<dyn KernelValidator>>,
        regular: Option<Arc<dyn KernelValidator>>,
    ) -> Result<Self, ValidatorError> {
        let Some(sudo) = sudo else {
            return Err(ValidatorError::RegularWithoutSudo);
        };
        Ok(Self { sudo, regular, hook: None, action: None, pending: RwLock::new(Vec::new()) })
    }

    /// Binds a hook contract consulted by the regular validator's execution
    /// path.
    pub fn with_hook(mut self, hook: Address) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Binds the execution path the regular validator serves.
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Seeds the pending-install set.
    pub fn with_pending_plugins(self, pending: Vec<PendingPlugin>) -> Self {
        *self.pending.write().expect("pending plugin lock poisoned") = pending;
        self
    }

    /// The sudo validator.
    pub fn sudo_validator(&self) -> &Arc<dyn KernelValidator> {
        &self.sudo
    }

    /// The validator operations run through: the regular validator when one
    /// is configured, the sudo validator otherwise.
    pub fn active_validator(&self) -> &Arc<dyn KernelValidator> {
        self.regular.as_ref().unwrap_or(&self.sudo)
    }

    /// The mode the active validator operates in before chain-state
    /// resolution.
    pub fn active_validator_mode(&self) -> ValidatorMode {
        if self.regular.is_some() { ValidatorMode::Plugin } else { ValidatorMode::Sudo }
    }

    /// The bound execution path, if any.
    pub fn action(&self) -> Option<Action> {
        self.action
    }

    /// The bound hook contract, if any.
    pub fn hook(&self) -> Option<Address> {
        self.hook
    }

    /// A placeholder signature in the active validator's shape, tagged with
    /// its declared mode, for gas estimation.
    pub fn stub_signature(&self) -> Bytes {
        let active = self.active_validator();
        [self.active_validator_mode().tag().as_slice(), &active.stub_signature()[..]]
            .concat()
            .into()
    }

    /// Runs the enable approval flow: the account's default validator
    /// co-signs a [`ValidatorApproved`] typed-data payload binding the
    /// regular validator, its enable data and its execution path to this
    /// account. The approval is stored on the regular validator for later
    /// enable-mode signatures.
    #[instrument(skip_all, fields(account = %account.address()))]
    pub async fn approve_plugin(&self, account: &KernelAccount) -> Result<(), SdkError> {
        let (Some(regular), Some(default_validator)) =
            (self.regular.as_ref(), account.default_validator())
        else {
            return Err(AccountError::ValidatorNotConnected.into());
        };

        let base = regular.base();
        let payload = ValidatorApproved {
            sig: base.selector(),
            validatorData: pack_validator_data(
                base.valid_until(),
                base.valid_after(),
                base.address(),
            ),
            executor: base.executor(),
            enableData: regular.enable_data().await?,
        };
        let domain = kernel_domain(account.version(), account.chain_id(), account.address());
        let digest = payload.eip712_signing_hash(&domain);

        let approval = default_validator.sign_typed_digest(digest).await?;
        base.set_enable_signature(approval);
        debug!(validator = %base.address(), "plugin enable approved");
        Ok(())
    }

    /// `setExecution` calldata installing the regular validator for its
    /// execution path.
    pub async fn install_call_data(&self) -> Result<Bytes, SdkError> {
        let regular = self.regular.as_ref().ok_or(AccountError::ValidatorNotConnected)?;
        let base = regular.base();
        Ok(Kernel::setExecutionCall {
            selector: base.selector(),
            executor: base.executor(),
            validator: base.address(),
            validUntil: U48::from(base.valid_until()),
            validAfter: U48::from(base.valid_after()),
            enableData: regular.enable_data().await?,
        }
        .abi_encode()
        .into())
    }

    /// Re-checks every pending plugin against the account's execution config
    /// and drops the ones now installed. Returns whether the pending set is
    /// empty afterwards.
    pub async fn sync_installed<P: Provider>(
        &self,
        provider: &P,
        account: Address,
    ) -> Result<bool, SdkError> {
        let snapshot = self.pending.read().expect("pending plugin lock poisoned").clone();
        if snapshot.is_empty() {
            return Ok(true);
        }

        let kernel = Kernel::new(account, provider);
        let mut installed = Vec::new();
        for plugin in &snapshot {
            let execution = kernel.getExecution(plugin.selector).call().await?;
            if execution.validator == plugin.validator {
                installed.push(*plugin);
            }
        }

        let mut pending = self.pending.write().expect("pending plugin lock poisoned");
        pending.retain(|plugin| !installed.contains(plugin));
        Ok(pending.is_empty())
    }

    /// Whether no plugin installs are pending.
    pub fn all_installed(&self) -> bool {
        self.pending.read().expect("pending plugin lock poisoned").is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{ECDSA_VALIDATOR, ENTRYPOINT_V06},
        signers::DynSigner,
        validators::{ValidatorBase, ValidatorConfig, create_validator},
    };
    use alloy::primitives::{address, fixed_bytes};

    fn signer(byte: u8) -> DynSigner {
        DynSigner::from_bytes(&alloy::primitives::B256::repeat_byte(byte)).unwrap()
    }

    fn sudo() -> Arc<dyn KernelValidator> {
        create_validator(
            ValidatorBase::new(ECDSA_VALIDATOR, ValidatorMode::Sudo, 1, ENTRYPOINT_V06),
            ValidatorConfig::Ecdsa { signer: signer(0x46) },
        )
    }

    fn regular() -> Arc<dyn KernelValidator> {
        create_validator(
            ValidatorBase::new(
                address!("0x2000000000000000000000000000000000000002"),
                ValidatorMode::Plugin,
                1,
                ENTRYPOINT_V06,
            )
            .with_window(2, 1)
            .unwrap()
            .with_execution(
                fixed_bytes!("0x940d3c60"),
                address!("0x3000000000000000000000000000000000000003"),
            ),
            ValidatorConfig::Ecdsa { signer: signer(0x47) },
        )
    }

    #[test]
    fn regular_without_sudo_is_rejected() {
        assert!(matches!(
            KernelPluginManager::from_validators(None, Some(regular())),
            Err(ValidatorError::RegularWithoutSudo),
        ));
        assert!(KernelPluginManager::from_validators(Some(sudo()), None).is_ok());
    }

    #[test]
    fn active_validator_prefers_the_regular_one() {
        let sudo_only = KernelPluginManager::sudo_only(sudo());
        assert_eq!(sudo_only.active_validator_mode(), ValidatorMode::Sudo);
        assert_eq!(sudo_only.active_validator().address(), ECDSA_VALIDATOR);

        let paired = KernelPluginManager::from_validators(Some(sudo()), Some(regular())).unwrap();
        assert_eq!(paired.active_validator_mode(), ValidatorMode::Plugin);
        assert_eq!(
            paired.active_validator().address(),
            address!("0x2000000000000000000000000000000000000002"),
        );
    }

    #[test]
    fn stub_signature_carries_the_mode_tag() {
        let manager = KernelPluginManager::sudo_only(sudo());
        let stub = manager.stub_signature();
        assert_eq!(&stub[..4], ValidatorMode::Sudo.tag().as_slice());
        assert_eq!(stub.len(), 4 + 65);
    }

    #[tokio::test]
    async fn install_call_data_binds_the_execution_path() {
        let manager = KernelPluginManager::from_validators(Some(sudo()), Some(regular())).unwrap();
        let call = Kernel::setExecutionCall::abi_decode(&manager.install_call_data().await.unwrap())
            .unwrap();
        assert_eq!(call.selector, fixed_bytes!("0x940d3c60"));
        assert_eq!(call.executor, address!("0x3000000000000000000000000000000000000003"));
        assert_eq!(call.validator, address!("0x2000000000000000000000000000000000000002"));
        assert_eq!(call.validUntil, U48::from(2));
        assert_eq!(call.validAfter, U48::from(1));
    }

    #[test]
    fn pending_plugins_track_installation() {
        let manager = KernelPluginManager::sudo_only(sudo()).with_pending_plugins(vec![
            PendingPlugin {
                selector: fixed_bytes!("0x940d3c60"),
                validator: address!("0x2000000000000000000000000000000000000002"),
            },
        ]);
        assert!(!manager.all_installed());
    }

    #[tokio::test]
    async fn approval_requires_connected_validators() {
        use crate::account::{AccountConfig, KernelAccount};
        use alloy::providers::ProviderBuilder;

        let provider =
            ProviderBuilder::new().connect_http("http://localhost:0".parse().unwrap()).erased();
        let account = KernelAccount::with_chain_id(
            provider,
            1,
            sudo(),
            AccountConfig {
                address: Some(address!("0x7b9fc63d6d9e8f94e90d1b0abfc3f611de2638d0")),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // No regular validator on the manager.
        let manager = KernelPluginManager::sudo_only(sudo());
        assert!(manager.approve_plugin(&account).await.is_err());

        // Regular validator present, but the account has no default validator
        // connected to co-sign.
        let manager = KernelPluginManager::from_validators(Some(sudo()), Some(regular())).unwrap();
        assert!(manager.approve_plugin(&account).await.is_err());
    }

    #[tokio::test]
    async fn approval_stores_the_co_signature() {
        use crate::account::{AccountConfig, KernelAccount};
        use alloy::providers::ProviderBuilder;

        let provider =
            ProviderBuilder::new().connect_http("http://localhost:0".parse().unwrap()).erased();
        let mut account = KernelAccount::with_chain_id(
            provider,
            1,
            sudo(),
            AccountConfig {
                address: Some(address!("0x7b9fc63d6d9e8f94e90d1b0abfc3f611de2638d0")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        account.connect_default_validator(sudo());

        let manager = KernelPluginManager::from_validators(Some(sudo()), Some(regular())).unwrap();
        assert!(manager.active_validator().base().enable_signature().is_none());

        manager.approve_plugin(&account).await.unwrap();
        let approval = manager.active_validator().base().enable_signature().unwrap();
        assert_eq!(approval.len(), 65);
    }

    #[test]
    fn validator_approved_payload_packs_the_window() {
        let regular = regular();
        let base = regular.base();
        let packed = pack_validator_data(base.valid_until(), base.valid_after(), base.address());
        assert_eq!(
            packed,
            alloy::primitives::uint!(
                0x0000000000020000000000012000000000000000000000000000000000000002_U256
            ),
        );
    }
}
