//! Kernel smart account: address derivation, init code, call-data encoding
//! and ERC-6492 message signing.

use crate::{
    backend::BackendClient,
    constants::ERC1967_IMPLEMENTATION_SLOT,
    eip712::kernel_domain,
    erc6492,
    error::{AccountError, SdkError},
    types::{
        Call, DeploymentRatchet, DeploymentState, EntryPoint, Kernel, KernelFactory,
        KernelVersion, MultiSend, kernel_version_for_implementation,
    },
    validators::KernelValidator,
};
use alloy::{
    dyn_abi::TypedData,
    primitives::{Address, B256, Bytes, ChainId, U256, eip191_hash_message},
    providers::{DynProvider, Provider},
    sol_types::SolCall,
};
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument, warn};

/// Static account parameters. The defaults point at the canonical v0.6 entry
/// point and the latest Kernel factory deployment.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// The ERC-4337 entry point the account is driven through.
    pub entry_point: Address,
    /// The deterministic account factory.
    pub factory: Address,
    /// The Kernel implementation behind the proxy.
    pub implementation: Address,
    /// The Kernel version of `implementation`.
    pub version: KernelVersion,
    /// Salt index, for multiple accounts per owner.
    pub index: U256,
    /// Known account address. When `None` the address is derived through the
    /// entry point.
    pub address: Option<Address>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            entry_point: crate::constants::ENTRYPOINT_V06,
            factory: crate::constants::KERNEL_FACTORY,
            implementation: crate::constants::KERNEL_IMPLEMENTATION,
            version: KernelVersion::V2_4,
            index: U256::ZERO,
            address: None,
        }
    }
}

/// A Kernel account, deployed or counterfactual.
///
/// Deployment state is tracked through a monotonic ratchet: once the account
/// is observed deployed the init code is empty forever and no further code
/// reads happen.
#[derive(Debug)]
pub struct KernelAccount {
    provider: DynProvider,
    chain_id: ChainId,
    config: AccountConfig,
    address: Address,
    validator: Arc<dyn KernelValidator>,
    default_validator: Option<Arc<dyn KernelValidator>>,
    deployment: DeploymentRatchet,
    /// Version of the implementation actually behind the deployed proxy.
    /// Read once; an ERC-1967 implementation cannot change out from under a
    /// Kernel proxy without a sudo upgrade this SDK never issues.
    deployed_version: OnceLock<KernelVersion>,
}

impl KernelAccount {
    /// Resolves the project's chain id through the backend, then derives or
    /// accepts the account address. A project without a chain id is fatal.
    pub async fn init(
        provider: DynProvider,
        backend: &BackendClient,
        project_id: &str,
        validator: Arc<dyn KernelValidator>,
        config: AccountConfig,
    ) -> Result<Self, SdkError> {
        let chain_id = backend.get_chain_id(project_id).await?;
        Self::with_chain_id(provider, chain_id, validator, config).await
    }

    /// Like [`Self::init`] for callers that already know the chain id.
    pub async fn with_chain_id(
        provider: DynProvider,
        chain_id: ChainId,
        validator: Arc<dyn KernelValidator>,
        config: AccountConfig,
    ) -> Result<Self, SdkError> {
        let mut account = Self {
            address: Address::ZERO,
            provider,
            chain_id,
            config,
            validator,
            default_validator: None,
            deployment: DeploymentRatchet::default(),
            deployed_version: OnceLock::new(),
        };
        account.address = match account.config.address {
            Some(address) => address,
            None => account.derive_address().await?,
        };
        debug!(address = %account.address, chain_id, "kernel account ready");
        Ok(account)
    }

    /// The account address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The chain the account lives on.
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// The entry point the account is driven through.
    pub fn entry_point(&self) -> Address {
        self.config.entry_point
    }

    /// The Kernel version the account was constructed for.
    pub fn version(&self) -> KernelVersion {
        self.config.version
    }

    /// The underlying provider.
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// The active validator.
    pub fn validator(&self) -> &Arc<dyn KernelValidator> {
        &self.validator
    }

    /// The account's default (sudo) validator, if connected.
    pub fn default_validator(&self) -> Option<&Arc<dyn KernelValidator>> {
        self.default_validator.as_ref()
    }

    /// The deployment-state ratchet.
    pub fn deployment(&self) -> &DeploymentRatchet {
        &self.deployment
    }

    /// Swaps the active validator. The prior validator is dropped; a caller
    /// that wants both keeps its own clone of the `Arc`.
    pub fn connect_validator(&mut self, validator: Arc<dyn KernelValidator>) {
        self.validator = validator;
    }

    /// Connects the default (sudo) validator used to co-sign plugin enables.
    pub fn connect_default_validator(&mut self, validator: Arc<dyn KernelValidator>) {
        self.default_validator = Some(validator);
    }

    /// The account's EIP-712 domain.
    pub fn eip712_domain(&self) -> alloy::dyn_abi::Eip712Domain {
        kernel_domain(self.config.version, self.chain_id, self.address)
    }

    /// `initialize(validator, enableData)` calldata, as passed to the factory.
    async fn initialize_call_data(&self) -> Result<Bytes, SdkError> {
        Ok(Kernel::initializeCall {
            validator: self.validator.address(),
            enableData: self.validator.enable_data().await?,
        }
        .abi_encode()
        .into())
    }

    /// `createAccount(implementation, initData, index)` calldata for the
    /// factory.
    pub async fn factory_call_data(&self) -> Result<Bytes, SdkError> {
        Ok(KernelFactory::createAccountCall {
            implementation: self.config.implementation,
            data: self.initialize_call_data().await?,
            index: self.config.index,
        }
        .abi_encode()
        .into())
    }

    /// The init code for the next user operation: `factory ‖ factoryCalldata`
    /// while the account is counterfactual, empty once it is deployed.
    pub async fn get_init_code(&self) -> Result<Bytes, SdkError> {
        if self.is_deployed().await? {
            return Ok(Bytes::new());
        }
        let call_data = self.factory_call_data().await?;
        Ok([self.config.factory.as_slice(), &call_data[..]].concat().into())
    }

    /// Whether the account has code. The chain is read once, on the first
    /// call; afterwards the ratchet is trusted until [`Self::refresh_deployment`]
    /// advances it.
    pub async fn is_deployed(&self) -> Result<bool, SdkError> {
        match self.deployment.get() {
            DeploymentState::Deployed => Ok(true),
            DeploymentState::NotDeployed => Ok(false),
            DeploymentState::Unknown => self.refresh_deployment().await,
        }
    }

    /// Re-reads the account code and advances the ratchet.
    pub async fn refresh_deployment(&self) -> Result<bool, SdkError> {
        let code = self.provider.get_code_at(self.address).await?;
        let observed = if code.is_empty() {
            DeploymentState::NotDeployed
        } else {
            DeploymentState::Deployed
        };
        Ok(self.deployment.advance(observed) == DeploymentState::Deployed)
    }

    /// The entry point nonce on the active validator's nonce lane.
    pub async fn get_nonce(&self) -> Result<U256, SdkError> {
        let nonce = EntryPoint::new(self.config.entry_point, &self.provider)
            .getNonce(self.address, self.validator.nonce_key())
            .call()
            .await?;
        Ok(nonce)
    }

    /// Derives the counterfactual address through the entry point's
    /// `getSenderAddress`, which reports the address by reverting.
    #[instrument(skip(self))]
    async fn derive_address(&self) -> Result<Address, SdkError> {
        let call_data = self.factory_call_data().await?;
        let init_code: Bytes =
            [self.config.factory.as_slice(), &call_data[..]].concat().into();
        match EntryPoint::new(self.config.entry_point, &self.provider)
            .getSenderAddress(init_code)
            .call()
            .await
        {
            // A non-reverting call means we are not talking to a real entry
            // point.
            Ok(_) => Err(AccountError::AddressDerivationFailed.into()),
            Err(err) => {
                let result = err
                    .as_decoded_error::<EntryPoint::SenderAddressResult>()
                    .ok_or(AccountError::AddressDerivationFailed)?;
                Ok(result.sender)
            }
        }
    }

    /// The implementation address behind the account proxy, read from the
    /// ERC-1967 implementation slot.
    pub async fn kernel_implementation(&self) -> Result<Address, SdkError> {
        let word = self
            .provider
            .get_storage_at(self.address, ERC1967_IMPLEMENTATION_SLOT.into())
            .await?;
        Ok(Address::from_slice(&word.to_be_bytes::<32>()[12..]))
    }

    /// Discovers the deployed account's Kernel version from its
    /// implementation address. Cached after the first successful read.
    pub async fn resolve_version(&self) -> Result<KernelVersion, SdkError> {
        if let Some(version) = self.deployed_version.get() {
            return Ok(*version);
        }
        let implementation = self.kernel_implementation().await?;
        let version = kernel_version_for_implementation(implementation)
            .ok_or(AccountError::UnknownImplementation(implementation))?;
        Ok(*self.deployed_version.get_or_init(|| version))
    }

    #[cfg(test)]
    fn seed_deployed_version(&self, version: KernelVersion) {
        self.deployed_version.set(version).expect("deployed version already seeded");
    }

    /// Calldata for a single call through `execute`.
    ///
    /// Calls targeting the account itself pass through unwrapped when the
    /// active validator acts via the fallback handler; wrapping them in
    /// `execute` would route them past the handler.
    pub fn encode_execute(&self, to: Address, value: U256, data: Bytes) -> Bytes {
        if to == self.address && self.validator.should_delegate_via_fallback() {
            return data;
        }
        Kernel::executeCall { to, value, data, operation: 0 }.abi_encode().into()
    }

    /// Calldata for a single delegatecall through `execute`.
    pub fn encode_execute_delegate(&self, to: Address, value: U256, data: Bytes) -> Bytes {
        Kernel::executeCall { to, value, data, operation: 1 }.abi_encode().into()
    }

    /// Calldata for a batch of calls.
    ///
    /// The decision keys off the implementation actually deployed behind the
    /// proxy, not the configured version: a deployed account on a legacy
    /// implementation has no native `executeBatch` and gets the batch as a
    /// delegatecall into the MultiSend helper. A counterfactual account always
    /// deploys `config.implementation`, which has it.
    pub async fn encode_batch_execute(&self, calls: Vec<Call>) -> Result<Bytes, SdkError> {
        if self.is_deployed().await? && !self.resolve_version().await?.has_native_batch() {
            let transactions = pack_multisend(&calls);
            let inner = MultiSend::multiSendCall { transactions }.abi_encode().into();
            return Ok(self.encode_execute_delegate(crate::constants::MULTISEND, U256::ZERO, inner));
        }
        Ok(Kernel::executeBatchCall { calls }.abi_encode().into())
    }

    /// Signs a personal (EIP-191) message, wrapping the signature per
    /// ERC-6492 while the account is counterfactual.
    pub async fn sign_message_with_6492(&self, message: &[u8]) -> Result<Bytes, SdkError> {
        self.sign_digest_with_6492(eip191_hash_message(message)).await
    }

    /// Signs EIP-712 typed data, wrapping the signature per ERC-6492 while
    /// the account is counterfactual.
    pub async fn sign_typed_data_with_6492(&self, typed: &TypedData) -> Result<Bytes, SdkError> {
        let digest = typed.eip712_signing_hash().map_err(|err| {
            warn!(%err, "typed data hashing failed");
            AccountError::Eip6492SigningFailed
        })?;
        self.sign_digest_with_6492(digest).await
    }

    async fn sign_digest_with_6492(&self, digest: B256) -> Result<Bytes, SdkError> {
        match self.try_sign_digest_with_6492(digest).await {
            Ok(signature) => Ok(signature),
            Err(err) => {
                // Callers get one stable error; the cause goes to the log.
                warn!(%err, account = %self.address, "message signing failed");
                Err(AccountError::Eip6492SigningFailed.into())
            }
        }
    }

    async fn try_sign_digest_with_6492(&self, digest: B256) -> Result<Bytes, SdkError> {
        let signature = self.validator.sign_hash(digest).await?;
        let deployed = self.is_deployed().await?;
        self.finalize_signature(signature, deployed).await
    }

    async fn finalize_signature(&self, signature: Bytes, deployed: bool) -> Result<Bytes, SdkError> {
        if deployed {
            return Ok(signature);
        }
        Ok(erc6492::wrap(self.config.factory, self.factory_call_data().await?, signature))
    }
}

/// Packs calls into the MultiSend wire format: one
/// `operation(1) ‖ to(20) ‖ value(32) ‖ dataLength(32) ‖ data` record per
/// call, all plain calls.
fn pack_multisend(calls: &[Call]) -> Bytes {
    let mut packed = Vec::with_capacity(calls.iter().map(|c| 85 + c.data.len()).sum());
    for call in calls {
        packed.push(0u8);
        packed.extend_from_slice(call.to.as_slice());
        packed.extend_from_slice(&call.value.to_be_bytes::<32>());
        packed.extend_from_slice(&U256::from(call.data.len()).to_be_bytes::<32>());
        packed.extend_from_slice(&call.data);
    }
    packed.into()
}
