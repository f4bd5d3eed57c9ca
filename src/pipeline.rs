//! The user-operation assembly pipeline.
//!
//! A draft [`UserOperation`] flows through a fixed stage order: dummy
//! paymaster data, fees, gas, real paymaster data, custom middleware, then
//! completeness checking, signing and submission. Each stage only fills
//! fields it owns and leaves caller-provided values alone.

use crate::{
    account::KernelAccount,
    bundler::BundlerClient,
    config::SdkConfig,
    constants::{
        CALLDATA_NON_ZERO_BYTE_GAS, CALLDATA_ZERO_BYTE_GAS, DEFAULT_CALL_GAS_LIMIT,
        DEFAULT_VERIFICATION_GAS_LIMIT, GAS_ESTIMATE_MULTIPLIER_PERCENT,
        PRE_VERIFICATION_GAS_BASE, min_priority_fee,
    },
    error::{PipelineError, SdkError},
    paymaster::{PaymasterClient, dummy_paymaster_and_data},
    plugin::KernelPluginManager,
    types::{Call, UserOperation, UserOperationRequest},
    validators,
};
use alloy::{
    consensus::BlockHeader,
    primitives::{Address, B256, Bytes, TxKind, U256},
    providers::Provider,
    rpc::types::{BlockId, TransactionInput, TransactionRequest},
};
use std::fmt;
use tracing::{debug, instrument, warn};

/// The call a user operation should execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountCall {
    /// A single call through `execute`.
    Call {
        /// Call target.
        to: Address,
        /// Wei attached to the call.
        value: U256,
        /// Call payload.
        data: Bytes,
    },
    /// A single delegatecall through `execute`.
    DelegateCall {
        /// Delegatecall target.
        to: Address,
        /// Wei attached to the call.
        value: U256,
        /// Call payload.
        data: Bytes,
    },
    /// A batch of calls.
    Batch(Vec<Call>),
}

/// A caller-supplied pipeline stage, run after the built-in stages and before
/// the completeness check.
#[async_trait::async_trait]
pub trait UserOpMiddleware: fmt::Debug + Send + Sync {
    /// Mutates the draft in place.
    async fn apply(&self, op: &mut UserOperation) -> Result<(), PipelineError>;
}

/// Builds, signs and submits user operations for one Kernel account.
#[derive(Debug)]
pub struct KernelClient {
    account: KernelAccount,
    plugins: KernelPluginManager,
    bundler: BundlerClient,
    paymaster: Option<PaymasterClient>,
    fee_buffer_percent: u64,
    custom_middleware: Option<Box<dyn UserOpMiddleware>>,
}

impl KernelClient {
    /// Assembles a client from its parts.
    pub fn new(
        account: KernelAccount,
        plugins: KernelPluginManager,
        bundler: BundlerClient,
        paymaster: Option<PaymasterClient>,
        config: &SdkConfig,
    ) -> Self {
        Self {
            account,
            plugins,
            bundler,
            paymaster,
            fee_buffer_percent: config.fee_buffer_percent,
            custom_middleware: None,
        }
    }

    /// Appends a custom middleware stage.
    pub fn with_middleware(mut self, middleware: Box<dyn UserOpMiddleware>) -> Self {
        self.custom_middleware = Some(middleware);
        self
    }

    /// The account this client drives.
    pub fn account(&self) -> &KernelAccount {
        &self.account
    }

    /// The plugin manager.
    pub fn plugins(&self) -> &KernelPluginManager {
        &self.plugins
    }

    /// The bundler client.
    pub fn bundler(&self) -> &BundlerClient {
        &self.bundler
    }

    /// Builds, signs and submits a user operation executing `call`.
    ///
    /// Returns the bundler's user-operation hash. Bundler acceptance is not
    /// inclusion: the deployment ratchet does not move here, so a deploying
    /// operation the bundler later drops can simply be resent with its init
    /// code intact. Poll [`Self::confirm_user_operation`] to observe
    /// inclusion.
    #[instrument(skip_all, fields(sender = %self.account.address()))]
    pub async fn send_user_operation(&self, call: AccountCall) -> Result<B256, SdkError> {
        let draft = self.build_user_operation(call).await?;
        let request = self.sign_user_operation(draft).await?;
        Ok(self.bundler.send_user_operation(&request, self.account.entry_point()).await?)
    }

    /// Checks whether the operation behind `hash` has been included.
    ///
    /// On the first observed receipt the account's deployment state is
    /// re-read from the chain, so a deploying operation stops emitting init
    /// code once its inclusion is confirmed.
    pub async fn confirm_user_operation(&self, hash: B256) -> Result<bool, SdkError> {
        if self.bundler.get_user_operation_receipt(hash).await?.is_none() {
            return Ok(false);
        }
        debug!(%hash, "user operation included");
        self.account.refresh_deployment().await?;
        Ok(true)
    }

    /// Runs the assembly stages and returns the completed draft, stub-signed
    /// and ready for [`Self::sign_user_operation`].
    pub async fn build_user_operation(&self, call: AccountCall) -> Result<UserOperation, SdkError> {
        let call_data = match call {
            AccountCall::Call { to, value, data } => self.account.encode_execute(to, value, data),
            AccountCall::DelegateCall { to, value, data } => {
                self.account.encode_execute_delegate(to, value, data)
            }
            AccountCall::Batch(calls) => self.account.encode_batch_execute(calls).await?,
        };
        let (init_code, nonce) =
            tokio::try_join!(self.account.get_init_code(), self.account.get_nonce())?;

        let mut op = UserOperation {
            sender: self.account.address(),
            nonce,
            init_code,
            call_data,
            signature: self.plugins.stub_signature(),
            ..Default::default()
        };

        self.dummy_paymaster_stage(&mut op);
        self.fee_stage(&mut op).await?;
        self.gas_stage(&mut op).await?;
        self.paymaster_stage(&mut op).await?;
        if let Some(middleware) = &self.custom_middleware {
            middleware.apply(&mut op).await.map_err(SdkError::from)?;
        }
        Ok(op)
    }

    /// Checks the draft for completeness, resolves the signature mode against
    /// chain state and signs with the active validator.
    pub async fn sign_user_operation(
        &self,
        op: UserOperation,
    ) -> Result<UserOperationRequest, SdkError> {
        let request = op.into_request()?;
        let signature = validators::get_signature(
            self.plugins.active_validator().as_ref(),
            self.account.provider(),
            &request,
        )
        .await?;
        Ok(request.with_signature(signature))
    }

    /// Seeds `paymasterAndData` with a correctly-sized placeholder so the gas
    /// stages price the full calldata. Replaced by the real blob later.
    fn dummy_paymaster_stage(&self, op: &mut UserOperation) {
        if self.paymaster.is_some() && op.paymaster_and_data.is_empty() {
            op.paymaster_and_data = dummy_paymaster_and_data(Address::ZERO);
        }
    }

    /// Resolves `maxFeePerGas` and `maxPriorityFeePerGas`, leaving
    /// caller-provided values untouched.
    async fn fee_stage(&self, op: &mut UserOperation) -> Result<(), SdkError> {
        if op.max_fee_per_gas.is_some() && op.max_priority_fee_per_gas.is_some() {
            return Ok(());
        }

        match self.bundler.max_priority_fee().await {
            Ok(fees) => {
                let buffered =
                    apply_buffer(fees.max_priority_fee_per_gas, self.fee_buffer_percent);
                let floor =
                    U256::from(min_priority_fee(self.account.chain_id()).unwrap_or_default());
                let priority = clamp_priority(buffered, floor);

                let max_fee = match fees.max_fee_per_gas {
                    Some(max_fee) => max_fee.max(priority),
                    None => self.base_fee().await? * U256::from(2) + priority,
                };

                op.max_priority_fee_per_gas.get_or_insert(priority);
                op.max_fee_per_gas.get_or_insert(max_fee);
            }
            Err(err) => {
                warn!(%err, "bundler fee query failed, falling back to eth_gasPrice");
                let gas_price = U256::from(self.account.provider().get_gas_price().await?);
                op.max_priority_fee_per_gas.get_or_insert(gas_price);
                op.max_fee_per_gas.get_or_insert(gas_price);
            }
        }
        Ok(())
    }

    async fn base_fee(&self) -> Result<U256, SdkError> {
        let block = self
            .account
            .provider()
            .get_block(BlockId::latest())
            .await?
            .ok_or(PipelineError::MissingBaseFee)?;
        let base_fee = block.header.base_fee_per_gas().ok_or(PipelineError::MissingBaseFee)?;
        Ok(U256::from(base_fee))
    }

    /// Resolves the three gas limit fields. A draft that already carries all
    /// of them passes through untouched, before any network call.
    async fn gas_stage(&self, op: &mut UserOperation) -> Result<(), SdkError> {
        if op.has_gas_limits() {
            return Ok(());
        }

        let deploy_gas = if op.init_code.is_empty() {
            0
        } else {
            self.estimate_deployment_gas(&op.init_code).await?
        };
        let verification_floor =
            U256::from(DEFAULT_VERIFICATION_GAS_LIMIT) + U256::from(deploy_gas);
        let pre_verification_floor = U256::from(calldata_cost(op));

        let estimate = self
            .bundler
            .estimate_user_operation_gas(&op.as_estimation_request(), self.account.entry_point())
            .await?;
        debug!(?estimate, "bundler gas estimate");

        // The bundler's preVerificationGas and callGasLimit run tight; pad
        // them so a small simulation drift does not bounce the operation.
        op.pre_verification_gas
            .get_or_insert(scale_gas(estimate.pre_verification_gas).max(pre_verification_floor));
        op.call_gas_limit
            .get_or_insert(scale_gas(estimate.call_gas_limit).max(U256::from(DEFAULT_CALL_GAS_LIMIT)));
        op.verification_gas_limit
            .get_or_insert(estimate.verification_gas_limit.max(verification_floor));
        Ok(())
    }

    /// Gas to deploy the account, estimated as the entry point calling the
    /// factory with the factory calldata.
    async fn estimate_deployment_gas(&self, init_code: &[u8]) -> Result<u64, SdkError> {
        let factory = Address::from_slice(&init_code[..20]);
        let tx = TransactionRequest {
            from: Some(self.account.entry_point()),
            to: Some(TxKind::Call(factory)),
            input: TransactionInput::new(Bytes::copy_from_slice(&init_code[20..])),
            ..Default::default()
        };
        Ok(self.account.provider().estimate_gas(tx).await?)
    }

    /// Swaps the placeholder paymaster data for a real sponsorship grant.
    /// Without a paymaster the placeholder is cleared and the account pays
    /// for itself.
    async fn paymaster_stage(&self, op: &mut UserOperation) -> Result<(), SdkError> {
        let Some(paymaster) = &self.paymaster else {
            op.paymaster_and_data = Bytes::new();
            return Ok(());
        };

        let grant = paymaster
            .sponsor_user_operation(
                &op.as_estimation_request(),
                self.account.entry_point(),
                self.account.chain_id(),
            )
            .await?;
        op.paymaster_and_data = grant.paymaster_and_data;
        // The paymaster simulated with its own data in place; its gas fields
        // supersede ours when present.
        if let Some(call_gas_limit) = grant.call_gas_limit {
            op.call_gas_limit = Some(call_gas_limit);
        }
        if let Some(verification_gas_limit) = grant.verification_gas_limit {
            op.verification_gas_limit = Some(verification_gas_limit);
        }
        if let Some(pre_verification_gas) = grant.pre_verification_gas {
            op.pre_verification_gas = Some(pre_verification_gas);
        }
        Ok(())
    }
}

/// Adds `percent` on top of `fee`.
fn apply_buffer(fee: U256, percent: u64) -> U256 {
    fee + fee * U256::from(percent) / U256::from(100)
}

/// Clamps a buffered priority fee to the chain's floor.
fn clamp_priority(buffered: U256, floor: U256) -> U256 {
    // TODO: confirm whether this was meant to be a `>` comparison; as written
    // the condition holds for every value except an exact floor hit, and the
    // `max` does the real clamping.
    if buffered.wrapping_sub(floor) != U256::ZERO { buffered.max(floor) } else { floor }
}

/// Scales a bundler gas estimate by the safety multiplier.
fn scale_gas(estimate: U256) -> U256 {
    estimate * U256::from(GAS_ESTIMATE_MULTIPLIER_PERCENT) / U256::from(100)
}

/// Lower bound for `preVerificationGas`: the fixed base plus per-byte
/// calldata gas over the operation's variable-length fields.
fn calldata_cost(op: &UserOperation) -> u64 {
    let byte_cost = |data: &[u8]| {
        data.iter()
            .map(|byte| {
                if *byte == 0 { CALLDATA_ZERO_BYTE_GAS } else { CALLDATA_NON_ZERO_BYTE_GAS }
            })
            .sum::<u64>()
    };
    PRE_VERIFICATION_GAS_BASE
        + byte_cost(&op.init_code)
        + byte_cost(&op.call_data)
        + byte_cost(&op.paymaster_and_data)
        + byte_cost(&op.signature)
}
