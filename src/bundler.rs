//! ERC-4337 bundler JSON-RPC client.

use crate::{
    config::BundlerProvider,
    types::{GasEstimate, UserOperationRequest},
};
use alloy::{
    primitives::{Address, B256, U256},
    rpc::client::{ClientBuilder, RpcClient},
    transports::TransportResult,
};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

/// Fee fields a bundler reports for new user operations.
///
/// Only Pimlico's method returns `max_fee_per_gas`; the others report the
/// priority fee alone and leave the max fee to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundlerFees {
    /// `maxFeePerGas`, when the bundler reports one.
    pub max_fee_per_gas: Option<U256>,
    /// `maxPriorityFeePerGas`.
    pub max_priority_fee_per_gas: U256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PimlicoGasPrice {
    fast: PimlicoFeePair,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PimlicoFeePair {
    max_fee_per_gas: U256,
    max_priority_fee_per_gas: U256,
}

/// Client for a bundler's `eth_*UserOperation*` namespace.
#[derive(Debug, Clone)]
pub struct BundlerClient {
    client: RpcClient,
    provider: BundlerProvider,
}

impl BundlerClient {
    /// Creates a client for the bundler at `url`.
    pub fn new(url: Url, provider: BundlerProvider) -> Self {
        Self { client: ClientBuilder::default().http(url), provider }
    }

    /// Which bundler service this client talks to.
    pub fn provider(&self) -> BundlerProvider {
        self.provider
    }

    /// Asks the bundler to simulate and price the operation.
    pub async fn estimate_user_operation_gas(
        &self,
        op: &UserOperationRequest,
        entry_point: Address,
    ) -> TransportResult<GasEstimate> {
        self.client
            .request("eth_estimateUserOperationGas", (op.clone(), entry_point))
            .await
    }

    /// Submits a signed operation to the bundler mempool.
    pub async fn send_user_operation(
        &self,
        op: &UserOperationRequest,
        entry_point: Address,
    ) -> TransportResult<B256> {
        let hash: B256 =
            self.client.request("eth_sendUserOperation", (op.clone(), entry_point)).await?;
        debug!(%hash, sender = %op.sender, "submitted user operation");
        Ok(hash)
    }

    /// Fetches the inclusion receipt for an operation, if it has landed.
    pub async fn get_user_operation_receipt(
        &self,
        hash: B256,
    ) -> TransportResult<Option<serde_json::Value>> {
        self.client.request("eth_getUserOperationReceipt", (hash,)).await
    }

    /// The bundler's current fee estimate, queried through whichever RPC
    /// method this bundler exposes.
    pub async fn max_priority_fee(&self) -> TransportResult<BundlerFees> {
        let method = self.provider.priority_fee_method();
        if self.provider.reports_max_fee() {
            let price: PimlicoGasPrice = self.client.request_noparams(method).await?;
            Ok(BundlerFees {
                max_fee_per_gas: Some(price.fast.max_fee_per_gas),
                max_priority_fee_per_gas: price.fast.max_priority_fee_per_gas,
            })
        } else {
            let priority: U256 = self.client.request_noparams(method).await?;
            Ok(BundlerFees { max_fee_per_gas: None, max_priority_fee_per_gas: priority })
        }
    }
}
