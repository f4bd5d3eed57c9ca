//! Paymaster sponsorship client.

use crate::{
    constants::STUB_ECDSA_SIGNATURE,
    error::PaymasterError,
    types::UserOperationRequest,
};
use alloy::primitives::{Address, Bytes, ChainId, U256};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// How the paymaster pays for operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymasterPolicy {
    /// Gas is sponsored by the project's verifying paymaster.
    ///
    /// With `sponsor_only` set, a declined sponsorship aborts the operation
    /// instead of falling back to self-funding.
    Verifying {
        /// Abort instead of self-funding when sponsorship is declined.
        sponsor_only: bool,
    },
    /// Gas is paid in an ERC-20 token through the token paymaster.
    Token {
        /// The token gas is charged in.
        gas_token: Address,
    },
}

impl PaymasterPolicy {
    /// Whether a declined sponsorship is fatal under this policy.
    pub const fn mandates_sponsorship(&self) -> bool {
        matches!(self, Self::Verifying { sponsor_only: true })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SponsorRequest<'a> {
    project_id: &'a str,
    chain_id: ChainId,
    user_op: &'a UserOperationRequest,
    entry_point_address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_address: Option<Address>,
}

/// A sponsorship grant. Paymasters may also revise the gas fields they
/// simulated with.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorResponse {
    /// The signed `paymasterAndData` blob, or `0x` when declined.
    pub paymaster_and_data: Bytes,
    /// Replacement `callGasLimit`, if the paymaster re-estimated.
    #[serde(default)]
    pub call_gas_limit: Option<U256>,
    /// Replacement `verificationGasLimit`, if the paymaster re-estimated.
    #[serde(default)]
    pub verification_gas_limit: Option<U256>,
    /// Replacement `preVerificationGas`, if the paymaster re-estimated.
    #[serde(default)]
    pub pre_verification_gas: Option<U256>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymasterAddressRequest<'a> {
    project_id: &'a str,
    chain_id: ChainId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymasterAddressResponse {
    paymaster_address: Address,
}

/// Client for the paymaster signing API.
#[derive(Debug, Clone)]
pub struct PaymasterClient {
    http: reqwest::Client,
    base_url: Url,
    project_id: String,
    policy: PaymasterPolicy,
}

impl PaymasterClient {
    /// Creates a client for the paymaster API at `base_url`.
    pub fn new(base_url: Url, project_id: impl Into<String>, policy: PaymasterPolicy) -> Self {
        Self { http: reqwest::Client::new(), base_url, project_id: project_id.into(), policy }
    }

    /// The sponsorship policy this client was configured with.
    pub fn policy(&self) -> &PaymasterPolicy {
        &self.policy
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Requests sponsorship for `op`.
    ///
    /// Under a sponsor-only policy an empty `paymasterAndData` in the reply
    /// becomes [`PaymasterError::SponsorshipDeclined`].
    #[instrument(skip_all, fields(sender = %op.sender))]
    pub async fn sponsor_user_operation(
        &self,
        op: &UserOperationRequest,
        entry_point: Address,
        chain_id: ChainId,
    ) -> Result<SponsorResponse, PaymasterError> {
        let token_address = match self.policy {
            PaymasterPolicy::Token { gas_token } => Some(gas_token),
            PaymasterPolicy::Verifying { .. } => None,
        };
        let resp = self
            .http
            .post(self.endpoint("sign"))
            .json(&SponsorRequest {
                project_id: &self.project_id,
                chain_id,
                user_op: op,
                entry_point_address: entry_point,
                token_address,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PaymasterError::InvalidResponse(format!("{status}: {body}")));
        }
        let grant: SponsorResponse = resp.json().await?;
        if grant.paymaster_and_data.is_empty() && self.policy.mandates_sponsorship() {
            return Err(PaymasterError::SponsorshipDeclined);
        }
        Ok(grant)
    }

    /// The paymaster contract address serving this project on `chain_id`.
    pub async fn get_paymaster_address(
        &self,
        chain_id: ChainId,
    ) -> Result<Address, PaymasterError> {
        let resp = self
            .http
            .post(self.endpoint("getPaymasterAddress"))
            .json(&PaymasterAddressRequest { project_id: &self.project_id, chain_id })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(PaymasterError::InvalidResponse(resp.status().to_string()));
        }
        let body: PaymasterAddressResponse = resp.json().await?;
        Ok(body.paymaster_address)
    }
}

/// A `paymasterAndData` stand-in with the length of a real verifying-paymaster
/// blob, so gas estimation prices the full calldata.
pub fn dummy_paymaster_and_data(paymaster: Address) -> Bytes {
    [paymaster.as_slice(), &[0u8; 64], &STUB_ECDSA_SIGNATURE[..]].concat().into()
}
