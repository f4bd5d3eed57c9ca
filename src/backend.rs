//! Project backend REST client.

use crate::error::BackendError;
use alloy::primitives::{Address, Bytes, ChainId};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Thin client for the project backend.
///
/// The backend knows which chain a project lives on and stores recovery
/// flows while guardian approvals are being collected off-chain.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

/// A recovery flow as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryRecord {
    /// Backend identifier of the flow.
    pub recovery_id: String,
    /// The account being recovered.
    pub account: Address,
    /// The owner the account rotates to once the flow executes.
    pub new_owner: Address,
    /// Guardian signatures collected so far.
    #[serde(default)]
    pub signatures: Vec<Bytes>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainIdRequest<'a> {
    project_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainIdResponse {
    chain_id: Option<ChainId>,
}

/// Payload creating a new recovery flow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecoveryRequest {
    /// The account to recover.
    pub account: Address,
    /// The owner to rotate to.
    pub new_owner: Address,
    /// Chain the account lives on.
    pub chain_id: ChainId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddSignatureRequest<'a> {
    signature: &'a Bytes,
}

impl BackendClient {
    /// Creates a client against `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self { http: reqwest::Client::new(), base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if !resp.status().is_success() {
            return Err(BackendError::Status(resp.status().as_u16()));
        }
        Ok(resp)
    }

    /// Resolves the chain id the project is configured for.
    ///
    /// A project without a chain id cannot be used at all, so a missing id is
    /// an error rather than a default.
    #[instrument(skip(self))]
    pub async fn get_chain_id(&self, project_id: &str) -> Result<ChainId, BackendError> {
        let resp = self
            .http
            .post(self.endpoint("v1/projects/get-chain-id"))
            .json(&ChainIdRequest { project_id })
            .send()
            .await?;
        let body: ChainIdResponse = Self::check(resp).await?.json().await?;
        body.chain_id.ok_or(BackendError::ChainIdNotFound)
    }

    /// Opens a new recovery flow.
    pub async fn create_recovery(
        &self,
        request: &CreateRecoveryRequest,
    ) -> Result<RecoveryRecord, BackendError> {
        let resp =
            self.http.post(self.endpoint("v1/recovery")).json(request).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Fetches a recovery flow by id.
    pub async fn get_recovery(&self, recovery_id: &str) -> Result<RecoveryRecord, BackendError> {
        let resp =
            self.http.get(self.endpoint(&format!("v1/recovery/{recovery_id}"))).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Appends a guardian signature to a recovery flow.
    pub async fn add_recovery_signature(
        &self,
        recovery_id: &str,
        signature: &Bytes,
    ) -> Result<RecoveryRecord, BackendError> {
        let resp = self
            .http
            .patch(self.endpoint(&format!("v1/recovery/{recovery_id}")))
            .json(&AddSignatureRequest { signature })
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_tolerate_trailing_slashes() {
        let with = BackendClient::new("https://backend.example.org/".parse().unwrap());
        let without = BackendClient::new("https://backend.example.org".parse().unwrap());
        assert_eq!(
            with.endpoint("v1/projects/get-chain-id"),
            "https://backend.example.org/v1/projects/get-chain-id"
        );
        assert_eq!(with.endpoint("v1/recovery/abc"), without.endpoint("v1/recovery/abc"));
    }

    #[test]
    fn missing_chain_id_is_an_error() {
        let body: ChainIdResponse = serde_json::from_str("{}").unwrap();
        assert!(body.chain_id.ok_or(BackendError::ChainIdNotFound).is_err());

        let body: ChainIdResponse = serde_json::from_str(r#"{"chainId":137}"#).unwrap();
        assert_eq!(body.chain_id, Some(137));
    }
}
