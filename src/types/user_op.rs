//! ERC-4337 user operation types and hashing.

use crate::error::PipelineError;
use alloy::{
    primitives::{Address, B256, Bytes, ChainId, U256, keccak256},
    sol,
    sol_types::SolValue,
};
use serde::{Deserialize, Serialize};

sol! {
    /// The fixed-width view of a user operation hashed by the v0.6 entry
    /// point. Variable-length byte fields enter as their keccak hashes and
    /// `signature` is omitted entirely, so a signature can never be
    /// self-referential.
    #[derive(Debug, PartialEq, Eq)]
    struct PackedUserOperation {
        address sender;
        uint256 nonce;
        bytes32 initCodeHash;
        bytes32 callDataHash;
        uint256 callGasLimit;
        uint256 verificationGasLimit;
        uint256 preVerificationGas;
        uint256 maxFeePerGas;
        uint256 maxPriorityFeePerGas;
        bytes32 paymasterAndDataHash;
    }
}

/// A draft user operation, filled in stage by stage by the middleware
/// pipeline.
///
/// Gas and fee fields stay `None` until the stage that owns them has run;
/// [`UserOperation::into_request`] is the single point where completeness is
/// enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserOperation {
    /// The account sending the operation.
    pub sender: Address,
    /// 2-D entry point nonce (192-bit key, 64-bit sequence).
    pub nonce: U256,
    /// Factory address concatenated with factory calldata, or empty once the
    /// account is deployed.
    pub init_code: Bytes,
    /// The call the account will execute.
    pub call_data: Bytes,
    /// Gas limit for the execution phase.
    pub call_gas_limit: Option<U256>,
    /// Gas limit for the validation phase.
    pub verification_gas_limit: Option<U256>,
    /// Gas paid to the bundler for pre-verification overhead.
    pub pre_verification_gas: Option<U256>,
    /// EIP-1559 max fee per gas.
    pub max_fee_per_gas: Option<U256>,
    /// EIP-1559 max priority fee per gas.
    pub max_priority_fee_per_gas: Option<U256>,
    /// Paymaster address concatenated with paymaster-specific data, or empty
    /// for a self-paid operation.
    pub paymaster_and_data: Bytes,
    /// Placeholder (stub) signature while the pipeline runs; replaced by the
    /// real mode-tagged signature at the end.
    pub signature: Bytes,
}

impl UserOperation {
    /// Whether all three gas limit fields are resolved.
    pub fn has_gas_limits(&self) -> bool {
        self.call_gas_limit.is_some()
            && self.verification_gas_limit.is_some()
            && self.pre_verification_gas.is_some()
    }

    /// Validates completeness and lifts the draft into its wire form.
    ///
    /// Fails with the full list of unresolved fields and a diagnostic dump of
    /// the partial struct.
    pub fn into_request(self) -> Result<UserOperationRequest, PipelineError> {
        let mut missing = Vec::new();
        if self.call_gas_limit.is_none() {
            missing.push("callGasLimit");
        }
        if self.verification_gas_limit.is_none() {
            missing.push("verificationGasLimit");
        }
        if self.pre_verification_gas.is_none() {
            missing.push("preVerificationGas");
        }
        if self.max_fee_per_gas.is_none() {
            missing.push("maxFeePerGas");
        }
        if self.max_priority_fee_per_gas.is_none() {
            missing.push("maxPriorityFeePerGas");
        }
        if !missing.is_empty() {
            return Err(PipelineError::IncompleteUserOperation {
                missing,
                op: format!("{self:?}"),
            });
        }

        Ok(UserOperationRequest {
            sender: self.sender,
            nonce: self.nonce,
            init_code: self.init_code,
            call_data: self.call_data,
            call_gas_limit: self.call_gas_limit.unwrap(),
            verification_gas_limit: self.verification_gas_limit.unwrap(),
            pre_verification_gas: self.pre_verification_gas.unwrap(),
            max_fee_per_gas: self.max_fee_per_gas.unwrap(),
            max_priority_fee_per_gas: self.max_priority_fee_per_gas.unwrap(),
            paymaster_and_data: self.paymaster_and_data,
            signature: self.signature,
        })
    }

    /// A wire view with unresolved numeric fields zeroed, suitable for the
    /// bundler's gas estimation call.
    pub fn as_estimation_request(&self) -> UserOperationRequest {
        UserOperationRequest {
            sender: self.sender,
            nonce: self.nonce,
            init_code: self.init_code.clone(),
            call_data: self.call_data.clone(),
            call_gas_limit: self.call_gas_limit.unwrap_or_default(),
            verification_gas_limit: self.verification_gas_limit.unwrap_or_default(),
            pre_verification_gas: self.pre_verification_gas.unwrap_or_default(),
            max_fee_per_gas: self.max_fee_per_gas.unwrap_or_default(),
            max_priority_fee_per_gas: self.max_priority_fee_per_gas.unwrap_or_default(),
            paymaster_and_data: self.paymaster_and_data.clone(),
            signature: self.signature.clone(),
        }
    }
}

/// A fully resolved user operation in wire form: every numeric field present,
/// serialized as `0x`-prefixed hex quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationRequest {
    /// The account sending the operation.
    pub sender: Address,
    /// 2-D entry point nonce.
    pub nonce: U256,
    /// Factory address concatenated with factory calldata.
    pub init_code: Bytes,
    /// The call the account will execute.
    pub call_data: Bytes,
    /// Gas limit for the execution phase.
    pub call_gas_limit: U256,
    /// Gas limit for the validation phase.
    pub verification_gas_limit: U256,
    /// Gas paid to the bundler for pre-verification overhead.
    pub pre_verification_gas: U256,
    /// EIP-1559 max fee per gas.
    pub max_fee_per_gas: U256,
    /// EIP-1559 max priority fee per gas.
    pub max_priority_fee_per_gas: U256,
    /// Paymaster address concatenated with paymaster-specific data.
    pub paymaster_and_data: Bytes,
    /// The (possibly still stub) signature.
    pub signature: Bytes,
}

impl UserOperationRequest {
    /// The v0.6 entry point hash this operation is signed over:
    /// `keccak256(abi.encode(keccak256(packedOp), entryPoint, chainId))`.
    ///
    /// The packed encoding excludes `signature`, so the current value of that
    /// field never influences the hash.
    pub fn hash(&self, entry_point: Address, chain_id: ChainId) -> B256 {
        let packed = PackedUserOperation {
            sender: self.sender,
            nonce: self.nonce,
            initCodeHash: keccak256(&self.init_code),
            callDataHash: keccak256(&self.call_data),
            callGasLimit: self.call_gas_limit,
            verificationGasLimit: self.verification_gas_limit,
            preVerificationGas: self.pre_verification_gas,
            maxFeePerGas: self.max_fee_per_gas,
            maxPriorityFeePerGas: self.max_priority_fee_per_gas,
            paymasterAndDataHash: keccak256(&self.paymaster_and_data),
        };
        keccak256(
            (keccak256(packed.abi_encode()), entry_point, U256::from(chain_id)).abi_encode(),
        )
    }

    /// Replaces the signature, returning the finalized request.
    pub fn with_signature(mut self, signature: Bytes) -> Self {
        self.signature = signature;
        self
    }
}

/// Gas limits returned by the bundler's `eth_estimateUserOperationGas`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    /// Estimated pre-verification gas.
    pub pre_verification_gas: U256,
    /// Estimated verification gas limit.
    pub verification_gas_limit: U256,
    /// Estimated call gas limit.
    pub call_gas_limit: U256,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ENTRYPOINT_V06;
    use alloy::primitives::{address, bytes};

    fn request() -> UserOperationRequest {
        UserOperation {
            sender: address!("0x7b9fc63d6d9e8f94e90d1b0abfc3f611de2638d0"),
            nonce: U256::from(7),
            init_code: bytes!("0x"),
            call_data: bytes!("0x940d3c6012345678"),
            call_gas_limit: Some(U256::from(110_000)),
            verification_gas_limit: Some(U256::from(110_000)),
            pre_verification_gas: Some(U256::from(48_000)),
            max_fee_per_gas: Some(U256::from(2_000_000_000u64)),
            max_priority_fee_per_gas: Some(U256::from(1_000_000_000u64)),
            paymaster_and_data: bytes!("0x"),
            signature: bytes!("0x"),
        }
        .into_request()
        .unwrap()
    }

    #[test]
    fn hash_ignores_signature() {
        let unsigned = request();
        let signed = unsigned.clone().with_signature(bytes!("0xdeadbeef"));
        assert_eq!(
            unsigned.hash(ENTRYPOINT_V06, 1),
            signed.hash(ENTRYPOINT_V06, 1),
        );
    }

    #[test]
    fn hash_binds_chain_and_entry_point() {
        let op = request();
        assert_ne!(op.hash(ENTRYPOINT_V06, 1), op.hash(ENTRYPOINT_V06, 137));
        assert_ne!(
            op.hash(ENTRYPOINT_V06, 1),
            op.hash(address!("0x0000000000000000000000000000000000000001"), 1),
        );
    }

    #[test]
    fn incomplete_draft_reports_every_missing_field() {
        let err = UserOperation::default().into_request().unwrap_err();
        let PipelineError::IncompleteUserOperation { missing, op } = err else {
            panic!("unexpected error variant");
        };
        assert_eq!(
            missing,
            vec![
                "callGasLimit",
                "verificationGasLimit",
                "preVerificationGas",
                "maxFeePerGas",
                "maxPriorityFeePerGas",
            ],
        );
        // The diagnostic dump carries the partial struct.
        assert!(op.contains("UserOperation"));
    }

    #[test]
    fn wire_serialization_is_camel_case_hex() {
        let json = serde_json::to_value(request()).unwrap();
        assert_eq!(json["callGasLimit"], "0x1adb0");
        assert_eq!(json["initCode"], "0x");
        assert!(json.get("call_gas_limit").is_none());
    }
}
