//! Kernel contract interfaces and version metadata.

use crate::constants::KERNEL_IMPLEMENTATION;
use alloy::{primitives::{Address, address}, sol};
use serde::{Deserialize, Serialize};

sol! {
    /// The execution config Kernel registers per 4-byte selector: which
    /// validator and executor handle that execution path, and its validity
    /// window.
    #[derive(Debug, Default, PartialEq, Eq)]
    struct ExecutionDetail {
        uint48 validUntil;
        uint48 validAfter;
        address executor;
        address validator;
    }

    /// A single call in a batch execution.
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Call {
        address to;
        uint256 value;
        bytes data;
    }

    /// The Kernel account contract.
    #[sol(rpc)]
    contract Kernel {
        function getDefaultValidator() public view returns (address validator);
        function getExecution(bytes4 selector) public view returns (ExecutionDetail memory detail);
        function execute(address to, uint256 value, bytes calldata data, uint8 operation) external payable;
        function executeBatch(Call[] calldata calls) external payable;
        function initialize(address validator, bytes calldata enableData) external payable;
        function setExecution(
            bytes4 selector,
            address executor,
            address validator,
            uint48 validUntil,
            uint48 validAfter,
            bytes calldata enableData
        ) external payable;
    }

    /// The deterministic Kernel account factory.
    #[sol(rpc)]
    contract KernelFactory {
        function createAccount(address implementation, bytes calldata data, uint256 index)
            external
            payable
            returns (address proxy);
    }

    /// The slice of the ERC-4337 entry point this SDK talks to directly.
    #[sol(rpc)]
    contract EntryPoint {
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
        function getSenderAddress(bytes calldata initCode) external;

        /// Reverted by `getSenderAddress` to surface the counterfactual
        /// sender address.
        error SenderAddressResult(address sender);
    }

    /// Gnosis-style MultiSend helper, used as a batching fallback for legacy
    /// Kernel implementations.
    #[sol(rpc)]
    contract MultiSend {
        function multiSend(bytes memory transactions) public payable;
    }

    /// The interface shared by every on-chain validator module.
    #[sol(rpc)]
    contract IKernelValidator {
        function enable(bytes calldata data) external payable;
        function disable(bytes calldata data) external payable;
    }
}

/// Deployed Kernel implementation versions this SDK knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelVersion {
    /// Kernel v0.2.0.
    V2_0,
    /// Kernel v0.2.1.
    V2_1,
    /// Kernel v0.2.2.
    V2_2,
    /// Kernel v0.2.3.
    V2_3,
    /// Kernel v0.2.4.
    V2_4,
}

impl KernelVersion {
    /// The `version` field of the Kernel EIP-712 domain for this
    /// implementation.
    pub const fn domain_version(&self) -> &'static str {
        match self {
            Self::V2_0 => "0.2.0",
            Self::V2_1 => "0.2.1",
            Self::V2_2 => "0.2.2",
            Self::V2_3 => "0.2.3",
            Self::V2_4 => "0.2.4",
        }
    }

    /// Whether the implementation has a native `executeBatch` entry point.
    ///
    /// v0.2.0 and v0.2.1 predate it; batches there go through a delegatecall
    /// into the MultiSend helper instead.
    pub const fn has_native_batch(&self) -> bool {
        !matches!(self, Self::V2_0 | Self::V2_1)
    }
}

/// Known Kernel implementation addresses.
pub const KERNEL_IMPLEMENTATIONS: &[(Address, KernelVersion)] = &[
    (address!("0xf048AD83CB2dfd6037A43902a2A5Be04e53cd2Eb"), KernelVersion::V2_0),
    (address!("0x8dD4DBB54d8A8Cf0DE6F9CCC4609470A30EfF18C"), KernelVersion::V2_1),
    (address!("0x0DA6a956B9488eD4dd761E59f52FDc6c8068E6B5"), KernelVersion::V2_2),
    (address!("0xD3F582F6B4814E989Ee8E96bc3175320B5A540ab"), KernelVersion::V2_3),
    (KERNEL_IMPLEMENTATION, KernelVersion::V2_4),
];

/// Looks up the [`KernelVersion`] for a deployed implementation address.
pub fn kernel_version_for_implementation(implementation: Address) -> Option<KernelVersion> {
    KERNEL_IMPLEMENTATIONS
        .iter()
        .find(|(addr, _)| *addr == implementation)
        .map(|(_, version)| *version)
}
