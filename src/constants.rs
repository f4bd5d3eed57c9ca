//! Kernel SDK constants.

use alloy::primitives::{Address, B256, Bytes, ChainId, address, b256, bytes};

/// The canonical ERC-4337 v0.6 entry point.
pub const ENTRYPOINT_V06: Address = address!("0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

/// Default Kernel account factory.
pub const KERNEL_FACTORY: Address = address!("0x5de4839a76cf55d0C90e2061ef4386d962E15ae3");

/// Default Kernel implementation (v0.2.4).
pub const KERNEL_IMPLEMENTATION: Address =
    address!("0xd3082872F8B06073A021b4602e022d5A070d7cfC");

/// Default ECDSA validator module.
pub const ECDSA_VALIDATOR: Address = address!("0xd9AB5096a832b9ce79914329DAEE236f8Eea0390");

/// The MultiSend helper used as a batching fallback for Kernel implementations
/// that predate `executeBatch`.
pub const MULTISEND: Address = address!("0x8ae01fCF7c655655fF2c6Ef907b8B4718Ab4e17c");

/// The ERC-1967 implementation slot, read to discover which Kernel version an
/// account is running.
///
/// Equivalent to `bytes32(uint256(keccak256("eip1967.proxy.implementation")) - 1)`.
pub const ERC1967_IMPLEMENTATION_SLOT: B256 =
    b256!("0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// The ERC-6492 magic suffix appended to signatures of not-yet-deployed
/// accounts.
pub const EIP6492_MAGIC_SUFFIX: B256 =
    b256!("0x6492649264926492649264926492649264926492649264926492649264926492");

/// Placeholder ECDSA signature used for gas estimation. 65 bytes, shaped like
/// a real `(r, s, v)` signature so estimation sees realistic calldata.
pub const STUB_ECDSA_SIGNATURE: Bytes = bytes!(
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
    "1c"
);

/// Default verification gas limit before the bundler estimate lands. Covers
/// validator module dispatch plus a deployment via the factory.
pub const DEFAULT_VERIFICATION_GAS_LIMIT: u64 = 110_000;

/// Default call gas limit before the bundler estimate lands.
pub const DEFAULT_CALL_GAS_LIMIT: u64 = 110_000;

/// Fixed portion of `preVerificationGas`, on top of the calldata cost.
pub const PRE_VERIFICATION_GAS_BASE: u64 = 21_000;

/// Calldata gas per zero byte.
pub const CALLDATA_ZERO_BYTE_GAS: u64 = 4;

/// Calldata gas per non-zero byte.
pub const CALLDATA_NON_ZERO_BYTE_GAS: u64 = 16;

/// Safety multiplier (in percent) applied to the bundler's
/// `preVerificationGas` and `callGasLimit` estimates.
pub const GAS_ESTIMATE_MULTIPLIER_PERCENT: u64 = 120;

/// Default buffer (in percent) added on top of the bundler's priority fee
/// estimate.
pub const DEFAULT_FEE_BUFFER_PERCENT: u64 = 13;

/// Per-chain floors for `maxPriorityFeePerGas`, in wei. Chains not listed have
/// no floor.
pub const MIN_PRIORITY_FEE_BY_CHAIN: &[(ChainId, u128)] = &[
    // Polygon mainnet enforces a 30 gwei minimum at the protocol level.
    (137, 30_000_000_000),
    // Polygon Mumbai.
    (80001, 1_500_000_000),
];

/// Returns the priority fee floor for `chain_id`, if any.
pub fn min_priority_fee(chain_id: ChainId) -> Option<u128> {
    MIN_PRIORITY_FEE_BY_CHAIN.iter().find(|(id, _)| *id == chain_id).map(|(_, fee)| *fee)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_signature_is_a_full_ecdsa_signature() {
        assert_eq!(STUB_ECDSA_SIGNATURE.len(), 65);
        assert_eq!(STUB_ECDSA_SIGNATURE[64], 0x1c);
    }

    #[test]
    fn polygon_priority_floor() {
        assert_eq!(min_priority_fee(137), Some(30_000_000_000));
        assert_eq!(min_priority_fee(1), None);
    }
}
