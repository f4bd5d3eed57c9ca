//! Kernel EIP-712 helpers.

use crate::types::KernelVersion;
use alloy::{
    dyn_abi::Eip712Domain,
    primitives::{Address, ChainId, U256},
    sol,
};

sol! {
    /// The typed-data payload the sudo validator co-signs to authorize
    /// enabling a plugin validator for one execution path.
    #[derive(Debug, PartialEq, Eq)]
    struct ValidatorApproved {
        /// The 4-byte selector the plugin is being enabled for.
        bytes4 sig;
        /// `validUntil(6) ‖ validAfter(6) ‖ validator(20)`, big-endian.
        uint256 validatorData;
        /// The executor bound to this execution path.
        address executor;
        /// The plugin validator's enable data.
        bytes enableData;
    }
}

/// The EIP-712 domain of a Kernel account.
pub fn kernel_domain(version: KernelVersion, chain_id: ChainId, account: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some("Kernel".into()),
        Some(version.domain_version().into()),
        Some(U256::from(chain_id)),
        Some(account),
        None,
    )
}

/// Packs a validity window and validator address into a single word:
/// `validUntil(6) ‖ validAfter(6) ‖ validator(20)`, big-endian.
pub fn pack_validator_data(valid_until: u64, valid_after: u64, validator: Address) -> U256 {
    let mut word = [0u8; 32];
    word[..6].copy_from_slice(&valid_until.to_be_bytes()[2..]);
    word[6..12].copy_from_slice(&valid_after.to_be_bytes()[2..]);
    word[12..].copy_from_slice(validator.as_slice());
    U256::from_be_bytes(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, uint};

    #[test]
    fn validator_data_layout() {
        let packed = pack_validator_data(
            0x0000_0000_0002,
            0x0000_0000_0001,
            address!("0xd9AB5096a832b9ce79914329DAEE236f8Eea0390"),
        );
        assert_eq!(
            packed,
            uint!(0x000000000002000000000001d9AB5096a832b9ce79914329DAEE236f8Eea0390_U256),
        );
    }

    #[test]
    fn domain_binds_account_and_chain() {
        let account = address!("0x7b9fc63d6d9e8f94e90d1b0abfc3f611de2638d0");
        let domain = kernel_domain(KernelVersion::V2_4, 137, account);
        assert_eq!(domain.name.as_deref(), Some("Kernel"));
        assert_eq!(domain.version.as_deref(), Some("0.2.4"));
        assert_eq!(domain.chain_id, Some(U256::from(137)));
        assert_eq!(domain.verifying_contract, Some(account));
    }
}
