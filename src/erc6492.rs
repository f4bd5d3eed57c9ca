//! ERC-6492 signature wrapping for not-yet-deployed accounts.
//!
//! A wrapped signature lets a verifier deploy the account first (via the
//! embedded factory call) and then verify the inner signature against the
//! deployed code.

use crate::constants::EIP6492_MAGIC_SUFFIX;
use alloy::{
    primitives::{Address, Bytes},
    sol_types::SolValue,
};

/// Wraps `signature` per ERC-6492:
/// `abi.encode(factory, factoryCalldata, signature) ‖ magicSuffix`.
pub fn wrap(factory: Address, factory_calldata: Bytes, signature: Bytes) -> Bytes {
    let mut wrapped = (factory, factory_calldata, signature).abi_encode_params();
    wrapped.extend_from_slice(EIP6492_MAGIC_SUFFIX.as_slice());
    wrapped.into()
}

/// Whether `signature` carries the ERC-6492 magic suffix.
pub fn is_wrapped(signature: &[u8]) -> bool {
    signature.ends_with(EIP6492_MAGIC_SUFFIX.as_slice())
}

/// Peels an ERC-6492 wrapper, returning `(factory, factoryCalldata,
/// innerSignature)`. Returns `None` if the suffix or the ABI payload does not
/// parse.
pub fn unwrap(signature: &[u8]) -> Option<(Address, Bytes, Bytes)> {
    let body = signature.strip_suffix(EIP6492_MAGIC_SUFFIX.as_slice())?;
    <(Address, Bytes, Bytes)>::abi_decode_params(body).ok()
}
