//! # Kernel SDK
//!
//! Client-side SDK for ERC-4337 Kernel smart accounts: builds, signs and
//! submits user operations, with signature validation delegated to pluggable
//! on-chain validator modules and gas payment delegated to paymaster policies.

pub mod account;
pub mod backend;
pub mod bundler;
pub mod config;
pub mod constants;
pub mod eip712;
pub mod erc6492;
pub mod error;
pub mod paymaster;
pub mod pipeline;
pub mod plugin;
pub mod signers;
pub mod types;
pub mod validators;
