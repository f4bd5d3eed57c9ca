//! Validator modes and the account deployment-state ratchet.

use alloy::primitives::FixedBytes;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// The validation mode a user-operation signature is encoded for.
///
/// The mode is resolved against on-chain state every time a signature is
/// produced and is never persisted: enablement state can change between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorMode {
    /// The validator is the account's root (default) validator.
    Sudo,
    /// The validator is already installed for the execution path in use.
    Plugin,
    /// The validator is not yet enabled on-chain; the signature must carry an
    /// enable proof co-signed by the sudo validator.
    Enable,
}

impl ValidatorMode {
    /// The 4-byte mode tag prepended to every Kernel signature.
    pub const fn tag(&self) -> FixedBytes<4> {
        FixedBytes(match self {
            Self::Sudo => [0x00, 0x00, 0x00, 0x00],
            Self::Plugin => [0x00, 0x00, 0x00, 0x01],
            Self::Enable => [0x00, 0x00, 0x00, 0x02],
        })
    }

    /// Parses a mode from its 4-byte tag.
    pub fn from_tag(tag: FixedBytes<4>) -> Option<Self> {
        match tag.0 {
            [0x00, 0x00, 0x00, 0x00] => Some(Self::Sudo),
            [0x00, 0x00, 0x00, 0x01] => Some(Self::Plugin),
            [0x00, 0x00, 0x00, 0x02] => Some(Self::Enable),
            _ => None,
        }
    }
}

/// Observed deployment state of a Kernel account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeploymentState {
    /// No chain read has settled yet.
    #[default]
    Unknown,
    /// The account has no code at its counterfactual address.
    NotDeployed,
    /// Code was observed at the account address.
    Deployed,
}

impl DeploymentState {
    const fn rank(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::NotDeployed => 1,
            Self::Deployed => 2,
        }
    }
}

/// A monotonic cache around [`DeploymentState`].
///
/// Transitions only move forward (`Unknown → NotDeployed → Deployed`); once
/// `Deployed` is observed it is never re-checked. Races between concurrent
/// reads can at worst repeat a chain read, never regress the state.
#[derive(Debug, Default)]
pub struct DeploymentRatchet(RwLock<DeploymentState>);

impl DeploymentRatchet {
    /// Current state.
    pub fn get(&self) -> DeploymentState {
        *self.0.read().expect("deployment state lock poisoned")
    }

    /// Advances towards `observed`, ignoring any backwards transition.
    /// Returns the state after the update.
    pub fn advance(&self, observed: DeploymentState) -> DeploymentState {
        let mut state = self.0.write().expect("deployment state lock poisoned");
        if observed.rank() > state.rank() {
            *state = observed;
        }
        *state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::fixed_bytes;

    #[test]
    fn mode_tags() {
        assert_eq!(ValidatorMode::Sudo.tag(), fixed_bytes!("0x00000000"));
        assert_eq!(ValidatorMode::Plugin.tag(), fixed_bytes!("0x00000001"));
        assert_eq!(ValidatorMode::Enable.tag(), fixed_bytes!("0x00000002"));
        for mode in [ValidatorMode::Sudo, ValidatorMode::Plugin, ValidatorMode::Enable] {
            assert_eq!(ValidatorMode::from_tag(mode.tag()), Some(mode));
        }
        assert_eq!(ValidatorMode::from_tag(fixed_bytes!("0x00000003")), None);
    }

    #[test]
    fn ratchet_is_monotonic() {
        let ratchet = DeploymentRatchet::default();
        assert_eq!(ratchet.get(), DeploymentState::Unknown);

        assert_eq!(ratchet.advance(DeploymentState::NotDeployed), DeploymentState::NotDeployed);
        assert_eq!(ratchet.advance(DeploymentState::Unknown), DeploymentState::NotDeployed);
        assert_eq!(ratchet.advance(DeploymentState::Deployed), DeploymentState::Deployed);
        // Deployed is terminal.
        assert_eq!(ratchet.advance(DeploymentState::NotDeployed), DeploymentState::Deployed);
    }
}
