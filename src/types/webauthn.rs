//! WebAuthn assertion envelope understood by the passkey validator modules.

use alloy::sol;

sol! {
    /// An ABI-encoded WebAuthn assertion.
    ///
    /// The on-chain verifier recomputes
    /// `sha256(authenticatorData ‖ sha256(clientDataJSON))` and checks the
    /// P-256 signature `(r, s)` against it; the indices let it verify the
    /// `challenge` and `type` members without parsing the whole JSON.
    #[derive(Debug, PartialEq, Eq)]
    struct WebAuthnAuth {
        bytes authenticatorData;
        string clientDataJSON;
        uint256 challengeIndex;
        uint256 typeIndex;
        bytes32 r;
        bytes32 s;
    }
}
