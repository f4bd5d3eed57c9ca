//! SDK configuration.

use crate::{constants::DEFAULT_FEE_BUFFER_PERCENT, error::ConfigError};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Which bundler service the SDK talks to. Keys the bundler-specific
/// priority-fee RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BundlerProvider {
    /// Stackup.
    Stackup,
    /// Alchemy (Rundler).
    Alchemy,
    /// Pimlico.
    Pimlico,
    /// Gelato.
    Gelato,
}

impl BundlerProvider {
    /// The RPC method returning this bundler's priority-fee estimate.
    pub const fn priority_fee_method(&self) -> &'static str {
        match self {
            Self::Stackup | Self::Gelato => "eth_maxPriorityFeePerGas",
            Self::Alchemy => "rundler_maxPriorityFeePerGas",
            Self::Pimlico => "pimlico_getUserOperationGasPrice",
        }
    }

    /// Whether the priority-fee method reports `maxFeePerGas` as well.
    pub const fn reports_max_fee(&self) -> bool {
        matches!(self, Self::Pimlico)
    }
}

/// Immutable SDK configuration.
///
/// Assembled by [`SdkConfig::new`], which validates completeness once at the
/// boundary; every later read is infallible.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// The project identifier used against the backend and paymaster APIs.
    pub project_id: String,
    /// Base URL of the project backend REST API.
    pub backend_url: Url,
    /// Base URL of the paymaster API.
    pub paymaster_url: Url,
    /// Bundler JSON-RPC endpoint.
    pub bundler_url: Url,
    /// Which bundler service `bundler_url` points at.
    pub bundler_provider: BundlerProvider,
    /// Buffer (in percent) added on top of the bundler's priority-fee
    /// estimate.
    pub fee_buffer_percent: u64,
}

impl SdkConfig {
    /// Validates and assembles a configuration. All failures here are
    /// synchronous configuration errors; no network call is made.
    pub fn new(
        project_id: impl Into<String>,
        backend_url: &str,
        paymaster_url: &str,
        bundler_url: &str,
        bundler_provider: BundlerProvider,
    ) -> Result<Self, ConfigError> {
        let project_id = project_id.into();
        if project_id.trim().is_empty() {
            return Err(ConfigError::MissingProjectId);
        }

        let parse = |what: &'static str, value: &str| {
            Url::parse(value)
                .map_err(|_| ConfigError::InvalidUrl { what, value: value.to_string() })
        };

        Ok(Self {
            project_id,
            backend_url: parse("backend", backend_url)?,
            paymaster_url: parse("paymaster", paymaster_url)?,
            bundler_url: parse("bundler", bundler_url)?,
            bundler_provider,
            fee_buffer_percent: DEFAULT_FEE_BUFFER_PERCENT,
        })
    }

    /// Overrides the priority-fee buffer percentage.
    pub fn with_fee_buffer(mut self, percent: u64) -> Result<Self, ConfigError> {
        // A multi-x buffer is a typo, not a strategy.
        if percent > 500 {
            return Err(ConfigError::InvalidFeeBuffer(percent));
        }
        self.fee_buffer_percent = percent;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Result<SdkConfig, ConfigError> {
        SdkConfig::new(
            "proj_1234",
            "https://backend.example.org",
            "https://paymaster.example.org",
            "https://bundler.example.org/rpc",
            BundlerProvider::Pimlico,
        )
    }

    #[test]
    fn validates_at_the_boundary() {
        assert!(config().is_ok());
        assert!(matches!(
            SdkConfig::new("", "https://a", "https://b", "https://c", BundlerProvider::Gelato),
            Err(ConfigError::MissingProjectId),
        ));
        assert!(matches!(
            SdkConfig::new("p", "not a url", "https://b", "https://c", BundlerProvider::Gelato),
            Err(ConfigError::InvalidUrl { what: "backend", .. }),
        ));
        assert!(matches!(
            config().unwrap().with_fee_buffer(10_000),
            Err(ConfigError::InvalidFeeBuffer(10_000)),
        ));
    }

    #[test]
    fn priority_fee_methods_are_keyed_by_provider() {
        assert_eq!(
            BundlerProvider::Alchemy.priority_fee_method(),
            "rundler_maxPriorityFeePerGas"
        );
        assert_eq!(
            BundlerProvider::Pimlico.priority_fee_method(),
            "pimlico_getUserOperationGasPrice"
        );
        assert_eq!(
            BundlerProvider::Stackup.priority_fee_method(),
            "eth_maxPriorityFeePerGas"
        );
        assert!(BundlerProvider::Pimlico.reports_max_fee());
        assert!(!BundlerProvider::Alchemy.reports_max_fee());
    }
}
