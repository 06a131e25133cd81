use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::IP_LOCATION_URL;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
///
/// Loaded once at start-up and passed by reference into every operation.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Exchange API credentials. Absent until `create-user` has been run.
    pub api: Option<ApiConfig>,
    pub stark: StarkConfig,
    pub signer: SignerConfig,
    pub ethereum: EthereumConfig,
    #[serde(default)]
    pub jurisdiction: JurisdictionConfig,
    #[serde(default)]
    pub testnet: TestnetConfig,
    #[serde(default)]
    pub swap: SwapConfig,
}

/// Exchange API credentials returned by onboarding.
#[derive(Clone, Deserialize)]
pub struct ApiConfig {
    pub key: String,
    /// Base64url-encoded HMAC secret.
    pub secret: String,
    pub passphrase: String,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Layer-2 signing key.
#[derive(Clone, Deserialize)]
pub struct StarkConfig {
    /// Hex-encoded STARK private key (with or without 0x prefix).
    pub private_key: String,
}

impl fmt::Debug for StarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StarkConfig").finish_non_exhaustive()
    }
}

/// Which backend signs Ethereum transactions and EIP-712 actions.
#[derive(Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum SignerConfig {
    /// AWS KMS key, addressed as `alias/{key_name}`.
    Kms {
        aws_profile: String,
        key_name: String,
    },
    /// Hex-encoded private key held in the config (test networks only).
    Local { private_key: String },
}

impl fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerConfig::Kms {
                aws_profile,
                key_name,
            } => f
                .debug_struct("Kms")
                .field("aws_profile", aws_profile)
                .field("key_name", key_name)
                .finish(),
            SignerConfig::Local { .. } => f.debug_struct("Local").finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EthereumConfig {
    /// JSON-RPC endpoint used for reads and transaction submission.
    pub rpc_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JurisdictionConfig {
    /// Substring the detected timezone must contain.
    #[serde(default = "default_allowed_timezone")]
    pub allowed_timezone: String,
    #[serde(default = "default_ip_location_url")]
    pub ip_location_url: String,
}

fn default_allowed_timezone() -> String {
    "Europe".to_string()
}

fn default_ip_location_url() -> String {
    IP_LOCATION_URL.to_string()
}

impl Default for JurisdictionConfig {
    fn default() -> Self {
        Self {
            allowed_timezone: default_allowed_timezone(),
            ip_location_url: default_ip_location_url(),
        }
    }
}

/// Contract parameters for the test network, which has no built-in values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestnetConfig {
    pub perpetual_contract: Option<String>,
    pub collateral_asset_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    /// Maximum accepted shortfall from the quote, in basis points.
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    /// Uniswap v3 pool fee tier (hundredths of a basis point).
    #[serde(default = "default_pool_fee")]
    pub pool_fee: u32,
}

fn default_slippage_bps() -> u32 {
    50
}

fn default_pool_fee() -> u32 {
    500
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            slippage_bps: default_slippage_bps(),
            pool_fee: default_pool_fee(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        Ok(config)
    }

    /// API credentials, required by every private endpoint.
    pub fn api(&self) -> Result<&ApiConfig> {
        self.api
            .as_ref()
            .context("[api] credentials missing from config; run create-user first and store the returned key")
    }
}

/// Local-signer config pointing at an unreachable RPC, for tests that must
/// fail before any network I/O.
#[cfg(test)]
pub(crate) fn offline_test_config() -> AppConfig {
    AppConfig {
        api: None,
        stark: StarkConfig {
            private_key: "0x58c7d5a90b1776bde86ebac077e053ed85b0f7164f53b080304a531947d46e3"
                .to_string(),
        },
        signer: SignerConfig::Local {
            private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
                .to_string(),
        },
        ethereum: EthereumConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
        },
        jurisdiction: JurisdictionConfig::default(),
        testnet: TestnetConfig::default(),
        swap: SwapConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[api]
key = "0a1b2c3d-key"
secret = "c2VjcmV0LXNlY3JldC1zZWNyZXQtc2VjcmV0"
passphrase = "very-secret-passphrase"

[stark]
private_key = "0x0123456789abcdef"

[signer]
backend = "kms"
aws_profile = "trading"
key_name = "dydx-eth"

[ethereum]
rpc_url = "https://rpc.example.org"

[jurisdiction]
allowed_timezone = "Europe"

[testnet]
perpetual_contract = "0x0000000000000000000000000000000000000001"
collateral_asset_id = "0x1"

[swap]
slippage_bps = 100
"#;

    #[test]
    fn parses_full_config() {
        let config = AppConfig::parse(FULL).unwrap();
        assert_eq!(config.api().unwrap().key, "0a1b2c3d-key");
        assert!(matches!(config.signer, SignerConfig::Kms { .. }));
        assert_eq!(config.swap.slippage_bps, 100);
        assert_eq!(config.swap.pool_fee, 500);
        assert_eq!(
            config.testnet.collateral_asset_id.as_deref(),
            Some("0x1")
        );
    }

    #[test]
    fn defaults_for_optional_sections() {
        let minimal = r#"
[stark]
private_key = "0x1"

[signer]
backend = "local"
private_key = "0x2"

[ethereum]
rpc_url = "http://localhost:8545"
"#;
        let config = AppConfig::parse(minimal).unwrap();
        assert!(config.api.is_none());
        assert!(config.api().is_err());
        assert_eq!(config.jurisdiction.allowed_timezone, "Europe");
        assert_eq!(config.jurisdiction.ip_location_url, IP_LOCATION_URL);
        assert!(config.testnet.perpetual_contract.is_none());
        assert_eq!(config.swap.slippage_bps, 50);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = AppConfig::parse(FULL).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("c2VjcmV0"));
        assert!(!rendered.contains("very-secret-passphrase"));
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(rendered.contains("0a1b2c3d-key"));

        let local = SignerConfig::Local {
            private_key: "0xdeadbeef".into(),
        };
        assert!(!format!("{local:?}").contains("deadbeef"));
    }
}
