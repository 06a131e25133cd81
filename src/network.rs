use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address;
use starknet_crypto::Felt;
use thiserror::Error;

use crate::config::TestnetConfig;
use crate::{MAINNET_API_HOST, PERPETUAL_CONTRACT_MAINNET, TESTNET_API_HOST};

/// Collateral (USDC) asset id registered in the mainnet StarkEx contract.
const COLLATERAL_ASSET_ID_MAINNET: &str =
    "0x02893294412a4c8f915f75892b395ebbf6859ec246ec365c3b1f56f47c3a0a5d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("unsupported network_id {0} (expected 1 or 11155111)")]
    Unsupported(String),
    #[error("unsupported network_id, can only {operation} on mainnet (got {network})")]
    MainnetOnly {
        operation: &'static str,
        network: NetworkId,
    },
    #[error("{parameter} is not configured for {network}; set it under [testnet] in the config")]
    MissingParameter {
        parameter: &'static str,
        network: NetworkId,
    },
    #[error("invalid {parameter} for {network}: {value}")]
    InvalidParameter {
        parameter: &'static str,
        network: NetworkId,
        value: String,
    },
}

/// Ethereum network the exchange instance is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkId {
    Mainnet,
    Sepolia,
}

impl NetworkId {
    /// Numeric id, also the EIP-155 chain id.
    pub fn chain_id(self) -> u64 {
        match self {
            NetworkId::Mainnet => 1,
            NetworkId::Sepolia => 11_155_111,
        }
    }

    pub fn is_mainnet(self) -> bool {
        self == NetworkId::Mainnet
    }

    /// Fail unless this is mainnet. Called before any network I/O.
    pub fn require_mainnet(self, operation: &'static str) -> Result<(), NetworkError> {
        if self.is_mainnet() {
            Ok(())
        } else {
            Err(NetworkError::MainnetOnly {
                operation,
                network: self,
            })
        }
    }

    pub fn api_host(self) -> &'static str {
        match self {
            NetworkId::Mainnet => MAINNET_API_HOST,
            NetworkId::Sepolia => TESTNET_API_HOST,
        }
    }

    /// Address of the StarkEx perpetual contract.
    pub fn perpetual_contract(self, testnet: &TestnetConfig) -> Result<Address, NetworkError> {
        let raw = match self {
            NetworkId::Mainnet => PERPETUAL_CONTRACT_MAINNET,
            NetworkId::Sepolia => testnet.perpetual_contract.as_deref().ok_or(
                NetworkError::MissingParameter {
                    parameter: "perpetual_contract",
                    network: self,
                },
            )?,
        };
        Address::from_str(raw).map_err(|_| NetworkError::InvalidParameter {
            parameter: "perpetual_contract",
            network: self,
            value: raw.to_string(),
        })
    }

    /// StarkEx asset id of the collateral token.
    pub fn collateral_asset_id(self, testnet: &TestnetConfig) -> Result<Felt, NetworkError> {
        let raw = match self {
            NetworkId::Mainnet => COLLATERAL_ASSET_ID_MAINNET,
            NetworkId::Sepolia => testnet.collateral_asset_id.as_deref().ok_or(
                NetworkError::MissingParameter {
                    parameter: "collateral_asset_id",
                    network: self,
                },
            )?,
        };
        Felt::from_hex(raw).map_err(|_| NetworkError::InvalidParameter {
            parameter: "collateral_asset_id",
            network: self,
            value: raw.to_string(),
        })
    }
}

impl TryFrom<u64> for NetworkId {
    type Error = NetworkError;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(NetworkId::Mainnet),
            11_155_111 => Ok(NetworkId::Sepolia),
            other => Err(NetworkError::Unsupported(other.to_string())),
        }
    }
}

impl FromStr for NetworkId {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u64 = s
            .trim()
            .parse()
            .map_err(|_| NetworkError::Unsupported(s.to_string()))?;
        NetworkId::try_from(id)
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkId::Mainnet => write!(f, "mainnet (1)"),
            NetworkId::Sepolia => write!(f, "sepolia (11155111)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_ids() {
        assert_eq!("1".parse::<NetworkId>().unwrap(), NetworkId::Mainnet);
        assert_eq!(
            "11155111".parse::<NetworkId>().unwrap(),
            NetworkId::Sepolia
        );
        assert_eq!(NetworkId::Sepolia.chain_id(), 11_155_111);
    }

    #[test]
    fn rejects_unsupported_ids() {
        assert!(matches!(
            "5".parse::<NetworkId>(),
            Err(NetworkError::Unsupported(_))
        ));
        assert!("mainnet".parse::<NetworkId>().is_err());
    }

    #[test]
    fn mainnet_only_guard() {
        assert!(NetworkId::Mainnet.require_mainnet("deposit").is_ok());
        let err = NetworkId::Sepolia.require_mainnet("deposit").unwrap_err();
        assert_eq!(
            err,
            NetworkError::MainnetOnly {
                operation: "deposit",
                network: NetworkId::Sepolia,
            }
        );
        assert!(err.to_string().contains("can only deposit on mainnet"));
    }

    #[test]
    fn hosts_per_network() {
        assert_eq!(NetworkId::Mainnet.api_host(), MAINNET_API_HOST);
        assert_eq!(NetworkId::Sepolia.api_host(), TESTNET_API_HOST);
    }

    #[test]
    fn mainnet_parameters_are_builtin() {
        let testnet = TestnetConfig::default();
        let contract = NetworkId::Mainnet.perpetual_contract(&testnet).unwrap();
        assert_eq!(contract, Address::from_str(PERPETUAL_CONTRACT_MAINNET).unwrap());
        assert!(NetworkId::Mainnet.collateral_asset_id(&testnet).is_ok());
    }

    #[test]
    fn testnet_parameters_come_from_config() {
        let empty = TestnetConfig::default();
        assert!(matches!(
            NetworkId::Sepolia.perpetual_contract(&empty),
            Err(NetworkError::MissingParameter { .. })
        ));

        let configured = TestnetConfig {
            perpetual_contract: Some("0x0000000000000000000000000000000000000001".into()),
            collateral_asset_id: Some("0x1234".into()),
        };
        assert_eq!(
            NetworkId::Sepolia.perpetual_contract(&configured).unwrap(),
            Address::with_last_byte(1)
        );
        assert_eq!(
            NetworkId::Sepolia.collateral_asset_id(&configured).unwrap(),
            Felt::from(0x1234u64)
        );
    }
}
