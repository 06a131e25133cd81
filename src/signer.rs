//! Layer-1 (Ethereum) signing.
//!
//! Production signing is delegated to an AWS KMS key so the wallet key never
//! enters this process. A local key is accepted for test networks.

use std::fmt;
use std::str::FromStr;

use alloy::network::{EthereumWallet, TxSigner};
use alloy::primitives::{Address, B256, Signature};
use alloy::signers::Signer;
use alloy::signers::aws::AwsSigner;
use alloy::signers::local::LocalSigner;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use thiserror::Error;
use tracing::debug;

use crate::config::SignerConfig;

/// Concrete signer type produced by `LocalSigner::from_str`.
pub type PrivateKeySigner = LocalSigner<k256::ecdsa::SigningKey>;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("invalid local private key")]
    InvalidPrivateKey(#[source] alloy::signers::local::LocalSignerError),
    #[error("failed to initialize KMS signer for key {key_id}")]
    Kms {
        key_id: String,
        #[source]
        source: Box<alloy::signers::aws::AwsSignerError>,
    },
    #[error("signing failed")]
    Sign(#[source] alloy::signers::Error),
}

/// Ethereum account that can sign transactions and raw digests.
///
/// Kept separate from [`crate::stark::OffchainMessageSigner`]: the two keys
/// live on different curves and serve different layers.
#[async_trait]
pub trait OnChainSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Wallet used by the provider filler chain to sign transactions.
    fn wallet(&self) -> EthereumWallet;

    /// Sign a 32-byte digest (no EIP-191 prefix).
    async fn sign_hash(&self, hash: &B256) -> Result<Signature, SignerError>;
}

/// Adapts any alloy signer that also signs transactions.
#[derive(Clone)]
pub struct WalletSigner<S> {
    inner: S,
    backend: &'static str,
}

impl<S> fmt::Debug for WalletSigner<S>
where
    S: Signer + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSigner")
            .field("backend", &self.backend)
            .field("address", &Signer::address(&self.inner))
            .finish()
    }
}

#[async_trait]
impl<S> OnChainSigner for WalletSigner<S>
where
    S: Signer + TxSigner<Signature> + Clone + Send + Sync + 'static,
{
    fn address(&self) -> Address {
        Signer::address(&self.inner)
    }

    fn wallet(&self) -> EthereumWallet {
        EthereumWallet::new(self.inner.clone())
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, SignerError> {
        Signer::sign_hash(&self.inner, hash)
            .await
            .map_err(SignerError::Sign)
    }
}

impl WalletSigner<PrivateKeySigner> {
    pub fn local(private_key: &str, chain_id: Option<u64>) -> Result<Self, SignerError> {
        let signer = PrivateKeySigner::from_str(private_key.trim())
            .map_err(SignerError::InvalidPrivateKey)?
            .with_chain_id(chain_id);
        Ok(Self {
            inner: signer,
            backend: "local",
        })
    }
}

impl WalletSigner<AwsSigner> {
    /// Connect to the KMS key `alias/{key_name}` using the named AWS profile.
    pub async fn kms(
        aws_profile: &str,
        key_name: &str,
        chain_id: Option<u64>,
    ) -> Result<Self, SignerError> {
        let key_id = format!("alias/{key_name}");
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(aws_profile)
            .load()
            .await;
        let client = aws_sdk_kms::Client::new(&sdk_config);
        let signer = AwsSigner::new(client, key_id.clone(), chain_id)
            .await
            .map_err(|e| SignerError::Kms {
                key_id,
                source: Box::new(e),
            })?;
        Ok(Self {
            inner: signer,
            backend: "kms",
        })
    }
}

/// Build the configured on-chain signer.
pub async fn resolve_signer(
    config: &SignerConfig,
    chain_id: Option<u64>,
) -> Result<Box<dyn OnChainSigner>, SignerError> {
    let signer: Box<dyn OnChainSigner> = match config {
        SignerConfig::Kms {
            aws_profile,
            key_name,
        } => Box::new(WalletSigner::kms(aws_profile, key_name, chain_id).await?),
        SignerConfig::Local { private_key } => {
            Box::new(WalletSigner::local(private_key, chain_id)?)
        }
    };
    debug!(address = %signer.address(), "on-chain signer ready");
    Ok(signer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;

    // Well-known development key (anvil account #0).
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn local_signer_exposes_address() {
        let signer = WalletSigner::local(DEV_KEY, Some(11_155_111)).unwrap();
        assert_eq!(
            OnChainSigner::address(&signer),
            Address::from_str(DEV_ADDRESS).unwrap()
        );
    }

    #[test]
    fn local_signer_rejects_bad_key() {
        assert!(matches!(
            WalletSigner::local("0x1234", None),
            Err(SignerError::InvalidPrivateKey(_))
        ));
    }

    #[tokio::test]
    async fn sign_hash_recovers_to_signer_address() {
        let signer = WalletSigner::local(DEV_KEY, None).unwrap();
        let hash = keccak256(b"dydx");
        let signature = OnChainSigner::sign_hash(&signer, &hash).await.unwrap();
        let recovered = signature.recover_address_from_prehash(&hash).unwrap();
        assert_eq!(recovered, OnChainSigner::address(&signer));
    }

    #[tokio::test]
    async fn resolves_local_backend_from_config() {
        let config = SignerConfig::Local {
            private_key: DEV_KEY.to_string(),
        };
        let signer = resolve_signer(&config, Some(1)).await.unwrap();
        assert_eq!(signer.address(), Address::from_str(DEV_ADDRESS).unwrap());
        assert!(!format!("{:?}", WalletSigner::local(DEV_KEY, None).unwrap()).contains("ac0974"));
    }
}
