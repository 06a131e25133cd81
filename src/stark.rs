//! Layer-2 (STARK curve) key handling and withdrawal signing.
//!
//! The STARK key never signs Ethereum transactions; it only signs Pedersen
//! hashes of exchange messages. Ethereum-side signing lives in
//! [`crate::signer`].

use std::fmt;

use alloy::primitives::U256;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use starknet_crypto::{Felt, SignError, get_public_key, pedersen_hash, rfc6979_generate_k, sign};
use starknet_types_core::curve::ProjectivePoint;
use thiserror::Error;

use crate::amount::{AmountError, USDC_DECIMALS, to_base_units_u64};

/// STARK curve generator.
const GENERATOR_X: &str = "0x1ef15c18599971b7beced415a40f0c7deacfd9b0d1819e03d723d8bc943cfca";
const GENERATOR_Y: &str = "0x5668060aa49730b7be4801df46ec62de53ecd11abe43a32873000c36e8dc1f";

const WITHDRAWAL_PREFIX: u64 = 6;
const WITHDRAWAL_PADDING_BITS: usize = 49;
const ONE_HOUR_IN_MILLIS: i64 = 60 * 60 * 1000;

/// Upper bound on RFC 6979 retries when a generated `k` is rejected.
const MAX_SIGNING_ATTEMPTS: u64 = 32;

#[derive(Debug, Error)]
pub enum StarkError {
    #[error("invalid STARK private key")]
    InvalidPrivateKey,
    #[error("failed to derive STARK public key")]
    PublicKey,
    #[error("failed to sign message hash: {0}")]
    Sign(String),
    #[error("invalid position id {0}")]
    InvalidPositionId(String),
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error("expiration {0}ms is before the epoch")]
    InvalidExpiration(i64),
}

/// Signs raw message hashes with the layer-2 key.
pub trait OffchainMessageSigner {
    fn public_key(&self) -> &StarkPublicKey;

    fn sign_hash(&self, hash: &Felt) -> Result<StarkSignature, StarkError>;
}

/// Affine STARK public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarkPublicKey {
    pub x: Felt,
    pub y: Felt,
}

impl StarkPublicKey {
    /// `0x`-prefixed hex of the x coordinate (the "stark key").
    pub fn x_hex(&self) -> String {
        felt_to_hex(&self.x)
    }

    pub fn y_hex(&self) -> String {
        felt_to_hex(&self.y)
    }

    /// The stark key as a contract argument.
    pub fn x_u256(&self) -> U256 {
        felt_to_u256(&self.x)
    }
}

/// `(r, s)` pair over the STARK curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarkSignature {
    pub r: Felt,
    pub s: Felt,
}

impl fmt::Display for StarkSignature {
    /// 64 hex chars of `r` followed by 64 hex chars of `s`, no prefix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            alloy::hex::encode(self.r.to_bytes_be()),
            alloy::hex::encode(self.s.to_bytes_be())
        )
    }
}

/// STARK private key with its derived public key.
pub struct StarkKeyPair {
    private_key: Felt,
    public_key: StarkPublicKey,
}

impl fmt::Debug for StarkKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StarkKeyPair")
            .field("public_key", &self.public_key.x_hex())
            .finish_non_exhaustive()
    }
}

impl StarkKeyPair {
    /// Parse a hex private key (with or without 0x prefix) and derive `(x, y)`.
    pub fn from_hex(private_key: &str) -> Result<Self, StarkError> {
        let trimmed = private_key.trim();
        let prefixed = if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
            trimmed.to_string()
        } else {
            format!("0x{trimmed}")
        };
        let private_key = Felt::from_hex(&prefixed).map_err(|_| StarkError::InvalidPrivateKey)?;
        if private_key == Felt::ZERO {
            return Err(StarkError::InvalidPrivateKey);
        }
        let public_key = derive_public_key(&private_key)?;
        Ok(Self {
            private_key,
            public_key,
        })
    }
}

impl OffchainMessageSigner for StarkKeyPair {
    fn public_key(&self) -> &StarkPublicKey {
        &self.public_key
    }

    fn sign_hash(&self, hash: &Felt) -> Result<StarkSignature, StarkError> {
        let mut seed: Option<Felt> = None;
        for attempt in 0..MAX_SIGNING_ATTEMPTS {
            let k = rfc6979_generate_k(hash, &self.private_key, seed.as_ref());
            match sign(&self.private_key, hash, &k) {
                Ok(signature) => {
                    return Ok(StarkSignature {
                        r: signature.r,
                        s: signature.s,
                    });
                }
                Err(SignError::InvalidK) => seed = Some(Felt::from(attempt + 1)),
                Err(e) => return Err(StarkError::Sign(e.to_string())),
            }
        }
        Err(StarkError::Sign("no valid k found".into()))
    }
}

fn derive_public_key(private_key: &Felt) -> Result<StarkPublicKey, StarkError> {
    let generator = ProjectivePoint::from_affine(
        Felt::from_hex_unchecked(GENERATOR_X),
        Felt::from_hex_unchecked(GENERATOR_Y),
    )
    .map_err(|_| StarkError::PublicKey)?;
    let point = (&generator * *private_key)
        .to_affine()
        .map_err(|_| StarkError::PublicKey)?;
    let public_key = StarkPublicKey {
        x: point.x(),
        y: point.y(),
    };
    debug_assert_eq!(public_key.x, get_public_key(private_key));
    Ok(public_key)
}

pub fn felt_to_u256(felt: &Felt) -> U256 {
    U256::from_be_bytes(felt.to_bytes_be())
}

fn felt_to_hex(felt: &Felt) -> String {
    format!("0x{:x}", felt_to_u256(felt))
}

fn u256_to_felt(value: U256) -> Felt {
    Felt::from_bytes_be(&value.to_be_bytes::<32>())
}

/// Nonce derived from a client id: `sha256(client_id) mod 2^32`.
pub fn nonce_from_client_id(client_id: &str) -> u32 {
    let digest = Sha256::digest(client_id.as_bytes());
    u32::from_be_bytes([digest[28], digest[29], digest[30], digest[31]])
}

/// Expiration rounded up to whole hours since the epoch.
///
/// Takes milliseconds so a sub-second remainder still counts toward the next
/// hour, matching the ISO expiration sent alongside the signature.
pub fn expiration_epoch_hours(expiration_epoch_millis: i64) -> Result<u32, StarkError> {
    if expiration_epoch_millis < 0 {
        return Err(StarkError::InvalidExpiration(expiration_epoch_millis));
    }
    let hours = (expiration_epoch_millis + ONE_HOUR_IN_MILLIS - 1) / ONE_HOUR_IN_MILLIS;
    u32::try_from(hours).map_err(|_| StarkError::InvalidExpiration(expiration_epoch_millis))
}

/// Collateral withdrawal message, as signed by the layer-2 key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub position_id: u64,
    pub quantums_amount: u64,
    pub nonce: u32,
    pub expiration_epoch_hours: u32,
}

impl Withdrawal {
    pub fn new(
        position_id: &str,
        human_amount: Decimal,
        client_id: &str,
        expiration_epoch_millis: i64,
    ) -> Result<Self, StarkError> {
        let position_id = position_id
            .trim()
            .parse::<u64>()
            .map_err(|_| StarkError::InvalidPositionId(position_id.to_string()))?;
        Ok(Self {
            position_id,
            quantums_amount: to_base_units_u64(human_amount, USDC_DECIMALS)?,
            nonce: nonce_from_client_id(client_id),
            expiration_epoch_hours: expiration_epoch_hours(expiration_epoch_millis)?,
        })
    }

    /// Packed message fields:
    /// `prefix(6) | position_id(64) | nonce(32) | quantums(64) | expiration_hours(32) | padding(49)`.
    pub fn packed(&self) -> U256 {
        let mut packed = U256::from(WITHDRAWAL_PREFIX);
        packed = (packed << 64usize) + U256::from(self.position_id);
        packed = (packed << 32usize) + U256::from(self.nonce);
        packed = (packed << 64usize) + U256::from(self.quantums_amount);
        packed = (packed << 32usize) + U256::from(self.expiration_epoch_hours);
        packed << WITHDRAWAL_PADDING_BITS
    }

    pub fn hash(&self, collateral_asset_id: &Felt) -> Felt {
        pedersen_hash(collateral_asset_id, &u256_to_felt(self.packed()))
    }

    pub fn sign(
        &self,
        collateral_asset_id: &Felt,
        signer: &dyn OffchainMessageSigner,
    ) -> Result<StarkSignature, StarkError> {
        signer.sign_hash(&self.hash(collateral_asset_id))
    }
}
