//! EIP-712 actions signed by the Ethereum key to authenticate onboarding
//! and API-key management requests.

use std::borrow::Cow;

use alloy::primitives::{B256, Signature, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};

use crate::network::NetworkId;
use crate::signer::{OnChainSigner, SignerError};

/// Signature type suffix telling the exchange not to apply an EIP-191 prefix.
pub const SIGNATURE_TYPE_NO_PREPEND: &str = "00";

pub const OFF_CHAIN_ONBOARDING_ACTION: &str = "dYdX Onboarding";

const DOMAIN_NAME: &str = "dYdX";
const DOMAIN_VERSION: &str = "1.0";
const ONLY_SIGN_ON_DOMAIN_MAINNET: &str = "https://trade.dydx.exchange";

#[allow(non_camel_case_types, non_snake_case)]
mod onboarding_mainnet {
    alloy::sol! {
        struct dYdX {
            string action;
            string onlySignOn;
        }
    }
}

#[allow(non_camel_case_types, non_snake_case)]
mod onboarding_testnet {
    alloy::sol! {
        struct dYdX {
            string action;
        }
    }
}

#[allow(non_camel_case_types, non_snake_case)]
mod private_action {
    alloy::sol! {
        struct dYdX {
            string method;
            string requestPath;
            string body;
            string timestamp;
        }
    }
}

fn domain(network: NetworkId) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Borrowed(DOMAIN_NAME)),
        Some(Cow::Borrowed(DOMAIN_VERSION)),
        Some(U256::from(network.chain_id())),
        None,
        None,
    )
}

/// Digest of the onboarding action for `network`.
///
/// Mainnet binds the signature to the trading frontend origin; other networks
/// sign the bare action.
pub fn onboarding_hash(network: NetworkId, action: &str) -> B256 {
    let domain = domain(network);
    match network {
        NetworkId::Mainnet => onboarding_mainnet::dYdX {
            action: action.to_string(),
            onlySignOn: ONLY_SIGN_ON_DOMAIN_MAINNET.to_string(),
        }
        .eip712_signing_hash(&domain),
        NetworkId::Sepolia => onboarding_testnet::dYdX {
            action: action.to_string(),
        }
        .eip712_signing_hash(&domain),
    }
}

/// Digest of an Ethereum-authenticated private action (API-key management).
pub fn private_action_hash(
    network: NetworkId,
    method: &str,
    request_path: &str,
    body: &str,
    timestamp: &str,
) -> B256 {
    private_action::dYdX {
        method: method.to_string(),
        requestPath: request_path.to_string(),
        body: body.to_string(),
        timestamp: timestamp.to_string(),
    }
    .eip712_signing_hash(&domain(network))
}

/// `0x ∥ r ∥ s ∥ v`, with the recovery id shifted into the legacy `27/28` range.
pub fn normalize_signature(signature: &Signature) -> String {
    let v = 27 + u8::from(signature.v());
    format!(
        "0x{}{}{:02x}",
        alloy::hex::encode(signature.r().to_be_bytes::<32>()),
        alloy::hex::encode(signature.s().to_be_bytes::<32>()),
        v
    )
}

/// Sign `hash` with the custodial signer and encode it for the
/// `DYDX-SIGNATURE` header.
pub async fn sign_action(signer: &dyn OnChainSigner, hash: &B256) -> Result<String, SignerError> {
    let signature = signer.sign_hash(hash).await?;
    Ok(format!(
        "{}{SIGNATURE_TYPE_NO_PREPEND}",
        normalize_signature(&signature)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::WalletSigner;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn normalized_signature_ends_with_legacy_v() {
        let r = U256::from(0x1234u64);
        let s = U256::from(0x5678u64);
        for (parity, suffix) in [(false, "1b"), (true, "1c")] {
            let normalized = normalize_signature(&Signature::new(r, s, parity));
            assert_eq!(normalized.len(), 2 + 64 + 64 + 2);
            assert!(normalized.starts_with("0x"));
            assert!(normalized.ends_with(suffix), "{normalized}");
            let v = 27 + u8::from(parity);
            assert_eq!(&normalized[normalized.len() - 2..], &format!("{v:x}")[..]);
        }
    }

    #[test]
    fn onboarding_digest_depends_on_network() {
        let mainnet = onboarding_hash(NetworkId::Mainnet, OFF_CHAIN_ONBOARDING_ACTION);
        let sepolia = onboarding_hash(NetworkId::Sepolia, OFF_CHAIN_ONBOARDING_ACTION);
        assert_ne!(mainnet, sepolia);
        assert_eq!(
            mainnet,
            onboarding_hash(NetworkId::Mainnet, OFF_CHAIN_ONBOARDING_ACTION)
        );
    }

    #[test]
    fn onboarding_type_strings() {
        assert_eq!(
            onboarding_mainnet::dYdX::eip712_encode_type(),
            "dYdX(string action,string onlySignOn)"
        );
        assert_eq!(
            private_action::dYdX::eip712_encode_type(),
            "dYdX(string method,string requestPath,string body,string timestamp)"
        );
    }

    #[test]
    fn private_action_digest_covers_every_field() {
        let base = private_action_hash(NetworkId::Mainnet, "POST", "/v3/api-keys", "{}", "t0");
        assert_ne!(
            base,
            private_action_hash(NetworkId::Mainnet, "POST", "/v3/api-keys", "{}", "t1")
        );
        assert_ne!(
            base,
            private_action_hash(NetworkId::Mainnet, "DELETE", "/v3/api-keys", "{}", "t0")
        );
    }

    #[tokio::test]
    async fn signed_action_recovers_to_signer() {
        let signer = WalletSigner::local(DEV_KEY, Some(1)).unwrap();
        let hash = onboarding_hash(NetworkId::Mainnet, OFF_CHAIN_ONBOARDING_ACTION);
        let encoded = sign_action(&signer, &hash).await.unwrap();

        assert!(encoded.ends_with(SIGNATURE_TYPE_NO_PREPEND));
        let without_type = &encoded[..encoded.len() - SIGNATURE_TYPE_NO_PREPEND.len()];
        let v = &without_type[without_type.len() - 2..];
        assert!(v == "1b" || v == "1c");

        let bytes = alloy::hex::decode(without_type).unwrap();
        let signature = Signature::from_raw(&bytes).unwrap();
        assert_eq!(
            signature.recover_address_from_prehash(&hash).unwrap(),
            signer.address()
        );
    }
}
