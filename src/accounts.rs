use alloy::primitives::{Address, Bytes, TxHash};
use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing::info;

use crate::api::{Account, ExchangeClient};
use crate::auth::{
    ApiCredentials, ETHEREUM_ADDRESS_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER, now_iso,
};
use crate::chain::{self, REGISTER_GAS_LIMIT};
use crate::config::AppConfig;
use crate::contracts::IStarkPerpetual;
use crate::eth_signing::{
    OFF_CHAIN_ONBOARDING_ACTION, onboarding_hash, private_action_hash, sign_action,
};
use crate::network::NetworkId;
use crate::reporter;
use crate::signer::{OnChainSigner, resolve_signer};
use crate::stark::{OffchainMessageSigner, StarkKeyPair};

const ONBOARDING_ENDPOINT: &str = "onboarding";
const API_KEYS_ENDPOINT: &str = "api-keys";

/// Client for private endpoints, authenticated with the configured API key.
pub fn private_client(config: &AppConfig, network: NetworkId) -> Result<ExchangeClient> {
    let credentials = ApiCredentials::from_config(config.api()?)
        .context("invalid [api] credentials")?;
    Ok(ExchangeClient::new(network, Some(credentials)))
}

pub fn stark_key_pair(config: &AppConfig) -> Result<StarkKeyPair> {
    StarkKeyPair::from_hex(&config.stark.private_key).context("invalid [stark] private_key")
}

pub async fn show_wallet(config: &AppConfig) -> Result<Address> {
    let signer = resolve_signer(&config.signer, None).await?;
    let address = signer.address();
    println!("wallet address: {address}");
    Ok(address)
}

/// Onboard the wallet and STARK key with the exchange.
///
/// The response carries the API credentials. They are only printed, so the
/// operator has to copy them into `[api]`.
pub async fn create_user(config: &AppConfig, network: NetworkId) -> Result<Value> {
    let stark = stark_key_pair(config)?;
    let signer = resolve_signer(&config.signer, Some(network.chain_id())).await?;
    let client = ExchangeClient::new(network, None);

    let response = onboard(&client, network, signer.as_ref(), &stark).await?;
    reporter::report_json("Created user, response", &response);
    println!();
    println!("YOU SHOULD WRITE DOWN THESE API CREDENTIALS");
    Ok(response)
}

pub async fn onboard(
    client: &ExchangeClient,
    network: NetworkId,
    signer: &dyn OnChainSigner,
    stark: &dyn OffchainMessageSigner,
) -> Result<Value> {
    let public_key = stark.public_key();
    let hash = onboarding_hash(network, OFF_CHAIN_ONBOARDING_ACTION);
    let signature = sign_action(signer, &hash)
        .await
        .context("failed to sign onboarding action")?;

    let body = json!({
        "starkKey": public_key.x_hex(),
        "starkKeyYCoordinate": public_key.y_hex(),
    })
    .to_string();
    let headers = [
        (SIGNATURE_HEADER, signature),
        (ETHEREUM_ADDRESS_HEADER, signer.address().to_checksum(None)),
    ];

    info!(address = %signer.address(), stark_key = %public_key.x_hex(), "Onboarding user");
    let response = client
        .signed_action_post(ONBOARDING_ENDPOINT, &headers, &body)
        .await?;
    Ok(response)
}

/// Create an additional API key for the wallet.
pub async fn create_api_key(config: &AppConfig, network: NetworkId) -> Result<Value> {
    let signer = resolve_signer(&config.signer, Some(network.chain_id())).await?;
    let client = ExchangeClient::new(network, None);

    let response = request_api_key(&client, network, signer.as_ref()).await?;
    reporter::report_json("Created API key, response", &response);
    Ok(response)
}

pub async fn request_api_key(
    client: &ExchangeClient,
    network: NetworkId,
    signer: &dyn OnChainSigner,
) -> Result<Value> {
    const BODY: &str = "{}";
    let request_path = format!("/v3/{API_KEYS_ENDPOINT}");
    let timestamp = now_iso();

    let hash = private_action_hash(network, "POST", &request_path, BODY, &timestamp);
    let signature = sign_action(signer, &hash)
        .await
        .context("failed to sign API key request")?;
    let headers = [
        (SIGNATURE_HEADER, signature),
        (TIMESTAMP_HEADER, timestamp),
        (ETHEREUM_ADDRESS_HEADER, signer.address().to_checksum(None)),
    ];

    info!(address = %signer.address(), "Requesting new API key");
    let response = client
        .signed_action_post(API_KEYS_ENDPOINT, &headers, BODY)
        .await?;
    Ok(response)
}

pub async fn get_account(config: &AppConfig, network: NetworkId) -> Result<Account> {
    let account = private_client(config, network)?
        .first_account()
        .await
        .context("failed to fetch account")?;
    reporter::report_json("Account", &account);
    Ok(account)
}

pub async fn get_registration_signature(config: &AppConfig, network: NetworkId) -> Result<String> {
    let signature = private_client(config, network)?
        .registration_signature()
        .await
        .context("failed to fetch registration signature")?;
    Ok(signature)
}

/// Register the wallet and STARK key with the perpetual contract.
pub async fn register_user(config: &AppConfig, network: NetworkId) -> Result<TxHash> {
    network.require_mainnet("register users")?;
    let stark = stark_key_pair(config)?;
    let contract_address = network.perpetual_contract(&config.testnet)?;

    let registration = get_registration_signature(config, network).await?;
    let registration = Bytes::from(
        alloy::hex::decode(&registration)
            .with_context(|| format!("registration signature is not hex: {registration}"))?,
    );

    let signer = resolve_signer(&config.signer, Some(network.chain_id())).await?;
    let provider = chain::connect(&config.ethereum, signer.as_ref(), network).await?;
    let perpetual = IStarkPerpetual::new(contract_address, &provider);

    info!(from = %signer.address(), "Registering user");
    let pending = perpetual
        .registerUser(signer.address(), stark.public_key().x_u256(), registration)
        .gas(REGISTER_GAS_LIMIT)
        .send()
        .await
        .context("registerUser failed")?;
    let tx_hash = chain::confirm(pending, "Registration").await?;
    reporter::report_tx("Registration", tx_hash);
    Ok(tx_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::offline_test_config;
    use crate::signer::WalletSigner;
    use httpmock::prelude::*;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const STARK_KEY: &str = "0x58c7d5a90b1776bde86ebac077e053ed85b0f7164f53b080304a531947d46e3";

    #[tokio::test]
    async fn onboarding_posts_stark_key_with_eth_headers() {
        let server = MockServer::start();
        let stark = StarkKeyPair::from_hex(STARK_KEY).unwrap();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v3/onboarding")
                .header("dydx-ethereum-address", DEV_ADDRESS)
                .header_exists("dydx-signature")
                .json_body(json!({
                    "starkKey": stark.public_key().x_hex(),
                    "starkKeyYCoordinate": stark.public_key().y_hex(),
                }));
            then.status(201).json_body(json!({
                "apiKey": { "key": "k", "secret": "s", "passphrase": "p" },
                "user": { "ethereumAddress": DEV_ADDRESS.to_lowercase() }
            }));
        });

        let signer = WalletSigner::local(DEV_KEY, Some(1)).unwrap();
        let client = ExchangeClient::new_with_base_url(server.base_url(), None);
        let response = onboard(&client, NetworkId::Mainnet, &signer, &stark)
            .await
            .unwrap();
        mock.assert();
        assert_eq!(response["apiKey"]["key"], "k");
    }

    #[tokio::test]
    async fn api_key_request_is_timestamped() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v3/api-keys")
                .header_exists("dydx-timestamp")
                .header_exists("dydx-signature")
                .header("dydx-ethereum-address", DEV_ADDRESS)
                .body("{}");
            then.status(201)
                .json_body(json!({ "apiKey": { "key": "new-key" } }));
        });

        let signer = WalletSigner::local(DEV_KEY, Some(1)).unwrap();
        let client = ExchangeClient::new_with_base_url(server.base_url(), None);
        let response = request_api_key(&client, NetworkId::Mainnet, &signer)
            .await
            .unwrap();
        mock.assert();
        assert_eq!(response["apiKey"]["key"], "new-key");
    }

    #[tokio::test]
    async fn onboarding_rejection_surfaces_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v3/onboarding");
            then.status(409).body("User already exists");
        });

        let stark = StarkKeyPair::from_hex(STARK_KEY).unwrap();
        let signer = WalletSigner::local(DEV_KEY, Some(1)).unwrap();
        let client = ExchangeClient::new_with_base_url(server.base_url(), None);
        let err = onboard(&client, NetworkId::Mainnet, &signer, &stark)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("User already exists"));
    }

    #[tokio::test]
    async fn register_user_refuses_testnet_before_io() {
        let err = register_user(&offline_test_config(), NetworkId::Sepolia)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("can only register users on mainnet"));
    }

    #[test]
    fn private_client_requires_api_section() {
        let err = private_client(&offline_test_config(), NetworkId::Mainnet).unwrap_err();
        assert!(err.to_string().contains("[api] credentials missing"));
    }
}
