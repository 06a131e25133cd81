//! Moving USDC between the wallet and the exchange.

use std::future::Future;
use std::time::Duration;

use alloy::primitives::{TxHash, U256};
use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use starknet_crypto::Felt;
use thiserror::Error;
use tracing::{info, warn};

use crate::USDC_MAINNET;
use crate::accounts::{private_client, stark_key_pair};
use crate::amount::{USDC_DECIMALS, to_base_units};
use crate::api::{ApiError, ExchangeClient, Transfer};
use crate::auth::iso_timestamp;
use crate::chain::{self, DEFAULT_GAS_LIMIT};
use crate::config::AppConfig;
use crate::contracts::{IERC20, IStarkPerpetual};
use crate::network::NetworkId;
use crate::reporter;
use crate::signer::resolve_signer;
use crate::stark::{OffchainMessageSigner, Withdrawal, felt_to_u256};
use crate::state::{WithdrawalState, WithdrawalStateError, executable_withdrawal};

pub const TRANSFER_POLL_ATTEMPTS: u32 = 5;
pub const TRANSFER_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Days a signed withdrawal stays valid.
const WITHDRAWAL_EXPIRATION_DAYS: i64 = 30;

const COLLATERAL_ASSET: &str = "USDC";

#[derive(Debug, Error)]
pub enum FundingError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("no transfers visible after {attempts} attempts")]
    TransferPollTimeout { attempts: u32 },
    #[error(transparent)]
    Withdrawal(#[from] WithdrawalStateError),
    #[error("nothing to withdraw: on-chain withdrawal balance is zero")]
    NothingToWithdraw,
}

/// Body of `POST /v3/withdrawals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub amount: String,
    pub asset: &'static str,
    pub expiration: String,
    pub client_id: String,
    pub signature: String,
}

/// Fetch transfers until the list is non-empty, sleeping `interval` between
/// attempts.
pub async fn poll_transfers<F, Fut>(
    mut fetch: F,
    attempts: u32,
    interval: Duration,
) -> Result<Vec<Transfer>, FundingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<Transfer>, ApiError>>,
{
    for attempt in 1..=attempts {
        let transfers = fetch().await?;
        if !transfers.is_empty() {
            info!(attempt, count = transfers.len(), "Transfers visible");
            return Ok(transfers);
        }
        info!(attempt, attempts, "No transfers yet");
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    warn!(attempts, "Gave up waiting for transfers");
    Err(FundingError::TransferPollTimeout { attempts })
}

/// Allow the perpetual contract to pull `amount` USDC from the wallet.
pub async fn approve_exchange_contract(
    config: &AppConfig,
    network: NetworkId,
    amount: Decimal,
) -> Result<TxHash> {
    network.require_mainnet("approve")?;
    let spender = network.perpetual_contract(&config.testnet)?;
    let usdc_address = chain::parse_address(USDC_MAINNET)?;

    let signer = resolve_signer(&config.signer, Some(network.chain_id())).await?;
    info!("Executing from eth address: {}", signer.address());
    let provider = chain::connect(&config.ethereum, signer.as_ref(), network).await?;
    let usdc = IERC20::new(usdc_address, &provider);

    let decimals = usdc
        .decimals()
        .call()
        .await
        .context("failed to read USDC decimals")?;
    let units = to_base_units(amount, decimals)?;

    let pending = usdc
        .approve(spender, units)
        .gas(DEFAULT_GAS_LIMIT)
        .send()
        .await
        .context("approve failed")?;
    let tx_hash = chain::confirm(pending, "Approve").await?;
    reporter::report_tx("Approve", tx_hash);
    println!("approved amount: {amount} USDC");
    Ok(tx_hash)
}

pub async fn get_transfers(config: &AppConfig, network: NetworkId) -> Result<Vec<Transfer>> {
    let transfers = private_client(config, network)?
        .transfers()
        .await
        .context("failed to fetch transfers")?;
    reporter::report_lines(&transfers);
    Ok(transfers)
}

/// Deposit `amount` USDC into the account's position, then wait for the
/// exchange to list it.
pub async fn deposit_to_dydx(
    config: &AppConfig,
    network: NetworkId,
    amount: Decimal,
) -> Result<TxHash> {
    network.require_mainnet("deposit")?;
    let contract_address = network.perpetual_contract(&config.testnet)?;
    let asset_id = network.collateral_asset_id(&config.testnet)?;
    let stark = stark_key_pair(config)?;
    let quantized = to_base_units(amount, USDC_DECIMALS)?;

    let client = private_client(config, network)?;
    let account = client.first_account().await.context("failed to fetch account")?;
    let position_id: u64 = account
        .position_id
        .parse()
        .with_context(|| format!("invalid positionId {}", account.position_id))?;

    let signer = resolve_signer(&config.signer, Some(network.chain_id())).await?;
    info!("Executing from eth address: {}", signer.address());
    let provider = chain::connect(&config.ethereum, signer.as_ref(), network).await?;
    let perpetual = IStarkPerpetual::new(contract_address, &provider);

    info!(%amount, position_id, "Depositing to exchange");
    let pending = perpetual
        .deposit(
            stark.public_key().x_u256(),
            felt_to_u256(&asset_id),
            U256::from(position_id),
            quantized,
        )
        .gas(DEFAULT_GAS_LIMIT)
        .send()
        .await
        .context("deposit failed")?;
    let tx_hash = chain::confirm(pending, "Deposit").await?;
    reporter::report_tx("Deposit to dYdX", tx_hash);

    println!("Fetching transfers into dydx...");
    let client = &client;
    let transfers = poll_transfers(
        move || client.transfers(),
        TRANSFER_POLL_ATTEMPTS,
        TRANSFER_POLL_INTERVAL,
    )
    .await?;
    reporter::report_lines(&transfers);
    Ok(tx_hash)
}

fn random_client_id() -> String {
    rand::thread_rng().r#gen::<u64>().to_string()
}

/// Sign a withdrawal of `amount` collateral from `position_id`.
pub fn build_withdrawal_request(
    stark: &dyn OffchainMessageSigner,
    collateral_asset_id: &Felt,
    position_id: &str,
    amount: Decimal,
    client_id: String,
    now: DateTime<Utc>,
) -> Result<WithdrawalRequest> {
    let expiration = now + TimeDelta::days(WITHDRAWAL_EXPIRATION_DAYS);
    let withdrawal =
        Withdrawal::new(position_id, amount, &client_id, expiration.timestamp_millis())?;
    let signature = withdrawal.sign(collateral_asset_id, stark)?;
    Ok(WithdrawalRequest {
        amount: amount.normalize().to_string(),
        asset: COLLATERAL_ASSET,
        expiration: iso_timestamp(expiration),
        client_id,
        signature: signature.to_string(),
    })
}

pub async fn submit_withdrawal(
    client: &ExchangeClient,
    stark: &dyn OffchainMessageSigner,
    collateral_asset_id: &Felt,
    amount: Decimal,
) -> Result<Value> {
    let account = client.first_account().await.context("failed to fetch account")?;
    let request = build_withdrawal_request(
        stark,
        collateral_asset_id,
        &account.position_id,
        amount,
        random_client_id(),
        Utc::now(),
    )?;
    info!(client_id = %request.client_id, expiration = %request.expiration, "Requesting withdrawal");
    let response = client
        .private_post("withdrawals", &request)
        .await
        .context("withdrawal request rejected")?;
    Ok(response)
}

/// Ask the exchange to move `amount` USDC out of the position.
pub async fn start_withdraw_from_dydx(
    config: &AppConfig,
    network: NetworkId,
    amount: Decimal,
) -> Result<Value> {
    println!("Withdrawing amount: {amount} USDC");
    let asset_id = network.collateral_asset_id(&config.testnet)?;
    let stark = stark_key_pair(config)?;
    let client = private_client(config, network)?;

    let response = submit_withdrawal(&client, &stark, &asset_id, amount).await?;
    reporter::report_json("Withdraw response", &response);
    Ok(response)
}

/// Claim an authorized withdrawal from the perpetual contract.
pub async fn execute_withdraws(config: &AppConfig, network: NetworkId) -> Result<TxHash> {
    let contract_address = network.perpetual_contract(&config.testnet)?;
    let asset_id = felt_to_u256(&network.collateral_asset_id(&config.testnet)?);
    let stark = stark_key_pair(config)?;
    let stark_key = stark.public_key().x_u256();

    let transfers = private_client(config, network)?
        .transfers()
        .await
        .context("failed to fetch transfers")?;
    let (transfer, state) = executable_withdrawal(&transfers).map_err(FundingError::from)?;
    info!(id = %transfer.id, %state, "Found withdrawal");

    let signer = resolve_signer(&config.signer, Some(network.chain_id())).await?;
    let provider = chain::connect(&config.ethereum, signer.as_ref(), network).await?;
    let perpetual = IStarkPerpetual::new(contract_address, &provider);

    let balance = perpetual
        .getWithdrawalBalance(stark_key, asset_id)
        .call()
        .await
        .context("failed to read withdrawal balance")?;
    if balance.is_zero() {
        return Err(FundingError::NothingToWithdraw.into());
    }
    info!(%balance, "Withdrawal balance available");

    let pending = perpetual
        .withdraw(stark_key, asset_id)
        .gas(DEFAULT_GAS_LIMIT)
        .send()
        .await
        .context("withdraw failed")?;
    let tx_hash = chain::confirm(pending, "Withdraw").await?;
    let state = state
        .transition(WithdrawalState::Executed)
        .map_err(FundingError::from)?;
    info!(id = %transfer.id, %state, "Withdrawal claimed");
    reporter::report_tx("Withdraw", tx_hash);
    Ok(tx_hash)
}
