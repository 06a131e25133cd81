use alloy::network::Ethereum;
use alloy::primitives::{Address, TxHash};
use alloy::providers::{PendingTransactionBuilder, Provider, ProviderBuilder};
use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::EthereumConfig;
use crate::network::NetworkId;
use crate::signer::OnChainSigner;

/// Gas limit for `registerUser`.
pub const REGISTER_GAS_LIMIT: u64 = 100_000;

/// Gas limit for approvals, deposits, withdrawals and wrapping.
pub const DEFAULT_GAS_LIMIT: u64 = 200_000;

/// Parse a checksummed or lowercase hex address.
pub fn parse_address(raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .with_context(|| format!("invalid address {raw}"))
}

/// Connect a wallet-backed provider and confirm the RPC serves `network`.
pub async fn connect(
    config: &EthereumConfig,
    signer: &dyn OnChainSigner,
    network: NetworkId,
) -> Result<impl Provider + Clone + use<>> {
    let url = Url::parse(&config.rpc_url)
        .with_context(|| format!("invalid ethereum.rpc_url {}", config.rpc_url))?;
    let provider = ProviderBuilder::new()
        .wallet(signer.wallet())
        .connect_http(url);

    let chain_id = provider
        .get_chain_id()
        .await
        .context("failed to query chain id from RPC")?;
    if chain_id != network.chain_id() {
        bail!(
            "RPC endpoint serves chain {chain_id} but {network} expects chain {}",
            network.chain_id()
        );
    }
    debug!(chain_id, "connected to RPC");
    Ok(provider)
}

/// Wait for a submitted transaction to be mined and fail if it reverted.
pub async fn confirm(pending: PendingTransactionBuilder<Ethereum>, label: &str) -> Result<TxHash> {
    info!(tx_hash = %pending.tx_hash(), "{label} submitted");
    let receipt = pending
        .get_receipt()
        .await
        .with_context(|| format!("failed to fetch {label} receipt"))?;
    if !receipt.status() {
        warn!(tx_hash = %receipt.transaction_hash, "{label} reverted on-chain");
        bail!("{label} transaction {} reverted", receipt.transaction_hash);
    }
    info!(tx_hash = %receipt.transaction_hash, "{label} confirmed");
    Ok(receipt.transaction_hash)
}
