//! ETH to USDC conversion through a Uniswap v3 pool.
//!
//! The wallet wraps ETH, quotes WETH/USDC on QuoterV2 and swaps on
//! SwapRouter02 with an output floor derived from the quote.

use alloy::primitives::aliases::{U24, U160};
use alloy::primitives::{TxHash, U256};
use anyhow::{Context, Result, bail, ensure};
use rust_decimal::Decimal;
use tracing::info;

use crate::amount::{ETH_DECIMALS, USDC_DECIMALS, from_base_units, to_base_units};
use crate::chain::{self, DEFAULT_GAS_LIMIT};
use crate::config::{AppConfig, SwapConfig};
use crate::contracts::{IQuoterV2, ISwapRouter02, IWETH9};
use crate::network::NetworkId;
use crate::reporter;
use crate::signer::resolve_signer;
use crate::{UNISWAP_QUOTER_MAINNET, UNISWAP_ROUTER_MAINNET, USDC_MAINNET, WETH_MAINNET};

const SWAP_GAS_LIMIT: u64 = 300_000;
const BPS_DENOMINATOR: u32 = 10_000;
const MAX_POOL_FEE: u32 = (1 << 24) - 1;

/// Transactions sent by a completed swap.
#[derive(Debug, Clone, Copy)]
pub struct SwapReceipt {
    pub wrap_tx: TxHash,
    pub approve_tx: TxHash,
    pub swap_tx: TxHash,
    pub quoted_out: U256,
}

/// Lowest acceptable output for `quoted` after `slippage_bps`.
pub fn minimum_output(quoted: U256, slippage_bps: u32) -> Result<U256> {
    ensure!(
        slippage_bps < BPS_DENOMINATOR,
        "slippage_bps must be below {BPS_DENOMINATOR}, got {slippage_bps}"
    );
    Ok(quoted * U256::from(BPS_DENOMINATOR - slippage_bps) / U256::from(BPS_DENOMINATOR))
}

/// USDC per ETH implied by a quote.
pub fn quoted_price(amount_in: Decimal, quoted_out: U256) -> Option<Decimal> {
    from_base_units(quoted_out, USDC_DECIMALS)?.checked_div(amount_in)
}

fn pool_fee(config: &SwapConfig) -> Result<U24> {
    if config.pool_fee > MAX_POOL_FEE {
        bail!("swap.pool_fee {} does not fit in uint24", config.pool_fee);
    }
    Ok(U24::from(config.pool_fee))
}

/// Swap `amount` ETH to USDC, keeping the proceeds in the wallet.
pub async fn eth_to_usdc(
    config: &AppConfig,
    network: NetworkId,
    amount: Decimal,
) -> Result<SwapReceipt> {
    network.require_mainnet("swap")?;
    let amount_in = to_base_units(amount, ETH_DECIMALS)?;
    let fee = pool_fee(&config.swap)?;
    let weth_address = chain::parse_address(WETH_MAINNET)?;
    let usdc_address = chain::parse_address(USDC_MAINNET)?;
    let router_address = chain::parse_address(UNISWAP_ROUTER_MAINNET)?;
    let quoter_address = chain::parse_address(UNISWAP_QUOTER_MAINNET)?;

    let signer = resolve_signer(&config.signer, Some(network.chain_id())).await?;
    info!("Executing from eth address: {}", signer.address());
    let provider = chain::connect(&config.ethereum, signer.as_ref(), network).await?;
    let weth = IWETH9::new(weth_address, &provider);
    let quoter = IQuoterV2::new(quoter_address, &provider);
    let router = ISwapRouter02::new(router_address, &provider);

    let pending = weth
        .deposit()
        .value(amount_in)
        .gas(DEFAULT_GAS_LIMIT)
        .send()
        .await
        .context("WETH deposit failed")?;
    let wrap_tx = chain::confirm(pending, "Wrap").await?;
    reporter::report_tx("Wrap ETH", wrap_tx);

    let quote = quoter
        .quoteExactInputSingle(IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: weth_address,
            tokenOut: usdc_address,
            amountIn: amount_in,
            fee,
            sqrtPriceLimitX96: U160::ZERO,
        })
        .call()
        .await
        .context("failed to quote WETH/USDC")?;
    let quoted_out = quote.amountOut;
    let min_out = minimum_output(quoted_out, config.swap.slippage_bps)?;
    match quoted_price(amount, quoted_out) {
        Some(price) => println!("quoted price: {price} USDC per ETH"),
        None => println!("quoted output: {quoted_out} USDC base units"),
    }
    info!(%quoted_out, %min_out, slippage_bps = config.swap.slippage_bps, "Quote received");

    let pending = weth
        .approve(router_address, amount_in)
        .gas(DEFAULT_GAS_LIMIT)
        .send()
        .await
        .context("WETH approve failed")?;
    let approve_tx = chain::confirm(pending, "Approve").await?;
    reporter::report_tx("Approve router", approve_tx);

    let pending = router
        .exactInputSingle(ISwapRouter02::ExactInputSingleParams {
            tokenIn: weth_address,
            tokenOut: usdc_address,
            fee,
            recipient: signer.address(),
            amountIn: amount_in,
            amountOutMinimum: min_out,
            sqrtPriceLimitX96: U160::ZERO,
        })
        .gas(SWAP_GAS_LIMIT)
        .send()
        .await
        .context("swap failed")?;
    let swap_tx = chain::confirm(pending, "Swap").await?;
    reporter::report_tx("Swap", swap_tx);

    Ok(SwapReceipt {
        wrap_tx,
        approve_tx,
        swap_tx,
        quoted_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::offline_test_config;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn swap_refuses_testnet_before_io() {
        let config = offline_test_config();
        let err = eth_to_usdc(&config, NetworkId::Sepolia, dec!(0.01))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("can only swap on mainnet"));
    }

    #[test]
    fn minimum_output_applies_slippage() {
        let quoted = U256::from(2_000_000_000u64);
        assert_eq!(minimum_output(quoted, 50).unwrap(), U256::from(1_990_000_000u64));
        assert_eq!(minimum_output(quoted, 0).unwrap(), quoted);
        assert!(minimum_output(quoted, 10_000).is_err());
    }

    #[test]
    fn price_is_usdc_per_eth() {
        let price = quoted_price(dec!(0.5), U256::from(1_250_000_000u64)).unwrap();
        assert_eq!(price, dec!(2500));
    }

    #[test]
    fn pool_fee_must_fit_uint24() {
        let ok = SwapConfig {
            slippage_bps: 50,
            pool_fee: 500,
        };
        assert_eq!(pool_fee(&ok).unwrap(), U24::from(500u32));
        let too_big = SwapConfig {
            slippage_bps: 50,
            pool_fee: 1 << 24,
        };
        assert!(pool_fee(&too_big).is_err());
    }
}
