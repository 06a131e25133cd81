pub mod accounts;
pub mod amount;
pub mod api;
pub mod auth;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod eth_signing;
pub mod funding;
pub mod jurisdiction;
pub mod network;
pub mod reporter;
pub mod signer;
pub mod stark;
pub mod state;
pub mod swap;

/// dYdX v3 REST API base URL (mainnet).
pub const MAINNET_API_HOST: &str = "https://api.dydx.exchange";

/// dYdX v3 REST API base URL (staging, backed by Sepolia).
pub const TESTNET_API_HOST: &str = "https://api.stage.dydx.exchange";

/// IP geolocation endpoint used by the jurisdiction gate (public, no auth required)
pub const IP_LOCATION_URL: &str = "https://ipinfo.io/json";

/// StarkEx perpetual contract on Ethereum mainnet.
pub const PERPETUAL_CONTRACT_MAINNET: &str = "0xD54f502e184B6B739d7D27a6410a67dc462D69c8";

/// USDC (6 decimals) on Ethereum mainnet.
pub const USDC_MAINNET: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

/// Wrapped ether on Ethereum mainnet.
pub const WETH_MAINNET: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

/// Uniswap v3 SwapRouter02 and QuoterV2 on Ethereum mainnet.
pub const UNISWAP_ROUTER_MAINNET: &str = "0x68b3465833fb72A70ecDF485E0e4C7bD8665Fc45";
pub const UNISWAP_QUOTER_MAINNET: &str = "0x61fFE014bA17989E743c5F6cB21bF9697530B21e";
