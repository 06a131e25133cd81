//! dydx-manage: onboard, fund and withdraw from a dYdX v3 account.
//!
//! A new account is set up in this order:
//!
//! 1. `create-user --network-id 1` and store the printed API credentials in `[api]`
//! 2. `register-user --network-id 1`
//! 3. `eth-to-usdc --amount 0.01 --network-id 1` if the wallet holds no USDC
//! 4. `approve-dydx-exchange --amount 25 --network-id 1`
//! 5. `deposit-dydx --amount 25 --network-id 1`
//!
//! Every command first checks that the egress IP is in an allowed region.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;

use dydx_manage::config::{AppConfig, CONFIG_PATH};
use dydx_manage::jurisdiction::{self, JurisdictionError};
use dydx_manage::network::NetworkId;
use dydx_manage::{accounts, funding, swap};

const EXIT_JURISDICTION: u8 = 1;
const EXIT_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "dydx-manage", about = "dYdX v3 account management CLI")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, env = "DYDX_CONFIG", default_value = CONFIG_PATH, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct NetworkArgs {
    /// The dYdX network id (either 1 or 11155111)
    #[arg(long)]
    network_id: NetworkId,
}

#[derive(clap::Args)]
struct AmountArgs {
    /// The dYdX network id (either 1 or 11155111)
    #[arg(long)]
    network_id: NetworkId,

    #[arg(long)]
    amount: Decimal,
}

#[derive(Subcommand)]
enum Command {
    /// Show the address of the configured Ethereum wallet
    ShowWallet,
    /// Create a new dYdX account
    CreateUser(NetworkArgs),
    /// Create an additional API key for the wallet
    CreateApiKey(NetworkArgs),
    /// Register the user on-chain for trading (mainnet only)
    RegisterUser(NetworkArgs),
    /// Convert ETH to USDC for depositing (mainnet only; amount in ETH)
    EthToUsdc(AmountArgs),
    /// Approve USDC to be taken by the exchange contract (mainnet only)
    ApproveDydxExchange(AmountArgs),
    /// Deposit USDC into dYdX (mainnet only)
    DepositDydx(AmountArgs),
    /// Show the configured dYdX account
    GetAccount(NetworkArgs),
    /// List transfers to and from dYdX
    GetTransfers(NetworkArgs),
    /// Request a slow withdrawal of USDC from dYdX
    StartWithdrawDydx(AmountArgs),
    /// Claim authorized withdrawals from the exchange contract
    ExecuteWithdraws(NetworkArgs),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::ShowWallet => "show-wallet",
            Command::CreateUser(_) => "create-user",
            Command::CreateApiKey(_) => "create-api-key",
            Command::RegisterUser(_) => "register-user",
            Command::EthToUsdc(_) => "eth-to-usdc",
            Command::ApproveDydxExchange(_) => "approve-dydx-exchange",
            Command::DepositDydx(_) => "deposit-dydx",
            Command::GetAccount(_) => "get-account",
            Command::GetTransfers(_) => "get-transfers",
            Command::StartWithdrawDydx(_) => "start-withdraw-dydx",
            Command::ExecuteWithdraws(_) => "execute-withdraws",
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    info!("Loaded config from {}", cli.config.display());

    println!("Checking whether you're calling from a safe IP location...");
    if let Err(e) = jurisdiction::check_ip_location(&config.jurisdiction).await {
        let (code, message) = jurisdiction_exit(&e);
        println!("{message}");
        return ExitCode::from(code);
    }
    println!("Looks good, proceeding.");
    println!();

    let name = cli.command.name();
    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {name} failed: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Exit code and operator message for a failed jurisdiction check. Any
/// failure, including an undeterminable location, stops the process.
fn jurisdiction_exit(err: &JurisdictionError) -> (u8, String) {
    let message = match err {
        JurisdictionError::Blocked { .. } => err.to_string(),
        JurisdictionError::Lookup(_) | JurisdictionError::MissingTimezone => {
            tracing::debug!("jurisdiction lookup failed: {err:#}");
            "Could not determine your IP location, unsafe to proceed with DyDx operations. Terminating."
                .to_string()
        }
    };
    (EXIT_JURISDICTION, message)
}

async fn run(command: Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::ShowWallet => {
            accounts::show_wallet(config).await?;
        }
        Command::CreateUser(args) => {
            accounts::create_user(config, args.network_id).await?;
        }
        Command::CreateApiKey(args) => {
            accounts::create_api_key(config, args.network_id).await?;
        }
        Command::RegisterUser(args) => {
            accounts::register_user(config, args.network_id).await?;
        }
        Command::EthToUsdc(args) => {
            swap::eth_to_usdc(config, args.network_id, args.amount).await?;
        }
        Command::ApproveDydxExchange(args) => {
            funding::approve_exchange_contract(config, args.network_id, args.amount).await?;
        }
        Command::DepositDydx(args) => {
            funding::deposit_to_dydx(config, args.network_id, args.amount).await?;
        }
        Command::GetAccount(args) => {
            accounts::get_account(config, args.network_id).await?;
        }
        Command::GetTransfers(args) => {
            funding::get_transfers(config, args.network_id).await?;
        }
        Command::StartWithdrawDydx(args) => {
            funding::start_withdraw_from_dydx(config, args.network_id, args.amount).await?;
        }
        Command::ExecuteWithdraws(args) => {
            funding::execute_withdraws(config, args.network_id).await?;
        }
    }
    Ok(())
}
