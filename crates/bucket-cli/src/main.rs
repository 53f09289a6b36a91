use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bucket_sdk::{BucketClient, ClientConfig, Cluster, SdkError};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use sol_wire::{Keypair, Pubkey};
use tracing::{debug, info, warn, Level};

#[derive(Parser)]
#[command(author, version, about = "Bucket program CLI", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOpts {
    /// Cluster: localnet, testnet, devnet or mainnet-beta
    #[arg(long, global = true, env = "BUCKET_ENV")]
    env: Option<Cluster>,

    /// Solana CLI keypair file that pays fees and signs
    #[arg(long, global = true, env = "BUCKET_KEYPAIR")]
    keypair: Option<PathBuf>,

    /// Overrides the cluster's RPC endpoint
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// JSON client config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info")]
    log_level: Level,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bucket account and its collateral holdings
    ShowBucket {
        #[arg(long)]
        reserve: Pubkey,
    },
    /// Print every program address derived for a reserve mint
    Addresses {
        #[arg(long)]
        reserve: Pubkey,
    },
    /// List token accounts of an owner (defaults to the wallet)
    TokenAccounts {
        #[arg(long)]
        owner: Option<Pubkey>,
    },
    /// Create a reserve mint and its bucket
    CreateBucket {
        /// Keypair for the new reserve mint; generated when omitted
        #[arg(long)]
        reserve_keypair: Option<PathBuf>,
        #[arg(long, default_value_t = 6)]
        decimals: u8,
    },
    /// Whitelist a collateral mint with a target allocation
    AuthorizeCollateral {
        #[arg(long)]
        reserve: Pubkey,
        #[arg(long)]
        mint: Pubkey,
        #[arg(long)]
        allocation_bps: u16,
    },
    /// Deposit collateral for reserve tokens
    Deposit {
        #[arg(long)]
        reserve: Pubkey,
        #[arg(long)]
        mint: Pubkey,
        #[arg(long)]
        amount: u64,
        #[arg(long)]
        oracle: Pubkey,
    },
    /// Burn reserve tokens for a share of the collateral
    Redeem {
        #[arg(long)]
        reserve: Pubkey,
        #[arg(long)]
        amount: u64,
        /// Collateral mints to receive; defaults to every authorized mint
        #[arg(long, value_delimiter = ',')]
        mints: Vec<Pubkey>,
    },
}

impl Commands {
    fn needs_signer(&self) -> bool {
        !matches!(
            self,
            Commands::ShowBucket { .. } | Commands::Addresses { .. } | Commands::TokenAccounts { .. }
        )
    }
}

fn default_keypair_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/solana/id.json"))
}

fn load_config(opts: &GlobalOpts) -> Result<ClientConfig> {
    let mut config = match &opts.config {
        Some(path) => ClientConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(cluster) = opts.env {
        config.cluster = cluster;
    }
    if let Some(url) = &opts.rpc_url {
        config.rpc_url = Some(url.clone());
    }
    Ok(config)
}

/// Read-only commands fall back to a throwaway wallet when no keypair exists.
fn load_wallet(opts: &GlobalOpts, required: bool) -> Result<Keypair> {
    let path = match opts.keypair.clone().or_else(default_keypair_path) {
        Some(path) => path,
        None if required => bail!("no --keypair given and HOME is not set"),
        None => return Ok(Keypair::generate()),
    };
    match Keypair::read_from_file(&path) {
        Ok(keypair) => Ok(keypair),
        Err(err) if !required => {
            debug!(path = %path.display(), error = %err, "no wallet, using ephemeral key");
            Ok(Keypair::generate())
        }
        Err(err) => Err(err).with_context(|| format!("reading keypair {}", path.display())),
    }
}

/// Program rejections keep the raw custom code and the runtime's log lines.
fn with_program_output(err: SdkError) -> anyhow::Error {
    for line in err.program_logs() {
        warn!("{line}");
    }
    match err.program_error_code() {
        Some(code) => anyhow::Error::new(err).context(format!("program error code {code}")),
        None => err.into(),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.global.log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli.global)?;
    let wallet = load_wallet(&cli.global, cli.command.needs_signer())?;
    let wallet_pubkey = wallet.pubkey();
    let client = BucketClient::connect(config, Arc::new(wallet)).context("connecting")?;

    match cli.command {
        Commands::ShowBucket { reserve } => {
            let addresses = client.addresses(&reserve)?;
            let bucket = client
                .fetch_bucket(&addresses.bucket.address)
                .await
                .with_context(|| format!("fetching bucket {}", addresses.bucket.address))?;
            let holdings = client
                .fetch_collateral_allocations(&addresses.bucket.address, &addresses.crate_token.address)
                .await
                .context("fetching collateral holdings")?;
            print_json(&json!({
                "address": addresses.bucket.address,
                "total_allocation_bps": bucket.total_allocation_bps(),
                "bucket": bucket,
                "holdings": holdings,
            }))?;
        }
        Commands::Addresses { reserve } => {
            let a = client.addresses(&reserve)?;
            print_json(&json!({
                "reserve_mint": a.reserve_mint,
                "crate_token": { "address": a.crate_token.address, "bump": a.crate_token.bump },
                "bucket": { "address": a.bucket.address, "bump": a.bucket.bump },
                "issue_authority": { "address": a.issue_authority.address, "bump": a.issue_authority.bump },
                "withdraw_authority": { "address": a.withdraw_authority.address, "bump": a.withdraw_authority.bump },
            }))?;
        }
        Commands::TokenAccounts { owner } => {
            let owner = owner.unwrap_or(wallet_pubkey);
            let accounts = client
                .fetch_parsed_token_accounts(&owner)
                .await
                .with_context(|| format!("listing token accounts of {owner}"))?;
            print_json(&accounts)?;
        }
        Commands::CreateBucket {
            reserve_keypair,
            decimals,
        } => {
            let reserve = match reserve_keypair {
                Some(path) => Keypair::read_from_file(&path)
                    .with_context(|| format!("reading reserve keypair {}", path.display()))?,
                None => Keypair::generate(),
            };
            let created = client
                .create_bucket(&reserve, wallet_pubkey, decimals)
                .await
                .map_err(with_program_output)
                .context("creating bucket")?;
            info!(signature = %created.signature, "bucket created");
            print_json(&json!({
                "signature": created.signature.to_string(),
                "reserve_mint": created.addresses.reserve_mint,
                "bucket": created.addresses.bucket.address,
                "crate_token": created.addresses.crate_token.address,
                "rebalance_authority": created.rebalance_authority,
            }))?;
        }
        Commands::AuthorizeCollateral {
            reserve,
            mint,
            allocation_bps,
        } => {
            let sig = client
                .authorize_collateral(&mint, allocation_bps, &reserve, wallet_pubkey)
                .await
                .map_err(with_program_output)
                .with_context(|| format!("authorizing {mint}"))?;
            println!("{sig}");
        }
        Commands::Deposit {
            reserve,
            mint,
            amount,
            oracle,
        } => {
            let sig = client
                .deposit(amount, &reserve, &mint, wallet_pubkey, &oracle)
                .await
                .map_err(with_program_output)
                .context("depositing")?;
            println!("{sig}");
        }
        Commands::Redeem {
            reserve,
            amount,
            mints,
        } => {
            let mints = if mints.is_empty() {
                client
                    .fetch_bucket_for_reserve(&reserve)
                    .await
                    .context("fetching bucket")?
                    .collateral_mints()
            } else {
                mints
            };
            let sig = client
                .redeem(amount, &reserve, &mints, wallet_pubkey)
                .await
                .map_err(with_program_output)
                .context("redeeming")?;
            println!("{sig}");
        }
    }
    Ok(())
}
