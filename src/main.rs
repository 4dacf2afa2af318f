//! Multichain DEX Arbitrage Bot
//!
//! Entry point: wire config, chains and the engine together, then serve
//! the control API. Scanning starts only when the start endpoint is hit.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use ethers::types::U256;
use multichain_arb::{
    chains::{bootstrap_chains, ChainHandle},
    config::{Config, WalletConfig},
    engine::ArbEngine,
    server,
    testing::SimulatedChain,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "multichain-arb")]
#[command(about = "Multichain DEX arbitrage bot with an HTTP control plane")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to real chains and serve the control API
    Run {
        /// Force dry-run regardless of what the start endpoint asks for
        #[arg(long)]
        dry_run: bool,
    },
    /// Serve the control API against simulated chains (no wallet needed)
    Simulate,
    /// Print the effective chain table and exit
    Chains,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run { dry_run } => run(config, dry_run).await,
        Commands::Simulate => simulate(config).await,
        Commands::Chains => show_chains(config),
    }
}

async fn run(config: Config, force_dry_run: bool) -> anyhow::Result<()> {
    let wallet = WalletConfig::from_env()?;
    tracing::info!(address = %wallet.address, "wallet loaded");
    if force_dry_run {
        tracing::warn!("forced dry-run: live starts will be downgraded");
    }

    let chains = bootstrap_chains(config.chain_table(), &wallet, &config.strategy).await?;
    let connected = {
        let mut n = 0;
        for chain in &chains {
            if chain.runtime.read().await.connected {
                n += 1;
            }
        }
        n
    };
    tracing::info!(connected, total = chains.len(), "chains bootstrapped");

    let port = config.server.port;
    let engine = ArbEngine::new(config, chains);
    if force_dry_run {
        engine.force_dry_run();
    }
    server::serve(engine, port).await?;
    Ok(())
}

/// Demo mode: every registry chain is backed by an in-memory simulator, so
/// the API and the scheduler can be exercised without keys or RPC access.
async fn simulate(config: Config) -> anyhow::Result<()> {
    tracing::warn!("simulate mode: all chains are in-memory doubles");

    let mut handles = Vec::new();
    for (i, mut chain_cfg) in config.chain_table().into_iter().enumerate() {
        chain_cfg.stable_decimals = SimulatedChain::STABLE_DECIMALS;
        let sim = Arc::new(SimulatedChain::demo(&chain_cfg, i as u64 + 1));
        handles.push(Arc::new(ChainHandle::connected(
            chain_cfg,
            sim.clone(),
            sim,
            U256::exp10(19),
            true,
        )));
    }

    let port = config.server.port;
    let engine = ArbEngine::new(config, handles);
    server::serve(engine, port).await?;
    Ok(())
}

fn show_chains(config: Config) -> anyhow::Result<()> {
    println!("{:<10} {:<12} {:<8} {}", "chain id", "name", "native", "rpc endpoints");
    for chain in config.chain_table() {
        println!(
            "{:<10} {:<12} {:<8} {}",
            chain.chain_id,
            chain.name,
            chain.native_symbol,
            chain.rpc_urls.len()
        );
    }
    Ok(())
}
