//! Configuration loading
//!
//! Settings come from an optional TOML file overlaid with `ARB__`-prefixed
//! environment variables. The signing key and wallet address are deliberately
//! kept out of the file and read from `ARB_PRIVATE_KEY` / `ARB_WALLET_ADDRESS`.

use ethers::types::{Address, U256};
use serde::Deserialize;

use crate::chains::registry;
use crate::error::{BotError, Result};

pub const PRIVATE_KEY_ENV: &str = "ARB_PRIVATE_KEY";
pub const WALLET_ADDRESS_ENV: &str = "ARB_WALLET_ADDRESS";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Chain table override; the built-in registry is used when absent.
    #[serde(default)]
    pub chains: Option<Vec<ChainConfig>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8787
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Scheduler tick period
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    /// Profitability gate in USD
    #[serde(default = "default_min_profit_usd")]
    pub min_profit_usd: f64,
    /// Slippage tolerance applied to simulated outputs, in bps
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u64,
    /// Trade sizes in whole native units
    #[serde(default = "default_trade_sizes")]
    pub trade_sizes_native: Vec<f64>,
    /// Fee tiers to cross, in hundredths of a bip
    #[serde(default = "default_fee_tiers")]
    pub fee_tiers: Vec<u32>,
    /// Gas estimate for a full round trip (wrap + approvals + two swaps)
    #[serde(default = "default_gas_units")]
    pub gas_units_per_round_trip: u64,
    /// Refresh balance snapshots every N scans
    #[serde(default = "default_balance_refresh_scans")]
    pub balance_refresh_scans: u64,
    /// Display ring size for opportunities
    #[serde(default = "default_max_opportunities")]
    pub max_opportunities: usize,
    /// Trade log ring size
    #[serde(default = "default_max_trade_log")]
    pub max_trade_log: usize,
    /// Native units kept aside for gas before a trade is allowed
    #[serde(default = "default_gas_safety_margin")]
    pub gas_safety_margin_native: f64,
    /// Balance below this marks a chain inactive
    #[serde(default = "default_dust_threshold")]
    pub dust_threshold_native: f64,
}

fn default_scan_interval_ms() -> u64 {
    500
}
fn default_min_profit_usd() -> f64 {
    5.0
}
fn default_slippage_bps() -> u64 {
    50
}
fn default_trade_sizes() -> Vec<f64> {
    vec![0.005, 0.01, 0.05]
}
fn default_fee_tiers() -> Vec<u32> {
    vec![500, 3000]
}
fn default_gas_units() -> u64 {
    350_000
}
fn default_balance_refresh_scans() -> u64 {
    30
}
fn default_max_opportunities() -> usize {
    30
}
fn default_max_trade_log() -> usize {
    50
}
fn default_gas_safety_margin() -> f64 {
    0.01
}
fn default_dust_threshold() -> f64 {
    0.001
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: default_scan_interval_ms(),
            min_profit_usd: default_min_profit_usd(),
            slippage_bps: default_slippage_bps(),
            trade_sizes_native: default_trade_sizes(),
            fee_tiers: default_fee_tiers(),
            gas_units_per_round_trip: default_gas_units(),
            balance_refresh_scans: default_balance_refresh_scans(),
            max_opportunities: default_max_opportunities(),
            max_trade_log: default_max_trade_log(),
            gas_safety_margin_native: default_gas_safety_margin(),
            dust_threshold_native: default_dust_threshold(),
        }
    }
}

impl StrategyConfig {
    pub fn trade_sizes_wei(&self) -> Vec<U256> {
        self.trade_sizes_native
            .iter()
            .map(|s| native_to_wei(*s))
            .collect()
    }

    pub fn gas_safety_margin_wei(&self) -> U256 {
        native_to_wei(self.gas_safety_margin_native)
    }

    pub fn dust_threshold_wei(&self) -> U256 {
        native_to_wei(self.dust_threshold_native)
    }
}

/// Static per-chain configuration. Created at startup, never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    /// RPC endpoints tried in order during bootstrap
    pub rpc_urls: Vec<String>,
    pub explorer_url: String,
    pub native_symbol: String,
    pub wrapped_native: Address,
    pub stable_token: Address,
    pub stable_decimals: u8,
    pub quoter: Address,
    pub router: Address,
}

/// Signing credentials, always sourced from the environment.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub private_key: String,
    pub address: Address,
}

impl WalletConfig {
    pub fn from_env() -> Result<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV)
            .map_err(|_| BotError::Config(format!("{PRIVATE_KEY_ENV} not set")))?;
        let address = std::env::var(WALLET_ADDRESS_ENV)
            .map_err(|_| BotError::Config(format!("{WALLET_ADDRESS_ENV} not set")))?;
        let address = address
            .parse::<Address>()
            .map_err(|e| BotError::Config(format!("{WALLET_ADDRESS_ENV} is not an address: {e}")))?;
        Ok(Self { private_key, address })
    }
}

impl Config {
    /// Load from a TOML file (optional) overlaid with `ARB__*` env vars.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ARB").separator("__"))
            .build()?;
        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.strategy.fee_tiers.len() < 2 {
            return Err(BotError::Config(
                "strategy.fee_tiers needs at least two tiers".into(),
            ));
        }
        if self.strategy.trade_sizes_native.is_empty() {
            return Err(BotError::Config("strategy.trade_sizes_native is empty".into()));
        }
        if self.strategy.scan_interval_ms == 0 {
            return Err(BotError::Config("strategy.scan_interval_ms must be > 0".into()));
        }
        if self.strategy.balance_refresh_scans == 0 {
            return Err(BotError::Config(
                "strategy.balance_refresh_scans must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Effective chain table: config override or the built-in registry.
    pub fn chain_table(&self) -> Vec<ChainConfig> {
        self.chains.clone().unwrap_or_else(registry::default_chains)
    }
}

pub fn native_to_wei(amount: f64) -> U256 {
    U256::from((amount * 1e18).round() as u128)
}
