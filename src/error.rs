//! Error types for the arbitrage bot

use ethers::types::U256;
use thiserror::Error;

pub type Result<T, E = BotError> = std::result::Result<T, E>;

/// Top-level bot error
#[derive(Error, Debug)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] config::ConfigError),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("no reachable rpc endpoint for chain '{0}'")]
    ChainUnreachable(String),

    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error("insufficient balance: need {needed} wei, have {available} wei")]
    InsufficientBalance { needed: U256, available: U256 },

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("engine already running")]
    AlreadyRunning,

    #[error("engine is running; stop it first")]
    EngineBusy,
}

/// Per-combination quote failure.
///
/// A nonexistent pool and a flaky RPC endpoint look identical when errors
/// are swallowed as strings; callers need to tell them apart.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    #[error("no pool for fee tier {fee}")]
    PoolAbsent { fee: u32 },

    #[error("rpc failure: {0}")]
    Rpc(String),
}

impl QuoteError {
    pub fn is_pool_absent(&self) -> bool {
        matches!(self, QuoteError::PoolAbsent { .. })
    }
}
