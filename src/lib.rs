//! Multichain DEX Arbitrage Bot
//!
//! Scans Uniswap V3 fee-tier spreads on several EVM chains and, outside
//! dry-run mode, executes the best round trip. Controlled over a small
//! HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! Registry → Bootstrap (RPC probe) → Engine (interval loop)
//!                                       ├─ Scanner (quote cross product)
//!                                       ├─ Bandit (chain selection)
//!                                       └─ Executor (wrap/approve/swap x2)
//! HTTP control surface ──── start/stop/status ────┘
//! ```

pub mod chains;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod scanner;
pub mod server;
pub mod testing;
pub mod types;

#[cfg(test)]
mod config_tests;
