//! Chain registry, RPC bootstrap and the on-chain client seams

pub mod bootstrap;
pub mod client;
pub mod registry;

pub use bootstrap::bootstrap_chains;
pub use client::{EvmChainClient, QuoteProvider, TradeSubmitter};

use std::sync::Arc;

use ethers::types::U256;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::ChainConfig;

/// Mutable per-chain state. Balance fields are refreshed periodically by
/// the scheduler; everything else is set once at bootstrap.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChainRuntimeState {
    pub connected: bool,
    /// Balance above the dust threshold
    pub is_active: bool,
    #[serde(with = "crate::types::u256_string")]
    pub native_balance: U256,
    /// Last observed native price in USD, from the 1-unit reference quote
    pub reference_price_usd: Option<f64>,
}

/// One configured chain: static config plus runtime state and, when the
/// bootstrap probe succeeded, the bound provider/submitter pair.
pub struct ChainHandle {
    pub config: ChainConfig,
    pub runtime: RwLock<ChainRuntimeState>,
    quotes: Option<Arc<dyn QuoteProvider>>,
    trades: Option<Arc<dyn TradeSubmitter>>,
}

impl ChainHandle {
    pub fn connected(
        config: ChainConfig,
        quotes: Arc<dyn QuoteProvider>,
        trades: Arc<dyn TradeSubmitter>,
        native_balance: U256,
        is_active: bool,
    ) -> Self {
        Self {
            config,
            runtime: RwLock::new(ChainRuntimeState {
                connected: true,
                is_active,
                native_balance,
                reference_price_usd: None,
            }),
            quotes: Some(quotes),
            trades: Some(trades),
        }
    }

    /// A chain whose every RPC endpoint failed the liveness probe. Excluded
    /// from scanning and execution until the process restarts.
    pub fn unreachable(config: ChainConfig) -> Self {
        Self {
            config,
            runtime: RwLock::new(ChainRuntimeState::default()),
            quotes: None,
            trades: None,
        }
    }

    pub fn quotes(&self) -> Option<&Arc<dyn QuoteProvider>> {
        self.quotes.as_ref()
    }

    pub fn trades(&self) -> Option<&Arc<dyn TradeSubmitter>> {
        self.trades.as_ref()
    }

    /// Connected and holding more than dust.
    pub async fn is_eligible(&self) -> bool {
        let rt = self.runtime.read().await;
        rt.connected && rt.is_active
    }

    pub async fn refresh_balance(&self, dust_threshold: U256) {
        let Some(trades) = &self.trades else { return };
        match trades.native_balance().await {
            Ok(balance) => {
                let mut rt = self.runtime.write().await;
                rt.native_balance = balance;
                rt.is_active = balance > dust_threshold;
            }
            Err(e) => {
                tracing::warn!(chain = %self.config.name, "balance refresh failed: {e}");
            }
        }
    }
}
