//! RPC bootstrap
//!
//! Tries each configured endpoint in order; the first one that answers a
//! block-height probe is bound for the life of the process. No backoff, no
//! re-probe: a chain that fails every endpoint stays out until restart.

use std::sync::Arc;

use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::LocalWallet;
use ethers::types::U256;
use tracing::{info, warn};

use super::client::{EvmChainClient, TradeSubmitter};
use super::ChainHandle;
use crate::config::{ChainConfig, StrategyConfig, WalletConfig};
use crate::error::{BotError, Result};

/// Probe endpoints in listed order; return the first live provider.
pub async fn probe_endpoints(chain: &ChainConfig) -> Result<Provider<Http>> {
    for url in &chain.rpc_urls {
        let provider = match Provider::<Http>::try_from(url.as_str()) {
            Ok(p) => p,
            Err(e) => {
                warn!(chain = %chain.name, %url, "invalid rpc url: {e}");
                continue;
            }
        };
        match provider.get_block_number().await {
            Ok(block) => {
                info!(chain = %chain.name, %url, %block, "rpc endpoint bound");
                return Ok(provider);
            }
            Err(e) => {
                warn!(chain = %chain.name, %url, "liveness probe failed: {e}");
            }
        }
    }
    Err(BotError::ChainUnreachable(chain.name.clone()))
}

/// Connect every configured chain. Chains whose endpoints all fail are kept
/// in the returned list as unreachable so the health endpoint can report
/// them, but they are never scanned.
pub async fn bootstrap_chains(
    chains: Vec<ChainConfig>,
    wallet: &WalletConfig,
    strategy: &StrategyConfig,
) -> Result<Vec<Arc<ChainHandle>>> {
    let signer: LocalWallet = wallet
        .private_key
        .parse()
        .map_err(|e| BotError::Wallet(format!("invalid private key: {e}")))?;

    let dust = strategy.dust_threshold_wei();
    let mut handles = Vec::with_capacity(chains.len());

    for chain_cfg in chains {
        let name = chain_cfg.name.clone();
        match probe_endpoints(&chain_cfg).await {
            Ok(provider) => {
                let client = Arc::new(EvmChainClient::new(
                    chain_cfg.clone(),
                    provider,
                    signer.clone(),
                    wallet.address,
                ));
                let balance = client.native_balance().await.unwrap_or_else(|e| {
                    warn!(chain = %name, "balance snapshot failed: {e}");
                    U256::zero()
                });
                let is_active = balance > dust;
                if !is_active {
                    warn!(chain = %name, %balance, "balance below dust threshold, chain inactive");
                }
                handles.push(Arc::new(ChainHandle::connected(
                    chain_cfg,
                    client.clone(),
                    client,
                    balance,
                    is_active,
                )));
            }
            Err(e) => {
                warn!(chain = %name, "unreachable, excluded for this run: {e}");
                handles.push(Arc::new(ChainHandle::unreachable(chain_cfg)));
            }
        }
    }

    if handles.is_empty() {
        return Err(BotError::Config("no chains configured".into()));
    }
    Ok(handles)
}
