//! Trade executor
//!
//! Runs the fixed on-chain sequence for one opportunity: balance check,
//! wrap, approve, swap leg 1, read intermediate balance, approve, swap
//! leg 2, read final balance. Any failure inside the sequence surfaces as a
//! failed trade record; there is no partial unwind, so a leg-2 failure
//! leaves the wallet holding the stable token.

use std::sync::Arc;

use chrono::Utc;
use ethers::types::U256;
use tracing::{info, warn};

use crate::chains::TradeSubmitter;
use crate::config::{ChainConfig, StrategyConfig};
use crate::error::{BotError, Result};
use crate::types::{saturating_i128, Opportunity, TradeRecord, TradeStatus};

pub struct TradeExecutor {
    submitter: Arc<dyn TradeSubmitter>,
    chain: ChainConfig,
    slippage_bps: u64,
    gas_safety_margin_wei: U256,
}

struct Executed {
    tx_hash: String,
    gas_spent_wei: U256,
    realized_profit_wei: i128,
}

/// Minimum acceptable output after applying the slippage tolerance.
pub fn min_out_with_slippage(simulated: U256, slippage_bps: u64) -> U256 {
    simulated * U256::from(10_000 - slippage_bps.min(10_000)) / U256::from(10_000)
}

impl TradeExecutor {
    pub fn new(
        submitter: Arc<dyn TradeSubmitter>,
        chain: ChainConfig,
        strategy: &StrategyConfig,
    ) -> Self {
        Self {
            submitter,
            chain,
            slippage_bps: strategy.slippage_bps,
            gas_safety_margin_wei: strategy.gas_safety_margin_wei(),
        }
    }

    /// Execute one opportunity. Never returns an error: every failure mode
    /// becomes a failed record carrying the message.
    pub async fn execute(
        &self,
        opp: &Opportunity,
        gas_price: U256,
        reference_price_usd: f64,
    ) -> TradeRecord {
        match self.run_sequence(opp, gas_price).await {
            Ok(done) => {
                let realized_usd = (done.realized_profit_wei as f64 / 1e18) * reference_price_usd;
                let gas_usd =
                    (saturating_i128(done.gas_spent_wei) as f64 / 1e18) * reference_price_usd;
                info!(
                    chain = %self.chain.name,
                    route = %opp.route(),
                    realized_usd,
                    gas_usd,
                    "trade complete"
                );
                TradeRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    chain_id: opp.chain_id,
                    chain_name: opp.chain_name.clone(),
                    route: opp.route(),
                    amount_in: opp.amount_in,
                    expected_profit_usd: opp.net_profit_usd,
                    realized_profit_usd: Some(realized_usd),
                    gas_spent_wei: done.gas_spent_wei,
                    gas_cost_usd: gas_usd,
                    tx_hash: Some(done.tx_hash),
                    status: TradeStatus::Success,
                    error: None,
                    executed_at: Utc::now(),
                }
            }
            Err(e) => {
                warn!(chain = %self.chain.name, route = %opp.route(), "trade failed: {e}");
                TradeRecord::failed(opp, e.to_string())
            }
        }
    }

    async fn run_sequence(&self, opp: &Opportunity, gas_price: U256) -> Result<Executed> {
        let amount_in = opp.amount_in;

        // 1. Fail fast when the wallet cannot cover trade plus gas margin.
        let available = self.submitter.native_balance().await?;
        let needed = amount_in + self.gas_safety_margin_wei;
        if available < needed {
            return Err(BotError::InsufficientBalance { needed, available });
        }

        let wrapped = self.chain.wrapped_native;
        let stable = self.chain.stable_token;
        let mut gas_units = U256::zero();

        let wrapped_before = self.submitter.token_balance(wrapped).await?;
        let stable_before = self.submitter.token_balance(stable).await?;

        // 2. Wrap native into the swap currency.
        gas_units += self.submitter.wrap_native(amount_in).await?;

        // 3/4. Approve and swap leg 1.
        gas_units += self.submitter.ensure_allowance(wrapped, amount_in).await?;
        let leg1 = self
            .submitter
            .swap(
                wrapped,
                stable,
                opp.fee_in,
                amount_in,
                min_out_with_slippage(opp.intermediate_out, self.slippage_bps),
            )
            .await?;
        gas_units += leg1.gas_used;

        // 5. The second leg trades what actually arrived, not the simulation.
        let stable_after = self.submitter.token_balance(stable).await?;
        let received = stable_after.saturating_sub(stable_before);
        if received.is_zero() {
            return Err(BotError::Execution("leg 1 produced no output".into()));
        }

        // 6/7. Approve and swap leg 2.
        gas_units += self.submitter.ensure_allowance(stable, received).await?;
        let leg2 = self
            .submitter
            .swap(
                stable,
                wrapped,
                opp.fee_out,
                received,
                min_out_with_slippage(opp.final_out, self.slippage_bps),
            )
            .await?;
        gas_units += leg2.gas_used;

        // 8. Realized profit from the final balance, net of actual gas.
        let wrapped_after = self.submitter.token_balance(wrapped).await?;
        let final_received = saturating_i128(wrapped_after) - saturating_i128(wrapped_before);
        let gas_spent_wei = gas_units * gas_price;
        let realized_profit_wei =
            final_received - saturating_i128(amount_in) - saturating_i128(gas_spent_wei);

        Ok(Executed {
            tx_hash: format!("{:?}", leg2.tx_hash),
            gas_spent_wei,
            realized_profit_wei,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::registry::default_chains;
    use crate::scanner::scan_chain;
    use crate::testing::{FailureMode, SimulatedChain};

    fn setup() -> (Arc<SimulatedChain>, ChainConfig, StrategyConfig) {
        let mut cfg = default_chains().remove(0);
        cfg.stable_decimals = SimulatedChain::STABLE_DECIMALS;
        let sim = Arc::new(SimulatedChain::seeded(&cfg, 7).with_edge_bps(40));
        (sim, cfg, StrategyConfig::default())
    }

    #[test]
    fn test_min_out_applies_slippage() {
        let simulated = U256::from(1_000_000u64);
        assert_eq!(
            min_out_with_slippage(simulated, 50),
            U256::from(995_000u64)
        );
        assert_eq!(min_out_with_slippage(simulated, 0), simulated);
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_typed_failure() {
        let (sim, cfg, strategy) = setup();
        sim.set_native_balance(U256::zero()).await;
        let executor = TradeExecutor::new(sim.clone(), cfg.clone(), &strategy);

        let report = scan_chain(sim.as_ref(), &cfg, &strategy).await.unwrap();
        let opp = &report.opportunities[0];
        let record = executor.execute(opp, report.gas_price, 1000.0).await;

        assert_eq!(record.status, TradeStatus::Failed);
        assert!(record.error.as_deref().unwrap().contains("insufficient balance"));
        assert!(record.tx_hash.is_none());
        assert_eq!(sim.swap_count(), 0, "no swap may be attempted");
    }

    #[tokio::test]
    async fn test_successful_round_trip_reports_realized_profit() {
        let (sim, cfg, strategy) = setup();
        let executor = TradeExecutor::new(sim.clone(), cfg.clone(), &strategy);

        let report = scan_chain(sim.as_ref(), &cfg, &strategy).await.unwrap();
        let opp = report.opportunities[0].clone();
        let record = executor.execute(&opp, report.gas_price, 1000.0).await;

        assert_eq!(record.status, TradeStatus::Success, "{:?}", record.error);
        assert!(record.tx_hash.is_some());
        assert!(record.realized_profit_usd.is_some());
        assert_eq!(sim.swap_count(), 2);
    }

    #[tokio::test]
    async fn test_leg2_failure_reported_as_failed() {
        let (sim, cfg, strategy) = setup();
        sim.set_failure_mode(FailureMode::SecondSwapReverts).await;
        let executor = TradeExecutor::new(sim.clone(), cfg.clone(), &strategy);

        let report = scan_chain(sim.as_ref(), &cfg, &strategy).await.unwrap();
        let opp = report.opportunities[0].clone();
        let record = executor.execute(&opp, report.gas_price, 1000.0).await;

        assert_eq!(record.status, TradeStatus::Failed);
        assert_eq!(sim.swap_count(), 1, "leg 1 ran, leg 2 reverted");
        assert!(record.realized_profit_usd.is_none());
    }
}
