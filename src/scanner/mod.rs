//! Opportunity scanner
//!
//! One scan pulls the chain's gas price and a 1-unit reference quote, then
//! walks the (trade size x fee-tier pair) cross product issuing two
//! sequential quotes per combination. Both legs are kept sequential because
//! leg 2's input is leg 1's simulated output.

use chrono::Utc;
use ethers::types::U256;
use tracing::debug;

use crate::chains::QuoteProvider;
use crate::config::{ChainConfig, StrategyConfig};
use crate::error::{QuoteError, Result};
use crate::types::{
    saturating_i128, units, wei_to_native, Opportunity, QuoteFailure, BPS_DENOMINATOR,
};

/// Result of scanning one chain: every evaluated combination plus the ones
/// that could not be quoted, classified so a missing pool is not mistaken
/// for a flaky endpoint.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub chain_id: u64,
    pub gas_price: U256,
    pub reference_price_usd: f64,
    pub opportunities: Vec<Opportunity>,
    pub failures: Vec<QuoteFailure>,
}

impl ScanReport {
    /// Highest net-profit opportunity that clears the gate, if any.
    pub fn best_profitable(&self) -> Option<&Opportunity> {
        self.opportunities
            .iter()
            .filter(|o| o.profitable)
            .max_by(|a, b| a.net_profit_usd.total_cmp(&b.net_profit_usd))
    }
}

/// Ordered fee-tier pairs; self-pairs are excluded since swapping in and
/// out of the same pool can never produce a spread.
pub fn fee_pairs(tiers: &[u32]) -> Vec<(u32, u32)> {
    let mut pairs = Vec::with_capacity(tiers.len() * tiers.len());
    for &fee_in in tiers {
        for &fee_out in tiers {
            if fee_in != fee_out {
                pairs.push((fee_in, fee_out));
            }
        }
    }
    pairs
}

/// Fold the two simulated legs into a profitability record.
#[allow(clippy::too_many_arguments)]
pub fn build_opportunity(
    chain: &ChainConfig,
    amount_in: U256,
    fee_in: u32,
    fee_out: u32,
    intermediate_out: U256,
    final_out: U256,
    gas_cost_wei: U256,
    reference_price_usd: f64,
    min_profit_usd: f64,
) -> Opportunity {
    let gross_profit_wei = saturating_i128(final_out) - saturating_i128(amount_in);
    let spread_bps = if amount_in.is_zero() {
        0
    } else {
        (gross_profit_wei * BPS_DENOMINATOR / saturating_i128(amount_in)) as i64
    };
    let net_profit_wei = gross_profit_wei - saturating_i128(gas_cost_wei);
    let net_profit_usd = (net_profit_wei as f64 / 1e18) * reference_price_usd;
    let profitable = net_profit_usd >= min_profit_usd;

    Opportunity {
        chain_id: chain.chain_id,
        chain_name: chain.name.clone(),
        amount_in,
        fee_in,
        fee_out,
        intermediate_out,
        final_out,
        gross_profit_wei,
        gas_cost_wei,
        spread_bps,
        net_profit_usd,
        profitable,
        detected_at: Utc::now(),
    }
}

/// Scan one chain. Read-only apart from the caller caching the reference
/// price. A gas-price or reference-quote failure aborts the whole scan;
/// per-combination failures are collected instead.
pub async fn scan_chain(
    provider: &dyn QuoteProvider,
    chain: &ChainConfig,
    strategy: &StrategyConfig,
) -> Result<ScanReport> {
    let gas_price = provider.gas_price().await?;
    let gas_cost_wei = gas_price * U256::from(strategy.gas_units_per_round_trip);

    // 1 native unit -> stable gives the USD reference price.
    let one = U256::exp10(18);
    let reference_fee = strategy.fee_tiers[0];
    let reference_out = provider
        .quote(chain.wrapped_native, chain.stable_token, one, reference_fee)
        .await?;
    let reference_price_usd = units(reference_out, chain.stable_decimals);

    let mut report = ScanReport {
        chain_id: chain.chain_id,
        gas_price,
        reference_price_usd,
        ..Default::default()
    };

    for amount_in in strategy.trade_sizes_wei() {
        for (fee_in, fee_out) in fee_pairs(&strategy.fee_tiers) {
            let intermediate_out = match provider
                .quote(chain.wrapped_native, chain.stable_token, amount_in, fee_in)
                .await
            {
                Ok(out) => out,
                Err(e) => {
                    report
                        .failures
                        .push(quote_failure(amount_in, fee_in, fee_out, &e));
                    continue;
                }
            };

            let final_out = match provider
                .quote(chain.stable_token, chain.wrapped_native, intermediate_out, fee_out)
                .await
            {
                Ok(out) => out,
                Err(e) => {
                    report
                        .failures
                        .push(quote_failure(amount_in, fee_in, fee_out, &e));
                    continue;
                }
            };

            let opp = build_opportunity(
                chain,
                amount_in,
                fee_in,
                fee_out,
                intermediate_out,
                final_out,
                gas_cost_wei,
                reference_price_usd,
                strategy.min_profit_usd,
            );
            debug!(
                chain = %chain.name,
                size = wei_to_native(amount_in),
                route = %opp.route(),
                spread_bps = opp.spread_bps,
                net_usd = opp.net_profit_usd,
                "combination evaluated"
            );
            report.opportunities.push(opp);
        }
    }

    Ok(report)
}

fn quote_failure(amount_in: U256, fee_in: u32, fee_out: u32, e: &QuoteError) -> QuoteFailure {
    QuoteFailure {
        amount_in,
        fee_in,
        fee_out,
        kind: e.into(),
        detail: e.to_string(),
    }
}
