//! Core types shared across scanner, executor and the HTTP surface

use chrono::{DateTime, Utc};
use ethers::types::{TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::error::QuoteError;

/// Basis points in one whole unit.
pub const BPS_DENOMINATOR: i128 = 10_000;

/// One simulated round-trip swap combination.
///
/// Every scanned combination is kept, profitable or not, so the status
/// endpoint can show the full picture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub chain_id: u64,
    pub chain_name: String,
    /// Trade size in native wei
    #[serde(with = "u256_string")]
    pub amount_in: U256,
    /// Fee tier of the first leg (hundredths of a bip, e.g. 500 = 0.05%)
    pub fee_in: u32,
    /// Fee tier of the second leg
    pub fee_out: u32,
    /// Simulated stable-token amount after leg 1
    #[serde(with = "u256_string")]
    pub intermediate_out: U256,
    /// Simulated native amount after leg 2
    #[serde(with = "u256_string")]
    pub final_out: U256,
    /// Gross round-trip profit in wei (can be negative)
    pub gross_profit_wei: i128,
    /// Estimated gas cost for both legs in wei
    #[serde(with = "u256_string")]
    pub gas_cost_wei: U256,
    /// Gross profit in basis points of the input, integer floor
    pub spread_bps: i64,
    /// Net profit after gas, in USD at the reference price
    pub net_profit_usd: f64,
    pub profitable: bool,
    pub detected_at: DateTime<Utc>,
}

impl Opportunity {
    /// Short human-readable route, e.g. "0.05% -> 0.30%".
    pub fn route(&self) -> String {
        format!(
            "{:.2}% -> {:.2}%",
            self.fee_in as f64 / 10_000.0,
            self.fee_out as f64 / 10_000.0
        )
    }
}

/// A quote combination that could not be evaluated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteFailure {
    #[serde(with = "u256_string")]
    pub amount_in: U256,
    pub fee_in: u32,
    pub fee_out: u32,
    pub kind: QuoteFailureKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteFailureKind {
    PoolAbsent,
    Rpc,
}

impl From<&QuoteError> for QuoteFailureKind {
    fn from(e: &QuoteError) -> Self {
        match e {
            QuoteError::PoolAbsent { .. } => QuoteFailureKind::PoolAbsent,
            QuoteError::Rpc(_) => QuoteFailureKind::Rpc,
        }
    }
}

/// Outcome of one submitted swap transaction. The executor reads token
/// balances separately; only the hash and gas spent matter here.
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub tx_hash: TxHash,
    pub gas_used: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Success,
    Failed,
}

/// Record of one executed (or attempted) trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: String,
    pub chain_id: u64,
    pub chain_name: String,
    pub route: String,
    #[serde(with = "u256_string")]
    pub amount_in: U256,
    pub expected_profit_usd: f64,
    /// Realized profit net of gas; None when the trade failed
    pub realized_profit_usd: Option<f64>,
    #[serde(with = "u256_string")]
    pub gas_spent_wei: U256,
    pub gas_cost_usd: f64,
    pub tx_hash: Option<String>,
    pub status: TradeStatus,
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn failed(opp: &Opportunity, error: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            chain_id: opp.chain_id,
            chain_name: opp.chain_name.clone(),
            route: opp.route(),
            amount_in: opp.amount_in,
            expected_profit_usd: opp.net_profit_usd,
            realized_profit_usd: None,
            gas_spent_wei: U256::zero(),
            gas_cost_usd: 0.0,
            tx_hash: None,
            status: TradeStatus::Failed,
            error: Some(error),
            executed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TradeStatus::Success
    }
}

/// Convert wei to whole native units. Saturates on amounts beyond u128,
/// which is far past anything a wallet here will hold.
pub fn wei_to_native(amount: U256) -> f64 {
    saturating_u128(amount) as f64 / 1e18
}

/// Convert a token amount to whole units given its decimals.
pub fn units(amount: U256, decimals: u8) -> f64 {
    saturating_u128(amount) as f64 / 10f64.powi(decimals as i32)
}

pub fn saturating_u128(amount: U256) -> u128 {
    if amount > U256::from(u128::MAX) {
        u128::MAX
    } else {
        amount.as_u128()
    }
}

pub fn saturating_i128(amount: U256) -> i128 {
    i128::try_from(saturating_u128(amount)).unwrap_or(i128::MAX)
}

/// Serialize U256 as a decimal string; JSON numbers can't hold 256 bits.
pub mod u256_string {
    use ethers::types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<U256, D::Error> {
        let s = String::deserialize(de)?;
        U256::from_dec_str(&s).map_err(serde::de::Error::custom)
    }
}
