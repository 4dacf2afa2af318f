//! Simulated chain backend
//!
//! A labeled test double implementing the same `QuoteProvider` and
//! `TradeSubmitter` seams as the real ethers client. Quotes follow a
//! configurable price with pool fees applied and an optional profit edge on
//! the return leg; trades settle instantly against in-memory balances.
//! Used by the test suite and by the `simulate` run mode for UI demos.
//! Never wired up in a live run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use ethers::types::{Address, TxHash, U256};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

use crate::chains::{QuoteProvider, TradeSubmitter};
use crate::config::ChainConfig;
use crate::error::{BotError, QuoteError, Result};
use crate::types::SwapOutcome;

/// Injectable failure points for exercising error paths.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FailureMode {
    #[default]
    None,
    /// Quotes against the 0.3% pool revert as if it did not exist; other
    /// tiers keep working
    QuotePoolAbsent,
    /// Every quote fails at the transport level
    QuoteRpc,
    /// Leg 1 succeeds, leg 2 reverts
    SecondSwapReverts,
}

/// Fee tier treated as missing under [`FailureMode::QuotePoolAbsent`].
pub const ABSENT_POOL_FEE: u32 = 3000;

pub struct SimulatedChain {
    wrapped_native: Address,
    stable_token: Address,
    /// Stable units per native unit
    price: f64,
    /// Extra return applied on the stable -> native leg, in bps
    edge_bps: i64,
    /// Random quote noise, in bps (0 = deterministic)
    jitter_bps: u64,
    gas_price: U256,
    rng: StdMutex<StdRng>,
    failure: Mutex<FailureMode>,
    native_balance: Mutex<U256>,
    token_balances: Mutex<HashMap<Address, U256>>,
    allowances: Mutex<HashMap<Address, U256>>,
    swap_count: AtomicU64,
}

impl SimulatedChain {
    /// The double keeps its stable token at 18 decimals so round-trip
    /// arithmetic stays exact.
    pub const STABLE_DECIMALS: u8 = 18;

    const WRAP_GAS: u64 = 45_000;
    const APPROVE_GAS: u64 = 46_000;
    const SWAP_GAS: u64 = 150_000;

    pub fn seeded(chain: &ChainConfig, seed: u64) -> Self {
        Self {
            wrapped_native: chain.wrapped_native,
            stable_token: chain.stable_token,
            price: 1000.0,
            edge_bps: 0,
            jitter_bps: 0,
            gas_price: U256::from(30_000_000_000u64), // 30 gwei
            rng: StdMutex::new(StdRng::seed_from_u64(seed)),
            failure: Mutex::new(FailureMode::None),
            native_balance: Mutex::new(U256::exp10(19)), // 10 native units
            token_balances: Mutex::new(HashMap::new()),
            allowances: Mutex::new(HashMap::new()),
            swap_count: AtomicU64::new(0),
        }
    }

    /// Demo-flavored instance: noisy quotes, occasional visible edge.
    pub fn demo(chain: &ChainConfig, seed: u64) -> Self {
        let mut sim = Self::seeded(chain, seed);
        sim.jitter_bps = 25;
        sim.edge_bps = 45;
        sim
    }

    pub fn with_edge_bps(mut self, bps: i64) -> Self {
        self.edge_bps = bps;
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub async fn set_failure_mode(&self, mode: FailureMode) {
        *self.failure.lock().await = mode;
    }

    pub async fn set_native_balance(&self, balance: U256) {
        *self.native_balance.lock().await = balance;
    }

    pub fn swap_count(&self) -> u64 {
        self.swap_count.load(Ordering::SeqCst)
    }

    fn jitter(&self) -> f64 {
        if self.jitter_bps == 0 {
            return 1.0;
        }
        let span = self.jitter_bps as f64 / 10_000.0;
        let r: f64 = self
            .rng
            .lock()
            .expect("rng lock poisoned")
            .random_range(-span..=span);
        1.0 + r
    }

    /// Constant-price AMM model: fee on input, edge and jitter on the way
    /// back to native.
    fn quote_amount(&self, token_in: Address, token_out: Address, amount_in: U256, fee: u32) -> U256 {
        let amount = crate::types::saturating_u128(amount_in) as f64;
        let after_fee = amount * (1.0 - fee as f64 / 1_000_000.0);
        let out = if token_in == self.wrapped_native && token_out == self.stable_token {
            after_fee * self.price
        } else if token_in == self.stable_token && token_out == self.wrapped_native {
            (after_fee / self.price) * (1.0 + self.edge_bps as f64 / 10_000.0)
        } else {
            after_fee
        };
        U256::from((out * self.jitter()).max(0.0) as u128)
    }

    async fn credit(&self, token: Address, amount: U256) {
        let mut balances = self.token_balances.lock().await;
        let entry = balances.entry(token).or_insert_with(U256::zero);
        *entry += amount;
    }

    async fn debit(&self, token: Address, amount: U256) -> Result<()> {
        let mut balances = self.token_balances.lock().await;
        let entry = balances.entry(token).or_insert_with(U256::zero);
        if *entry < amount {
            return Err(BotError::Execution(format!(
                "simulated balance of {token} too low: {entry} < {amount}"
            )));
        }
        *entry -= amount;
        Ok(())
    }

    fn next_tx_hash(&self) -> TxHash {
        TxHash::from_low_u64_be(self.swap_count.load(Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl QuoteProvider for SimulatedChain {
    async fn gas_price(&self) -> Result<U256> {
        Ok(self.gas_price)
    }

    async fn quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee: u32,
    ) -> Result<U256, QuoteError> {
        match *self.failure.lock().await {
            FailureMode::QuotePoolAbsent if fee == ABSENT_POOL_FEE => {
                return Err(QuoteError::PoolAbsent { fee })
            }
            FailureMode::QuoteRpc => {
                return Err(QuoteError::Rpc("simulated transport failure".into()))
            }
            _ => {}
        }
        Ok(self.quote_amount(token_in, token_out, amount_in, fee))
    }
}

#[async_trait]
impl TradeSubmitter for SimulatedChain {
    async fn native_balance(&self) -> Result<U256> {
        Ok(*self.native_balance.lock().await)
    }

    async fn token_balance(&self, token: Address) -> Result<U256> {
        Ok(self
            .token_balances
            .lock()
            .await
            .get(&token)
            .copied()
            .unwrap_or_default())
    }

    async fn wrap_native(&self, amount: U256) -> Result<U256> {
        {
            let mut native = self.native_balance.lock().await;
            if *native < amount {
                return Err(BotError::Execution("wrap: insufficient native".into()));
            }
            *native -= amount;
        }
        self.credit(self.wrapped_native, amount).await;
        Ok(U256::from(Self::WRAP_GAS))
    }

    async fn ensure_allowance(&self, token: Address, amount: U256) -> Result<U256> {
        let mut allowances = self.allowances.lock().await;
        let current = allowances.get(&token).copied().unwrap_or_default();
        if current >= amount {
            return Ok(U256::zero());
        }
        allowances.insert(token, U256::MAX);
        Ok(U256::from(Self::APPROVE_GAS))
    }

    async fn swap(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
        min_out: U256,
    ) -> Result<SwapOutcome> {
        let completed = self.swap_count.load(Ordering::SeqCst);
        if *self.failure.lock().await == FailureMode::SecondSwapReverts && completed == 1 {
            return Err(BotError::Execution("swap: transaction reverted".into()));
        }

        let out = self.quote_amount(token_in, token_out, amount_in, fee);
        if out < min_out {
            return Err(BotError::Execution(format!(
                "swap: output {out} below minimum {min_out}"
            )));
        }

        self.debit(token_in, amount_in).await?;
        self.credit(token_out, out).await;
        let tx_hash = self.next_tx_hash();
        self.swap_count.fetch_add(1, Ordering::SeqCst);

        Ok(SwapOutcome {
            tx_hash,
            gas_used: U256::from(Self::SWAP_GAS),
        })
    }
}
