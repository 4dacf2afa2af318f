//! Scheduler engine
//!
//! Owns all mutable bot state behind one lock. A fixed-interval task drives
//! scans; trade executions run as detached tasks so scanning continues while
//! a trade is in flight, guarded by the phase state machine rather than a
//! boolean flag. `stop` only prevents new ticks; an in-flight execution is
//! never cancelled.

pub mod bandit;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::chains::{ChainHandle, ChainRuntimeState};
use crate::config::Config;
use crate::error::{BotError, Result};
use crate::executor::TradeExecutor;
use crate::scanner::{scan_chain, ScanReport};
use crate::types::{Opportunity, QuoteFailure, TradeRecord};

use bandit::BanditArm;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePhase {
    Idle,
    Scanning,
    Executing,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub total_scans: u64,
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub cumulative_profit_usd: f64,
    pub cumulative_gas_usd: f64,
}

/// All mutable engine state. HTTP handlers only ever see snapshots.
pub(crate) struct EngineState {
    pub is_running: bool,
    pub is_dry_run: bool,
    pub phase: EnginePhase,
    pub stats: EngineStats,
    pub opportunities: VecDeque<Opportunity>,
    pub trade_log: VecDeque<TradeRecord>,
    pub last_scan_failures: Vec<QuoteFailure>,
    pub arms: HashMap<u64, BanditArm>,
    pub started_at: Option<DateTime<Utc>>,
}

impl EngineState {
    fn fresh() -> Self {
        Self {
            is_running: false,
            is_dry_run: true,
            phase: EnginePhase::Idle,
            stats: EngineStats::default(),
            opportunities: VecDeque::new(),
            trade_log: VecDeque::new(),
            last_scan_failures: Vec::new(),
            arms: HashMap::new(),
            started_at: None,
        }
    }
}

/// Full state snapshot for `GET status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub is_dry_run: bool,
    pub phase: EnginePhase,
    pub stats: EngineStats,
    pub win_rate: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub chains: Vec<ChainStatus>,
    pub opportunities: Vec<Opportunity>,
    pub trade_log: Vec<TradeRecord>,
    pub last_scan_failures: Vec<QuoteFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub chain_id: u64,
    pub name: String,
    #[serde(flatten)]
    pub runtime: ChainRuntimeState,
    pub bandit: Option<BanditArm>,
}

pub struct ArbEngine {
    config: Config,
    chains: Vec<Arc<ChainHandle>>,
    pub(crate) state: RwLock<EngineState>,
    loop_handle: StdMutex<Option<JoinHandle<()>>>,
    /// When set, live starts are downgraded to dry-run.
    forced_dry_run: AtomicBool,
}

impl ArbEngine {
    pub fn new(config: Config, chains: Vec<Arc<ChainHandle>>) -> Arc<Self> {
        Arc::new(Self {
            config,
            chains,
            state: RwLock::new(EngineState::fresh()),
            loop_handle: StdMutex::new(None),
            forced_dry_run: AtomicBool::new(false),
        })
    }

    pub fn force_dry_run(&self) {
        self.forced_dry_run.store(true, Ordering::SeqCst);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn chains(&self) -> &[Arc<ChainHandle>] {
        &self.chains
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.is_running
    }

    pub async fn is_dry_run(&self) -> bool {
        self.state.read().await.is_dry_run
    }

    /// Start the scheduler loop. Counters and buffers start from zero; an
    /// already-running engine is left untouched.
    pub async fn start(self: &Arc<Self>, dry_run: bool) -> Result<()> {
        let dry_run = dry_run || self.forced_dry_run.load(Ordering::SeqCst);
        {
            let mut st = self.state.write().await;
            if st.is_running {
                return Err(BotError::AlreadyRunning);
            }
            *st = EngineState::fresh();
            st.is_running = true;
            st.is_dry_run = dry_run;
            st.started_at = Some(Utc::now());
        }

        info!(dry_run, "engine started");

        let engine = self.clone();
        let period = Duration::from_millis(self.config.strategy.scan_interval_ms);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Overdue ticks are dropped, not queued.
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // Swallow the immediate first tick; the first scan lands one
            // full period after start.
            interval.tick().await;
            loop {
                interval.tick().await;
                if !engine.is_running().await {
                    break;
                }
                engine.tick().await;
            }
        });

        if let Ok(mut slot) = self.loop_handle.lock() {
            *slot = Some(handle);
        }
        Ok(())
    }

    /// Stop scheduling new ticks. Returns whether the engine was running.
    /// An in-flight execution keeps going and still lands in the log.
    pub async fn stop(&self) -> bool {
        let was_running = {
            let mut st = self.state.write().await;
            std::mem::replace(&mut st.is_running, false)
        };
        if let Ok(mut slot) = self.loop_handle.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        if was_running {
            info!("engine stopped");
        }
        was_running
    }

    /// Clear stats and buffers. Refused while running.
    pub async fn reset(&self) -> Result<()> {
        let mut st = self.state.write().await;
        if st.is_running {
            return Err(BotError::EngineBusy);
        }
        *st = EngineState::fresh();
        Ok(())
    }

    /// One scheduler cycle. Public for tests; production only calls it from
    /// the interval task.
    pub async fn tick(self: &Arc<Self>) {
        let (scan_no, was_executing, dry_run) = {
            let mut st = self.state.write().await;
            st.stats.total_scans += 1;
            (
                st.stats.total_scans,
                st.phase == EnginePhase::Executing,
                st.is_dry_run,
            )
        };

        if scan_no % self.config.strategy.balance_refresh_scans == 0 {
            let dust = self.config.strategy.dust_threshold_wei();
            for chain in &self.chains {
                chain.refresh_balance(dust).await;
            }
        }

        let Some(chain) = self.pick_chain().await else {
            return;
        };
        let Some(provider) = chain.quotes() else {
            return;
        };

        if !was_executing {
            self.state.write().await.phase = EnginePhase::Scanning;
        }

        let report = match scan_chain(provider.as_ref(), &chain.config, &self.config.strategy).await
        {
            Ok(report) => report,
            Err(e) => {
                // A failed cycle changes nothing; next tick retries fresh.
                error!(chain = %chain.config.name, "scan failed: {e}");
                if !was_executing {
                    self.state.write().await.phase = EnginePhase::Idle;
                }
                return;
            }
        };

        {
            let mut rt = chain.runtime.write().await;
            rt.reference_price_usd = Some(report.reference_price_usd);
        }

        let best = report.best_profitable().cloned();
        self.record_scan(&report).await;

        // Execution gate: live mode, a profitable candidate, and nothing
        // already in flight.
        let launch = {
            let mut st = self.state.write().await;
            if st.phase == EnginePhase::Executing {
                false
            } else if dry_run || best.is_none() {
                st.phase = EnginePhase::Idle;
                false
            } else {
                st.phase = EnginePhase::Executing;
                true
            }
        };

        if launch {
            let Some(opp) = best else { return };
            let Some(trades) = chain.trades().cloned() else {
                self.state.write().await.phase = EnginePhase::Idle;
                return;
            };
            info!(
                chain = %chain.config.name,
                route = %opp.route(),
                net_usd = opp.net_profit_usd,
                "executing best opportunity"
            );
            let engine = self.clone();
            let chain_cfg = chain.config.clone();
            let gas_price = report.gas_price;
            let reference_price = report.reference_price_usd;
            tokio::spawn(async move {
                let executor = TradeExecutor::new(trades, chain_cfg, &engine.config.strategy);
                let record = executor.execute(&opp, gas_price, reference_price).await;
                engine.record_trade_outcome(record).await;
            });
        }
    }

    /// Fold scan output into the bounded display buffers.
    async fn record_scan(&self, report: &ScanReport) {
        let max = self.config.strategy.max_opportunities;
        let mut ranked = report.opportunities.clone();
        ranked.sort_by(|a, b| b.net_profit_usd.total_cmp(&a.net_profit_usd));

        let mut st = self.state.write().await;
        for opp in ranked.into_iter().rev() {
            st.opportunities.push_front(opp);
        }
        st.opportunities.truncate(max);
        st.last_scan_failures = report.failures.clone();
        if !report.failures.is_empty() {
            warn!(
                chain = report.chain_id,
                failed = report.failures.len(),
                "some combinations could not be quoted"
            );
        }
    }

    /// Fold one finished execution into stats, the trade log and the bandit,
    /// then release the execution slot. Failed trades never contribute to
    /// cumulative totals.
    pub(crate) async fn record_trade_outcome(&self, record: TradeRecord) {
        let mut st = self.state.write().await;
        st.stats.total_trades += 1;

        let win = if record.is_success() {
            let realized = record.realized_profit_usd.unwrap_or_default();
            st.stats.cumulative_profit_usd += realized;
            st.stats.cumulative_gas_usd += record.gas_cost_usd;
            realized > 0.0
        } else {
            false
        };
        if win {
            st.stats.wins += 1;
        } else {
            st.stats.losses += 1;
        }
        st.arms.entry(record.chain_id).or_default().record(win);

        st.trade_log.push_front(record);
        let max = self.config.strategy.max_trade_log;
        st.trade_log.truncate(max);
        st.phase = EnginePhase::Idle;
    }

    /// Thompson-sample a chain among those connected and funded.
    async fn pick_chain(&self) -> Option<Arc<ChainHandle>> {
        let mut eligible = Vec::with_capacity(self.chains.len());
        for chain in &self.chains {
            if chain.is_eligible().await {
                eligible.push(chain.config.chain_id);
            }
        }
        if eligible.is_empty() {
            return None;
        }

        let picked = {
            let mut st = self.state.write().await;
            let mut rng = rand::rng();
            bandit::select_chain(&mut st.arms, &eligible, &mut rng)?
        };
        self.chains
            .iter()
            .find(|c| c.config.chain_id == picked)
            .cloned()
    }

    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let st = self.state.read().await;
        let mut chains = Vec::with_capacity(self.chains.len());
        for chain in &self.chains {
            chains.push(ChainStatus {
                chain_id: chain.config.chain_id,
                name: chain.config.name.clone(),
                runtime: chain.runtime.read().await.clone(),
                bandit: st.arms.get(&chain.config.chain_id).cloned(),
            });
        }

        let win_rate = if st.stats.total_trades == 0 {
            0.0
        } else {
            st.stats.wins as f64 / st.stats.total_trades as f64
        };

        StatusSnapshot {
            is_running: st.is_running,
            is_dry_run: st.is_dry_run,
            phase: st.phase,
            stats: st.stats.clone(),
            win_rate,
            started_at: st.started_at,
            chains,
            opportunities: st.opportunities.iter().cloned().collect(),
            trade_log: st.trade_log.iter().cloned().collect(),
            last_scan_failures: st.last_scan_failures.clone(),
        }
    }

    pub async fn trade_log(&self) -> Vec<TradeRecord> {
        self.state.read().await.trade_log.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::registry::default_chains;
    use crate::config::ChainConfig;
    use crate::testing::{FailureMode, SimulatedChain};
    use crate::types::{QuoteFailureKind, TradeStatus};
    use ethers::types::U256;

    fn sim_chain_cfg() -> ChainConfig {
        let mut cfg = default_chains().remove(0);
        cfg.stable_decimals = SimulatedChain::STABLE_DECIMALS;
        cfg
    }

    fn sim_engine(edge_bps: i64) -> (Arc<ArbEngine>, Arc<SimulatedChain>) {
        let chain_cfg = sim_chain_cfg();
        let sim = Arc::new(SimulatedChain::seeded(&chain_cfg, 42).with_edge_bps(edge_bps));
        let handle = Arc::new(ChainHandle::connected(
            chain_cfg,
            sim.clone(),
            sim.clone(),
            U256::exp10(19),
            true,
        ));

        let mut config = Config::default();
        config.strategy.scan_interval_ms = 60_000;
        config.strategy.min_profit_usd = 0.001;

        (ArbEngine::new(config, vec![handle]), sim)
    }

    async fn force_mode(engine: &ArbEngine, running: bool, dry_run: bool) {
        let mut st = engine.state.write().await;
        st.is_running = running;
        st.is_dry_run = dry_run;
    }

    fn dummy_record(i: u64, success: bool) -> TradeRecord {
        TradeRecord {
            id: format!("trade-{i}"),
            chain_id: 137,
            chain_name: "Polygon".into(),
            route: "0.05% -> 0.30%".into(),
            amount_in: U256::exp10(15),
            expected_profit_usd: 1.0,
            realized_profit_usd: success.then_some(0.8),
            gas_spent_wei: U256::from(1u64),
            gas_cost_usd: 0.1,
            tx_hash: success.then(|| format!("0x{i:064x}")),
            status: if success {
                TradeStatus::Success
            } else {
                TradeStatus::Failed
            },
            error: (!success).then(|| "swap: transaction reverted".into()),
            executed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_trade_log_capped_at_50_fifo() {
        let (engine, _sim) = sim_engine(0);
        for i in 0..55 {
            engine.record_trade_outcome(dummy_record(i, true)).await;
        }
        let log = engine.trade_log().await;
        assert_eq!(log.len(), 50);
        // Newest first; the five oldest were evicted from the tail.
        assert_eq!(log[0].id, "trade-54");
        assert_eq!(log[49].id, "trade-5");
    }

    #[tokio::test]
    async fn test_opportunity_buffer_capped_at_30() {
        let (engine, _sim) = sim_engine(40);
        force_mode(&engine, true, true).await;
        // 6 combinations per scan; 10 scans would produce 60 entries uncapped.
        for _ in 0..10 {
            engine.tick().await;
        }
        let snapshot = engine.status_snapshot().await;
        assert_eq!(snapshot.opportunities.len(), 30);
        assert_eq!(snapshot.stats.total_scans, 10);
    }

    #[tokio::test]
    async fn test_start_while_running_rejected_without_reset() {
        let (engine, _sim) = sim_engine(0);
        engine.start(true).await.unwrap();
        engine.state.write().await.stats.total_scans = 7;

        let err = engine.start(false).await.unwrap_err();
        assert!(matches!(err, BotError::AlreadyRunning));

        let snapshot = engine.status_snapshot().await;
        assert!(snapshot.is_running);
        assert!(snapshot.is_dry_run, "mode must not flip on rejected start");
        assert_eq!(snapshot.stats.total_scans, 7, "stats must not reset");

        engine.stop().await;
    }

    #[tokio::test]
    async fn test_stop_then_start_yields_fresh_stats() {
        let (engine, _sim) = sim_engine(0);
        engine.start(true).await.unwrap();
        {
            let mut st = engine.state.write().await;
            st.stats.total_scans = 123;
            st.trade_log.push_front(dummy_record(1, true));
        }

        assert!(engine.stop().await);
        engine.start(false).await.unwrap();

        let snapshot = engine.status_snapshot().await;
        assert_eq!(snapshot.stats.total_scans, 0);
        assert!(snapshot.trade_log.is_empty());
        assert!(!snapshot.is_dry_run);

        engine.stop().await;
    }

    #[tokio::test]
    async fn test_failed_trade_gives_no_partial_credit() {
        let (engine, _sim) = sim_engine(0);
        engine.record_trade_outcome(dummy_record(0, false)).await;

        let snapshot = engine.status_snapshot().await;
        assert_eq!(snapshot.trade_log[0].status, TradeStatus::Failed);
        assert_eq!(snapshot.stats.cumulative_profit_usd, 0.0);
        assert_eq!(snapshot.stats.cumulative_gas_usd, 0.0);
        assert_eq!(snapshot.stats.total_trades, 1);
        assert_eq!(snapshot.stats.losses, 1);
        assert_eq!(snapshot.stats.wins, 0);
    }

    #[tokio::test]
    async fn test_tick_during_execution_scans_but_does_not_execute() {
        // Strong edge so the scan definitely finds a profitable candidate.
        let (engine, sim) = sim_engine(500);
        force_mode(&engine, true, false).await;
        engine.state.write().await.phase = EnginePhase::Executing;

        engine.tick().await;

        let snapshot = engine.status_snapshot().await;
        assert_eq!(snapshot.stats.total_scans, 1, "scan must still happen");
        assert!(!snapshot.opportunities.is_empty(), "display must update");
        assert_eq!(sim.swap_count(), 0, "no second execution may start");
        assert_eq!(snapshot.phase, EnginePhase::Executing);
    }

    #[tokio::test]
    async fn test_live_tick_executes_best_and_folds_stats() {
        let (engine, sim) = sim_engine(500);
        force_mode(&engine, true, false).await;

        engine.tick().await;

        // Execution is detached; wait for it to land.
        for _ in 0..100 {
            if engine.status_snapshot().await.stats.total_trades == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let snapshot = engine.status_snapshot().await;
        assert_eq!(snapshot.stats.total_trades, 1);
        assert_eq!(snapshot.phase, EnginePhase::Idle);
        assert_eq!(sim.swap_count(), 2);
        assert_eq!(snapshot.trade_log.len(), 1);
        assert_eq!(snapshot.trade_log[0].status, TradeStatus::Success);
        let arm = snapshot.chains[0].bandit.as_ref().unwrap();
        assert_eq!(arm.attempts, 1);
    }

    #[tokio::test]
    async fn test_dry_run_tick_never_executes() {
        let (engine, sim) = sim_engine(500);
        force_mode(&engine, true, true).await;

        engine.tick().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = engine.status_snapshot().await;
        assert_eq!(sim.swap_count(), 0);
        assert_eq!(snapshot.stats.total_trades, 0);
        assert!(!snapshot.opportunities.is_empty());
    }

    #[tokio::test]
    async fn test_scan_failure_swallowed_and_state_unchanged() {
        let (engine, sim) = sim_engine(0);
        force_mode(&engine, true, true).await;
        sim.set_failure_mode(FailureMode::QuoteRpc).await;

        engine.tick().await;

        // Reference quote failed, so the cycle aborted after counting.
        let snapshot = engine.status_snapshot().await;
        assert_eq!(snapshot.stats.total_scans, 1);
        assert!(snapshot.opportunities.is_empty());
        assert_eq!(snapshot.phase, EnginePhase::Idle);
    }

    #[tokio::test]
    async fn test_forced_dry_run_downgrades_live_start() {
        let (engine, _sim) = sim_engine(0);
        engine.force_dry_run();

        engine.start(false).await.unwrap();
        assert!(engine.is_dry_run().await);
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_pool_absent_failures_are_classified() {
        let (engine, sim) = sim_engine(0);
        force_mode(&engine, true, true).await;
        sim.set_failure_mode(FailureMode::QuotePoolAbsent).await;

        // The 0.05% reference quote still works; every combination touches
        // the missing 0.3% pool on one leg and fails.
        engine.tick().await;

        let snapshot = engine.status_snapshot().await;
        assert_eq!(snapshot.stats.total_scans, 1);
        assert!(snapshot.opportunities.is_empty());
        assert_eq!(snapshot.last_scan_failures.len(), 6);
        for failure in &snapshot.last_scan_failures {
            assert_eq!(failure.kind, QuoteFailureKind::PoolAbsent);
        }
    }
}
