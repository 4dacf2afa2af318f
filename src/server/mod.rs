//! HTTP control surface
//!
//! Small JSON API over the engine: inspect state, start and stop the
//! scheduler, reset counters, read the trade log. No auth; bind it to a
//! trusted interface.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{ArbEngine, StatusSnapshot};
use crate::error::Result;
use crate::types::TradeRecord;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub success: bool,
    pub is_running: bool,
    pub is_dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResponse {
    pub success: bool,
    /// Running state after the stop, always false
    pub is_running: bool,
    pub was_running: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub is_running: bool,
    pub is_dry_run: bool,
    pub chains_connected: usize,
    pub chains_total: usize,
    pub chains: Vec<ChainHealth>,
    pub strategy: StrategyEcho,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainHealth {
    pub chain_id: u64,
    pub name: String,
    pub connected: bool,
    pub is_active: bool,
}

/// The effective strategy knobs, echoed so an operator can confirm what
/// the process actually loaded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyEcho {
    pub scan_interval_ms: u64,
    pub min_profit_usd: f64,
    pub slippage_bps: u64,
    pub fee_tiers: Vec<u32>,
    pub trade_sizes_native: Vec<f64>,
}

async fn get_status(State(engine): State<Arc<ArbEngine>>) -> Json<StatusSnapshot> {
    Json(engine.status_snapshot().await)
}

/// Start the scheduler. A second start without an intervening stop is
/// rejected so a running session cannot silently flip mode.
async fn start_engine(
    State(engine): State<Arc<ArbEngine>>,
    Json(req): Json<StartRequest>,
) -> (StatusCode, Json<ControlResponse>) {
    match engine.start(req.dry_run).await {
        // The engine may have upgraded the request to dry-run; report what
        // it actually runs as.
        Ok(()) => (
            StatusCode::OK,
            Json(ControlResponse {
                success: true,
                is_running: true,
                is_dry_run: engine.is_dry_run().await,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ControlResponse {
                success: false,
                is_running: engine.is_running().await,
                is_dry_run: engine.is_dry_run().await,
                message: Some(e.to_string()),
            }),
        ),
    }
}

/// Stop scheduling. Idempotent; reports whether anything was running.
async fn stop_engine(State(engine): State<Arc<ArbEngine>>) -> Json<StopResponse> {
    let was_running = engine.stop().await;
    Json(StopResponse {
        success: true,
        is_running: false,
        was_running,
    })
}

async fn get_health(State(engine): State<Arc<ArbEngine>>) -> Json<HealthResponse> {
    let mut chains = Vec::with_capacity(engine.chains().len());
    let mut connected = 0;
    for chain in engine.chains() {
        let rt = chain.runtime.read().await;
        if rt.connected {
            connected += 1;
        }
        chains.push(ChainHealth {
            chain_id: chain.config.chain_id,
            name: chain.config.name.clone(),
            connected: rt.connected,
            is_active: rt.is_active,
        });
    }

    let strategy = &engine.config().strategy;
    Json(HealthResponse {
        status: "ok",
        is_running: engine.is_running().await,
        is_dry_run: engine.is_dry_run().await,
        chains_connected: connected,
        chains_total: chains.len(),
        chains,
        strategy: StrategyEcho {
            scan_interval_ms: strategy.scan_interval_ms,
            min_profit_usd: strategy.min_profit_usd,
            slippage_bps: strategy.slippage_bps,
            fee_tiers: strategy.fee_tiers.clone(),
            trade_sizes_native: strategy.trade_sizes_native.clone(),
        },
    })
}

async fn reset_engine(
    State(engine): State<Arc<ArbEngine>>,
) -> (StatusCode, Json<ControlResponse>) {
    match engine.reset().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ControlResponse {
                success: true,
                is_running: false,
                is_dry_run: engine.is_dry_run().await,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ControlResponse {
                success: false,
                is_running: true,
                is_dry_run: engine.is_dry_run().await,
                message: Some(e.to_string()),
            }),
        ),
    }
}

async fn get_logs(State(engine): State<Arc<ArbEngine>>) -> Json<Vec<TradeRecord>> {
    Json(engine.trade_log().await)
}

pub fn create_router(engine: Arc<ArbEngine>) -> Router {
    Router::new()
        .route("/api/defi/multichain-arb/status", get(get_status))
        .route("/api/defi/multichain-arb/start", post(start_engine))
        .route("/api/defi/multichain-arb/stop", post(stop_engine))
        .route("/api/defi/multichain-arb/health", get(get_health))
        .route("/api/defi/multichain-arb/reset", post(reset_engine))
        .route("/api/defi/multichain-arb/logs", get(get_logs))
        .with_state(engine)
}

/// Bind and serve until the process exits.
pub async fn serve(engine: Arc<ArbEngine>, port: u16) -> Result<()> {
    let app = create_router(engine);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("control API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| crate::error::BotError::Config(format!("bind {addr}: {e}")))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::BotError::Config(format!("server: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::registry::default_chains;
    use crate::chains::ChainHandle;
    use crate::config::Config;
    use crate::testing::SimulatedChain;
    use ethers::types::U256;

    fn test_engine() -> Arc<ArbEngine> {
        let mut cfg = default_chains().remove(0);
        cfg.stable_decimals = SimulatedChain::STABLE_DECIMALS;
        let sim = Arc::new(SimulatedChain::seeded(&cfg, 3));
        let handle = Arc::new(ChainHandle::connected(
            cfg,
            sim.clone(),
            sim,
            U256::exp10(19),
            true,
        ));

        let mut config = Config::default();
        // Keep the interval loop quiet during handler tests.
        config.strategy.scan_interval_ms = 60_000;
        ArbEngine::new(config, vec![handle])
    }

    #[tokio::test]
    async fn test_start_then_status_reflects_running() {
        let engine = test_engine();

        let (code, Json(resp)) = start_engine(
            State(engine.clone()),
            Json(StartRequest { dry_run: true }),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert!(resp.success);
        assert!(resp.is_dry_run);

        let Json(status) = get_status(State(engine.clone())).await;
        assert!(status.is_running);
        assert!(status.is_dry_run);
        assert!(status.started_at.is_some());

        engine.stop().await;
    }

    #[tokio::test]
    async fn test_double_start_returns_400_without_side_effects() {
        let engine = test_engine();
        engine.start(true).await.unwrap();
        engine.state.write().await.stats.total_scans = 5;

        let (code, Json(resp)) = start_engine(
            State(engine.clone()),
            Json(StartRequest { dry_run: false }),
        )
        .await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert!(!resp.success);
        assert!(resp.is_running);
        assert!(resp.is_dry_run, "rejected start must not flip the mode");
        assert!(resp.message.is_some());

        let Json(status) = get_status(State(engine.clone())).await;
        assert_eq!(status.stats.total_scans, 5, "stats must survive");

        engine.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let engine = test_engine();
        engine.start(true).await.unwrap();

        let Json(first) = stop_engine(State(engine.clone())).await;
        assert!(first.success);
        assert!(!first.is_running);
        assert!(first.was_running);

        let Json(second) = stop_engine(State(engine.clone())).await;
        assert!(second.success);
        assert!(!second.is_running);
        assert!(!second.was_running);
    }

    #[tokio::test]
    async fn test_reset_refused_while_running() {
        let engine = test_engine();
        engine.start(true).await.unwrap();

        let (code, Json(resp)) = reset_engine(State(engine.clone())).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert!(!resp.success);

        engine.stop().await;
        let (code, Json(resp)) = reset_engine(State(engine.clone())).await;
        assert_eq!(code, StatusCode::OK);
        assert!(resp.success);
    }

    #[tokio::test]
    async fn test_health_reports_per_chain_state_and_config() {
        let engine = test_engine();
        let Json(health) = get_health(State(engine.clone())).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.chains_total, 1);
        assert_eq!(health.chains_connected, 1);
        assert!(!health.is_running);

        assert_eq!(health.chains.len(), 1);
        assert_eq!(health.chains[0].chain_id, 137);
        assert_eq!(health.chains[0].name, "Polygon");
        assert!(health.chains[0].connected);
        assert!(health.chains[0].is_active);

        // Config echo reflects what the engine loaded
        assert_eq!(health.strategy.scan_interval_ms, 60_000);
        assert_eq!(health.strategy.min_profit_usd, 5.0);
        assert_eq!(health.strategy.fee_tiers, vec![500, 3000]);
    }

    #[tokio::test]
    async fn test_start_response_reports_forced_dry_run() {
        let engine = test_engine();
        engine.force_dry_run();

        let (code, Json(resp)) = start_engine(
            State(engine.clone()),
            Json(StartRequest { dry_run: false }),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert!(resp.success);
        assert!(resp.is_dry_run, "response must reflect the downgraded mode");

        engine.stop().await;
    }

    #[tokio::test]
    async fn test_logs_returns_trade_records() {
        let engine = test_engine();
        let Json(logs) = get_logs(State(engine.clone())).await;
        assert!(logs.is_empty());
    }

    #[test]
    fn test_start_request_defaults_to_live() {
        let req: StartRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.dry_run);
        let req: StartRequest = serde_json::from_str(r#"{"dryRun":true}"#).unwrap();
        assert!(req.dry_run);
    }
}
