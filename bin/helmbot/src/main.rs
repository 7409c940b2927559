use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{AlertEvent, Config, CoreCommand, RunMode, StatusBoard};
use engine::{
    Core, CooldownStore, ExecutionGatewayClient, ExecutorConfig, OrderExecutor, PositionStore,
    ReservationStore,
};
use market::{HttpMarketDataProvider, MarketDataCollector, SnapshotStore};
use paper::PaperExecutionClient;
use strategy::generator::GeneratorConfig;
use strategy::{HttpAdvisoryClient, ProfileFileConfig, SignalGenerator};

/// Grace period for actors to finish in-flight broker calls on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(20);

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(mode = %cfg.run_mode, trading = %cfg.trading_mode, "HelmBot starting");

    // ── Database ──────────────────────────────────────────────────────────────
    let db = SqlitePool::connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database: {e}"));
    sqlx::migrate!("../../migrations")
        .run(&db)
        .await
        .unwrap_or_else(|e| panic!("Database migration failed: {e}"));
    info!("Database ready");

    // ── Shared stores ─────────────────────────────────────────────────────────
    let snapshots = SnapshotStore::new();
    let positions = PositionStore::new(db.clone());
    let reservations = ReservationStore::new(db.clone());
    let cooldowns = CooldownStore::new(db.clone());
    let status = StatusBoard::new();

    // ── Strategy profiles ─────────────────────────────────────────────────────
    let profiles = ProfileFileConfig::load(&cfg.strategy_config_path).resolve();
    info!(count = profiles.len(), "Strategy profiles loaded");

    // ── Core lifecycle ────────────────────────────────────────────────────────
    let (core, core_handle) = Core::new();
    let core_state = core_handle.state_handle();

    // ── Collaborator clients ──────────────────────────────────────────────────
    let market_provider = Arc::new(HttpMarketDataProvider::new(cfg.market_data_url.clone()));

    let mut paper_client: Option<Arc<PaperExecutionClient>> = None;
    let execution: Arc<dyn common::ExecutionClient> = match cfg.run_mode {
        RunMode::Live => {
            info!("Live mode — orders go to the execution gateway");
            Arc::new(ExecutionGatewayClient::new(
                cfg.execution_url.clone(),
                cfg.execution_token.clone(),
            ))
        }
        RunMode::Paper => {
            info!(balance = cfg.paper_balance, "Paper mode — orders are simulated");
            let client = Arc::new(PaperExecutionClient::new(cfg.paper_balance, 10.0));
            paper_client = Some(client.clone());
            client
        }
    };

    let advisory: Option<Arc<dyn common::AdvisoryClient>> = cfg.advisory_url.clone().map(|url| {
        info!(url = %url, "Advisory service enabled");
        Arc::new(HttpAdvisoryClient::new(url)) as Arc<dyn common::AdvisoryClient>
    });

    // ── Channels ──────────────────────────────────────────────────────────────
    let (signal_tx, signal_rx) = mpsc::channel::<common::Signal>(128);
    let (alert_tx, mut alert_rx) = mpsc::channel::<AlertEvent>(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Actors ────────────────────────────────────────────────────────────────
    let collector = MarketDataCollector::new(
        market_provider,
        snapshots.clone(),
        cfg.instruments.clone(),
        Duration::from_secs(cfg.collector_interval_secs),
        status.collector.clone(),
        shutdown_rx.clone(),
    );

    let snapshot_max_age = chrono::Duration::seconds(3 * cfg.collector_interval_secs as i64);
    let generator = SignalGenerator::new(
        snapshots.clone(),
        profiles.clone(),
        cfg.instruments.clone(),
        advisory,
        signal_tx,
        core_state.clone(),
        status.generator.clone(),
        shutdown_rx.clone(),
        GeneratorConfig {
            interval: Duration::from_secs(cfg.generator_interval_secs),
            account: cfg.account_id.clone(),
            trading_mode: cfg.trading_mode,
            news_windows: cfg.news_windows_utc.clone(),
            snapshot_max_age,
        },
    );

    let executor = OrderExecutor::new(
        signal_rx,
        execution,
        snapshots.clone(),
        positions,
        reservations,
        cooldowns,
        profiles,
        alert_tx,
        core_state.clone(),
        status.executor.clone(),
        shutdown_rx.clone(),
        ExecutorConfig {
            interval: Duration::from_secs(cfg.executor_interval_secs),
            account: cfg.account_id.clone(),
            tick_value: 1.0,
            max_portfolio_risk_pct: cfg.max_portfolio_risk_pct,
            trade_cooldown: chrono::Duration::seconds(cfg.trade_cooldown_secs),
            signal_max_age: chrono::Duration::seconds(cfg.signal_max_age_secs),
            reservation_ttl: chrono::Duration::seconds(cfg.reservation_ttl_secs),
            snapshot_max_age,
            peak_drawdown_threshold: cfg.peak_drawdown_threshold,
            session_end_hour_utc: cfg.session_end_hour_utc,
            session_close_window: chrono::Duration::minutes(cfg.session_close_window_mins),
        },
    );

    // ── Paper price feed (simulated fills follow the snapshot store) ──────────
    if let Some(client) = paper_client {
        let snapshots = snapshots.clone();
        let instruments = cfg.instruments.clone();
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(5));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for instrument in &instruments {
                            if let Some(price) = snapshots.latest_price(instrument).await {
                                client.update_price(instrument, price).await;
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
            }
        });
    }

    // ── Alert forwarder (operator-visible escalations) ────────────────────────
    tokio::spawn(async move {
        while let Some(alert) = alert_rx.recv().await {
            match alert {
                AlertEvent::OpenFailed { instrument, error: e } => {
                    error!(instrument = %instrument, error = %e, "ALERT: order open failed after retries");
                }
                AlertEvent::OpenAmbiguous { instrument, error: e } => {
                    error!(
                        instrument = %instrument,
                        error = %e,
                        "ALERT: open outcome unknown — reconcile against broker positions"
                    );
                }
                AlertEvent::CloseRetriesExhausted { position_id, instrument, error: e } => {
                    error!(
                        position_id = %position_id,
                        instrument = %instrument,
                        error = %e,
                        "ALERT: close retries exhausted — position left in CLOSING"
                    );
                }
                AlertEvent::ExternalClose { position_id, ticket } => {
                    warn!(
                        position_id = %position_id,
                        ticket = %ticket,
                        "ALERT: broker-side position gone — closed as external"
                    );
                }
            }
        }
    });

    // ── Control API ───────────────────────────────────────────────────────────
    let api_state = api::AppState {
        db: db.clone(),
        command_tx: {
            let (tx, mut rx) = mpsc::channel::<CoreCommand>(32);
            let handle = core_handle.clone();
            tokio::spawn(async move {
                while let Some(cmd) = rx.recv().await {
                    handle.send(cmd).await;
                }
            });
            tx
        },
        core_state: core_state.clone(),
        status: status.clone(),
        run_mode: cfg.run_mode,
        control_token: cfg.control_token.clone(),
        account: cfg.account_id.clone(),
    };

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    let port = cfg.control_port;
    tokio::spawn(core.run());
    let collector_task = tokio::spawn(collector.run());
    let generator_task = tokio::spawn(generator.run());
    let executor_task = tokio::spawn(executor.run());
    tokio::spawn(api::serve(api_state, port));

    if cfg.auto_start {
        core_handle.send(CoreCommand::Start).await;
    }

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await.unwrap();
    info!("Shutdown signal received — draining actors");

    // Let in-flight broker calls complete or time out before exit.
    let _ = shutdown_tx.send(true);
    let drain = async {
        let _ = collector_task.await;
        let _ = generator_task.await;
        let _ = executor_task.await;
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!("Actors did not drain within the grace period — exiting anyway");
    }
    info!("Shutdown complete");
}
