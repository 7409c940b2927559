use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc, Weekday};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, error, info, warn};

use common::{
    resource_key, AlertEvent, CloseReason, CoreState, Direction, ExecutionClient, OpenRequest,
    Position, PositionStatus, RejectReason, Signal, StatusHandle,
};
use market::SnapshotStore;
use risk::{gate, size, GateInput, SizingInput};
use strategy::StrategyProfile;

use crate::reservation::{CooldownStore, ReservationStore};
use crate::store::PositionStore;

/// Signals consumed from the pending queue per tick.
const MAX_SIGNALS_PER_TICK: usize = 16;

/// Open attempts against the broker before giving up on a signal.
const OPEN_RETRIES: u32 = 3;

/// Close attempts (one per tick) before escalating to an operator alert.
const CLOSE_RETRIES: u32 = 5;

/// Timeout on any single broker call.
const BROKER_TIMEOUT: Duration = Duration::from_secs(15);

/// Base delay for open-retry backoff; doubles per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub interval: Duration,
    pub account: String,
    /// Monetary value of one price unit per quantity unit.
    pub tick_value: f64,
    pub max_portfolio_risk_pct: f64,
    pub trade_cooldown: chrono::Duration,
    pub signal_max_age: chrono::Duration,
    pub reservation_ttl: chrono::Duration,
    pub snapshot_max_age: chrono::Duration,
    /// Fraction of peak profit that may retrace before a drawdown exit.
    pub peak_drawdown_threshold: f64,
    pub session_end_hour_utc: u32,
    pub session_close_window: chrono::Duration,
}

/// Drains the pending signal queue (gate → reserve → open) and monitors
/// open positions for automatic closure, on one periodic tick.
///
/// This is the only component that calls the execution collaborator, and
/// the single logical owner of every position row it manages.
pub struct OrderExecutor {
    signal_rx: mpsc::Receiver<Signal>,
    execution: Arc<dyn ExecutionClient>,
    snapshots: SnapshotStore,
    positions: PositionStore,
    reservations: ReservationStore,
    cooldowns: CooldownStore,
    profiles: HashMap<common::StrategyKind, StrategyProfile>,
    alert_tx: mpsc::Sender<AlertEvent>,
    core_state: Arc<RwLock<CoreState>>,
    stats: StatusHandle,
    shutdown: watch::Receiver<bool>,
    cfg: ExecutorConfig,
    /// Close attempts per position id, for bounded retry.
    close_attempts: HashMap<String, u32>,
    /// Positions whose close retries are exhausted; left in CLOSING until
    /// restart/reconciliation, never silently dropped.
    close_abandoned: HashSet<String>,
}

impl OrderExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        signal_rx: mpsc::Receiver<Signal>,
        execution: Arc<dyn ExecutionClient>,
        snapshots: SnapshotStore,
        positions: PositionStore,
        reservations: ReservationStore,
        cooldowns: CooldownStore,
        profiles: Vec<StrategyProfile>,
        alert_tx: mpsc::Sender<AlertEvent>,
        core_state: Arc<RwLock<CoreState>>,
        stats: StatusHandle,
        shutdown: watch::Receiver<bool>,
        cfg: ExecutorConfig,
    ) -> Self {
        Self {
            signal_rx,
            execution,
            snapshots,
            positions,
            reservations,
            cooldowns,
            profiles: profiles.into_iter().map(|p| (p.kind, p)).collect(),
            alert_tx,
            core_state,
            stats,
            shutdown,
            cfg,
            close_attempts: HashMap::new(),
            close_abandoned: HashSet::new(),
        }
    }

    /// Run the executor loop. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!(account = %self.cfg.account, "OrderExecutor running");

        if let Err(e) = self.resume().await {
            error!(error = %e, "Startup reconciliation failed");
            self.stats.record_error().await;
        }

        let mut ticker = tokio::time::interval(self.cfg.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let state = *self.core_state.read().await;
                    if state != CoreState::Running {
                        continue;
                    }
                    self.tick().await;
                }
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("OrderExecutor shutting down");
                        return;
                    }
                }
            }
        }
    }

    async fn tick(&mut self) {
        self.stats.record_run().await;
        self.drain_signals().await;
        self.monitor_positions().await;
        self.retry_pending_closes().await;
    }

    // ── Open path ─────────────────────────────────────────────────────────

    async fn drain_signals(&mut self) {
        for _ in 0..MAX_SIGNALS_PER_TICK {
            match self.signal_rx.try_recv() {
                Ok(signal) => self.handle_signal(signal).await,
                Err(_) => break,
            }
        }
    }

    async fn handle_signal(&mut self, signal: Signal) {
        let now = Utc::now();
        if signal.is_stale(self.cfg.signal_max_age, now) {
            debug!(instrument = %signal.instrument, strategy = %signal.strategy, "Discarding stale signal");
            return;
        }

        let Some(profile) = self.profiles.get(&signal.strategy).cloned() else {
            warn!(strategy = %signal.strategy, "No profile for signal strategy — dropping");
            return;
        };

        // Entry price from the latest snapshot; no fresh data, no order.
        let Some(snapshot) = self
            .snapshots
            .get_fresh(&signal.instrument, self.cfg.snapshot_max_age)
            .await
        else {
            warn!(instrument = %signal.instrument, "Snapshot stale at execution time — dropping signal");
            return;
        };
        let entry_price = snapshot.price;

        let account_state = match tokio::time::timeout(
            BROKER_TIMEOUT,
            self.execution.get_account(&signal.account),
        )
        .await
        {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => {
                error!(error = %e, "Account state fetch failed — cannot gate signal");
                self.stats.record_error().await;
                return;
            }
            Err(_) => {
                error!("Account state fetch timed out — cannot gate signal");
                self.stats.record_error().await;
                return;
            }
        };

        let key = resource_key(&signal.account, &signal.instrument);
        let gate_input = match self.build_gate_input(&signal, &profile, &account_state, now).await {
            Ok(input) => input,
            Err(e) => {
                error!(error = %e, "Gate input query failed");
                self.stats.record_error().await;
                return;
            }
        };

        if let Err(reason) = gate(&GateInput {
            portfolio_risk_pct: gate_input.0,
            max_portfolio_risk_pct: self.cfg.max_portfolio_risk_pct,
            open_for_resource: gate_input.1,
            open_for_strategy: gate_input.2,
            cooldown_elapsed: gate_input.3,
            profile: &profile,
        }) {
            self.log_rejection(&signal, reason);
            return;
        }

        let plan = size(&SizingInput {
            confidence: signal.confidence,
            direction: signal.direction,
            entry_price,
            balance: account_state.balance,
            tick_value: self.cfg.tick_value,
            profile: &profile,
        });
        if plan.quantity <= 0.0 {
            warn!(instrument = %signal.instrument, "Sized quantity is zero — dropping signal");
            return;
        }

        // Cross-process duplicate guard around the broker call.
        let owner_token = uuid::Uuid::new_v4().to_string();
        let acquired = match self
            .reservations
            .acquire(&key, &owner_token, self.cfg.reservation_ttl, now)
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                error!(error = %e, "Reservation acquire failed");
                self.stats.record_error().await;
                return;
            }
        };
        if !acquired {
            // Another process is opening on this resource right now.
            self.log_rejection(&signal, RejectReason::ReservationConflict);
            return;
        }

        let request = OpenRequest {
            account: signal.account.clone(),
            instrument: signal.instrument.clone(),
            direction: signal.direction,
            quantity: plan.quantity,
            stop_loss: plan.stop_loss,
            take_profit: plan.take_profit,
        };

        match self.open_with_retry(&request).await {
            Some(ticket) => {
                let position = Position {
                    id: uuid::Uuid::new_v4().to_string(),
                    account: signal.account.clone(),
                    instrument: signal.instrument.clone(),
                    direction: signal.direction,
                    entry_price,
                    quantity: plan.quantity,
                    stop_loss: plan.stop_loss,
                    take_profit: plan.take_profit,
                    strategy: signal.strategy,
                    status: PositionStatus::Open,
                    close_reason: None,
                    ticket,
                    peak_profit: 0.0,
                    opened_at: Utc::now(),
                    closed_at: None,
                };

                info!(
                    instrument = %position.instrument,
                    direction = %position.direction,
                    quantity = position.quantity,
                    entry = position.entry_price,
                    risk_pct = plan.risk_pct,
                    strategy = %position.strategy,
                    "Position opened"
                );

                if let Err(e) = self.positions.insert(&position).await {
                    error!(error = %e, "Failed to persist opened position");
                    self.stats.record_error().await;
                }
                if let Err(e) = self.cooldowns.touch(&key, Utc::now()).await {
                    error!(error = %e, "Failed to record cooldown");
                    self.stats.record_error().await;
                }
            }
            None => {
                self.stats.record_error().await;
            }
        }

        if let Err(e) = self.reservations.release(&key, &owner_token).await {
            error!(error = %e, "Reservation release failed");
        }
    }

    async fn build_gate_input(
        &self,
        signal: &Signal,
        _profile: &StrategyProfile,
        account_state: &common::AccountRiskState,
        now: DateTime<Utc>,
    ) -> common::Result<(f64, u32, u32, bool)> {
        let key = resource_key(&signal.account, &signal.instrument);
        let open_for_resource = self
            .positions
            .count_open_for_resource(&signal.account, &signal.instrument, signal.strategy)
            .await?;
        let open_for_strategy = self
            .positions
            .count_open_for_strategy(&signal.account, signal.strategy)
            .await?;
        let cooldown_elapsed = self
            .cooldowns
            .elapsed(&key, self.cfg.trade_cooldown, now)
            .await?;
        Ok((
            account_state.portfolio_risk_percent(),
            open_for_resource,
            open_for_strategy,
            cooldown_elapsed,
        ))
    }

    /// Bounded open retry with backoff. A timeout is ambiguous (the broker
    /// may have accepted the order) and is never retried; it is escalated
    /// for reconciliation instead.
    async fn open_with_retry(&self, request: &OpenRequest) -> Option<String> {
        let mut delay = RETRY_BASE_DELAY;
        for attempt in 1..=OPEN_RETRIES {
            match tokio::time::timeout(BROKER_TIMEOUT, self.execution.open_position(request)).await
            {
                Ok(Ok(ticket)) => return Some(ticket),
                Ok(Err(e)) => {
                    warn!(
                        instrument = %request.instrument,
                        attempt,
                        error = %e,
                        "Open attempt failed"
                    );
                    if attempt == OPEN_RETRIES {
                        let _ = self
                            .alert_tx
                            .send(AlertEvent::OpenFailed {
                                instrument: request.instrument.clone(),
                                error: e.to_string(),
                            })
                            .await;
                        return None;
                    }
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(_) => {
                    error!(instrument = %request.instrument, "Open call timed out — possible broker-side fill");
                    let _ = self
                        .alert_tx
                        .send(AlertEvent::OpenAmbiguous {
                            instrument: request.instrument.clone(),
                            error: "open call timed out".into(),
                        })
                        .await;
                    return None;
                }
            }
        }
        None
    }

    fn log_rejection(&self, signal: &Signal, reason: RejectReason) {
        info!(
            instrument = %signal.instrument,
            strategy = %signal.strategy,
            confidence = signal.confidence,
            reason = %reason,
            "Signal rejected"
        );
    }

    // ── Monitor path ──────────────────────────────────────────────────────

    async fn monitor_positions(&mut self) {
        let open = match self.positions.open_positions(&self.cfg.account).await {
            Ok(open) => open,
            Err(e) => {
                error!(error = %e, "Open-position query failed");
                self.stats.record_error().await;
                return;
            }
        };

        for position in open {
            let Some(snapshot) = self
                .snapshots
                .get_fresh(&position.instrument, self.cfg.snapshot_max_age)
                .await
            else {
                debug!(instrument = %position.instrument, "No fresh price for monitoring — skipping");
                continue;
            };
            let price = snapshot.price;

            let current_profit = position.unrealized_profit(price);
            let peak_profit = position.peak_profit.max(current_profit);
            if peak_profit > position.peak_profit {
                if let Err(e) = self.positions.raise_peak_profit(&position.id, peak_profit).await {
                    error!(error = %e, "Peak-profit update failed");
                    self.stats.record_error().await;
                }
            }

            let profile = self
                .profiles
                .get(&position.strategy)
                .cloned()
                .unwrap_or_else(|| StrategyProfile::defaults_for(position.strategy));

            let decision = close_decision(
                &position,
                &profile,
                &self.cfg,
                price,
                current_profit,
                peak_profit,
                Utc::now(),
            );

            if let Some(reason) = decision {
                info!(
                    instrument = %position.instrument,
                    position_id = %position.id,
                    reason = %reason,
                    profit = current_profit,
                    "Close condition met"
                );
                if let Err(e) = self.positions.mark_closing(&position.id, reason).await {
                    error!(error = %e, "Failed to mark position closing");
                    self.stats.record_error().await;
                    continue;
                }
                self.attempt_close(&position.id, &position.ticket, &position.instrument)
                    .await;
            }
        }
    }

    /// Retry broker closes for positions stuck in CLOSING, one attempt per
    /// tick, bounded by CLOSE_RETRIES.
    async fn retry_pending_closes(&mut self) {
        let resumable = match self.positions.resumable_positions(&self.cfg.account).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "Closing-position query failed");
                return;
            }
        };

        for position in resumable
            .into_iter()
            .filter(|p| p.status == PositionStatus::Closing)
        {
            if self.close_abandoned.contains(&position.id) {
                continue;
            }
            if self.close_attempts.get(&position.id).copied().unwrap_or(0) == 0 {
                // First attempt happened inline in monitor_positions; rows we
                // see here were left over from a failed attempt or a restart.
                self.close_attempts.insert(position.id.clone(), 1);
            }
            self.attempt_close(&position.id, &position.ticket, &position.instrument)
                .await;
        }
    }

    async fn attempt_close(&mut self, position_id: &str, ticket: &str, instrument: &str) {
        match tokio::time::timeout(BROKER_TIMEOUT, self.execution.close_position(ticket)).await {
            Ok(Ok(())) => {
                if let Err(e) = self.positions.mark_closed(position_id, Utc::now()).await {
                    error!(error = %e, "Failed to mark position closed");
                    self.stats.record_error().await;
                    return;
                }
                self.close_attempts.remove(position_id);
            }
            outcome => {
                let err_text = match outcome {
                    Ok(Err(e)) => e.to_string(),
                    _ => "close call timed out".to_string(),
                };
                let attempts = self.close_attempts.entry(position_id.to_string()).or_insert(0);
                *attempts += 1;
                warn!(
                    position_id = %position_id,
                    attempts = *attempts,
                    error = %err_text,
                    "Close attempt failed — will retry next tick"
                );
                if *attempts >= CLOSE_RETRIES {
                    // Position stays CLOSING (last-known-safe state); never
                    // reopened, never silently dropped.
                    self.close_abandoned.insert(position_id.to_string());
                    let _ = self
                        .alert_tx
                        .send(AlertEvent::CloseRetriesExhausted {
                            position_id: position_id.to_string(),
                            instrument: instrument.to_string(),
                            error: err_text,
                        })
                        .await;
                }
            }
        }
    }

    // ── Restart resume ────────────────────────────────────────────────────

    /// Re-read persisted state and reconcile against the broker, keyed by
    /// ticket. Positions the broker no longer knows are closed as External.
    async fn resume(&mut self) -> common::Result<()> {
        let purged = self.reservations.purge_expired(Utc::now()).await?;
        if purged > 0 {
            info!(purged, "Purged expired reservations on startup");
        }

        let resumable = self.positions.resumable_positions(&self.cfg.account).await?;
        if resumable.is_empty() {
            return Ok(());
        }
        info!(count = resumable.len(), "Resuming persisted positions");

        let broker_side = match tokio::time::timeout(
            BROKER_TIMEOUT,
            self.execution.list_open_positions(&self.cfg.account),
        )
        .await
        {
            Ok(Ok(list)) => list,
            Ok(Err(e)) => {
                warn!(error = %e, "Broker position listing failed — reconciliation deferred");
                return Ok(());
            }
            Err(_) => {
                warn!("Broker position listing timed out — reconciliation deferred");
                return Ok(());
            }
        };
        let live_tickets: HashSet<String> =
            broker_side.into_iter().map(|p| p.ticket).collect();

        for position in resumable {
            if !live_tickets.contains(&position.ticket) {
                warn!(
                    position_id = %position.id,
                    ticket = %position.ticket,
                    "Broker-side position gone — closing as external"
                );
                self.positions
                    .close_immediately(&position.id, CloseReason::External, Utc::now())
                    .await?;
                let _ = self
                    .alert_tx
                    .send(AlertEvent::ExternalClose {
                        position_id: position.id.clone(),
                        ticket: position.ticket.clone(),
                    })
                    .await;
            }
        }
        Ok(())
    }
}

// ─── Close rules ──────────────────────────────────────────────────────────────

/// Evaluate the close conditions in priority order; first match wins.
/// Pure so every rule is unit-testable against fixed clocks and prices.
pub fn close_decision(
    position: &Position,
    profile: &StrategyProfile,
    cfg: &ExecutorConfig,
    price: f64,
    current_profit: f64,
    peak_profit: f64,
    now: DateTime<Utc>,
) -> Option<CloseReason> {
    // 1. Take-profit / stop-loss price touched.
    match position.direction {
        Direction::Buy => {
            if price >= position.take_profit {
                return Some(CloseReason::TakeProfit);
            }
            if price <= position.stop_loss {
                return Some(CloseReason::StopLoss);
            }
        }
        Direction::Sell => {
            if price <= position.take_profit {
                return Some(CloseReason::TakeProfit);
            }
            if price >= position.stop_loss {
                return Some(CloseReason::StopLoss);
            }
        }
    }

    let age = position.age(now);

    // 2. Trailing stop: engaged once peak profit clears the activation
    // level, closes when price retraces the trailing distance off the peak.
    if let Some(trailing_pct) = profile.trailing_stop_pct {
        let notional = position.entry_price * position.quantity;
        let engaged = peak_profit > 0.0 && peak_profit >= profile.trailing_activation_pct * notional;
        if engaged && position.quantity > 0.0 {
            let retrace_per_unit = (peak_profit - current_profit) / position.quantity;
            if retrace_per_unit >= trailing_pct * position.entry_price {
                return Some(CloseReason::TrailingStop);
            }
        }
    }

    // 3. Peak drawdown. Only ever fires on a position still in profit.
    if current_profit > 0.0
        && peak_profit > 0.0
        && age >= chrono::Duration::seconds(profile.min_hold_secs)
        && (peak_profit - current_profit) / peak_profit >= cfg.peak_drawdown_threshold
    {
        return Some(CloseReason::PeakDrawdown);
    }

    // 4. Time-based exit.
    if age >= chrono::Duration::seconds(profile.time_exit_secs) {
        return Some(CloseReason::TimeExit);
    }

    // 5. Session boundaries, profitable positions only.
    if near_session_end(now, cfg) && current_profit > 0.0 {
        if now.weekday() == Weekday::Fri {
            return Some(CloseReason::WeekClose);
        }
        if profile.intraday {
            return Some(CloseReason::SessionClose);
        }
    }

    None
}

/// Within the configured window before today's session end.
fn near_session_end(now: DateTime<Utc>, cfg: &ExecutorConfig) -> bool {
    let Some(end) = now
        .date_naive()
        .and_hms_opt(cfg.session_end_hour_utc, 0, 0)
        .map(|t| t.and_utc())
    else {
        return false;
    };
    now <= end && end - now <= cfg.session_close_window
}
