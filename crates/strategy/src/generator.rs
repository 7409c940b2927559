use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};

use common::clients::AdvisoryClient;
use common::{CoreState, Direction, Signal, StatusHandle, StrategyKind, TradingMode};

use market::SnapshotStore;

use crate::profile::StrategyProfile;
use crate::regime::classify_regime;
use crate::scoring::score;

/// Timeout on one advisory evaluation. The advisory service is optional;
/// a slow or failing call degrades to zero sentiment, never a stall.
const ADVISORY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub interval: Duration,
    pub account: String,
    pub trading_mode: TradingMode,
    pub news_windows: Vec<(NaiveTime, NaiveTime)>,
    /// Snapshots older than this are skipped (default 3× collector interval).
    pub snapshot_max_age: chrono::Duration,
}

/// Periodic actor that evaluates every enabled (strategy, instrument) pair
/// against the latest snapshot and pushes accepted signals into the pending
/// queue, FIFO.
pub struct SignalGenerator {
    snapshots: SnapshotStore,
    profiles: Vec<StrategyProfile>,
    instruments: Vec<String>,
    advisory: Option<Arc<dyn AdvisoryClient>>,
    signal_tx: mpsc::Sender<Signal>,
    core_state: Arc<RwLock<CoreState>>,
    stats: StatusHandle,
    shutdown: watch::Receiver<bool>,
    cfg: GeneratorConfig,
    /// Last evaluation time per (strategy, instrument), for the per-pair
    /// generation cooldown.
    last_evaluated: HashMap<(StrategyKind, String), DateTime<Utc>>,
}

impl SignalGenerator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        snapshots: SnapshotStore,
        profiles: Vec<StrategyProfile>,
        instruments: Vec<String>,
        advisory: Option<Arc<dyn AdvisoryClient>>,
        signal_tx: mpsc::Sender<Signal>,
        core_state: Arc<RwLock<CoreState>>,
        stats: StatusHandle,
        shutdown: watch::Receiver<bool>,
        cfg: GeneratorConfig,
    ) -> Self {
        Self {
            snapshots,
            profiles,
            instruments,
            advisory,
            signal_tx,
            core_state,
            stats,
            shutdown,
            cfg,
            last_evaluated: HashMap::new(),
        }
    }

    /// Run the generator loop. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!(
            strategies = self.profiles.len(),
            instruments = self.instruments.len(),
            "SignalGenerator running"
        );
        let mut ticker = tokio::time::interval(self.cfg.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let state = *self.core_state.read().await;
                    if state != CoreState::Running {
                        continue; // suppress signal generation while paused/stopped
                    }
                    self.tick().await;
                }
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("SignalGenerator shutting down");
                        return;
                    }
                }
            }
        }
    }

    async fn tick(&mut self) {
        self.stats.record_run().await;
        let now = Utc::now();

        // One advisory call per instrument per tick, shared across strategies.
        let sentiment = self.fetch_sentiment().await;

        for instrument in self.instruments.clone() {
            let Some(snapshot) = self
                .snapshots
                .get_fresh(&instrument, self.cfg.snapshot_max_age)
                .await
            else {
                // Fail-safe: no data, no decision.
                debug!(instrument = %instrument, "Skipping pair with stale or missing snapshot");
                continue;
            };

            let regime = classify_regime(&snapshot.indicators, &self.cfg.news_windows, now);
            let adjustment = sentiment.get(&instrument).copied().unwrap_or(0.0);

            for profile in &self.profiles {
                let key = (profile.kind, instrument.clone());
                let cooldown = chrono::Duration::seconds(profile.generation_cooldown_secs);
                if let Some(last) = self.last_evaluated.get(&key) {
                    if now - *last < cooldown {
                        continue;
                    }
                }
                self.last_evaluated.insert(key, now);

                let Some(candidate) = score(
                    &snapshot,
                    profile,
                    regime,
                    adjustment,
                    self.cfg.trading_mode,
                ) else {
                    continue;
                };

                let signal = Signal {
                    id: uuid::Uuid::new_v4().to_string(),
                    account: self.cfg.account.clone(),
                    instrument: instrument.clone(),
                    strategy: profile.kind,
                    direction: candidate.direction,
                    confidence: candidate.confidence,
                    pillars: candidate.pillars,
                    generated_at: now,
                };

                info!(
                    instrument = %signal.instrument,
                    strategy = %signal.strategy,
                    direction = %signal.direction,
                    confidence = signal.confidence,
                    regime = ?regime,
                    "Signal generated"
                );

                if self.signal_tx.send(signal).await.is_err() {
                    warn!("Signal channel closed — stopping signal generator");
                    return;
                }
            }
        }
    }

    /// Advisory sentiment per instrument; zero contribution on absence,
    /// failure, or timeout.
    async fn fetch_sentiment(&self) -> HashMap<String, f64> {
        let mut out = HashMap::new();
        let Some(advisory) = &self.advisory else {
            return out;
        };
        for instrument in &self.instruments {
            let verdict = tokio::time::timeout(
                ADVISORY_TIMEOUT,
                advisory.evaluate(instrument, Direction::Buy),
            )
            .await;
            match verdict {
                Ok(Ok(v)) => {
                    out.insert(instrument.clone(), v.adjustment.clamp(-1.0, 1.0));
                }
                Ok(Err(e)) => {
                    debug!(instrument = %instrument, error = %e, "Advisory evaluation failed");
                }
                Err(_) => {
                    debug!(instrument = %instrument, "Advisory evaluation timed out");
                }
            }
        }
        out
    }
}
