use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use common::clients::MarketDataProvider;
use common::{MarketSnapshot, Result, StatusHandle};

use crate::indicators::compute_indicator_set;
use crate::snapshot::SnapshotStore;

/// Bars of history requested per refresh; enough for the slowest indicator
/// plus the volatility baseline.
const HISTORY_LOOKBACK: usize = 120;

/// Per-instrument fetches in flight at once.
const FETCH_CONCURRENCY: usize = 4;

/// Timeout on a single instrument refresh (price + history).
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Periodic actor that refreshes market snapshots for all enabled
/// instruments. One instrument's failure never blocks the others; a failed
/// fetch leaves the prior snapshot in place, which readers treat as stale
/// once its age exceeds their freshness threshold.
pub struct MarketDataCollector {
    provider: Arc<dyn MarketDataProvider>,
    store: SnapshotStore,
    instruments: Vec<String>,
    interval: Duration,
    stats: StatusHandle,
    shutdown: watch::Receiver<bool>,
}

impl MarketDataCollector {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        store: SnapshotStore,
        instruments: Vec<String>,
        interval: Duration,
        stats: StatusHandle,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            provider,
            store,
            instruments,
            interval,
            stats,
            shutdown,
        }
    }

    /// Run the collector loop. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!(
            instruments = ?self.instruments,
            interval = ?self.interval,
            "MarketDataCollector running"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("MarketDataCollector shutting down");
                        return;
                    }
                }
            }
        }
    }

    async fn tick(&self) {
        self.stats.record_run().await;

        let results: Vec<(String, Result<()>)> = stream::iter(self.instruments.clone())
            .map(|instrument| async move {
                let outcome = tokio::time::timeout(FETCH_TIMEOUT, self.refresh_one(&instrument))
                    .await
                    .unwrap_or_else(|_| {
                        Err(common::Error::Http(format!(
                            "market data fetch for {instrument} timed out"
                        )))
                    });
                (instrument, outcome)
            })
            .buffer_unordered(FETCH_CONCURRENCY)
            .collect()
            .await;

        for (instrument, outcome) in results {
            if let Err(e) = outcome {
                // Prior snapshot stays in place; readers will see it go stale.
                warn!(instrument = %instrument, error = %e, "Snapshot refresh failed");
                self.stats.record_error().await;
            }
        }
    }

    async fn refresh_one(&self, instrument: &str) -> Result<()> {
        let closes = self.provider.get_history(instrument, HISTORY_LOOKBACK).await?;
        let quote = self.provider.get_price(instrument).await?;

        let mut series = closes;
        series.push(quote.price);

        let indicators = compute_indicator_set(&series).ok_or_else(|| {
            common::Error::Other(format!(
                "insufficient history for {instrument}: {} bars",
                series.len()
            ))
        })?;

        let snapshot = MarketSnapshot {
            instrument: instrument.to_string(),
            price: quote.price,
            indicators,
            fetched_at: Utc::now(),
        };

        debug!(instrument = %instrument, price = quote.price, "Snapshot refreshed");
        self.store.replace(snapshot).await;
        Ok(())
    }
}
