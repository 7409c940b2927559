use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use common::MarketSnapshot;

/// Shared store of the latest snapshot per instrument.
///
/// Many readers, one writer per instrument (the collector), last-write-wins.
/// Readers decide staleness by snapshot age; a failed fetch simply leaves
/// the previous snapshot in place.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<HashMap<String, MarketSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the snapshot for the instrument.
    pub async fn replace(&self, snapshot: MarketSnapshot) {
        self.inner
            .write()
            .await
            .insert(snapshot.instrument.clone(), snapshot);
    }

    pub async fn get(&self, instrument: &str) -> Option<MarketSnapshot> {
        self.inner.read().await.get(instrument).cloned()
    }

    /// Latest snapshot only if it is younger than `max_age`.
    pub async fn get_fresh(&self, instrument: &str, max_age: Duration) -> Option<MarketSnapshot> {
        let now = Utc::now();
        self.inner
            .read()
            .await
            .get(instrument)
            .filter(|s| !s.is_stale(max_age, now))
            .cloned()
    }

    /// Latest price regardless of freshness, for display purposes.
    pub async fn latest_price(&self, instrument: &str) -> Option<f64> {
        self.inner.read().await.get(instrument).map(|s| s.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::compute_indicator_set;

    fn make_snapshot(instrument: &str, price: f64, age_secs: i64) -> MarketSnapshot {
        let closes: Vec<f64> = (0..80).map(|i| price + (i as f64 * 0.2).sin()).collect();
        MarketSnapshot {
            instrument: instrument.to_string(),
            price,
            indicators: compute_indicator_set(&closes).unwrap(),
            fetched_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn replace_supersedes_prior_snapshot() {
        let store = SnapshotStore::new();
        store.replace(make_snapshot("GOLD", 1900.0, 0)).await;
        store.replace(make_snapshot("GOLD", 1910.0, 0)).await;
        assert_eq!(store.latest_price("GOLD").await, Some(1910.0));
    }

    #[tokio::test]
    async fn stale_snapshot_filtered_by_get_fresh() {
        let store = SnapshotStore::new();
        store.replace(make_snapshot("GOLD", 1900.0, 600)).await;
        assert!(store.get_fresh("GOLD", Duration::seconds(180)).await.is_none());
        assert!(store.get("GOLD").await.is_some());
    }
}
