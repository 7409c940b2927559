use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use common::Result;

/// Cross-process locks preventing concurrent duplicate orders on one
/// (account, instrument) resource.
///
/// Acquisition is a single upsert whose conflict branch only fires when the
/// existing row has expired, so the check-and-claim is atomic at the
/// database statement level and remains correct across multiple processes.
/// A crashed owner's reservation simply times out.
#[derive(Clone)]
pub struct ReservationStore {
    pool: SqlitePool,
}

impl ReservationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Try to claim the resource for `owner_token` until `now + ttl`.
    /// Returns `false` when another non-expired reservation holds the key.
    pub async fn acquire(
        &self,
        resource_key: &str,
        owner_token: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let expires_at = now + ttl;
        let result = sqlx::query(
            "INSERT INTO reservations (resource_key, owner_token, created_at, expires_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(resource_key) DO UPDATE SET \
                 owner_token = excluded.owner_token, \
                 created_at = excluded.created_at, \
                 expires_at = excluded.expires_at \
             WHERE reservations.expires_at <= excluded.created_at",
        )
        .bind(resource_key)
        .bind(owner_token)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        let acquired = result.rows_affected() > 0;
        debug!(resource_key, owner_token, acquired, "Reservation acquire");
        Ok(acquired)
    }

    /// Release a reservation. Only the owner may release; a stale release
    /// after expiry-and-reclaim is a no-op.
    pub async fn release(&self, resource_key: &str, owner_token: &str) -> Result<()> {
        sqlx::query("DELETE FROM reservations WHERE resource_key = ? AND owner_token = ?")
            .bind(resource_key)
            .bind(owner_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop all expired reservations, e.g. after a crash-restart.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM reservations WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Minimum-elapsed-time record between successive position openings for the
/// same (account, instrument).
#[derive(Clone)]
pub struct CooldownStore {
    pool: SqlitePool,
}

impl CooldownStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record that a position was just opened for the resource.
    pub async fn touch(&self, resource_key: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO cooldowns (resource_key, last_opened_at) VALUES (?, ?) \
             ON CONFLICT(resource_key) DO UPDATE SET last_opened_at = excluded.last_opened_at",
        )
        .bind(resource_key)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Whether the cooldown window has elapsed for the resource. A resource
    /// with no record has never traded and is immediately eligible.
    pub async fn elapsed(
        &self,
        resource_key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let last: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT last_opened_at FROM cooldowns WHERE resource_key = ?")
                .bind(resource_key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match last {
            Some(last_opened_at) => now - last_opened_at >= window,
            None => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        // One connection: a pooled ":memory:" database is per-connection.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("../../migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn second_acquire_on_live_reservation_fails() {
        let store = ReservationStore::new(test_pool().await);
        let now = Utc::now();
        let ttl = Duration::seconds(30);

        assert!(store.acquire("ACC-1:GOLD", "owner-a", ttl, now).await.unwrap());
        assert!(!store.acquire("ACC-1:GOLD", "owner-b", ttl, now).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_acquires_yield_exactly_one_owner() {
        let store = ReservationStore::new(test_pool().await);
        let ttl = Duration::seconds(30);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .acquire("ACC-1:GOLD", &format!("owner-{i}"), ttl, Utc::now())
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1, "exactly one concurrent acquire may win");
    }

    #[tokio::test]
    async fn expired_reservation_is_reclaimable() {
        let store = ReservationStore::new(test_pool().await);
        let ttl = Duration::seconds(30);
        let past = Utc::now() - Duration::seconds(60);

        assert!(store.acquire("ACC-1:GOLD", "owner-a", ttl, past).await.unwrap());
        // owner-a's reservation expired 30s ago; owner-b may take over
        assert!(store.acquire("ACC-1:GOLD", "owner-b", ttl, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn release_is_owner_scoped() {
        let store = ReservationStore::new(test_pool().await);
        let now = Utc::now();
        let ttl = Duration::seconds(30);

        assert!(store.acquire("ACC-1:GOLD", "owner-a", ttl, now).await.unwrap());
        // Wrong owner: no-op, reservation still held
        store.release("ACC-1:GOLD", "owner-b").await.unwrap();
        assert!(!store.acquire("ACC-1:GOLD", "owner-c", ttl, now).await.unwrap());
        // Right owner: released, key free again
        store.release("ACC-1:GOLD", "owner-a").await.unwrap();
        assert!(store.acquire("ACC-1:GOLD", "owner-c", ttl, now).await.unwrap());
    }

    #[tokio::test]
    async fn purge_drops_only_expired_rows() {
        let store = ReservationStore::new(test_pool().await);
        let ttl = Duration::seconds(30);
        let past = Utc::now() - Duration::seconds(120);
        let now = Utc::now();

        store.acquire("ACC-1:GOLD", "stale", ttl, past).await.unwrap();
        store.acquire("ACC-1:SILVER", "live", ttl, now).await.unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(!store.acquire("ACC-1:SILVER", "other", ttl, now).await.unwrap());
    }

    #[tokio::test]
    async fn cooldown_blocks_until_window_elapses() {
        let store = CooldownStore::new(test_pool().await);
        let window = Duration::minutes(15);
        let now = Utc::now();

        // Never traded: eligible
        assert!(store.elapsed("ACC-1:GOLD", window, now).await.unwrap());

        store.touch("ACC-1:GOLD", now).await.unwrap();
        assert!(!store.elapsed("ACC-1:GOLD", window, now + Duration::minutes(5)).await.unwrap());
        assert!(store.elapsed("ACC-1:GOLD", window, now + Duration::minutes(15)).await.unwrap());
    }
}
