use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use common::{CloseReason, Position, PositionStatus, Result, StrategyKind};

const POSITION_COLUMNS: &str = "id, account, instrument, direction, entry_price, quantity, \
     stop_loss, take_profit, strategy, status, close_reason, ticket, peak_profit, \
     opened_at, closed_at";

/// Authoritative record of open and closed positions.
///
/// A single logical owner (the executor/monitor task) performs all writes
/// for a given position id; the count queries are read-only aggregations
/// used by the risk gates.
#[derive(Clone)]
pub struct PositionStore {
    pool: SqlitePool,
}

impl PositionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, position: &Position) -> Result<()> {
        sqlx::query(
            "INSERT INTO positions (id, account, instrument, direction, entry_price, quantity, \
             stop_loss, take_profit, strategy, status, close_reason, ticket, peak_profit, \
             opened_at, closed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&position.id)
        .bind(&position.account)
        .bind(&position.instrument)
        .bind(position.direction)
        .bind(position.entry_price)
        .bind(position.quantity)
        .bind(position.stop_loss)
        .bind(position.take_profit)
        .bind(position.strategy)
        .bind(position.status)
        .bind(position.close_reason)
        .bind(&position.ticket)
        .bind(position.peak_profit)
        .bind(position.opened_at)
        .bind(position.closed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All OPEN positions for the account.
    pub async fn open_positions(&self, account: &str) -> Result<Vec<Position>> {
        let rows = sqlx::query_as::<_, Position>(&format!(
            "SELECT {POSITION_COLUMNS} FROM positions \
             WHERE account = ? AND status = ? ORDER BY opened_at"
        ))
        .bind(account)
        .bind(PositionStatus::Open)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// OPEN and CLOSING positions, for monitoring and restart resume.
    pub async fn resumable_positions(&self, account: &str) -> Result<Vec<Position>> {
        let rows = sqlx::query_as::<_, Position>(&format!(
            "SELECT {POSITION_COLUMNS} FROM positions \
             WHERE account = ? AND status IN (?, ?) ORDER BY opened_at"
        ))
        .bind(account)
        .bind(PositionStatus::Open)
        .bind(PositionStatus::Closing)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// OPEN positions for the exact (account, instrument, strategy) key.
    pub async fn count_open_for_resource(
        &self,
        account: &str,
        instrument: &str,
        strategy: StrategyKind,
    ) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM positions \
             WHERE account = ? AND instrument = ? AND strategy = ? AND status = ?",
        )
        .bind(account)
        .bind(instrument)
        .bind(strategy)
        .bind(PositionStatus::Open)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }

    /// OPEN positions for (account, strategy) across all instruments.
    pub async fn count_open_for_strategy(
        &self,
        account: &str,
        strategy: StrategyKind,
    ) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM positions \
             WHERE account = ? AND strategy = ? AND status = ?",
        )
        .bind(account)
        .bind(strategy)
        .bind(PositionStatus::Open)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }

    /// Raise the stored peak profit. The guard in the WHERE clause keeps the
    /// column monotonic even if a stale value is passed in.
    pub async fn raise_peak_profit(&self, id: &str, peak_profit: f64) -> Result<()> {
        sqlx::query("UPDATE positions SET peak_profit = ? WHERE id = ? AND peak_profit < ?")
            .bind(peak_profit)
            .bind(id)
            .bind(peak_profit)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Transition OPEN → CLOSING, recording the pending close reason.
    pub async fn mark_closing(&self, id: &str, reason: CloseReason) -> Result<()> {
        sqlx::query("UPDATE positions SET status = ?, close_reason = ? WHERE id = ?")
            .bind(PositionStatus::Closing)
            .bind(reason)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Transition CLOSING → CLOSED once the broker confirmed the close.
    pub async fn mark_closed(&self, id: &str, closed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE positions SET status = ?, closed_at = ? WHERE id = ?")
            .bind(PositionStatus::Closed)
            .bind(closed_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        info!(position_id = %id, "Position closed");
        Ok(())
    }

    /// Close in one step, used by reconciliation when the broker side is
    /// already gone.
    pub async fn close_immediately(
        &self,
        id: &str,
        reason: CloseReason,
        closed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE positions SET status = ?, close_reason = ?, closed_at = ? WHERE id = ?",
        )
        .bind(PositionStatus::Closed)
        .bind(reason)
        .bind(closed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
