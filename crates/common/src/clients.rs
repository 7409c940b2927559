use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{AccountRiskState, AdvisoryVerdict, BrokerPosition, Direction, OpenRequest, Result};

/// Abstraction over the execution service.
///
/// The HTTP gateway client implements this for live trading and
/// `PaperExecutionClient` implements it for simulation. Only the order
/// executor holds a `dyn ExecutionClient`; all order flow passes the risk
/// gates before reaching it.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Open a position and return the broker ticket id.
    async fn open_position(&self, request: &OpenRequest) -> Result<String>;

    /// Close the position identified by the broker ticket.
    async fn close_position(&self, ticket: &str) -> Result<()>;

    /// Broker-side open positions for the account.
    async fn list_open_positions(&self, account: &str) -> Result<Vec<BrokerPosition>>;

    /// Current balance / equity / margin for the account.
    async fn get_account(&self, account: &str) -> Result<AccountRiskState>;
}

/// A single price observation from the market-data collaborator.
#[derive(Debug, Clone, Copy)]
pub struct PriceQuote {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Abstraction over the market-data fetch mechanism.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn get_price(&self, instrument: &str) -> Result<PriceQuote>;

    /// Ordered close-price series, oldest first, at most `lookback` values.
    async fn get_history(&self, instrument: &str, lookback: usize) -> Result<Vec<f64>>;
}

/// Optional natural-language advisory collaborator. Failure or absence
/// falls back to a zero sentiment contribution.
#[async_trait]
pub trait AdvisoryClient: Send + Sync {
    async fn evaluate(&self, instrument: &str, direction: Direction) -> Result<AdvisoryVerdict>;
}
