use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    AccountRiskState, BrokerPosition, Direction, Error, ExecutionClient, OpenRequest, Result,
};

/// Margin locked per unit of notional on a simulated open.
const MARGIN_RATE: f64 = 0.1;

/// Simulated execution client for paper mode.
///
/// Fills at the latest known price with configurable slippage; closes
/// realize PnL into the simulated balance. No real orders leave the process.
pub struct PaperExecutionClient {
    balance: Arc<RwLock<f64>>,
    margin_used: Arc<RwLock<f64>>,
    /// Open simulated positions, keyed by ticket.
    positions: Arc<RwLock<HashMap<String, PaperPosition>>>,
    /// Latest known price per instrument, updated via `update_price`.
    prices: Arc<RwLock<HashMap<String, f64>>>,
    /// Slippage in basis points applied to all fills.
    slippage_bps: f64,
}

#[derive(Debug, Clone)]
struct PaperPosition {
    instrument: String,
    direction: Direction,
    entry_price: f64,
    quantity: f64,
}

impl PaperExecutionClient {
    pub fn new(initial_balance: f64, slippage_bps: f64) -> Self {
        info!(
            balance = initial_balance,
            slippage_bps = slippage_bps,
            "PaperExecutionClient initialized"
        );
        Self {
            balance: Arc::new(RwLock::new(initial_balance)),
            margin_used: Arc::new(RwLock::new(0.0)),
            positions: Arc::new(RwLock::new(HashMap::new())),
            prices: Arc::new(RwLock::new(HashMap::new())),
            slippage_bps,
        }
    }

    /// Update the latest price for an instrument (fed from the snapshot store).
    pub async fn update_price(&self, instrument: &str, price: f64) {
        self.prices.write().await.insert(instrument.to_string(), price);
    }

    async fn mid_price(&self, instrument: &str) -> Result<f64> {
        self.prices
            .read()
            .await
            .get(instrument)
            .copied()
            .ok_or_else(|| {
                Error::Broker(format!(
                    "paper client has no price for '{instrument}' — ensure snapshots are flowing"
                ))
            })
    }

    fn filled(&self, mid: f64, direction: Direction) -> f64 {
        // Buys pay up, sells receive less
        match direction {
            Direction::Buy => mid * (1.0 + self.slippage_bps / 10_000.0),
            Direction::Sell => mid * (1.0 - self.slippage_bps / 10_000.0),
        }
    }
}

#[async_trait]
impl ExecutionClient for PaperExecutionClient {
    async fn open_position(&self, request: &OpenRequest) -> Result<String> {
        let mid = self.mid_price(&request.instrument).await?;
        let fill_price = self.filled(mid, request.direction);
        let ticket = uuid::Uuid::new_v4().to_string();

        debug!(
            instrument = %request.instrument,
            direction = %request.direction,
            mid = mid,
            fill = fill_price,
            qty = request.quantity,
            "Paper fill simulated"
        );

        *self.margin_used.write().await += fill_price * request.quantity * MARGIN_RATE;
        self.positions.write().await.insert(
            ticket.clone(),
            PaperPosition {
                instrument: request.instrument.clone(),
                direction: request.direction,
                entry_price: fill_price,
                quantity: request.quantity,
            },
        );

        Ok(ticket)
    }

    async fn close_position(&self, ticket: &str) -> Result<()> {
        let position = self
            .positions
            .write()
            .await
            .remove(ticket)
            .ok_or_else(|| Error::Broker(format!("unknown paper ticket '{ticket}'")))?;

        let mid = self.mid_price(&position.instrument).await?;
        let exit_price = self.filled(mid, position.direction.opposite());

        let pnl = match position.direction {
            Direction::Buy => (exit_price - position.entry_price) * position.quantity,
            Direction::Sell => (position.entry_price - exit_price) * position.quantity,
        };

        *self.balance.write().await += pnl;
        *self.margin_used.write().await -=
            position.entry_price * position.quantity * MARGIN_RATE;

        debug!(ticket = %ticket, pnl = pnl, "Paper position closed");
        Ok(())
    }

    async fn list_open_positions(&self, _account: &str) -> Result<Vec<BrokerPosition>> {
        let prices = self.prices.read().await;
        let positions = self.positions.read().await;
        Ok(positions
            .iter()
            .map(|(ticket, p)| BrokerPosition {
                ticket: ticket.clone(),
                instrument: p.instrument.clone(),
                direction: p.direction,
                entry_price: p.entry_price,
                current_price: prices.get(&p.instrument).copied().unwrap_or(p.entry_price),
            })
            .collect())
    }

    async fn get_account(&self, account: &str) -> Result<AccountRiskState> {
        let balance = *self.balance.read().await;
        let margin_used = *self.margin_used.read().await;

        // Equity includes unrealized PnL at the latest known prices.
        let prices = self.prices.read().await;
        let unrealized: f64 = self
            .positions
            .read()
            .await
            .values()
            .map(|p| {
                let current = prices.get(&p.instrument).copied().unwrap_or(p.entry_price);
                match p.direction {
                    Direction::Buy => (current - p.entry_price) * p.quantity,
                    Direction::Sell => (p.entry_price - current) * p.quantity,
                }
            })
            .sum();

        Ok(AccountRiskState {
            account: account.to_string(),
            balance,
            equity: balance + unrealized,
            margin_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_request(instrument: &str, direction: Direction, quantity: f64) -> OpenRequest {
        OpenRequest {
            account: "ACC-1".into(),
            instrument: instrument.into(),
            direction,
            quantity,
            stop_loss: 0.0,
            take_profit: 0.0,
        }
    }

    #[tokio::test]
    async fn buy_fill_applies_positive_slippage() {
        let client = PaperExecutionClient::new(10_000.0, 10.0); // 10 bps
        client.update_price("GOLD", 1000.0).await;

        client
            .open_position(&open_request("GOLD", Direction::Buy, 1.0))
            .await
            .unwrap();

        let listed = client.list_open_positions("ACC-1").await.unwrap();
        let expected = 1000.0 * (1.0 + 10.0 / 10_000.0);
        assert!(
            (listed[0].entry_price - expected).abs() < 1e-6,
            "Buy fill price {}, expected {expected}",
            listed[0].entry_price
        );
    }

    #[tokio::test]
    async fn open_then_close_round_trip_realizes_pnl() {
        let client = PaperExecutionClient::new(10_000.0, 0.0);
        client.update_price("GOLD", 1000.0).await;

        let ticket = client
            .open_position(&open_request("GOLD", Direction::Buy, 2.0))
            .await
            .unwrap();

        client.update_price("GOLD", 1010.0).await;
        client.close_position(&ticket).await.unwrap();

        let account = client.get_account("ACC-1").await.unwrap();
        assert!((account.balance - 10_020.0).abs() < 1e-6, "balance {}", account.balance);
        assert!(account.margin_used.abs() < 1e-6, "margin released on close");
        assert!(client.list_open_positions("ACC-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sell_position_profits_from_falling_price() {
        let client = PaperExecutionClient::new(10_000.0, 0.0);
        client.update_price("GOLD", 1000.0).await;

        let ticket = client
            .open_position(&open_request("GOLD", Direction::Sell, 1.0))
            .await
            .unwrap();

        client.update_price("GOLD", 980.0).await;
        client.close_position(&ticket).await.unwrap();

        let account = client.get_account("ACC-1").await.unwrap();
        assert!((account.balance - 10_020.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn open_without_price_fails() {
        let client = PaperExecutionClient::new(10_000.0, 0.0);
        let result = client
            .open_position(&open_request("UNSEEDED", Direction::Buy, 1.0))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn margin_tracks_open_notional() {
        let client = PaperExecutionClient::new(10_000.0, 0.0);
        client.update_price("GOLD", 1000.0).await;

        client
            .open_position(&open_request("GOLD", Direction::Buy, 2.0))
            .await
            .unwrap();

        let account = client.get_account("ACC-1").await.unwrap();
        assert!((account.margin_used - 200.0).abs() < 1e-6); // 2000 notional × 10%
    }

    #[tokio::test]
    async fn close_unknown_ticket_errors() {
        let client = PaperExecutionClient::new(10_000.0, 0.0);
        assert!(client.close_position("nope").await.is_err());
    }
}
