use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use common::{
    AccountRiskState, BrokerPosition, Direction, Error, ExecutionClient, OpenRequest, Result,
};

/// HTTP client for the execution-service collaborator.
///
/// Expects the gateway's REST surface:
///   POST {base}/accounts/{account}/orders          -> { ticket }
///   POST {base}/orders/{ticket}/close              -> 200
///   GET  {base}/accounts/{account}/positions       -> { positions: [..] }
///   GET  {base}/accounts/{account}                 -> { balance, equity, margin_used }
pub struct ExecutionGatewayClient {
    base_url: String,
    token: String,
    http: Client,
}

impl ExecutionGatewayClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Broker(format!("HTTP {status}: {body}")));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ExecutionClient for ExecutionGatewayClient {
    async fn open_position(&self, request: &OpenRequest) -> Result<String> {
        let url = format!("{}/accounts/{}/orders", self.base_url, request.account);
        debug!(
            instrument = %request.instrument,
            direction = %request.direction,
            quantity = request.quantity,
            "Submitting open order to execution gateway"
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let resp = Self::check(resp).await?;
        let opened: OpenResponse = resp.json().await.map_err(|e| Error::Broker(e.to_string()))?;
        Ok(opened.ticket)
    }

    async fn close_position(&self, ticket: &str) -> Result<()> {
        let url = format!("{}/orders/{ticket}/close", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn list_open_positions(&self, account: &str) -> Result<Vec<BrokerPosition>> {
        let url = format!("{}/accounts/{account}/positions", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let resp = Self::check(resp).await?;
        let listing: PositionsResponse =
            resp.json().await.map_err(|e| Error::Broker(e.to_string()))?;

        Ok(listing
            .positions
            .into_iter()
            .map(|p| BrokerPosition {
                ticket: p.ticket,
                instrument: p.instrument,
                direction: p.direction,
                entry_price: p.entry_price,
                current_price: p.current_price,
            })
            .collect())
    }

    async fn get_account(&self, account: &str) -> Result<AccountRiskState> {
        let url = format!("{}/accounts/{account}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let resp = Self::check(resp).await?;
        let info: AccountResponse = resp.json().await.map_err(|e| Error::Broker(e.to_string()))?;

        Ok(AccountRiskState {
            account: account.to_string(),
            balance: info.balance,
            equity: info.equity,
            margin_used: info.margin_used,
        })
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct OpenResponse {
    ticket: String,
}

#[derive(Deserialize)]
struct PositionsResponse {
    positions: Vec<PositionDetail>,
}

#[derive(Deserialize)]
struct PositionDetail {
    ticket: String,
    instrument: String,
    direction: Direction,
    entry_price: f64,
    current_price: f64,
}

#[derive(Deserialize)]
struct AccountResponse {
    balance: f64,
    equity: f64,
    margin_used: f64,
}
