use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

use common::clients::{MarketDataProvider, PriceQuote};
use common::{Error, Result};

/// HTTP client for the market-data collaborator.
///
/// Expects a small REST surface:
///   GET {base}/price/{instrument}                -> { price, timestamp_ms }
///   GET {base}/history/{instrument}?lookback=N   -> { closes: [..] }
pub struct HttpMarketDataProvider {
    base_url: String,
    http: Client,
}

impl HttpMarketDataProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http(format!("HTTP {status}: {body}")));
        }
        resp.json::<T>().await.map_err(|e| Error::Http(e.to_string()))
    }
}

#[async_trait]
impl MarketDataProvider for HttpMarketDataProvider {
    async fn get_price(&self, instrument: &str) -> Result<PriceQuote> {
        let url = format!("{}/price/{instrument}", self.base_url);
        let ticker: PriceResponse = self.get_json(&url).await?;

        let timestamp: DateTime<Utc> = Utc
            .timestamp_millis_opt(ticker.timestamp_ms)
            .single()
            .unwrap_or_else(Utc::now);

        Ok(PriceQuote {
            price: ticker.price,
            timestamp,
        })
    }

    async fn get_history(&self, instrument: &str, lookback: usize) -> Result<Vec<f64>> {
        let url = format!("{}/history/{instrument}?lookback={lookback}", self.base_url);
        let history: HistoryResponse = self.get_json(&url).await?;
        Ok(history.closes)
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PriceResponse {
    price: f64,
    timestamp_ms: i64,
}

#[derive(Deserialize)]
struct HistoryResponse {
    closes: Vec<f64>,
}
