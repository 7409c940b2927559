use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use common::clients::AdvisoryClient;
use common::{AdvisoryVerdict, Direction, Error, Result, Sentiment};

/// HTTP client for the optional advisory collaborator.
///
/// Expects:
///   GET {base}/evaluate/{instrument}?direction=BUY|SELL
///     -> { classification, bullish_arguments, bearish_arguments, adjustment? }
///
/// Purely advisory: the generator treats any failure here as zero sentiment.
pub struct HttpAdvisoryClient {
    base_url: String,
    http: Client,
}

impl HttpAdvisoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

#[async_trait]
impl AdvisoryClient for HttpAdvisoryClient {
    async fn evaluate(&self, instrument: &str, direction: Direction) -> Result<AdvisoryVerdict> {
        let url = format!(
            "{}/evaluate/{instrument}?direction={direction}",
            self.base_url
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http(format!("HTTP {status}: {body}")));
        }

        let evaluation: EvaluationResponse =
            resp.json().await.map_err(|e| Error::Http(e.to_string()))?;

        // Services that only classify get a coarse adjustment derived from
        // the classification.
        let adjustment = evaluation.adjustment.unwrap_or(match evaluation.classification {
            Sentiment::Bullish => 0.5,
            Sentiment::Bearish => -0.5,
            Sentiment::Neutral => 0.0,
        });

        Ok(AdvisoryVerdict {
            bullish_arguments: evaluation.bullish_arguments,
            bearish_arguments: evaluation.bearish_arguments,
            adjustment: adjustment.clamp(-1.0, 1.0),
        })
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct EvaluationResponse {
    classification: Sentiment,
    #[serde(default)]
    bullish_arguments: Vec<String>,
    #[serde(default)]
    bearish_arguments: Vec<String>,
    #[serde(default)]
    adjustment: Option<f64>,
}
