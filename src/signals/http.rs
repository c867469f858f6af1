//! HTTP-backed analyzer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

use super::adapter::Analyzer;
use super::types::RawSignal;

/// Analyzer served over HTTP.
///
/// Issues `GET <url>?symbol=<SYMBOL>` and reads a JSON body with optional
/// `direction`, `confidence`, `strength` and `error` fields.
pub struct HttpAnalyzer {
    http: Client,
    url: String,
}

impl HttpAnalyzer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn analyze(&self, symbol: &str) -> Result<RawSignal> {
        let response = self
            .http
            .get(&self.url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .context("Analyzer request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Analyzer returned {}: {}", status, body);
        }

        let raw: RawSignal = response
            .json()
            .await
            .context("Failed to parse analyzer response")?;
        debug!(?raw, "Analyzer response");
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_parses_partial_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/signals/momentum"))
            .and(query_param("symbol", "SPY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "direction": "BUY",
                "confidence": 78
            })))
            .mount(&server)
            .await;

        let analyzer = HttpAnalyzer::new(
            format!("{}/signals/momentum", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        let raw = analyzer.analyze("SPY").await.unwrap();
        assert_eq!(raw.direction.as_deref(), Some("BUY"));
        assert_eq!(raw.confidence, Some(78.0));
        assert_eq!(raw.strength, None);
    }

    #[tokio::test]
    async fn test_server_error_is_err() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
            .mount(&server)
            .await;

        let analyzer = HttpAnalyzer::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = analyzer.analyze("SPY").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_non_json_body_is_err() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let analyzer = HttpAnalyzer::new(server.uri(), Duration::from_secs(5)).unwrap();
        assert!(analyzer.analyze("SPY").await.is_err());
    }
}
