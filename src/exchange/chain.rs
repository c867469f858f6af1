//! HTTP option chain client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

use super::traits::OptionChainSource;
use super::types::{OptionChain, OptionQuote};

/// Option chain service client.
///
/// - `GET {base}/chain?symbol=SPY` returns an [`OptionChain`]
/// - `GET {base}/quote?contract=SPY250117C00500000` returns an [`OptionQuote`]
///   or 404 when the contract is not listed
pub struct HttpChainSource {
    http: Client,
    base_url: String,
}

impl HttpChainSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OptionChainSource for HttpChainSource {
    #[instrument(skip(self))]
    async fn chain(&self, symbol: &str) -> Result<OptionChain> {
        let url = format!("{}/chain", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .context("Chain request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chain service returned {}: {}", status, body);
        }

        let chain: OptionChain = response
            .json()
            .await
            .context("Failed to parse option chain")?;
        debug!(quotes = chain.quotes.len(), "Option chain fetched");
        Ok(chain)
    }

    #[instrument(skip(self))]
    async fn quote(&self, contract_symbol: &str) -> Result<Option<OptionQuote>> {
        let url = format!("{}/quote", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("contract", contract_symbol)])
            .send()
            .await
            .context("Quote request failed")?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let quote = response
                    .json()
                    .await
                    .context("Failed to parse option quote")?;
                Ok(Some(quote))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Chain service returned {}: {}", status, body)
            }
        }
    }
}
