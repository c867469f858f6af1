//! Failure-isolating wrapper around one external analyzer.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{NamedSignal, RawSignal, SignalCategory, SignalError, SignalResult};

/// An external directional analyzer.
///
/// Implementations may perform I/O and may fail in any way; the
/// [`SignalAdapter`] wrapping them absorbs every failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, symbol: &str) -> anyhow::Result<RawSignal>;
}

/// Wraps one analyzer and always yields a usable [`SignalResult`].
#[derive(Clone)]
pub struct SignalAdapter {
    name: String,
    weight: f64,
    category: SignalCategory,
    timeout: Duration,
    analyzer: Arc<dyn Analyzer>,
}

impl SignalAdapter {
    pub fn new(
        name: impl Into<String>,
        weight: f64,
        category: SignalCategory,
        timeout: Duration,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            name: name.into(),
            weight,
            category,
            timeout,
            analyzer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn category(&self) -> SignalCategory {
        self.category
    }

    /// Query the analyzer, converting errors, malformed output and
    /// timeouts into the neutral HOLD fallback.
    pub async fn analyze(&self, symbol: &str) -> SignalResult {
        match self.try_analyze(symbol).await {
            Ok(result) => {
                debug!(
                    signal = %self.name,
                    direction = %result.direction,
                    confidence = result.confidence,
                    strength = result.strength,
                    "Signal received"
                );
                result
            }
            Err(e) => {
                warn!(signal = %self.name, %symbol, error = %e, "Signal failed, using HOLD fallback");
                SignalResult::fallback(e.to_string())
            }
        }
    }

    /// Like [`analyze`](Self::analyze), labelled with this adapter's name and weight.
    pub async fn analyze_named(&self, symbol: &str, weight: f64) -> NamedSignal {
        NamedSignal {
            name: self.name.clone(),
            weight,
            result: self.analyze(symbol).await,
        }
    }

    async fn try_analyze(&self, symbol: &str) -> Result<SignalResult, SignalError> {
        let raw = tokio::time::timeout(self.timeout, self.analyzer.analyze(symbol))
            .await
            .map_err(|_| SignalError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| SignalError::Failed(format!("{:#}", e)))?;

        SignalResult::from_raw(raw)
    }
}

impl std::fmt::Debug for SignalAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalAdapter")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("category", &self.category)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::Direction;

    fn adapter(analyzer: MockAnalyzer) -> SignalAdapter {
        SignalAdapter::new(
            "technical",
            0.25,
            SignalCategory::Technical,
            Duration::from_secs(5),
            Arc::new(analyzer),
        )
    }

    #[tokio::test]
    async fn test_well_formed_signal_passes_through() {
        let mut analyzer = MockAnalyzer::new();
        analyzer.expect_analyze().returning(|_| {
            Ok(RawSignal {
                direction: Some("SELL".into()),
                confidence: Some(72.0),
                strength: Some(0.4),
                error: None,
            })
        });

        let result = adapter(analyzer).analyze("SPY").await;
        assert_eq!(result.direction, Direction::Sell);
        assert_eq!(result.confidence, 0.72);
        assert_eq!(result.strength, 0.4);
    }

    #[tokio::test]
    async fn test_analyzer_error_becomes_fallback() {
        let mut analyzer = MockAnalyzer::new();
        analyzer
            .expect_analyze()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));

        let result = adapter(analyzer).analyze("SPY").await;
        assert_eq!(result.direction, Direction::Hold);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.strength, 0.0);
        assert!(result.error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_malformed_direction_becomes_fallback() {
        let mut analyzer = MockAnalyzer::new();
        analyzer.expect_analyze().returning(|_| {
            Ok(RawSignal {
                direction: Some("UP-ISH".into()),
                ..Default::default()
            })
        });

        let result = adapter(analyzer).analyze("SPY").await;
        assert!(result.is_fallback());
        assert_eq!(result.direction, Direction::Hold);
    }

    struct SlowAnalyzer;

    #[async_trait]
    impl Analyzer for SlowAnalyzer {
        async fn analyze(&self, _symbol: &str) -> anyhow::Result<RawSignal> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(RawSignal::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_analyzer_times_out() {
        let adapter = SignalAdapter::new(
            "slow",
            0.1,
            SignalCategory::Other,
            Duration::from_secs(30),
            Arc::new(SlowAnalyzer),
        );

        let result = adapter.analyze("SPY").await;
        assert!(result.is_fallback());
        assert!(result.error.unwrap().contains("timed out"));
    }
}
