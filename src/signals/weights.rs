//! Signal weight table and market-regime adjustment.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use super::types::SignalCategory;

/// Broad market regime reported by an external classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketRegime {
    Trending,
    Ranging,
    Neutral,
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegime::Trending => write!(f, "trending"),
            MarketRegime::Ranging => write!(f, "ranging"),
            MarketRegime::Neutral => write!(f, "neutral"),
        }
    }
}

/// External regime classifier consulted before each aggregation.
#[async_trait]
pub trait RegimeClassifier: Send + Sync {
    async fn classify(&self, symbol: &str) -> anyhow::Result<MarketRegime>;
}

/// Ordered name -> weight table.
///
/// Order is the adapters' configuration order and is what the aggregator
/// iterates, so tie-breaks are deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalWeights {
    entries: Vec<WeightEntry>,
}

#[derive(Debug, Clone, PartialEq)]
struct WeightEntry {
    name: String,
    category: SignalCategory,
    weight: f64,
}

impl SignalWeights {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, category: SignalCategory, weight: f64) -> Self {
        self.insert(name, category, weight);
        self
    }

    /// Add or replace an entry. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, category: SignalCategory, weight: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                entry.category = category;
                entry.weight = weight;
            }
            None => self.entries.push(WeightEntry {
                name,
                category,
                weight,
            }),
        }
    }

    /// Weight for a signal; unknown signals carry no weight.
    pub fn get(&self, name: &str) -> f64 {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.weight)
            .unwrap_or(0.0)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Weights re-balanced for a regime.
    ///
    /// Trending boosts momentum and technical signals, ranging boosts
    /// mean reversion. Boosted weights are capped at `cap` and the table is
    /// then renormalized to sum to 1.
    pub fn adjusted_for(&self, regime: MarketRegime, boost: f64, cap: f64) -> Self {
        let favoured: &[SignalCategory] = match regime {
            MarketRegime::Trending => &[SignalCategory::Momentum, SignalCategory::Technical],
            MarketRegime::Ranging => &[SignalCategory::MeanReversion],
            MarketRegime::Neutral => return self.clone(),
        };

        let mut adjusted = self.clone();
        for entry in &mut adjusted.entries {
            if favoured.contains(&entry.category) {
                entry.weight = (entry.weight * boost).min(cap.max(entry.weight));
            }
        }
        adjusted.normalized()
    }

    /// Scale weights to sum to 1. An all-zero table is returned unchanged.
    pub fn normalized(mut self) -> Self {
        let total = self.total();
        if total > 0.0 {
            for entry in &mut self.entries {
                entry.weight /= total;
            }
        }
        self
    }
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> SignalWeights {
        SignalWeights::new()
            .with("technical", SignalCategory::Technical, 0.25)
            .with("momentum", SignalCategory::Momentum, 0.25)
            .with("mean_reversion", SignalCategory::MeanReversion, 0.25)
            .with("sentiment", SignalCategory::Sentiment, 0.25)
    }

    #[test]
    fn test_unknown_signal_has_zero_weight() {
        assert_eq!(weights().get("astrology"), 0.0);
    }

    #[test]
    fn test_neutral_regime_is_identity() {
        let w = weights();
        assert_eq!(w.adjusted_for(MarketRegime::Neutral, 1.5, 0.6), w);
    }

    #[test]
    fn test_trending_boosts_momentum_and_technical() {
        let adjusted = weights().adjusted_for(MarketRegime::Trending, 1.5, 0.6);
        // 0.375 + 0.375 + 0.25 + 0.25 = 1.25
        assert!((adjusted.get("momentum") - 0.3).abs() < 1e-12);
        assert!((adjusted.get("technical") - 0.3).abs() < 1e-12);
        assert!((adjusted.get("mean_reversion") - 0.2).abs() < 1e-12);
        assert!((adjusted.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ranging_boost_is_capped() {
        let w = SignalWeights::new()
            .with("mean_reversion", SignalCategory::MeanReversion, 0.5)
            .with("momentum", SignalCategory::Momentum, 0.5);
        let adjusted = w.adjusted_for(MarketRegime::Ranging, 2.0, 0.6);
        // 0.5 * 2.0 capped at 0.6, then 0.6 / 1.1
        assert!((adjusted.get("mean_reversion") - 0.6 / 1.1).abs() < 1e-12);
        assert!((adjusted.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut w = weights();
        w.insert("technical", SignalCategory::Technical, 0.4);
        assert_eq!(w.names().next(), Some("technical"));
        assert_eq!(w.get("technical"), 0.4);
        assert_eq!(w.len(), 4);
    }
}
