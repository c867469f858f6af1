//! Weighted-vote signal aggregation.
//!
//! Each cycle every adapter is queried concurrently and the normalized
//! results are merged into one [`AggregatedDecision`]:
//!
//! 1. All HOLD: no decision.
//! 2. High-confidence override: the strongest confident signal
//!    (by `confidence * weight`) decides alone if its confidence clears
//!    the trigger, at a discounted confidence.
//! 3. Otherwise a standard vote on the summed `strength * weight * confidence`
//!    per side.

use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AggregationConfig;

use super::adapter::SignalAdapter;
use super::types::{normalize_confidence, Direction, NamedSignal};
use super::weights::{RegimeClassifier, SignalWeights};

/// The merged directional call for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedDecision {
    pub direction: Direction,
    pub confidence: f64,
    pub expected_move_pct: f64,
    pub buy_strength: f64,
    pub sell_strength: f64,
    /// Set when a single signal overrode the vote
    pub dominant_signal: Option<String>,
    /// The inputs this decision was derived from
    pub signals: Vec<NamedSignal>,
}

impl AggregatedDecision {
    pub fn is_actionable(&self) -> bool {
        !self.direction.is_hold()
    }
}

/// Outcome of the standard vote on summed strengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    pub direction: Direction,
    pub confidence: f64,
    pub expected_move_pct: f64,
}

/// Standard weighted vote on per-side strengths.
pub fn vote(buy_strength: f64, sell_strength: f64, params: &AggregationConfig) -> Vote {
    let diff = (buy_strength - sell_strength).abs();
    let total = buy_strength + sell_strength;
    let decisive = total > params.min_total_strength && diff > params.min_strength_diff;

    let (direction, winning) = if decisive && buy_strength > sell_strength {
        (Direction::Buy, buy_strength)
    } else if decisive && sell_strength > buy_strength {
        (Direction::Sell, sell_strength)
    } else {
        (Direction::Hold, 0.0)
    };

    let confidence = match direction {
        Direction::Hold => params.hold_confidence,
        _ => (winning / (total + params.vote_epsilon) * params.vote_confidence_scale
            + params.vote_confidence_base)
            .min(params.max_vote_confidence),
    };

    Vote {
        direction,
        confidence,
        expected_move_pct: (diff * params.move_scale).min(params.max_expected_move),
    }
}

/// Merge one cycle's signals into a decision.
///
/// Returns `None` when every signal is HOLD. Iteration follows slice order,
/// which also breaks ties between equally strong override candidates
/// (first one wins).
pub fn decide(signals: &[NamedSignal], params: &AggregationConfig) -> Option<AggregatedDecision> {
    if signals.iter().all(|s| s.result.direction.is_hold()) {
        return None;
    }

    let mut buy_strength = 0.0;
    let mut sell_strength = 0.0;
    // (index, confidence * weight) of the best override candidate
    let mut best: Option<(usize, f64)> = None;

    for (idx, signal) in signals.iter().enumerate() {
        let confidence = normalize_confidence(signal.result.confidence);
        let weighted = signal.result.strength * signal.weight * confidence;

        match signal.result.direction {
            Direction::Buy => buy_strength += weighted,
            Direction::Sell => sell_strength += weighted,
            Direction::Hold => continue,
        }

        if confidence > params.override_candidate_confidence {
            let score = confidence * signal.weight;
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((idx, score));
            }
        }
    }

    if let Some((idx, _)) = best {
        let signal = &signals[idx];
        let confidence = normalize_confidence(signal.result.confidence);
        if confidence > params.override_trigger_confidence {
            debug!(
                signal = %signal.name,
                direction = %signal.result.direction,
                confidence,
                "High-confidence override"
            );
            return Some(AggregatedDecision {
                direction: signal.result.direction,
                confidence: confidence * params.override_confidence_discount,
                expected_move_pct: signal.result.strength * params.override_move_factor,
                buy_strength,
                sell_strength,
                dominant_signal: Some(signal.name.clone()),
                signals: signals.to_vec(),
            });
        }
    }

    let outcome = vote(buy_strength, sell_strength, params);
    Some(AggregatedDecision {
        direction: outcome.direction,
        confidence: outcome.confidence,
        expected_move_pct: outcome.expected_move_pct,
        buy_strength,
        sell_strength,
        dominant_signal: None,
        signals: signals.to_vec(),
    })
}

/// Runs all signal adapters and merges their output.
pub struct SignalAggregator {
    adapters: Vec<SignalAdapter>,
    weights: SignalWeights,
    params: AggregationConfig,
    regime: Option<Arc<dyn RegimeClassifier>>,
}

impl SignalAggregator {
    /// Create an aggregator; weights are taken from the adapters.
    pub fn new(adapters: Vec<SignalAdapter>, params: AggregationConfig) -> Self {
        let weights = adapters.iter().fold(SignalWeights::new(), |w, a| {
            w.with(a.name(), a.category(), a.weight())
        });
        Self {
            adapters,
            weights,
            params,
            regime: None,
        }
    }

    /// Adjust weights per market regime before each aggregation.
    pub fn with_regime_classifier(mut self, classifier: Arc<dyn RegimeClassifier>) -> Self {
        self.regime = Some(classifier);
        self
    }

    pub fn weights(&self) -> &SignalWeights {
        &self.weights
    }

    pub fn signal_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    /// Query every adapter concurrently and wait for all of them.
    pub async fn collect(&self, symbol: &str) -> Vec<NamedSignal> {
        let weights = self.cycle_weights(symbol).await;
        let calls = self
            .adapters
            .iter()
            .map(|adapter| adapter.analyze_named(symbol, weights.get(adapter.name())));
        join_all(calls).await
    }

    /// Collect and merge this cycle's signals.
    pub async fn aggregate(&self, symbol: &str) -> Option<AggregatedDecision> {
        let signals = self.collect(symbol).await;

        let failed = signals.iter().filter(|s| s.result.is_fallback()).count();
        info!(
            "📡 [SIGNALS] {} collected ({} failed) for {}",
            signals.len(),
            failed,
            symbol
        );
        for s in &signals {
            debug!(
                "   {} | {} | conf {:.2} | str {:.2} | w {:.2}",
                s.name, s.result.direction, s.result.confidence, s.result.strength, s.weight
            );
        }

        let decision = self.decide(&signals);
        match &decision {
            Some(d) => info!(
                direction = %d.direction,
                confidence = d.confidence,
                buy_strength = d.buy_strength,
                sell_strength = d.sell_strength,
                dominant = ?d.dominant_signal,
                "Aggregated decision"
            ),
            None => info!("⏸️  [SIGNALS] All signals HOLD, no decision this cycle"),
        }
        decision
    }

    /// Merge an already collected set of signals.
    pub fn decide(&self, signals: &[NamedSignal]) -> Option<AggregatedDecision> {
        decide(signals, &self.params)
    }

    async fn cycle_weights(&self, symbol: &str) -> SignalWeights {
        let Some(classifier) = &self.regime else {
            return self.weights.clone();
        };

        match classifier.classify(symbol).await {
            Ok(regime) => {
                debug!(%regime, "Applying regime weights");
                self.weights.adjusted_for(
                    regime,
                    self.params.regime_weight_boost,
                    self.params.regime_weight_cap,
                )
            }
            Err(e) => {
                warn!(error = %e, "Regime classification failed, using base weights");
                self.weights.clone()
            }
        }
    }
}
