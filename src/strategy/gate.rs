//! Prediction gate: confidence threshold, contract selection and
//! signal bookkeeping for accepted predictions.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::persistence::{SignalTracker, TrackedSignal};
use crate::signals::{AggregatedDecision, Direction, SignalResult};

use super::prediction::Prediction;
use super::selector::ContractSelector;

pub struct PredictionGate {
    threshold: f64,
    strategy_id: String,
    /// Configured signal names, in configuration order
    signal_names: Vec<String>,
    selector: Arc<dyn ContractSelector>,
    tracker: Arc<dyn SignalTracker>,
    /// Suffix for prediction ids
    id_seq: AtomicU64,
}

impl PredictionGate {
    pub fn new(
        threshold: f64,
        strategy_id: impl Into<String>,
        signal_names: Vec<String>,
        selector: Arc<dyn ContractSelector>,
        tracker: Arc<dyn SignalTracker>,
    ) -> Self {
        Self {
            threshold,
            strategy_id: strategy_id.into(),
            signal_names,
            selector,
            tracker,
            id_seq: AtomicU64::new(0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn passes(&self, decision: &AggregatedDecision) -> bool {
        !decision.direction.is_hold() && decision.confidence >= self.threshold
    }

    /// Turn a decision into a prediction, or `None` when rejected.
    pub async fn gate(&self, decision: &AggregatedDecision, capital: Decimal) -> Option<Prediction> {
        if !self.passes(decision) {
            info!(
                "🚧 [GATE] {} @ {:.1}% below threshold {:.1}%",
                decision.direction,
                decision.confidence * 100.0,
                self.threshold * 100.0
            );
            return None;
        }

        let mut prediction = match self.selector.propose(decision, capital).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                info!("🚧 [GATE] {} accepted but no tradable contract", decision.direction);
                return None;
            }
            Err(e) => {
                error!(error = %e, "Contract selection failed");
                return None;
            }
        };

        let seq = self.id_seq.fetch_add(1, Ordering::SeqCst) + 1;
        prediction.prediction_id = format!("pred-{}-{}", Utc::now().format("%Y%m%d%H%M%S"), seq);

        info!(
            prediction_id = %prediction.prediction_id,
            confidence = decision.confidence,
            "✅ [GATE] {}",
            prediction.headline()
        );

        let contributions = self.contributions(decision);
        if let Err(e) = self
            .tracker
            .track(
                &prediction.prediction_id,
                decision.direction,
                &contributions,
                &self.strategy_id,
            )
            .await
        {
            warn!(prediction_id = %prediction.prediction_id, error = %e, "Signal tracking failed");
        } else {
            debug!(signals = contributions.len(), "Signal contributions tracked");
        }

        Some(prediction)
    }

    /// One entry per configured signal. A signal absent from the decision
    /// is recorded as the neutral fallback.
    fn contributions(&self, decision: &AggregatedDecision) -> Vec<TrackedSignal> {
        self.signal_names
            .iter()
            .map(|name| {
                let (direction, confidence) = decision
                    .signals
                    .iter()
                    .find(|s| &s.name == name)
                    .map(|s| (s.result.direction, s.result.confidence))
                    .unwrap_or((Direction::Hold, SignalResult::DEFAULT_CONFIDENCE));
                TrackedSignal {
                    name: name.clone(),
                    direction,
                    confidence,
                }
            })
            .collect()
    }
}
