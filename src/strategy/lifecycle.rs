//! Position lifecycle: exit pre-checks and trade admission.
//!
//! Policy only. All position state lives in the [`Ledger`].

use anyhow::Result;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::exchange::{ExitEvent, Ledger};
use crate::notify::Notifier;
use crate::persistence::SignalTracker;

use super::prediction::Prediction;

/// What happened to an accepted prediction at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Prediction-only mode
    Disabled,
    AtCapacity,
    Executed,
    /// The ledger refused to open the position
    Rejected,
}

impl fmt::Display for AdmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdmissionOutcome::Disabled => "prediction only",
            AdmissionOutcome::AtCapacity => "at capacity",
            AdmissionOutcome::Executed => "executed",
            AdmissionOutcome::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

pub struct PositionLifecycleManager {
    trading_enabled: bool,
    max_open_positions: usize,
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
    tracker: Arc<dyn SignalTracker>,
}

impl PositionLifecycleManager {
    pub fn new(
        trading_enabled: bool,
        max_open_positions: usize,
        ledger: Arc<dyn Ledger>,
        notifier: Arc<dyn Notifier>,
        tracker: Arc<dyn SignalTracker>,
    ) -> Self {
        Self {
            trading_enabled,
            max_open_positions,
            ledger,
            notifier,
            tracker,
        }
    }

    pub fn trading_enabled(&self) -> bool {
        self.trading_enabled
    }

    /// Let the ledger close every position whose exit rule fired, then
    /// report and record each closure.
    pub async fn check_exits(&self) -> Result<Vec<ExitEvent>> {
        let events = self.ledger.check_and_close_expired().await?;

        for event in &events {
            info!(
                prediction_id = %event.prediction_id,
                pnl = %event.realized_pnl,
                "🏁 [EXIT] {} closed ({})",
                event.contract_symbol,
                event.reason
            );

            let text = format!(
                "Closed {}x {} ({}): entry ${} exit ${}, P&L ${:.2} ({:.1}%)",
                event.contracts,
                event.contract_symbol,
                event.reason,
                event.entry_price,
                event.exit_price,
                event.realized_pnl,
                event.realized_pnl_pct,
            );
            self.notifier.send(&text).await;

            if let Err(e) = self.tracker.record_outcome(event).await {
                warn!(prediction_id = %event.prediction_id, error = %e, "Failed to record outcome");
            }
        }

        Ok(events)
    }

    /// Decide whether an accepted prediction becomes a position.
    pub async fn admit(&self, prediction: &Prediction) -> Result<AdmissionOutcome> {
        if !self.trading_enabled {
            info!(
                prediction_id = %prediction.prediction_id,
                "📝 [EXECUTE] Trading disabled, prediction only"
            );
            return Ok(AdmissionOutcome::Disabled);
        }

        let open = self.ledger.open_positions_summary().await?.len();
        if open >= self.max_open_positions {
            info!(
                open,
                cap = self.max_open_positions,
                "⛔ [EXECUTE] Position cap reached, skipping {}",
                prediction.contract_symbol
            );
            return Ok(AdmissionOutcome::AtCapacity);
        }

        if self.ledger.open(prediction).await? {
            info!(prediction_id = %prediction.prediction_id, "💰 [EXECUTE] {}", prediction.headline());
            self.notifier
                .send(&format!(
                    "Opened {} | cost ${:.2} + ${:.2} commission | target ${} stop ${}",
                    prediction.headline(),
                    prediction.total_cost,
                    prediction.commission,
                    prediction.profit_target_price,
                    prediction.stop_loss_price,
                ))
                .await;
            Ok(AdmissionOutcome::Executed)
        } else {
            warn!(prediction_id = %prediction.prediction_id, "❌ [EXECUTE] Ledger refused {}", prediction.contract_symbol);
            self.notifier
                .send(&format!("Trade failed: {}", prediction.headline()))
                .await;
            Ok(AdmissionOutcome::Rejected)
        }
    }
}
