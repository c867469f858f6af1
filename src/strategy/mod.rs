//! Trading decisions downstream of signal aggregation.
//!
//! Contains the logic for:
//! - Gating aggregated decisions into predictions
//! - Selecting and sizing an option contract for a prediction
//! - Position admission and exit handling over the ledger

mod gate;
mod lifecycle;
mod prediction;
mod selector;

pub use gate::PredictionGate;
pub use lifecycle::{AdmissionOutcome, PositionLifecycleManager};
pub use prediction::{Prediction, TradeAction};
#[cfg(test)]
pub use selector::MockContractSelector;
pub use selector::{ChainContractSelector, ContractSelector};
