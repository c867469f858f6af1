//! Collaborator traits for option data and position bookkeeping.
//!
//! The decision core never talks to a broker directly. It reads option
//! chains through [`OptionChainSource`] and issues open intents and exit
//! checks through [`Ledger`], which may be paper or live.

use async_trait::async_trait;

use super::types::{ExitEvent, OptionChain, OptionQuote, PerformanceSummary, PositionSummary};
use crate::strategy::Prediction;

/// Source of option chains and quotes for the traded underlying.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OptionChainSource: Send + Sync {
    /// Current chain snapshot for `symbol`.
    async fn chain(&self, symbol: &str) -> anyhow::Result<OptionChain>;

    /// Latest quote for one contract, `None` if it is no longer listed.
    async fn quote(&self, contract_symbol: &str) -> anyhow::Result<Option<OptionQuote>>;
}

/// Position and account bookkeeping.
///
/// The ledger owns all position state and must keep its own counts and
/// balances consistent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Open a position for an accepted prediction. `Ok(false)` means the
    /// ledger refused the trade.
    async fn open(&self, prediction: &Prediction) -> anyhow::Result<bool>;

    /// Evaluate every open position against its exit rules and close the
    /// ones that qualify.
    async fn check_and_close_expired(&self) -> anyhow::Result<Vec<ExitEvent>>;

    async fn open_positions_summary(&self) -> anyhow::Result<Vec<PositionSummary>>;

    async fn performance_summary(&self) -> anyhow::Result<PerformanceSummary>;
}
