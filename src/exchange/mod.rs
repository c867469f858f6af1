//! Option data and position ledger integrations.
//!
//! ## Option chain
//! Read-only access to chains and quotes for contract selection and
//! position marking.
//!
//! ## Ledger
//! Position bookkeeping behind the [`Ledger`] trait; [`PaperLedger`]
//! simulates fills for paper trading.

mod chain;
mod paper;
mod traits;
mod types;

pub use chain::HttpChainSource;
pub use paper::PaperLedger;
#[cfg(test)]
pub use traits::{MockLedger, MockOptionChainSource};
pub use traits::{Ledger, OptionChainSource};
pub use types::*;
