//! Signal collection and aggregation.
//!
//! - `adapter`: failure-isolating wrapper around one external analyzer
//! - `aggregator`: concurrent fan-out and weighted vote
//! - `weights`: weight table and market-regime adjustment
//! - `http`: analyzers served over HTTP

mod adapter;
mod aggregator;
mod http;
mod types;
mod weights;

#[cfg(test)]
pub use adapter::MockAnalyzer;
pub use adapter::{Analyzer, SignalAdapter};
pub use aggregator::{decide, vote, AggregatedDecision, SignalAggregator, Vote};
pub use http::HttpAnalyzer;
pub use types::{
    normalize_confidence, Direction, NamedSignal, RawSignal, SignalCategory, SignalError,
    SignalResult,
};
pub use weights::{MarketRegime, RegimeClassifier, SignalWeights};
