//! # Options Signal Trader
//!
//! Signal aggregation and decision core for an options-trading bot on a
//! single underlying.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `signals`: Signal adapters, weights, and weighted-vote aggregation
//! - `strategy`: Prediction gate, contract selection, position lifecycle
//! - `exchange`: Option chain source and position ledger (paper)
//! - `persistence`: SQLite signal tracking and effectiveness
//! - `notify`: Notification sinks
//! - `scheduler`: Cycle scheduler, market clock, operator commands

pub mod config;
pub mod exchange;
pub mod notify;
pub mod persistence;
pub mod scheduler;
pub mod signals;
pub mod strategy;

pub use config::Config;
