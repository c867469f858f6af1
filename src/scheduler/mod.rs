//! Cycle scheduling.
//!
//! ## Runner
//! [`Scheduler`] drives the decision cycle: market-hours gating, the
//! fixed cycle interval, periodic maintenance and summaries, and a
//! cooperative `STOPPED → RUNNING → STOPPED` lifecycle.
//!
//! ## Operator surface
//! [`SchedulerHandle`] exposes stop and status; a [`CommandSource`]
//! feeds `status` / `stop` commands to a background listener.

mod clock;
mod commands;
mod runner;
mod state;

pub use clock::{ExchangeHours, MarketClock};
pub use commands::{CommandSource, LineCommandSource, OperatorCommand, StdinCommandSource};
pub use runner::{Scheduler, SchedulerHandle, SchedulerServices};
pub use state::{CycleState, StatusReport};
