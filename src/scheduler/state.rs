//! Scheduler run state and the operator status report.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::exchange::{PerformanceSummary, PositionSummary};
use crate::strategy::Prediction;

/// State of one scheduler run. Reset on start, frozen on stop.
#[derive(Debug, Clone, Default)]
pub struct CycleState {
    pub running: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub cycle_count: u64,
    pub prediction_count: u64,
    pub last_prediction: Option<Prediction>,
}

impl CycleState {
    pub fn start(&mut self, now: DateTime<Utc>) {
        *self = Self {
            running: true,
            start_time: Some(now),
            ..Self::default()
        };
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn record_prediction(&mut self, prediction: Prediction) {
        self.prediction_count += 1;
        self.last_prediction = Some(prediction);
    }

    pub fn uptime_seconds(&self, now: DateTime<Utc>) -> u64 {
        match (self.running, self.start_time) {
            (true, Some(start)) => (now - start).num_seconds().max(0) as u64,
            _ => 0,
        }
    }
}

/// Read-only status snapshot for operators.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub running: bool,
    pub uptime_seconds: u64,
    pub cycle_count: u64,
    pub prediction_count: u64,
    pub last_prediction: Option<Prediction>,
    pub open_positions: Vec<PositionSummary>,
    pub account_balance: Option<Decimal>,
    pub performance: Option<PerformanceSummary>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uptime = self.uptime_seconds;
        writeln!(
            f,
            "Status: {} | up {}h {}m | {} cycles | {} predictions",
            if self.running { "RUNNING" } else { "STOPPED" },
            uptime / 3600,
            (uptime % 3600) / 60,
            self.cycle_count,
            self.prediction_count
        )?;
        if let Some(p) = &self.last_prediction {
            writeln!(f, "Last: {}", p.headline())?;
        }
        writeln!(f, "Open positions: {}", self.open_positions.len())?;
        for pos in &self.open_positions {
            writeln!(
                f,
                "  {} x{} | P&L ${:.2} ({:.1}%)",
                pos.contract_symbol, pos.contracts, pos.unrealized_pnl, pos.unrealized_pnl_pct
            )?;
        }
        if let Some(balance) = self.account_balance {
            write!(f, "Balance: ${:.2}", balance)?;
        }
        if let Some(perf) = &self.performance {
            write!(
                f,
                " | return {:.2}% | win rate {:.1}% over {} trades",
                perf.total_return_pct,
                perf.win_rate * Decimal::ONE_HUNDRED,
                perf.total_trades
            )?;
        }
        Ok(())
    }
}
