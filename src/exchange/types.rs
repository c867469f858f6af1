//! Option chain and ledger data types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shares controlled by one listed equity option contract.
pub const CONTRACT_MULTIPLIER: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "CALL"),
            OptionType::Put => write!(f, "PUT"),
        }
    }
}

/// One quoted contract in the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub contract_symbol: String,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub bid: Decimal,
    pub ask: Decimal,
    pub delta: f64,
    pub implied_volatility: f64,
    #[serde(default)]
    pub open_interest: u64,
}

impl OptionQuote {
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / dec!(2)
    }

    /// (ask - bid) / mid, or `None` for an unusable quote.
    pub fn spread_pct(&self) -> Option<Decimal> {
        let mid = self.mid();
        if mid <= Decimal::ZERO || self.ask < self.bid {
            return None;
        }
        Some((self.ask - self.bid) / mid)
    }

    pub fn days_to_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry - today).num_days()
    }
}

/// Chain snapshot for one underlying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub symbol: String,
    pub underlying_price: Decimal,
    pub quotes: Vec<OptionQuote>,
}

/// Open position as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSummary {
    pub prediction_id: String,
    pub contract_symbol: String,
    pub contracts: u32,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_pct: Decimal,
}

/// Account-level performance as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub account_balance: Decimal,
    pub total_return: Decimal,
    pub total_return_pct: Decimal,
    /// Fraction of closed trades with positive P&L
    pub win_rate: Decimal,
    pub total_trades: u64,
    /// Gross profit / gross loss; `None` while there are no losses
    pub profit_factor: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    ProfitTarget,
    StopLoss,
    TimeExit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::ProfitTarget => write!(f, "profit_target"),
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TimeExit => write!(f, "time_exit"),
        }
    }
}

/// A position closed by the ledger's exit check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitEvent {
    pub prediction_id: String,
    pub contract_symbol: String,
    pub reason: ExitReason,
    pub contracts: u32,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub realized_pnl: Decimal,
    pub realized_pnl_pct: Decimal,
    pub closed_at: DateTime<Utc>,
}

impl ExitEvent {
    pub fn is_win(&self) -> bool {
        self.realized_pnl > Decimal::ZERO
    }
}
