//! Concrete options trade proposals.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::exchange::OptionType;
use crate::signals::Direction;

/// Opening action for a directional options trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    BuyCall,
    BuyPut,
}

impl TradeAction {
    /// Long calls for bullish calls, long puts for bearish ones.
    pub fn for_direction(direction: Direction) -> Option<Self> {
        match direction {
            Direction::Buy => Some(TradeAction::BuyCall),
            Direction::Sell => Some(TradeAction::BuyPut),
            Direction::Hold => None,
        }
    }

    pub fn option_type(&self) -> OptionType {
        match self {
            TradeAction::BuyCall => OptionType::Call,
            TradeAction::BuyPut => OptionType::Put,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::BuyCall => write!(f, "BUY_CALL"),
            TradeAction::BuyPut => write!(f, "BUY_PUT"),
        }
    }
}

/// An accepted decision turned into a concrete proposed trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Assigned by the prediction gate; empty until accepted
    pub prediction_id: String,
    pub action: TradeAction,
    pub contract_symbol: String,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub days_to_expiry: i64,
    pub contracts: u32,
    /// Premium per share
    pub entry_price: Decimal,
    /// Premium paid for all contracts, commission excluded
    pub total_cost: Decimal,
    pub commission: Decimal,
    pub delta: f64,
    pub implied_volatility: f64,
    pub confidence: f64,
    pub expected_profit_pct: f64,
    pub profit_target_price: Decimal,
    pub stop_loss_price: Decimal,
    pub exit_before_expiry_days: i64,
}

impl Prediction {
    /// One-line summary for logs and notifications.
    pub fn headline(&self) -> String {
        format!(
            "{} {}x {} {} {} exp {} @ ${} (conf {:.0}%)",
            self.action,
            self.contracts,
            self.contract_symbol,
            self.option_type,
            self.strike,
            self.expiry,
            self.entry_price,
            self.confidence * 100.0
        )
    }
}
