//! In-memory paper trading ledger.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::traits::{Ledger, OptionChainSource};
use super::types::{
    ExitEvent, ExitReason, PerformanceSummary, PositionSummary, CONTRACT_MULTIPLIER,
};
use crate::strategy::Prediction;

/// Simulated open position.
#[derive(Debug, Clone)]
pub struct PaperPosition {
    pub prediction: Prediction,
    pub opened_at: DateTime<Utc>,
    /// Last observed bid, used for unrealized P&L
    pub mark: Decimal,
}

impl PaperPosition {
    /// Premium plus opening commission.
    fn cost_basis(&self) -> Decimal {
        self.prediction.total_cost + self.prediction.commission
    }

    fn market_value(&self) -> Decimal {
        self.mark * CONTRACT_MULTIPLIER * Decimal::from(self.prediction.contracts)
    }
}

/// Paper account state.
#[derive(Debug)]
pub struct PaperState {
    pub initial_balance: Decimal,
    pub balance: Decimal,
    pub positions: Vec<PaperPosition>,
    pub closed: Vec<ExitEvent>,
}

/// Ledger that simulates fills at quoted prices.
///
/// Opens fill at the prediction's entry price; exits fill at the current bid.
pub struct PaperLedger {
    state: Arc<RwLock<PaperState>>,
    chain: Arc<dyn OptionChainSource>,
    commission_per_contract: Decimal,
}

impl PaperLedger {
    pub fn new(
        initial_balance: Decimal,
        commission_per_contract: Decimal,
        chain: Arc<dyn OptionChainSource>,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(PaperState {
                initial_balance,
                balance: initial_balance,
                positions: Vec::new(),
                closed: Vec::new(),
            })),
            chain,
            commission_per_contract,
        }
    }

    /// Run the exit rules as of `today`.
    pub async fn check_exits_on(&self, today: NaiveDate) -> Result<Vec<ExitEvent>> {
        let snapshot: Vec<(String, NaiveDate)> = {
            let state = self.state.read().await;
            state
                .positions
                .iter()
                .map(|p| {
                    (
                        p.prediction.contract_symbol.clone(),
                        p.prediction.expiry,
                    )
                })
                .collect()
        };

        // Quotes are fetched without holding the state lock
        let mut marks = Vec::with_capacity(snapshot.len());
        for (contract, expiry) in snapshot {
            match self.chain.quote(&contract).await {
                Ok(Some(quote)) => marks.push((contract, Some(quote.bid))),
                Ok(None) if expiry <= today => marks.push((contract, Some(Decimal::ZERO))),
                Ok(None) => {
                    warn!(%contract, "No quote for open position, keeping it");
                    marks.push((contract, None));
                }
                Err(e) => {
                    warn!(%contract, error = %e, "Quote lookup failed, keeping position");
                    marks.push((contract, None));
                }
            }
        }

        let mut state = self.state.write().await;
        let mut events = Vec::new();

        for (contract, mark) in marks {
            let Some(mark) = mark else { continue };
            let Some(idx) = state
                .positions
                .iter()
                .position(|p| p.prediction.contract_symbol == contract)
            else {
                continue;
            };

            state.positions[idx].mark = mark;
            let position = &state.positions[idx];
            let Some(reason) = exit_reason(&position.prediction, mark, today) else {
                continue;
            };

            let position = state.positions.remove(idx);
            let event = self.close(&position, mark, reason);
            state.balance += event_proceeds(&event, self.commission_per_contract);

            info!(
                "🔒 [PAPER] Closed {} ({}) | P&L ${:.2} ({:.1}%)",
                event.contract_symbol, event.reason, event.realized_pnl, event.realized_pnl_pct
            );
            state.closed.push(event.clone());
            events.push(event);
        }

        Ok(events)
    }

    fn close(&self, position: &PaperPosition, exit_price: Decimal, reason: ExitReason) -> ExitEvent {
        let contracts = Decimal::from(position.prediction.contracts);
        let proceeds = exit_price * CONTRACT_MULTIPLIER * contracts;
        let exit_commission = self.commission_per_contract * contracts;
        let cost_basis = position.cost_basis();
        let realized_pnl = proceeds - exit_commission - cost_basis;
        let realized_pnl_pct = if cost_basis > Decimal::ZERO {
            realized_pnl / cost_basis * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        ExitEvent {
            prediction_id: position.prediction.prediction_id.clone(),
            contract_symbol: position.prediction.contract_symbol.clone(),
            reason,
            contracts: position.prediction.contracts,
            entry_price: position.prediction.entry_price,
            exit_price,
            realized_pnl,
            realized_pnl_pct,
            closed_at: Utc::now(),
        }
    }
}

/// Cash returned to the account when a position closes.
fn event_proceeds(event: &ExitEvent, commission_per_contract: Decimal) -> Decimal {
    let contracts = Decimal::from(event.contracts);
    event.exit_price * CONTRACT_MULTIPLIER * contracts - commission_per_contract * contracts
}

/// Which exit rule, if any, a position at `mark` triggers.
pub fn exit_reason(prediction: &Prediction, mark: Decimal, today: NaiveDate) -> Option<ExitReason> {
    if mark >= prediction.profit_target_price {
        Some(ExitReason::ProfitTarget)
    } else if mark <= prediction.stop_loss_price {
        Some(ExitReason::StopLoss)
    } else if (prediction.expiry - today).num_days() <= prediction.exit_before_expiry_days {
        Some(ExitReason::TimeExit)
    } else {
        None
    }
}

#[async_trait]
impl Ledger for PaperLedger {
    async fn open(&self, prediction: &Prediction) -> Result<bool> {
        let mut state = self.state.write().await;

        if state
            .positions
            .iter()
            .any(|p| p.prediction.contract_symbol == prediction.contract_symbol)
        {
            warn!(contract = %prediction.contract_symbol, "Position already open for contract");
            return Ok(false);
        }

        let required = prediction.total_cost + prediction.commission;
        if required > state.balance {
            warn!(
                "💸 [PAPER] Insufficient balance: need ${:.2}, have ${:.2}",
                required, state.balance
            );
            return Ok(false);
        }

        state.balance -= required;
        state.positions.push(PaperPosition {
            prediction: prediction.clone(),
            opened_at: Utc::now(),
            mark: prediction.entry_price,
        });
        debug!(
            prediction_id = %prediction.prediction_id,
            balance = %state.balance,
            "Paper position opened"
        );
        Ok(true)
    }

    async fn check_and_close_expired(&self) -> Result<Vec<ExitEvent>> {
        self.check_exits_on(Utc::now().date_naive()).await
    }

    async fn open_positions_summary(&self) -> Result<Vec<PositionSummary>> {
        let state = self.state.read().await;
        Ok(state
            .positions
            .iter()
            .map(|p| {
                let cost = p.prediction.total_cost;
                let unrealized_pnl = p.market_value() - cost;
                let unrealized_pnl_pct = if cost > Decimal::ZERO {
                    unrealized_pnl / cost * Decimal::ONE_HUNDRED
                } else {
                    Decimal::ZERO
                };
                PositionSummary {
                    prediction_id: p.prediction.prediction_id.clone(),
                    contract_symbol: p.prediction.contract_symbol.clone(),
                    contracts: p.prediction.contracts,
                    unrealized_pnl,
                    unrealized_pnl_pct,
                }
            })
            .collect())
    }

    async fn performance_summary(&self) -> Result<PerformanceSummary> {
        let state = self.state.read().await;

        let open_value: Decimal = state.positions.iter().map(|p| p.market_value()).sum();
        let total_return = state.balance + open_value - state.initial_balance;
        let total_return_pct = if state.initial_balance > Decimal::ZERO {
            total_return / state.initial_balance * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        let total_trades = state.closed.len() as u64;
        let wins = state.closed.iter().filter(|e| e.is_win()).count() as u64;
        let win_rate = if total_trades > 0 {
            Decimal::from(wins) / Decimal::from(total_trades)
        } else {
            Decimal::ZERO
        };

        let gross_profit: Decimal = state
            .closed
            .iter()
            .filter(|e| e.realized_pnl > Decimal::ZERO)
            .map(|e| e.realized_pnl)
            .sum();
        let gross_loss: Decimal = state
            .closed
            .iter()
            .filter(|e| e.realized_pnl < Decimal::ZERO)
            .map(|e| -e.realized_pnl)
            .sum();
        let profit_factor = if gross_loss > Decimal::ZERO {
            Some(gross_profit / gross_loss)
        } else {
            None
        };

        Ok(PerformanceSummary {
            account_balance: state.balance,
            total_return,
            total_return_pct,
            win_rate,
            total_trades,
            profit_factor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::traits::MockOptionChainSource;
    use crate::exchange::types::{OptionQuote, OptionType};
    use crate::strategy::TradeAction;
    use rust_decimal_macros::dec;

    impl PaperLedger {
        async fn balance(&self) -> Decimal {
            self.state.read().await.balance
        }

        async fn open_count(&self) -> usize {
            self.state.read().await.positions.len()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
    }

    fn prediction(id: &str, contract: &str) -> Prediction {
        Prediction {
            prediction_id: id.to_string(),
            action: TradeAction::BuyCall,
            contract_symbol: contract.to_string(),
            option_type: OptionType::Call,
            strike: dec!(500),
            expiry: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            days_to_expiry: 29,
            contracts: 2,
            entry_price: dec!(4.00),
            total_cost: dec!(800),
            commission: dec!(1.30),
            delta: 0.4,
            implied_volatility: 0.18,
            confidence: 0.81,
            expected_profit_pct: 0.5,
            profit_target_price: dec!(6.00),
            stop_loss_price: dec!(2.80),
            exit_before_expiry_days: 2,
        }
    }

    fn quote(contract: &str, bid: Decimal) -> OptionQuote {
        OptionQuote {
            contract_symbol: contract.to_string(),
            option_type: OptionType::Call,
            strike: dec!(500),
            expiry: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            bid,
            ask: bid + dec!(0.10),
            delta: 0.45,
            implied_volatility: 0.18,
            open_interest: 100,
        }
    }

    fn ledger_with_bid(bid: Decimal) -> PaperLedger {
        let mut chain = MockOptionChainSource::new();
        chain
            .expect_quote()
            .returning(move |c| Ok(Some(quote(c, bid))));
        PaperLedger::new(dec!(10000), dec!(0.65), Arc::new(chain))
    }

    #[tokio::test]
    async fn test_open_debits_cost_and_commission() {
        let ledger = ledger_with_bid(dec!(4.00));
        assert!(ledger.open(&prediction("p1", "C1")).await.unwrap());
        assert_eq!(ledger.balance().await, dec!(9198.70));
        assert_eq!(ledger.open_count().await, 1);
    }

    #[tokio::test]
    async fn test_open_refuses_duplicates_and_overdraft() {
        let ledger = ledger_with_bid(dec!(4.00));
        assert!(ledger.open(&prediction("p1", "C1")).await.unwrap());
        assert!(!ledger.open(&prediction("p2", "C1")).await.unwrap());

        let mut big = prediction("p3", "C2");
        big.total_cost = dec!(20000);
        assert!(!ledger.open(&big).await.unwrap());
        assert_eq!(ledger.open_count().await, 1);
    }

    #[tokio::test]
    async fn test_profit_target_closes_position() {
        let ledger = ledger_with_bid(dec!(6.20));
        ledger.open(&prediction("p1", "C1")).await.unwrap();

        let events = ledger.check_exits_on(today()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, ExitReason::ProfitTarget);
        // 1240 - 1.30 exit - 801.30 basis
        assert_eq!(events[0].realized_pnl, dec!(437.40));
        assert_eq!(ledger.open_count().await, 0);
        assert_eq!(ledger.balance().await, dec!(9198.70) + dec!(1238.70));

        let perf = ledger.performance_summary().await.unwrap();
        assert_eq!(perf.total_trades, 1);
        assert_eq!(perf.win_rate, dec!(1));
        assert_eq!(perf.profit_factor, None);
        assert_eq!(perf.total_return, dec!(437.40));
    }

    #[tokio::test]
    async fn test_stop_loss_closes_position() {
        let ledger = ledger_with_bid(dec!(2.50));
        ledger.open(&prediction("p1", "C1")).await.unwrap();

        let events = ledger.check_exits_on(today()).await.unwrap();
        assert_eq!(events[0].reason, ExitReason::StopLoss);
        assert!(!events[0].is_win());
    }

    #[tokio::test]
    async fn test_time_exit_near_expiry() {
        let ledger = ledger_with_bid(dec!(4.10));
        ledger.open(&prediction("p1", "C1")).await.unwrap();

        let far = ledger.check_exits_on(today()).await.unwrap();
        assert!(far.is_empty());

        let near = NaiveDate::from_ymd_opt(2025, 1, 29).unwrap();
        let events = ledger.check_exits_on(near).await.unwrap();
        assert_eq!(events[0].reason, ExitReason::TimeExit);
    }

    #[tokio::test]
    async fn test_quote_failure_keeps_position() {
        let mut chain = MockOptionChainSource::new();
        chain
            .expect_quote()
            .returning(|_| Err(anyhow::anyhow!("timeout")));
        let ledger = PaperLedger::new(dec!(10000), dec!(0.65), Arc::new(chain));
        ledger.open(&prediction("p1", "C1")).await.unwrap();

        assert!(ledger.check_exits_on(today()).await.unwrap().is_empty());
        assert_eq!(ledger.open_count().await, 1);
    }

    #[tokio::test]
    async fn test_unrealized_pnl_uses_last_mark() {
        let ledger = ledger_with_bid(dec!(5.00));
        ledger.open(&prediction("p1", "C1")).await.unwrap();
        ledger.check_exits_on(today()).await.unwrap();

        let open = ledger.open_positions_summary().await.unwrap();
        assert_eq!(open[0].unrealized_pnl, dec!(200));
        assert_eq!(open[0].unrealized_pnl_pct, dec!(25));
    }
}
