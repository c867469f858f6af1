//! Contract selection: turns a directional decision into a sized trade.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::SelectionConfig;
use crate::exchange::{OptionChain, OptionChainSource, OptionQuote, CONTRACT_MULTIPLIER};
use crate::signals::AggregatedDecision;

use super::prediction::{Prediction, TradeAction};

/// Picks a concrete contract for a decision.
///
/// `Ok(None)` means no listed contract passes the filters; the returned
/// prediction has an empty `prediction_id`, which the gate assigns.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContractSelector: Send + Sync {
    async fn propose(
        &self,
        decision: &AggregatedDecision,
        capital: Decimal,
    ) -> Result<Option<Prediction>>;
}

/// Selects near-target-delta long calls or puts from the live chain.
pub struct ChainContractSelector {
    symbol: String,
    config: SelectionConfig,
    chain: Arc<dyn OptionChainSource>,
}

impl ChainContractSelector {
    pub fn new(
        symbol: impl Into<String>,
        config: SelectionConfig,
        chain: Arc<dyn OptionChainSource>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            config,
            chain,
        }
    }

    /// Select from an already fetched chain as of `today`.
    pub fn select(
        &self,
        decision: &AggregatedDecision,
        capital: Decimal,
        chain: &OptionChain,
        today: NaiveDate,
    ) -> Option<Prediction> {
        let action = TradeAction::for_direction(decision.direction)?;
        let option_type = action.option_type();
        let cfg = &self.config;

        let mut candidates: Vec<(&OptionQuote, f64, i64)> = chain
            .quotes
            .iter()
            .filter(|q| q.option_type == option_type)
            .filter_map(|q| {
                let dte = q.days_to_expiry(today);
                if dte < cfg.min_days_to_expiry || dte > cfg.max_days_to_expiry {
                    return None;
                }
                if q.bid <= Decimal::ZERO || q.ask <= Decimal::ZERO {
                    return None;
                }
                if q.spread_pct()? > cfg.max_spread_pct {
                    return None;
                }
                let distance = (q.delta.abs() - cfg.target_delta).abs();
                if distance > cfg.delta_tolerance {
                    return None;
                }
                Some((q, distance, dte))
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then(a.2.cmp(&b.2))
                .then(a.0.strike.cmp(&b.0.strike))
        });

        let Some(&(quote, _, dte)) = candidates.first() else {
            debug!(%option_type, quotes = chain.quotes.len(), "No contract passed selection filters");
            return None;
        };

        let entry_price = quote.mid();
        let per_contract = entry_price * CONTRACT_MULTIPLIER;
        let budget = capital * cfg.max_position_pct;
        let affordable = (budget / per_contract).floor().to_u32().unwrap_or(0);
        let contracts = affordable.min(cfg.max_contracts);
        if contracts == 0 {
            info!(
                "💸 [SELECT] {} unaffordable: ${:.2}/contract vs budget ${:.2}",
                quote.contract_symbol, per_contract, budget
            );
            return None;
        }

        let qty = Decimal::from(contracts);
        let expected_profit_pct = expected_profit_pct(
            decision.expected_move_pct,
            quote.delta,
            chain.underlying_price,
            entry_price,
        );

        Some(Prediction {
            prediction_id: String::new(),
            action,
            contract_symbol: quote.contract_symbol.clone(),
            option_type,
            strike: quote.strike,
            expiry: quote.expiry,
            days_to_expiry: dte,
            contracts,
            entry_price,
            total_cost: entry_price * CONTRACT_MULTIPLIER * qty,
            commission: cfg.commission_per_contract * qty,
            delta: quote.delta,
            implied_volatility: quote.implied_volatility,
            confidence: decision.confidence,
            expected_profit_pct,
            profit_target_price: (entry_price * (Decimal::ONE + cfg.profit_target_pct)).round_dp(2),
            stop_loss_price: (entry_price * (Decimal::ONE - cfg.stop_loss_pct)).round_dp(2),
            exit_before_expiry_days: cfg.exit_before_expiry_days,
        })
    }
}

/// Premium change implied by the expected underlying move, via delta.
fn expected_profit_pct(
    expected_move_pct: f64,
    delta: f64,
    underlying_price: Decimal,
    entry_price: Decimal,
) -> f64 {
    let (Some(underlying), Some(entry)) = (underlying_price.to_f64(), entry_price.to_f64()) else {
        return 0.0;
    };
    if entry <= 0.0 {
        return 0.0;
    }
    expected_move_pct * delta.abs() * underlying / entry
}

#[async_trait]
impl ContractSelector for ChainContractSelector {
    async fn propose(
        &self,
        decision: &AggregatedDecision,
        capital: Decimal,
    ) -> Result<Option<Prediction>> {
        let chain = self.chain.chain(&self.symbol).await?;
        Ok(self.select(decision, capital, &chain, Utc::now().date_naive()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{MockOptionChainSource, OptionType};
    use crate::signals::Direction;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
    }

    fn decision(direction: Direction, confidence: f64) -> AggregatedDecision {
        AggregatedDecision {
            direction,
            confidence,
            expected_move_pct: 0.02,
            buy_strength: 0.0,
            sell_strength: 0.0,
            dominant_signal: None,
            signals: Vec::new(),
        }
    }

    fn quote(
        symbol: &str,
        option_type: OptionType,
        strike: Decimal,
        days: i64,
        bid: Decimal,
        ask: Decimal,
        delta: f64,
    ) -> OptionQuote {
        OptionQuote {
            contract_symbol: symbol.to_string(),
            option_type,
            strike,
            expiry: today() + chrono::Duration::days(days),
            bid,
            ask,
            delta,
            implied_volatility: 0.2,
            open_interest: 1000,
        }
    }

    fn chain() -> OptionChain {
        OptionChain {
            symbol: "SPY".to_string(),
            underlying_price: dec!(500),
            quotes: vec![
                // too short-dated
                quote("C_SHORT", OptionType::Call, dec!(500), 3, dec!(2.0), dec!(2.1), 0.40),
                // good call
                quote("C_GOOD", OptionType::Call, dec!(505), 21, dec!(4.90), dec!(5.10), 0.42),
                // further from target delta
                quote("C_DEEP", OptionType::Call, dec!(480), 21, dec!(21.0), dec!(21.4), 0.52),
                // spread too wide
                quote("C_WIDE", OptionType::Call, dec!(502), 21, dec!(3.0), dec!(4.0), 0.40),
                // good put
                quote("P_GOOD", OptionType::Put, dec!(495), 14, dec!(3.95), dec!(4.05), -0.38),
            ],
        }
    }

    fn selector() -> ChainContractSelector {
        ChainContractSelector::new(
            "SPY",
            SelectionConfig::default(),
            Arc::new(MockOptionChainSource::new()),
        )
    }

    #[test]
    fn test_buy_selects_call_nearest_target_delta() {
        let p = selector()
            .select(&decision(Direction::Buy, 0.81), dec!(10000), &chain(), today())
            .unwrap();

        assert_eq!(p.contract_symbol, "C_GOOD");
        assert_eq!(p.action, TradeAction::BuyCall);
        assert_eq!(p.option_type, OptionType::Call);
        assert_eq!(p.days_to_expiry, 21);
        assert_eq!(p.entry_price, dec!(5.00));
        // budget 1000 / 500 per contract
        assert_eq!(p.contracts, 2);
        assert_eq!(p.total_cost, dec!(1000));
        assert_eq!(p.commission, dec!(1.30));
        assert_eq!(p.profit_target_price, dec!(7.50));
        assert_eq!(p.stop_loss_price, dec!(3.50));
        assert_eq!(p.confidence, 0.81);
        assert!(p.prediction_id.is_empty());
        // 0.02 * 0.42 * 500 / 5
        assert!((p.expected_profit_pct - 0.84).abs() < 1e-9);
    }

    #[test]
    fn test_sell_selects_put() {
        let p = selector()
            .select(&decision(Direction::Sell, 0.8), dec!(10000), &chain(), today())
            .unwrap();
        assert_eq!(p.contract_symbol, "P_GOOD");
        assert_eq!(p.action, TradeAction::BuyPut);
        assert_eq!(p.contracts, 2);
    }

    #[test]
    fn test_contracts_capped() {
        let p = selector()
            .select(&decision(Direction::Sell, 0.8), dec!(1_000_000), &chain(), today())
            .unwrap();
        assert_eq!(p.contracts, 10);
    }

    #[test]
    fn test_hold_or_unaffordable_yields_none() {
        let s = selector();
        assert!(s
            .select(&decision(Direction::Hold, 0.9), dec!(10000), &chain(), today())
            .is_none());
        assert!(s
            .select(&decision(Direction::Buy, 0.9), dec!(1000), &chain(), today())
            .is_none());
    }

    #[test]
    fn test_no_matching_contract_yields_none() {
        let mut c = chain();
        c.quotes.retain(|q| q.option_type == OptionType::Call);
        assert!(selector()
            .select(&decision(Direction::Sell, 0.9), dec!(10000), &c, today())
            .is_none());
    }

    #[test]
    fn test_ties_prefer_nearer_expiry_then_lower_strike() {
        let c = OptionChain {
            symbol: "SPY".to_string(),
            underlying_price: dec!(500),
            quotes: vec![
                quote("LATE", OptionType::Call, dec!(500), 30, dec!(5), dec!(5.2), 0.40),
                quote("HIGH", OptionType::Call, dec!(505), 10, dec!(5), dec!(5.2), 0.40),
                quote("LOW", OptionType::Call, dec!(500), 10, dec!(5), dec!(5.2), 0.40),
            ],
        };
        let p = selector()
            .select(&decision(Direction::Buy, 0.9), dec!(100000), &c, today())
            .unwrap();
        assert_eq!(p.contract_symbol, "LOW");
    }

    #[tokio::test]
    async fn test_propose_fetches_chain() {
        let mut source = MockOptionChainSource::new();
        source
            .expect_chain()
            .withf(|symbol| symbol == "SPY")
            .times(1)
            .returning(|_| {
                Ok(OptionChain {
                    symbol: "SPY".to_string(),
                    underlying_price: dec!(500),
                    quotes: Vec::new(),
                })
            });
        let s = ChainContractSelector::new("SPY", SelectionConfig::default(), Arc::new(source));
        let proposal = s
            .propose(&decision(Direction::Buy, 0.9), dec!(10000))
            .await
            .unwrap();
        assert!(proposal.is_none());
    }
}
