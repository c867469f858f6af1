//! Configuration management for the options signal trader.
//!
//! Loads settings from `.env`, an optional `config` file and `OST__*`
//! environment variables.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::signals::SignalCategory;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Underlying instrument traded by this bot
    #[serde(default = "default_underlying")]
    pub underlying: String,
    /// Strategy identifier recorded alongside tracked signals
    #[serde(default = "default_strategy_id")]
    pub strategy_id: String,
    /// Trade admission and gating
    #[serde(default)]
    pub trading: TradingConfig,
    /// Cycle timing
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Weighted-vote constants
    #[serde(default)]
    pub aggregation: AggregationConfig,
    /// Signal analyzers, in aggregation order
    #[serde(default = "default_signals")]
    pub signals: Vec<SignalSpec>,
    /// Contract selection filters and exit rules
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Option chain data source
    #[serde(default)]
    pub chain: ChainConfig,
    /// Exchange session hours
    #[serde(default)]
    pub market: MarketConfig,
    /// Notification sink
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Signal tracking database
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Execute trades; when false the bot runs in prediction-only mode
    #[serde(default)]
    pub enabled: bool,
    /// Minimum aggregated confidence for a prediction (inclusive)
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Maximum concurrently open positions
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    /// Starting balance of the paper ledger
    #[serde(default = "default_initial_capital")]
    pub initial_capital: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Wait between decision cycles while the market is open
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
    /// Poll interval while the market is closed
    #[serde(default = "default_market_closed_poll")]
    pub market_closed_poll_secs: u64,
    /// Send a cycle summary every N cycles
    #[serde(default = "default_summary_every")]
    pub summary_every_cycles: u64,
    /// Dispatch outcome tracking every N cycles
    #[serde(default = "default_maintenance_every")]
    pub maintenance_every_cycles: u64,
    /// Per-analyzer deadline before falling back to HOLD
    #[serde(default = "default_signal_timeout")]
    pub signal_timeout_secs: u64,
}

/// Named constants of the weighted vote.
///
/// Thresholds on the combined strengths are deliberately low compared to
/// the prediction gate: the vote only has to establish a direction, the
/// gate decides whether it is worth an options trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Signals above this confidence are override candidates
    #[serde(default = "default_override_floor")]
    pub override_candidate_confidence: f64,
    /// Best candidate must exceed this confidence to take over the decision
    #[serde(default = "default_override_trigger")]
    pub override_trigger_confidence: f64,
    /// Safety discount applied to an overriding signal's confidence
    #[serde(default = "default_override_discount")]
    pub override_confidence_discount: f64,
    /// Expected move per unit of the overriding signal's strength
    #[serde(default = "default_override_move_factor")]
    pub override_move_factor: f64,
    /// Minimum combined buy+sell strength for a directional vote
    #[serde(default = "default_min_total_strength")]
    pub min_total_strength: f64,
    /// Minimum buy/sell separation for a directional vote
    #[serde(default = "default_min_strength_diff")]
    pub min_strength_diff: f64,
    /// Scale of the winning share in the vote confidence
    #[serde(default = "default_vote_scale")]
    pub vote_confidence_scale: f64,
    /// Base added to the scaled winning share
    #[serde(default = "default_vote_base")]
    pub vote_confidence_base: f64,
    /// Smoothing term in the winning-share denominator
    #[serde(default = "default_vote_epsilon")]
    pub vote_epsilon: f64,
    /// Ceiling on vote confidence
    #[serde(default = "default_max_vote_confidence")]
    pub max_vote_confidence: f64,
    /// Expected move per unit of strength difference
    #[serde(default = "default_move_scale")]
    pub move_scale: f64,
    /// Ceiling on the expected move
    #[serde(default = "default_max_expected_move")]
    pub max_expected_move: f64,
    /// Confidence reported for a HOLD vote
    #[serde(default = "default_hold_confidence")]
    pub hold_confidence: f64,
    /// Weight multiplier for regime-favoured signal categories
    #[serde(default = "default_regime_boost")]
    pub regime_weight_boost: f64,
    /// Upper bound for a boosted weight (before renormalization)
    #[serde(default = "default_regime_cap")]
    pub regime_weight_cap: f64,
}

/// One configured signal analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSpec {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub category: SignalCategory,
    /// Endpoint queried by the HTTP analyzer
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Shortest acceptable days to expiry
    #[serde(default = "default_min_dte")]
    pub min_days_to_expiry: i64,
    /// Longest acceptable days to expiry
    #[serde(default = "default_max_dte")]
    pub max_days_to_expiry: i64,
    /// Preferred absolute delta
    #[serde(default = "default_target_delta")]
    pub target_delta: f64,
    /// Allowed distance from the preferred delta
    #[serde(default = "default_delta_tolerance")]
    pub delta_tolerance: f64,
    /// Maximum (ask - bid) / mid
    #[serde(default = "default_max_spread_pct")]
    pub max_spread_pct: Decimal,
    /// Fraction of available capital one trade may use
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: Decimal,
    /// Hard cap on contracts per trade
    #[serde(default = "default_max_contracts")]
    pub max_contracts: u32,
    /// Broker commission per contract
    #[serde(default = "default_commission")]
    pub commission_per_contract: Decimal,
    /// Take profit at entry * (1 + pct)
    #[serde(default = "default_profit_target_pct")]
    pub profit_target_pct: Decimal,
    /// Stop out at entry * (1 - pct)
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    /// Close positions this many days before expiry
    #[serde(default = "default_exit_before_expiry")]
    pub exit_before_expiry_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Base URL of the option chain service
    #[serde(default = "default_chain_url")]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// IANA timezone of the exchange
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Session open, HH:MM local time
    #[serde(default = "default_open")]
    pub open: String,
    /// Session close, HH:MM local time
    #[serde(default = "default_close")]
    pub close: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Webhook receiving `{"text": ...}` posts; log-only when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database for signal tracking
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

// Default value functions
fn default_underlying() -> String {
    "SPY".to_string()
}

fn default_strategy_id() -> String {
    "weighted_vote_v1".to_string()
}

fn default_confidence_threshold() -> f64 {
    0.75 // options are costlier to reverse than the vote's own thresholds
}

fn default_max_open_positions() -> usize {
    3
}

fn default_initial_capital() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_cycle_interval() -> u64 {
    15 * 60
}

fn default_market_closed_poll() -> u64 {
    5 * 60
}

fn default_summary_every() -> u64 {
    4
}

fn default_maintenance_every() -> u64 {
    5
}

fn default_signal_timeout() -> u64 {
    30
}

fn default_override_floor() -> f64 {
    0.7
}

fn default_override_trigger() -> f64 {
    0.85
}

fn default_override_discount() -> f64 {
    0.9
}

fn default_override_move_factor() -> f64 {
    0.05
}

fn default_min_total_strength() -> f64 {
    0.15
}

fn default_min_strength_diff() -> f64 {
    0.1
}

fn default_vote_scale() -> f64 {
    0.8
}

fn default_vote_base() -> f64 {
    0.5
}

fn default_vote_epsilon() -> f64 {
    0.01
}

fn default_max_vote_confidence() -> f64 {
    0.85
}

fn default_move_scale() -> f64 {
    0.8
}

fn default_max_expected_move() -> f64 {
    0.06 // 6% move
}

fn default_hold_confidence() -> f64 {
    0.5
}

fn default_regime_boost() -> f64 {
    1.5
}

fn default_regime_cap() -> f64 {
    0.6
}

fn default_signals() -> Vec<SignalSpec> {
    let spec = |name: &str, weight: f64, category: SignalCategory| SignalSpec {
        name: name.to_string(),
        weight,
        category,
        url: format!("http://127.0.0.1:8700/signals/{}", name),
    };
    vec![
        spec("technical", 0.25, SignalCategory::Technical),
        spec("momentum", 0.20, SignalCategory::Momentum),
        spec("mean_reversion", 0.15, SignalCategory::MeanReversion),
        spec("options_flow", 0.15, SignalCategory::Flow),
        spec("sentiment", 0.15, SignalCategory::Sentiment),
        spec("ml_model", 0.10, SignalCategory::Model),
    ]
}

fn default_min_dte() -> i64 {
    7
}

fn default_max_dte() -> i64 {
    45
}

fn default_target_delta() -> f64 {
    0.40
}

fn default_delta_tolerance() -> f64 {
    0.15
}

fn default_max_spread_pct() -> Decimal {
    Decimal::new(15, 2) // 0.15
}

fn default_max_position_pct() -> Decimal {
    Decimal::new(10, 2) // 0.10 of available capital
}

fn default_max_contracts() -> u32 {
    10
}

fn default_commission() -> Decimal {
    Decimal::new(65, 2) // $0.65 per contract
}

fn default_profit_target_pct() -> Decimal {
    Decimal::new(50, 2) // +50%
}

fn default_stop_loss_pct() -> Decimal {
    Decimal::new(30, 2) // -30%
}

fn default_exit_before_expiry() -> i64 {
    2
}

fn default_chain_url() -> String {
    "http://127.0.0.1:8700/options".to_string()
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_open() -> String {
    "09:30".to_string()
}

fn default_close() -> String {
    "16:00".to_string()
}

fn default_db_path() -> String {
    "data/signals.db".to_string()
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("OST"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.underlying.is_empty(), "underlying must be set");

        anyhow::ensure!(
            (0.0..=1.0).contains(&self.trading.confidence_threshold),
            "confidence_threshold must be between 0 and 1"
        );

        anyhow::ensure!(
            self.trading.max_open_positions >= 1,
            "max_open_positions must be at least 1"
        );

        anyhow::ensure!(!self.signals.is_empty(), "at least one signal is required");

        for signal in &self.signals {
            anyhow::ensure!(
                (0.0..=1.0).contains(&signal.weight),
                "weight of signal '{}' must be between 0 and 1",
                signal.name
            );
        }

        let mut names: Vec<&str> = self.signals.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        anyhow::ensure!(
            names.len() == self.signals.len(),
            "signal names must be unique"
        );

        anyhow::ensure!(
            self.schedule.cycle_interval_secs > 0
                && self.schedule.market_closed_poll_secs > 0
                && self.schedule.summary_every_cycles > 0
                && self.schedule.maintenance_every_cycles > 0,
            "schedule intervals must be positive"
        );

        anyhow::ensure!(
            self.selection.min_days_to_expiry <= self.selection.max_days_to_expiry,
            "min_days_to_expiry must be <= max_days_to_expiry"
        );

        anyhow::ensure!(
            self.selection.max_position_pct > Decimal::ZERO
                && self.selection.max_position_pct <= Decimal::ONE,
            "max_position_pct must be between 0 and 1"
        );

        anyhow::ensure!(
            self.selection.stop_loss_pct > Decimal::ZERO
                && self.selection.stop_loss_pct < Decimal::ONE,
            "stop_loss_pct must be between 0 and 1"
        );

        self.market.timezone.parse::<chrono_tz::Tz>().map_err(|e| {
            anyhow::anyhow!("invalid market timezone '{}': {}", self.market.timezone, e)
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            underlying: default_underlying(),
            strategy_id: default_strategy_id(),
            trading: TradingConfig::default(),
            schedule: ScheduleConfig::default(),
            aggregation: AggregationConfig::default(),
            signals: default_signals(),
            selection: SelectionConfig::default(),
            chain: ChainConfig::default(),
            market: MarketConfig::default(),
            notifications: NotificationConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            confidence_threshold: default_confidence_threshold(),
            max_open_positions: default_max_open_positions(),
            initial_capital: default_initial_capital(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval(),
            market_closed_poll_secs: default_market_closed_poll(),
            summary_every_cycles: default_summary_every(),
            maintenance_every_cycles: default_maintenance_every(),
            signal_timeout_secs: default_signal_timeout(),
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            override_candidate_confidence: default_override_floor(),
            override_trigger_confidence: default_override_trigger(),
            override_confidence_discount: default_override_discount(),
            override_move_factor: default_override_move_factor(),
            min_total_strength: default_min_total_strength(),
            min_strength_diff: default_min_strength_diff(),
            vote_confidence_scale: default_vote_scale(),
            vote_confidence_base: default_vote_base(),
            vote_epsilon: default_vote_epsilon(),
            max_vote_confidence: default_max_vote_confidence(),
            move_scale: default_move_scale(),
            max_expected_move: default_max_expected_move(),
            hold_confidence: default_hold_confidence(),
            regime_weight_boost: default_regime_boost(),
            regime_weight_cap: default_regime_cap(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_days_to_expiry: default_min_dte(),
            max_days_to_expiry: default_max_dte(),
            target_delta: default_target_delta(),
            delta_tolerance: default_delta_tolerance(),
            max_spread_pct: default_max_spread_pct(),
            max_position_pct: default_max_position_pct(),
            max_contracts: default_max_contracts(),
            commission_per_contract: default_commission(),
            profit_target_pct: default_profit_target_pct(),
            stop_loss_pct: default_stop_loss_pct(),
            exit_before_expiry_days: default_exit_before_expiry(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            url: default_chain_url(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            open: default_open(),
            close: default_close(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let total: f64 = Config::default().signals.iter().map(|s| s.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_signal_names_rejected() {
        let mut config = Config::default();
        let first = config.signals[0].clone();
        config.signals.push(first);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = Config::default();
        config.trading.confidence_threshold = 75.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_timezone_rejected() {
        let mut config = Config::default();
        config.market.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
    }
}
