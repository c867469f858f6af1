//! Market-hours gating.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::MarketConfig;

/// Tells the scheduler whether a cycle may run now.
pub trait MarketClock: Send + Sync {
    fn is_open(&self, now: DateTime<Utc>) -> bool;
}

/// Regular weekday session in the exchange's local time.
///
/// Holidays are not modelled.
#[derive(Debug, Clone)]
pub struct ExchangeHours {
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
}

impl ExchangeHours {
    pub fn new(tz: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        Self { tz, open, close }
    }

    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid market timezone '{}': {}", config.timezone, e))?;
        let open = NaiveTime::parse_from_str(&config.open, "%H:%M")
            .with_context(|| format!("invalid market open '{}'", config.open))?;
        let close = NaiveTime::parse_from_str(&config.close, "%H:%M")
            .with_context(|| format!("invalid market close '{}'", config.close))?;
        anyhow::ensure!(open < close, "market open must be before close");
        Ok(Self::new(tz, open, close))
    }
}

impl MarketClock for ExchangeHours {
    fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let t = local.time();
        self.open <= t && t < self.close
    }
}
