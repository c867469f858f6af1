//! Normalized signal types shared by adapters and the aggregator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Directional opinion of a signal or decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::Hold => "HOLD",
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, Direction::Hold)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "BULLISH" | "LONG" => Ok(Direction::Buy),
            "SELL" | "BEARISH" | "SHORT" => Ok(Direction::Sell),
            "HOLD" | "NEUTRAL" => Ok(Direction::Hold),
            _ => Err(SignalError::UnknownDirection(s.to_string())),
        }
    }
}

/// Family a signal belongs to; used by regime weight adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Technical,
    Momentum,
    MeanReversion,
    Flow,
    Sentiment,
    Model,
    #[default]
    Other,
}

/// Loosely shaped analyzer output, exactly as received.
///
/// Every field is optional; the adapter applies defaults and validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub strength: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Reasons an analyzer output was replaced by the neutral fallback.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("unknown direction '{0}'")]
    UnknownDirection(String),
    #[error("confidence {0} is not a finite non-negative number")]
    InvalidConfidence(f64),
    #[error("strength {0} is not a finite non-negative number")]
    InvalidStrength(f64),
    #[error("analyzer reported: {0}")]
    Reported(String),
    #[error("analyzer timed out after {0}s")]
    Timeout(u64),
    #[error("analyzer failed: {0}")]
    Failed(String),
}

/// Normalized output of one signal adapter for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalResult {
    pub direction: Direction,
    /// Certainty in [0, 1]
    pub confidence: f64,
    /// Conviction, independent of confidence
    pub strength: f64,
    pub error: Option<String>,
}

impl SignalResult {
    pub const DEFAULT_CONFIDENCE: f64 = 0.5;
    pub const DEFAULT_STRENGTH: f64 = 0.1;

    pub fn new(direction: Direction, confidence: f64, strength: f64) -> Self {
        Self {
            direction,
            confidence: normalize_confidence(confidence),
            strength,
            error: None,
        }
    }

    /// Neutral result standing in for a failed analyzer.
    pub fn fallback(error: impl Into<String>) -> Self {
        Self {
            direction: Direction::Hold,
            confidence: Self::DEFAULT_CONFIDENCE,
            strength: 0.0,
            error: Some(error.into()),
        }
    }

    /// Validate a raw analyzer output, defaulting missing fields.
    pub fn from_raw(raw: RawSignal) -> Result<Self, SignalError> {
        if let Some(error) = raw.error.filter(|e| !e.trim().is_empty()) {
            return Err(SignalError::Reported(error));
        }

        let direction = match raw.direction.as_deref() {
            Some(d) => d.parse()?,
            None => Direction::Hold,
        };

        let confidence = raw.confidence.unwrap_or(Self::DEFAULT_CONFIDENCE);
        if !confidence.is_finite() || confidence < 0.0 {
            return Err(SignalError::InvalidConfidence(confidence));
        }

        let strength = raw.strength.unwrap_or(Self::DEFAULT_STRENGTH);
        if !strength.is_finite() || strength < 0.0 {
            return Err(SignalError::InvalidStrength(strength));
        }

        Ok(Self::new(direction, confidence, strength))
    }

    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

/// Bring a confidence given either as a fraction or a percentage into [0, 1].
pub fn normalize_confidence(value: f64) -> f64 {
    let value = if value > 1.0 { value / 100.0 } else { value };
    value.clamp(0.0, 1.0)
}

/// A signal result labelled with the adapter that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSignal {
    pub name: String,
    pub weight: f64,
    pub result: SignalResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_confidence_matches_fraction() {
        assert_eq!(normalize_confidence(85.0), normalize_confidence(0.85));
        assert_eq!(normalize_confidence(85.0), 0.85);
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(normalize_confidence(250.0), 1.0);
        assert_eq!(normalize_confidence(1.0), 1.0);
    }

    #[test]
    fn test_missing_fields_defaulted() {
        let result = SignalResult::from_raw(RawSignal::default()).unwrap();
        assert_eq!(result.direction, Direction::Hold);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.strength, 0.1);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_direction_aliases() {
        assert_eq!("bullish".parse::<Direction>().unwrap(), Direction::Buy);
        assert_eq!(" sell ".parse::<Direction>().unwrap(), Direction::Sell);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_malformed_values_rejected() {
        let raw = RawSignal {
            direction: Some("BUY".into()),
            confidence: Some(f64::NAN),
            ..Default::default()
        };
        assert!(matches!(
            SignalResult::from_raw(raw),
            Err(SignalError::InvalidConfidence(_))
        ));

        let raw = RawSignal {
            strength: Some(-0.2),
            ..Default::default()
        };
        assert!(matches!(
            SignalResult::from_raw(raw),
            Err(SignalError::InvalidStrength(_))
        ));
    }

    #[test]
    fn test_reported_error_rejected() {
        let raw = RawSignal {
            direction: Some("BUY".into()),
            error: Some("model not loaded".into()),
            ..Default::default()
        };
        assert!(matches!(
            SignalResult::from_raw(raw),
            Err(SignalError::Reported(_))
        ));
    }

    #[test]
    fn test_fallback_is_neutral() {
        let fb = SignalResult::fallback("boom");
        assert_eq!(fb.direction, Direction::Hold);
        assert_eq!(fb.confidence, 0.5);
        assert_eq!(fb.strength, 0.0);
        assert!(fb.is_fallback());
    }
}
