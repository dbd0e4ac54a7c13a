use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// High minus low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Typical price (H+L+C)/3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Direction of a point event (gap, grab, thrust, breakout...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bias::Bullish => write!(f, "bullish"),
            Bias::Bearish => write!(f, "bearish"),
        }
    }
}

/// Window invariant violations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("bar {index}: non-finite or negative field")]
    InvalidValue { index: usize },
    #[error("bar {index}: low/open/close/high out of order")]
    InconsistentRange { index: usize },
    #[error("bar {index}: timestamp {timestamp} is not after the previous bar")]
    NonIncreasingTimestamp { index: usize, timestamp: DateTime<Utc> },
}

/// Check a window against the OHLCV invariants:
/// finite non-negative fields, low <= min(open, close) <= max(open, close) <= high,
/// strictly increasing timestamps.
pub fn validate_window(bars: &[Bar]) -> Result<(), WindowError> {
    for (index, bar) in bars.iter().enumerate() {
        let fields = [bar.open, bar.high, bar.low, bar.close, bar.volume];
        if fields.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(WindowError::InvalidValue { index });
        }

        let body_low = bar.open.min(bar.close);
        let body_high = bar.open.max(bar.close);
        if bar.low > body_low || body_high > bar.high {
            return Err(WindowError::InconsistentRange { index });
        }

        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(WindowError::NonIncreasingTimestamp {
                index,
                timestamp: bar.timestamp,
            });
        }
    }
    Ok(())
}
