//! Momentum and volume signals
//!
//! Rates of change, trend strength, on-balance volume, and three point-event
//! scanners: thrusts, breakouts and volume spikes.

use serde::{Deserialize, Serialize};

use super::patterns::linreg_slope;
use crate::types::{Bar, Bias};

/// Trailing bars used as the baseline for thrusts, breakouts and spikes
const BASELINE_BARS: usize = 20;

/// Bars in the volume-momentum average and OBV trend
const SHORT_BARS: usize = 10;

/// Single-bar close-to-close move for a thrust (0.3%)
const THRUST_MOVE: f64 = 0.003;

/// Volume multiple of the baseline for a thrust
const THRUST_VOLUME_MULT: f64 = 2.0;

/// Volume multiple of the baseline for a spike
const SPIKE_VOLUME_MULT: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrustSignal {
    #[serde(rename = "type")]
    pub bias: Bias,
    pub index: usize,
    /// Fractional close-to-close move
    pub price_move: f64,
    /// Bar volume over its trailing average
    pub volume_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutSignal {
    #[serde(rename = "type")]
    pub bias: Bias,
    pub index: usize,
    /// Prior high (bullish) or low (bearish) that was cleared
    pub level: f64,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpike {
    pub index: usize,
    pub volume: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentumFeatures {
    /// Fractional change over 5 bars
    pub roc_5: Option<f64>,
    /// Fractional change over 10 bars
    pub roc_10: Option<f64>,
    /// Close minus the close 10 bars back
    pub momentum_10: Option<f64>,
    /// Fitted 20-bar move as a fraction of the mean close, unsigned
    pub trend_strength: Option<f64>,
    pub thrust_signals: Vec<ThrustSignal>,
    pub breakout_signals: Vec<BreakoutSignal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeFeatures {
    /// Fractional volume change over 5 bars
    pub volume_roc: Option<f64>,
    /// Current volume over the trailing 10-bar average
    pub volume_momentum: Option<f64>,
    pub obv: Option<f64>,
    /// OBV change over the last 10 bars
    pub obv_trend: Option<f64>,
    /// Whether OBV moved with price over the last 10 bars
    pub obv_confirms: Option<bool>,
    pub volume_spikes: Vec<VolumeSpike>,
}

pub fn compute_momentum(bars: &[Bar]) -> MomentumFeatures {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    MomentumFeatures {
        roc_5: rate_of_change(&closes, 5),
        roc_10: rate_of_change(&closes, 10),
        momentum_10: difference(&closes, 10),
        trend_strength: trend_strength(&closes),
        thrust_signals: thrust_signals(bars),
        breakout_signals: breakout_signals(bars),
    }
}

pub fn compute_volume(bars: &[Bar]) -> VolumeFeatures {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let obv = on_balance_volume(bars);

    let obv_trend = difference(&obv, SHORT_BARS);
    let obv_confirms = match (obv_trend, difference(&closes, SHORT_BARS)) {
        (Some(o), Some(p)) if p != 0.0 => Some(o * p > 0.0),
        _ => None,
    };

    VolumeFeatures {
        volume_roc: rate_of_change(&volumes, 5),
        volume_momentum: volume_momentum(&volumes),
        obv: obv.last().copied(),
        obv_trend,
        obv_confirms,
        volume_spikes: volume_spikes(bars),
    }
}

/// values[n-1] / values[n-1-period] - 1
pub fn rate_of_change(values: &[f64], period: usize) -> Option<f64> {
    let n = values.len();
    if n <= period {
        return None;
    }
    let base = values[n - 1 - period];
    if base == 0.0 {
        return None;
    }
    Some(values[n - 1] / base - 1.0)
}

fn difference(values: &[f64], period: usize) -> Option<f64> {
    let n = values.len();
    if n <= period {
        return None;
    }
    Some(values[n - 1] - values[n - 1 - period])
}

fn trend_strength(closes: &[f64]) -> Option<f64> {
    if closes.len() < BASELINE_BARS {
        return None;
    }
    let tail = &closes[closes.len() - BASELINE_BARS..];
    let mean = tail.iter().sum::<f64>() / tail.len() as f64;
    if mean <= 0.0 {
        return None;
    }
    Some((linreg_slope(tail) * BASELINE_BARS as f64 / mean).abs())
}

fn volume_momentum(volumes: &[f64]) -> Option<f64> {
    let n = volumes.len();
    if n <= SHORT_BARS {
        return None;
    }
    let avg = mean(&volumes[n - 1 - SHORT_BARS..n - 1]);
    if avg > 0.0 {
        Some(volumes[n - 1] / avg)
    } else {
        None
    }
}

/// Cumulative on-balance volume, starting at zero on the first bar
pub fn on_balance_volume(bars: &[Bar]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    let mut total = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            let prev_close = bars[i - 1].close;
            if bar.close > prev_close {
                total += bar.volume;
            } else if bar.close < prev_close {
                total -= bar.volume;
            }
        }
        out.push(total);
    }

    out
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Average volume of the `BASELINE_BARS` bars before `index`
fn baseline_volume(bars: &[Bar], index: usize) -> f64 {
    mean(
        &bars[index - BASELINE_BARS..index]
            .iter()
            .map(|b| b.volume)
            .collect::<Vec<_>>(),
    )
}

pub fn thrust_signals(bars: &[Bar]) -> Vec<ThrustSignal> {
    let mut out = Vec::new();

    for i in BASELINE_BARS..bars.len() {
        let prev_close = bars[i - 1].close;
        if prev_close <= 0.0 {
            continue;
        }
        let price_move = (bars[i].close - prev_close) / prev_close;
        if price_move.abs() <= THRUST_MOVE {
            continue;
        }

        let avg = baseline_volume(bars, i);
        if avg <= 0.0 || bars[i].volume < avg * THRUST_VOLUME_MULT {
            continue;
        }

        out.push(ThrustSignal {
            bias: if price_move > 0.0 { Bias::Bullish } else { Bias::Bearish },
            index: i,
            price_move,
            volume_ratio: bars[i].volume / avg,
        });
    }

    out
}

pub fn breakout_signals(bars: &[Bar]) -> Vec<BreakoutSignal> {
    let mut out = Vec::new();

    for i in BASELINE_BARS..bars.len() {
        let prior = &bars[i - BASELINE_BARS..i];
        let prior_high = prior.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let prior_low = prior.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let close = bars[i].close;

        if close > prior_high {
            out.push(BreakoutSignal {
                bias: Bias::Bullish,
                index: i,
                level: prior_high,
                close,
            });
        } else if close < prior_low {
            out.push(BreakoutSignal {
                bias: Bias::Bearish,
                index: i,
                level: prior_low,
                close,
            });
        }
    }

    out
}

pub fn volume_spikes(bars: &[Bar]) -> Vec<VolumeSpike> {
    let mut out = Vec::new();

    for i in BASELINE_BARS..bars.len() {
        let avg = baseline_volume(bars, i);
        if avg > 0.0 && bars[i].volume > avg * SPIKE_VOLUME_MULT {
            out.push(VolumeSpike {
                index: i,
                volume: bars[i].volume,
                ratio: bars[i].volume / avg,
            });
        }
    }

    out
}
