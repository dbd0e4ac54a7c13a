//! Technical indicators over a rolling OHLCV window
//!
//! Every indicator uses the full window history and only the latest value is
//! surfaced. An indicator whose period exceeds the available history is left
//! out of the result rather than filled with a placeholder.

use std::collections::BTreeMap;

use crate::config::IndicatorConfig;
use crate::types::Bar;

/// Latest indicator values keyed by name (`sma_20`, `rsi_14`, `macd`, ...)
pub type IndicatorSet = BTreeMap<String, f64>;

/// Compute every configured indicator that the window has enough bars for
pub fn compute_indicators(bars: &[Bar], config: &IndicatorConfig) -> IndicatorSet {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let mut out = IndicatorSet::new();

    for &period in &config.sma_periods {
        if let Some(v) = sma(&closes, period) {
            out.insert(format!("sma_{}", period), v);
        }
    }

    for &period in &config.ema_periods {
        if let Some(v) = ema_series(&closes, period).last() {
            out.insert(format!("ema_{}", period), *v);
        }
    }

    for &period in &config.rsi_periods {
        if let Some(v) = rsi(&closes, period) {
            out.insert(format!("rsi_{}", period), v);
        }
    }

    if let Some(m) = macd(&closes, config.macd_fast, config.macd_slow, config.macd_signal) {
        out.insert("macd".to_string(), m.line);
        out.insert("macd_signal".to_string(), m.signal);
        out.insert("macd_histogram".to_string(), m.histogram);
    }

    if let Some(b) = bollinger(&closes, config.bb_period, config.bb_std_dev) {
        out.insert("bb_upper".to_string(), b.upper);
        out.insert("bb_middle".to_string(), b.middle);
        out.insert("bb_lower".to_string(), b.lower);
        out.insert("bb_width".to_string(), b.width);
    }

    if let Some(v) = atr(bars, config.atr_period) {
        out.insert("atr".to_string(), v);
    }

    if let Some(v) = sma(&volumes, config.volume_ma_period) {
        out.insert("volume_sma".to_string(), v);
    }

    out
}

/// Simple moving average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let tail = &values[values.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average series, seeded with the SMA of the first
/// `period` values. Element 0 corresponds to input index `period - 1`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for &v in &values[period..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

/// Relative Strength Index with Wilder smoothing.
///
/// Needs `period` price changes, i.e. `period + 1` bars.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;

    let p = period as f64;
    for &c in &changes[period..] {
        avg_gain = (avg_gain * (p - 1.0) + c.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-c).max(0.0)) / p;
    }

    let value = if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    Some(value.clamp(0.0, 100.0))
}

/// MACD line, signal line and histogram at the latest bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD needs `slow + signal - 1` bars: the slow EMA must exist before the
/// signal EMA can be seeded from `signal` MACD values.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if fast == 0 || slow == 0 || signal == 0 || fast >= slow {
        return None;
    }
    if closes.len() < slow + signal - 1 {
        return None;
    }

    let fast_ema = ema_series(closes, fast);
    let slow_ema = ema_series(closes, slow);

    // Align both series on the input index of the first slow value
    let offset = slow - fast;
    let line: Vec<f64> = slow_ema
        .iter()
        .zip(&fast_ema[offset..])
        .map(|(s, f)| f - s)
        .collect();

    let signal_series = ema_series(&line, signal);
    let latest_line = *line.last()?;
    let latest_signal = *signal_series.last()?;

    Some(Macd {
        line: latest_line,
        signal: latest_signal,
        histogram: latest_line - latest_signal,
    })
}

/// Bollinger bands at the latest bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// (upper - lower) / middle
    pub width: f64,
}

pub fn bollinger(closes: &[f64], period: usize, std_dev: f64) -> Option<Bollinger> {
    let middle = sma(closes, period)?;
    let tail = &closes[closes.len() - period..];
    let variance = tail.iter().map(|c| (c - middle).powi(2)).sum::<f64>() / period as f64;
    let band = variance.sqrt() * std_dev;

    let upper = middle + band;
    let lower = middle - band;
    let width = if middle != 0.0 { (upper - lower) / middle } else { 0.0 };

    Some(Bollinger {
        upper,
        middle,
        lower,
        width,
    })
}

/// True range of each bar; the first bar has no previous close and uses high - low
pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    let mut prev_close: Option<f64> = None;

    for bar in bars {
        let tr = match prev_close {
            Some(pc) => bar
                .range()
                .max((bar.high - pc).abs())
                .max((bar.low - pc).abs()),
            None => bar.range(),
        };
        out.push(tr);
        prev_close = Some(bar.close);
    }

    out
}

/// Average True Range with Wilder smoothing, seeded with the mean of the
/// first `period` true ranges
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }

    let trs = true_ranges(bars);
    let p = period as f64;
    let mut value = trs[..period].iter().sum::<f64>() / p;
    for &tr in &trs[period..] {
        value = (value * (p - 1.0) + tr) / p;
    }
    Some(value)
}
