//! When to run an analysis cycle
//!
//! Time comes from bar timestamps, so replay and live streaming behave the
//! same. Nothing fires inside the minimum interval; past the maximum interval
//! a cycle always runs; in between, price moves, volume spikes and fresh
//! structure on the latest bar trigger one.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::analysis::liquidity::fair_value_gaps;
use crate::analysis::momentum::breakout_signals;
use crate::config::SchedulerConfig;
use crate::types::{Bar, Bias};

/// Trailing bars in the volume baseline
const VOLUME_BASELINE_BARS: usize = 20;

/// Bars needed to judge a breakout on the latest bar
const BREAKOUT_BARS: usize = 21;

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerReason {
    /// First cycle of the session
    Initial,
    MaxInterval,
    /// Fractional move since the last cycle
    PriceChange(f64),
    /// Latest volume over its trailing average
    VolumeSpike(f64),
    Breakout(Bias),
    FairValueGap(Bias),
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerReason::Initial => write!(f, "initial"),
            TriggerReason::MaxInterval => write!(f, "max interval"),
            TriggerReason::PriceChange(pct) => write!(f, "price change {:+.2}%", pct * 100.0),
            TriggerReason::VolumeSpike(ratio) => write!(f, "volume spike {:.1}x", ratio),
            TriggerReason::Breakout(bias) => write!(f, "{} breakout", bias),
            TriggerReason::FairValueGap(bias) => write!(f, "{} fair value gap", bias),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisScheduler {
    config: SchedulerConfig,
    last_time: Option<DateTime<Utc>>,
    last_price: f64,
}

impl AnalysisScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            last_time: None,
            last_price: 0.0,
        }
    }

    /// Reason to analyze the window ending at its latest bar, if any
    pub fn check(&self, bars: &[Bar]) -> Option<TriggerReason> {
        let latest = bars.last()?;

        let Some(last_time) = self.last_time else {
            return Some(TriggerReason::Initial);
        };

        let elapsed = latest.timestamp - last_time;
        if elapsed < Duration::seconds(self.config.min_interval_secs) {
            return None;
        }
        if elapsed >= Duration::seconds(self.config.max_interval_secs) {
            return Some(TriggerReason::MaxInterval);
        }

        if self.last_price > 0.0 {
            let change = (latest.close - self.last_price) / self.last_price;
            if change.abs() >= self.config.price_change_threshold {
                return Some(TriggerReason::PriceChange(change));
            }
        }

        if let Some(ratio) = latest_volume_ratio(bars) {
            if ratio >= self.config.volume_spike_ratio {
                return Some(TriggerReason::VolumeSpike(ratio));
            }
        }

        if self.config.trigger_on_breakout {
            return fresh_structure(bars);
        }

        None
    }

    /// Record that a cycle ran on `bar`
    pub fn mark_analyzed(&mut self, bar: &Bar) {
        self.last_time = Some(bar.timestamp);
        self.last_price = bar.close;
    }
}

fn latest_volume_ratio(bars: &[Bar]) -> Option<f64> {
    let n = bars.len();
    if n <= VOLUME_BASELINE_BARS {
        return None;
    }
    let baseline = &bars[n - 1 - VOLUME_BASELINE_BARS..n - 1];
    let avg = baseline.iter().map(|b| b.volume).sum::<f64>() / VOLUME_BASELINE_BARS as f64;
    if avg > 0.0 {
        Some(bars[n - 1].volume / avg)
    } else {
        None
    }
}

/// Breakout or fair-value gap completed by the latest bar
fn fresh_structure(bars: &[Bar]) -> Option<TriggerReason> {
    let n = bars.len();

    let tail = &bars[n.saturating_sub(BREAKOUT_BARS)..];
    let offset = n - tail.len();
    if let Some(b) = breakout_signals(tail).last().filter(|b| offset + b.index == n - 1) {
        return Some(TriggerReason::Breakout(b.bias));
    }

    let tail = &bars[n.saturating_sub(3)..];
    fair_value_gaps(tail, n - tail.len())
        .last()
        .filter(|g| g.index == n - 1)
        .map(|g| TriggerReason::FairValueGap(g.bias))
}
