//! Chart pattern detection
//!
//! Heuristic scanners over the trailing lookback window. Confidences are
//! fixed per pattern and tied to the detection criteria, not calibrated.

use serde::{Deserialize, Serialize};

use crate::config::PatternConfig;
use crate::types::Bar;

const HEAD_AND_SHOULDERS_CONFIDENCE: f64 = 0.8;
const DOUBLE_CONFIDENCE: f64 = 0.75;
const FLAG_CONFIDENCE: f64 = 0.7;
const TRENDLINE_CONFIDENCE: f64 = 0.6;

/// Max relative difference between the two tops/bottoms (2%)
const DOUBLE_TOLERANCE: f64 = 0.02;

/// Bars used for trendline regressions and the flag pole
const TRENDLINE_BARS: usize = 20;

/// Bars in the flag consolidation
const FLAG_BARS: usize = 10;

/// Minimum slope difference for converging trendlines (points per bar)
const TRIANGLE_EPSILON: f64 = 0.001;

/// Minimum pole slope as a fraction of the mean close per bar (0.05%)
const FLAG_TREND_THRESHOLD: f64 = 0.0005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    HeadAndShoulders,
    DoubleTop,
    DoubleBottom,
    Triangle,
    Wedge,
    Flag,
}

impl PatternKind {
    pub const ALL: [PatternKind; 6] = [
        PatternKind::HeadAndShoulders,
        PatternKind::DoubleTop,
        PatternKind::DoubleBottom,
        PatternKind::Triangle,
        PatternKind::Wedge,
        PatternKind::Flag,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::HeadAndShoulders => "head_and_shoulders",
            PatternKind::DoubleTop => "double_top",
            PatternKind::DoubleBottom => "double_bottom",
            PatternKind::Triangle => "triangle",
            PatternKind::Wedge => "wedge",
            PatternKind::Flag => "flag",
        }
    }
}

/// Pattern-specific measurements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum PatternDetails {
    None,
    HeadAndShoulders {
        left_shoulder: f64,
        head: f64,
        right_shoulder: f64,
        neckline: Option<f64>,
    },
    Double {
        first: f64,
        second: f64,
        difference_pct: f64,
    },
    Trendlines {
        upper_slope: f64,
        lower_slope: f64,
    },
    Flag {
        trend_slope: f64,
        consolidation_range: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub kind: PatternKind,
    pub detected: bool,
    pub confidence: f64,
    /// Specific shape, e.g. "ascending_triangle" or "bull_flag"
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub details: PatternDetails,
}

impl PatternRecord {
    fn absent(kind: PatternKind) -> Self {
        Self {
            kind,
            detected: false,
            confidence: 0.0,
            pattern_type: kind.name().to_string(),
            details: PatternDetails::None,
        }
    }

    fn found(kind: PatternKind, pattern_type: &str, confidence: f64, details: PatternDetails) -> Self {
        Self {
            kind,
            detected: true,
            confidence,
            pattern_type: pattern_type.to_string(),
            details,
        }
    }
}

/// One record per pattern kind, in `PatternKind::ALL` order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternSet {
    records: Vec<PatternRecord>,
}

impl PatternSet {
    pub fn get(&self, kind: PatternKind) -> Option<&PatternRecord> {
        self.records.iter().find(|r| r.kind == kind)
    }

    pub fn records(&self) -> &[PatternRecord] {
        &self.records
    }

    pub fn detected(&self) -> impl Iterator<Item = &PatternRecord> {
        self.records.iter().filter(|r| r.detected)
    }
}

impl FromIterator<PatternRecord> for PatternSet {
    fn from_iter<I: IntoIterator<Item = PatternRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Run every pattern scanner over the trailing `config.lookback` bars
pub fn detect_patterns(bars: &[Bar], config: &PatternConfig) -> PatternSet {
    let start = bars.len().saturating_sub(config.lookback);
    let window = &bars[start..];

    let peaks = find_peaks(window, config.peak_separation);
    let troughs = find_troughs(window, config.peak_separation);

    PatternKind::ALL
        .iter()
        .map(|&kind| {
            let found = match kind {
                PatternKind::HeadAndShoulders => head_and_shoulders(window, &peaks, &troughs),
                PatternKind::DoubleTop => double_top(window, &peaks),
                PatternKind::DoubleBottom => double_bottom(window, &troughs),
                PatternKind::Triangle => triangle(window),
                PatternKind::Wedge => wedge(window),
                PatternKind::Flag => flag(window),
            };
            match found {
                Some(record) if record.confidence >= config.min_strength => record,
                _ => PatternRecord::absent(kind),
            }
        })
        .collect()
}

/// Indices whose high is not exceeded by any bar within `separation` on either side
pub fn find_peaks(bars: &[Bar], separation: usize) -> Vec<usize> {
    find_extrema(bars, separation, |b| b.high, |candidate, other| other > candidate)
}

/// Indices whose low is not undercut by any bar within `separation` on either side
pub fn find_troughs(bars: &[Bar], separation: usize) -> Vec<usize> {
    find_extrema(bars, separation, |b| b.low, |candidate, other| other < candidate)
}

fn find_extrema(
    bars: &[Bar],
    separation: usize,
    value: impl Fn(&Bar) -> f64,
    beats: impl Fn(f64, f64) -> bool,
) -> Vec<usize> {
    let n = bars.len();
    if separation == 0 || n < 2 * separation + 1 {
        return Vec::new();
    }

    (separation..n - separation)
        .filter(|&i| {
            let candidate = value(&bars[i]);
            bars[i - separation..=i + separation]
                .iter()
                .all(|b| !beats(candidate, value(b)))
        })
        .collect()
}

/// Least-squares slope of `values` against their index
pub fn linreg_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = values.iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Mean high-low range of a window
pub fn average_bar_range(bars: &[Bar]) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }
    bars.iter().map(|b| b.range()).sum::<f64>() / bars.len() as f64
}

fn head_and_shoulders(bars: &[Bar], peaks: &[usize], troughs: &[usize]) -> Option<PatternRecord> {
    if peaks.len() < 3 {
        return None;
    }

    let last = &peaks[peaks.len() - 3..];
    let left = bars[last[0]].high;
    let head = bars[last[1]].high;
    let right = bars[last[2]].high;

    if head <= left || head <= right {
        return None;
    }

    let neckline = if troughs.len() >= 2 {
        let t = &troughs[troughs.len() - 2..];
        Some((bars[t[0]].low + bars[t[1]].low) / 2.0)
    } else {
        None
    };

    Some(PatternRecord::found(
        PatternKind::HeadAndShoulders,
        "head_and_shoulders",
        HEAD_AND_SHOULDERS_CONFIDENCE,
        PatternDetails::HeadAndShoulders {
            left_shoulder: left,
            head,
            right_shoulder: right,
            neckline,
        },
    ))
}

fn double_top(bars: &[Bar], peaks: &[usize]) -> Option<PatternRecord> {
    let prices: Vec<f64> = peaks.iter().map(|&i| bars[i].high).collect();
    double_extreme(&prices, PatternKind::DoubleTop)
}

fn double_bottom(bars: &[Bar], troughs: &[usize]) -> Option<PatternRecord> {
    let prices: Vec<f64> = troughs.iter().map(|&i| bars[i].low).collect();
    double_extreme(&prices, PatternKind::DoubleBottom)
}

fn double_extreme(prices: &[f64], kind: PatternKind) -> Option<PatternRecord> {
    if prices.len() < 2 {
        return None;
    }

    let first = prices[prices.len() - 2];
    let second = prices[prices.len() - 1];
    if first == 0.0 {
        return None;
    }

    let difference = (second - first).abs() / first;
    if difference >= DOUBLE_TOLERANCE {
        return None;
    }

    Some(PatternRecord::found(
        kind,
        kind.name(),
        DOUBLE_CONFIDENCE,
        PatternDetails::Double {
            first,
            second,
            difference_pct: difference * 100.0,
        },
    ))
}

/// Regression slopes of highs and lows over the trailing trendline bars
fn trendline_slopes(bars: &[Bar]) -> Option<(f64, f64)> {
    if bars.len() < TRENDLINE_BARS {
        return None;
    }
    let tail = &bars[bars.len() - TRENDLINE_BARS..];
    let highs: Vec<f64> = tail.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = tail.iter().map(|b| b.low).collect();
    Some((linreg_slope(&highs), linreg_slope(&lows)))
}

fn triangle(bars: &[Bar]) -> Option<PatternRecord> {
    let (upper, lower) = trendline_slopes(bars)?;

    if (upper - lower).abs() <= TRIANGLE_EPSILON {
        return None;
    }

    let shape = if upper < 0.0 && lower > 0.0 {
        "symmetrical_triangle"
    } else if lower > 0.0 {
        "ascending_triangle"
    } else if upper < 0.0 {
        "descending_triangle"
    } else {
        // Diverging lines: no directional bias
        "symmetrical_triangle"
    };

    Some(PatternRecord::found(
        PatternKind::Triangle,
        shape,
        TRENDLINE_CONFIDENCE,
        PatternDetails::Trendlines {
            upper_slope: upper,
            lower_slope: lower,
        },
    ))
}

fn wedge(bars: &[Bar]) -> Option<PatternRecord> {
    let (upper, lower) = trendline_slopes(bars)?;

    let shape = if upper > 0.0 && lower > 0.0 && upper < lower {
        "rising_wedge"
    } else if upper < 0.0 && lower < 0.0 && lower.abs() < upper.abs() {
        "falling_wedge"
    } else {
        return None;
    };

    Some(PatternRecord::found(
        PatternKind::Wedge,
        shape,
        TRENDLINE_CONFIDENCE,
        PatternDetails::Trendlines {
            upper_slope: upper,
            lower_slope: lower,
        },
    ))
}

fn flag(bars: &[Bar]) -> Option<PatternRecord> {
    if bars.len() < TRENDLINE_BARS {
        return None;
    }

    let pole = &bars[bars.len() - TRENDLINE_BARS..];
    let closes: Vec<f64> = pole.iter().map(|b| b.close).collect();
    let mean_close = closes.iter().sum::<f64>() / closes.len() as f64;
    if mean_close <= 0.0 {
        return None;
    }

    let slope = linreg_slope(&closes);
    if (slope / mean_close).abs() <= FLAG_TREND_THRESHOLD {
        return None;
    }

    let consolidation = &bars[bars.len() - FLAG_BARS..];
    let high = consolidation.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low = consolidation.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let range = high - low;

    if range >= average_bar_range(bars) * 0.5 {
        return None;
    }

    let shape = if slope > 0.0 { "bull_flag" } else { "bear_flag" };

    Some(PatternRecord::found(
        PatternKind::Flag,
        shape,
        FLAG_CONFIDENCE,
        PatternDetails::Flag {
            trend_slope: slope,
            consolidation_range: range,
        },
    ))
}
