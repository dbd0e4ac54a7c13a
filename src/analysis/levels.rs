//! Statistical price levels
//!
//! - Support/Resistance from recent troughs/peaks
//! - Floor-trader pivot points
//! - VWAP over the full window
//! - Volume profile with POC and value area

use serde::{Deserialize, Serialize};

use super::patterns::{find_peaks, find_troughs};
use crate::types::Bar;

/// Number of recent peaks/troughs kept as levels
const MAX_LEVELS: usize = 5;

/// Equal-width price bins in the volume profile
const PROFILE_BINS: usize = 50;

/// Share of profile volume inside the value area
const VALUE_AREA_SHARE: f64 = 0.70;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    /// Most recent peak highs, oldest first
    pub resistance: Vec<f64>,
    /// Most recent trough lows, oldest first
    pub support: Vec<f64>,
    pub nearest_resistance: Option<f64>,
    pub nearest_support: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotPoints {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeProfile {
    pub bin_width: f64,
    /// Lower edge of the first bin
    pub price_low: f64,
    /// Volume per bin, lowest price first
    pub volumes: Vec<f64>,
    /// Center of the highest-volume bin
    pub poc: f64,
    /// Value Area High - upper edge of the 70% volume area
    pub vah: f64,
    /// Value Area Low - lower edge of the 70% volume area
    pub val: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticalLevels {
    pub support_resistance: Option<SupportResistance>,
    pub pivots: Option<PivotPoints>,
    pub vwap: Option<f64>,
    pub volume_profile: Option<VolumeProfile>,
}

/// Compute all levels. Support/resistance scans the trailing `lookback` bars;
/// pivots, VWAP and the volume profile use the full window.
pub fn compute_levels(bars: &[Bar], lookback: usize, peak_separation: usize) -> StatisticalLevels {
    let start = bars.len().saturating_sub(lookback);

    StatisticalLevels {
        support_resistance: support_resistance(&bars[start..], peak_separation),
        pivots: pivot_points(bars),
        vwap: calculate_vwap(bars),
        volume_profile: volume_profile(bars),
    }
}

pub fn support_resistance(bars: &[Bar], peak_separation: usize) -> Option<SupportResistance> {
    let last_close = bars.last()?.close;

    let peaks = find_peaks(bars, peak_separation);
    let troughs = find_troughs(bars, peak_separation);
    if peaks.is_empty() && troughs.is_empty() {
        return None;
    }

    let resistance: Vec<f64> = peaks
        .iter()
        .skip(peaks.len().saturating_sub(MAX_LEVELS))
        .map(|&i| bars[i].high)
        .collect();
    let support: Vec<f64> = troughs
        .iter()
        .skip(troughs.len().saturating_sub(MAX_LEVELS))
        .map(|&i| bars[i].low)
        .collect();

    Some(SupportResistance {
        nearest_resistance: nearest(&resistance, last_close),
        nearest_support: nearest(&support, last_close),
        resistance,
        support,
    })
}

fn nearest(levels: &[f64], price: f64) -> Option<f64> {
    levels
        .iter()
        .copied()
        .min_by(|a, b| (a - price).abs().total_cmp(&(b - price).abs()))
}

/// Classic floor-trader pivots from the second-to-last bar
pub fn pivot_points(bars: &[Bar]) -> Option<PivotPoints> {
    if bars.len() < 2 {
        return None;
    }

    let bar = &bars[bars.len() - 2];
    let (h, l, c) = (bar.high, bar.low, bar.close);
    let pivot = (h + l + c) / 3.0;
    let range = h - l;

    let r1 = 2.0 * pivot - l;
    let s1 = 2.0 * pivot - h;

    Some(PivotPoints {
        pivot,
        r1,
        r2: pivot + range,
        r3: r1 + range,
        s1,
        s2: pivot - range,
        s3: s1 - range,
    })
}

/// Calculate VWAP (Volume Weighted Average Price) for a window of bars
pub fn calculate_vwap(bars: &[Bar]) -> Option<f64> {
    let mut sum_pv = 0.0;
    let mut sum_v = 0.0;

    for bar in bars {
        sum_pv += bar.typical_price() * bar.volume;
        sum_v += bar.volume;
    }

    if sum_v > 0.0 {
        Some(sum_pv / sum_v)
    } else {
        None
    }
}

/// Volume profile over the window's full price range.
///
/// Each bar adds its whole volume to every bin its high-low span touches.
pub fn volume_profile(bars: &[Bar]) -> Option<VolumeProfile> {
    if bars.is_empty() {
        return None;
    }

    let price_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let price_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let span = price_high - price_low;
    if span <= 0.0 {
        return None;
    }

    let bin_width = span / PROFILE_BINS as f64;
    let mut volumes = vec![0.0; PROFILE_BINS];

    for bar in bars {
        for (i, volume) in volumes.iter_mut().enumerate() {
            let bin_low = price_low + i as f64 * bin_width;
            let bin_high = bin_low + bin_width;
            if bar.low <= bin_high && bar.high >= bin_low {
                *volume += bar.volume;
            }
        }
    }

    // Find POC (bin with max volume); first bin wins ties
    let poc_idx = volumes
        .iter()
        .enumerate()
        .fold(0, |best, (i, v)| if *v > volumes[best] { i } else { best });

    let (val_idx, vah_idx) = value_area(&volumes, poc_idx);

    Some(VolumeProfile {
        bin_width,
        price_low,
        poc: price_low + (poc_idx as f64 + 0.5) * bin_width,
        vah: price_low + (vah_idx + 1) as f64 * bin_width,
        val: price_low + val_idx as f64 * bin_width,
        volumes,
    })
}

/// Expand from the POC toward the heavier neighbour until 70% of the volume
/// is enclosed. Returns (low bin, high bin), inclusive.
fn value_area(volumes: &[f64], poc_idx: usize) -> (usize, usize) {
    let total: f64 = volumes.iter().sum();
    let target = total * VALUE_AREA_SHARE;

    let mut val_idx = poc_idx;
    let mut vah_idx = poc_idx;
    let mut accumulated = volumes[poc_idx];

    while accumulated < target {
        let can_go_lower = val_idx > 0;
        let can_go_higher = vah_idx < volumes.len() - 1;

        if !can_go_lower && !can_go_higher {
            break;
        }

        let lower_vol = if can_go_lower { volumes[val_idx - 1] } else { 0.0 };
        let upper_vol = if can_go_higher { volumes[vah_idx + 1] } else { 0.0 };

        if can_go_lower && (lower_vol >= upper_vol || !can_go_higher) {
            val_idx -= 1;
            accumulated += lower_vol;
        } else {
            vah_idx += 1;
            accumulated += upper_vol;
        }
    }

    (val_idx, vah_idx)
}
