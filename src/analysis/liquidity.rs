//! Liquidity structures: fair-value gaps, liquidity grabs, order blocks, imbalances
//!
//! All scanners walk the trailing lookback window. Reported indices are
//! positions in the full window the caller passed in.

use serde::{Deserialize, Serialize};

use super::patterns::average_bar_range;
use crate::types::{Bar, Bias};

/// Bars in an order-block consolidation
const ORDER_BLOCK_BARS: usize = 5;

/// Three-bar gap: price skipped the region between bar[i-2] and bar[i]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    #[serde(rename = "type")]
    pub bias: Bias,
    pub index: usize,
    pub top: f64,
    pub bottom: f64,
    pub size: f64,
}

/// Stop run through the prior bar's extreme followed by a close back inside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityGrab {
    #[serde(rename = "type")]
    pub bias: Bias,
    pub index: usize,
    /// Prior bar's low (bullish) or high (bearish) that was swept
    pub swept_level: f64,
    pub close: f64,
}

/// Tight consolidation immediately before a breakout close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    #[serde(rename = "type")]
    pub bias: Bias,
    /// Index of the breakout bar
    pub index: usize,
    pub high: f64,
    pub low: f64,
}

/// No overlap between consecutive bars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imbalance {
    #[serde(rename = "type")]
    pub bias: Bias,
    pub index: usize,
    pub gap: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiquidityFeatures {
    pub fair_value_gaps: Vec<FairValueGap>,
    pub liquidity_grabs: Vec<LiquidityGrab>,
    pub order_blocks: Vec<OrderBlock>,
    pub imbalances: Vec<Imbalance>,
}

impl LiquidityFeatures {
    /// Direction with more fair-value gaps, with (count, total); None on a tie
    pub fn dominant_gap_bias(&self) -> Option<(Bias, usize, usize)> {
        let total = self.fair_value_gaps.len();
        let bullish = self
            .fair_value_gaps
            .iter()
            .filter(|g| g.bias == Bias::Bullish)
            .count();
        let bearish = total - bullish;

        if bullish > bearish {
            Some((Bias::Bullish, bullish, total))
        } else if bearish > bullish {
            Some((Bias::Bearish, bearish, total))
        } else {
            None
        }
    }
}

/// Run every liquidity scanner over the trailing `lookback` bars
pub fn detect_liquidity(bars: &[Bar], lookback: usize) -> LiquidityFeatures {
    let offset = bars.len().saturating_sub(lookback);
    let window = &bars[offset..];

    LiquidityFeatures {
        fair_value_gaps: fair_value_gaps(window, offset),
        liquidity_grabs: liquidity_grabs(window, offset),
        order_blocks: order_blocks(window, offset),
        imbalances: imbalances(window, offset),
    }
}

pub fn fair_value_gaps(bars: &[Bar], offset: usize) -> Vec<FairValueGap> {
    let mut gaps = Vec::new();

    for i in 2..bars.len() {
        let first = &bars[i - 2];
        let third = &bars[i];

        if first.high < third.low {
            gaps.push(FairValueGap {
                bias: Bias::Bullish,
                index: offset + i,
                top: third.low,
                bottom: first.high,
                size: third.low - first.high,
            });
        } else if first.low > third.high {
            gaps.push(FairValueGap {
                bias: Bias::Bearish,
                index: offset + i,
                top: first.low,
                bottom: third.high,
                size: first.low - third.high,
            });
        }
    }

    gaps
}

pub fn liquidity_grabs(bars: &[Bar], offset: usize) -> Vec<LiquidityGrab> {
    let mut grabs = Vec::new();

    for i in 1..bars.len() {
        let prev = &bars[i - 1];
        let curr = &bars[i];

        if curr.low < prev.low && curr.close > prev.low {
            grabs.push(LiquidityGrab {
                bias: Bias::Bullish,
                index: offset + i,
                swept_level: prev.low,
                close: curr.close,
            });
        }
        if curr.high > prev.high && curr.close < prev.high {
            grabs.push(LiquidityGrab {
                bias: Bias::Bearish,
                index: offset + i,
                swept_level: prev.high,
                close: curr.close,
            });
        }
    }

    grabs
}

pub fn order_blocks(bars: &[Bar], offset: usize) -> Vec<OrderBlock> {
    let mut blocks = Vec::new();
    let threshold = average_bar_range(bars) * 0.5;

    for i in ORDER_BLOCK_BARS..bars.len() {
        let consolidation = &bars[i - ORDER_BLOCK_BARS..i];
        let high = consolidation.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let low = consolidation.iter().map(|b| b.low).fold(f64::MAX, f64::min);

        if high - low >= threshold {
            continue;
        }

        let close = bars[i].close;
        let bias = if close > high {
            Bias::Bullish
        } else if close < low {
            Bias::Bearish
        } else {
            continue;
        };

        blocks.push(OrderBlock {
            bias,
            index: offset + i,
            high,
            low,
        });
    }

    blocks
}

pub fn imbalances(bars: &[Bar], offset: usize) -> Vec<Imbalance> {
    let mut out = Vec::new();

    for i in 1..bars.len() {
        let prev = &bars[i - 1];
        let curr = &bars[i];

        if curr.low > prev.high {
            out.push(Imbalance {
                bias: Bias::Bullish,
                index: offset + i,
                gap: curr.low - prev.high,
            });
        } else if curr.high < prev.low {
            out.push(Imbalance {
                bias: Bias::Bearish,
                index: offset + i,
                gap: prev.low - curr.high,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::bars_from;

    #[test]
    fn test_bullish_fair_value_gap_three_bars() {
        let bars = bars_from(&[
            (15000.0, 15005.0, 14995.0, 15003.0, 100.0),
            (15008.0, 15015.0, 15005.0, 15012.0, 100.0),
            (15018.0, 15025.0, 15015.0, 15022.0, 100.0),
        ]);
        let features = detect_liquidity(&bars, 50);
        assert_eq!(features.fair_value_gaps.len(), 1);
        let gap = &features.fair_value_gaps[0];
        assert_eq!(gap.bias, Bias::Bullish);
        assert_eq!(gap.index, 2);
        assert_eq!(gap.bottom, 15005.0);
        assert_eq!(gap.top, 15015.0);
    }

    #[test]
    fn test_bearish_fair_value_gap() {
        let bars = bars_from(&[
            (15025.0, 15030.0, 15020.0, 15021.0, 100.0),
            (15020.0, 15021.0, 15010.0, 15011.0, 100.0),
            (15010.0, 15012.0, 15000.0, 15001.0, 100.0),
        ]);
        let gaps = fair_value_gaps(&bars, 0);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].bias, Bias::Bearish);
        assert_eq!(gaps[0].size, 8.0);
    }

    #[test]
    fn test_indices_are_relative_to_full_window() {
        let mut rows = vec![(15000.0, 15001.0, 14999.0, 15000.0, 100.0); 10];
        rows.push((15000.0, 15006.0, 15000.0, 15005.0, 100.0));
        rows.push((15005.0, 15012.0, 15004.0, 15011.0, 100.0));
        let bars = bars_from(&rows);
        let gaps = detect_liquidity(&bars, 4).fair_value_gaps;
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].index, 11);
    }

    #[test]
    fn test_liquidity_grab_both_sides() {
        let bars = bars_from(&[
            (15000.0, 15005.0, 14995.0, 15000.0, 100.0),
            // Sweeps the prior low and closes back above it
            (14998.0, 15002.0, 14990.0, 15001.0, 100.0),
            // Sweeps the prior high and closes back below it
            (15001.0, 15006.0, 14996.0, 14999.0, 100.0),
        ]);
        let grabs = liquidity_grabs(&bars, 0);
        assert_eq!(grabs.len(), 2);
        assert_eq!(grabs[0].bias, Bias::Bullish);
        assert_eq!(grabs[0].index, 1);
        assert_eq!(grabs[0].swept_level, 14995.0);
        assert_eq!(grabs[1].bias, Bias::Bearish);
        assert_eq!(grabs[1].index, 2);
    }

    #[test]
    fn test_order_block_after_tight_consolidation() {
        let mut rows = Vec::new();
        // Wide bars to lift the average range
        for i in 0..6 {
            let base = 15000.0 + i as f64;
            rows.push((base, base + 20.0, base - 20.0, base, 100.0));
        }
        // Five tight bars
        for _ in 0..5 {
            rows.push((15010.0, 15011.0, 15009.0, 15010.0, 50.0));
        }
        // Breakout close above the consolidation high
        rows.push((15010.0, 15030.0, 15009.0, 15028.0, 300.0));
        let bars = bars_from(&rows);

        let blocks = order_blocks(&bars, 0);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].bias, Bias::Bullish);
        assert_eq!(blocks[0].index, 11);
        assert_eq!(blocks[0].high, 15011.0);
    }

    #[test]
    fn test_imbalance_gap_up() {
        let bars = bars_from(&[
            (15000.0, 15005.0, 14995.0, 15004.0, 100.0),
            (15008.0, 15012.0, 15007.0, 15010.0, 100.0),
        ]);
        let out = imbalances(&bars, 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bias, Bias::Bullish);
        assert_eq!(out[0].gap, 2.0);
    }

    #[test]
    fn test_dominant_gap_bias() {
        let mut features = LiquidityFeatures::default();
        assert_eq!(features.dominant_gap_bias(), None);
        for (i, bias) in [Bias::Bullish, Bias::Bullish, Bias::Bearish].into_iter().enumerate() {
            features.fair_value_gaps.push(FairValueGap {
                bias,
                index: i,
                top: 1.0,
                bottom: 0.0,
                size: 1.0,
            });
        }
        assert_eq!(features.dominant_gap_bias(), Some((Bias::Bullish, 2, 3)));
    }
}
