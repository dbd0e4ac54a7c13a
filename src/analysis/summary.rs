//! Natural-language market digest
//!
//! Builds up to seven clauses (context, technicals, patterns, liquidity,
//! levels, momentum, volume), each skipped when its inputs are missing, and
//! fits the result into a character budget of `max_tokens * 4`.

use super::features::FeatureBundle;
use super::indicators::IndicatorSet;
use crate::types::Bar;

/// Approximate characters per token
pub const CHARS_PER_TOKEN: usize = 4;

/// Appended when no sentence boundary is close to the cut
pub const ELLIPSIS: &str = "...";

/// Prior-bar change that counts as directional (percent)
const DIRECTIONAL_CHANGE_PCT: f64 = 0.1;

const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;

/// Bollinger width ratio above which volatility is called high
const HIGH_VOLATILITY_WIDTH: f64 = 0.01;

const STRONG_TREND: f64 = 0.01;
const MODERATE_TREND: f64 = 0.005;

/// Spikes this many bars back or fewer count as recent
const RECENT_SPIKE_BARS: usize = 20;

/// Minimum pattern confidence worth mentioning
const PATTERN_MENTION_CONFIDENCE: f64 = 0.5;

/// Sentence boundary must sit in the last 20% of the cut text
const SENTENCE_BACKOFF_SHARE: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct Summarizer {
    max_tokens: usize,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self { max_tokens: 200 }
    }
}

impl Summarizer {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    pub fn max_chars(&self) -> usize {
        self.max_tokens * CHARS_PER_TOKEN
    }

    /// Digest of `bundle` in at most `max_chars() + ELLIPSIS.len()` bytes
    pub fn summarize(&self, bundle: &FeatureBundle, bars: &[Bar]) -> String {
        let clauses = [
            market_context(bars),
            technicals(&bundle.technical_indicators),
            patterns(bundle),
            liquidity(bundle),
            levels(bundle),
            momentum(bundle),
            volume(bundle, bars.len()),
        ];

        let text = clauses.into_iter().flatten().collect::<Vec<_>>().join(" ");
        truncate_to_budget(&text, self.max_chars())
    }
}

/// Cut `text` to `max_chars`, preferring a sentence end near the cut
pub fn truncate_to_budget(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }

    let mut cut = max_chars;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let truncated = &text[..cut];

    // A period ends a sentence only when followed by a space or the end of text,
    // so decimal points are skipped
    let sentence_end = truncated
        .match_indices('.')
        .map(|(pos, _)| pos)
        .filter(|&pos| matches!(text.as_bytes().get(pos + 1), None | Some(b' ')))
        .last();

    match sentence_end {
        Some(pos) if pos as f64 >= cut as f64 * SENTENCE_BACKOFF_SHARE => truncated[..=pos].to_string(),
        _ => format!("{}{}", truncated, ELLIPSIS),
    }
}

fn signed_pct(value: f64) -> String {
    format!("{:+.2}%", value)
}

fn market_context(bars: &[Bar]) -> Option<String> {
    let last = bars.last()?;
    let close = last.close;
    if close <= 0.0 {
        return None;
    }

    let range_pct = last.range() / close * 100.0;

    let change = bars
        .len()
        .checked_sub(2)
        .map(|i| bars[i].close)
        .filter(|prev| *prev > 0.0)
        .map(|prev| (close - prev) / prev * 100.0);

    Some(match change {
        Some(pct) => {
            let bias = if pct > DIRECTIONAL_CHANGE_PCT {
                "bullish"
            } else if pct < -DIRECTIONAL_CHANGE_PCT {
                "bearish"
            } else {
                "neutral"
            };
            format!(
                "Price {:.2}, {} ({}) vs prior bar, bar range {:.2}%.",
                close,
                bias,
                signed_pct(pct),
                range_pct
            )
        }
        None => format!("Price {:.2}, bar range {:.2}%.", close, range_pct),
    })
}

/// Periods of every `<prefix>_<period>` key, ascending
fn periods(indicators: &IndicatorSet, prefix: &str) -> Vec<usize> {
    let mut out: Vec<usize> = indicators
        .keys()
        .filter_map(|k| k.strip_prefix(prefix)?.strip_prefix('_')?.parse().ok())
        .collect();
    out.sort_unstable();
    out
}

fn moving_average_order(indicators: &IndicatorSet) -> Option<String> {
    for (prefix, label) in [("sma", "SMA"), ("ema", "EMA")] {
        let found = periods(indicators, prefix);
        if found.len() < 2 {
            continue;
        }
        let short = found[0];
        let long = found[found.len() - 1];
        let short_value = indicators.get(&format!("{}_{}", prefix, short))?;
        let long_value = indicators.get(&format!("{}_{}", prefix, long))?;
        let relation = if short_value > long_value { "above" } else { "below" };
        return Some(format!("{}{} {} {}{}", label, short, relation, label, long));
    }
    None
}

fn technicals(indicators: &IndicatorSet) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(ma) = moving_average_order(indicators) {
        parts.push(ma);
    }

    if let Some(rsi) = periods(indicators, "rsi")
        .first()
        .and_then(|p| indicators.get(&format!("rsi_{}", p)))
    {
        let state = if *rsi > RSI_OVERBOUGHT {
            "overbought"
        } else if *rsi < RSI_OVERSOLD {
            "oversold"
        } else {
            "neutral"
        };
        parts.push(format!("RSI {:.1} {}", rsi, state));
    }

    if let (Some(line), Some(signal)) = (indicators.get("macd"), indicators.get("macd_signal")) {
        let bias = if line > signal { "bullish" } else { "bearish" };
        parts.push(format!("MACD {}", bias));
    }

    if let Some(width) = indicators.get("bb_width") {
        let level = if *width > HIGH_VOLATILITY_WIDTH { "high" } else { "low" };
        parts.push(format!("{} volatility", level));
    }

    if parts.is_empty() {
        None
    } else {
        Some(format!("Technicals: {}.", parts.join(", ")))
    }
}

fn patterns(bundle: &FeatureBundle) -> Option<String> {
    let mentioned: Vec<String> = bundle
        .patterns
        .detected()
        .filter(|p| p.confidence > PATTERN_MENTION_CONFIDENCE)
        .map(|p| format!("{} ({:.2})", p.pattern_type, p.confidence))
        .collect();

    if mentioned.is_empty() {
        None
    } else {
        Some(format!("Patterns: {}.", mentioned.join(", ")))
    }
}

fn liquidity(bundle: &FeatureBundle) -> Option<String> {
    let liq = &bundle.liquidity;
    let mut parts = Vec::new();

    if !liq.fair_value_gaps.is_empty() {
        match liq.dominant_gap_bias() {
            Some((bias, count, total)) => parts.push(format!("FVGs mostly {} ({}/{})", bias, count, total)),
            None => parts.push(format!("FVGs balanced ({})", liq.fair_value_gaps.len())),
        }
    }
    if let Some(grab) = liq.liquidity_grabs.last() {
        parts.push(format!("last liquidity grab {}", grab.bias));
    }
    if let Some(block) = liq.order_blocks.last() {
        parts.push(format!("last order block {}", block.bias));
    }

    if parts.is_empty() {
        None
    } else {
        Some(format!("Liquidity: {}.", parts.join(", ")))
    }
}

fn levels(bundle: &FeatureBundle) -> Option<String> {
    let levels = &bundle.statistical_levels;
    let mut parts = Vec::new();

    if let Some(sr) = &levels.support_resistance {
        if let Some(r) = sr.nearest_resistance {
            parts.push(format!("resistance {:.2}", r));
        }
        if let Some(s) = sr.nearest_support {
            parts.push(format!("support {:.2}", s));
        }
    }
    if let Some(p) = &levels.pivots {
        parts.push(format!("pivot {:.2}", p.pivot));
    }
    if let Some(vwap) = levels.vwap {
        parts.push(format!("VWAP {:.2}", vwap));
    }

    if parts.is_empty() {
        None
    } else {
        Some(format!("Levels: {}.", parts.join(", ")))
    }
}

fn momentum(bundle: &FeatureBundle) -> Option<String> {
    let m = &bundle.momentum;
    let mut parts = Vec::new();

    if let Some(strength) = m.trend_strength {
        let bucket = if strength > STRONG_TREND {
            "strong"
        } else if strength > MODERATE_TREND {
            "moderate"
        } else {
            "weak"
        };
        parts.push(format!("{} trend", bucket));
    }
    if let Some(thrust) = m.thrust_signals.last() {
        parts.push(format!("last thrust {}", thrust.bias));
    }
    if let Some(breakout) = m.breakout_signals.last() {
        parts.push(format!("last breakout {}", breakout.bias));
    }

    if parts.is_empty() {
        None
    } else {
        Some(format!("Momentum: {}.", parts.join(", ")))
    }
}

fn volume(bundle: &FeatureBundle, window_len: usize) -> Option<String> {
    let v = &bundle.volume;
    let mut parts = Vec::new();

    let recent_from = window_len.saturating_sub(RECENT_SPIKE_BARS);
    let peak_spike = v
        .volume_spikes
        .iter()
        .filter(|s| s.index >= recent_from)
        .map(|s| s.ratio)
        .fold(None, |best: Option<f64>, r| Some(best.map_or(r, |b| b.max(r))));
    if let Some(ratio) = peak_spike {
        parts.push(format!("spike {:.1}x", ratio));
    }

    if let Some(roc) = v.volume_roc {
        let trend = if roc > 0.0 {
            "rising"
        } else if roc < 0.0 {
            "falling"
        } else {
            "flat"
        };
        parts.push(format!("volume {}", trend));
    }

    if let Some(confirms) = v.obv_confirms {
        parts.push(if confirms { "OBV confirms" } else { "OBV diverges" }.to_string());
    }

    if parts.is_empty() {
        None
    } else {
        Some(format!("Volume: {}.", parts.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::FeatureAggregator;
    use crate::analysis::liquidity::{FairValueGap, LiquidityGrab, OrderBlock};
    use crate::analysis::momentum::{BreakoutSignal, ThrustSignal};
    use crate::analysis::patterns::{PatternDetails, PatternKind, PatternRecord};
    use crate::types::Bias;
    use crate::types::test_support::{bars_from, bars_from_closes};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_walk(seed: u64, n: usize) -> Vec<Bar> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut price: f64 = 15000.0;
        let rows: Vec<_> = (0..n)
            .map(|_| {
                let next = price + rng.gen_range(-20.0..20.0);
                let high = price.max(next) + rng.gen_range(0.0..5.0);
                let low = price.min(next) - rng.gen_range(0.0..5.0);
                let volume = rng.gen_range(50.0..2000.0);
                let row = (price, high, low, next, volume);
                price = next;
                row
            })
            .collect();
        bars_from(&rows)
    }

    fn empty_bundle() -> FeatureBundle {
        FeatureBundle {
            technical_indicators: IndicatorSet::new(),
            patterns: PatternKind::ALL
                .iter()
                .map(|&kind| record(kind, kind.name(), false, 0.0))
                .collect(),
            liquidity: Default::default(),
            statistical_levels: Default::default(),
            momentum: Default::default(),
            volume: Default::default(),
        }
    }

    fn record(kind: PatternKind, pattern_type: &str, detected: bool, confidence: f64) -> PatternRecord {
        PatternRecord {
            kind,
            detected,
            confidence,
            pattern_type: pattern_type.to_string(),
            details: PatternDetails::None,
        }
    }

    fn gap(bias: Bias, index: usize) -> FairValueGap {
        FairValueGap {
            bias,
            index,
            top: 15010.0,
            bottom: 15000.0,
            size: 10.0,
        }
    }

    #[test]
    fn test_patterns_clause_mentions_confident_detections() {
        let mut bundle = empty_bundle();
        assert_eq!(patterns(&bundle), None);

        bundle.patterns = vec![
            record(PatternKind::HeadAndShoulders, "head_and_shoulders", true, 0.8),
            record(PatternKind::DoubleTop, "double_top", true, 0.5),
            record(PatternKind::DoubleBottom, "double_bottom", false, 0.75),
            record(PatternKind::Triangle, "ascending_triangle", true, 0.6),
            record(PatternKind::Wedge, "rising_wedge", true, 0.45),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            patterns(&bundle).unwrap(),
            "Patterns: head_and_shoulders (0.80), ascending_triangle (0.60)."
        );
    }

    #[test]
    fn test_liquidity_clause() {
        let mut bundle = empty_bundle();
        assert_eq!(liquidity(&bundle), None);

        bundle.liquidity.fair_value_gaps = vec![gap(Bias::Bullish, 4), gap(Bias::Bearish, 9), gap(Bias::Bullish, 15)];
        bundle.liquidity.liquidity_grabs = vec![
            LiquidityGrab {
                bias: Bias::Bearish,
                index: 6,
                swept_level: 15020.0,
                close: 15015.0,
            },
            LiquidityGrab {
                bias: Bias::Bullish,
                index: 12,
                swept_level: 14990.0,
                close: 14995.0,
            },
        ];
        bundle.liquidity.order_blocks = vec![OrderBlock {
            bias: Bias::Bearish,
            index: 18,
            high: 15008.0,
            low: 15002.0,
        }];
        assert_eq!(
            liquidity(&bundle).unwrap(),
            "Liquidity: FVGs mostly bullish (2/3), last liquidity grab bullish, last order block bearish."
        );

        let mut tied = empty_bundle();
        tied.liquidity.fair_value_gaps = vec![gap(Bias::Bullish, 4), gap(Bias::Bearish, 9)];
        assert_eq!(liquidity(&tied).unwrap(), "Liquidity: FVGs balanced (2).");
    }

    #[test]
    fn test_momentum_trend_buckets() {
        let mut bundle = empty_bundle();
        assert_eq!(momentum(&bundle), None);

        for (strength, expected) in [
            (0.011, "strong"),
            (0.01, "moderate"),
            (0.0051, "moderate"),
            (0.005, "weak"),
            (0.0, "weak"),
        ] {
            bundle.momentum.trend_strength = Some(strength);
            assert_eq!(
                momentum(&bundle).unwrap(),
                format!("Momentum: {} trend.", expected),
                "strength {}",
                strength
            );
        }
    }

    #[test]
    fn test_momentum_last_thrust_and_breakout() {
        let mut bundle = empty_bundle();
        bundle.momentum.trend_strength = Some(0.02);
        bundle.momentum.thrust_signals = vec![
            ThrustSignal {
                bias: Bias::Bullish,
                index: 30,
                price_move: 0.004,
                volume_ratio: 2.5,
            },
            ThrustSignal {
                bias: Bias::Bearish,
                index: 41,
                price_move: -0.005,
                volume_ratio: 3.1,
            },
        ];
        bundle.momentum.breakout_signals = vec![BreakoutSignal {
            bias: Bias::Bullish,
            index: 44,
            level: 15040.0,
            close: 15046.0,
        }];
        assert_eq!(
            momentum(&bundle).unwrap(),
            "Momentum: strong trend, last thrust bearish, last breakout bullish."
        );

        bundle.momentum.trend_strength = None;
        bundle.momentum.thrust_signals.clear();
        assert_eq!(momentum(&bundle).unwrap(), "Momentum: last breakout bullish.");
    }

    #[test]
    fn test_hand_built_bundle_clause_order() {
        let mut bundle = empty_bundle();
        bundle.patterns = vec![record(PatternKind::Flag, "bull_flag", true, 0.7)].into_iter().collect();
        bundle.liquidity.fair_value_gaps = vec![gap(Bias::Bearish, 1)];
        bundle.momentum.trend_strength = Some(0.002);

        let bars = bars_from(&[(15000.0, 15010.0, 14995.0, 15005.0, 100.0)]);
        assert_eq!(
            Summarizer::default().summarize(&bundle, &bars),
            "Price 15005.00, bar range 0.10%. Patterns: bull_flag (0.70). \
             Liquidity: FVGs mostly bearish (1/1). Momentum: weak trend."
        );
    }

    #[test]
    fn test_single_bar_digest() {
        let bars = bars_from(&[(15000.0, 15010.0, 14995.0, 15005.0, 100.0)]);
        let bundle = FeatureAggregator::default().extract(&bars);
        let text = Summarizer::default().summarize(&bundle, &bars);
        // Typical price (15010 + 14995 + 15005) / 3
        assert_eq!(text, "Price 15005.00, bar range 0.10%. Levels: VWAP 15003.33.");
    }

    #[test]
    fn test_context_classifies_prior_bar_change() {
        let bars = bars_from_closes(&[15000.0, 15030.0], 100.0);
        let text = market_context(&bars).unwrap();
        assert!(text.contains("bullish (+0.20%)"), "{}", text);

        let bars = bars_from_closes(&[15000.0, 15010.0], 100.0);
        assert!(market_context(&bars).unwrap().contains("neutral"));

        let bars = bars_from_closes(&[15000.0, 14970.0], 100.0);
        assert!(market_context(&bars).unwrap().contains("bearish (-0.20%)"));
    }

    #[test]
    fn test_technicals_clause() {
        let mut ind = IndicatorSet::new();
        ind.insert("sma_20".to_string(), 15010.0);
        ind.insert("sma_50".to_string(), 15000.0);
        ind.insert("rsi_14".to_string(), 75.34);
        ind.insert("macd".to_string(), 1.0);
        ind.insert("macd_signal".to_string(), 2.0);
        ind.insert("bb_width".to_string(), 0.002);
        assert_eq!(
            technicals(&ind).unwrap(),
            "Technicals: SMA20 above SMA50, RSI 75.3 overbought, MACD bearish, low volatility."
        );
        assert_eq!(technicals(&IndicatorSet::new()), None);
    }

    #[test]
    fn test_clause_order_on_full_window() {
        let bars = random_walk(7, 120);
        let bundle = FeatureAggregator::default().extract(&bars);
        let text = Summarizer::new(1000).summarize(&bundle, &bars);

        assert!(text.starts_with("Price "));
        let tech = text.find("Technicals:").unwrap();
        let lvls = text.find("Levels:").unwrap();
        let vol = text.find("Volume:").unwrap();
        assert!(tech < lvls && lvls < vol);
    }

    #[test]
    fn test_truncates_at_sentence_near_cut() {
        let text = "Aaaa bbbb cccc dddd. Eeee ffff.";
        // Cut at 23 leaves "Aaaa bbbb cccc dddd. Ee"; the period at 19 is within the last 20%
        assert_eq!(truncate_to_budget(text, 23), "Aaaa bbbb cccc dddd.");
    }

    #[test]
    fn test_truncates_with_ellipsis_when_boundary_far() {
        let text = "Short. Then a very long clause without any stop at all";
        let out = truncate_to_budget(text, 40);
        assert!(out.ends_with(ELLIPSIS));
        assert_eq!(out.len(), 40 + ELLIPSIS.len());
    }

    #[test]
    fn test_decimal_point_is_not_a_sentence_end() {
        let text = "Price 15050.25 and more words after it";
        let out = truncate_to_budget(text, 13);
        assert_eq!(out, "Price 15050.2...");
    }

    #[test]
    fn test_length_bound_holds_for_any_budget() {
        for seed in 0..5 {
            let bars = random_walk(seed, 150);
            let bundle = FeatureAggregator::default().extract(&bars);
            for max_tokens in [1, 5, 10, 25, 50, 100, 200] {
                let text = Summarizer::new(max_tokens).summarize(&bundle, &bars);
                assert!(
                    text.len() <= max_tokens * CHARS_PER_TOKEN + ELLIPSIS.len(),
                    "seed {} budget {}: {} chars",
                    seed,
                    max_tokens,
                    text.len()
                );
            }
        }
    }
}
