//! Feature aggregation: one bundle per analysis cycle

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::indicators::{compute_indicators, IndicatorSet};
use super::levels::{compute_levels, StatisticalLevels};
use super::liquidity::{detect_liquidity, LiquidityFeatures};
use super::momentum::{compute_momentum, compute_volume, MomentumFeatures, VolumeFeatures};
use super::patterns::{detect_patterns, PatternSet};
use crate::config::{IndicatorConfig, PatternConfig};
use crate::types::Bar;

/// Everything the detectors found in one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBundle {
    pub technical_indicators: IndicatorSet,
    pub patterns: PatternSet,
    pub liquidity: LiquidityFeatures,
    pub statistical_levels: StatisticalLevels,
    pub momentum: MomentumFeatures,
    pub volume: VolumeFeatures,
}

/// Runs the indicator, pattern/structure and momentum detectors
#[derive(Debug, Clone, Default)]
pub struct FeatureAggregator {
    indicators: IndicatorConfig,
    patterns: PatternConfig,
}

impl FeatureAggregator {
    pub fn new(indicators: IndicatorConfig, patterns: PatternConfig) -> Self {
        Self { indicators, patterns }
    }

    pub fn extract(&self, bars: &[Bar]) -> FeatureBundle {
        let bundle = FeatureBundle {
            technical_indicators: compute_indicators(bars, &self.indicators),
            patterns: detect_patterns(bars, &self.patterns),
            liquidity: detect_liquidity(bars, self.patterns.lookback),
            statistical_levels: compute_levels(bars, self.patterns.lookback, self.patterns.peak_separation),
            momentum: compute_momentum(bars),
            volume: compute_volume(bars),
        };

        debug!(
            "Extracted features from {} bars: {} indicators, {} patterns, {} FVGs, {} breakouts",
            bars.len(),
            bundle.technical_indicators.len(),
            bundle.patterns.detected().count(),
            bundle.liquidity.fair_value_gaps.len(),
            bundle.momentum.breakout_signals.len()
        );

        bundle
    }
}
