//! Application configuration
//!
//! Every section has defaults, so a YAML file only needs the keys it
//! overrides. Unknown keys are rejected to catch typos early.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::execution::RiskConfig;

/// Instrument metadata rendered into the prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstrumentConfig {
    /// Root symbol (e.g., "NQ" for E-mini Nasdaq)
    pub symbol: String,
    /// Minimum price increment
    pub tick_size: f64,
    /// Dollar value of one tick
    pub tick_value: f64,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            symbol: "NQ".to_string(),
            tick_size: 0.25,
            tick_value: 5.0, // NQ = $20/pt
        }
    }
}

impl InstrumentConfig {
    /// Dollar value of a full point
    pub fn point_value(&self) -> f64 {
        if self.tick_size > 0.0 {
            self.tick_value / self.tick_size
        } else {
            0.0
        }
    }
}

/// Indicator periods (`indicators.*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndicatorConfig {
    pub sma_periods: Vec<usize>,
    pub ema_periods: Vec<usize>,
    pub rsi_periods: Vec<usize>,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub atr_period: usize,
    pub volume_ma_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma_periods: vec![20, 50],
            ema_periods: vec![9, 21],
            rsi_periods: vec![14],
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
            volume_ma_period: 20,
        }
    }
}

/// Pattern detection settings (`patterns.*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatternConfig {
    /// Trailing bars scanned for chart patterns and liquidity structures
    pub lookback: usize,
    /// Detections with a lower confidence are reported as not detected
    pub min_strength: f64,
    /// Half-width of the symmetric peak/trough window
    pub peak_separation: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            lookback: 50,
            min_strength: 0.6,
            peak_separation: 5,
        }
    }
}

/// Summary budget (`summary.*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SummaryConfig {
    /// Approximate token budget, estimated at 4 characters per token
    pub max_tokens: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self { max_tokens: 200 }
    }
}

/// When the streaming loop should run an analysis cycle (`scheduler.*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Never analyze more often than this
    pub min_interval_secs: i64,
    /// Always analyze after this long
    pub max_interval_secs: i64,
    /// Fractional price move since the last analysis (0.002 = 0.2%)
    pub price_change_threshold: f64,
    /// Latest volume over its trailing 20-bar average
    pub volume_spike_ratio: f64,
    /// Fire on a breakout or fresh pattern on the latest bar
    pub trigger_on_breakout: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 60,
            max_interval_secs: 300,
            price_change_threshold: 0.002,
            volume_spike_ratio: 2.0,
            trigger_on_breakout: true,
        }
    }
}

/// LLM backend selection (`llm.*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// "rule_based" (offline) or "http"
    pub backend: String,
    /// Completion endpoint for the http backend
    pub endpoint: String,
    pub model: String,
    /// Reply budget requested from the model
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Sent as a bearer token when present; usually comes from the environment
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub rule_based: RuleBasedConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: "rule_based".to_string(),
            endpoint: "http://localhost:8000/v1/completions".to_string(),
            model: "default".to_string(),
            max_tokens: 300,
            temperature: 0.2,
            timeout_secs: 30,
            api_key: None,
            rule_based: RuleBasedConfig::default(),
        }
    }
}

/// Offline backend tuning (`llm.rule_based.*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleBasedConfig {
    /// Net cue count needed to take a side
    pub min_score: i32,
    /// Stop distance in points
    pub stop_points: f64,
    /// Target distance as a multiple of the stop distance
    pub reward_multiple: f64,
}

impl Default for RuleBasedConfig {
    fn default() -> Self {
        Self {
            min_score: 2,
            stop_points: 10.0,
            reward_multiple: 2.0,
        }
    }
}

/// Rolling window fed to the pipeline (`data.*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Bars kept in the rolling window
    pub window_size: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { window_size: 200 }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub instrument: InstrumentConfig,
    pub indicators: IndicatorConfig,
    pub patterns: PatternConfig,
    pub summary: SummaryConfig,
    pub scheduler: SchedulerConfig,
    pub risk: RiskConfig,
    pub llm: LlmConfig,
    pub data: DataConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        let ind = &self.indicators;
        let periods = ind
            .sma_periods
            .iter()
            .chain(&ind.ema_periods)
            .chain(&ind.rsi_periods)
            .chain([
                &ind.macd_fast,
                &ind.macd_slow,
                &ind.macd_signal,
                &ind.bb_period,
                &ind.atr_period,
                &ind.volume_ma_period,
            ]);
        for &period in periods {
            if period == 0 {
                bail!("indicator periods must be positive");
            }
        }
        if ind.macd_fast >= ind.macd_slow {
            bail!("indicators.macd_fast ({}) must be below macd_slow ({})", ind.macd_fast, ind.macd_slow);
        }
        if self.patterns.lookback == 0 || self.patterns.peak_separation == 0 {
            bail!("patterns.lookback and patterns.peak_separation must be positive");
        }
        if !(0.0..=1.0).contains(&self.patterns.min_strength) {
            bail!("patterns.min_strength must be within 0..=1");
        }
        if self.summary.max_tokens == 0 {
            bail!("summary.max_tokens must be positive");
        }
        if self.scheduler.min_interval_secs > self.scheduler.max_interval_secs {
            bail!("scheduler.min_interval_secs must not exceed max_interval_secs");
        }
        if self.instrument.tick_size <= 0.0 {
            bail!("instrument.tick_size must be positive");
        }
        if self.data.window_size == 0 {
            bail!("data.window_size must be positive");
        }
        let rb = &self.llm.rule_based;
        if rb.min_score < 1 || rb.stop_points <= 0.0 || rb.reward_multiple <= 0.0 {
            bail!("llm.rule_based min_score, stop_points and reward_multiple must be positive");
        }
        Ok(())
    }
}
