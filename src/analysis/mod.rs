//! Analysis core - from an OHLCV window to a validated trading signal
//!
//! - Indicator engine (SMA/EMA/RSI/MACD/Bollinger/ATR)
//! - Chart patterns, liquidity structures and statistical levels
//! - Momentum and volume events
//! - Feature aggregation and the bounded market summary
//! - Prompt rendering and reply parsing
//!
//! Everything here is a pure function of its input window.

pub mod features;
pub mod history;
pub mod indicators;
pub mod levels;
pub mod liquidity;
pub mod momentum;
pub mod patterns;
pub mod prompt;
pub mod signal;
pub mod summary;

// Re-export commonly used types
pub use features::{FeatureAggregator, FeatureBundle};
pub use history::{AnalysisHistory, AnalysisResult, HISTORY_CAPACITY};
pub use indicators::{compute_indicators, IndicatorSet};
pub use levels::StatisticalLevels;
pub use liquidity::LiquidityFeatures;
pub use momentum::{MomentumFeatures, VolumeFeatures};
pub use patterns::{PatternDetails, PatternKind, PatternRecord, PatternSet};
pub use prompt::PromptBuilder;
pub use signal::{parse, Action, RawSignal, TradingSignal};
pub use summary::Summarizer;
