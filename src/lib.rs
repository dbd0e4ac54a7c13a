// Library crate - analysis core, LLM backends, paper execution

pub mod agent;
pub mod analysis;
pub mod config;
pub mod data;
pub mod execution;
pub mod llm;
pub mod types;

// Re-export commonly used types
pub use analysis::{Action, FeatureBundle, TradingSignal};
pub use config::AppConfig;
pub use types::*;
