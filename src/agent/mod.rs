//! Analysis agent - runs one cycle from window to validated signal
//!
//! features -> summary -> prompt -> backend -> parse/validate
//!
//! A backend failure never escapes a cycle: it becomes a HOLD signal carrying
//! the error text. Invalid windows are returned as errors.

mod scheduler;

use anyhow::{bail, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::prompt::PromptBuilder;
use crate::analysis::{self, AnalysisHistory, AnalysisResult, FeatureAggregator, Summarizer, TradingSignal};
use crate::config::AppConfig;
use crate::llm::LlmBackend;
use crate::types::{validate_window, Bar};

pub use scheduler::{AnalysisScheduler, TriggerReason};

pub struct AnalysisAgent {
    aggregator: FeatureAggregator,
    summarizer: Summarizer,
    prompts: PromptBuilder,
    backend: Box<dyn LlmBackend>,
    history: AnalysisHistory,
}

impl AnalysisAgent {
    pub fn new(config: &AppConfig, backend: Box<dyn LlmBackend>) -> Self {
        Self {
            aggregator: FeatureAggregator::new(config.indicators.clone(), config.patterns.clone()),
            summarizer: Summarizer::new(config.summary.max_tokens),
            prompts: PromptBuilder::new(&config.instrument),
            backend,
            history: AnalysisHistory::default(),
        }
    }

    /// Run one cycle over `bars` and record the result in the history ring
    pub async fn analyze(&mut self, bars: &[Bar]) -> Result<AnalysisResult> {
        let Some(latest) = bars.last() else {
            bail!("Cannot analyze an empty window");
        };
        validate_window(bars)?;

        let features = self.aggregator.extract(bars);
        let summary = self.summarizer.summarize(&features, bars);
        let prompt = self.prompts.build(latest.close, &summary);
        debug!("Summary ({} chars): {}", summary.len(), summary);

        let (response, signal) = match self.backend.generate(&prompt).await {
            Ok(text) => {
                let signal = analysis::parse(&text);
                (text, signal)
            }
            Err(e) => {
                warn!("{} backend failed: {}", self.backend.name(), e);
                (String::new(), TradingSignal::failed(e))
            }
        };

        info!(
            "Analysis @ {:.2}: {} (confidence {}, size {})",
            latest.close, signal.action, signal.confidence, signal.position_size
        );

        let result = AnalysisResult {
            id: Uuid::new_v4(),
            timestamp: latest.timestamp,
            price: latest.close,
            features,
            summary,
            prompt,
            response,
            signal,
        };
        self.history.push(result.clone());

        Ok(result)
    }

    pub fn history(&self) -> &AnalysisHistory {
        &self.history
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}
