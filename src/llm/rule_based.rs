//! Deterministic offline stand-in for a model
//!
//! Scores directional cues in the prompt's market summary and answers in the
//! seven-line reply format with a fixed stop distance and reward multiple.

use async_trait::async_trait;

use super::{LlmBackend, LlmError};
use crate::analysis::prompt::current_price_from_prompt;
use crate::analysis::{Action, TradingSignal};
use crate::config::RuleBasedConfig;

const BULLISH_CUES: [&str; 7] = [
    "bullish",
    " above ",
    "oversold",
    "double_bottom",
    "bull_flag",
    "ascending_triangle",
    "falling_wedge",
];

const BEARISH_CUES: [&str; 7] = [
    "bearish",
    " below ",
    "overbought",
    "double_top",
    "bear_flag",
    "descending_triangle",
    "rising_wedge",
];

#[derive(Debug, Clone)]
pub struct RuleBasedBackend {
    /// Net cue count needed to take a side
    min_score: i32,
    /// Stop distance in points
    stop_points: f64,
    /// Target distance as a multiple of the stop distance
    reward_multiple: f64,
}

impl Default for RuleBasedBackend {
    fn default() -> Self {
        Self::new(&RuleBasedConfig::default())
    }
}

/// Text between "Market summary:" and the response instructions
fn summary_section(prompt: &str) -> &str {
    let start = prompt
        .find("Market summary:")
        .map_or(0, |i| i + "Market summary:".len());
    let rest = &prompt[start..];
    rest.find("Respond using").map_or(rest, |end| &rest[..end])
}

fn count_cues(text: &str, cues: &[&str]) -> i32 {
    cues.iter().map(|cue| text.matches(cue).count() as i32).sum()
}

impl RuleBasedBackend {
    pub fn new(config: &RuleBasedConfig) -> Self {
        Self {
            min_score: config.min_score,
            stop_points: config.stop_points,
            reward_multiple: config.reward_multiple,
        }
    }

    /// Decide from the prompt alone
    pub fn decide(&self, prompt: &str) -> TradingSignal {
        let Some(price) = current_price_from_prompt(prompt) else {
            return TradingSignal {
                reasoning: "No current price in prompt.".to_string(),
                ..TradingSignal::default()
            };
        };

        let summary = summary_section(prompt);
        let bullish = count_cues(summary, &BULLISH_CUES);
        let bearish = count_cues(summary, &BEARISH_CUES);
        let score = bullish - bearish;

        let reasoning = format!("Rule-based read: {} bullish vs {} bearish cues.", bullish, bearish);

        let action = if score >= self.min_score {
            Action::Buy
        } else if score <= -self.min_score {
            Action::Sell
        } else {
            return TradingSignal {
                action: Action::Hold,
                confidence: score.unsigned_abs().min(10) as u8,
                reasoning,
                ..TradingSignal::default()
            };
        };

        let direction = if action == Action::Buy { 1.0 } else { -1.0 };
        let stop = price - direction * self.stop_points;
        let target = price + direction * self.stop_points * self.reward_multiple;

        TradingSignal {
            action,
            confidence: (4 + score.unsigned_abs()).min(10) as u8,
            entry_price: Some(price),
            stop_loss: Some(stop),
            take_profit: Some(target),
            position_size: 1,
            reasoning,
        }
    }
}

#[async_trait]
impl LlmBackend for RuleBasedBackend {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        Ok(self.decide(prompt).to_response_text())
    }

    fn name(&self) -> &str {
        "rule_based"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{parse, PromptBuilder};

    #[tokio::test]
    async fn test_bullish_summary_buys() {
        let prompt = PromptBuilder::default().build(
            15000.0,
            "Price 15000.00, bullish (+0.20%) vs prior bar. Technicals: SMA20 above SMA50, RSI 28.0 oversold.",
        );
        let reply = RuleBasedBackend::default().generate(&prompt).await.unwrap();
        let signal = parse(&reply);

        assert_eq!(signal.action, Action::Buy);
        assert_eq!(signal.entry_price, Some(15000.0));
        assert_eq!(signal.stop_loss, Some(14990.0));
        assert_eq!(signal.take_profit, Some(15020.0));
        assert_eq!(signal.confidence, 7);
        assert!(signal.reasoning.starts_with("Rule-based read: 3 bullish vs 0 bearish"));
    }

    #[test]
    fn test_bearish_summary_sells() {
        let prompt = PromptBuilder::default().build(
            15000.0,
            "Technicals: SMA20 below SMA50, RSI 75.0 overbought, MACD bearish. Patterns: double_top (0.75).",
        );
        let signal = RuleBasedBackend::default().decide(&prompt);
        assert_eq!(signal.action, Action::Sell);
        assert_eq!(signal.stop_loss, Some(15010.0));
        assert_eq!(signal.take_profit, Some(14980.0));
    }

    #[test]
    fn test_mixed_summary_holds() {
        let prompt = PromptBuilder::default().build(15000.0, "Liquidity: last liquidity grab bullish, last order block bearish.");
        let signal = RuleBasedBackend::default().decide(&prompt);
        assert_eq!(signal.action, Action::Hold);
        assert_eq!(signal.entry_price, None);
    }

    #[test]
    fn test_template_text_is_not_scored() {
        // The instructions mention BUY/SELL but carry no cues
        let prompt = PromptBuilder::default().build(15000.0, "");
        let signal = RuleBasedBackend::default().decide(&prompt);
        assert_eq!(signal.action, Action::Hold);
        assert!(signal.reasoning.contains("0 bullish vs 0 bearish"));
    }

    #[test]
    fn test_configured_bracket_and_threshold() {
        let backend = RuleBasedBackend::new(&RuleBasedConfig {
            min_score: 1,
            stop_points: 4.0,
            reward_multiple: 3.0,
        });
        let prompt = PromptBuilder::default().build(15000.0, "MACD bullish.");
        let signal = backend.decide(&prompt);
        assert_eq!(signal.action, Action::Buy);
        assert_eq!(signal.stop_loss, Some(14996.0));
        assert_eq!(signal.take_profit, Some(15012.0));

        // One cue is below the default threshold
        assert_eq!(RuleBasedBackend::default().decide(&prompt).action, Action::Hold);
    }

    #[test]
    fn test_missing_price_holds() {
        let signal = RuleBasedBackend::default().decide("Market summary:\nbullish bullish bullish");
        assert_eq!(signal.action, Action::Hold);
        assert_eq!(signal.confidence, 0);
    }
}
