//! Prompt rendering for the LLM backend

use crate::config::InstrumentConfig;

/// Labels the model must answer with, one per line, in order
pub const RESPONSE_LABELS: [&str; 7] = [
    "ACTION",
    "CONFIDENCE",
    "ENTRY",
    "STOP_LOSS",
    "TAKE_PROFIT",
    "SIZE",
    "REASONING",
];

const TEMPLATE: &str = "\
You are an experienced index futures day trader. Analyze the market data below and decide on a single trade.

Instrument: tick size {tick_size}, tick value ${tick_value}
Current price: {current_price}

Market summary:
{summary}

Respond using exactly these seven lines and nothing else:
ACTION: BUY, SELL or HOLD
CONFIDENCE: integer from 0 (none) to 10 (highest)
ENTRY: entry price
STOP_LOSS: stop loss price
TAKE_PROFIT: take profit price
SIZE: number of contracts from 1 to 10
REASONING: one or two sentences";

/// Renders the fixed analysis template
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    tick_size: f64,
    tick_value: f64,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(&InstrumentConfig::default())
    }
}

impl PromptBuilder {
    pub fn new(instrument: &InstrumentConfig) -> Self {
        Self {
            tick_size: instrument.tick_size,
            tick_value: instrument.tick_value,
        }
    }

    pub fn build(&self, current_price: f64, summary: &str) -> String {
        TEMPLATE
            .replace("{tick_size}", &self.tick_size.to_string())
            .replace("{tick_value}", &format!("{:.2}", self.tick_value))
            .replace("{current_price}", &format!("{:.2}", current_price))
            .replace("{summary}", summary)
    }
}

/// Extract the price rendered by `PromptBuilder::build`
pub fn current_price_from_prompt(prompt: &str) -> Option<f64> {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Current price:"))
        .and_then(|rest| rest.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_variables() {
        let prompt = PromptBuilder::default().build(15050.25, "Price 15050.25, neutral.");
        assert!(prompt.contains("tick size 0.25, tick value $5.00"));
        assert!(prompt.contains("Current price: 15050.25"));
        assert!(prompt.contains("Market summary:\nPrice 15050.25, neutral."));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_asks_for_every_label_in_order() {
        let prompt = PromptBuilder::default().build(100.0, "");
        let positions: Vec<usize> = RESPONSE_LABELS
            .iter()
            .map(|label| prompt.find(&format!("\n{}: ", label)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_price_round_trips_through_prompt() {
        let instrument = InstrumentConfig {
            symbol: "ES".to_string(),
            tick_size: 0.25,
            tick_value: 12.5,
        };
        let prompt = PromptBuilder::new(&instrument).build(5012.5, "summary");
        assert!(prompt.contains("tick value $12.50"));
        assert_eq!(current_price_from_prompt(&prompt), Some(5012.5));
        assert_eq!(current_price_from_prompt("no price here"), None);
    }
}
