//! Trading signal parsing and validation
//!
//! `scan` is a single pass over the reply's lines that picks out the seven
//! labelled fields with per-field fallbacks. `validate` then corrects values
//! the executor must not see and records every correction in `reasoning`.
//! `parse` chains the two and never fails.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::IntErrorKind;

/// Highest confidence a signal can carry
pub const MAX_CONFIDENCE: u8 = 10;

/// Largest accepted position size in contracts
pub const MAX_POSITION_SIZE: u32 = 10;

/// Risk-reward ratios below this cost confidence
const MIN_RISK_REWARD: f64 = 1.0;

/// Confidence deducted for a poor risk-reward ratio
const RISK_REWARD_PENALTY: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        }
    }

    /// Exact uppercase label match
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "BUY" => Some(Action::Buy),
            "SELL" => Some(Action::Sell),
            "HOLD" => Some(Action::Hold),
            _ => None,
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, Action::Buy | Action::Sell)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated decision handed to the executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub action: Action,
    /// 0 (none) to 10
    pub confidence: u8,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// Contracts, 1 to 10
    pub position_size: u32,
    pub reasoning: String,
}

impl Default for TradingSignal {
    fn default() -> Self {
        Self {
            action: Action::Hold,
            confidence: 0,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            position_size: 1,
            reasoning: String::new(),
        }
    }
}

impl TradingSignal {
    /// Safe HOLD used when the backend could not produce an answer
    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            reasoning: format!("Analysis failed: {}", error),
            ..Self::default()
        }
    }

    /// Reward over risk, when all three prices are present
    pub fn risk_reward(&self) -> Option<f64> {
        risk_reward(
            self.action,
            self.entry_price?,
            self.stop_loss?,
            self.take_profit?,
        )
    }

    /// Render in the seven-line reply format `parse` reads
    pub fn to_response_text(&self) -> String {
        let price = |p: Option<f64>| p.map_or_else(|| "N/A".to_string(), |v| v.to_string());
        format!(
            "ACTION: {}\nCONFIDENCE: {}\nENTRY: {}\nSTOP_LOSS: {}\nTAKE_PROFIT: {}\nSIZE: {}\nREASONING: {}",
            self.action,
            self.confidence,
            price(self.entry_price),
            price(self.stop_loss),
            price(self.take_profit),
            self.position_size,
            self.reasoning
        )
    }
}

/// Fields as read from the reply, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct RawSignal {
    /// Uppercased, not yet checked against `Action`
    pub action: String,
    pub confidence: i64,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub position_size: i64,
    pub reasoning: String,
}

impl Default for RawSignal {
    fn default() -> Self {
        Self {
            action: Action::Hold.as_str().to_string(),
            confidence: 0,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            position_size: 1,
            reasoning: String::new(),
        }
    }
}

/// Labelled line of the reply format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Action,
    Confidence,
    Entry,
    StopLoss,
    TakeProfit,
    Size,
    Reasoning,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Action,
        Field::Confidence,
        Field::Entry,
        Field::StopLoss,
        Field::TakeProfit,
        Field::Size,
        Field::Reasoning,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Field::Action => "ACTION",
            Field::Confidence => "CONFIDENCE",
            Field::Entry => "ENTRY",
            Field::StopLoss => "STOP_LOSS",
            Field::TakeProfit => "TAKE_PROFIT",
            Field::Size => "SIZE",
            Field::Reasoning => "REASONING",
        }
    }

    /// Split `LABEL: value` into the field and its trimmed value
    pub fn match_line(line: &str) -> Option<(Field, &str)> {
        Field::ALL.iter().find_map(|&field| {
            line.strip_prefix(field.label())
                .and_then(|rest| rest.strip_prefix(':'))
                .map(|value| (field, value.trim()))
        })
    }
}

/// Integers too large for i64 saturate so validation still sees them as out of range
fn parse_int(value: &str, fallback: i64) -> i64 {
    match value.parse::<i64>() {
        Ok(v) => v,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => i64::MAX,
            IntErrorKind::NegOverflow => i64::MIN,
            _ => fallback,
        },
    }
}

fn parse_price(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Read labelled fields from a model reply. Unlabelled lines are ignored;
/// a repeated label overwrites the earlier value.
pub fn scan(text: &str) -> RawSignal {
    let mut raw = RawSignal::default();

    for line in text.lines() {
        let Some((field, value)) = Field::match_line(line.trim()) else {
            continue;
        };

        match field {
            Field::Action => raw.action = value.to_uppercase(),
            Field::Confidence => raw.confidence = parse_int(value, 0),
            Field::Entry => raw.entry_price = parse_price(value),
            Field::StopLoss => raw.stop_loss = parse_price(value),
            Field::TakeProfit => raw.take_profit = parse_price(value),
            Field::Size => raw.position_size = parse_int(value, 1),
            Field::Reasoning => raw.reasoning = value.to_string(),
        }
    }

    raw
}

fn risk_reward(action: Action, entry: f64, stop: f64, target: f64) -> Option<f64> {
    let (risk, reward) = match action {
        Action::Buy => (entry - stop, target - entry),
        Action::Sell => (stop - entry, entry - target),
        Action::Hold => return None,
    };
    if risk > 0.0 {
        Some(reward / risk)
    } else {
        None
    }
}

/// Correct out-of-range values, appending a note for each correction
pub fn validate(raw: RawSignal) -> TradingSignal {
    let mut notes: Vec<String> = Vec::new();

    let action = Action::from_label(&raw.action).unwrap_or_else(|| {
        notes.push(format!("Invalid action '{}' corrected to HOLD.", raw.action));
        Action::Hold
    });

    let mut confidence = match u8::try_from(raw.confidence) {
        Ok(c) if c <= MAX_CONFIDENCE => c,
        _ => {
            notes.push(format!("Invalid confidence {} reset to 0.", raw.confidence));
            0
        }
    };

    let mut check_price = |name: &str, price: Option<f64>| match price {
        Some(p) if p <= 0.0 => {
            notes.push(format!("Invalid {} price removed.", name));
            None
        }
        other => other,
    };
    let entry_price = check_price("entry", raw.entry_price);
    let stop_loss = check_price("stop loss", raw.stop_loss);
    let take_profit = check_price("take profit", raw.take_profit);

    let position_size = match u32::try_from(raw.position_size) {
        Ok(s) if (1..=MAX_POSITION_SIZE).contains(&s) => s,
        _ => {
            notes.push(format!("Invalid position size {} reset to 1.", raw.position_size));
            1
        }
    };

    if let (true, Some(entry), Some(stop), Some(target)) =
        (action.is_entry(), entry_price, stop_loss, take_profit)
    {
        match risk_reward(action, entry, stop, target) {
            Some(ratio) if ratio < MIN_RISK_REWARD => {
                confidence = confidence.saturating_sub(RISK_REWARD_PENALTY);
                notes.push(format!(
                    "Poor risk-reward ratio {:.2}, confidence reduced by {}.",
                    ratio, RISK_REWARD_PENALTY
                ));
            }
            Some(_) => {}
            None => {
                confidence = confidence.saturating_sub(RISK_REWARD_PENALTY);
                notes.push(format!(
                    "Stop loss on the wrong side of entry for {}, confidence reduced by {}.",
                    action, RISK_REWARD_PENALTY
                ));
            }
        }
    }

    let mut reasoning = raw.reasoning;
    for note in notes {
        if !reasoning.is_empty() {
            reasoning.push(' ');
        }
        reasoning.push_str(&note);
    }

    TradingSignal {
        action,
        confidence,
        entry_price,
        stop_loss,
        take_profit,
        position_size,
        reasoning,
    }
}

/// Scan and validate a model reply
pub fn parse(text: &str) -> TradingSignal {
    validate(scan(text))
}
