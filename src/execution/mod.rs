//! Simulated execution of trading signals
//!
//! Signals pass independent risk checks before a paper position is opened.
//! Positions close on a stop/target touch, an opposite signal, or at the end
//! of the session.

mod config;
mod engine;
mod position;

pub use config::RiskConfig;
pub use engine::PaperExecutor;
pub use position::{DailyPnL, ExitReason, OpenPosition, PositionManager, Side, TradeRecord};
