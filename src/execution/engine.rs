//! Paper executor: applies risk checks to signals and simulates fills

use anyhow::{bail, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::RiskConfig;
use super::position::{ExitReason, PositionManager, Side, TradeRecord};
use crate::analysis::TradingSignal;
use crate::types::Bar;

/// Simulated execution against the bar stream. Entries fill at the signal's
/// entry when the bar traded there, otherwise at the bar close. Exits fill at
/// the stop/target level that was touched.
#[derive(Debug)]
pub struct PaperExecutor {
    config: RiskConfig,
    position_manager: PositionManager,
    daily_loss_limit_hit: bool,
    max_losses_hit: bool,
}

impl PaperExecutor {
    pub fn new(config: RiskConfig, point_value: f64) -> Self {
        let position_manager = PositionManager::new(config.starting_balance, point_value, config.max_history);

        Self {
            config,
            position_manager,
            daily_loss_limit_hit: false,
            max_losses_hit: false,
        }
    }

    /// Advance to `bar`: roll the trading day and close on a stop/target touch
    pub fn on_bar(&mut self, bar: &Bar) -> Option<TradeRecord> {
        if self.position_manager.roll_day(bar.timestamp.date_naive()) {
            self.reset_daily();
        }

        let (price, reason) = self.position_manager.position()?.exit_trigger(bar)?;
        self.close_position(price, bar, reason)
    }

    /// Act on a validated signal at `bar`.
    ///
    /// HOLD is a no-op. An opposite signal closes the open position before
    /// the new one is checked. Risk rejections are returned as errors.
    pub fn execute_signal(&mut self, signal: &TradingSignal, bar: &Bar) -> Result<Option<Uuid>> {
        let Some(side) = Side::from_action(signal.action) else {
            return Ok(None);
        };

        if let Some((open_side, quantity)) = self.position_manager.position().map(|p| (p.side, p.quantity)) {
            if open_side == side {
                bail!("Already {} {}, signal ignored", open_side, quantity);
            }
            self.close_position(bar.close, bar, ExitReason::Reversal);
        }

        if self.daily_loss_limit_hit {
            bail!("Daily loss limit already reached, no new trades");
        }

        if self.max_losses_hit {
            bail!("Max daily losses ({}) reached, no new trades", self.config.max_daily_losses);
        }

        if signal.confidence < self.config.min_confidence {
            bail!(
                "Confidence {} below minimum {}",
                signal.confidence,
                self.config.min_confidence
            );
        }

        if signal.position_size > self.config.max_position_size {
            bail!(
                "Would exceed max position size ({} > {})",
                signal.position_size,
                self.config.max_position_size
            );
        }

        let entry = fill_price(signal.entry_price, bar);
        check_bracket(side, entry, signal.stop_loss, signal.take_profit)?;

        let id = self.position_manager.open(
            side,
            signal.position_size,
            entry,
            signal.stop_loss,
            signal.take_profit,
            bar.timestamp,
        );

        info!(
            "Paper {} {} @ {:.2} (stop {}, target {})",
            side,
            signal.position_size,
            entry,
            fmt_level(signal.stop_loss),
            fmt_level(signal.take_profit)
        );

        Ok(Some(id))
    }

    /// Close any open position at the bar close
    pub fn flatten(&mut self, bar: &Bar) -> Option<TradeRecord> {
        self.close_position(bar.close, bar, ExitReason::EndOfSession)
    }

    fn close_position(&mut self, price: f64, bar: &Bar, reason: ExitReason) -> Option<TradeRecord> {
        let record = self.position_manager.close(price, bar.timestamp, reason)?;

        info!(
            "{} hit @ {:.2}: P&L {:.1} pts",
            reason, price, record.pnl_points
        );

        self.check_daily_limit();
        Some(record)
    }

    /// Check if daily loss limit or max losses hit
    fn check_daily_limit(&mut self) {
        let daily_pnl = self.position_manager.daily_pnl_points();
        if !self.daily_loss_limit_hit && daily_pnl <= -self.config.daily_loss_limit {
            self.daily_loss_limit_hit = true;
            warn!(
                "Daily loss limit reached: {:.1} pts (limit: -{:.1})",
                daily_pnl, self.config.daily_loss_limit
            );
        }

        let loss_count = self.position_manager.daily_summary().losses;
        if !self.max_losses_hit && loss_count >= self.config.max_daily_losses {
            self.max_losses_hit = true;
            warn!(
                "Max daily losses reached: {} losses (limit: {})",
                loss_count, self.config.max_daily_losses
            );
        }
    }

    pub fn is_daily_limit_hit(&self) -> bool {
        self.daily_loss_limit_hit
    }

    pub fn is_max_losses_hit(&self) -> bool {
        self.max_losses_hit
    }

    /// Either limit hit
    pub fn is_trading_stopped(&self) -> bool {
        self.daily_loss_limit_hit || self.max_losses_hit
    }

    pub fn position_manager(&self) -> &PositionManager {
        &self.position_manager
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    fn reset_daily(&mut self) {
        self.daily_loss_limit_hit = false;
        self.max_losses_hit = false;
        info!("Reset for new trading day");
    }
}

/// Requested entry if `bar` traded through it, else the bar close
fn fill_price(requested: Option<f64>, bar: &Bar) -> f64 {
    match requested {
        Some(price) if (bar.low..=bar.high).contains(&price) => price,
        Some(price) => {
            debug!(
                "Entry {:.2} outside bar {:.2}-{:.2}, filling at close {:.2}",
                price, bar.low, bar.high, bar.close
            );
            bar.close
        }
        None => bar.close,
    }
}

/// Stop must sit on the losing side of the fill and target on the winning side
fn check_bracket(side: Side, entry: f64, stop: Option<f64>, target: Option<f64>) -> Result<()> {
    let (stop_ok, target_ok) = match side {
        Side::Long => (stop.map_or(true, |s| s < entry), target.map_or(true, |t| t > entry)),
        Side::Short => (stop.map_or(true, |s| s > entry), target.map_or(true, |t| t < entry)),
    };

    if !stop_ok {
        bail!("Stop {} on the wrong side of {} entry {:.2}", fmt_level(stop), side, entry);
    }
    if !target_ok {
        bail!("Target {} on the wrong side of {} entry {:.2}", fmt_level(target), side, entry);
    }
    Ok(())
}

fn fmt_level(level: Option<f64>) -> String {
    level.map_or_else(|| "none".to_string(), |v| format!("{:.2}", v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Action;
    use crate::types::test_support::bars_from;
    use crate::types::Bar;
    use chrono::Duration;

    fn buy(confidence: u8) -> TradingSignal {
        TradingSignal {
            action: Action::Buy,
            confidence,
            entry_price: Some(21505.0),
            stop_loss: Some(21495.0),
            take_profit: Some(21525.0),
            position_size: 1,
            reasoning: String::new(),
        }
    }

    fn bar(high: f64, low: f64, close: f64) -> Bar {
        bars_from(&[(close, high, low, close, 100.0)]).remove(0)
    }

    #[test]
    fn test_execute_signal_opens_at_entry() {
        let mut engine = PaperExecutor::new(RiskConfig::default(), 20.0);
        let id = engine.execute_signal(&buy(8), &bar(21506.0, 21500.0, 21503.0)).unwrap();
        assert!(id.is_some());

        let position = engine.position_manager().position().unwrap();
        assert_eq!(position.side, Side::Long);
        assert_eq!(position.entry_price, 21505.0);
    }

    #[test]
    fn test_entry_outside_bar_fills_at_close() {
        let mut engine = PaperExecutor::new(RiskConfig::default(), 20.0);
        let mut far = buy(9);
        far.entry_price = Some(14800.0);
        far.stop_loss = Some(14990.0);
        far.take_profit = Some(15020.0);

        engine.execute_signal(&far, &bar(15002.0, 14998.0, 15000.0)).unwrap();
        assert_eq!(engine.position_manager().position().unwrap().entry_price, 15000.0);

        // Bar inside the bracket books nothing
        assert!(engine.on_bar(&bar(15010.0, 14995.0, 15005.0)).is_none());
    }

    #[test]
    fn test_rejects_bracket_on_wrong_side() {
        let mut engine = PaperExecutor::new(RiskConfig::default(), 20.0);
        let b = bar(15002.0, 14998.0, 15000.0);

        let mut bad_stop = buy(9);
        bad_stop.entry_price = Some(15000.0);
        bad_stop.stop_loss = Some(15010.0);
        bad_stop.take_profit = Some(15030.0);
        let err = engine.execute_signal(&bad_stop, &b).unwrap_err();
        assert!(err.to_string().contains("Stop 15010.00 on the wrong side"));

        let mut bad_target = bad_stop.clone();
        bad_target.stop_loss = Some(14990.0);
        bad_target.take_profit = Some(15000.0);
        assert!(engine.execute_signal(&bad_target, &b).is_err());

        let short = TradingSignal {
            action: Action::Sell,
            confidence: 9,
            entry_price: Some(15000.0),
            stop_loss: Some(14990.0),
            take_profit: Some(14970.0),
            position_size: 1,
            reasoning: String::new(),
        };
        assert!(engine.execute_signal(&short, &b).is_err());

        assert!(engine.position_manager().is_flat());
        assert!(engine.on_bar(&bar(15012.0, 14988.0, 15000.0)).is_none());
        assert!(engine.position_manager().trade_history().is_empty());
    }

    #[test]
    fn test_hold_is_noop() {
        let mut engine = PaperExecutor::new(RiskConfig::default(), 20.0);
        let hold = TradingSignal::default();
        assert_eq!(engine.execute_signal(&hold, &bar(1.0, 1.0, 1.0)).unwrap(), None);
        assert!(engine.position_manager().is_flat());
    }

    #[test]
    fn test_rejects_low_confidence_and_oversize() {
        let mut engine = PaperExecutor::new(RiskConfig::default(), 20.0);
        let b = bar(21506.0, 21500.0, 21503.0);
        let err = engine.execute_signal(&buy(3), &b).unwrap_err();
        assert!(err.to_string().contains("Confidence 3"));

        let mut big = buy(9);
        big.position_size = 5;
        assert!(engine.execute_signal(&big, &b).is_err());
        assert!(engine.position_manager().is_flat());
    }

    #[test]
    fn test_target_touch_closes() {
        let mut engine = PaperExecutor::new(RiskConfig::default(), 20.0);
        engine.execute_signal(&buy(8), &bar(21506.0, 21500.0, 21503.0)).unwrap();

        assert!(engine.on_bar(&bar(21515.0, 21500.0, 21510.0)).is_none());
        let record = engine.on_bar(&bar(21530.0, 21510.0, 21528.0)).unwrap();
        assert_eq!(record.exit_reason, ExitReason::Target);
        assert_eq!(record.pnl_points, 20.0);
        assert!(engine.position_manager().is_flat());
    }

    #[test]
    fn test_opposite_signal_reverses() {
        let mut engine = PaperExecutor::new(RiskConfig::default(), 20.0);
        engine.execute_signal(&buy(8), &bar(21506.0, 21500.0, 21503.0)).unwrap();

        let sell = TradingSignal {
            action: Action::Sell,
            confidence: 8,
            entry_price: None,
            stop_loss: Some(21530.0),
            take_profit: Some(21480.0),
            position_size: 1,
            reasoning: String::new(),
        };
        engine.execute_signal(&sell, &bar(21515.0, 21505.0, 21510.0)).unwrap();

        let history = engine.position_manager().trade_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].exit_reason, ExitReason::Reversal);
        assert_eq!(history[0].pnl_points, 5.0);

        let position = engine.position_manager().position().unwrap();
        assert_eq!(position.side, Side::Short);
        assert_eq!(position.entry_price, 21510.0);
    }

    #[test]
    fn test_same_direction_signal_ignored() {
        let mut engine = PaperExecutor::new(RiskConfig::default(), 20.0);
        let b = bar(21506.0, 21500.0, 21503.0);
        engine.execute_signal(&buy(8), &b).unwrap();
        assert!(engine.execute_signal(&buy(9), &b).is_err());
    }

    #[test]
    fn test_daily_loss_limit() {
        let config = RiskConfig {
            daily_loss_limit: 10.0, // 10 pts limit
            ..Default::default()
        };
        let mut engine = PaperExecutor::new(config, 20.0);
        let b = bar(21506.0, 21500.0, 21503.0);
        engine.execute_signal(&buy(8), &b).unwrap();

        // Stop at 21495 is a 10 pt loss
        engine.on_bar(&bar(21500.0, 21490.0, 21492.0)).unwrap();
        assert!(engine.is_daily_limit_hit());

        let err = engine.execute_signal(&buy(8), &b).unwrap_err();
        assert!(err.to_string().contains("Daily loss limit"));
    }

    #[test]
    fn test_max_daily_losses_until_next_day() {
        let config = RiskConfig {
            max_daily_losses: 3,
            daily_loss_limit: 1000.0, // High limit so we hit loss count first
            ..Default::default()
        };
        let mut engine = PaperExecutor::new(config, 20.0);
        let entry_bar = bar(21506.0, 21500.0, 21503.0);
        let stop_bar = bar(21500.0, 21490.0, 21492.0);
        engine.on_bar(&entry_bar);

        for i in 0..3 {
            engine.execute_signal(&buy(8), &entry_bar).unwrap();
            engine.on_bar(&stop_bar).unwrap();
            if i < 2 {
                assert!(!engine.is_max_losses_hit(), "Should not be hit after {} losses", i + 1);
            }
        }

        assert!(engine.is_trading_stopped());
        let err = engine.execute_signal(&buy(8), &entry_bar).unwrap_err();
        assert!(err.to_string().contains("Max daily losses"));

        let mut next_day = entry_bar.clone();
        next_day.timestamp = next_day.timestamp + Duration::days(1);
        engine.on_bar(&next_day);
        assert!(!engine.is_trading_stopped());
        assert!(engine.execute_signal(&buy(8), &next_day).unwrap().is_some());
    }

    #[test]
    fn test_flatten_closes_at_close() {
        let mut engine = PaperExecutor::new(RiskConfig::default(), 20.0);
        engine.execute_signal(&buy(8), &bar(21506.0, 21500.0, 21503.0)).unwrap();
        let record = engine.flatten(&bar(21512.0, 21504.0, 21508.0)).unwrap();
        assert_eq!(record.exit_reason, ExitReason::EndOfSession);
        assert_eq!(record.pnl_points, 3.0);
        assert!(engine.flatten(&bar(1.0, 1.0, 1.0)).is_none());
    }
}
