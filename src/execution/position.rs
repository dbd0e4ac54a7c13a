//! Simulated position and P&L tracking

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

use crate::analysis::Action;
use crate::types::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// BUY opens long, SELL opens short
    pub fn from_action(action: Action) -> Option<Self> {
        match action {
            Action::Buy => Some(Side::Long),
            Action::Sell => Some(Side::Short),
            Action::Hold => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Stop,
    Target,
    /// Opposite signal
    Reversal,
    /// Flattened when the session ended
    EndOfSession,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Stop => write!(f, "STOP"),
            ExitReason::Target => write!(f, "TARGET"),
            ExitReason::Reversal => write!(f, "REVERSAL"),
            ExitReason::EndOfSession => write!(f, "END_OF_SESSION"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub id: Uuid,
    pub side: Side,
    pub quantity: u32,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub entry_time: DateTime<Utc>,
}

impl OpenPosition {
    /// P&L in points at `price`, across all contracts
    pub fn pnl_points(&self, price: f64) -> f64 {
        let per_contract = match self.side {
            Side::Long => price - self.entry_price,
            Side::Short => self.entry_price - price,
        };
        per_contract * self.quantity as f64
    }

    /// Stop or target touched inside `bar`. The stop wins when both are.
    pub fn exit_trigger(&self, bar: &Bar) -> Option<(f64, ExitReason)> {
        let (stop_hit, target_hit) = match self.side {
            Side::Long => (
                self.stop_loss.filter(|s| bar.low <= *s),
                self.take_profit.filter(|t| bar.high >= *t),
            ),
            Side::Short => (
                self.stop_loss.filter(|s| bar.high >= *s),
                self.take_profit.filter(|t| bar.low <= *t),
            ),
        };

        stop_hit
            .map(|price| (price, ExitReason::Stop))
            .or_else(|| target_hit.map(|price| (price, ExitReason::Target)))
    }
}

/// Individual trade record for P&L history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub side: Side,
    pub quantity: u32,
    pub entry_price: f64,
    pub exit_price: f64,
    /// P&L in points
    pub pnl_points: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub exit_reason: ExitReason,
}

/// Daily P&L summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyPnL {
    /// Session date, set by the first bar seen
    pub date: Option<NaiveDate>,
    /// Gross P&L in points
    pub gross_pnl: f64,
    pub trade_count: u32,
    pub wins: u32,
    pub losses: u32,
    /// Largest win in points
    pub largest_win: f64,
    /// Largest loss in points
    pub largest_loss: f64,
    /// Max drawdown in dollars from the session peak
    pub max_drawdown: f64,
    pub peak_balance: f64,
}

/// Position manager tracks the open position and P&L
#[derive(Debug)]
pub struct PositionManager {
    position: Option<OpenPosition>,
    trade_history: VecDeque<TradeRecord>,
    daily_pnl: DailyPnL,
    running_balance: f64,
    starting_balance: f64,
    /// Dollar value of a point (NQ = $20)
    point_value: f64,
    max_history: usize,
}

impl PositionManager {
    pub fn new(starting_balance: f64, point_value: f64, max_history: usize) -> Self {
        Self {
            position: None,
            trade_history: VecDeque::new(),
            daily_pnl: DailyPnL {
                peak_balance: starting_balance,
                ..DailyPnL::default()
            },
            running_balance: starting_balance,
            starting_balance,
            point_value,
            max_history,
        }
    }

    pub fn position(&self) -> Option<&OpenPosition> {
        self.position.as_ref()
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn running_balance(&self) -> f64 {
        self.running_balance
    }

    /// Today's P&L in points
    pub fn daily_pnl_points(&self) -> f64 {
        self.daily_pnl.gross_pnl
    }

    /// Today's P&L in dollars
    pub fn daily_pnl_dollars(&self) -> f64 {
        self.daily_pnl.gross_pnl * self.point_value
    }

    /// Drawdown from starting balance in dollars
    pub fn drawdown(&self) -> f64 {
        (self.starting_balance - self.running_balance).max(0.0)
    }

    /// Start a new daily summary when `date` differs from the current one.
    /// Returns true on rollover.
    pub fn roll_day(&mut self, date: NaiveDate) -> bool {
        match self.daily_pnl.date {
            Some(current) if current == date => false,
            Some(_) => {
                self.daily_pnl = DailyPnL {
                    date: Some(date),
                    peak_balance: self.running_balance,
                    ..DailyPnL::default()
                };
                true
            }
            None => {
                self.daily_pnl.date = Some(date);
                false
            }
        }
    }

    /// Open a position; the caller has checked that the book is flat
    pub fn open(
        &mut self,
        side: Side,
        quantity: u32,
        entry_price: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
        entry_time: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.position = Some(OpenPosition {
            id,
            side,
            quantity,
            entry_price,
            stop_loss,
            take_profit,
            entry_time,
        });
        id
    }

    /// Close the open position and book its P&L
    pub fn close(&mut self, exit_price: f64, exit_time: DateTime<Utc>, reason: ExitReason) -> Option<TradeRecord> {
        let position = self.position.take()?;
        let pnl_points = position.pnl_points(exit_price);

        self.running_balance += pnl_points * self.point_value;

        let daily = &mut self.daily_pnl;
        daily.gross_pnl += pnl_points;
        daily.trade_count += 1;
        if pnl_points > 0.0 {
            daily.wins += 1;
            daily.largest_win = daily.largest_win.max(pnl_points);
        } else {
            daily.losses += 1;
            daily.largest_loss = daily.largest_loss.min(pnl_points);
        }

        daily.peak_balance = daily.peak_balance.max(self.running_balance);
        daily.max_drawdown = daily.max_drawdown.max(daily.peak_balance - self.running_balance);

        let record = TradeRecord {
            id: position.id,
            side: position.side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price,
            pnl_points,
            entry_time: position.entry_time,
            exit_time,
            exit_reason: reason,
        };

        self.trade_history.push_back(record.clone());
        if self.trade_history.len() > self.max_history {
            self.trade_history.pop_front();
        }

        Some(record)
    }

    /// Unrealized P&L in points
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.position
            .as_ref()
            .map_or(0.0, |p| p.pnl_points(current_price))
    }

    pub fn trade_history(&self) -> &VecDeque<TradeRecord> {
        &self.trade_history
    }

    pub fn daily_summary(&self) -> &DailyPnL {
        &self.daily_pnl
    }

    pub fn win_rate(&self) -> f64 {
        if self.daily_pnl.trade_count == 0 {
            0.0
        } else {
            self.daily_pnl.wins as f64 / self.daily_pnl.trade_count as f64
        }
    }

    pub fn stats_summary(&self) -> String {
        format!(
            "Balance: ${:.2} | Day P&L: {:.1} pts (${:.2}) | Trades: {} | WR: {:.1}%",
            self.running_balance,
            self.daily_pnl.gross_pnl,
            self.daily_pnl_dollars(),
            self.daily_pnl.trade_count,
            self.win_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::bars_from;

    fn t0() -> DateTime<Utc> {
        bars_from(&[(1.0, 1.0, 1.0, 1.0, 1.0)])[0].timestamp
    }

    #[test]
    fn test_pnl_calculation() {
        let mut pm = PositionManager::new(50000.0, 20.0, 10);
        assert!(pm.is_flat());

        pm.open(Side::Long, 1, 21505.0, Some(21495.0), None, t0());
        assert!(!pm.is_flat());
        assert_eq!(pm.unrealized_pnl(21510.0), 5.0);

        // 10 pt profit
        let record = pm.close(21515.0, t0(), ExitReason::Target).unwrap();
        assert_eq!(record.pnl_points, 10.0);
        assert_eq!(pm.running_balance(), 50200.0); // 10 pts * $20
        assert!(pm.is_flat());
        assert_eq!(pm.daily_summary().wins, 1);
        assert!(pm.close(21515.0, t0(), ExitReason::Target).is_none());
    }

    #[test]
    fn test_short_loss_counts_contracts() {
        let mut pm = PositionManager::new(50000.0, 20.0, 10);
        pm.open(Side::Short, 2, 15000.0, None, None, t0());
        let record = pm.close(15005.0, t0(), ExitReason::Reversal).unwrap();
        assert_eq!(record.pnl_points, -10.0);
        assert_eq!(pm.daily_summary().losses, 1);
        assert_eq!(pm.daily_summary().largest_loss, -10.0);
        assert_eq!(pm.drawdown(), 200.0);
        assert_eq!(pm.daily_summary().max_drawdown, 200.0);
    }

    #[test]
    fn test_exit_trigger_prefers_stop() {
        let position = OpenPosition {
            id: Uuid::new_v4(),
            side: Side::Long,
            quantity: 1,
            entry_price: 15000.0,
            stop_loss: Some(14990.0),
            take_profit: Some(15020.0),
            entry_time: t0(),
        };
        let wide = &bars_from(&[(15000.0, 15025.0, 14985.0, 15000.0, 100.0)])[0];
        assert_eq!(position.exit_trigger(wide), Some((14990.0, ExitReason::Stop)));
        let up = &bars_from(&[(15000.0, 15021.0, 14995.0, 15018.0, 100.0)])[0];
        assert_eq!(position.exit_trigger(up), Some((15020.0, ExitReason::Target)));
        let inside = &bars_from(&[(15000.0, 15010.0, 14995.0, 15005.0, 100.0)])[0];
        assert_eq!(position.exit_trigger(inside), None);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut pm = PositionManager::new(50000.0, 20.0, 3);
        for i in 0..5 {
            pm.open(Side::Long, 1, 100.0, None, None, t0());
            pm.close(100.0 + i as f64, t0(), ExitReason::Target);
        }
        assert_eq!(pm.trade_history().len(), 3);
        assert_eq!(pm.trade_history()[0].exit_price, 102.0);
    }

    #[test]
    fn test_roll_day_resets_summary() {
        let mut pm = PositionManager::new(50000.0, 20.0, 10);
        let day1 = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();

        assert!(!pm.roll_day(day1));
        pm.open(Side::Long, 1, 100.0, None, None, t0());
        pm.close(90.0, t0(), ExitReason::Stop);
        assert!(!pm.roll_day(day1));
        assert_eq!(pm.daily_summary().losses, 1);

        assert!(pm.roll_day(day2));
        assert_eq!(pm.daily_summary().losses, 0);
        assert_eq!(pm.daily_summary().date, Some(day2));
        assert_eq!(pm.running_balance(), 49800.0);
    }
}
