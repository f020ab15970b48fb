use chrono::{Duration, NaiveDate};
use std::sync::OnceLock;

/// Embedded trading-day horizon, one ISO date per line, 2018 through 2032.
/// Holidays beyond this table are the data supplier's problem.
const TRADING_DAYS: &str = include_str!("../data/trading_days.txt");

static SHARED: OnceLock<TradingCalendar> = OnceLock::new();

/// Sorted table of trading days with snap lookups. Loaded once per process.
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    days: Vec<NaiveDate>,
}

impl TradingCalendar {
    /// The process-wide calendar parsed from the embedded table.
    pub fn shared() -> &'static TradingCalendar {
        SHARED.get_or_init(|| {
            let days = TRADING_DAYS
                .lines()
                .filter(|line| !line.trim().is_empty())
                .filter_map(|line| NaiveDate::parse_from_str(line.trim(), "%Y-%m-%d").ok())
                .collect();
            TradingCalendar { days }
        })
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.days.binary_search(&date).is_ok()
    }

    /// Whether the date falls inside the covered horizon.
    pub fn covers(&self, date: NaiveDate) -> bool {
        match (self.days.first(), self.days.last()) {
            (Some(first), Some(last)) => date >= *first && date <= *last,
            _ => false,
        }
    }

    /// Latest trading day on or before `date`.
    pub fn backward(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self.days.binary_search(&date) {
            Ok(i) => Some(self.days[i]),
            Err(0) => None,
            Err(i) => Some(self.days[i - 1]),
        }
    }

    /// Earliest trading day on or after `date`.
    pub fn forward(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self.days.binary_search(&date) {
            Ok(i) => Some(self.days[i]),
            Err(i) => self.days.get(i).copied(),
        }
    }

    /// Closest trading day to `date`, preferring the earlier one on ties.
    pub fn nearest(&self, date: NaiveDate) -> Option<NaiveDate> {
        let back = self.backward(date);
        let fwd = self.forward(date);
        match (back, fwd) {
            (Some(b), Some(f)) => {
                if (date - b) <= (f - date) {
                    Some(b)
                } else {
                    Some(f)
                }
            }
            (Some(b), None) => Some(b),
            (None, Some(f)) => Some(f),
            (None, None) => None,
        }
    }

    /// The cutoff acquisition date for holding-time checks: `current_date`
    /// minus the holding window, snapped to the nearest prior trading day
    /// when the raw target is not itself a trading day. Dates outside the
    /// covered horizon pass through unsnapped.
    pub fn before_date(&self, current_date: NaiveDate, holding_days: i64) -> NaiveDate {
        let target = current_date - Duration::days(holding_days);
        if !self.covers(target) {
            return target;
        }
        if self.is_trading_day(target) {
            target
        } else {
            self.backward(target).unwrap_or(target)
        }
    }
}
