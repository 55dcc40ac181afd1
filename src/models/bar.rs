//! Daily price bar models.
//!
//! - `Bar`: one trading day of adjusted OHLCV data
//! - `PriceHistory`: chronological bars for a single ticker
//! - `ScanWindow`: the date range fetched to evaluate a target date

use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime};
use serde::Serialize;

/// Calendar days of history fetched before the target date.
///
/// Enough to cover the 65 trading days the criteria need, across holidays.
pub const LOOKBACK_DAYS: i64 = 250;

/// One trading day of price data.
///
/// Prices are split/dividend adjusted; volume is in shares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Chronological daily bars for one ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    pub symbol: String,
    pub bars: Vec<Bar>,
}

impl PriceHistory {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Date of the most recent bar.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|bar| bar.date)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.volume).collect()
    }
}

/// Date range fetched to evaluate `target`.
///
/// `end` is exclusive, one day after the target, so the target's own bar is
/// included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub target: NaiveDate,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ScanWindow {
    pub fn for_target(target: NaiveDate) -> Self {
        Self {
            target,
            start: target - Duration::days(LOOKBACK_DAYS),
            end: target + Duration::days(1),
        }
    }

    /// Unix timestamps of `start` and `end` at market-local midnight.
    pub fn epoch_bounds(&self, market: FixedOffset) -> (i64, i64) {
        let midnight = |date: NaiveDate| {
            date.and_time(NaiveTime::default()).and_utc().timestamp()
                - i64::from(market.local_minus_utc())
        };
        (midnight(self.start), midnight(self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_spans_lookback_and_includes_target() {
        let target = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let window = ScanWindow::for_target(target);

        assert_eq!(window.start, NaiveDate::from_ymd_opt(2023, 4, 27).unwrap());
        assert_eq!(window.end, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn epoch_bounds_use_market_midnight() {
        let target = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let window = ScanWindow::for_target(target);
        let taipei = FixedOffset::east_opt(8 * 3600).unwrap();

        let (_, end) = window.epoch_bounds(taipei);

        // 2024-01-03T00:00:00+08:00
        assert_eq!(end, 1_704_211_200);
    }
}
