//! Volatility contraction pattern (VCP) screening.
//!
//! A ticker qualifies when it is in an uptrend above a rising 60-day average,
//! its recent trading range is narrow relative to its ATR, volume has dried up
//! and it still trades enough shares to be liquid.
//!
//! `evaluate` computes the metrics behind every check once; the market scan
//! only asks `passes()`, while single-ticker diagnosis renders `report()`.

use std::fmt;

use crate::{
    models::bar::PriceHistory,
    services::indicators::{atr, sma, tail_max, tail_mean, tail_min},
};

/// Tunable thresholds of the screen.
#[derive(Debug, Clone, PartialEq)]
pub struct VcpCriteria {
    /// Fewest bars a history must have to be evaluated.
    pub min_bars: usize,
    /// Length of the trend moving average.
    pub trend_length: usize,
    /// Position from the end (1 = latest) the trend slope is measured against.
    pub slope_lookback: usize,
    pub atr_length: usize,
    /// Bars whose high/low range must stay within `atr_multiple` ATRs.
    pub tight_window: usize,
    pub atr_multiple: f64,
    pub short_volume_window: usize,
    pub long_volume_window: usize,
    /// Minimum short-window average volume, in shares.
    pub min_avg_volume: f64,
}

impl Default for VcpCriteria {
    fn default() -> Self {
        Self {
            min_bars: 65,
            trend_length: 60,
            slope_lookback: 5,
            atr_length: 14,
            tight_window: 10,
            atr_multiple: 3.0,
            short_volume_window: 20,
            long_volume_window: 60,
            min_avg_volume: 500_000.0,
        }
    }
}

impl VcpCriteria {
    /// One-line summary used in chat captions.
    pub fn summary(&self) -> String {
        format!(
            "{}MA rising + volume dry-up + range within {}x ATR({})",
            self.trend_length, self.atr_multiple, self.atr_length
        )
    }
}

/// Why a history could not be evaluated at all.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    InsufficientBars { have: usize, need: usize },
    TrendUnavailable,
    AtrInvalid,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InsufficientBars { have, need } => write!(
                f,
                "❌ Not enough data: {have} valid bars (need at least {need})"
            ),
            Rejection::TrendUnavailable => {
                f.write_str("❌ Trend average unavailable (history too short or invalid)")
            }
            Rejection::AtrInvalid => f.write_str("❌ ATR is undefined or zero"),
        }
    }
}

/// Values behind every check, computed at the latest bar.
#[derive(Debug, Clone, PartialEq)]
pub struct VcpMetrics {
    pub close: f64,
    pub trend_now: f64,
    pub trend_prev: f64,
    pub atr: f64,
    pub range_high: f64,
    pub range_low: f64,
    pub volume_short: f64,
    pub volume_long: f64,
    criteria: VcpCriteria,
}

/// Compute the screen's metrics for `history`.
pub fn evaluate(history: &PriceHistory, criteria: &VcpCriteria) -> Result<VcpMetrics, Rejection> {
    let len = history.len();
    if len < criteria.min_bars {
        return Err(Rejection::InsufficientBars {
            have: len,
            need: criteria.min_bars,
        });
    }

    let closes = history.closes();
    let highs = history.highs();
    let lows = history.lows();
    let volumes = history.volumes();

    let trend = sma(&closes, criteria.trend_length);
    let trend_now = trend.last().copied().flatten();
    let trend_prev = len
        .checked_sub(criteria.slope_lookback)
        .and_then(|i| trend.get(i).copied().flatten());
    let (Some(trend_now), Some(trend_prev)) = (trend_now, trend_prev) else {
        return Err(Rejection::TrendUnavailable);
    };

    let atr_now = atr(&highs, &lows, &closes, criteria.atr_length)
        .last()
        .copied()
        .flatten()
        .filter(|value| value.is_finite() && *value != 0.0)
        .ok_or(Rejection::AtrInvalid)?;

    // Non-empty by the min_bars check above.
    let close = closes[len - 1];
    let range_high = tail_max(&highs, criteria.tight_window).unwrap_or(close);
    let range_low = tail_min(&lows, criteria.tight_window).unwrap_or(close);
    let volume_short = tail_mean(&volumes, criteria.short_volume_window).unwrap_or_default();
    let volume_long = tail_mean(&volumes, criteria.long_volume_window).unwrap_or_default();

    Ok(VcpMetrics {
        close,
        trend_now,
        trend_prev,
        atr: atr_now,
        range_high,
        range_low,
        volume_short,
        volume_long,
        criteria: criteria.clone(),
    })
}

impl VcpMetrics {
    pub fn above_trend(&self) -> bool {
        self.close >= self.trend_now
    }

    pub fn trend_rising(&self) -> bool {
        self.trend_now > self.trend_prev
    }

    pub fn range(&self) -> f64 {
        self.range_high - self.range_low
    }

    pub fn allowed_range(&self) -> f64 {
        self.atr * self.criteria.atr_multiple
    }

    pub fn is_tight(&self) -> bool {
        self.range() <= self.allowed_range()
    }

    pub fn volume_contracting(&self) -> bool {
        self.volume_short < self.volume_long
    }

    pub fn is_liquid(&self) -> bool {
        self.volume_short >= self.criteria.min_avg_volume
    }

    pub fn passes(&self) -> bool {
        self.above_trend()
            && self.trend_rising()
            && self.is_tight()
            && self.volume_contracting()
            && self.is_liquid()
    }

    /// Multi-line, Telegram-Markdown report of every check.
    pub fn report(&self) -> String {
        let c = &self.criteria;
        let mark = |ok: bool| if ok { "✅" } else { "❌" };
        let mut lines = Vec::new();

        lines.push("*Price vs trend*".to_string());
        if self.above_trend() {
            lines.push(format!(
                "   ✅ Close ({:.2}) ≥ {}MA ({:.2})",
                self.close, c.trend_length, self.trend_now
            ));
        } else {
            lines.push(format!(
                "   ❌ Close ({:.2}) < {}MA ({:.2}), trend is weak",
                self.close, c.trend_length, self.trend_now
            ));
        }
        if self.trend_rising() {
            lines.push(format!("   ✅ {}MA turning up", c.trend_length));
        } else {
            lines.push(format!(
                "   ❌ {}MA falling (now {:.2} vs {:.2} {} bars back)",
                c.trend_length,
                self.trend_now,
                self.trend_prev,
                c.slope_lookback - 1
            ));
        }

        lines.push(String::new());
        lines.push("*Contraction*".to_string());
        lines.push(format!(
            "   ℹ️ ATR({}): {:.2} | allowed range: {:.2}",
            c.atr_length,
            self.atr,
            self.allowed_range()
        ));
        lines.push(format!(
            "   ℹ️ {}-bar range: {:.2} (high {:.2}, low {:.2})",
            c.tight_window,
            self.range(),
            self.range_high,
            self.range_low
        ));
        if self.is_tight() {
            lines.push("   ✅ Range is contracting".to_string());
        } else {
            lines.push(format!(
                "   ❌ Range too wide ({:.2} > {:.2})",
                self.range(),
                self.allowed_range()
            ));
        }

        lines.push(String::new());
        lines.push("*Volume*".to_string());
        lines.push(format!(
            "   {} Volume {} ({}-bar avg {:.0} vs {}-bar avg {:.0})",
            mark(self.volume_contracting()),
            if self.volume_contracting() {
                "drying up"
            } else {
                "not contracting"
            },
            c.short_volume_window,
            self.volume_short,
            c.long_volume_window,
            self.volume_long
        ));
        lines.push(format!(
            "   {} Liquidity {} (min avg {:.0} shares)",
            mark(self.is_liquid()),
            if self.is_liquid() { "sufficient" } else { "too thin" },
            c.min_avg_volume
        ));

        lines.join("\n")
    }
}
