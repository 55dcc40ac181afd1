//! Market-wide scan and single-ticker diagnosis.
//!
//! # Scan Flow
//!
//! 1. Enumerate tickers (falling back to a few large caps if the registry is
//!    unreachable)
//! 2. Fetch histories batch by batch, a bounded number at a time
//! 3. Skip tickers without a bar on the target date
//! 4. Keep tickers passing every VCP check, in listing order

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate, Utc};
use futures::{StreamExt, stream};

use crate::{
    config::Config,
    error::AppError,
    models::{
        bar::{PriceHistory, ScanWindow},
        scan::{Diagnosis, ScanOutcome},
    },
    services::{
        market_data::{PriceSource, YahooClient},
        stock_list::{Market, SymbolSource, TwseListing},
        vcp::{VcpCriteria, evaluate},
    },
};

/// Scanned when the registry cannot be reached.
const FALLBACK_SYMBOLS: [&str; 3] = ["2330.TW", "2317.TW", "2454.TW"];

/// Pacing of a market scan.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub concurrency: usize,
    pub market: FixedOffset,
}

impl ScanSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.scan_batch_size.max(1),
            batch_pause: Duration::from_millis(config.scan_batch_pause_ms),
            concurrency: config.fetch_concurrency.max(1),
            market: config.market_offset(),
        }
    }
}

pub struct Scanner {
    prices: Arc<dyn PriceSource>,
    listing: Arc<dyn SymbolSource>,
    criteria: VcpCriteria,
    settings: ScanSettings,
}

/// Parse a `YYMMDD` date. Years 00-68 are 20xx, 69-99 are 19xx.
pub fn parse_target_date(raw: &str) -> Result<NaiveDate, AppError> {
    let raw = raw.trim();
    let invalid = || AppError::InvalidDate(raw.to_string());
    if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let field = |at: usize| raw[at..at + 2].parse::<u32>().map_err(|_| invalid());
    let (yy, month, day) = (field(0)?, field(2)?, field(4)?);
    let century = if yy <= 68 { 2000 } else { 1900 };
    // yy < 100, so the cast is lossless.
    NaiveDate::from_ymd_opt(century + yy as i32, month, day).ok_or_else(invalid)
}

impl Scanner {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        listing: Arc<dyn SymbolSource>,
        criteria: VcpCriteria,
        settings: ScanSettings,
    ) -> Self {
        Self {
            prices,
            listing,
            criteria,
            settings,
        }
    }

    /// Scanner backed by Yahoo Finance and the TWSE registry.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let prices = YahooClient::new(&config.yahoo_chart_url, config.market_offset())?;
        let listing = TwseListing::new(&config.twse_isin_url)?;
        Ok(Self::new(
            Arc::new(prices),
            Arc::new(listing),
            VcpCriteria::default(),
            ScanSettings::from_config(config),
        ))
    }

    pub fn criteria(&self) -> &VcpCriteria {
        &self.criteria
    }

    /// Current date in market time.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.settings.market).date_naive()
    }

    /// `YYMMDD` when given, today otherwise.
    pub fn resolve_date(&self, raw: Option<&str>) -> Result<NaiveDate, AppError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => parse_target_date(raw),
            None => Ok(self.today()),
        }
    }

    /// Tickers to scan, never empty.
    pub async fn list_symbols(&self) -> Vec<String> {
        match self.listing.symbols().await {
            Ok(symbols) if !symbols.is_empty() => symbols,
            Ok(_) => {
                tracing::warn!("stock listing was empty, using fallback symbols");
                fallback_symbols()
            }
            Err(e) => {
                tracing::warn!("failed to fetch stock listing, using fallback symbols: {}", e);
                fallback_symbols()
            }
        }
    }

    /// Scan every listed ticker for `date`.
    ///
    /// Per-ticker failures are logged and skipped; they never fail the scan.
    pub async fn scan_market(&self, date: NaiveDate) -> ScanOutcome {
        let window = ScanWindow::for_target(date);
        let symbols = self.list_symbols().await;
        tracing::info!(%date, total = symbols.len(), "market scan started");

        let mut matches = Vec::new();
        for (n, batch) in symbols.chunks(self.settings.batch_size).enumerate() {
            if n > 0 && !self.settings.batch_pause.is_zero() {
                tokio::time::sleep(self.settings.batch_pause).await;
            }

            let window = &window;
            let results: Vec<(String, bool)> = stream::iter(batch.iter().cloned())
                .map(|symbol: String| async move {
                    let ok = self.qualifies(&symbol, window).await;
                    (symbol, ok)
                })
                .buffered(self.settings.concurrency)
                .collect()
                .await;

            matches.extend(
                results
                    .into_iter()
                    .filter_map(|(symbol, ok)| ok.then_some(symbol)),
            );
            tracing::debug!(batch = n, matched = matches.len(), "batch scanned");
        }

        tracing::info!(%date, matched = matches.len(), "market scan finished");
        ScanOutcome {
            date,
            symbols: matches,
        }
    }

    async fn qualifies(&self, symbol: &str, window: &ScanWindow) -> bool {
        let history = match self.prices.daily_history(symbol, window).await {
            Ok(history) => history,
            Err(e) => {
                tracing::debug!(symbol, "skipping: {}", e);
                return false;
            }
        };

        if history.last_date() != Some(window.target) {
            return false;
        }

        evaluate(&history, &self.criteria)
            .map(|metrics| metrics.passes())
            .unwrap_or(false)
    }

    /// Check one ticker against the criteria and explain the outcome.
    ///
    /// A bare code (`6770`) is tried on the main board first, then OTC.
    pub async fn diagnose(&self, input: &str, date: NaiveDate) -> Result<Diagnosis, AppError> {
        let code = input.trim().to_uppercase();
        if code.is_empty() {
            return Err(AppError::InvalidRequest("symbol is empty".into()));
        }

        let candidates = if has_market_suffix(&code) {
            vec![code.clone()]
        } else {
            [Market::Listed, Market::Otc]
                .iter()
                .map(|m| format!("{code}{}", m.suffix()))
                .collect()
        };

        let window = ScanWindow::for_target(date);
        let mut resolved = PriceHistory::default();
        for candidate in candidates {
            resolved = self.prices.daily_history(&candidate, &window).await?;
            resolved.symbol = candidate;
            if !resolved.is_empty() {
                break;
            }
            tracing::debug!(symbol = %resolved.symbol, "no data, trying next market");
        }

        let header = format!(
            "🔍 *Diagnosis: {}*\n📅 Date: {}\n{}\n",
            resolved.symbol,
            date,
            "-".repeat(20)
        );
        let (passed, body) = if resolved.is_empty() {
            (
                false,
                format!(
                    "❌ No price data for {code}.\nCheck the code (e.g. 6770) or pick a later date."
                ),
            )
        } else {
            match resolved.last_date() {
                Some(last) if last != date => (
                    false,
                    format!(
                        "❌ Data date mismatch\nRequested: {date}\nLatest bar: {last}\n(market closed that day or session not finished)"
                    ),
                ),
                _ => match evaluate(&resolved, &self.criteria) {
                    Ok(metrics) => (metrics.passes(), metrics.report()),
                    Err(rejection) => (false, rejection.to_string()),
                },
            }
        };

        Ok(Diagnosis {
            symbol: resolved.symbol,
            date,
            passed,
            report: header + &body,
        })
    }
}

fn has_market_suffix(code: &str) -> bool {
    code.ends_with(Market::Listed.suffix()) || code.ends_with(Market::Otc.suffix())
}

fn fallback_symbols() -> Vec<String> {
    FALLBACK_SYMBOLS.iter().map(|s| s.to_string()).collect()
}
