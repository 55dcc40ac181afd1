//! Daily price history from the Yahoo Finance chart API.
//!
//! # Request
//!
//! `GET {YAHOO_CHART_URL}/{symbol}?period1=..&period2=..&interval=1d`
//!
//! # Normalization
//!
//! - Rows with any missing field are dropped
//! - Prices are scaled by `adjclose / close` so splits and dividends don't
//!   distort the indicators
//! - Bar dates are exchange-local (timestamp shifted by `gmtoffset`)
//! - Unknown tickers yield an empty history rather than an error

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::{
    error::AppError,
    models::bar::{Bar, PriceHistory, ScanWindow},
};

/// Anything that can provide daily bars for a ticker.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn daily_history(
        &self,
        symbol: &str,
        window: &ScanWindow,
    ) -> Result<PriceHistory, AppError>;
}

/// Yahoo's chart endpoint rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

pub struct YahooClient {
    http: reqwest::Client,
    base_url: Url,
    market: chrono::FixedOffset,
}

impl YahooClient {
    pub fn new(base_url: &str, market: chrono::FixedOffset) -> Result<Self, AppError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::InvalidRequest(format!("YAHOO_CHART_URL: {e}")))?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            http,
            base_url,
            market,
        })
    }

    fn chart_url(&self, symbol: &str, window: &ScanWindow) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::InvalidRequest("YAHOO_CHART_URL cannot be a base".into()))?
            .pop_if_empty()
            .push(symbol);

        let (period1, period2) = window.epoch_bounds(self.market);
        url.query_pairs_mut()
            .append_pair("period1", &period1.to_string())
            .append_pair("period2", &period2.to_string())
            .append_pair("interval", "1d")
            .append_pair("events", "div|split")
            .append_pair("includeAdjustedClose", "true");
        Ok(url)
    }
}

#[async_trait]
impl PriceSource for YahooClient {
    async fn daily_history(
        &self,
        symbol: &str,
        window: &ScanWindow,
    ) -> Result<PriceHistory, AppError> {
        let url = self.chart_url(symbol, window)?;
        let response = self.http.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(symbol, "no chart data");
            return Ok(PriceHistory::new(symbol, Vec::new()));
        }

        let envelope = response.error_for_status()?.json::<ChartEnvelope>().await?;
        parse_chart(envelope, symbol, window)
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn parse_chart(
    envelope: ChartEnvelope,
    symbol: &str,
    window: &ScanWindow,
) -> Result<PriceHistory, AppError> {
    if let Some(error) = envelope.chart.error {
        if error.code == "Not Found" {
            return Ok(PriceHistory::new(symbol, Vec::new()));
        }
        return Err(AppError::UpstreamResponse(format!(
            "{symbol}: {} {}",
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    let Some(result) = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
    else {
        return Ok(PriceHistory::new(symbol, Vec::new()));
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();
    let at = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten();

    let mut bars: Vec<Bar> = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
            at(&quote.volume, i),
        ) else {
            continue;
        };
        let Some(date) = local_date(*ts, result.meta.gmtoffset) else {
            continue;
        };
        if date < window.start || date >= window.end {
            continue;
        }

        let factor = match at(&adjclose, i) {
            Some(adjusted) if close != 0.0 => adjusted / close,
            _ => 1.0,
        };
        let bar = Bar {
            date,
            open: open * factor,
            high: high * factor,
            low: low * factor,
            close: close * factor,
            volume,
        };
        if ![bar.open, bar.high, bar.low, bar.close, bar.volume]
            .iter()
            .all(|v| v.is_finite())
        {
            continue;
        }

        // A live intraday row can repeat the latest session; keep the newest.
        match bars.last_mut() {
            Some(last) if last.date == date => *last = bar,
            _ => bars.push(bar),
        }
    }

    Ok(PriceHistory::new(symbol, bars))
}

fn local_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp + gmtoffset, 0).map(|dt| dt.date_naive())
}
