//! Scan and diagnosis result types, plus their HTTP request/response bodies.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tickers that met every criterion on `date`, in listing order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub date: NaiveDate,
    pub symbols: Vec<String>,
}

impl ScanOutcome {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// One ticker per line, the body of the document sent to chats.
    pub fn to_text(&self) -> String {
        self.symbols.join("\n")
    }
}

/// Result of checking a single ticker against the criteria.
///
/// `passed` is false both when a criterion failed and when the ticker could not
/// be evaluated at all (no data, stale data); `report` says which.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub symbol: String,
    pub date: NaiveDate,
    pub passed: bool,
    pub report: String,
}

/// Query string accepted by the scan and diagnosis endpoints.
///
/// `date` is `YYMMDD`; omitted means today in market time.
#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

/// Response body of `GET /api/v1/scans`.
///
/// # JSON Example
///
/// ```json
/// {
///   "date": "2024-01-02",
///   "count": 2,
///   "symbols": ["2330.TW", "6770.TW"]
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub date: NaiveDate,
    pub count: usize,
    pub symbols: Vec<String>,
}

impl From<ScanOutcome> for ScanResponse {
    fn from(outcome: ScanOutcome) -> Self {
        Self {
            date: outcome.date,
            count: outcome.symbols.len(),
            symbols: outcome.symbols,
        }
    }
}
