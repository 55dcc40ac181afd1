//! Scan HTTP handlers.
//!
//! - GET /api/v1/scans?date=YYMMDD - scan the whole market
//! - GET /api/v1/diagnoses/{symbol}?date=YYMMDD - diagnose one ticker
//!
//! `date` defaults to today in market time. Scans take minutes; clients
//! should use a generous timeout.

use crate::{
    error::AppError,
    models::scan::{DateQuery, Diagnosis, ScanResponse},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};

/// Scan the market as of a date.
///
/// # Response (200)
///
/// ```json
/// {
///   "date": "2024-01-02",
///   "count": 1,
///   "symbols": ["2330.TW"]
/// }
/// ```
///
/// # Errors
///
/// - 400: `date` is not a valid `YYMMDD`
pub async fn scan_market(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ScanResponse>, AppError> {
    let date = state.scanner.resolve_date(query.date.as_deref())?;
    let outcome = state.scanner.scan_market(date).await;
    Ok(Json(outcome.into()))
}

/// Diagnose one ticker (`2330`, `2330.TW` or `6770.TWO`).
///
/// # Response (200)
///
/// ```json
/// {
///   "symbol": "2330.TW",
///   "date": "2024-01-02",
///   "passed": false,
///   "report": "🔍 *Diagnosis: 2330.TW*\n..."
/// }
/// ```
///
/// # Errors
///
/// - 400: invalid `date`
/// - 502: market data unavailable
pub async fn diagnose_symbol(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Diagnosis>, AppError> {
    let date = state.scanner.resolve_date(query.date.as_deref())?;
    let diagnosis = state.scanner.diagnose(&symbol, date).await?;
    Ok(Json(diagnosis))
}
