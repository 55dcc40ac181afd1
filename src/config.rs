//! Application configuration management.
//!
//! Settings come from environment variables (optionally seeded from a `.env`
//! file) and are deserialized into a type-safe struct with `envy`.

use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use serde::{Deserialize, Deserializer};

use crate::models::telegram::ChatTarget;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `TG_TOKEN` (optional): Telegram bot token; without it the bot and the
///   daily job are disabled and only the HTTP server runs
/// - `TG_CHAT_ID` (optional): chat receiving the daily scan (`123456` or `@channel`)
/// - `SERVER_HOST` / `SERVER_PORT`: bind address, defaults to `0.0.0.0:8080`
/// - `SCAN_TIME`: market-local `HH:MM` of the daily scan, defaults to `14:40`
/// - `MARKET_UTC_OFFSET_HOURS`: market timezone, defaults to `8` (Taipei)
/// - `SCAN_BATCH_SIZE`, `SCAN_BATCH_PAUSE_MS`, `FETCH_CONCURRENCY`: scan pacing
/// - `TELEGRAM_API_URL`, `YAHOO_CHART_URL`, `TWSE_ISIN_URL`: upstream endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tg_token: Option<String>,

    #[serde(default)]
    pub tg_chat_id: Option<String>,

    #[serde(default = "default_host")]
    pub server_host: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_scan_time", deserialize_with = "deserialize_hhmm")]
    pub scan_time: NaiveTime,

    #[serde(
        default = "default_market_offset",
        deserialize_with = "deserialize_utc_offset"
    )]
    pub market_utc_offset_hours: FixedOffset,

    #[serde(default = "default_batch_size")]
    pub scan_batch_size: usize,

    #[serde(default = "default_batch_pause_ms")]
    pub scan_batch_pause_ms: u64,

    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,

    #[serde(default = "default_yahoo_chart_url")]
    pub yahoo_chart_url: String,

    #[serde(default = "default_twse_isin_url")]
    pub twse_isin_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    8080
}

/// After the 13:30 close, once the day's bars have settled upstream.
fn default_scan_time() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 40, 0).unwrap_or_default()
}

fn default_market_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix())
}

fn default_batch_size() -> usize {
    200
}

fn default_batch_pause_ms() -> u64 {
    500
}

fn default_fetch_concurrency() -> usize {
    16
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_yahoo_chart_url() -> String {
    "https://query1.finance.yahoo.com/v8/finance/chart".to_string()
}

fn default_twse_isin_url() -> String {
    "https://isin.twse.com.tw/isin/C_public.jsp".to_string()
}

fn deserialize_hhmm<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| serde::de::Error::custom(format!("expected HH:MM, got {raw:?}")))
}

fn deserialize_utc_offset<'de, D>(deserializer: D) -> Result<FixedOffset, D::Error>
where
    D: Deserializer<'de>,
{
    let hours = i32::deserialize(deserializer)?;
    FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| serde::de::Error::custom(format!("UTC offset out of range: {hours}")))
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Loads `.env` first when it exists, then deserializes the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed into its expected type
    /// (e.g., a non-numeric `SERVER_PORT` or a malformed `SCAN_TIME`).
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        Self::from_vars(std::env::vars())
    }

    /// Build configuration from an explicit set of `(KEY, value)` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Config>(vars)?;

        if config.scan_batch_size == 0 {
            return Err(serde::de::Error::custom("SCAN_BATCH_SIZE must be positive"));
        }
        if config.fetch_concurrency == 0 {
            return Err(serde::de::Error::custom(
                "FETCH_CONCURRENCY must be positive",
            ));
        }

        Ok(config)
    }

    /// Socket address the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn market_offset(&self) -> FixedOffset {
        self.market_utc_offset_hours
    }

    /// Bot token, ignoring blank values.
    pub fn bot_token(&self) -> Option<&str> {
        self.tg_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Chat that receives the scheduled daily scan.
    pub fn daily_chat(&self) -> Option<ChatTarget> {
        self.tg_chat_id
            .as_deref()
            .map(str::trim)
            .filter(|chat| !chat.is_empty())
            .map(ChatTarget::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_bind_all_interfaces_on_8080() {
        let config = Config::from_vars(vars(&[])).unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.scan_time, NaiveTime::from_hms_opt(14, 40, 0).unwrap());
        assert_eq!(config.market_offset().local_minus_utc(), 8 * 3600);
        assert_eq!(config.scan_batch_size, 200);
        assert!(config.bot_token().is_none());
        assert!(config.daily_chat().is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_vars(vars(&[
            ("TG_TOKEN", "123:abc"),
            ("TG_CHAT_ID", "-100200300"),
            ("SERVER_PORT", "9090"),
            ("SCAN_TIME", "15:05"),
            ("MARKET_UTC_OFFSET_HOURS", "9"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:9090");
        assert_eq!(config.bot_token(), Some("123:abc"));
        assert_eq!(config.daily_chat(), Some(ChatTarget::Id(-100200300)));
        assert_eq!(config.scan_time, NaiveTime::from_hms_opt(15, 5, 0).unwrap());
        assert_eq!(config.market_offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn blank_token_disables_bot() {
        let config = Config::from_vars(vars(&[("TG_TOKEN", "  ")])).unwrap();
        assert!(config.bot_token().is_none());
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(Config::from_vars(vars(&[("SCAN_TIME", "2pm")])).is_err());
        assert!(Config::from_vars(vars(&[("SERVER_PORT", "http")])).is_err());
        assert!(Config::from_vars(vars(&[("SCAN_BATCH_SIZE", "0")])).is_err());
    }
}
