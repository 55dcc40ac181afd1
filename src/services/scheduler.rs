//! Daily after-market scan.
//!
//! Once a day at `SCAN_TIME` (market time) the whole market is scanned and the
//! result is posted to `TG_CHAT_ID`.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};

use crate::{
    error::AppError,
    models::telegram::ChatTarget,
    services::{
        bot::no_match_text,
        scanner::Scanner,
        telegram::{MARKDOWN, TelegramClient},
    },
};

/// First occurrence of `at` strictly after `now`, in `now`'s offset.
pub fn next_run_after(now: DateTime<FixedOffset>, at: NaiveTime) -> DateTime<FixedOffset> {
    let offset = *now.offset();
    let to_utc = Duration::seconds(i64::from(offset.local_minus_utc()));
    let at_on = |date: chrono::NaiveDate| {
        DateTime::<FixedOffset>::from_naive_utc_and_offset(date.and_time(at) - to_utc, offset)
    };

    let today = at_on(now.date_naive());
    if today > now {
        today
    } else {
        at_on(now.date_naive() + Duration::days(1))
    }
}

pub struct DailyScan {
    telegram: Arc<TelegramClient>,
    scanner: Arc<Scanner>,
    chat: ChatTarget,
    at: NaiveTime,
    market: FixedOffset,
}

impl DailyScan {
    pub fn new(
        telegram: Arc<TelegramClient>,
        scanner: Arc<Scanner>,
        chat: ChatTarget,
        at: NaiveTime,
        market: FixedOffset,
    ) -> Self {
        Self {
            telegram,
            scanner,
            chat,
            at,
            market,
        }
    }

    /// Sleep until each day's scan time and run it, forever.
    pub async fn run(self) {
        loop {
            let now = Utc::now().with_timezone(&self.market);
            let next = next_run_after(now, self.at);
            tracing::info!(next_run = %next, chat = %self.chat, "daily scan scheduled");

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            if let Err(e) = self.run_once().await {
                tracing::error!("daily scan failed: {}", e);
            }
        }
    }

    async fn run_once(&self) -> Result<(), AppError> {
        self.telegram
            .send_message(&self.chat, "⏰ Scheduled after-market scan starting...", None)
            .await?;

        let date = self.scanner.today();
        let outcome = self.scanner.scan_market(date).await;

        if outcome.is_empty() {
            self.telegram
                .send_message(&self.chat, &no_match_text(date), Some(MARKDOWN))
                .await?;
            return Ok(());
        }

        let caption = format!(
            "🌞 *After-market VCP scan {}*\nMatches: {}",
            date,
            outcome.symbols.len()
        );
        self.telegram
            .send_document(
                &self.chat,
                &format!("Daily_Scan_{date}.txt"),
                outcome.to_text().into_bytes(),
                &caption,
                Some(MARKDOWN),
            )
            .await?;
        Ok(())
    }
}
