//! Telegram command bot.
//!
//! # Commands
//!
//! - `/start` - usage help
//! - `/now` - scan today's market
//! - `/YYMMDD` - scan as of a past session (e.g. `/240101`)
//! - `/check SYMBOL [YYMMDD]` - explain how one ticker fares against the screen
//!
//! Scans take minutes, so every command is acknowledged with a status message
//! straight away and the work runs in its own task, which later replaces the
//! status message with the result.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::{
    error::AppError,
    models::{
        scan::ScanOutcome,
        telegram::{ChatTarget, Update},
    },
    services::{
        scanner::{Scanner, parse_target_date},
        telegram::{MARKDOWN, TelegramClient},
        vcp::VcpCriteria,
    },
};

const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);

const HELP: &str = "👋 Taiwan VCP scanner is ready!\n\n\
    1. /now : scan today's market\n\
    2. /240101 (YYMMDD) : scan as of a past date\n\
    3. /check 2330 [YYMMDD] : diagnose a single stock";

/// A recognised chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Now,
    /// Six-digit `YYMMDD`, validated when the scan runs.
    Backtest(String),
    Check {
        symbol: String,
        date: Option<String>,
    },
}

/// Recognise a command in a message; anything else is ignored.
pub fn parse_command(text: &str) -> Option<Command> {
    let mut words = text.split_whitespace();
    let head = words.next()?.strip_prefix('/')?;
    // Group chats address commands as `/now@SomeBot`.
    let name = head.split('@').next().unwrap_or(head);
    let args: Vec<&str> = words.collect();

    match name {
        "start" | "help" => Some(Command::Start),
        "now" => Some(Command::Now),
        "check" => match args.as_slice() {
            [] => Some(Command::Start),
            [symbol] => Some(Command::Check {
                symbol: symbol.to_string(),
                date: None,
            }),
            [symbol, date, ..] => Some(Command::Check {
                symbol: symbol.to_string(),
                date: Some(date.to_string()),
            }),
        },
        digits
            if args.is_empty()
                && digits.len() == 6
                && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            Some(Command::Backtest(digits.to_string()))
        }
        _ => None,
    }
}

/// `TW_VCP_YYYYMMDD.txt`
pub fn scan_file_name(date: NaiveDate) -> String {
    format!("TW_VCP_{}.txt", date.format("%Y%m%d"))
}

pub fn scan_caption(outcome: &ScanOutcome, criteria: &VcpCriteria) -> String {
    format!(
        "✅ *{} scan complete*\n{} stocks matched\nCriteria: {}",
        outcome.date,
        outcome.symbols.len(),
        criteria.summary()
    )
}

pub fn no_match_text(date: NaiveDate) -> String {
    format!("📅 *{date} scan report*\n❌ No stocks match the VCP pattern.")
}

pub struct Bot {
    telegram: Arc<TelegramClient>,
    scanner: Arc<Scanner>,
}

impl Bot {
    pub fn new(telegram: Arc<TelegramClient>, scanner: Arc<Scanner>) -> Self {
        Self { telegram, scanner }
    }

    /// Poll for updates forever.
    pub async fn run(self: Arc<Self>) {
        tracing::info!("Telegram bot polling started");
        let mut offset = None;

        loop {
            match self.telegram.get_updates(offset, POLL_TIMEOUT_SECS).await {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.handle_update(update).await;
                    }
                }
                Err(e) => {
                    tracing::warn!("getUpdates failed: {}", e);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    async fn handle_update(self: &Arc<Self>, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(command) = message.text.as_deref().and_then(parse_command) else {
            return;
        };

        let chat = ChatTarget::Id(message.chat.id);
        tracing::info!(chat = %chat, ?command, "command received");

        if let Err(e) = self.dispatch(chat, command).await {
            tracing::error!("failed to handle command: {}", e);
        }
    }

    async fn dispatch(self: &Arc<Self>, chat: ChatTarget, command: Command) -> Result<(), AppError> {
        match command {
            Command::Start => {
                self.telegram.send_message(&chat, HELP, None).await?;
            }
            Command::Now => {
                let status = self
                    .telegram
                    .send_message(
                        &chat,
                        "🚀 Got it! Scanning today's market, please wait (about 1-3 minutes)...",
                        None,
                    )
                    .await?;
                self.spawn_scan(chat, status.message_id, None);
            }
            Command::Backtest(digits) => {
                // Invalid dates are still acknowledged; the scan task reports them.
                let requested = parse_target_date(&digits)
                    .map(|date| date.format("%Y/%m/%d").to_string())
                    .unwrap_or_else(|_| digits.clone());
                let text = format!("⏳ Backtest request for {requested} received, running...");
                let status = self.telegram.send_message(&chat, &text, None).await?;
                self.spawn_scan(chat, status.message_id, Some(digits));
            }
            Command::Check { symbol, date } => {
                let text = format!("🔎 Diagnosing {}...", symbol.to_uppercase());
                let status = self.telegram.send_message(&chat, &text, None).await?;
                self.spawn_diagnosis(chat, status.message_id, symbol, date);
            }
        }
        Ok(())
    }

    fn spawn_scan(self: &Arc<Self>, chat: ChatTarget, status_id: i64, date: Option<String>) {
        let bot = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = bot.run_scan(&chat, status_id, date.as_deref()).await {
                tracing::error!("background scan failed: {}", e);
                let text = format!("❌ Scan failed: {e}");
                if let Err(e) = bot
                    .telegram
                    .edit_message_text(&chat, status_id, &text, None)
                    .await
                {
                    tracing::error!("failed to report scan error: {}", e);
                }
            }
        });
    }

    async fn run_scan(
        &self,
        chat: &ChatTarget,
        status_id: i64,
        date: Option<&str>,
    ) -> Result<(), AppError> {
        let date = self.scanner.resolve_date(date)?;
        let outcome = self.scanner.scan_market(date).await;

        if outcome.is_empty() {
            return self
                .telegram
                .edit_message_text(chat, status_id, &no_match_text(date), Some(MARKDOWN))
                .await;
        }

        // Long result lists go out as a file instead of a message. The status
        // message is removed only once the upload succeeded.
        self.telegram
            .send_document(
                chat,
                &scan_file_name(date),
                outcome.to_text().into_bytes(),
                &scan_caption(&outcome, self.scanner.criteria()),
                Some(MARKDOWN),
            )
            .await?;
        if let Err(e) = self.telegram.delete_message(chat, status_id).await {
            tracing::warn!("failed to remove status message: {}", e);
        }
        Ok(())
    }

    fn spawn_diagnosis(
        self: &Arc<Self>,
        chat: ChatTarget,
        status_id: i64,
        symbol: String,
        date: Option<String>,
    ) {
        let bot = Arc::clone(self);
        tokio::spawn(async move {
            let (text, parse_mode) = match bot.diagnose(&symbol, date.as_deref()).await {
                Ok(report) => (report, Some(MARKDOWN)),
                // Error text is not markup-safe.
                Err(e) => (format!("❌ Diagnosis failed: {e}"), None),
            };
            if let Err(e) = bot.edit_with_fallback(&chat, status_id, &text, parse_mode).await {
                tracing::error!("failed to deliver diagnosis: {}", e);
            }
        });
    }

    /// Edit a message, resending it unformatted when Telegram rejects the markup.
    ///
    /// Reports echo user-typed symbols, which may contain `_` or `*`.
    async fn edit_with_fallback(
        &self,
        chat: &ChatTarget,
        message_id: i64,
        text: &str,
        parse_mode: Option<&'static str>,
    ) -> Result<(), AppError> {
        match self
            .telegram
            .edit_message_text(chat, message_id, text, parse_mode)
            .await
        {
            Err(AppError::Telegram { code: 400, description }) if parse_mode.is_some() => {
                tracing::warn!("markup rejected, resending as plain text: {}", description);
                self.telegram
                    .edit_message_text(chat, message_id, text, None)
                    .await
            }
            other => other,
        }
    }

    async fn diagnose(&self, symbol: &str, date: Option<&str>) -> Result<String, AppError> {
        let date = self.scanner.resolve_date(date)?;
        let diagnosis = self.scanner.diagnose(symbol, date).await?;
        Ok(diagnosis.report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::services::{
        scanner::tests::{FakeListing, FakePrices, scanner, target},
        telegram::tests::{Call, FakeBotApi, accept_all},
        vcp::tests::contracting_history,
    };

    const CHAT: ChatTarget = ChatTarget::Id(7);

    /// Bot over a market where only 2330.TW qualifies on the target date.
    async fn bot(reject: fn(&Call) -> bool) -> (FakeBotApi, Arc<Bot>) {
        let mut history = contracting_history(target());
        history.symbol = "2330.TW".into();
        let prices = FakePrices {
            histories: HashMap::from([("2330.TW".to_string(), history)]),
            ..Default::default()
        };
        let listing = FakeListing(Some(vec!["2317.TW".into(), "2330.TW".into()]));

        let (api, telegram) = FakeBotApi::start(reject).await;
        let bot = Bot::new(Arc::new(telegram), Arc::new(scanner(prices, listing)));
        (api, Arc::new(bot))
    }

    #[tokio::test]
    async fn backtest_uploads_file_then_clears_status() {
        let (api, bot) = bot(accept_all).await;

        bot.dispatch(CHAT, Command::Backtest("240329".into()))
            .await
            .unwrap();
        let calls = api.wait_for(3).await;

        assert_eq!(api.methods(), ["sendMessage", "sendDocument", "deleteMessage"]);
        assert!(calls[0].json()["text"].as_str().unwrap().contains("2024/03/29"));
        assert!(calls[1].body.contains("filename=\"TW_VCP_20240329.txt\""));
        assert!(calls[1].body.contains("2330.TW"));
        assert!(!calls[1].body.contains("2317.TW"));
        assert_eq!(calls[2].json()["message_id"], 42);
    }

    #[tokio::test]
    async fn empty_scan_edits_status_with_no_match() {
        let (api, bot) = bot(accept_all).await;

        bot.dispatch(CHAT, Command::Backtest("240328".into()))
            .await
            .unwrap();
        let calls = api.wait_for(2).await;

        assert_eq!(api.methods(), ["sendMessage", "editMessageText"]);
        let edit = calls[1].json();
        assert_eq!(edit["message_id"], 42);
        assert_eq!(edit["parse_mode"], "Markdown");
        assert!(edit["text"].as_str().unwrap().contains("No stocks match"));
    }

    #[tokio::test]
    async fn invalid_date_is_reported_on_status() {
        let (api, bot) = bot(accept_all).await;

        bot.dispatch(CHAT, Command::Backtest("241399".into()))
            .await
            .unwrap();
        let calls = api.wait_for(2).await;

        assert_eq!(api.methods(), ["sendMessage", "editMessageText"]);
        let edit = calls[1].json();
        assert!(edit["text"].as_str().unwrap().starts_with("❌ Scan failed"));
        assert!(edit.get("parse_mode").is_none());
    }

    #[tokio::test]
    async fn failed_upload_keeps_status_for_the_error() {
        let (api, bot) = bot(|call| call.method == "sendDocument").await;

        bot.dispatch(CHAT, Command::Backtest("240329".into()))
            .await
            .unwrap();
        let calls = api.wait_for(3).await;

        assert_eq!(api.methods(), ["sendMessage", "sendDocument", "editMessageText"]);
        let edit = calls[2].json();
        assert_eq!(edit["message_id"], 42);
        assert!(edit["text"].as_str().unwrap().contains("Scan failed"));
    }

    #[tokio::test]
    async fn diagnosis_replaces_status() {
        let (api, bot) = bot(accept_all).await;

        bot.dispatch(
            CHAT,
            Command::Check {
                symbol: "2330".into(),
                date: Some("240329".into()),
            },
        )
        .await
        .unwrap();
        let calls = api.wait_for(2).await;

        assert_eq!(api.methods(), ["sendMessage", "editMessageText"]);
        let edit = calls[1].json();
        assert_eq!(edit["parse_mode"], "Markdown");
        assert!(edit["text"].as_str().unwrap().starts_with("🔍 *Diagnosis: 2330.TW*"));
    }

    #[tokio::test]
    async fn rejected_markup_is_resent_as_plain_text() {
        let (api, bot) = bot(|call| {
            call.method == "editMessageText" && call.body.contains("\"parse_mode\"")
        })
        .await;

        bot.dispatch(
            CHAT,
            Command::Check {
                symbol: "00_7".into(),
                date: Some("240329".into()),
            },
        )
        .await
        .unwrap();
        let calls = api.wait_for(3).await;

        assert_eq!(api.methods(), ["sendMessage", "editMessageText", "editMessageText"]);
        let retry = calls[2].json();
        assert!(retry.get("parse_mode").is_none());
        assert!(retry["text"].as_str().unwrap().contains("No price data for 00_7"));
    }

    #[tokio::test]
    async fn start_sends_help() {
        let (api, bot) = bot(accept_all).await;

        bot.dispatch(CHAT, Command::Start).await.unwrap();

        assert_eq!(api.methods(), ["sendMessage"]);
        assert!(api.calls()[0].json()["text"].as_str().unwrap().contains("/now"));
    }

    #[test]
    fn recognises_commands() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/now@tw_vcp_bot"), Some(Command::Now));
        assert_eq!(
            parse_command(" /240101 "),
            Some(Command::Backtest("240101".into()))
        );
        assert_eq!(
            parse_command("/check 6770"),
            Some(Command::Check {
                symbol: "6770".into(),
                date: None
            })
        );
        assert_eq!(
            parse_command("/check 2330.TW 240315"),
            Some(Command::Check {
                symbol: "2330.TW".into(),
                date: Some("240315".into())
            })
        );
        assert_eq!(parse_command("/check"), Some(Command::Start));
    }

    #[test]
    fn ignores_everything_else() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("240101"), None);
        assert_eq!(parse_command("/24010"), None);
        assert_eq!(parse_command("/2401011"), None);
        assert_eq!(parse_command("/240101 extra"), None);
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn names_result_files_by_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(scan_file_name(date), "TW_VCP_20240102.txt");
    }

    #[test]
    fn caption_summarises_outcome() {
        let outcome = ScanOutcome {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            symbols: vec!["2330.TW".into(), "6770.TWO".into()],
        };

        let caption = scan_caption(&outcome, &VcpCriteria::default());

        assert!(caption.contains("2024-01-02 scan complete"));
        assert!(caption.contains("2 stocks matched"));
        assert!(caption.contains("60MA rising"));
    }
}
