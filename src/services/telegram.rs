//! Minimal Telegram Bot API client.
//!
//! Only the calls the bot needs: long polling, plain messages, edits,
//! deletes and document uploads. Every call goes to
//! `{TELEGRAM_API_URL}/bot{token}/{method}`.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::AppError,
    models::telegram::{
        ApiResponse, ChatTarget, DeleteMessage, EditMessageText, GetUpdates, Message,
        SendMessage, Update,
    },
};

/// Formatting mode for messages containing `*bold*` markup.
pub const MARKDOWN: &str = "Markdown";

pub struct TelegramClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TelegramClient {
    /// # Arguments
    ///
    /// * `api_url` - Bot API root, e.g. `https://api.telegram.org`
    /// * `token` - bot token issued by BotFather
    pub fn new(api_url: &str, token: &str) -> Result<Self, AppError> {
        // Must outlive the longest getUpdates long poll.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.endpoint, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(redact)?;

        into_result(response.json::<ApiResponse<T>>().await.map_err(redact)?)
    }

    /// Long-poll for new messages.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, AppError> {
        let body = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message"],
        };
        self.call("getUpdates", &body).await
    }

    pub async fn send_message(
        &self,
        chat: &ChatTarget,
        text: &str,
        parse_mode: Option<&'static str>,
    ) -> Result<Message, AppError> {
        let body = SendMessage {
            chat_id: chat,
            text,
            parse_mode,
        };
        self.call("sendMessage", &body).await
    }

    pub async fn edit_message_text(
        &self,
        chat: &ChatTarget,
        message_id: i64,
        text: &str,
        parse_mode: Option<&'static str>,
    ) -> Result<(), AppError> {
        let body = EditMessageText {
            chat_id: chat,
            message_id,
            text,
            parse_mode,
        };
        // Result is the edited Message, or `true` for inline messages.
        self.call::<_, serde_json::Value>("editMessageText", &body)
            .await
            .map(|_| ())
    }

    pub async fn delete_message(&self, chat: &ChatTarget, message_id: i64) -> Result<(), AppError> {
        let body = DeleteMessage {
            chat_id: chat,
            message_id,
        };
        self.call::<_, bool>("deleteMessage", &body).await.map(|_| ())
    }

    /// Upload an in-memory text file.
    pub async fn send_document(
        &self,
        chat: &ChatTarget,
        file_name: &str,
        content: Vec<u8>,
        caption: &str,
        parse_mode: Option<&'static str>,
    ) -> Result<Message, AppError> {
        let document = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("text/plain")?;
        let mut form = Form::new()
            .text("chat_id", chat.to_string())
            .text("caption", caption.to_string())
            .part("document", document);
        if let Some(mode) = parse_mode {
            form = form.text("parse_mode", mode);
        }

        let response = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(redact)?;

        into_result(response.json::<ApiResponse<Message>>().await.map_err(redact)?)
    }
}

/// Strip the request URL, which embeds the bot token, before the error is logged.
fn redact(error: reqwest::Error) -> AppError {
    AppError::Upstream(error.without_url())
}

fn into_result<T>(response: ApiResponse<T>) -> Result<T, AppError> {
    match response {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse {
            ok: true,
            result: None,
            ..
        } => Err(AppError::UpstreamResponse(
            "Telegram response missing result".into(),
        )),
        ApiResponse {
            error_code,
            description,
            ..
        } => Err(AppError::Telegram {
            code: error_code.unwrap_or_default(),
            description: description.unwrap_or_else(|| "unknown error".into()),
        }),
    }
}
