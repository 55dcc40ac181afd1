//! Telegram Bot API payloads.
//!
//! Only the fields this service reads are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Destination chat: a numeric id or a public `@username`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatTarget {
    Id(i64),
    Username(String),
}

impl ChatTarget {
    /// Interpret a configured chat, numeric when it parses as one.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(id) => ChatTarget::Id(id),
            Err(_) => ChatTarget::Username(raw.to_string()),
        }
    }
}

impl std::fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatTarget::Id(id) => write!(f, "{id}"),
            ChatTarget::Username(name) => f.write_str(name),
        }
    }
}

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Body of `getUpdates`.
#[derive(Debug, Serialize)]
pub struct GetUpdates {
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: Vec<&'static str>,
}

/// Body of `sendMessage`.
#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: &'a ChatTarget,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
}

/// Body of `editMessageText`.
#[derive(Debug, Serialize)]
pub struct EditMessageText<'a> {
    pub chat_id: &'a ChatTarget,
    pub message_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
}

/// Body of `deleteMessage`.
#[derive(Debug, Serialize)]
pub struct DeleteMessage<'a> {
    pub chat_id: &'a ChatTarget,
    pub message_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_target_serializes_as_bare_value() {
        assert_eq!(
            serde_json::to_string(&ChatTarget::parse("-1001")).unwrap(),
            "-1001"
        );
        assert_eq!(
            serde_json::to_string(&ChatTarget::parse("@tw_vcp")).unwrap(),
            "\"@tw_vcp\""
        );
    }

    #[test]
    fn decodes_update_batch() {
        let raw = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"message_id": 5, "date": 0, "chat": {"id": 42, "type": "private"}, "text": "/now"}},
                {"update_id": 11, "edited_message": {"message_id": 6}}
            ]
        }"#;

        let response: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        let updates = response.result.unwrap();

        assert!(response.ok);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].message.as_ref().unwrap().chat.id, 42);
        assert!(updates[1].message.is_none());
    }
}
