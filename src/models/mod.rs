//! Data models shared between services and handlers.

/// Daily price bars and scan windows
pub mod bar;
/// Scan and diagnosis results, HTTP query/response bodies
pub mod scan;
/// Telegram Bot API payloads
pub mod telegram;
