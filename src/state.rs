//! Shared application state handed to every HTTP handler.

use std::sync::Arc;

use crate::services::scanner::Scanner;

#[derive(Clone)]
pub struct AppState {
    pub scanner: Arc<Scanner>,

    /// Whether the Telegram bot is polling (a token was configured).
    pub bot_enabled: bool,
}
