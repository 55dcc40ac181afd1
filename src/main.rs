//! Taiwan VCP Scanner - Main Application Entry Point
//!
//! Screens every listed and OTC Taiwan common stock for a volatility
//! contraction pattern (uptrend above a rising 60-day average, narrowing range,
//! drying-up volume) and reports the matches over Telegram and HTTP.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (health, scan and diagnosis endpoints)
//! - **Chat**: Telegram Bot API over reqwest, long polling
//! - **Market Data**: Yahoo Finance daily bars, TWSE ISIN registry
//! - **Format**: JSON over HTTP, text documents over Telegram
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Build the scanner and its upstream clients
//! 3. Start the Telegram bot and the daily scan when a token is configured
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod error;
mod handlers;
mod models;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::services::{
    bot::Bot, scanner::Scanner, scheduler::DailyScan, telegram::TelegramClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    let scanner = Arc::new(Scanner::from_config(&config)?);

    let bot_enabled = match config.bot_token() {
        Some(token) => {
            let telegram = Arc::new(TelegramClient::new(&config.telegram_api_url, token)?);

            let bot = Arc::new(Bot::new(Arc::clone(&telegram), Arc::clone(&scanner)));
            tokio::spawn(bot.run());

            match config.daily_chat() {
                Some(chat) => {
                    let daily = DailyScan::new(
                        telegram,
                        Arc::clone(&scanner),
                        chat,
                        config.scan_time,
                        config.market_offset(),
                    );
                    tokio::spawn(daily.run());
                }
                None => tracing::info!("TG_CHAT_ID not set, daily scan disabled"),
            }
            true
        }
        None => {
            tracing::warn!("TG_TOKEN not set, Telegram bot and daily scan disabled");
            false
        }
    };

    let app = handlers::router(state::AppState {
        scanner,
        bot_enabled,
    });

    // Bind to network address and start server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
