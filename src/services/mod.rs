//! Business logic services.
//!
//! Services hold the scanning logic and the clients for upstream systems,
//! separated from HTTP handlers and the chat front end.

pub mod bot;
pub mod indicators;
pub mod market_data;
pub mod scanner;
pub mod scheduler;
pub mod stock_list;
pub mod telegram;
pub mod vcp;
