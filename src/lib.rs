//! Bet Channel Watcher
//!
//! A Discord bot that watches a betting channel: group-bet voting,
//! one-shot result forwarding, cash-out/void replies and spreadsheet
//! reporting.
//!
//! ## Architecture
//!
//! ```text
//! Gateway (WS) → BetWatcher ─┬→ Parser
//!                            ├→ VoteTracker / ResolutionLedger / CashoutResolver
//!                            ├→ ChatApi (Discord REST)
//!                            └→ ReportDispatcher → SheetsSink
//! ```

pub mod cashout;
pub mod config;
pub mod discord;
pub mod error;
pub mod handler;
pub mod notify;
pub mod parser;
pub mod report;
pub mod resolution;
pub mod types;
pub mod utils;
pub mod voting;

#[cfg(test)]
mod config_tests;
