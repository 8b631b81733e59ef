//! Spreadsheet reporting
//!
//! Bet events become 17-column rows appended to a sheet. Appends run in the
//! background after the chat action and retry with exponential backoff; a
//! row that still fails is logged and dropped.

mod sheets;
#[cfg(test)]
mod tests;

pub use sheets::SheetsSink;

use crate::config::ReportingConfig;
use crate::error::Result;
use crate::parser::{self, BetAnnouncement, BetKind};
use crate::types::ChatMessage;
use crate::utils::fmt_money;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const HEADER: [&str; 17] = [
    "Timestamp",
    "Event",
    "Kind",
    "Initials",
    "Bettor",
    "Market",
    "Odds",
    "Stake",
    "Returns",
    "Cashout",
    "Gain/Loss",
    "Channel",
    "Full Text",
    "Author Tag",
    "Author ID",
    "Link",
    "Message ID",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Placed,
    Win,
    Loss,
    Cashout,
    Void,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Placed => "placed",
            EventKind::Win => "win",
            EventKind::Loss => "loss",
            EventKind::Cashout => "cashout",
            EventKind::Void => "void",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub timestamp: DateTime<Utc>,
    pub event: EventKind,
    pub kind: Option<BetKind>,
    pub initials: String,
    pub bettor: String,
    pub market: String,
    pub odds: Option<Decimal>,
    pub stake: Option<Decimal>,
    pub returns_amount: Option<Decimal>,
    pub cashout: Option<Decimal>,
    pub gain_loss: Option<Decimal>,
    pub channel_name: String,
    pub full_text: String,
    pub author_tag: String,
    pub author_id: String,
    pub link: String,
    pub message_id: String,
}

impl ReportRow {
    /// Row for an event on `message`, enriched with whatever the parser found.
    ///
    /// Without a structured match, stake and returns fall back to the looser
    /// extractors so the sheet still gets amounts when they are present.
    pub fn for_message(
        event: EventKind,
        message: &ChatMessage,
        channel_name: &str,
        bet: Option<&BetAnnouncement>,
    ) -> Self {
        let (kind, initials, bettor, market, odds, stake, returns_amount) = match bet {
            Some(b) => (
                Some(b.kind),
                b.initials.clone(),
                b.bettor.clone(),
                b.market.clone(),
                Some(b.odds),
                Some(b.stake),
                Some(b.returns_amount),
            ),
            None => (
                None,
                String::new(),
                String::new(),
                String::new(),
                None,
                parser::infer_stake(&message.content),
                parser::amount_after_returns(&message.content),
            ),
        };

        Self {
            timestamp: Utc::now(),
            event,
            kind,
            initials,
            bettor,
            market,
            odds,
            stake,
            returns_amount,
            cashout: None,
            gain_loss: None,
            channel_name: channel_name.to_string(),
            full_text: message.content.clone(),
            author_tag: message.author.tag.clone(),
            author_id: message.author.id.to_string(),
            link: message.link(),
            message_id: message.id.to_string(),
        }
    }

    pub fn with_settlement(mut self, cashout: Decimal, gain_loss: Option<Decimal>) -> Self {
        self.cashout = Some(cashout);
        self.gain_loss = gain_loss;
        self
    }

    /// Cells in [`HEADER`] order
    pub fn to_cells(&self) -> Vec<String> {
        let money = |v: Option<Decimal>| v.map(fmt_money).unwrap_or_default();
        vec![
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.event.as_str().to_string(),
            self.kind.map(|k| k.as_str().to_string()).unwrap_or_default(),
            self.initials.clone(),
            self.bettor.clone(),
            self.market.clone(),
            self.odds.map(|o| o.normalize().to_string()).unwrap_or_default(),
            money(self.stake),
            money(self.returns_amount),
            money(self.cashout),
            money(self.gain_loss),
            self.channel_name.clone(),
            self.full_text.clone(),
            self.author_tag.clone(),
            self.author_id.clone(),
            self.link.clone(),
            self.message_id.clone(),
        ]
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn append(&self, row: &ReportRow) -> Result<()>;
}

/// Sink used when reporting is disabled
pub struct NullSink;

#[async_trait]
impl ReportSink for NullSink {
    async fn append(&self, row: &ReportRow) -> Result<()> {
        tracing::debug!(
            event = row.event.as_str(),
            message_id = %row.message_id,
            "Reporting disabled, dropping row"
        );
        Ok(())
    }
}

/// Upper bound for a single backoff pause
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(400),
            factor: 1.6,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ReportingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            factor: config.backoff_factor,
        }
    }

    /// Pause after the given failed attempt (1-based), capped at `MAX_RETRY_DELAY`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.factor.powi(exp);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }
}

/// Append with retries; false once every attempt has failed
pub async fn append_with_retry(sink: &dyn ReportSink, row: &ReportRow, policy: RetryPolicy) -> bool {
    for attempt in 1..=policy.max_attempts {
        match sink.append(row).await {
            Ok(()) => {
                tracing::debug!(
                    event = row.event.as_str(),
                    message_id = %row.message_id,
                    attempt,
                    "Report row appended"
                );
                return true;
            }
            Err(e) if !e.is_transient() => {
                tracing::warn!(
                    event = row.event.as_str(),
                    message_id = %row.message_id,
                    attempt,
                    error = %e,
                    "Report row rejected, not retrying"
                );
                return false;
            }
            Err(e) if attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Report append failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::warn!(
                    event = row.event.as_str(),
                    message_id = %row.message_id,
                    attempts = policy.max_attempts,
                    error = %e,
                    "Giving up on report row"
                );
            }
        }
    }
    false
}

/// Applies the cutoff policy and runs appends off the caller's path
#[derive(Clone)]
pub struct ReportDispatcher {
    sink: Arc<dyn ReportSink>,
    cutoff: Option<DateTime<Utc>>,
    policy: RetryPolicy,
}

impl ReportDispatcher {
    pub fn new(sink: Arc<dyn ReportSink>, cutoff: Option<DateTime<Utc>>, policy: RetryPolicy) -> Self {
        Self { sink, cutoff, policy }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NullSink), None, RetryPolicy::default())
    }

    /// Only bets posted at or after the cutoff are reported
    pub fn should_report(&self, original_posted_at: DateTime<Utc>) -> bool {
        self.cutoff.map_or(true, |cutoff| original_posted_at >= cutoff)
    }

    /// Fire-and-forget append; `None` when the cutoff filtered the row
    pub fn dispatch(&self, original_posted_at: DateTime<Utc>, row: ReportRow) -> Option<JoinHandle<bool>> {
        if !self.should_report(original_posted_at) {
            tracing::debug!(
                message_id = %row.message_id,
                posted_at = %original_posted_at,
                "Bet predates report cutoff, skipping"
            );
            return None;
        }

        let sink = self.sink.clone();
        let policy = self.policy;
        Some(tokio::spawn(async move {
            append_with_retry(sink.as_ref(), &row, policy).await
        }))
    }
}
