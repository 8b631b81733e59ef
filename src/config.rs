//! Configuration loading
//!
//! Settings come from an optional TOML file overlaid with `BETWATCH__*`
//! environment variables (a `.env` file is read first when present).

use crate::error::{BotError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub markers: MarkerConfig,
    #[serde(default)]
    pub voting: VotingConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
    /// Days a forwarded result stays in the ledger; unset keeps it for the process lifetime
    #[serde(default)]
    pub ledger_retention_days: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    /// Channel id or name watched for bets
    pub source_channel: String,
    /// Channel id or name receiving forwarded results
    pub target_channel: String,
    /// Needed only when channels are given by name
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// Emoji tokens the bot reads and writes
#[derive(Debug, Clone, Deserialize)]
pub struct MarkerConfig {
    #[serde(default = "default_upvote")]
    pub upvote: String,
    #[serde(default = "default_downvote")]
    pub downvote: String,
    #[serde(default = "default_success")]
    pub success: String,
    #[serde(default = "default_fail")]
    pub fail: String,
    #[serde(default = "default_void")]
    pub void: String,
    #[serde(default = "default_cashout")]
    pub cashout: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            upvote: default_upvote(),
            downvote: default_downvote(),
            success: default_success(),
            fail: default_fail(),
            void: default_void(),
            cashout: default_cashout(),
        }
    }
}

impl MarkerConfig {
    /// Markers that close a bet for further cash-out or void
    pub fn resolved_set(&self) -> [&str; 4] {
        [
            self.success.as_str(),
            self.fail.as_str(),
            self.void.as_str(),
            self.cashout.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VotingConfig {
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: usize,
    #[serde(default = "default_reject_threshold")]
    pub reject_threshold: usize,
    /// Two-letter code marking a group bet in the structured line
    #[serde(default = "default_group_code")]
    pub group_code: String,
    /// When set, only this code yields an individual bet; others are unknown
    #[serde(default)]
    pub individual_code: Option<String>,
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
            reject_threshold: default_reject_threshold(),
            group_code: default_group_code(),
            individual_code: None,
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Events on messages older than this are not reported
    #[serde(default)]
    pub cutoff: Option<DateTime<Utc>>,
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_sheets_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cutoff: None,
            spreadsheet_id: String::new(),
            sheet_name: default_sheet_name(),
            access_token: String::new(),
            api_base: default_sheets_api_base(),
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}
fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}
fn default_upvote() -> String {
    "👍".to_string()
}
fn default_downvote() -> String {
    "👎".to_string()
}
fn default_success() -> String {
    "✅".to_string()
}
fn default_fail() -> String {
    "❌".to_string()
}
fn default_void() -> String {
    "🚫".to_string()
}
fn default_cashout() -> String {
    "💰".to_string()
}
fn default_pass_threshold() -> usize {
    1
}
fn default_reject_threshold() -> usize {
    2
}
fn default_group_code() -> String {
    "GB".to_string()
}
fn default_retention_days() -> u64 {
    14
}
fn default_sheet_name() -> String {
    "Bets".to_string()
}
fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay_ms() -> u64 {
    400
}
fn default_backoff_factor() -> f64 {
    1.6
}

impl Config {
    /// Load configuration from a TOML file and the environment
    pub fn load(path: &str) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(Path::new(path)).required(false))
            .add_source(
                config::Environment::with_prefix("BETWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discord.token.trim().is_empty() {
            return Err(BotError::InvalidConfig("discord.token is empty".into()));
        }
        if self.discord.source_channel.trim().is_empty()
            || self.discord.target_channel.trim().is_empty()
        {
            return Err(BotError::InvalidConfig(
                "discord.source_channel and discord.target_channel are required".into(),
            ));
        }
        if self.voting.pass_threshold == 0 || self.voting.reject_threshold == 0 {
            return Err(BotError::InvalidConfig(
                "voting thresholds must be at least 1".into(),
            ));
        }
        if self.voting.group_code.trim().is_empty() {
            return Err(BotError::InvalidConfig("voting.group_code is empty".into()));
        }
        let r = &self.reporting;
        if r.enabled {
            if r.spreadsheet_id.is_empty() || r.access_token.is_empty() {
                return Err(BotError::InvalidConfig(
                    "reporting needs spreadsheet_id and access_token".into(),
                ));
            }
            if r.max_attempts == 0 || !r.backoff_factor.is_finite() || r.backoff_factor < 1.0 {
                return Err(BotError::InvalidConfig(
                    "reporting.max_attempts must be >= 1 and backoff_factor >= 1.0".into(),
                ));
            }
        }
        Ok(())
    }
}
