//! Error types for the bet watcher

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for BotError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BotError::Gateway(e.to_string())
    }
}

impl BotError {
    /// Whether a retry could plausibly succeed (network hiccup, rate limit, 5xx)
    pub fn is_transient(&self) -> bool {
        match self {
            BotError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            BotError::Api { status, .. } => *status == 429 || *status >= 500,
            BotError::Gateway(_) => true,
            _ => false,
        }
    }
}
