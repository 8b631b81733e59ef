//! Chat boundary
//!
//! Everything the bot does to the chat platform goes through [`ChatApi`]:
//! posting, reacting, and looking up channels, messages and users.

use crate::error::Result;
use crate::types::{ChannelId, ChannelInfo, ChatMessage, MessageId, OutgoingMessage, SentMessage, UserId};
use async_trait::async_trait;

/// Shown when a user id cannot be resolved to a name
pub const UNKNOWN_USER: &str = "Unknown user";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send(&self, channel: ChannelId, message: OutgoingMessage) -> Result<SentMessage>;

    async fn react(&self, channel: ChannelId, message: MessageId, emoji: &str) -> Result<()>;

    /// Look a channel up by numeric id or by name; `None` when it does not exist
    async fn fetch_channel(&self, name_or_id: &str) -> Result<Option<ChannelInfo>>;

    async fn fetch_message(&self, channel: ChannelId, message: MessageId) -> Result<ChatMessage>;

    async fn resolve_username(&self, user: UserId) -> Result<String>;
}

/// React and log on failure; a missing reaction never aborts a flow
pub async fn react_best_effort(
    api: &dyn ChatApi,
    channel: ChannelId,
    message: MessageId,
    emoji: &str,
) -> bool {
    match api.react(channel, message, emoji).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                channel_id = %channel,
                message_id = %message,
                emoji,
                error = %e,
                "Failed to add reaction"
            );
            false
        }
    }
}

/// Resolve a display name, falling back to a placeholder
pub async fn name_or_placeholder(api: &dyn ChatApi, user: UserId) -> String {
    match api.resolve_username(user).await {
        Ok(name) => name,
        Err(e) => {
            tracing::debug!(user_id = %user, error = %e, "Could not resolve username");
            UNKNOWN_USER.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_react_best_effort_swallows_errors() {
        let mut api = MockChatApi::new();
        api.expect_react()
            .times(1)
            .returning(|_, _, _| Err(BotError::Api { status: 403, body: "Missing Access".into() }));

        assert!(!react_best_effort(&api, ChannelId(1), MessageId(2), "👍").await);
    }

    #[tokio::test]
    async fn test_name_or_placeholder() {
        let mut api = MockChatApi::new();
        api.expect_resolve_username()
            .with(eq(UserId(7)))
            .returning(|_| Ok("danny".to_string()));
        api.expect_resolve_username()
            .with(eq(UserId(8)))
            .returning(|_| Err(BotError::Api { status: 404, body: "Unknown User".into() }));

        assert_eq!(name_or_placeholder(&api, UserId(7)).await, "danny");
        assert_eq!(name_or_placeholder(&api, UserId(8)).await, UNKNOWN_USER);
    }
}
