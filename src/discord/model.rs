//! Discord wire payloads and their conversion into chat types

use crate::types::{ChannelId, ChatMessage, ChatUser, GuildId, MessageId, ReactionEvent, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

fn snowflake<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

fn opt_snowflake<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => raw.parse().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    #[serde(deserialize_with = "snowflake")]
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl RawUser {
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if d != "0" => format!("{}#{}", self.username, d),
            _ => self.username.clone(),
        }
    }

    pub fn display_name(&self) -> String {
        self.global_name.clone().unwrap_or_else(|| self.username.clone())
    }

    pub fn into_chat_user(self) -> ChatUser {
        ChatUser {
            id: UserId(self.id),
            name: self.display_name(),
            tag: self.tag(),
            bot: self.bot,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEmoji {
    #[serde(default, deserialize_with = "opt_snowflake")]
    pub id: Option<u64>,
    pub name: Option<String>,
}

impl RawEmoji {
    /// `👍` for unicode emoji, `name:id` for custom ones
    pub fn token(&self) -> String {
        let name = self.name.clone().unwrap_or_default();
        match self.id {
            Some(id) => format!("{}:{}", name, id),
            None => name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReaction {
    pub emoji: RawEmoji,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAttachment {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReference {
    #[serde(default, deserialize_with = "opt_snowflake")]
    pub message_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    #[serde(deserialize_with = "snowflake")]
    pub id: u64,
    #[serde(deserialize_with = "snowflake")]
    pub channel_id: u64,
    #[serde(default, deserialize_with = "opt_snowflake")]
    pub guild_id: Option<u64>,
    pub author: RawUser,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub reactions: Vec<RawReaction>,
    #[serde(default)]
    pub attachments: Vec<RawAttachment>,
    #[serde(default)]
    pub message_reference: Option<RawReference>,
}

impl RawMessage {
    pub fn into_chat_message(self) -> ChatMessage {
        ChatMessage {
            id: MessageId(self.id),
            channel_id: ChannelId(self.channel_id),
            guild_id: self.guild_id.map(GuildId),
            author: self.author.into_chat_user(),
            content: self.content,
            timestamp: self.timestamp,
            reactions: self.reactions.iter().map(|r| r.emoji.token()).collect(),
            attachments: self.attachments.into_iter().map(|a| a.url).collect(),
            referenced_message: self
                .message_reference
                .and_then(|r| r.message_id)
                .map(MessageId),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReactionAdd {
    #[serde(deserialize_with = "snowflake")]
    pub user_id: u64,
    #[serde(deserialize_with = "snowflake")]
    pub channel_id: u64,
    #[serde(deserialize_with = "snowflake")]
    pub message_id: u64,
    #[serde(default, deserialize_with = "opt_snowflake")]
    pub guild_id: Option<u64>,
    pub emoji: RawEmoji,
}

impl RawReactionAdd {
    pub fn into_event(self) -> ReactionEvent {
        ReactionEvent {
            channel_id: ChannelId(self.channel_id),
            message_id: MessageId(self.message_id),
            guild_id: self.guild_id.map(GuildId),
            user_id: UserId(self.user_id),
            emoji: self.emoji.token(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawChannel {
    #[serde(deserialize_with = "snowflake")]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_snowflake")]
    pub guild_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReady {
    pub user: RawUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSent {
    #[serde(deserialize_with = "snowflake")]
    pub id: u64,
    #[serde(deserialize_with = "snowflake")]
    pub channel_id: u64,
}
