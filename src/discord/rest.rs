//! Discord REST client

use super::model::{RawChannel, RawMessage, RawSent, RawUser};
use crate::config::DiscordConfig;
use crate::error::{BotError, Result};
use crate::notify::ChatApi;
use crate::types::{
    ChannelId, ChannelInfo, ChatMessage, GuildId, MessageId, OutgoingMessage, SentMessage, UserId,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

#[derive(Clone)]
pub struct DiscordClient {
    http: Client,
    api_base: String,
    token: String,
    guild_id: Option<GuildId>,
    names: std::sync::Arc<Mutex<HashMap<UserId, String>>>,
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("DiscordBot (https://github.com/betwatch, 0.1.0)")
            .build()?;

        let guild_id = config
            .guild_id
            .as_deref()
            .map(|g| {
                g.parse()
                    .map_err(|_| BotError::InvalidConfig(format!("discord.guild_id: {}", g)))
            })
            .transpose()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            guild_id,
            names: Default::default(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| BotError::InvalidConfig(format!("discord.api_base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| BotError::InvalidConfig("discord.api_base cannot be a base".into()))?
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self
            .http
            .request(method, self.url(segments)?)
            .header("Authorization", format!("Bot {}", self.token)))
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let resp = self.request(Method::GET, segments)?.send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn find_channel_by_name(&self, name: &str) -> Result<Option<ChannelInfo>> {
        let Some(guild) = self.guild_id else {
            return Err(BotError::InvalidConfig(format!(
                "channel '{}' given by name but discord.guild_id is not set",
                name
            )));
        };

        let guild = guild.to_string();
        let channels: Vec<RawChannel> = self.get_json(&["guilds", &guild, "channels"]).await?;
        let wanted = name.trim_start_matches('#');

        Ok(channels
            .into_iter()
            .find(|c| c.name.as_deref() == Some(wanted))
            .map(|c| ChannelInfo {
                id: ChannelId(c.id),
                name: c.name.unwrap_or_default(),
                guild_id: c.guild_id.map(GuildId).or(self.guild_id),
            }))
    }
}

/// Body text with attachment links appended; Discord unfurls them inline
fn compose_content(message: &OutgoingMessage) -> String {
    let mut content = message.text.clone();
    for url in &message.attachment_urls {
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(url);
    }
    content
}

fn message_body(message: &OutgoingMessage) -> serde_json::Value {
    let mut body = serde_json::json!({
        "content": compose_content(message),
        "allowed_mentions": { "parse": [] },
    });
    if let Some(embed) = &message.embed {
        body["embeds"] = serde_json::json!([embed]);
    }
    if let Some(reply_to) = message.reply_to {
        body["message_reference"] = serde_json::json!({
            "message_id": reply_to.to_string(),
            "fail_if_not_exists": false,
        });
    }
    body
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BotError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ChatApi for DiscordClient {
    async fn send(&self, channel: ChannelId, message: OutgoingMessage) -> Result<SentMessage> {
        let channel_str = channel.to_string();
        let resp = self
            .request(Method::POST, &["channels", &channel_str, "messages"])?
            .json(&message_body(&message))
            .send()
            .await?;
        let sent: RawSent = check(resp).await?.json().await?;

        Ok(SentMessage {
            id: MessageId(sent.id),
            channel_id: ChannelId(sent.channel_id),
        })
    }

    async fn react(&self, channel: ChannelId, message: MessageId, emoji: &str) -> Result<()> {
        let channel_str = channel.to_string();
        let message_str = message.to_string();
        let resp = self
            .request(
                Method::PUT,
                &["channels", &channel_str, "messages", &message_str, "reactions", emoji, "@me"],
            )?
            .header("Content-Length", "0")
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn fetch_channel(&self, name_or_id: &str) -> Result<Option<ChannelInfo>> {
        let name_or_id = name_or_id.trim();
        if !name_or_id.chars().all(|c| c.is_ascii_digit()) {
            return self.find_channel_by_name(name_or_id).await;
        }

        let resp = self.request(Method::GET, &["channels", name_or_id])?.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: RawChannel = check(resp).await?.json().await?;

        Ok(Some(ChannelInfo {
            id: ChannelId(raw.id),
            name: raw.name.unwrap_or_else(|| raw.id.to_string()),
            guild_id: raw.guild_id.map(GuildId),
        }))
    }

    async fn fetch_message(&self, channel: ChannelId, message: MessageId) -> Result<ChatMessage> {
        let channel_str = channel.to_string();
        let message_str = message.to_string();
        let raw: RawMessage = self
            .get_json(&["channels", &channel_str, "messages", &message_str])
            .await?;

        let mut msg = raw.into_chat_message();
        // REST message objects omit guild_id
        if msg.guild_id.is_none() {
            msg.guild_id = self.guild_id;
        }
        Ok(msg)
    }

    async fn resolve_username(&self, user: UserId) -> Result<String> {
        if let Some(name) = self.names.lock().get(&user) {
            return Ok(name.clone());
        }

        let user_str = user.to_string();
        let raw: RawUser = self.get_json(&["users", &user_str]).await?;
        let name = raw.display_name();
        self.names.lock().insert(user, name.clone());
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embed;

    fn client() -> DiscordClient {
        let config = DiscordConfig {
            token: "token".to_string(),
            api_base: "https://discord.com/api/v10".to_string(),
            gateway_url: String::new(),
            source_channel: "1".to_string(),
            target_channel: "2".to_string(),
            guild_id: Some("10".to_string()),
        };
        DiscordClient::new(&config).unwrap()
    }

    #[test]
    fn test_reaction_url_encodes_emoji() {
        let url = client()
            .url(&["channels", "2", "messages", "3", "reactions", "👍", "@me"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://discord.com/api/v10/channels/2/messages/3/reactions/%F0%9F%91%8D/@me"
        );
    }

    #[test]
    fn test_message_body_with_reply_and_embed() {
        let message = OutgoingMessage::text("🚫 **Bet Voided**")
            .replying_to(MessageId(77))
            .with_embed(Embed::new("Bet Won"));
        let body = message_body(&message);

        assert_eq!(body["content"], "🚫 **Bet Voided**");
        assert_eq!(body["message_reference"]["message_id"], "77");
        assert_eq!(body["embeds"][0]["title"], "Bet Won");
        assert!(body["allowed_mentions"]["parse"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_attachments_appended_to_content() {
        let message = OutgoingMessage::text("slip")
            .with_attachments(vec!["https://cdn/a.png".into(), "https://cdn/b.png".into()]);
        assert_eq!(compose_content(&message), "slip\nhttps://cdn/a.png\nhttps://cdn/b.png");
    }

    #[test]
    fn test_invalid_guild_id_rejected() {
        let config = DiscordConfig {
            token: "token".to_string(),
            api_base: "https://discord.com/api/v10".to_string(),
            gateway_url: String::new(),
            source_channel: "bets".to_string(),
            target_channel: "results".to_string(),
            guild_id: Some("not-a-number".to_string()),
        };
        assert!(DiscordClient::new(&config).is_err());
    }
}
