//! Discord gateway listener
//!
//! Keeps one websocket session alive (HELLO, IDENTIFY, heartbeats) and turns
//! the dispatches we care about into [`ChatEvent`]s. Dropped sessions are
//! re-identified after an exponential backoff.

use super::model::{RawMessage, RawReactionAdd, RawReady};
use crate::error::{BotError, Result};
use crate::types::{ChatEvent, UserId};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

pub const INTENT_GUILDS: u64 = 1 << 0;
pub const INTENT_GUILD_MESSAGES: u64 = 1 << 9;
pub const INTENT_GUILD_MESSAGE_REACTIONS: u64 = 1 << 10;
pub const INTENT_MESSAGE_CONTENT: u64 = 1 << 15;

/// Close codes after which reconnecting cannot help
const FATAL_CLOSE_CODES: [u16; 5] = [4004, 4010, 4011, 4013, 4014];

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: serde_json::Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Hello {
    heartbeat_interval: u64,
}

/// What the session loop should do after a payload
#[derive(Debug, PartialEq)]
enum Step {
    Continue,
    Event(ChatEvent),
    HeartbeatNow,
    Acked,
    Reconnect,
}

pub struct Gateway {
    url: String,
    token: String,
    intents: u64,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Gateway {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            intents: INTENT_GUILDS
                | INTENT_GUILD_MESSAGES
                | INTENT_GUILD_MESSAGE_REACTIONS
                | INTENT_MESSAGE_CONTENT,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }

    /// Run the gateway in the background, forwarding events to `tx`
    pub fn spawn(self, tx: mpsc::Sender<ChatEvent>) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run(tx).await })
    }

    pub async fn run(&self, tx: mpsc::Sender<ChatEvent>) -> Result<()> {
        let mut backoff = self.initial_backoff;
        let mut attempt: u32 = 0;

        loop {
            match self.run_session(&tx).await {
                Ok(()) => {
                    tracing::info!("Gateway asked for reconnect");
                    backoff = self.initial_backoff;
                    attempt = 0;
                }
                Err(BotError::Gateway(reason)) if is_fatal(&reason) => {
                    tracing::error!(reason = %reason, "Gateway closed permanently");
                    return Err(BotError::Gateway(reason));
                }
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, "Gateway session ended, reconnecting...");
                }
            }

            if tx.is_closed() {
                tracing::info!("Event receiver dropped, stopping gateway");
                return Ok(());
            }

            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.max_backoff);
        }
    }

    fn identify(&self) -> serde_json::Value {
        serde_json::json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": self.token,
                "intents": self.intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "betwatch",
                    "device": "betwatch",
                }
            }
        })
    }

    async fn run_session(&self, tx: &mpsc::Sender<ChatEvent>) -> Result<()> {
        tracing::info!(url = %self.url, "Connecting to Discord gateway");
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        let hello = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    let payload: GatewayPayload = serde_json::from_str(&text)?;
                    if payload.op == OP_HELLO {
                        break serde_json::from_value::<Hello>(payload.d)?;
                    }
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(BotError::Gateway("closed before HELLO".into())),
            }
        };

        write.send(Message::text(self.identify().to_string())).await?;
        tracing::info!(
            heartbeat_ms = hello.heartbeat_interval,
            "Gateway connected, identify sent"
        );

        let mut heartbeat = tokio::time::interval(Duration::from_millis(hello.heartbeat_interval));
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut seq: Option<u64> = None;
        let mut acked = true;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if !acked {
                        return Err(BotError::Gateway("heartbeat not acknowledged".into()));
                    }
                    write.send(heartbeat_frame(seq)).await?;
                    acked = false;
                }
                msg = read.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| format!("close {}: {}", u16::from(f.code), &*f.reason))
                                .unwrap_or_else(|| "close without frame".to_string());
                            return Err(BotError::Gateway(reason));
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(BotError::Gateway("stream ended".into())),
                    };

                    let payload: GatewayPayload = match serde_json::from_str(&text) {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, "Unparseable gateway payload");
                            continue;
                        }
                    };
                    if payload.s.is_some() {
                        seq = payload.s;
                    }

                    match interpret(payload) {
                        Step::Continue => {}
                        Step::Event(event) => {
                            if tx.send(event).await.is_err() {
                                tracing::warn!("Event channel closed");
                                return Ok(());
                            }
                        }
                        Step::HeartbeatNow => write.send(heartbeat_frame(seq)).await?,
                        Step::Acked => acked = true,
                        Step::Reconnect => return Ok(()),
                    }
                }
            }
        }
    }
}

fn heartbeat_frame(seq: Option<u64>) -> Message {
    Message::text(serde_json::json!({ "op": OP_HEARTBEAT, "d": seq }).to_string())
}

fn is_fatal(reason: &str) -> bool {
    FATAL_CLOSE_CODES
        .iter()
        .any(|code| reason.starts_with(&format!("close {}:", code)))
}

fn interpret(payload: GatewayPayload) -> Step {
    match payload.op {
        OP_DISPATCH => match dispatch_event(payload.t.as_deref(), payload.d) {
            Some(event) => Step::Event(event),
            None => Step::Continue,
        },
        OP_HEARTBEAT => Step::HeartbeatNow,
        OP_HEARTBEAT_ACK => Step::Acked,
        OP_RECONNECT | OP_INVALID_SESSION => Step::Reconnect,
        _ => Step::Continue,
    }
}

fn dispatch_event(kind: Option<&str>, data: serde_json::Value) -> Option<ChatEvent> {
    let parsed = match kind? {
        "READY" => serde_json::from_value::<RawReady>(data).map(|r| ChatEvent::Ready {
            user_id: UserId(r.user.id),
        }),
        "MESSAGE_CREATE" => serde_json::from_value::<RawMessage>(data)
            .map(|m| ChatEvent::MessageCreated(m.into_chat_message())),
        "MESSAGE_REACTION_ADD" => serde_json::from_value::<RawReactionAdd>(data)
            .map(|r| ChatEvent::ReactionAdded(r.into_event())),
        _ => return None,
    };

    match parsed {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(event = ?kind, error = %e, "Failed to decode dispatch");
            None
        }
    }
}
