//! Event routing
//!
//! [`BetWatcher`] receives chat events from the watched channel and drives
//! the voting, result-forwarding and cash-out flows. User-visible output
//! happens first; report rows follow in the background.


use crate::cashout::{CashoutDecision, CashoutResolver, OriginalBet};
use crate::config::{Config, DiscordConfig, MarkerConfig};
use crate::error::{BotError, Result};
use crate::notify::{self, ChatApi, UNKNOWN_USER};
use crate::parser::{self, BetParser};
use crate::report::{EventKind, ReportDispatcher, ReportRow};
use crate::resolution::ResolutionLedger;
use crate::types::{
    ChannelInfo, ChatEvent, ChatMessage, Embed, MessageId, OutgoingMessage, ReactionEvent, UserId,
};
use crate::utils::{fmt_money_terse, KeyedMutex};
use crate::voting::{VoteDirection, VoteOutcome, VoteTracker};
use chrono::Duration;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

const WIN_COLOR: u32 = 0x2ecc71;
const LOSS_COLOR: u32 = 0xe74c3c;

/// Where bets are read from and where results go
#[derive(Debug, Clone)]
pub struct ChannelRoutes {
    pub source: ChannelInfo,
    pub target: ChannelInfo,
}

impl ChannelRoutes {
    /// Resolve the configured channel ids or names
    pub async fn resolve(api: &dyn ChatApi, config: &DiscordConfig) -> Result<Self> {
        let source = api
            .fetch_channel(&config.source_channel)
            .await?
            .ok_or_else(|| BotError::ChannelNotFound(config.source_channel.clone()))?;
        let target = api
            .fetch_channel(&config.target_channel)
            .await?
            .ok_or_else(|| BotError::ChannelNotFound(config.target_channel.clone()))?;
        Ok(Self { source, target })
    }
}

/// What a handled event led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Ignored,
    /// A new bet line was seen (and registered for voting when `group`)
    Recorded { group: bool },
    Voted(VoteOutcome),
    Forwarded(EventKind),
    /// A result for this message was already forwarded
    Duplicate,
    CashedOut,
    Voided,
}

pub struct BetWatcher {
    api: Arc<dyn ChatApi>,
    reports: ReportDispatcher,
    routes: ChannelRoutes,
    markers: MarkerConfig,
    parser: BetParser,
    votes: VoteTracker,
    forwarded: ResolutionLedger,
    settled: ResolutionLedger,
    cashouts: CashoutResolver,
    locks: KeyedMutex<MessageId>,
    bot_user: RwLock<Option<UserId>>,
    vote_retention: Duration,
    ledger_retention: Option<Duration>,
}

impl BetWatcher {
    pub fn new(
        config: &Config,
        api: Arc<dyn ChatApi>,
        reports: ReportDispatcher,
        routes: ChannelRoutes,
    ) -> Self {
        Self {
            api,
            reports,
            routes,
            markers: config.markers.clone(),
            parser: BetParser::from_config(&config.voting),
            votes: VoteTracker::from_config(&config.voting),
            forwarded: ResolutionLedger::new(),
            settled: ResolutionLedger::new(),
            cashouts: CashoutResolver::from_config(&config.markers),
            locks: KeyedMutex::new(),
            bot_user: RwLock::new(None),
            vote_retention: Duration::days(config.voting.retention_days as i64),
            ledger_retention: config
                .ledger_retention_days
                .map(|d| Duration::days(d as i64)),
        }
    }

    pub fn routes(&self) -> &ChannelRoutes {
        &self.routes
    }

    pub fn votes(&self) -> &VoteTracker {
        &self.votes
    }

    pub fn set_bot_user(&self, id: UserId) {
        *self.bot_user.write() = Some(id);
    }

    fn is_bot_user(&self, id: UserId) -> bool {
        *self.bot_user.read() == Some(id)
    }

    /// Handle an event, logging instead of propagating failures
    pub async fn dispatch(&self, event: ChatEvent) -> Option<HandlerOutcome> {
        match self.handle(event).await {
            Ok(outcome) => {
                if outcome != HandlerOutcome::Ignored {
                    tracing::debug!(?outcome, "Event handled");
                }
                Some(outcome)
            }
            Err(e) => {
                tracing::error!(error = %e, "Event handler failed");
                None
            }
        }
    }

    pub async fn handle(&self, event: ChatEvent) -> Result<HandlerOutcome> {
        match event {
            ChatEvent::Ready { user_id } => {
                tracing::info!(user_id = %user_id, "Gateway ready");
                self.set_bot_user(user_id);
                Ok(HandlerOutcome::Ignored)
            }
            ChatEvent::MessageCreated(msg) => self.on_message(msg).await,
            ChatEvent::ReactionAdded(reaction) => self.on_reaction(reaction).await,
        }
    }

    async fn on_message(&self, msg: ChatMessage) -> Result<HandlerOutcome> {
        if msg.channel_id != self.routes.source.id || msg.author.bot {
            return Ok(HandlerOutcome::Ignored);
        }

        if let Some(original) = msg.referenced_message {
            if parser::parse_exact_amount(&msg.content).is_some() {
                return self.settle(&msg, original).await;
            }
        }

        if !parser::qualifies(&msg.content) {
            return Ok(HandlerOutcome::Ignored);
        }

        let group = parser::is_group_bet(&msg.content);
        if group && self.votes.on_proposal_seen(msg.id, msg.author.id) {
            tracing::info!(message_id = %msg.id, author = %msg.author.tag, "Group bet proposed");
            let api = self.api.as_ref();
            notify::react_best_effort(api, msg.channel_id, msg.id, &self.markers.upvote).await;
            notify::react_best_effort(api, msg.channel_id, msg.id, &self.markers.downvote).await;
        }

        self.report(EventKind::Placed, &msg, None);
        Ok(HandlerOutcome::Recorded { group })
    }

    async fn on_reaction(&self, reaction: ReactionEvent) -> Result<HandlerOutcome> {
        if reaction.channel_id != self.routes.source.id || self.is_bot_user(reaction.user_id) {
            return Ok(HandlerOutcome::Ignored);
        }

        let emoji = reaction.emoji.as_str();
        if emoji == self.markers.upvote {
            self.vote(&reaction, VoteDirection::Up).await
        } else if emoji == self.markers.downvote {
            self.vote(&reaction, VoteDirection::Down).await
        } else if emoji == self.markers.success {
            self.forward_result(&reaction, EventKind::Win).await
        } else if emoji == self.markers.fail {
            self.forward_result(&reaction, EventKind::Loss).await
        } else {
            Ok(HandlerOutcome::Ignored)
        }
    }

    async fn vote(&self, reaction: &ReactionEvent, direction: VoteDirection) -> Result<HandlerOutcome> {
        let msg = self
            .api
            .fetch_message(reaction.channel_id, reaction.message_id)
            .await?;
        if !parser::is_group_bet(&msg.content) {
            return Ok(HandlerOutcome::Ignored);
        }

        // State is lost on restart, so a vote may be the first sighting
        self.votes.on_proposal_seen(msg.id, msg.author.id);
        let outcome = self.votes.cast(msg.id, reaction.user_id, direction);

        if let VoteOutcome::Ignored(reason) = outcome {
            tracing::debug!(message_id = %msg.id, voter = %reaction.user_id, ?reason, "Vote ignored");
            return Ok(HandlerOutcome::Voted(outcome));
        }

        let names = self.resolve_names(&outcome, reaction.user_id).await;
        let text = outcome.announcement(|id| {
            names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_USER.to_string())
        });

        if let Some(text) = text {
            self.api
                .send(msg.channel_id, OutgoingMessage::text(text).replying_to(msg.id))
                .await?;
        }
        if outcome.is_terminal() {
            tracing::info!(message_id = %msg.id, voter = %reaction.user_id, "Group bet vote closed");
        }
        Ok(HandlerOutcome::Voted(outcome))
    }

    async fn resolve_names(&self, outcome: &VoteOutcome, voter: UserId) -> HashMap<UserId, String> {
        let ids = match outcome {
            VoteOutcome::Passed(tally) | VoteOutcome::Rejected(tally) => tally.participants(),
            _ => vec![voter],
        };

        let mut names = HashMap::new();
        for id in ids {
            if !names.contains_key(&id) {
                let name = notify::name_or_placeholder(self.api.as_ref(), id).await;
                names.insert(id, name);
            }
        }
        names
    }

    async fn forward_result(&self, reaction: &ReactionEvent, event: EventKind) -> Result<HandlerOutcome> {
        let msg = self
            .api
            .fetch_message(reaction.channel_id, reaction.message_id)
            .await?;
        if !parser::qualifies(&msg.content) {
            return Ok(HandlerOutcome::Ignored);
        }
        if !self.forwarded.mark_if_unresolved(msg.id) {
            tracing::debug!(message_id = %msg.id, "Result already forwarded");
            return Ok(HandlerOutcome::Duplicate);
        }

        let (title, color) = match event {
            EventKind::Win => (format!("{} Bet Won", self.markers.success), WIN_COLOR),
            _ => (format!("{} Bet Lost", self.markers.fail), LOSS_COLOR),
        };
        let mut embed = Embed::new(title)
            .description(msg.content.clone())
            .url(msg.link())
            .color(color)
            .field("Bettor", msg.author.name.clone(), true)
            .field("Channel", format!("#{}", self.routes.source.name), true);
        if let Some(bet) = self.parser.parse(&msg.content) {
            embed = embed
                .field("Stake", format!("${}", fmt_money_terse(bet.stake)), true)
                .field("Returns", format!("${}", fmt_money_terse(bet.returns_amount)), true);
        }

        let outgoing = OutgoingMessage::default()
            .with_embed(embed)
            .with_attachments(msg.attachments.clone());
        // The ledger already holds this id, so a failed send is not retried
        if let Err(e) = self.api.send(self.routes.target.id, outgoing).await {
            tracing::warn!(
                message_id = %msg.id,
                event = event.as_str(),
                error = %e,
                "Result marked forwarded but send failed; it will not be reported"
            );
            return Err(e);
        }

        tracing::info!(message_id = %msg.id, event = event.as_str(), "Forwarded bet result");
        self.report(event, &msg, None);
        Ok(HandlerOutcome::Forwarded(event))
    }

    async fn settle(&self, reply: &ChatMessage, original_id: MessageId) -> Result<HandlerOutcome> {
        let _guard = self.locks.lock(original_id).await;

        if self.settled.is_resolved(original_id) {
            return Ok(HandlerOutcome::Ignored);
        }

        let original = self.api.fetch_message(reply.channel_id, original_id).await?;
        if !parser::qualifies(&original.content) {
            return Ok(HandlerOutcome::Ignored);
        }

        let decision = self
            .cashouts
            .decide(&reply.content, &original.content, &original.reactions);
        let (marker, event, outcome) = match &decision {
            CashoutDecision::Skip(reason) => {
                tracing::debug!(message_id = %original_id, ?reason, "Cash-out reply skipped");
                return Ok(HandlerOutcome::Ignored);
            }
            CashoutDecision::Void => (&self.markers.void, EventKind::Void, HandlerOutcome::Voided),
            CashoutDecision::CashOut { .. } => {
                (&self.markers.cashout, EventKind::Cashout, HandlerOutcome::CashedOut)
            }
        };
        self.settled.mark_if_unresolved(original_id);

        notify::react_best_effort(self.api.as_ref(), original.channel_id, original.id, marker).await;

        let reference = OriginalBet {
            author: &original.author.name,
            content: &original.content,
            channel: &self.routes.source.name,
        };
        if let Some(summary) = decision.summary(&reference) {
            let outgoing = OutgoingMessage::text(summary).with_attachments(original.attachments.clone());
            self.api.send(self.routes.target.id, outgoing).await?;
        }

        tracing::info!(
            message_id = %original.id,
            event = event.as_str(),
            "Settled bet from reply"
        );
        let (cashout, gain_loss) = decision.report_amounts();
        self.report(event, &original, Some((cashout, gain_loss)));
        Ok(outcome)
    }

    fn report(
        &self,
        event: EventKind,
        msg: &ChatMessage,
        settlement: Option<(rust_decimal::Decimal, Option<rust_decimal::Decimal>)>,
    ) {
        let bet = self.parser.parse(&msg.content);
        let mut row = ReportRow::for_message(event, msg, &self.routes.source.name, bet.as_ref());
        if let Some((cashout, gain_loss)) = settlement {
            row = row.with_settlement(cashout, gain_loss);
        }
        let _ = self.reports.dispatch(msg.timestamp, row);
    }

    /// Drop state past its retention window
    pub fn evict(&self) {
        let proposals = self.votes.evict_older_than(self.vote_retention);
        let (forwarded, settled) = match self.ledger_retention {
            Some(age) => (
                self.forwarded.evict_older_than(age),
                self.settled.evict_older_than(age),
            ),
            None => (0, 0),
        };
        let locks = self.locks.prune();
        if proposals + forwarded + settled > 0 {
            tracing::info!(proposals, forwarded, settled, locks, "Evicted stale state");
        }
    }
}
