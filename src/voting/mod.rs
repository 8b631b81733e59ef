//! Group-bet voting
//!
//! Each proposal moves `Open -> Passed` or `Open -> Rejected` exactly once.
//! The proposer's approval is implicit; every other member gets a single
//! vote, and nothing is recorded once the proposal is closed.


use crate::types::{MessageId, UserId};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Placeholder listed on the "against" side when nobody voted no
pub const NO_VOTERS: &str = "None";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    Open,
    Passed,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct ProposalState {
    pub proposer: UserId,
    pub upvoters: Vec<UserId>,
    pub downvoters: Vec<UserId>,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

impl ProposalState {
    fn new(proposer: UserId) -> Self {
        Self {
            proposer,
            upvoters: Vec::new(),
            downvoters: Vec::new(),
            status: ProposalStatus::Open,
            created_at: Utc::now(),
        }
    }

    fn has_voted(&self, voter: UserId) -> bool {
        self.upvoters.contains(&voter) || self.downvoters.contains(&voter)
    }

    fn tally(&self) -> VoteTally {
        VoteTally {
            proposer: self.proposer,
            upvoters: self.upvoters.clone(),
            downvoters: self.downvoters.clone(),
        }
    }
}

/// Snapshot of who stands where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTally {
    pub proposer: UserId,
    pub upvoters: Vec<UserId>,
    pub downvoters: Vec<UserId>,
}

impl VoteTally {
    /// Proposer first, then explicit up-voters
    pub fn for_side(&self) -> Vec<UserId> {
        std::iter::once(self.proposer)
            .chain(self.upvoters.iter().copied())
            .collect()
    }

    pub fn against_side(&self) -> &[UserId] {
        &self.downvoters
    }

    /// Everyone whose name an announcement may need
    pub fn participants(&self) -> Vec<UserId> {
        let mut ids = self.for_side();
        ids.extend(self.downvoters.iter().copied());
        ids
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Untracked,
    ProposerVote,
    AlreadyVoted,
    Closed,
}

/// Result of casting a vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Ignored(IgnoreReason),
    /// Up-vote recorded, pass threshold not reached yet
    Progress { voter: UserId, remaining: usize },
    /// Down-vote recorded, reject threshold not reached yet
    DownvoteNoted { voter: UserId, remaining: usize },
    Passed(VoteTally),
    Rejected(VoteTally),
}

impl VoteOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VoteOutcome::Passed(_) | VoteOutcome::Rejected(_))
    }

    /// Text for the channel; `None` when the vote was ignored.
    ///
    /// `name_of` maps ids to display names; callers substitute a placeholder
    /// for ids they could not resolve.
    pub fn announcement<F>(&self, name_of: F) -> Option<String>
    where
        F: Fn(UserId) -> String,
    {
        let names = |ids: &[UserId]| -> String {
            if ids.is_empty() {
                NO_VOTERS.to_string()
            } else {
                ids.iter().map(|id| name_of(*id)).collect::<Vec<_>>().join(", ")
            }
        };

        match self {
            VoteOutcome::Ignored(_) => None,
            VoteOutcome::Progress { voter, remaining } => Some(format!(
                "👍 {} voted for the group bet. {} more {} needed to pass.",
                name_of(*voter),
                remaining,
                plural_votes(*remaining)
            )),
            VoteOutcome::DownvoteNoted { voter, remaining } => Some(format!(
                "👎 {} voted against the group bet. {} more {} against will reject it.",
                name_of(*voter),
                remaining,
                plural_votes(*remaining)
            )),
            VoteOutcome::Passed(tally) => Some(format!(
                "✅ **Group bet passed!**\n**For:** {}\n**Against:** {}",
                names(&tally.for_side()),
                names(tally.against_side())
            )),
            VoteOutcome::Rejected(tally) => Some(format!(
                "❌ **Group bet rejected.**\n**For:** {}\n**Against:** {}",
                names(&tally.for_side()),
                names(tally.against_side())
            )),
        }
    }
}

fn plural_votes(n: usize) -> &'static str {
    if n == 1 {
        "vote"
    } else {
        "votes"
    }
}

/// In-memory proposal registry.
///
/// Every check-then-mutate runs inside one critical section, so duplicate
/// reaction events cannot both cross a threshold.
pub struct VoteTracker {
    pass_threshold: usize,
    reject_threshold: usize,
    proposals: Mutex<HashMap<MessageId, ProposalState>>,
    /// Outcomes of evicted proposals. Lock after `proposals`.
    closed: Mutex<HashMap<MessageId, ProposalStatus>>,
}

impl VoteTracker {
    pub fn new(pass_threshold: usize, reject_threshold: usize) -> Self {
        Self {
            pass_threshold: pass_threshold.max(1),
            reject_threshold: reject_threshold.max(1),
            proposals: Mutex::new(HashMap::new()),
            closed: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &crate::config::VotingConfig) -> Self {
        Self::new(config.pass_threshold, config.reject_threshold)
    }

    /// Start tracking a proposal; returns false when it was already known
    pub fn on_proposal_seen(&self, id: MessageId, proposer: UserId) -> bool {
        let mut proposals = self.proposals.lock();
        if proposals.contains_key(&id) || self.closed.lock().contains_key(&id) {
            return false;
        }
        proposals.insert(id, ProposalState::new(proposer));
        tracing::debug!(message_id = %id, proposer = %proposer, "Tracking group bet proposal");
        true
    }

    pub fn cast_upvote(&self, id: MessageId, voter: UserId) -> VoteOutcome {
        self.cast(id, voter, VoteDirection::Up)
    }

    pub fn cast_downvote(&self, id: MessageId, voter: UserId) -> VoteOutcome {
        self.cast(id, voter, VoteDirection::Down)
    }

    pub fn cast(&self, id: MessageId, voter: UserId, direction: VoteDirection) -> VoteOutcome {
        let mut proposals = self.proposals.lock();
        let Some(state) = proposals.get_mut(&id) else {
            if self.closed.lock().contains_key(&id) {
                return VoteOutcome::Ignored(IgnoreReason::Closed);
            }
            return VoteOutcome::Ignored(IgnoreReason::Untracked);
        };

        if state.status != ProposalStatus::Open {
            return VoteOutcome::Ignored(IgnoreReason::Closed);
        }
        if voter == state.proposer {
            return VoteOutcome::Ignored(IgnoreReason::ProposerVote);
        }
        if state.has_voted(voter) {
            return VoteOutcome::Ignored(IgnoreReason::AlreadyVoted);
        }

        match direction {
            VoteDirection::Up => {
                state.upvoters.push(voter);
                let count = state.upvoters.len();
                if count >= self.pass_threshold {
                    state.status = ProposalStatus::Passed;
                    tracing::info!(message_id = %id, upvotes = count, "Group bet passed");
                    VoteOutcome::Passed(state.tally())
                } else {
                    VoteOutcome::Progress {
                        voter,
                        remaining: self.pass_threshold - count,
                    }
                }
            }
            VoteDirection::Down => {
                state.downvoters.push(voter);
                let count = state.downvoters.len();
                if count >= self.reject_threshold {
                    state.status = ProposalStatus::Rejected;
                    tracing::info!(message_id = %id, downvotes = count, "Group bet rejected");
                    VoteOutcome::Rejected(state.tally())
                } else {
                    VoteOutcome::DownvoteNoted {
                        voter,
                        remaining: self.reject_threshold - count,
                    }
                }
            }
        }
    }

    pub fn status(&self, id: MessageId) -> Option<ProposalStatus> {
        let proposals = self.proposals.lock();
        match proposals.get(&id) {
            Some(state) => Some(state.status),
            None => self.closed.lock().get(&id).copied(),
        }
    }

    pub fn get(&self, id: MessageId) -> Option<ProposalState> {
        self.proposals.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.proposals.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget proposals created before `now - max_age`.
    ///
    /// Closed proposals keep a tombstone with their final status so a late
    /// vote can never reopen them.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut proposals = self.proposals.lock();
        let mut closed = self.closed.lock();
        let before = proposals.len();
        proposals.retain(|id, s| {
            if s.created_at > cutoff {
                return true;
            }
            if s.status != ProposalStatus::Open {
                closed.insert(*id, s.status);
            }
            false
        });
        before - proposals.len()
    }
}
