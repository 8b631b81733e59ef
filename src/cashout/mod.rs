//! Cash-out and void replies
//!
//! A reply consisting only of `$<amount>` settles the bet it answers:
//! `$0` voids it, anything else cashes it out and is compared against the
//! stake inferred from the original line.

#[cfg(test)]
mod tests;

use crate::parser;
use crate::utils::fmt_money;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Differences smaller than this are reported as neither gain nor loss
const NEUTRAL_BAND: Decimal = dec!(0.005);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAnAmount,
    AlreadyResolved,
}

/// How a cash-out compares to the stake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Gain(Decimal),
    Loss(Decimal),
    Neutral,
    /// No stake could be inferred
    Plain,
}

impl Framing {
    pub fn between(cashout: Decimal, stake: Option<Decimal>) -> Self {
        let Some(stake) = stake else {
            return Framing::Plain;
        };
        let diff = cashout - stake;
        if diff.abs() < NEUTRAL_BAND {
            Framing::Neutral
        } else if diff > Decimal::ZERO {
            Framing::Gain(diff)
        } else {
            Framing::Loss(diff.abs())
        }
    }

    /// Signed gain/loss for reporting
    pub fn gain_loss(&self) -> Option<Decimal> {
        match self {
            Framing::Gain(d) => Some(*d),
            Framing::Loss(d) => Some(-*d),
            Framing::Neutral => Some(Decimal::ZERO),
            Framing::Plain => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CashoutDecision {
    Skip(SkipReason),
    Void,
    CashOut {
        amount: Decimal,
        stake: Option<Decimal>,
        framing: Framing,
    },
}

impl CashoutDecision {
    /// Event name used in reports
    pub fn event_kind(&self) -> Option<&'static str> {
        match self {
            CashoutDecision::Skip(_) => None,
            CashoutDecision::Void => Some("void"),
            CashoutDecision::CashOut { .. } => Some("cashout"),
        }
    }

    /// (cash-out amount, gain/loss) for the report row
    pub fn report_amounts(&self) -> (Decimal, Option<Decimal>) {
        match self {
            CashoutDecision::Skip(_) => (Decimal::ZERO, None),
            CashoutDecision::Void => (Decimal::ZERO, Some(Decimal::ZERO)),
            CashoutDecision::CashOut { amount, framing, .. } => (*amount, framing.gain_loss()),
        }
    }

    /// Headline posted in the channel
    pub fn status_line(&self) -> Option<String> {
        match self {
            CashoutDecision::Skip(_) => None,
            CashoutDecision::Void => Some("🚫 **Bet Voided**".to_string()),
            CashoutDecision::CashOut { amount, framing, .. } => Some(match framing {
                Framing::Gain(d) => format!(
                    "💰 **Cashed Out** for ${} (gain of ${})",
                    fmt_money(*amount),
                    fmt_money(*d)
                ),
                Framing::Loss(d) => format!(
                    "💰 **Cashed Out** for ${} (loss of ${})",
                    fmt_money(*amount),
                    fmt_money(*d)
                ),
                Framing::Neutral | Framing::Plain => {
                    format!("💰 **Cashed Out** for ${}", fmt_money(*amount))
                }
            }),
        }
    }

    /// Status line followed by a quote of the original bet
    pub fn summary(&self, original: &OriginalBet<'_>) -> Option<String> {
        let headline = self.status_line()?;
        Some(format!("{}\n{}", headline, original.reference_block()))
    }
}

/// The bet a reply refers to, as shown in the summary
pub struct OriginalBet<'a> {
    pub author: &'a str,
    pub content: &'a str,
    pub channel: &'a str,
}

impl OriginalBet<'_> {
    pub fn reference_block(&self) -> String {
        let quoted = self
            .content
            .lines()
            .map(|l| format!("> {}", l))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "> **Original bet by {}** in #{}\n{}",
            self.author, self.channel, quoted
        )
    }
}

pub struct CashoutResolver {
    resolved_markers: Vec<String>,
}

impl CashoutResolver {
    pub fn new<I, S>(resolved_markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resolved_markers: resolved_markers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(markers: &crate::config::MarkerConfig) -> Self {
        Self::new(markers.resolved_set())
    }

    pub fn is_resolved(&self, reactions: &[String]) -> bool {
        reactions.iter().any(|r| self.resolved_markers.contains(r))
    }

    pub fn decide(&self, reply: &str, original_text: &str, reactions: &[String]) -> CashoutDecision {
        let Some(amount) = parser::parse_exact_amount(reply) else {
            return CashoutDecision::Skip(SkipReason::NotAnAmount);
        };
        if self.is_resolved(reactions) {
            return CashoutDecision::Skip(SkipReason::AlreadyResolved);
        }
        if amount.is_zero() {
            return CashoutDecision::Void;
        }

        let stake = parser::infer_stake(original_text);
        CashoutDecision::CashOut {
            amount,
            stake,
            framing: Framing::between(amount, stake),
        }
    }
}
