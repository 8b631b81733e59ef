//! Bet line parsing
//!
//! Pulls stake, returns, odds and market out of loosely formatted bet
//! announcements such as `DH dh Lakers ML -110 $2.00 Returns $3.80`.
//! Every extractor answers `None` on a miss; callers carry on with
//! whatever they have.


use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

lazy_static! {
    static ref GROUP_MARKER_RE: Regex = Regex::new(r"(?i)\bgb\b").unwrap();
    static ref BET_LINE_RE: Regex = Regex::new(
        r"(?m)^\s*([A-Za-z]{2})\s+(\S+)\s+(.+?)\s+([+-]?\d+(?:\.\d+)?)\s+\$\s?(\d+(?:,\d{3})*(?:\.\d+)?)\s+(?:Returns|To Return)\s+\$\s?(\d+(?:,\d{3})*(?:\.\d+)?)"
    )
    .unwrap();
    static ref RETURNS_AMOUNT_RE: Regex =
        Regex::new(r" Returns \$(\d+(?:,\d{3})*(?:\.\d+)?)").unwrap();
    static ref DOLLAR_RE: Regex = Regex::new(r"\$\s?(\d+(?:,\d{3})*(?:\.\d+)?)").unwrap();
    static ref EXACT_AMOUNT_RE: Regex =
        Regex::new(r"^\$\s*(\d+(?:,\d{3})*(?:\.\d+)?)$").unwrap();
}

const RETURNS_TOKEN: &str = " Returns ";
const RETURNS_WORD: &str = "Returns";

/// Who placed the bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetKind {
    Individual,
    Group,
    Unknown,
}

impl BetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetKind::Individual => "individual",
            BetKind::Group => "group",
            BetKind::Unknown => "unknown",
        }
    }
}

/// Structured view of a bet line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetAnnouncement {
    pub kind: BetKind,
    /// Upper-cased two-letter code at the start of the line
    pub initials: String,
    pub bettor: String,
    pub market: String,
    pub odds: Decimal,
    pub stake: Decimal,
    pub returns_amount: Decimal,
}

/// A line is a bet iff it carries the exact ` Returns ` token.
pub fn qualifies(text: &str) -> bool {
    text.contains(RETURNS_TOKEN)
}

/// A qualifying line that also carries the standalone `gb` marker.
pub fn is_group_bet(text: &str) -> bool {
    qualifies(text) && GROUP_MARKER_RE.is_match(text)
}

/// Amount right after the literal ` Returns $`
pub fn amount_after_returns(text: &str) -> Option<Decimal> {
    RETURNS_AMOUNT_RE
        .captures(text)
        .and_then(|c| parse_amount(&c[1]))
}

/// Best guess at the stake in free text.
///
/// Prefers the last dollar amount before the word `Returns`; without one,
/// takes the smallest dollar amount anywhere.
pub fn infer_stake(text: &str) -> Option<Decimal> {
    let amounts: Vec<(usize, Decimal)> = DOLLAR_RE
        .captures_iter(text)
        .filter_map(|c| {
            let start = c.get(0)?.start();
            parse_amount(&c[1]).map(|v| (start, v))
        })
        .collect();

    if amounts.is_empty() {
        return None;
    }

    if let Some(returns_at) = text.find(RETURNS_WORD) {
        if let Some((_, stake)) = amounts.iter().rev().find(|(pos, _)| *pos < returns_at) {
            return Some(*stake);
        }
    }

    amounts.iter().map(|(_, v)| *v).min()
}

/// `$12.50` (surrounding whitespace allowed) and nothing else
pub fn parse_exact_amount(text: &str) -> Option<Decimal> {
    EXACT_AMOUNT_RE
        .captures(text.trim())
        .and_then(|c| parse_amount(&c[1]))
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned = raw.replace(',', "");
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    Decimal::from_str(cleaned).ok()
}

/// Parser for the full structured bet line; knows which codes mean what.
#[derive(Debug, Clone)]
pub struct BetParser {
    group_code: String,
    individual_code: Option<String>,
}

impl Default for BetParser {
    fn default() -> Self {
        Self::new("GB", None)
    }
}

impl BetParser {
    pub fn new(group_code: &str, individual_code: Option<&str>) -> Self {
        Self {
            group_code: group_code.trim().to_uppercase(),
            individual_code: individual_code.map(|c| c.trim().to_uppercase()),
        }
    }

    pub fn from_config(config: &crate::config::VotingConfig) -> Self {
        Self::new(&config.group_code, config.individual_code.as_deref())
    }

    pub fn kind_for_code(&self, code: &str) -> BetKind {
        let code = code.to_uppercase();
        if code == self.group_code {
            return BetKind::Group;
        }
        match &self.individual_code {
            Some(individual) if *individual == code => BetKind::Individual,
            Some(_) => BetKind::Unknown,
            None => BetKind::Individual,
        }
    }

    /// Structured parse of `<code> <handle> <market> <odds> $<stake> Returns $<amount>`
    pub fn parse(&self, text: &str) -> Option<BetAnnouncement> {
        let caps = BET_LINE_RE.captures(text)?;
        let initials = caps[1].to_uppercase();
        let market = caps[3].trim().to_string();
        if market.is_empty() {
            return None;
        }

        Some(BetAnnouncement {
            kind: self.kind_for_code(&initials),
            initials,
            bettor: caps[2].to_string(),
            market,
            odds: parse_amount(&caps[4])?,
            stake: parse_amount(&caps[5])?,
            returns_amount: parse_amount(&caps[6])?,
        })
    }
}
