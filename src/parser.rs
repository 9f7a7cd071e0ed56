// 🧮 Score Line Parser
// Turns a chat text block like "B:19+78+17" into per-player score entries

use crate::error::{Result, ScoreError};
use serde::Serialize;
use std::collections::HashMap;

/// Separates the player code from the score string on one line
pub const SEPARATOR: char = ':';

/// Separates the summands inside a score string
pub const SUMMAND_SEPARATOR: char = '+';

/// Example line shown to players whenever input has to be resent
pub const FORMAT_HINT: &str = "B:19+78+17";

// ============================================================================
// SCORE ENTRY
// ============================================================================

/// One player's result for a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreEntry {
    pub player: String,

    /// Score string exactly as submitted (without whitespace)
    pub detail: String,

    pub summands: Vec<i64>,

    /// Always the exact sum of `summands`
    pub total: i64,
}

impl ScoreEntry {
    /// Build an entry from a detail string, `None` if it isn't `<int>(+<int>)*`
    pub fn from_detail(player: &str, detail: &str) -> Option<Self> {
        let summands = parse_summands(detail)?;
        let total = checked_total(&summands)?;

        Some(ScoreEntry {
            player: player.to_string(),
            detail: detail.to_string(),
            summands,
            total,
        })
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Upper-cased first character of a name, the code used in score lines
pub fn initial_of(name: &str) -> Option<String> {
    name.trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
}

/// Split a score string on `+` and parse every token as an integer
pub fn parse_summands(detail: &str) -> Option<Vec<i64>> {
    if detail.is_empty() {
        return None;
    }

    detail
        .split(SUMMAND_SEPARATOR)
        .map(|token| token.parse::<i64>().ok())
        .collect()
}

fn checked_total(summands: &[i64]) -> Option<i64> {
    summands
        .iter()
        .try_fold(0i64, |acc, value| acc.checked_add(*value))
}

/// Initial → player name lookup; on a shared initial the later name wins
fn initial_table(roster: &[String]) -> HashMap<String, &str> {
    let mut table = HashMap::new();
    for name in roster {
        if let Some(initial) = initial_of(name) {
            table.insert(initial, name.as_str());
        }
    }
    table
}

// ============================================================================
// PARSER
// ============================================================================

/// Parse a submission block against a roster.
///
/// Lines without a `:` are skipped as noise. Entries come back in the order
/// their player first appeared; a later line for the same player replaces the
/// earlier values in place.
pub fn parse_scores(text: &str, roster: &[String]) -> Result<Vec<ScoreEntry>> {
    let table = initial_table(roster);
    let mut entries: Vec<ScoreEntry> = Vec::new();

    let lines = text
        .trim()
        .lines()
        .map(|line| line.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|line| !line.is_empty());

    for line in lines {
        let Some((code, score_string)) = line.split_once(SEPARATOR) else {
            continue;
        };

        let player = table
            .get(&code.to_uppercase())
            .copied()
            .ok_or_else(|| ScoreError::UnknownPlayerCode(code.to_string()))?;

        let entry = ScoreEntry::from_detail(player, score_string)
            .ok_or_else(|| ScoreError::MalformedScoreLine(line.clone()))?;

        match entries.iter_mut().find(|existing| existing.player == entry.player) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    if entries.is_empty() {
        return Err(ScoreError::NoScoresFound);
    }

    Ok(entries)
}

// ============================================================================
// TESTS
// ============================================================================
