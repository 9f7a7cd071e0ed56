// 🎲 Scoring Session - one round at a time
//
// Idle --start_round--> Open --submit(ok)--> Idle
//                        |  \--submit(err)--> Open (resend expected)
//                        \--start_round--> Open (fresh snapshot)

use crate::error::{Result, ScoreError};
use crate::history::{GameRecord, HistoryStore};
use crate::parser::{initial_of, parse_scores, ScoreEntry, FORMAT_HINT};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

// ============================================================================
// ROUND STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundState {
    Idle,

    /// Round accepting a submission for this roster snapshot
    Open { roster: Vec<String> },
}

/// Participant line shown when a round opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub name: String,
    pub initial: String,
}

/// What the transport shows when a round opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundPrompt {
    pub participants: Vec<Participant>,
    pub format_hint: &'static str,
}

impl RoundPrompt {
    fn for_roster(roster: &[String]) -> Self {
        RoundPrompt {
            participants: roster
                .iter()
                .map(|name| Participant {
                    name: name.clone(),
                    initial: initial_of(name).unwrap_or_default(),
                })
                .collect(),
            format_hint: FORMAT_HINT,
        }
    }
}

// ============================================================================
// WINNER
// ============================================================================

/// Strictly greatest total; on a tie the first entry seen keeps the lead
pub fn determine_winner(entries: &[ScoreEntry]) -> Option<&ScoreEntry> {
    entries.iter().fold(None, |best, entry| match best {
        Some(current) if entry.total <= current.total => Some(current),
        _ => Some(entry),
    })
}

/// Build the immutable record for a parsed batch
pub fn finalize(entries: Vec<ScoreEntry>, date: NaiveDate) -> Option<GameRecord> {
    let winner = determine_winner(&entries)?.player.clone();
    Some(GameRecord {
        date,
        results: entries,
        winner,
    })
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScoringSession {
    state: RoundState,
}

impl ScoringSession {
    pub fn new() -> Self {
        ScoringSession {
            state: RoundState::Idle,
        }
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, RoundState::Open { .. })
    }

    /// Roster snapshot of the open round
    pub fn roster(&self) -> Option<&[String]> {
        match &self.state {
            RoundState::Open { roster } => Some(roster),
            RoundState::Idle => None,
        }
    }

    /// Open a round against a snapshot of `roster`. An already open round is
    /// discarded without notice.
    pub fn start_round(&mut self, roster: &[String]) -> Result<RoundPrompt> {
        if roster.is_empty() {
            return Err(ScoreError::EmptyRoster);
        }

        if self.is_open() {
            debug!("Discarding open round for a fresh start");
        }

        self.state = RoundState::Open {
            roster: roster.to_vec(),
        };

        info!(participants = roster.len(), "Round opened");
        Ok(RoundPrompt::for_roster(roster))
    }

    /// Parse, finalize and append, stamping the round with `date`. Any failure
    /// keeps the round open.
    pub fn submit(
        &mut self,
        text: &str,
        date: NaiveDate,
        history: &mut HistoryStore,
    ) -> Result<GameRecord> {
        let roster = self.roster().ok_or(ScoreError::NoOpenRound)?;

        let entries = parse_scores(text, roster).map_err(|err| {
            warn!(error = %err, "Score submission rejected");
            err
        })?;

        let record = finalize(entries, date).ok_or(ScoreError::NoScoresFound)?;
        history.append(record.clone())?;
        self.state = RoundState::Idle;

        info!(
            winner = %record.winner,
            entries = record.results.len(),
            date = %record.date_stamp(),
            "Round finalized"
        );
        Ok(record)
    }
}

impl Default for ScoringSession {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
