// 📊 Report Generator - read-only view of recent rounds

use crate::history::{GameRecord, HistoryStore};
use serde::Serialize;

/// Rounds shown when no limit is configured
pub const DEFAULT_REPORT_LIMIT: usize = 3;

pub const NO_ROUNDS_TEXT: &str = "No rounds have been played yet.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultLine {
    pub player: String,
    pub detail: String,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    pub date: String,
    pub winner: String,
    pub results: Vec<ResultLine>,
}

impl From<&GameRecord> for RoundSummary {
    fn from(record: &GameRecord) -> Self {
        RoundSummary {
            date: record.date_stamp(),
            winner: record.winner.clone(),
            results: record
                .results
                .iter()
                .map(|entry| ResultLine {
                    player: entry.player.clone(),
                    detail: entry.detail.clone(),
                    total: entry.total,
                })
                .collect(),
        }
    }
}

impl RoundSummary {
    /// Round announcement: headline, one line per player, congratulations
    pub fn to_text(&self) -> String {
        let mut text = format!("{}: today's winner is {}\n\nResults:\n", self.date, self.winner);
        for line in &self.results {
            text.push_str(&format!("{}: {} = {}\n", line.player, line.detail, line.total));
        }
        text.push_str(&format!("\nCongratulations, {}!", self.winner));
        text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    NoRounds,

    /// Oldest first
    Rounds { rounds: Vec<RoundSummary> },
}

impl Report {
    pub fn is_empty(&self) -> bool {
        matches!(self, Report::NoRounds)
    }

    pub fn to_text(&self) -> String {
        match self {
            Report::NoRounds => NO_ROUNDS_TEXT.to_string(),
            Report::Rounds { rounds } => {
                let blocks: Vec<String> = rounds.iter().map(RoundSummary::to_text).collect();
                format!("Last {} round(s):\n\n{}", rounds.len(), blocks.join("\n\n---\n\n"))
            }
        }
    }
}

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn render(history: &HistoryStore, limit: usize) -> Report {
        Self::render_records(history.recent(limit))
    }

    pub fn render_records(records: &[GameRecord]) -> Report {
        if records.is_empty() {
            return Report::NoRounds;
        }

        Report::Rounds {
            rounds: records.iter().map(RoundSummary::from).collect(),
        }
    }
}
