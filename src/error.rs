// Error taxonomy for the scoring core
//
// Everything except `Persistence` is an input problem: the command handler turns
// it into a reply and nothing is committed. `Persistence` means the durable
// state could not be written and must reach the operator.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("Player already exists or name is empty: {0:?}")]
    DuplicatePlayer(String),

    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("Cannot start a round without players")]
    EmptyRoster,

    #[error("No open round to submit scores for")]
    NoOpenRound,

    #[error("Unknown player code: {0:?}")]
    UnknownPlayerCode(String),

    #[error("Malformed score line: {0:?}")]
    MalformedScoreLine(String),

    #[error("No score lines found")]
    NoScoresFound,

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl ScoreError {
    /// Recoverable errors are answered with a message; the rest are fatal.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }

    /// Errors produced while reading a score submission.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownPlayerCode(_) | Self::MalformedScoreLine(_) | Self::NoScoresFound
        )
    }

    pub fn persistence(err: anyhow::Error) -> Self {
        Self::Persistence(format!("{:#}", err))
    }
}
