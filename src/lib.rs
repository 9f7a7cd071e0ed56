// Tile Scorekeeper - Core Library
// Exposes the scoring engine for the terminal console, HTTP server, and tests

pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod history;
pub mod manager;
pub mod notify;
pub mod parser;
pub mod players;
pub mod report;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use display::{Action, MenuItem, MenuOption, Reply};
pub use error::{Result, ScoreError};
pub use export::{export_csv, write_csv};
pub use history::{GameRecord, HistoryStore, DATE_FORMAT};
pub use manager::{Command, InputMode, SessionManager};
pub use notify::{FileSink, LogSink, NotificationSink};
pub use parser::{initial_of, parse_scores, ScoreEntry, FORMAT_HINT};
pub use players::PlayerRegistry;
pub use report::{Report, ReportGenerator, RoundSummary, DEFAULT_REPORT_LIMIT};
pub use session::{determine_winner, RoundPrompt, RoundState, ScoringSession};
pub use storage::{
    open_storage, JsonFileStorage, MemoryStorage, PersistedState, SqliteStorage, Storage,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
