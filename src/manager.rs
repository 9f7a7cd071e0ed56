// 🧭 Session Manager - one object holding all scorekeeper state
//
// Transports deliver one command at a time and render the returned `Reply`.
// Input errors come back as rejected replies; only persistence failures
// escape as `Err`.

use crate::config::Config;
use crate::display::{main_menu, players_menu, removal_menu, Action, MenuItem, Reply};
use crate::error::{Result, ScoreError};
use crate::history::HistoryStore;
use crate::notify::{FileSink, LogSink, NotificationSink};
use crate::parser::FORMAT_HINT;
use crate::players::PlayerRegistry;
use crate::report::{Report, ReportGenerator, RoundSummary};
use crate::session::{RoundPrompt, ScoringSession};
use crate::storage::open_storage;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

// ============================================================================
// INBOUND COMMANDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum Command {
    StartSession,
    SelectMenu(MenuItem),
    PromptAddPlayer,
    PromptRemovePlayer,
    AddPlayer(String),
    RemovePlayer(String),
    SubmitScores(String),
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        match action {
            Action::Menu(item) => Command::SelectMenu(item),
            Action::PromptAddPlayer => Command::PromptAddPlayer,
            Action::PromptRemovePlayer => Command::PromptRemovePlayer,
            Action::RemovePlayer(name) => Command::RemovePlayer(name),
        }
    }
}

/// Where the next free-text message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Menu,
    AwaitingPlayerName,
}

// ============================================================================
// SESSION MANAGER
// ============================================================================

pub struct SessionManager {
    registry: PlayerRegistry,
    session: ScoringSession,
    history: HistoryStore,
    sinks: Vec<Box<dyn NotificationSink>>,
    input: InputMode,
    report_limit: usize,
    clock: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl SessionManager {
    /// Build around an already loaded history; the roster comes from it
    pub fn new(history: HistoryStore) -> Self {
        let registry = PlayerRegistry::from_names(history.players().to_vec());

        SessionManager {
            registry,
            session: ScoringSession::new(),
            history,
            sinks: Vec::new(),
            input: InputMode::Menu,
            report_limit: crate::report::DEFAULT_REPORT_LIMIT,
            clock: local_today,
        }
    }

    /// Open storage and sinks as configured
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let storage = open_storage(&config.data_path)?;
        let history = HistoryStore::load(storage)?;

        let mut manager = SessionManager::new(history).with_report_limit(config.report_limit)?;
        if let Some(path) = &config.broadcast_log {
            manager = manager.with_sink(Box::new(FileSink::new(path)));
        }
        if config.broadcast_to_log {
            manager = manager.with_sink(Box::new(LogSink));
        }

        Ok(manager)
    }

    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        debug!(sink = sink.name(), "Broadcast sink attached");
        self.sinks.push(sink);
        self
    }

    /// Rounds shown by the report; `0` is rejected like in the config file
    pub fn with_report_limit(mut self, limit: usize) -> anyhow::Result<Self> {
        if limit == 0 {
            anyhow::bail!("report_limit must be at least 1");
        }
        self.report_limit = limit;
        Ok(self)
    }

    /// Date source for round stamps
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    // ========================================================================
    // ENTRY POINTS
    // ========================================================================

    /// Run one command. Rejections become replies; `Persistence` is returned.
    pub fn handle(&mut self, command: Command) -> Result<Reply> {
        debug!(?command, "Handling command");

        let result = match command {
            Command::StartSession => Ok(self.start_session()),
            Command::SelectMenu(MenuItem::ManagePlayers) => Ok(self.manage_players()),
            Command::SelectMenu(MenuItem::NewGame) => self.new_game(),
            Command::SelectMenu(MenuItem::Report) => Ok(self.report_reply()),
            Command::PromptAddPlayer => Ok(self.prompt_add_player()),
            Command::PromptRemovePlayer => Ok(self.prompt_remove_player()),
            Command::AddPlayer(name) => self.add_player(&name),
            Command::RemovePlayer(name) => self.remove_player(&name),
            Command::SubmitScores(text) => self.submit_scores(&text),
        };

        match result {
            Ok(reply) => Ok(reply),
            Err(err) if err.is_recoverable() => {
                debug!(error = %err, "Command rejected");
                Ok(self.rejection(&err))
            }
            Err(err) => {
                error!(error = %err, "Failed to persist scorekeeper state");
                Err(err)
            }
        }
    }

    /// Route free text by the current state: pending name prompt first, then
    /// an open round, else a pointer back to the menu
    pub fn handle_text(&mut self, text: &str) -> Result<Reply> {
        if self.input == InputMode::AwaitingPlayerName {
            return self.handle(Command::AddPlayer(text.to_string()));
        }

        if self.session.is_open() {
            return self.handle(Command::SubmitScores(text.to_string()));
        }

        Ok(Reply::rejected("Please choose an option from the menu.").with_options(main_menu()))
    }

    /// Decode button callback data and run it
    pub fn handle_callback(&mut self, data: &str) -> Result<Reply> {
        match Action::decode(data) {
            Some(action) => self.handle(action.into()),
            None => {
                warn!(data = %data, "Unknown callback data");
                Ok(Reply::rejected("Unknown action.").with_options(main_menu()))
            }
        }
    }

    // ========================================================================
    // HANDLERS
    // ========================================================================

    fn start_session(&mut self) -> Reply {
        self.input = InputMode::Menu;
        Reply::text("Welcome to the admin panel!").with_options(main_menu())
    }

    fn manage_players(&mut self) -> Reply {
        self.input = InputMode::Menu;

        let text = if self.registry.is_empty() {
            "Manage players\n\nNo players yet.".to_string()
        } else {
            format!("Manage players\n\nPlayers: {}", self.registry.list().join(", "))
        };

        Reply::text(text).with_options(players_menu())
    }

    fn prompt_add_player(&mut self) -> Reply {
        self.input = InputMode::AwaitingPlayerName;
        Reply::text("Send the player's name:")
    }

    fn prompt_remove_player(&mut self) -> Reply {
        self.input = InputMode::Menu;

        if self.registry.is_empty() {
            return Reply::text("No players yet.").with_options(players_menu());
        }

        Reply::text("Which player should be removed?").with_options(removal_menu(self.registry.list()))
    }

    fn add_player(&mut self, name: &str) -> Result<Reply> {
        let added = self.registry.add(name, &mut self.history)?;
        self.input = InputMode::Menu;
        Ok(Reply::text(format!("{} added!", added)).with_options(main_menu()))
    }

    fn remove_player(&mut self, name: &str) -> Result<Reply> {
        let removed = self.registry.remove(name, &mut self.history)?;
        self.input = InputMode::Menu;
        Ok(Reply::text(format!("{} removed.", removed)).with_options(main_menu()))
    }

    fn new_game(&mut self) -> Result<Reply> {
        self.input = InputMode::Menu;
        let prompt = self.session.start_round(self.registry.list())?;
        Ok(Reply::text(self.round_prompt_text(&prompt)))
    }

    fn round_prompt_text(&self, prompt: &RoundPrompt) -> String {
        let mut text = String::from("New game started. Send the results, one line per player:\n");
        for participant in &prompt.participants {
            text.push_str(&format!("{} = {}\n", participant.initial, participant.name));
        }
        text.push_str(&format!("\nFormat: {}", prompt.format_hint));

        for (initial, names) in self.registry.shared_initials() {
            if let Some(last) = names.last() {
                text.push_str(&format!(
                    "\nNote: {} is shared by {}; lines for {} count for {}.",
                    initial,
                    names.join(", "),
                    initial,
                    last
                ));
            }
        }

        text
    }

    fn report_reply(&mut self) -> Reply {
        self.input = InputMode::Menu;
        Reply::text(self.report().to_text()).with_options(main_menu())
    }

    fn submit_scores(&mut self, text: &str) -> Result<Reply> {
        let record = self.session.submit(text, (self.clock)(), &mut self.history)?;

        let announcement = RoundSummary::from(&record).to_text();
        self.broadcast(&announcement);

        Ok(Reply::text(announcement).with_options(main_menu()))
    }

    /// Push to every sink after commit; failures are only logged
    fn broadcast(&mut self, text: &str) {
        for sink in &mut self.sinks {
            match sink.push(text) {
                Ok(()) => debug!(sink = sink.name(), "Round broadcast"),
                Err(err) => warn!(sink = sink.name(), error = %format!("{:#}", err), "Broadcast failed"),
            }
        }
    }

    fn rejection(&self, err: &ScoreError) -> Reply {
        match err {
            err if err.is_parse_error() => Reply::rejected(format!(
                "{}\nPlease resend the results, one line per player. Format: {}",
                err, FORMAT_HINT
            )),
            ScoreError::DuplicatePlayer(name) if name.is_empty() => {
                Reply::rejected("The name must not be empty. Send the player's name:")
            }
            ScoreError::DuplicatePlayer(name) => Reply::rejected(format!(
                "{} is already on the roster. Send another name:",
                name
            )),
            ScoreError::PlayerNotFound(name) => {
                Reply::rejected(format!("{} is not on the roster.", name)).with_options(main_menu())
            }
            ScoreError::EmptyRoster => {
                Reply::rejected("Add players before starting a game.").with_options(players_menu())
            }
            ScoreError::NoOpenRound => {
                Reply::rejected("No game is open. Start a new game from the menu.")
                    .with_options(main_menu())
            }
            _ => Reply::rejected(err.to_string()),
        }
    }

    // ========================================================================
    // READ ACCESS
    // ========================================================================

    pub fn report(&self) -> Report {
        ReportGenerator::render(&self.history, self.report_limit)
    }

    pub fn players(&self) -> &[String] {
        self.registry.list()
    }

    pub fn session(&self) -> &ScoringSession {
        &self.session
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn input_mode(&self) -> InputMode {
        self.input
    }
}

// ============================================================================
// TESTS
// ============================================================================
