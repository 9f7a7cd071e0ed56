// 🖼️ Display payloads - what the core hands back to a transport
//
// Plain data only: text plus selectable options. Each option carries an
// encoded action string that the transport returns verbatim as a callback.

use serde::{Deserialize, Serialize};

// ============================================================================
// MENU + ACTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuItem {
    ManagePlayers,
    NewGame,
    Report,
}

impl MenuItem {
    pub fn label(&self) -> &'static str {
        match self {
            MenuItem::ManagePlayers => "1. Manage players",
            MenuItem::NewGame => "2. New game",
            MenuItem::Report => "3. Report",
        }
    }
}

/// Button action, encoded into the option's callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Menu(MenuItem),
    PromptAddPlayer,
    PromptRemovePlayer,
    RemovePlayer(String),
}

const REMOVE_PREFIX: &str = "del:";

impl Action {
    pub fn encode(&self) -> String {
        match self {
            Action::Menu(MenuItem::ManagePlayers) => "manage_players".to_string(),
            Action::Menu(MenuItem::NewGame) => "new_game".to_string(),
            Action::Menu(MenuItem::Report) => "report".to_string(),
            Action::PromptAddPlayer => "add_player".to_string(),
            Action::PromptRemovePlayer => "remove_player".to_string(),
            // Names may contain anything, including the prefix itself
            Action::RemovePlayer(name) => format!("{}{}", REMOVE_PREFIX, urlencoding::encode(name)),
        }
    }

    pub fn decode(data: &str) -> Option<Self> {
        match data {
            "manage_players" => Some(Action::Menu(MenuItem::ManagePlayers)),
            "new_game" => Some(Action::Menu(MenuItem::NewGame)),
            "report" => Some(Action::Menu(MenuItem::Report)),
            "add_player" => Some(Action::PromptAddPlayer),
            "remove_player" => Some(Action::PromptRemovePlayer),
            _ => {
                let encoded = data.strip_prefix(REMOVE_PREFIX)?;
                let name = urlencoding::decode(encoded).ok()?;
                Some(Action::RemovePlayer(name.into_owned()))
            }
        }
    }
}

// ============================================================================
// REPLY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub label: String,
    /// Encoded `Action`
    pub data: String,
}

impl MenuOption {
    pub fn new(label: impl Into<String>, action: &Action) -> Self {
        MenuOption {
            label: label.into(),
            data: action.encode(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<MenuOption>,

    /// The command was rejected; nothing was committed
    #[serde(default)]
    pub rejected: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn rejected(text: impl Into<String>) -> Self {
        Reply {
            text: text.into(),
            rejected: true,
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: Vec<MenuOption>) -> Self {
        self.options = options;
        self
    }
}

pub fn main_menu() -> Vec<MenuOption> {
    [MenuItem::ManagePlayers, MenuItem::NewGame, MenuItem::Report]
        .into_iter()
        .map(|item| MenuOption::new(item.label(), &Action::Menu(item)))
        .collect()
}

pub fn players_menu() -> Vec<MenuOption> {
    vec![
        MenuOption::new("Add player", &Action::PromptAddPlayer),
        MenuOption::new("Remove player", &Action::PromptRemovePlayer),
    ]
}

pub fn removal_menu(players: &[String]) -> Vec<MenuOption> {
    players
        .iter()
        .map(|name| MenuOption::new(name.clone(), &Action::RemovePlayer(name.clone())))
        .collect()
}

// ============================================================================
// TRANSPORT FORMATTING
// ============================================================================

/// Escape reply text for a chat transport that renders HTML markup. The
/// console and the JSON server send plain text and leave it alone.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
