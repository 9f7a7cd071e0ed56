//! End-to-end chat flow: only text messages and button presses, the way a
//! transport drives the manager.

use chrono::NaiveDate;
use tile_scorekeeper::{
    Command, HistoryStore, InputMode, MemoryStorage, NotificationSink, Reply, SessionManager,
};
use std::sync::{Arc, Mutex};

fn fixed_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()
}

fn chat() -> (SessionManager, MemoryStorage) {
    let storage = MemoryStorage::default();
    let history = HistoryStore::load(Box::new(storage.clone())).unwrap();
    let manager = SessionManager::new(history).with_clock(fixed_day);
    (manager, storage)
}

/// Press the option whose label starts with `label`
fn press(manager: &mut SessionManager, reply: &Reply, label: &str) -> Reply {
    let option = reply
        .options
        .iter()
        .find(|o| o.label.starts_with(label))
        .unwrap_or_else(|| panic!("no option {:?} in {:?}", label, reply.options));
    manager.handle_callback(&option.data).unwrap()
}

fn add_via_menu(manager: &mut SessionManager, name: &str) -> Reply {
    let menu = manager.handle(Command::StartSession).unwrap();
    let players = press(manager, &menu, "1. Manage players");
    let prompt = press(manager, &players, "Add player");
    assert_eq!(manager.input_mode(), InputMode::AwaitingPlayerName);
    assert!(prompt.options.is_empty());
    manager.handle_text(name).unwrap()
}

#[derive(Clone, Default)]
struct Outbox(Arc<Mutex<Vec<String>>>);

impl NotificationSink for Outbox {
    fn name(&self) -> &str {
        "outbox"
    }

    fn push(&mut self, text: &str) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[test]
fn test_full_evening() {
    let (manager, storage) = chat();
    let outbox = Outbox::default();
    let mut manager = manager.with_sink(Box::new(outbox.clone()));

    for name in ["Bobur", "Farrux", "Murod"] {
        let reply = add_via_menu(&mut manager, name);
        assert_eq!(reply.text, format!("{} added!", name));
        assert_eq!(manager.input_mode(), InputMode::Menu);
    }

    let menu = manager.handle(Command::StartSession).unwrap();
    let prompt = press(&mut manager, &menu, "2. New game");
    assert!(prompt.text.contains("B = Bobur"));
    assert!(prompt.text.contains("F = Farrux"));
    assert!(prompt.text.contains("M = Murod"));
    assert!(prompt.text.contains("B:19+78+17"));

    let announcement = manager
        .handle_text("B:19+78+17\nF:17+11+25\nM:27+25+20")
        .unwrap();

    assert!(!announcement.rejected);
    assert!(announcement.text.starts_with("08.03.2025: today's winner is Bobur"));
    assert!(announcement.text.contains("Farrux: 17+11+25 = 53"));
    assert!(announcement.text.ends_with("Congratulations, Bobur!"));
    assert!(!manager.session().is_open());

    assert_eq!(outbox.0.lock().unwrap().as_slice(), &[announcement.text.clone()]);

    let report = press(&mut manager, &announcement, "3. Report");
    assert!(report.text.starts_with("Last 1 round(s):"));
    assert!(report.text.contains("Murod: 27+25+20 = 72"));

    let saved = storage.snapshot().unwrap();
    assert_eq!(saved.players, ["Bobur", "Farrux", "Murod"]);
    assert_eq!(saved.games.len(), 1);
}

#[test]
fn test_free_text_outside_any_flow_points_to_menu() {
    let (mut manager, storage) = chat();

    let reply = manager.handle_text("hello").unwrap();

    assert!(reply.rejected);
    assert_eq!(reply.options.len(), 3);
    assert!(storage.snapshot().is_none());
}

#[test]
fn test_bad_score_lines_keep_round_open_until_valid() {
    let (mut manager, _storage) = chat();
    add_via_menu(&mut manager, "Ali");
    add_via_menu(&mut manager, "Vali");
    manager.handle(Command::SelectMenu(tile_scorekeeper::MenuItem::NewGame)).unwrap();

    let unknown = manager.handle_text("X:10").unwrap();
    assert!(unknown.rejected);
    assert!(manager.session().is_open());

    let malformed = manager.handle_text("A:10+ten").unwrap();
    assert!(malformed.rejected);
    assert!(manager.session().is_open());

    let noise = manager.handle_text("no scores here").unwrap();
    assert!(noise.rejected);
    assert!(manager.session().is_open());
    assert!(manager.history().is_empty());

    // Only Ali reports; the round still finalizes
    let accepted = manager.handle_text("a: 5 + 6").unwrap();
    assert!(!accepted.rejected);
    assert!(accepted.text.contains("Ali: 5+6 = 11"));
    assert_eq!(manager.history().len(), 1);
}

#[test]
fn test_remove_player_through_buttons() {
    let (mut manager, storage) = chat();
    add_via_menu(&mut manager, "Dilnoza: the 2nd");
    add_via_menu(&mut manager, "Sardor");

    let menu = manager.handle(Command::StartSession).unwrap();
    let players = press(&mut manager, &menu, "1. Manage players");
    assert!(players.text.contains("Dilnoza: the 2nd, Sardor"));

    let choices = press(&mut manager, &players, "Remove player");
    assert_eq!(choices.options.len(), 2);

    let removed = press(&mut manager, &choices, "Dilnoza");
    assert_eq!(removed.text, "Dilnoza: the 2nd removed.");
    assert_eq!(storage.snapshot().unwrap().players, ["Sardor"]);
}

#[test]
fn test_duplicate_name_keeps_asking() {
    let (mut manager, _storage) = chat();
    add_via_menu(&mut manager, "Bobur");

    let again = add_via_menu(&mut manager, "  Bobur ");
    assert!(again.rejected);
    assert_eq!(manager.input_mode(), InputMode::AwaitingPlayerName);

    let next = manager.handle_text("Botir").unwrap();
    assert_eq!(next.text, "Botir added!");
    assert_eq!(manager.players(), ["Bobur", "Botir"]);
}

#[test]
fn test_shared_initial_is_flagged_in_round_prompt() {
    let (mut manager, _storage) = chat();
    add_via_menu(&mut manager, "Bobur");
    add_via_menu(&mut manager, "Botir");

    let prompt = manager
        .handle(Command::SelectMenu(tile_scorekeeper::MenuItem::NewGame))
        .unwrap();
    assert!(prompt.text.contains("lines for B count for Botir"));

    let reply = manager.handle_text("B:40").unwrap();
    assert!(reply.text.contains("today's winner is Botir"));
}

#[test]
fn test_new_game_without_players_is_rejected() {
    let (mut manager, _storage) = chat();

    let reply = manager
        .handle(Command::SelectMenu(tile_scorekeeper::MenuItem::NewGame))
        .unwrap();

    assert!(reply.rejected);
    assert!(!manager.session().is_open());
    assert!(reply.options.iter().any(|o| o.label == "Add player"));
}

#[test]
fn test_unknown_callback_is_rejected() {
    let (mut manager, _storage) = chat();

    let reply = manager.handle_callback("launch_rockets").unwrap();

    assert!(reply.rejected);
    assert_eq!(reply.options.len(), 3);
}

#[test]
fn test_commands_round_trip_as_json() {
    let command: Command =
        serde_json::from_str(r#"{"command":"submit_scores","value":"B:1"}"#).unwrap();
    assert_eq!(command, Command::SubmitScores("B:1".into()));

    let command: Command = serde_json::from_str(r#"{"command":"start_session"}"#).unwrap();
    assert_eq!(command, Command::StartSession);
}
