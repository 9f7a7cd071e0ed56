// 💾 Storage - durable medium for roster + history
//
// Every save writes the FULL state (players and all games), never a delta.
// Two backends: a pretty JSON snapshot file and a SQLite database (WAL).

use crate::history::{GameRecord, DATE_FORMAT};
use crate::parser::{parse_summands, ScoreEntry};
use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Logical layout of everything that survives a restart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Unique names, insertion order
    #[serde(default)]
    pub players: Vec<String>,

    /// Chronological order
    #[serde(default)]
    pub games: Vec<GameRecord>,
}

impl PersistedState {
    /// Check what every loaded state must hold: a clean roster, and records
    /// whose totals match their details and whose winner is among the results
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for name in &self.players {
            if name.trim().is_empty() || name.trim() != name {
                bail!("Invalid player name {:?}", name);
            }
            if !seen.insert(name.as_str()) {
                bail!("Player {:?} listed twice", name);
            }
        }

        for (index, game) in self.games.iter().enumerate() {
            validate_game(game)
                .with_context(|| format!("Invalid game #{} ({})", index + 1, game.date_stamp()))?;
        }

        Ok(())
    }
}

fn validate_game(game: &GameRecord) -> Result<()> {
    if game.results.is_empty() {
        bail!("no results");
    }

    let mut seen = HashSet::new();
    for entry in &game.results {
        if !seen.insert(entry.player.as_str()) {
            bail!("{} has two results", entry.player);
        }

        let expected = ScoreEntry::from_detail(&entry.player, &entry.detail)
            .ok_or_else(|| anyhow!("{}: detail {:?} is not a score", entry.player, entry.detail))?;
        if expected.summands != entry.summands || expected.total != entry.total {
            bail!(
                "{}: total {} does not match {:?} = {}",
                entry.player,
                entry.total,
                entry.detail,
                expected.total
            );
        }
    }

    let winner = game
        .winning_entry()
        .ok_or_else(|| anyhow!("winner {:?} has no result", game.winner))?;
    if game.results.iter().any(|entry| entry.total > winner.total) {
        bail!("winner {:?} does not hold the highest total", game.winner);
    }

    Ok(())
}

pub trait Storage: Send {
    /// `None` means nothing was ever saved
    fn load(&self) -> Result<Option<PersistedState>>;

    fn save(&mut self, state: &PersistedState) -> Result<()>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Pick a backend from the data path: `.db`/`.sqlite`/`.sqlite3` → SQLite,
/// `:memory:` → process memory, anything else → JSON file
pub fn open_storage(path: &Path) -> Result<Box<dyn Storage>> {
    if path.as_os_str() == ":memory:" {
        return Ok(Box::new(MemoryStorage::default()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("db") | Some("sqlite") | Some("sqlite3") => Ok(Box::new(SqliteStorage::open(path)?)),
        _ => Ok(Box::new(JsonFileStorage::new(path))),
    }
}

// ============================================================================
// MEMORY
// ============================================================================

/// Nothing survives the process; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<PersistedState>>>,
}

impl MemoryStorage {
    /// Last saved state
    pub fn snapshot(&self) -> Option<PersistedState> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Option<PersistedState>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("Memory storage lock poisoned"))?;
        Ok(slot.clone())
    }

    fn save(&mut self, state: &PersistedState) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("Memory storage lock poisoned"))?;
        *slot = Some(state.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// ============================================================================
// JSON FILE
// ============================================================================

pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        JsonFileStorage {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {:?}", self.path))?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        let state = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {:?}", self.path))?;

        Ok(Some(state))
    }

    fn save(&mut self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;

        // Write aside, then rename over the target
        let temp = self.temp_path();
        fs::write(&temp, json).with_context(|| format!("Failed to write {:?}", temp))?;
        fs::rename(&temp, &self.path)
            .with_context(|| format!("Failed to replace state file: {:?}", self.path))?;

        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

// ============================================================================
// SQLITE
// ============================================================================

pub struct SqliteStorage {
    conn: Connection,
    label: String,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        setup_database(&conn)?;

        Ok(SqliteStorage {
            conn,
            label: format!("sqlite:{}", path.display()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;

        Ok(SqliteStorage {
            conn,
            label: "sqlite::memory:".to_string(),
        })
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS players (
            position INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS games (
            id INTEGER PRIMARY KEY,
            date TEXT NOT NULL,
            winner TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS results (
            game_id INTEGER NOT NULL REFERENCES games(id),
            position INTEGER NOT NULL,
            player TEXT NOT NULL,
            detail TEXT NOT NULL,
            total INTEGER NOT NULL,
            PRIMARY KEY (game_id, position)
        )",
        [],
    )?;

    Ok(())
}

impl Storage for SqliteStorage {
    fn load(&self) -> Result<Option<PersistedState>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM players ORDER BY position")?;
        let players = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT id, date, winner FROM games ORDER BY id")?;
        let game_rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if players.is_empty() && game_rows.is_empty() {
            return Ok(None);
        }

        let mut results_stmt = self.conn.prepare(
            "SELECT player, detail, total FROM results WHERE game_id = ?1 ORDER BY position",
        )?;

        let mut games = Vec::with_capacity(game_rows.len());
        for (id, date, winner) in game_rows {
            let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .with_context(|| format!("Invalid date {:?} in game {}", date, id))?;

            let rows = results_stmt
                .query_map(params![id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut results = Vec::with_capacity(rows.len());
            for (player, detail, total) in rows {
                let summands = parse_summands(&detail).ok_or_else(|| {
                    anyhow!("Invalid detail {:?} for {} in game {}", detail, player, id)
                })?;
                results.push(ScoreEntry {
                    player,
                    detail,
                    summands,
                    total,
                });
            }

            games.push(GameRecord {
                date,
                results,
                winner,
            });
        }

        Ok(Some(PersistedState { players, games }))
    }

    fn save(&mut self, state: &PersistedState) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM results", [])?;
        tx.execute("DELETE FROM games", [])?;
        tx.execute("DELETE FROM players", [])?;

        for (position, name) in state.players.iter().enumerate() {
            tx.execute(
                "INSERT INTO players (position, name) VALUES (?1, ?2)",
                params![position as i64, name],
            )?;
        }

        for (index, game) in state.games.iter().enumerate() {
            let game_id = index as i64 + 1;
            tx.execute(
                "INSERT INTO games (id, date, winner) VALUES (?1, ?2, ?3)",
                params![game_id, game.date_stamp(), game.winner],
            )?;

            for (position, entry) in game.results.iter().enumerate() {
                tx.execute(
                    "INSERT INTO results (game_id, position, player, detail, total)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![game_id, position as i64, entry.player, entry.detail, entry.total],
                )?;
            }
        }

        tx.commit().context("Failed to commit state")?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use tempfile::TempDir;

    fn sample_state() -> PersistedState {
        let game = GameRecord {
            date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            results: vec![
                ScoreEntry::from_detail("Murod", "27+25+20").unwrap(),
                ScoreEntry::from_detail("Bobur", "19+78+17").unwrap(),
            ],
            winner: "Bobur".to_string(),
        };

        PersistedState {
            players: vec!["Murod".to_string(), "Bobur".to_string(), "Farrux".to_string()],
            games: vec![game],
        }
    }

    #[test]
    fn test_json_missing_file_is_no_state() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("state.json"));
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let mut storage = JsonFileStorage::new(&path);

        storage.save(&sample_state()).unwrap();
        let loaded = JsonFileStorage::new(&path).load().unwrap().unwrap();

        assert_eq!(loaded, sample_state());
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[test]
    fn test_json_file_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        JsonFileStorage::new(&path).save(&sample_state()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(value["players"][1], "Bobur");
        assert_eq!(value["games"][0]["date"], "31.01.2025");
        assert_eq!(value["games"][0]["winner"], "Bobur");
        assert_eq!(value["games"][0]["results"]["Bobur"]["detail"], "19+78+17");
        assert_eq!(value["games"][0]["results"]["Bobur"]["total"], 114);
    }

    #[test]
    fn test_json_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(JsonFileStorage::new(&path).load().is_err());
    }

    #[test]
    fn test_sqlite_empty_is_no_state() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_sqlite_round_trip_keeps_order() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.save(&sample_state()).unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded, sample_state());
        assert_eq!(loaded.games[0].results[0].player, "Murod");
        assert_eq!(loaded.games[0].results[0].summands, vec![27, 25, 20]);
    }

    #[test]
    fn test_sqlite_save_replaces_full_state() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.save(&sample_state()).unwrap();

        let mut smaller = sample_state();
        smaller.players.truncate(1);
        storage.save(&smaller).unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.players, vec!["Murod".to_string()]);
        assert_eq!(loaded.games.len(), 1);
    }

    #[test]
    fn test_sqlite_file_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.db");

        SqliteStorage::open(&path).unwrap().save(&sample_state()).unwrap();
        let loaded = SqliteStorage::open(&path).unwrap().load().unwrap().unwrap();

        assert_eq!(loaded, sample_state());
    }

    #[test]
    fn test_open_storage_picks_backend() {
        let dir = TempDir::new().unwrap();

        let sqlite = open_storage(&dir.path().join("scores.sqlite")).unwrap();
        assert!(sqlite.describe().starts_with("sqlite:"));

        let json = open_storage(&dir.path().join("scores.json")).unwrap();
        assert!(json.describe().starts_with("json:"));

        let memory = open_storage(Path::new(":memory:")).unwrap();
        assert_eq!(memory.describe(), "memory");
    }

    #[test]
    fn test_memory_storage_shares_slot() {
        let storage = MemoryStorage::default();
        let mut writer = storage.clone();

        writer.save(&sample_state()).unwrap();
        assert_eq!(storage.load().unwrap(), Some(sample_state()));
        assert_eq!(storage.snapshot(), Some(sample_state()));
    }

    // ------------------------------------------------------------------------
    // Loaded state must be consistent
    // ------------------------------------------------------------------------

    fn load_error(storage: Box<dyn Storage>) -> String {
        let Err(err) = HistoryStore::load(storage) else {
            panic!("inconsistent state was accepted");
        };
        format!("{:#}", err)
    }

    fn json_state(dir: &TempDir, raw: &str) -> Box<dyn Storage> {
        let path = dir.path().join("state.json");
        fs::write(&path, raw).unwrap();
        Box::new(JsonFileStorage::new(path))
    }

    fn sqlite_state(players: &[&str], results: &[(&str, &str, i64)], winner: &str) -> Box<dyn Storage> {
        let storage = SqliteStorage::open_in_memory().unwrap();
        for (position, name) in players.iter().enumerate() {
            storage
                .conn
                .execute(
                    "INSERT INTO players (position, name) VALUES (?1, ?2)",
                    params![position as i64, name],
                )
                .unwrap();
        }
        storage
            .conn
            .execute(
                "INSERT INTO games (id, date, winner) VALUES (1, '31.01.2025', ?1)",
                params![winner],
            )
            .unwrap();
        for (position, (player, detail, total)) in results.iter().enumerate() {
            storage
                .conn
                .execute(
                    "INSERT INTO results (game_id, position, player, detail, total)
                     VALUES (1, ?1, ?2, ?3, ?4)",
                    params![position as i64, player, detail, total],
                )
                .unwrap();
        }
        Box::new(storage)
    }

    #[test]
    fn test_validate_accepts_saved_state() {
        assert!(sample_state().validate().is_ok());
        assert!(PersistedState::default().validate().is_ok());
    }

    #[test]
    fn test_json_rejects_unparsable_detail() {
        let dir = TempDir::new().unwrap();
        let storage = json_state(
            &dir,
            r#"{"players":["Bob"],"games":[{"date":"31.01.2025","results":{"Bob":{"detail":"abc","total":5}},"winner":"Bob"}]}"#,
        );

        assert!(load_error(storage).contains("invalid detail \"abc\""));
    }

    #[test]
    fn test_json_rejects_total_mismatch() {
        let dir = TempDir::new().unwrap();
        let storage = json_state(
            &dir,
            r#"{"players":["Bob"],"games":[{"date":"31.01.2025","results":{"Bob":{"detail":"2+2","total":5}},"winner":"Bob"}]}"#,
        );

        assert!(load_error(storage).contains("total 5 does not match"));
    }

    #[test]
    fn test_json_rejects_winner_without_result() {
        let dir = TempDir::new().unwrap();
        let storage = json_state(
            &dir,
            r#"{"players":["Bob"],"games":[{"date":"31.01.2025","results":{"Bob":{"detail":"4","total":4}},"winner":"Zed"}]}"#,
        );

        assert!(load_error(storage).contains("winner \"Zed\" has no result"));
    }

    #[test]
    fn test_json_rejects_winner_below_maximum() {
        let dir = TempDir::new().unwrap();
        let storage = json_state(
            &dir,
            r#"{"games":[{"date":"31.01.2025","results":{"Bob":{"detail":"4","total":4},"Ann":{"detail":"9","total":9}},"winner":"Bob"}]}"#,
        );

        assert!(load_error(storage).contains("does not hold the highest total"));
    }

    #[test]
    fn test_json_rejects_unclean_roster() {
        let dir = TempDir::new().unwrap();

        let repeated = json_state(&dir, r#"{"players":["Bob","Ann","Bob"]}"#);
        assert!(load_error(repeated).contains("listed twice"));

        let padded = json_state(&dir, r#"{"players":["Bob"," Bob","Ann"]}"#);
        assert!(load_error(padded).contains("Invalid player name \" Bob\""));

        let blank = json_state(&dir, r#"{"players":[""]}"#);
        assert!(load_error(blank).contains("Invalid player name"));
    }

    #[test]
    fn test_sqlite_rejects_unparsable_detail() {
        let storage = sqlite_state(&["Bob"], &[("Bob", "abc", 5)], "Bob");
        assert!(load_error(storage).contains("Invalid detail \"abc\" for Bob"));
    }

    #[test]
    fn test_sqlite_rejects_total_mismatch() {
        let storage = sqlite_state(&["Bob"], &[("Bob", "2+2", 5)], "Bob");
        assert!(load_error(storage).contains("total 5 does not match"));
    }

    #[test]
    fn test_sqlite_rejects_winner_without_result() {
        let storage = sqlite_state(&["Bob"], &[("Bob", "4", 4)], "Zed");
        assert!(load_error(storage).contains("winner \"Zed\" has no result"));
    }

    #[test]
    fn test_sqlite_rejects_unclean_roster() {
        let storage = sqlite_state(&["Bob", " Bob"], &[("Bob", "4", 4)], "Bob");
        assert!(load_error(storage).contains("Invalid player name"));
    }
}
