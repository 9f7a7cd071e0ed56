// 📜 History Store - append-only record of finalized rounds
//
// The in-memory state is only replaced after the storage accepted the full
// next state, so memory and disk never disagree.

use crate::error::{Result, ScoreError};
use crate::parser::ScoreEntry;
use crate::storage::{PersistedState, Storage};
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Date stamp format of a round, e.g. "07.03.2025"
pub const DATE_FORMAT: &str = "%d.%m.%Y";

// ============================================================================
// GAME RECORD
// ============================================================================

/// A finalized round. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    #[serde(with = "date_format")]
    pub date: NaiveDate,

    /// Entries in submission order, stored as a name → {detail, total} object
    #[serde(with = "results_map")]
    pub results: Vec<ScoreEntry>,

    pub winner: String,
}

impl GameRecord {
    pub fn date_stamp(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    pub fn entry_for(&self, player: &str) -> Option<&ScoreEntry> {
        self.results.iter().find(|entry| entry.player == player)
    }

    pub fn winning_entry(&self) -> Option<&ScoreEntry> {
        self.entry_for(&self.winner)
    }
}

mod date_format {
    use super::DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}

mod results_map {
    use crate::parser::{parse_summands, ScoreEntry};
    use serde::de::{Error, MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;

    #[derive(Serialize)]
    struct StoredResultRef<'a> {
        detail: &'a str,
        total: i64,
    }

    #[derive(Deserialize)]
    struct StoredResult {
        detail: String,
        total: i64,
    }

    pub fn serialize<S: Serializer>(entries: &[ScoreEntry], s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(entries.len()))?;
        for entry in entries {
            map.serialize_entry(
                &entry.player,
                &StoredResultRef {
                    detail: &entry.detail,
                    total: entry.total,
                },
            )?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ScoreEntry>, D::Error> {
        struct ResultsVisitor;

        impl<'de> Visitor<'de> for ResultsVisitor {
            type Value = Vec<ScoreEntry>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of player name to {detail, total}")
            }

            // Document order is entry order
            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((player, stored)) = access.next_entry::<String, StoredResult>()? {
                    let summands = parse_summands(&stored.detail).ok_or_else(|| {
                        <A::Error as Error>::custom(format!(
                            "invalid detail {:?} for {}",
                            stored.detail, player
                        ))
                    })?;
                    entries.push(ScoreEntry {
                        summands,
                        player,
                        detail: stored.detail,
                        total: stored.total,
                    });
                }
                Ok(entries)
            }
        }

        d.deserialize_map(ResultsVisitor)
    }
}

// ============================================================================
// HISTORY STORE
// ============================================================================

pub struct HistoryStore {
    storage: Box<dyn Storage>,
    state: PersistedState,
}

impl HistoryStore {
    /// Read the persisted state, starting empty if nothing was saved yet
    pub fn load(storage: Box<dyn Storage>) -> anyhow::Result<Self> {
        let state = match storage.load()? {
            Some(state) => {
                state
                    .validate()
                    .with_context(|| format!("Rejected saved state in {}", storage.describe()))?;
                info!(
                    storage = %storage.describe(),
                    players = state.players.len(),
                    games = state.games.len(),
                    "Loaded scorekeeper state"
                );
                state
            }
            None => {
                info!(storage = %storage.describe(), "No saved state, starting empty");
                PersistedState::default()
            }
        };

        Ok(HistoryStore { storage, state })
    }

    /// Append a finalized round and persist the full state
    pub fn append(&mut self, record: GameRecord) -> Result<()> {
        self.commit(|state| state.games.push(record))?;
        debug!(games = self.state.games.len(), "Round appended to history");
        Ok(())
    }

    /// Replace the persisted roster, keeping the game records
    pub fn save_roster(&mut self, players: Vec<String>) -> Result<()> {
        self.commit(|state| state.players = players)
    }

    /// Copy-on-write: build the next state, save it, then swap it in
    fn commit<F>(&mut self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut PersistedState),
    {
        let mut next = self.state.clone();
        mutate(&mut next);
        self.storage.save(&next).map_err(ScoreError::persistence)?;
        self.state = next;
        Ok(())
    }

    /// Last `n` records, oldest first
    pub fn recent(&self, n: usize) -> &[GameRecord] {
        let games = &self.state.games;
        &games[games.len().saturating_sub(n)..]
    }

    pub fn records(&self) -> &[GameRecord] {
        &self.state.games
    }

    pub fn players(&self) -> &[String] {
        &self.state.players
    }

    pub fn len(&self) -> usize {
        self.state.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.games.is_empty()
    }

    pub fn storage_description(&self) -> String {
        self.storage.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Memory storage whose writes can be switched to fail
    struct FlakyStorage {
        inner: MemoryStorage,
        failing: Arc<AtomicBool>,
    }

    impl Storage for FlakyStorage {
        fn load(&self) -> anyhow::Result<Option<PersistedState>> {
            self.inner.load()
        }

        fn save(&mut self, state: &PersistedState) -> anyhow::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("disk unavailable");
            }
            self.inner.save(state)
        }

        fn describe(&self) -> String {
            "flaky memory".to_string()
        }
    }

    fn record(day: u32, winner: &str, lines: &[(&str, &str)]) -> GameRecord {
        GameRecord {
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            results: lines
                .iter()
                .map(|(player, detail)| ScoreEntry::from_detail(player, detail).unwrap())
                .collect(),
            winner: winner.to_string(),
        }
    }

    #[test]
    fn test_record_json_layout() {
        let rec = record(7, "Bobur", &[("Bobur", "19+78+17"), ("Farrux", "17+11+25")]);
        let json = serde_json::to_string(&rec).unwrap();

        assert_eq!(
            json,
            r#"{"date":"07.03.2025","results":{"Bobur":{"detail":"19+78+17","total":114},"Farrux":{"detail":"17+11+25","total":53}},"winner":"Bobur"}"#
        );
    }

    #[test]
    fn test_record_json_keeps_entry_order() {
        let json = r#"{"date":"01.02.2024","results":{"Zafar":{"detail":"5","total":5},"Alisher":{"detail":"2+2","total":4}},"winner":"Zafar"}"#;
        let rec: GameRecord = serde_json::from_str(json).unwrap();

        assert_eq!(rec.results[0].player, "Zafar");
        assert_eq!(rec.results[1].player, "Alisher");
        assert_eq!(rec.results[1].summands, vec![2, 2]);
        assert_eq!(rec.date_stamp(), "01.02.2024");
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let json = r#"{"date":"2024-02-01","results":{},"winner":"A"}"#;
        assert!(serde_json::from_str::<GameRecord>(json).is_err());
    }

    #[test]
    fn test_load_empty_storage() {
        let store = HistoryStore::load(Box::new(MemoryStorage::default())).unwrap();
        assert!(store.is_empty());
        assert!(store.players().is_empty());
        assert!(store.recent(3).is_empty());
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let mut store = HistoryStore::load(Box::new(MemoryStorage::default())).unwrap();
        for day in 1..=5 {
            store.append(record(day, "Bobur", &[("Bobur", "1")])).unwrap();
        }

        let recent = store.recent(3);
        let days: Vec<String> = recent.iter().map(|r| r.date_stamp()).collect();
        assert_eq!(days, vec!["03.03.2025", "04.03.2025", "05.03.2025"]);

        assert_eq!(store.recent(10).len(), 5);
        assert!(store.recent(0).is_empty());
    }

    #[test]
    fn test_append_persists_full_state() {
        let storage = MemoryStorage::default();
        let mut store = HistoryStore::load(Box::new(storage.clone())).unwrap();

        store.save_roster(vec!["Bobur".to_string()]).unwrap();
        store.append(record(1, "Bobur", &[("Bobur", "3+4")])).unwrap();

        let saved = storage.snapshot().unwrap();
        assert_eq!(saved.players, vec!["Bobur".to_string()]);
        assert_eq!(saved.games.len(), 1);
        assert_eq!(saved.games[0].results[0].total, 7);
    }

    #[test]
    fn test_failed_save_leaves_memory_unchanged() {
        let storage = MemoryStorage::default();
        let failing = Arc::new(AtomicBool::new(false));
        let mut store = HistoryStore::load(Box::new(FlakyStorage {
            inner: storage.clone(),
            failing: failing.clone(),
        }))
        .unwrap();
        store.append(record(1, "Bobur", &[("Bobur", "1")])).unwrap();

        failing.store(true, Ordering::SeqCst);
        let err = store.append(record(2, "Bobur", &[("Bobur", "2")])).unwrap_err();

        assert!(matches!(err, ScoreError::Persistence(_)));
        assert_eq!(store.len(), 1);
        assert_eq!(storage.snapshot().unwrap().games.len(), 1);
    }

    #[test]
    fn test_winning_entry() {
        let rec = record(2, "Farrux", &[("Bobur", "1"), ("Farrux", "9")]);
        assert_eq!(rec.winning_entry().map(|e| e.total), Some(9));
        assert!(rec.entry_for("Murod").is_none());
    }
}
