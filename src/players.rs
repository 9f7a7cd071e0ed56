// 👥 Player Registry - roster of unique display names
//
// Names are case-sensitive identities kept in insertion order. Every change is
// persisted through the HistoryStore before it becomes visible here.

use crate::error::{Result, ScoreError};
use crate::history::HistoryStore;
use crate::parser::initial_of;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerRegistry {
    names: Vec<String>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a loaded roster; `HistoryStore::load` already rejected
    /// blank and repeated names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PlayerRegistry {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a player and persist the roster. Returns the stored (trimmed) name.
    pub fn add(&mut self, name: &str, store: &mut HistoryStore) -> Result<String> {
        let name = name.trim();
        if name.is_empty() || self.contains(name) {
            return Err(ScoreError::DuplicatePlayer(name.to_string()));
        }

        let mut next = self.names.clone();
        next.push(name.to_string());
        store.save_roster(next.clone())?;
        self.names = next;

        if let Some(initial) = initial_of(name) {
            let clashes = self.names_with_initial(&initial);
            if clashes.len() > 1 {
                warn!(initial = %initial, players = ?clashes, "Players share an initial; score lines resolve to the last one");
            }
        }

        info!(player = %name, roster = self.names.len(), "Player added");
        Ok(name.to_string())
    }

    /// Remove a player and persist the roster
    pub fn remove(&mut self, name: &str, store: &mut HistoryStore) -> Result<String> {
        let name = name.trim();
        let Some(index) = self.names.iter().position(|n| n == name) else {
            return Err(ScoreError::PlayerNotFound(name.to_string()));
        };

        let mut next = self.names.clone();
        let removed = next.remove(index);
        store.save_roster(next.clone())?;
        self.names = next;

        info!(player = %removed, roster = self.names.len(), "Player removed");
        Ok(removed)
    }

    pub fn list(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn names_with_initial(&self, initial: &str) -> Vec<&str> {
        self.names
            .iter()
            .filter(|n| initial_of(n).as_deref() == Some(initial))
            .map(|n| n.as_str())
            .collect()
    }

    /// Initials used by more than one player, with the names sharing them
    pub fn shared_initials(&self) -> Vec<(String, Vec<String>)> {
        let mut by_initial: HashMap<String, Vec<String>> = HashMap::new();
        let mut order = Vec::new();

        for name in &self.names {
            if let Some(initial) = initial_of(name) {
                let group = by_initial.entry(initial.clone()).or_insert_with(|| {
                    order.push(initial.clone());
                    Vec::new()
                });
                group.push(name.clone());
            }
        }

        order
            .into_iter()
            .filter_map(|initial| {
                let names = by_initial.remove(&initial)?;
                (names.len() > 1).then_some((initial, names))
            })
            .collect()
    }
}
