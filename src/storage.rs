//! Preference persistence and search history
//!
//! Everything persisted is a string under a fixed key. Reads tolerate
//! missing or malformed values by falling back to defaults.

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// JSON array of recent search terms
pub const HISTORY_KEY: &str = "drugHistory_v2";
pub const SORT_KEY: &str = "drugSortKey";
pub const SORT_DIRECTION_KEY: &str = "drugSortDirection";
pub const FILTER_KEY: &str = "drugFilterOwner";
pub const THEME_KEY: &str = "drugTheme";

/// Maximum number of remembered search terms
pub const MAX_HISTORY: usize = 5;

/// String key/value persistence
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory store
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values().remove(key);
    }
}

/// Store backed by a single JSON object file, rewritten on every change
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store, starting empty when the file is missing or unreadable
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let values = load_values(&path);
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, values: &HashMap<String, String>) {
        let result = serde_json::to_string_pretty(values)
            .context("Failed to serialize preferences")
            .and_then(|json| {
                std::fs::write(&self.path, json)
                    .with_context(|| format!("Failed to write {}", self.path.display()))
            });
        if let Err(e) = result {
            warn!(error = %e, "preferences not saved");
        }
    }
}

fn load_values(path: &Path) -> HashMap<String, String> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "preferences unreadable, using defaults");
            return HashMap::new();
        }
    };

    serde_json::from_str(&text).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "preferences malformed, using defaults");
        HashMap::new()
    })
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values();
        values.insert(key.to_string(), value.to_string());
        self.persist(&values);
    }

    fn remove(&self, key: &str) {
        let mut values = self.values();
        if values.remove(key).is_some() {
            self.persist(&values);
        }
    }
}

/// Recent search terms, most recent first
pub struct SearchHistory {
    terms: Vec<String>,
    store: Arc<dyn PreferenceStore>,
}

impl SearchHistory {
    /// Load stored terms. A malformed value is dropped from the store;
    /// case-insensitive repeats keep their first (most recent) occurrence.
    pub fn load(store: Arc<dyn PreferenceStore>) -> Self {
        let stored = store
            .get(HISTORY_KEY)
            .and_then(|raw| match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(terms) => Some(terms),
                Err(e) => {
                    warn!(error = %e, "stored search history malformed, starting empty");
                    store.remove(HISTORY_KEY);
                    None
                }
            })
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let terms = stored
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.to_lowercase()))
            .take(MAX_HISTORY)
            .collect();

        Self { terms, store }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Move `term` to the front, dropping any case-insensitive duplicate
    pub fn add(&mut self, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }

        let folded = term.to_lowercase();
        self.terms.retain(|t| t.to_lowercase() != folded);
        self.terms.insert(0, term.to_string());
        self.terms.truncate(MAX_HISTORY);
        self.persist();
    }

    fn persist(&self) {
        match serde_json::to_string(&self.terms) {
            Ok(json) => self.store.set(HISTORY_KEY, &json),
            Err(e) => warn!(error = %e, "search history not saved"),
        }
    }
}
