//! Persistence of per-day completion state in a flat JSON file.
//!
//! The store holds one map of normalized key to `YYYY-MM-DD` date string.
//! Chore-completion entries and scheduled-action entries share the file; the
//! contract is identical for both: a key whose stored date equals today's
//! date string is satisfied for the rest of the day.
//!
//! Loading never fails: a missing, unreadable, or malformed file degrades to
//! an empty map so a corrupt state file can never abort a run. Saving is a
//! single whole-file overwrite at the end of a run.

use crate::error::StateError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct StateStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the state file into memory, replacing any in-memory entries.
    ///
    /// Missing file, read failure, JSON parse failure, and non-object content
    /// all reset to an empty map. Keys are normalized on read so files edited
    /// by hand still match.
    pub fn load(&mut self) {
        let loaded = match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(map) => map,
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "state file is not a flat JSON object of date strings; resetting to empty state"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    path = %self.path.display(),
                    "state file not found; assuming first run, starting with empty state"
                );
                BTreeMap::new()
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read state file; starting with empty state"
                );
                BTreeMap::new()
            }
        };

        self.entries = loaded
            .into_iter()
            .map(|(k, v)| (normalize_key(&k), v))
            .collect();
        debug!(entries = self.entries.len(), "state loading complete");
    }

    /// Serializes the in-memory map back to the state file, creating parent
    /// directories as needed. Sorted keys and 4-space indentation keep the
    /// file diffable across runs.
    pub fn save(&self) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StateError::Write {
                path: self.path.clone(),
                source,
            })?;
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.entries.serialize(&mut ser)?;
        buf.push(b'\n');

        fs::write(&self.path, buf).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), entries = self.entries.len(), "state saved");
        Ok(())
    }

    /// True iff the stored date for `key` equals `today` exactly. String
    /// equality, not date comparison: a stale entry from yesterday never
    /// satisfies today.
    pub fn is_done_today(&self, key: &str, today: &str) -> bool {
        if key.trim().is_empty() || today.is_empty() {
            warn!("is_done_today called with empty key or date; returning false");
            return false;
        }
        self.entries.get(&normalize_key(key)).map(String::as_str) == Some(today)
    }

    /// In-memory only; `save` persists it at the end of the run.
    pub fn mark_done_today(&mut self, key: &str, today: &str) {
        if key.trim().is_empty() || today.is_empty() {
            warn!("mark_done_today called with empty key or date; state unchanged");
            return;
        }
        let normalized = normalize_key(key);
        debug!(
            key = %normalized,
            date = %today,
            previous = ?self.entries.get(&normalized),
            "marking done for today"
        );
        self.entries.insert(normalized, today.to_string());
    }

    /// Scheduled-action entries follow the same per-key per-day contract.
    pub fn has_action_run_today(&self, action_key: &str, today: &str) -> bool {
        self.is_done_today(action_key, today)
    }

    pub fn mark_action_run_today(&mut self, action_key: &str, today: &str) {
        self.mark_done_today(action_key, today);
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}
