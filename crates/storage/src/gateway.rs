//! Snapshot persistence: the durable slot plus file export and import.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use audit_core::{AiResponses, DocumentId, SectionTopic, Snapshot};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{KeyValueStore, StoreError};

pub const SLOT_KEY: &str = "audit_review_data";

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Format JSON invalide. ({0})")]
    Parse(#[from] serde_json::Error),
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads and writes the whole snapshot in one slot. Last write wins.
#[derive(Debug)]
pub struct SnapshotGateway<S> {
    store: S,
}

impl<S: KeyValueStore> SnapshotGateway<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Startup read. A missing, unreadable or corrupt slot is treated as empty.
    pub fn load(&self) -> Option<Snapshot> {
        let raw = match self.store.read(SLOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "could not read persisted snapshot");
                return None;
            }
        };
        match decode_snapshot(&raw) {
            Ok(decoded) => {
                tracing::info!(
                    bytes = raw.len(),
                    dropped_keys = decoded.rejected.len(),
                    "snapshot loaded"
                );
                Some(decoded.snapshot)
            }
            Err(err) => {
                tracing::warn!(error = %err, "ignoring corrupt persisted snapshot");
                None
            }
        }
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let raw = serde_json::to_string(snapshot)?;
        self.store.write(SLOT_KEY, &raw)?;
        tracing::debug!(bytes = raw.len(), "snapshot saved");
        Ok(())
    }

    pub fn reset(&self) -> Result<(), PersistError> {
        self.store.remove(SLOT_KEY)?;
        tracing::info!("persisted snapshot cleared");
        Ok(())
    }
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("audit_expert_{}.json", date.format("%Y-%m-%d"))
}

/// Writes a pretty-printed backup into `dir` and returns its path.
pub fn export_to_file(
    snapshot: &Snapshot,
    dir: &Path,
    date: NaiveDate,
) -> Result<PathBuf, PersistError> {
    let path = dir.join(export_file_name(date));
    let raw = serde_json::to_string_pretty(snapshot)?;
    fs::write(&path, raw).map_err(|source| PersistError::Io {
        action: "write export",
        path: path.clone(),
        source,
    })?;
    tracing::info!(path = %path.display(), "snapshot exported");
    Ok(path)
}

pub fn import_from_file(path: &Path) -> Result<Snapshot, PersistError> {
    let raw = fs::read_to_string(path).map_err(|source| PersistError::Io {
        action: "read import",
        path: path.to_path_buf(),
        source,
    })?;
    parse_snapshot(&raw)
}

/// Each top-level key is taken whole or dropped on its own. The file is rejected
/// when it is not a JSON object or when none of its keys could be read.
pub fn parse_snapshot(raw: &str) -> Result<Snapshot, PersistError> {
    let Decoded {
        snapshot,
        mut rejected,
    } = decode_snapshot(raw)?;
    let nothing_read =
        snapshot.documents.is_none() && snapshot.ai_responses.is_none() && snapshot.notes.is_none();
    if nothing_read && !rejected.is_empty() {
        return Err(PersistError::Parse(rejected.remove(0)));
    }
    Ok(snapshot)
}

struct Decoded {
    snapshot: Snapshot,
    rejected: Vec<serde_json::Error>,
}

fn decode_snapshot(raw: &str) -> Result<Decoded, serde_json::Error> {
    let mut root: Map<String, Value> = serde_json::from_str(raw)?;
    let mut rejected = Vec::new();
    let documents = take_key(&mut root, "documents", &mut rejected);
    let ai_responses = take_key(&mut root, "aiResponses", &mut rejected).map(known_topics);
    let notes = take_key(&mut root, "notes", &mut rejected);
    Ok(Decoded {
        snapshot: Snapshot {
            documents,
            ai_responses,
            notes,
        },
        rejected,
    })
}

fn take_key<T: DeserializeOwned>(
    root: &mut Map<String, Value>,
    key: &'static str,
    rejected: &mut Vec<serde_json::Error>,
) -> Option<T> {
    let value = root.remove(key).filter(|value| !value.is_null())?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!(key, error = %err, "dropping unreadable snapshot key");
            rejected.push(err);
            None
        }
    }
}

fn known_topics(raw: BTreeMap<DocumentId, BTreeMap<String, String>>) -> AiResponses {
    raw.into_iter()
        .map(|(document, topics)| {
            let topics = topics
                .into_iter()
                .filter_map(|(topic, text)| match topic.parse::<SectionTopic>() {
                    Ok(topic) => Some((topic, text)),
                    Err(_) => {
                        tracing::warn!(
                            doc = %document,
                            topic = %topic,
                            "skipping unknown response topic"
                        );
                        None
                    }
                })
                .collect();
            (document, topics)
        })
        .collect()
}
