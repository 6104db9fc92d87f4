//! File-backed record store.
//!
//! The on-disk form is a single JSON object mapping user id to record, written
//! with four-space indentation. A missing or blank file is an empty store.

use std::collections::btree_map::{self, BTreeMap};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::UserRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("malformed JSON in {path}: {source}")]
    Malformed { path: PathBuf, source: serde_json::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to serialize records: {source}")]
    Serialize { source: serde_json::Error },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct RecordStore {
    records: BTreeMap<String, UserRecord>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from `path`.
    ///
    /// # Errors
    /// Returns [`StoreError::Read`] when the file exists but cannot be read and
    /// [`StoreError::Malformed`] when non-blank content is not a JSON object of
    /// records.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = Self::read_raw(path)?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str(&content)
            .map_err(|source| StoreError::Malformed { path: path.to_path_buf(), source })
    }

    /// Raw file text; a missing file reads as empty.
    ///
    /// # Errors
    /// Returns [`StoreError::Read`] for any I/O failure other than not-found.
    pub fn read_raw(path: &Path) -> Result<String, StoreError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(StoreError::Read { path: path.to_path_buf(), source }),
        }
    }

    /// Write the whole store to `path`.
    ///
    /// The content goes to a sibling `.tmp` file first and is renamed over the
    /// target, so a crash mid-write leaves the previous version intact.
    ///
    /// # Errors
    /// Returns [`StoreError::Serialize`] or [`StoreError::Write`].
    pub fn persist(&self, path: &Path) -> Result<(), StoreError> {
        let body = self.to_pretty_json()?;
        let tmp_path = temp_path_for(path);

        if let Err(err) = replace_via(&tmp_path, path, body.as_bytes()) {
            match fs::remove_file(&tmp_path) {
                Err(cleanup) if cleanup.kind() != io::ErrorKind::NotFound => {
                    tracing::warn!(
                        path = %tmp_path.display(),
                        error = %cleanup,
                        "failed to remove temporary store file"
                    );
                }
                _ => {}
            }
            return Err(err);
        }
        tracing::debug!(path = %path.display(), records = self.len(), "persisted record store");
        Ok(())
    }

    /// Pretty JSON with four-space indentation.
    ///
    /// # Errors
    /// Returns [`StoreError::Serialize`] if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String, StoreError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer).map_err(|source| StoreError::Serialize { source })?;
        // serde_json only ever emits UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Combine two stores; entries in `incoming` replace same-keyed entries.
    #[must_use]
    pub fn merge(&self, incoming: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_in(incoming);
        merged
    }

    pub fn merge_in(&mut self, incoming: &Self) {
        for (id, record) in &incoming.records {
            self.records.insert(id.clone(), record.clone());
        }
    }

    /// Single-entry store, the shape produced by one completed data entry.
    #[must_use]
    pub fn single(id: impl Into<String>, record: UserRecord) -> Self {
        let mut store = Self::new();
        store.insert(id, record);
        store
    }

    pub fn insert(&mut self, id: impl Into<String>, record: UserRecord) -> Option<UserRecord> {
        self.records.insert(id.into(), record)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&UserRecord> {
        self.records.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn ids(&self) -> btree_map::Keys<'_, String, UserRecord> {
        self.records.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, UserRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = (&'a String, &'a UserRecord);
    type IntoIter = btree_map::Iter<'a, String, UserRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn replace_via(tmp_path: &Path, path: &Path, body: &[u8]) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write { path: tmp_path.to_path_buf(), source };

    let mut file = File::create(tmp_path).map_err(write_err)?;
    file.write_all(body).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    fs::rename(tmp_path, path).map_err(|source| StoreError::Write { path: path.to_path_buf(), source })
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
