//! Local record store.
//!
//! One JSON record per file under `sheetlife:file:<id>`, plus a JSON index
//! (`{ "files": [...] }`) under `sheetlife:file-index` listing every record
//! without its body. Corrupt entries read as absent; a missing medium reads as
//! an empty, read-only store.

use base64::{Engine as _, engine::general_purpose};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use crate::config::{LOCAL_FILE_INDEX_KEY, LOCAL_FILE_PREFIX};
use crate::namespace::{Namespace, StorageEvent};

/// A persisted file and its base64-encoded content.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalFileRecord {
    pub id: String,
    pub name: String,
    pub view_type: String,
    pub mime_type: String,
    pub created_at: String,
    pub updated_at: String,
    pub content_base64: String,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Local,
}

/// Projection of a [`LocalFileRecord`] kept in the index.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalFileIndexEntry {
    pub id: String,
    pub name: String,
    pub view_type: String,
    pub storage_type: StorageType,
    pub created_at: String,
    pub updated_at: String,
}

impl LocalFileIndexEntry {
    fn from_record(record: &LocalFileRecord) -> Self {
        LocalFileIndexEntry {
            id: record.id.clone(),
            name: record.name.clone(),
            view_type: record.view_type.clone(),
            storage_type: StorageType::Local,
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct LocalFileIndex {
    #[serde(default)]
    pub files: Vec<LocalFileIndexEntry>,
}

/// Decoded content of a record, ready to be handed to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Download {
    /// Write the content into `dir` under its suggested file name.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = dir.as_ref().join(&self.file_name);
        fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

pub fn record_key(file_id: &str) -> String {
    format!("{}{}", LOCAL_FILE_PREFIX, file_id)
}

/// Per-context view of the shared record namespace.
///
/// Holds this context's index snapshot and a version counter per file id that
/// is bumped whenever the file changes, locally or in another context.
pub struct LocalFileStore {
    namespace: Option<Box<dyn Namespace>>,
    events: Option<Receiver<StorageEvent>>,
    index: Vec<LocalFileIndexEntry>,
    file_versions: HashMap<String, u64>,
}

impl LocalFileStore {
    /// Attach a store to a namespace, repairing the index if it is missing or unreadable.
    pub fn new(namespace: Box<dyn Namespace>) -> Self {
        let events = namespace.subscribe();
        let index = load_index_from_storage(&*namespace);
        LocalFileStore {
            namespace: Some(namespace),
            events,
            index,
            file_versions: HashMap::new(),
        }
    }

    /// A store with no durable medium: empty and read-only.
    pub fn detached() -> Self {
        LocalFileStore {
            namespace: None,
            events: None,
            index: Vec::new(),
            file_versions: HashMap::new(),
        }
    }

    pub fn ready(&self) -> bool {
        self.namespace.is_some()
    }

    pub fn index(&self) -> &[LocalFileIndexEntry] {
        &self.index
    }

    pub fn file_version(&self, file_id: &str) -> u64 {
        self.file_versions.get(file_id).copied().unwrap_or(0)
    }

    pub fn get_record(&self, file_id: &str) -> Option<LocalFileRecord> {
        let namespace = self.namespace.as_ref()?;
        let raw = namespace.get_item(&record_key(file_id))?;
        if raw.is_empty() {
            return None;
        }

        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Record '{}' is corrupt, treating it as absent: {}", file_id, e);
                None
            }
        }
    }

    /// Persist a record and upsert its index entry
    ///
    /// The index is merged into the freshest persisted copy so entries added by
    /// other contexts survive; an existing entry keeps its `createdAt`.
    ///
    /// # Returns
    /// * `bool` - Whether the record body reached the namespace
    pub fn save_record(&mut self, record: &LocalFileRecord) -> bool {
        let Some(namespace) = self.namespace.as_ref() else {
            debug!("No storage attached, dropping write of '{}'", record.id);
            return false;
        };

        let body = match serde_json::to_string(record) {
            Ok(body) => body,
            Err(e) => {
                warn!("Record '{}' could not be serialized: {}", record.id, e);
                return false;
            }
        };
        if let Err(e) = namespace.set_item(&record_key(&record.id), &body) {
            warn!("Record '{}' could not be written: {}", record.id, e);
            return false;
        }

        let mut files = read_index(&**namespace).unwrap_or_else(|| self.index.clone());
        match files.iter_mut().find(|entry| entry.id == record.id) {
            Some(entry) => {
                entry.name = record.name.clone();
                entry.view_type = record.view_type.clone();
                entry.updated_at = record.updated_at.clone();
            }
            None => files.push(LocalFileIndexEntry::from_record(record)),
        }
        write_index(&**namespace, &files);
        self.index = files;

        *self.file_versions.entry(record.id.clone()).or_insert(0) += 1;
        debug!("Saved record '{}'", record.id);
        true
    }

    pub fn delete_record(&mut self, file_id: &str) {
        let Some(namespace) = self.namespace.as_ref() else {
            return;
        };

        if let Err(e) = namespace.remove_item(&record_key(file_id)) {
            warn!("Record '{}' could not be removed: {}", file_id, e);
        }

        let mut files = read_index(&**namespace).unwrap_or_else(|| self.index.clone());
        files.retain(|entry| entry.id != file_id);
        write_index(&**namespace, &files);
        self.index = files;

        self.file_versions.remove(file_id);
        info!("Deleted record '{}'", file_id);
    }

    /// Decode a record's content for download. `None` if absent or undecodable.
    pub fn download_record(&self, file_id: &str) -> Option<Download> {
        let record = self.get_record(file_id)?;
        let bytes = match general_purpose::STANDARD.decode(record.content_base64.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Record '{}' content is not valid base64: {}", file_id, e);
                return None;
            }
        };

        Some(Download {
            file_name: download_file_name(&record.name, file_id),
            mime_type: record.mime_type,
            bytes,
        })
    }

    /// Write a record's content into `dir`. Never fails; returns whether a file was written.
    pub fn download_record_to(&self, file_id: &str, dir: impl AsRef<Path>) -> bool {
        let Some(download) = self.download_record(file_id) else {
            return false;
        };
        match download.write_to(dir) {
            Ok(path) => {
                info!("Downloaded '{}' to {}", file_id, path.display());
                true
            }
            Err(e) => {
                warn!("Download of '{}' failed: {}", file_id, e);
                false
            }
        }
    }

    /// Apply one change made by another context.
    pub fn handle_storage_event(&mut self, event: &StorageEvent) {
        let Some(key) = event.key.as_deref() else {
            return;
        };

        if key == LOCAL_FILE_INDEX_KEY {
            if let Some(value) = event.new_value.as_deref() {
                match serde_json::from_str::<LocalFileIndex>(value) {
                    Ok(parsed) => self.index = parsed.files,
                    Err(e) => debug!("Ignoring unreadable index notification: {}", e),
                }
            }
            return;
        }

        if let Some(file_id) = key.strip_prefix(LOCAL_FILE_PREFIX) {
            *self.file_versions.entry(file_id.to_string()).or_insert(0) += 1;
        }
    }

    /// Drain pending notifications from other contexts. Returns how many were seen.
    pub fn poll_events(&mut self) -> usize {
        let pending: Vec<StorageEvent> = match &self.events {
            Some(events) => events.try_iter().collect(),
            None => return 0,
        };
        for event in &pending {
            self.handle_storage_event(event);
        }
        pending.len()
    }
}

fn download_file_name(name: &str, file_id: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.xlsx", file_id))
}

fn read_index(namespace: &dyn Namespace) -> Option<Vec<LocalFileIndexEntry>> {
    let raw = namespace.get_item(LOCAL_FILE_INDEX_KEY)?;
    serde_json::from_str::<LocalFileIndex>(&raw)
        .ok()
        .map(|parsed| parsed.files)
}

fn write_index(namespace: &dyn Namespace, files: &[LocalFileIndexEntry]) {
    let index = LocalFileIndex {
        files: files.to_vec(),
    };
    match serde_json::to_string(&index) {
        Ok(json) => {
            if let Err(e) = namespace.set_item(LOCAL_FILE_INDEX_KEY, &json) {
                warn!("Index could not be written: {}", e);
            }
        }
        Err(e) => warn!("Index could not be serialized: {}", e),
    }
}

fn load_index_from_storage(namespace: &dyn Namespace) -> Vec<LocalFileIndexEntry> {
    if let Some(files) = read_index(namespace) {
        return files;
    }

    if namespace.get_item(LOCAL_FILE_INDEX_KEY).is_some() {
        warn!("File index is unreadable, resetting it");
    }
    write_index(namespace, &[]);
    Vec::new()
}
