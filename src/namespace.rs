//! Shared key-value namespace.
//!
//! [`Namespace`] is the capability the record store is written against: string
//! keys, UTF-8 text values and a channel of [`StorageEvent`]s describing writes
//! made by *other* execution contexts. [`SharedNamespace`] is the in-process
//! implementation, optionally backed by a snapshot file on disk.

use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;
use crate::saving;

/// A change made to the namespace by another context.
///
/// `key` is `None` when the whole namespace was cleared; `new_value` is `None`
/// when the key was removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: Option<String>,
    pub new_value: Option<String>,
}

pub trait Namespace {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove_item(&self, key: &str) -> Result<(), StoreError>;

    /// Receive events for writes made through other contexts.
    ///
    /// Delivery is best-effort. Implementations without cross-context
    /// visibility return `None`.
    fn subscribe(&self) -> Option<Receiver<StorageEvent>> {
        None
    }
}

struct NamespaceState {
    entries: BTreeMap<String, String>,
    listeners: Vec<(u64, Sender<StorageEvent>)>,
    next_context: u64,
    snapshot: Option<PathBuf>,
}

impl NamespaceState {
    /// Apply one change and publish it
    ///
    /// With a snapshot file the change is applied to the copy on disk, so keys
    /// written by other processes sharing the file survive, and nothing is
    /// kept in memory or announced unless that copy was written. `key: None`
    /// clears every entry; `value: None` removes `key`.
    ///
    /// # Returns
    /// * `Result<(), StoreError>` - Error from the snapshot write; the namespace is unchanged
    fn commit(&mut self, writer: u64, key: Option<&str>, value: Option<&str>) -> Result<(), StoreError> {
        let mut entries = match &self.snapshot {
            Some(path) => self.reload(path),
            None => std::mem::take(&mut self.entries),
        };

        let changed = match (key, value) {
            (Some(key), Some(value)) => {
                entries.insert(key.to_string(), value.to_string());
                true
            }
            (Some(key), None) => entries.remove(key).is_some(),
            (None, _) => {
                entries.clear();
                true
            }
        };

        if let (true, Some(path)) = (changed, &self.snapshot) {
            saving::save_namespace(&entries, path)?;
        }
        self.entries = entries;

        if changed {
            self.notify(
                writer,
                StorageEvent {
                    key: key.map(str::to_string),
                    new_value: value.map(str::to_string),
                },
            );
        }
        Ok(())
    }

    fn reload(&self, path: &Path) -> BTreeMap<String, String> {
        if !path.exists() {
            return self.entries.clone();
        }
        match saving::load_namespace(path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Snapshot {} is unreadable, writing over it: {}", path.display(), e);
                self.entries.clone()
            }
        }
    }

    fn notify(&mut self, writer: u64, event: StorageEvent) {
        self.listeners.retain(|(context, listener)| {
            *context == writer || listener.send(event.clone()).is_ok()
        });
    }
}

/// Handle of one execution context on a namespace shared with others.
pub struct SharedNamespace {
    state: Arc<Mutex<NamespaceState>>,
    context: u64,
}

impl Default for SharedNamespace {
    fn default() -> Self {
        Self::with_entries(BTreeMap::new(), None)
    }
}

impl SharedNamespace {
    /// Create an empty namespace that lives only in memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a namespace persisted in a snapshot file
    ///
    /// A missing file opens an empty namespace; the file is created on the
    /// first write. Every write re-reads the file and changes only its own
    /// key, so several processes may share one snapshot.
    ///
    /// # Arguments
    /// * `path` - Snapshot file location
    ///
    /// # Returns
    /// * `Result<SharedNamespace, StoreError>` - The namespace, or an error if an existing snapshot is unreadable
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let entries = if path.exists() {
            saving::load_namespace(path)?
        } else {
            debug!("No snapshot at {}, starting empty", path.display());
            BTreeMap::new()
        };
        Ok(Self::with_entries(entries, Some(path.to_path_buf())))
    }

    fn with_entries(entries: BTreeMap<String, String>, snapshot: Option<PathBuf>) -> Self {
        SharedNamespace {
            state: Arc::new(Mutex::new(NamespaceState {
                entries,
                listeners: Vec::new(),
                next_context: 1,
                snapshot,
            })),
            context: 0,
        }
    }

    /// A handle for a new context that sees the same entries.
    pub fn attach(&self) -> Self {
        let mut state = self.lock();
        let context = state.next_context;
        state.next_context += 1;
        SharedNamespace {
            state: Arc::clone(&self.state),
            context,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    /// Remove every entry, notifying other contexts with a keyless event.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.lock().commit(self.context, None, None)
    }

    fn lock(&self) -> MutexGuard<'_, NamespaceState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Namespace lock was poisoned, continuing with its last state");
                poisoned.into_inner()
            }
        }
    }
}

impl Namespace for SharedNamespace {
    fn get_item(&self, key: &str) -> Option<String> {
        self.lock().entries.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().commit(self.context, Some(key), Some(value))
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.lock().commit(self.context, Some(key), None)
    }

    fn subscribe(&self) -> Option<Receiver<StorageEvent>> {
        let (sender, receiver) = mpsc::channel();
        self.lock().listeners.push((self.context, sender));
        Some(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_visible_to_every_context() {
        let root = SharedNamespace::new();
        let tab = root.attach();
        tab.set_item("k", "v").unwrap();
        assert_eq!(root.get_item("k").as_deref(), Some("v"));
        assert_eq!(root.keys(), vec!["k".to_string()]);
    }

    #[test]
    fn events_skip_the_writer() {
        let root = SharedNamespace::new();
        let a = root.attach();
        let b = root.attach();
        let a_events = a.subscribe().unwrap();
        let b_events = b.subscribe().unwrap();

        a.set_item("k", "v").unwrap();

        assert!(a_events.try_recv().is_err());
        assert_eq!(
            b_events.try_recv().unwrap(),
            StorageEvent {
                key: Some("k".to_string()),
                new_value: Some("v".to_string()),
            }
        );
    }

    #[test]
    fn removing_a_missing_key_is_silent() {
        let root = SharedNamespace::new();
        let a = root.attach();
        let b_events = root.attach().subscribe().unwrap();
        a.remove_item("missing").unwrap();
        assert!(b_events.try_recv().is_err());
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let root = SharedNamespace::new();
        let a = root.attach();
        drop(root.attach().subscribe());
        a.set_item("k", "v").unwrap();
        assert!(root.lock().listeners.is_empty());
    }

    #[test]
    fn failed_snapshot_writes_change_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir(&data).unwrap();
        let root = SharedNamespace::open(data.join("ns.bin.gz")).unwrap();
        let writer = root.attach();
        let events = root.attach().subscribe().unwrap();
        writer.set_item("kept", "1").unwrap();
        events.try_recv().unwrap();

        std::fs::remove_dir_all(&data).unwrap();

        assert!(writer.set_item("k", "v").is_err());
        assert!(writer.remove_item("kept").is_err());
        assert!(writer.clear().is_err());
        assert_eq!(root.get_item("k"), None);
        assert_eq!(root.get_item("kept").as_deref(), Some("1"));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn writes_keep_keys_added_by_other_openers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ns.bin.gz");
        let first = SharedNamespace::open(&path).unwrap();
        let second = SharedNamespace::open(&path).unwrap();

        first.set_item("a", "1").unwrap();
        second.set_item("b", "2").unwrap();
        first.remove_item("missing").unwrap();

        let reopened = SharedNamespace::open(&path).unwrap();
        assert_eq!(reopened.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(second.get_item("a").as_deref(), Some("1"));
    }
}
