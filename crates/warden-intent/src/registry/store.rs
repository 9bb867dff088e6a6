//! Session binding storage backends.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use warden_core::{IntentId, SessionId};

use crate::error::{IntentError, IntentResult};

/// What a session has declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBinding {
    /// The session.
    pub session_id: SessionId,
    /// Currently declared intent.
    pub intent_id: Option<IntentId>,
    /// When the current intent was declared.
    pub declared_at: Option<DateTime<Utc>>,
    /// Free-form metadata set by the host.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl SessionBinding {
    /// A binding with nothing declared yet.
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            intent_id: None,
            declared_at: None,
            metadata: BTreeMap::new(),
        }
    }
}

/// Keyed storage for session bindings.
///
/// Implementations make `upsert` atomic per key: concurrent updates to the
/// same session never lose each other's changes.
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// Fetch a binding.
    fn get(&self, session_id: &SessionId) -> Option<SessionBinding>;

    /// Atomically replace a binding with `apply(current)`.
    ///
    /// # Errors
    ///
    /// Returns an error if a persisted backend cannot record the change.
    fn upsert(
        &self,
        session_id: &SessionId,
        apply: &mut dyn FnMut(Option<&SessionBinding>) -> SessionBinding,
    ) -> IntentResult<SessionBinding>;

    /// Remove a binding, returning it.
    ///
    /// # Errors
    ///
    /// Returns an error if a persisted backend cannot record the change.
    fn remove(&self, session_id: &SessionId) -> IntentResult<Option<SessionBinding>>;

    /// All bindings, ordered by session id.
    fn list(&self) -> Vec<SessionBinding>;
}

/// Process-local store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<SessionId, SessionBinding>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bindings(bindings: Vec<SessionBinding>) -> Self {
        let store = Self::new();
        store.replace_all(bindings);
        store
    }

    /// Make the table hold exactly `bindings`.
    fn replace_all(&self, bindings: Vec<SessionBinding>) {
        let keep: BTreeSet<SessionId> =
            bindings.iter().map(|b| b.session_id.clone()).collect();
        self.sessions.retain(|id, _| keep.contains(id));
        for binding in bindings {
            self.sessions.insert(binding.session_id.clone(), binding);
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session_id: &SessionId) -> Option<SessionBinding> {
        self.sessions.get(session_id).map(|b| b.value().clone())
    }

    fn upsert(
        &self,
        session_id: &SessionId,
        apply: &mut dyn FnMut(Option<&SessionBinding>) -> SessionBinding,
    ) -> IntentResult<SessionBinding> {
        let next = match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let next = apply(Some(occupied.get()));
                occupied.insert(next.clone());
                next
            },
            Entry::Vacant(vacant) => {
                let next = apply(None);
                vacant.insert(next.clone());
                next
            },
        };
        Ok(next)
    }

    fn remove(&self, session_id: &SessionId) -> IntentResult<Option<SessionBinding>> {
        Ok(self.sessions.remove(session_id).map(|(_, b)| b))
    }

    fn list(&self) -> Vec<SessionBinding> {
        let mut all: Vec<_> = self.sessions.iter().map(|b| b.value().clone()).collect();
        all.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        all
    }
}

#[derive(Serialize, Deserialize)]
struct RegistryFile {
    version: u32,
    sessions: Vec<SessionBinding>,
}

const REGISTRY_FILE_VERSION: u32 = 1;

/// Memory store mirrored to a JSON side file after every change.
///
/// Each change runs under an exclusive advisory lock on a companion `.lk`
/// file: the side file is re-read, the one session is changed on top of
/// what other processes wrote, and the whole table is written back through a
/// temp file and a rename. Readers never see a torn file and writers in
/// other processes never erase each other's sessions.
#[derive(Debug)]
pub struct FileSessionStore {
    inner: MemorySessionStore,
    path: PathBuf,
    persist_lock: Mutex<()>,
}

impl FileSessionStore {
    /// Open a store, loading the side file if it exists.
    ///
    /// A missing or corrupt file starts an empty table.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let bindings = load_side_file(&path);
        debug!(path = %path.display(), sessions = bindings.len(), "Opened session store");
        Self {
            inner: MemorySessionStore::with_bindings(bindings),
            path,
            persist_lock: Mutex::new(()),
        }
    }

    /// The side file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to the freshly loaded table and write it back, all
    /// under the cross-process lock.
    fn transact<T>(
        &self,
        change: impl FnOnce(&MemorySessionStore) -> IntentResult<T>,
    ) -> IntentResult<T> {
        let _guard = self.persist_lock.lock().unwrap_or_else(|e| {
            warn!("Session store persist lock was poisoned, recovering");
            e.into_inner()
        });
        let _file_lock = self.lock_side_file()?;

        self.inner.replace_all(load_side_file(&self.path));
        let out = change(&self.inner)?;
        self.write_side_file()?;
        Ok(out)
    }

    /// Exclusive lock on `<path>.lk`, released when the handle drops.
    fn lock_side_file(&self) -> IntentResult<std::fs::File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let lock_path = self.path.with_extension("lk");
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .read(true)
            .open(&lock_path)?;
        lock_file.lock_exclusive().map_err(|e| {
            IntentError::Persistence(format!(
                "failed to lock {}: {e}",
                lock_path.display()
            ))
        })?;
        Ok(lock_file)
    }

    fn write_side_file(&self) -> IntentResult<()> {
        let file = RegistryFile {
            version: REGISTRY_FILE_VERSION,
            sessions: self.inner.list(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| IntentError::Persistence(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut out = std::fs::File::create(&tmp)?;
            out.write_all(&json)?;
            out.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, session_id: &SessionId) -> Option<SessionBinding> {
        self.inner.get(session_id)
    }

    fn upsert(
        &self,
        session_id: &SessionId,
        apply: &mut dyn FnMut(Option<&SessionBinding>) -> SessionBinding,
    ) -> IntentResult<SessionBinding> {
        self.transact(|table| table.upsert(session_id, apply))
    }

    fn remove(&self, session_id: &SessionId) -> IntentResult<Option<SessionBinding>> {
        self.transact(|table| table.remove(session_id))
    }

    fn list(&self) -> Vec<SessionBinding> {
        self.inner.list()
    }
}

fn load_side_file(path: &Path) -> Vec<SessionBinding> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Session file unreadable; starting empty");
            return Vec::new();
        },
    };
    match serde_json::from_slice::<RegistryFile>(&bytes) {
        Ok(file) if file.version == REGISTRY_FILE_VERSION => file.sessions,
        Ok(file) => {
            warn!(
                path = %path.display(),
                version = file.version,
                "Unsupported session file version; starting empty"
            );
            Vec::new()
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Session file corrupt; starting empty");
            Vec::new()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(intent: &str) -> impl FnMut(Option<&SessionBinding>) -> SessionBinding + '_ {
        move |current| {
            let mut next = current
                .cloned()
                .unwrap_or_else(|| SessionBinding::new(SessionId::new("s1")));
            next.intent_id = Some(IntentId::new(intent));
            next
        }
    }

    fn bind_as<'a>(
        session: &'a str,
        intent: &'a str,
    ) -> impl FnMut(Option<&SessionBinding>) -> SessionBinding + 'a {
        move |current| {
            let mut next = current
                .cloned()
                .unwrap_or_else(|| SessionBinding::new(SessionId::new(session)));
            next.intent_id = Some(IntentId::new(intent));
            next
        }
    }

    #[test]
    fn test_memory_upsert_and_get() {
        let store = MemorySessionStore::new();
        let session = SessionId::new("s1");
        assert!(store.get(&session).is_none());

        store.upsert(&session, &mut bind("INT-001")).unwrap();
        assert_eq!(
            store.get(&session).unwrap().intent_id,
            Some(IntentId::new("INT-001"))
        );

        store.upsert(&session, &mut bind("INT-002")).unwrap();
        assert_eq!(store.list().len(), 1);
        assert_eq!(
            store.get(&session).unwrap().intent_id,
            Some(IntentId::new("INT-002"))
        );
    }

    #[test]
    fn test_memory_remove() {
        let store = MemorySessionStore::new();
        let session = SessionId::new("s1");
        store.upsert(&session, &mut bind("INT-001")).unwrap();
        assert!(store.remove(&session).unwrap().is_some());
        assert!(store.remove(&session).unwrap().is_none());
    }

    #[test]
    fn test_memory_concurrent_upserts_keep_every_change() {
        let store = std::sync::Arc::new(MemorySessionStore::new());
        let session = SessionId::new("shared");
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                let session = session.clone();
                std::thread::spawn(move || {
                    store
                        .upsert(&session, &mut |current| {
                            let mut next = current
                                .cloned()
                                .unwrap_or_else(|| SessionBinding::new(session.clone()));
                            next.metadata.insert(format!("k{i}"), "v".to_owned());
                            next
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get(&session).unwrap().metadata.len(), 16);
    }

    #[test]
    fn test_file_store_round_trips_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/sessions.json");
        let session = SessionId::new("s1");
        {
            let store = FileSessionStore::open(&path);
            store.upsert(&session, &mut bind("INT-001")).unwrap();
        }
        let reopened = FileSessionStore::open(&path);
        assert_eq!(
            reopened.get(&session).unwrap().intent_id,
            Some(IntentId::new("INT-001"))
        );

        reopened.remove(&session).unwrap();
        assert!(FileSessionStore::open(&path).get(&session).is_none());
    }

    #[test]
    fn test_file_stores_sharing_a_file_keep_both_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let first = FileSessionStore::open(&path);
        let second = FileSessionStore::open(&path);

        first.upsert(&SessionId::new("a"), &mut bind_as("a", "INT-001")).unwrap();
        second.upsert(&SessionId::new("b"), &mut bind_as("b", "INT-002")).unwrap();

        let ids: Vec<_> = FileSessionStore::open(&path)
            .list()
            .into_iter()
            .map(|b| b.session_id)
            .collect();
        assert_eq!(ids, vec![SessionId::new("a"), SessionId::new("b")]);

        // A removal in one store is not undone by the other's next write.
        first.remove(&SessionId::new("a")).unwrap();
        second.upsert(&SessionId::new("b"), &mut bind_as("b", "INT-003")).unwrap();
        let reopened = FileSessionStore::open(&path);
        assert!(reopened.get(&SessionId::new("a")).is_none());
        assert_eq!(
            reopened.get(&SessionId::new("b")).unwrap().intent_id,
            Some(IntentId::new("INT-003"))
        );
    }

    #[test]
    fn test_file_stores_concurrent_writers_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = FileSessionStore::open(&path);
                    let session = SessionId::new(format!("s{i}"));
                    store
                        .upsert(&session, &mut |_| SessionBinding::new(session.clone()))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(FileSessionStore::open(&path).list().len(), 8);
    }

    #[test]
    fn test_file_store_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = FileSessionStore::open(&path);
        assert!(store.list().is_empty());

        store
            .upsert(&SessionId::new("s1"), &mut bind("INT-001"))
            .unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"version\": 1"));
        assert!(!dir.path().join("sessions.json.tmp").exists());
    }
}
