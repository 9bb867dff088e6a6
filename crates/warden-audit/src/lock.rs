//! Per-path optimistic write locks.
//!
//! A writer takes a [`WriteLease`] on a path before mutating it. Acquiring the
//! lease serializes writers on that path and compares the caller's expected
//! fingerprint against the bytes currently on disk. The lease is held until
//! the mutation is recorded and then dropped, which releases the path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::{AuditError, AuditResult};
use crate::fingerprint::{ContentHash, fingerprint_file};

type LockTable = DashMap<PathBuf, Arc<Mutex<()>>>;

/// Table of per-path write locks, shared by every in-flight invocation.
#[derive(Debug, Clone, Default)]
pub struct PathLocks {
    table: Arc<LockTable>,
}

impl PathLocks {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `path`, then check its fingerprint.
    ///
    /// With `expected` set, the current content must hash to it. A missing
    /// file never matches an expected fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::OptimisticLock`] when the content differs, or an
    /// IO error if the file exists but cannot be read. The path is released
    /// before the error is returned.
    pub async fn acquire(
        &self,
        path: &Path,
        expected: Option<&ContentHash>,
    ) -> AuditResult<WriteLease> {
        let mutex = self
            .table
            .entry(path.to_path_buf())
            .or_default()
            .value()
            .clone();
        let guard = mutex.lock_owned().await;

        let mut lease = WriteLease {
            path: path.to_path_buf(),
            observed: None,
            guard: Some(guard),
            table: Arc::clone(&self.table),
        };
        lease.observed = fingerprint_file(path)?;

        if let Some(expected) = expected
            && lease.observed.as_ref() != Some(expected)
        {
            let actual = lease
                .observed
                .map_or_else(|| "absent".to_owned(), |h| h.to_string());
            warn!(
                path = %path.display(),
                expected = %expected,
                actual = %actual,
                "Optimistic lock conflict"
            );
            return Err(AuditError::OptimisticLock {
                path: path.display().to_string(),
                expected: expected.to_string(),
                actual,
            });
        }

        debug!(path = %path.display(), "Write lease acquired");
        Ok(lease)
    }

    /// Number of paths with a live lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no path is locked or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Exclusive right to write one path. Released on drop.
#[derive(Debug)]
pub struct WriteLease {
    path: PathBuf,
    observed: Option<ContentHash>,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable>,
}

impl WriteLease {
    /// The leased path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fingerprint of the path when the lease was granted.
    #[must_use]
    pub fn observed(&self) -> Option<&ContentHash> {
        self.observed.as_ref()
    }
}

impl Drop for WriteLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The table's own reference is the only one left once nobody waits.
        self.table
            .remove_if(&self.path, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lease_without_expectation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.txt");
        let locks = PathLocks::new();
        let lease = locks.acquire(&path, None).await.unwrap();
        assert!(lease.observed().is_none());
        assert_eq!(locks.len(), 1);
        drop(lease);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_matching_fingerprint_is_granted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"v1").unwrap();
        let expected = ContentHash::hash(b"v1");
        let lease = PathLocks::new()
            .acquire(&path, Some(&expected))
            .await
            .unwrap();
        assert_eq!(lease.observed(), Some(&expected));
    }

    #[tokio::test]
    async fn test_stale_fingerprint_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"v2").unwrap();
        let locks = PathLocks::new();
        let err = locks
            .acquire(&path, Some(&ContentHash::hash(b"v1")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::OptimisticLock { .. }));
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_expected_fingerprint_for_missing_file_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let err = PathLocks::new()
            .acquire(&dir.path().join("gone"), Some(&ContentHash::hash(b"x")))
            .await
            .unwrap_err();
        match err {
            AuditError::OptimisticLock { actual, .. } => assert_eq!(actual, "absent"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_writer_sees_first_writers_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"v1").unwrap();
        let expected = ContentHash::hash(b"v1");
        let locks = PathLocks::new();

        let first = locks.acquire(&path, Some(&expected)).await.unwrap();

        let second = {
            let locks = locks.clone();
            let path = path.clone();
            tokio::spawn(async move { locks.acquire(&path, Some(&expected)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!second.is_finished());

        std::fs::write(&path, b"v2").unwrap();
        drop(first);

        let result = second.await.unwrap();
        assert!(matches!(result, Err(AuditError::OptimisticLock { .. })));
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_paths_do_not_contend() {
        let dir = tempfile::tempdir().unwrap();
        let locks = PathLocks::new();
        let a = locks.acquire(&dir.path().join("a"), None).await.unwrap();
        let b = tokio::time::timeout(
            Duration::from_secs(1),
            locks.acquire(&dir.path().join("b"), None),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(locks.len(), 2);
        drop((a, b));
        assert!(locks.is_empty());
    }
}
