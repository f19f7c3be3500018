//! Shared infrastructure for engine components.
//!
//! [`EngineCore`] bundles the storage backend, the text generator, and the
//! per-project lock map so each component composes the same dependencies
//! instead of duplicating the fields.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex as AsyncMutex;

use crate::generator::TextGenerator;
use crate::storage::SqliteStorage;

/// Keyed lock map serializing all writes for a given project.
///
/// Generator calls must never happen while a handle is held; the write
/// pattern is read snapshot, judge, lock, re-validate, write.
#[derive(Clone, Default)]
pub struct ProjectLocks {
    inner: Arc<StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ProjectLocks {
    /// Create an empty lock map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the write lock for a project.
    pub fn lock_handle(&self, project_id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().expect("project lock map poisoned");
        map.entry(project_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

/// Core infrastructure shared by all engine components.
#[derive(Clone)]
pub struct EngineCore {
    storage: SqliteStorage,
    generator: Arc<dyn TextGenerator>,
    locks: ProjectLocks,
}

impl EngineCore {
    /// Create a new engine core.
    pub fn new(
        storage: SqliteStorage,
        generator: Arc<dyn TextGenerator>,
        locks: ProjectLocks,
    ) -> Self {
        Self {
            storage,
            generator,
            locks,
        }
    }

    /// Get a reference to the storage backend.
    #[inline]
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Get a handle to the text generator.
    #[inline]
    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    /// Get the write lock for a project.
    pub fn project_lock(&self, project_id: &str) -> Arc<AsyncMutex<()>> {
        self.locks.lock_handle(project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_handle_is_stable_per_project() {
        let locks = ProjectLocks::new();
        let a1 = locks.lock_handle("p1");
        let a2 = locks.lock_handle("p1");
        let b = locks.lock_handle("p2");

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
    }

    #[tokio::test]
    async fn test_lock_serializes_same_project() {
        let locks = ProjectLocks::new();
        let handle = locks.lock_handle("p1");

        let guard = handle.lock().await;
        assert!(locks.lock_handle("p1").try_lock().is_err());
        drop(guard);
        assert!(locks.lock_handle("p1").try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_cross_project_locks_independent() {
        let locks = ProjectLocks::new();
        let _guard = locks.lock_handle("p1").lock_owned().await;
        assert!(locks.lock_handle("p2").try_lock().is_ok());
    }
}
