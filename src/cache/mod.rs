//! Process-wide state shared between indexing and generation.
//!
//! - [`EngineCache`] - namespace to [`CachedEngine`], built lazily and
//!   evicted whenever the namespace is re-indexed
//! - [`NamespaceLocks`] - one reader/writer lock per namespace
//!
//! Both are injected by `Arc` into the index manager and the generation
//! engine; nothing here is global.
//!
//! # Locking
//!
//! ```text
//! insert(ns)            write(ns) ── delete ── upsert ── evict(ns) ── release
//! generate attempt      read(ns)  ── get_or_build(ns) ── retrieve ── release ── complete
//! ```
//!
//! A generation attempt therefore either sees the snapshot before an insert
//! (and an engine built for it) or the snapshot after it, never a mix.

mod hash;
pub use hash::compute_hash;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::engine::CachedEngine;
use crate::schema::Namespace;

/// Concurrent namespace to engine map.
#[derive(Default)]
pub struct EngineCache {
    engines: DashMap<Namespace, Arc<CachedEngine>>,
    /// Monotonic id handed to each engine built, so a rebuilt engine is
    /// distinguishable from the one it replaces.
    next_build: AtomicU64,
}

impl EngineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &Namespace) -> Option<Arc<CachedEngine>> {
        self.engines.get(namespace).map(|e| Arc::clone(e.value()))
    }

    /// Return the cached engine for `namespace`, building it with `build` on
    /// a miss. The flag is `true` when a new engine was built.
    pub fn get_or_build<F>(&self, namespace: &Namespace, build: F) -> (Arc<CachedEngine>, bool)
    where
        F: FnOnce(u64) -> CachedEngine,
    {
        if let Some(engine) = self.get(namespace) {
            return (engine, false);
        }

        let mut built = false;
        let engine = self
            .engines
            .entry(namespace.clone())
            .or_insert_with(|| {
                built = true;
                Arc::new(build(self.next_build.fetch_add(1, Ordering::Relaxed)))
            })
            .value()
            .clone();
        (engine, built)
    }

    /// Drop the engine for `namespace`. Returns whether one was cached.
    pub fn evict(&self, namespace: &Namespace) -> bool {
        self.engines.remove(namespace).is_some()
    }

    pub fn contains(&self, namespace: &Namespace) -> bool {
        self.engines.contains_key(namespace)
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

/// Per-namespace reader/writer locks.
///
/// Writers are index inserts and evictions; readers are single generation
/// attempts covering cache lookup and retrieval.
#[derive(Default)]
pub struct NamespaceLocks {
    locks: DashMap<Namespace, Arc<RwLock<()>>>,
}

impl NamespaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, namespace: &Namespace) -> Arc<RwLock<()>> {
        self.locks
            .entry(namespace.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .value()
            .clone()
    }

    pub async fn read(&self, namespace: &Namespace) -> OwnedRwLockReadGuard<()> {
        self.lock_for(namespace).read_owned().await
    }

    pub async fn write(&self, namespace: &Namespace) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(namespace).write_owned().await
    }

    /// Write lock if nobody holds the namespace right now.
    pub fn try_write(&self, namespace: &Namespace) -> Option<OwnedRwLockWriteGuard<()>> {
        self.lock_for(namespace).try_write_owned().ok()
    }

    /// Drop the lock for `namespace` unless a guard or waiter still holds it.
    ///
    /// Returns whether an entry was removed.
    pub fn prune(&self, namespace: &Namespace) -> bool {
        self.locks
            .remove_if(namespace, |_, lock| Arc::strong_count(lock) == 1)
            .is_some()
    }

    pub fn contains(&self, namespace: &Namespace) -> bool {
        self.locks.contains_key(namespace)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
