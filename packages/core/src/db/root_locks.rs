//! Per-tree write exclusion
//!
//! Structural mutations read interval bounds and then rewrite a range of rows
//! of the same tree. Two such mutations interleaving on one `root_id` would
//! each renumber from stale bounds, so every mutation holds the lock of every
//! tree it touches for the whole transaction.
//!
//! Locks are always taken in ascending `root_id` order, which keeps a move
//! between trees A and B from deadlocking against a move from B to A.

use crate::models::CategoryId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async mutex per tree
#[derive(Debug, Default)]
pub struct RootLocks {
    locks: Mutex<HashMap<CategoryId, Arc<AsyncMutex<()>>>>,
}

/// Held locks; released on drop
#[derive(Debug)]
pub struct RootGuard {
    roots: Vec<CategoryId>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl RootGuard {
    /// Whether every root in `roots` is held by this guard
    pub fn covers(&self, roots: &[CategoryId]) -> bool {
        roots.iter().all(|root| self.roots.binary_search(root).is_ok())
    }

    pub fn roots(&self) -> &[CategoryId] {
        &self.roots
    }
}

impl RootLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the locks of all given trees, waiting as long as necessary
    pub async fn lock(&self, roots: impl IntoIterator<Item = CategoryId>) -> RootGuard {
        let mut roots: Vec<CategoryId> = roots.into_iter().collect();
        roots.sort_unstable();
        roots.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            roots
                .iter()
                .map(|root| locks.entry(*root).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        RootGuard {
            roots,
            _guards: guards,
        }
    }

    /// Drop the registry entry of a tree that no longer exists
    ///
    /// Entries still referenced by a waiter are kept.
    pub fn forget(&self, root_id: CategoryId) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks
            .get(&root_id)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            locks.remove(&root_id);
        }
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
