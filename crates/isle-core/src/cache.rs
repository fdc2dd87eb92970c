//! In-memory bundle cache.
//!
//! Keyed by the canonical absolute source path. Entries live for the life of
//! the process unless an eviction policy says otherwise; nothing is written
//! to disk.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// When cached bundles are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Keep every bundle until the process exits.
    #[default]
    Unbounded,
    /// Keep at most this many bundles, dropping the oldest insertion first.
    MaxEntries(NonZeroUsize),
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<PathBuf, Bytes>,
    /// Insertion order, only maintained for bounded policies.
    order: VecDeque<PathBuf>,
}

/// Thread-safe map from canonical source path to compiled bundle.
#[derive(Debug, Default)]
pub struct BundleCache {
    state: RwLock<CacheState>,
    policy: EvictionPolicy,
}

impl BundleCache {
    /// Create an empty cache with the given policy.
    #[must_use]
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            state: RwLock::default(),
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Look up a bundle.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Bytes> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.entries.get(path).cloned()
    }

    /// Store a bundle, replacing any previous entry for the same path.
    pub fn insert(&self, path: PathBuf, bundle: Bytes) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        let EvictionPolicy::MaxEntries(max) = self.policy else {
            state.entries.insert(path, bundle);
            return;
        };

        if state.entries.insert(path.clone(), bundle).is_none() {
            state.order.push_back(path);
        }

        while state.entries.len() > max.get() {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
            debug!(path = %oldest.display(), "Evicted bundle from cache");
        }
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.entries.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
