//! Native resource identities and their generations.
//!
//! Every device buffer has a [`NativeId`] that stays fixed for its whole
//! life, like a texture name in a graphics API. Reallocating the storage
//! behind an id (resize, reinitialize) bumps its generation. Aliases record
//! the generation they were created from and compare it on every access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::trace;

/// Identity of a native device resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeId(u64);

impl NativeId {
    /// Raw id value.
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NativeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "native#{}", self.0)
    }
}

static NEXT_GROUP: AtomicU64 = AtomicU64::new(1);

/// Generation table shared by all devices of one memory-sharing group.
#[derive(Debug)]
pub struct GenerationTracker {
    group: u64,
    next_id: AtomicU64,
    live: Mutex<HashMap<NativeId, u64>>,
}

impl GenerationTracker {
    /// Creates a tracker for a new sharing group.
    pub fn new() -> Self {
        Self {
            group: NEXT_GROUP.fetch_add(1, Ordering::Relaxed),
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Sharing group this tracker belongs to.
    pub fn group(&self) -> u64 {
        self.group
    }

    /// Register a new resource at generation 0.
    pub fn register(&self) -> NativeId {
        let id = NativeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, 0);
        trace!(%id, group = self.group, "tracker::register");
        id
    }

    /// Advance the generation of `id`, returning the new generation.
    pub fn bump(&self, id: NativeId) -> Option<u64> {
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = live.get_mut(&id)?;
        *generation += 1;
        trace!(%id, generation = *generation, "tracker::bump");
        Some(*generation)
    }

    /// Current generation of `id`, `None` once retired.
    pub fn current(&self, id: NativeId) -> Option<u64> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
    }

    /// Forget `id`; every alias of it becomes stale.
    pub fn retire(&self, id: NativeId) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        trace!(%id, "tracker::retire");
    }

    /// Number of live resources.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for GenerationTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generations() {
        let t = GenerationTracker::new();
        let id = t.register();
        assert_eq!(t.current(id), Some(0));
        assert_eq!(t.bump(id), Some(1));
        assert_eq!(t.current(id), Some(1));
        t.retire(id);
        assert_eq!(t.current(id), None);
        assert_eq!(t.bump(id), None);
    }

    #[test]
    fn test_groups_are_distinct() {
        assert_ne!(GenerationTracker::new().group(), GenerationTracker::new().group());
    }
}
