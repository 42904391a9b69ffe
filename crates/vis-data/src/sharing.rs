//! Cross-API sharing map.
//!
//! Lets a compute device operate on memory a graphics device owns without
//! a host round trip. Entries are keyed by the [`NativeId`] of the graphics
//! resource and hold one compute-side view plus a reference count.
//!
//! # Lifecycle
//!
//! ```text
//! acquire ──► entry created (refs = 1) ──► acquire ──► refs + 1
//!                                            │
//! drop SharedView / release ──► refs - 1 ──► 0: view dropped, entry removed
//!
//! resize of the native resource:
//!   before_reinitialize  view dropped, observers notified
//!   after_reinitialize   view recreated from the new generation
//! ```
//!
//! Between the two hooks, and whenever the native resource changed without
//! them, accessing a view fails with [`DataError::StaleHandle`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace, warn};

use crate::backend::{DeviceBuffer, DevicePrimitives, NativeId};
use crate::error::{DataError, DataResult};

/// Phase of a native resource reinitialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReinitPhase {
    /// The native resource is about to be reallocated.
    Before,
    /// The native resource was reallocated and views were recreated.
    After,
}

type Observer = Box<dyn Fn(NativeId, ReinitPhase) + Send + Sync>;

struct Entry {
    view: Option<Arc<DeviceBuffer>>,
    refs: usize,
}

/// Snapshot of the sharing map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SharingStats {
    /// Native resources with at least one holder.
    pub entries: usize,
    /// Sum of all reference counts.
    pub refs: usize,
}

/// Reference-counted registry of compute-side views of graphics resources.
#[derive(Default)]
pub struct SharingMap {
    entries: Mutex<HashMap<NativeId, Entry>>,
    observers: Mutex<Vec<Observer>>,
}

impl SharingMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a compute-side view of `native`, creating it on first use.
    ///
    /// The returned guard releases its reference when dropped.
    pub fn acquire(
        self: &Arc<Self>,
        native: &DeviceBuffer,
        device: &dyn DevicePrimitives,
    ) -> DataResult<SharedView> {
        let id = native.id();
        let mut entries = self.lock();
        match entries.get_mut(&id) {
            Some(entry) => {
                let fresh = entry
                    .view
                    .as_ref()
                    .is_some_and(|v| v.generation() == native.generation() && !v.is_stale());
                if !fresh {
                    debug!(%id, generation = native.generation(), "recreating stale shared view");
                    entry.view = Some(Arc::new(device.alias(native)?));
                }
                entry.refs += 1;
                trace!(%id, refs = entry.refs, "sharing::acquire");
            }
            None => {
                let view = device.alias(native)?;
                entries.insert(
                    id,
                    Entry {
                        view: Some(Arc::new(view)),
                        refs: 1,
                    },
                );
                debug!(%id, device = device.name(), "shared view created");
            }
        }
        Ok(SharedView {
            map: Some(self.clone()),
            id,
        })
    }

    /// Release one reference to `id`.
    ///
    /// Fails with [`DataError::NotShared`] when no reference is outstanding.
    pub fn release(&self, id: NativeId) -> DataResult<()> {
        let mut entries = self.lock();
        let entry = entries.get_mut(&id).ok_or(DataError::NotShared(id))?;
        entry.refs -= 1;
        trace!(%id, refs = entry.refs, "sharing::release");
        if entry.refs == 0 {
            entries.remove(&id);
            debug!(%id, "shared view freed");
        }
        Ok(())
    }

    /// Current view of `id`.
    pub fn view(&self, id: NativeId) -> DataResult<Arc<DeviceBuffer>> {
        let entries = self.lock();
        let entry = entries.get(&id).ok_or(DataError::NotShared(id))?;
        let view = entry.view.clone().ok_or(DataError::StaleHandle {
            id,
            expected: 0,
            current: None,
        })?;
        view.check()?;
        Ok(view)
    }

    /// Reference count of `id`, 0 when not shared.
    pub fn ref_count(&self, id: NativeId) -> usize {
        self.lock().get(&id).map_or(0, |e| e.refs)
    }

    /// Whether `id` has at least one holder.
    pub fn is_shared(&self, id: NativeId) -> bool {
        self.ref_count(id) > 0
    }

    /// Entry and reference totals.
    pub fn stats(&self) -> SharingStats {
        let entries = self.lock();
        SharingStats {
            entries: entries.len(),
            refs: entries.values().map(|e| e.refs).sum(),
        }
    }

    /// Drop the view of `id` before its native resource is reallocated.
    pub fn before_reinitialize(&self, id: NativeId) {
        let had_view = {
            let mut entries = self.lock();
            entries.get_mut(&id).map(|e| e.view.take().is_some())
        };
        if had_view.is_some() {
            trace!(%id, "sharing::before_reinitialize");
            self.notify(id, ReinitPhase::Before);
        }
    }

    /// Recreate the view of `native` after it was reallocated.
    pub fn after_reinitialize(
        &self,
        native: &DeviceBuffer,
        device: &dyn DevicePrimitives,
    ) -> DataResult<()> {
        let id = native.id();
        let shared = {
            let mut entries = self.lock();
            match entries.get_mut(&id) {
                Some(entry) => {
                    entry.view = Some(Arc::new(device.alias(native)?));
                    true
                }
                None => false,
            }
        };
        if shared {
            trace!(%id, generation = native.generation(), "sharing::after_reinitialize");
            self.notify(id, ReinitPhase::After);
        }
        Ok(())
    }

    /// Register a callback fired for every reinitialization of a shared resource.
    ///
    /// Callbacks run without the entry table locked but must not register
    /// further observers.
    pub fn on_reinitialize<F>(&self, observer: F)
    where
        F: Fn(NativeId, ReinitPhase) + Send + Sync + 'static,
    {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(observer));
    }

    fn notify(&self, id: NativeId, phase: ReinitPhase) {
        let observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        for observer in observers.iter() {
            observer(id, phase);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<NativeId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SharingMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("SharingMap")
            .field("entries", &stats.entries)
            .field("refs", &stats.refs)
            .finish()
    }
}

/// RAII reference to a shared view.
///
/// Dropping the guard releases its reference in the owning map.
#[derive(Debug)]
pub struct SharedView {
    map: Option<Arc<SharingMap>>,
    id: NativeId,
}

impl SharedView {
    /// Native identity of the shared graphics resource.
    pub fn id(&self) -> NativeId {
        self.id
    }

    /// Current compute-side view.
    ///
    /// Fails with [`DataError::StaleHandle`] while the native resource is
    /// being reinitialized or after it changed without the hooks firing.
    pub fn buffer(&self) -> DataResult<Arc<DeviceBuffer>> {
        match &self.map {
            Some(map) => map.view(self.id),
            None => Err(DataError::NotShared(self.id)),
        }
    }

    /// Give up the guard without releasing; the caller must call
    /// [`SharingMap::release`] for the returned id.
    pub fn into_raw(mut self) -> NativeId {
        self.map = None;
        self.id
    }
}

impl Drop for SharedView {
    fn drop(&mut self) {
        if let Some(map) = self.map.take() {
            if let Err(e) = map.release(self.id) {
                warn!(id = %self.id, error = %e, "shared view release failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SoftPool;

    fn setup() -> (Arc<SharingMap>, crate::backend::SoftDevice, crate::backend::SoftDevice) {
        let pool = SoftPool::new();
        (Arc::new(SharingMap::new()), pool.device("gfx", 1024), pool.device("compute", 1024))
    }

    #[test]
    fn test_acquire_reuses_view() {
        let (map, gfx, cmp) = setup();
        let native = gfx.upload(&[1, 2, 3, 4]).unwrap();
        let a = map.acquire(&native, &cmp).unwrap();
        let b = map.acquire(&native, &cmp).unwrap();
        assert_eq!(map.ref_count(native.id()), 2);
        assert!(Arc::ptr_eq(&a.buffer().unwrap(), &b.buffer().unwrap()));
        drop(a);
        assert_eq!(map.ref_count(native.id()), 1);
        drop(b);
        assert_eq!(map.stats(), SharingStats::default());
    }

    #[test]
    fn test_extra_release_rejected() {
        let (map, gfx, cmp) = setup();
        let native = gfx.allocate(4).unwrap();
        let id = map.acquire(&native, &cmp).unwrap().into_raw();
        map.release(id).unwrap();
        assert!(matches!(map.release(id), Err(DataError::NotShared(_))));
    }

    #[test]
    fn test_view_unavailable_between_hooks() {
        let (map, gfx, cmp) = setup();
        let mut native = gfx.allocate(4).unwrap();
        let view = map.acquire(&native, &cmp).unwrap();
        map.before_reinitialize(native.id());
        assert!(view.buffer().unwrap_err().is_stale());
        gfx.resize(&mut native, 8).unwrap();
        map.after_reinitialize(&native, &cmp).unwrap();
        assert_eq!(view.buffer().unwrap().size(), 8);
    }
}
