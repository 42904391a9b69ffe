//! Device abstraction for graphics and compute memory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use super::soft::SoftAllocation;
use super::tracker::{GenerationTracker, NativeId};
use super::DeviceKind;
use crate::error::{DataError, DataResult};

#[cfg(feature = "wgpu")]
use super::wgpu_device::WgpuAllocation;

/// Device capabilities and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Largest single buffer in bytes.
    pub max_buffer_bytes: u64,
    /// Byte budget for all live allocations.
    pub budget: u64,
}

// =============================================================================
// Memory Budget
// =============================================================================

/// Byte budget of one device. Allocations release their bytes on drop.
#[derive(Debug)]
pub(crate) struct MemoryBudget {
    device: String,
    limit: u64,
    used: AtomicU64,
}

impl MemoryBudget {
    pub(crate) fn new(device: impl Into<String>, limit: u64) -> Arc<Self> {
        Arc::new(Self {
            device: device.into(),
            limit,
            used: AtomicU64::new(0),
        })
    }

    /// Reserve `size` bytes or fail with [`DataError::ResourceExhausted`].
    pub(crate) fn reserve(&self, size: u64) -> DataResult<()> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(size).filter(|&total| total <= self.limit)
            })
            .map(|_| ())
            .map_err(|used| DataError::ResourceExhausted {
                device: self.device.clone(),
                requested: size,
                available: self.limit.saturating_sub(used),
            })
    }

    pub(crate) fn release(&self, size: u64) {
        self.used.fetch_sub(size, Ordering::AcqRel);
    }

    pub(crate) fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }
}

// =============================================================================
// DeviceBuffer
// =============================================================================

/// Backing storage of a buffer.
#[derive(Debug, Clone)]
pub(crate) enum Storage {
    Soft(Arc<SoftAllocation>),
    #[cfg(feature = "wgpu")]
    Wgpu(Arc<WgpuAllocation>),
}

/// Handle to a native device resource.
///
/// The owner handle retires its [`NativeId`] on drop. Alias handles
/// (created by [`DevicePrimitives::alias`]) share the storage but not the
/// ownership; every access through an alias fails with
/// [`DataError::StaleHandle`] once the owner was reallocated or dropped.
#[derive(Debug)]
pub struct DeviceBuffer {
    id: NativeId,
    generation: u64,
    size: u64,
    pub(crate) storage: Storage,
    tracker: Arc<GenerationTracker>,
    owner: bool,
}

impl DeviceBuffer {
    pub(crate) fn owned(storage: Storage, size: u64, tracker: Arc<GenerationTracker>) -> Self {
        let id = tracker.register();
        Self {
            id,
            generation: 0,
            size,
            storage,
            tracker,
            owner: true,
        }
    }

    /// Swap in new storage under the same identity, bumping the generation.
    pub(crate) fn replace_storage(&mut self, storage: Storage, size: u64) -> DataResult<()> {
        if !self.owner {
            return Err(DataError::device(format!("{} is an alias and cannot be reallocated", self.id)));
        }
        let generation = self.tracker.bump(self.id).ok_or(DataError::StaleHandle {
            id: self.id,
            expected: self.generation,
            current: None,
        })?;
        self.storage = storage;
        self.size = size;
        self.generation = generation;
        Ok(())
    }

    pub(crate) fn alias_of(&self) -> DataResult<Self> {
        self.check()?;
        Ok(Self {
            id: self.id,
            generation: self.generation,
            size: self.size,
            storage: self.storage.clone(),
            tracker: self.tracker.clone(),
            owner: false,
        })
    }

    /// Native identity.
    #[inline]
    pub fn id(&self) -> NativeId {
        self.id
    }

    /// Generation this handle refers to.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Logical size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether this handle owns the native resource.
    #[inline]
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Sharing group of the device that allocated the resource.
    #[inline]
    pub fn group(&self) -> u64 {
        self.tracker.group()
    }

    /// Fails with [`DataError::StaleHandle`] if the native resource changed.
    pub fn check(&self) -> DataResult<()> {
        match self.tracker.current(self.id) {
            Some(g) if g == self.generation => Ok(()),
            current => Err(DataError::StaleHandle {
                id: self.id,
                expected: self.generation,
                current,
            }),
        }
    }

    /// Whether the native resource changed since this handle was created.
    pub fn is_stale(&self) -> bool {
        self.check().is_err()
    }

    /// Validate access from a device of `group`.
    pub(crate) fn check_access(&self, group: u64) -> DataResult<()> {
        if self.group() != group {
            return Err(DataError::device(format!(
                "{} belongs to sharing group {}, accessed from group {}",
                self.id,
                self.group(),
                group
            )));
        }
        self.check()
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        if self.owner {
            trace!(id = %self.id, size = self.size, "DeviceBuffer::drop");
            self.tracker.retire(self.id);
        }
    }
}

// =============================================================================
// DevicePrimitives
// =============================================================================

/// Core operations of a graphics or compute device.
pub trait DevicePrimitives: Send + Sync {
    /// Allocate a zero-filled buffer of `size` bytes.
    fn allocate(&self, size: u64) -> DataResult<DeviceBuffer>;

    /// Write `bytes` at byte `offset`.
    fn write(&self, buffer: &DeviceBuffer, offset: u64, bytes: &[u8]) -> DataResult<()>;

    /// Read the whole buffer back to host memory.
    fn read(&self, buffer: &DeviceBuffer) -> DataResult<Vec<u8>>;

    /// Copy `src` into `dst`; sizes must match.
    fn copy(&self, src: &DeviceBuffer, dst: &DeviceBuffer) -> DataResult<()>;

    /// Reallocate `buffer` to `size` bytes under the same identity.
    ///
    /// Contents are reset to zero and the generation advances, so every
    /// existing alias becomes stale.
    fn resize(&self, buffer: &mut DeviceBuffer, size: u64) -> DataResult<()>;

    /// Sharing group; devices in the same group alias each other's memory.
    fn share_group(&self) -> u64;

    /// Bytes currently allocated against the budget.
    fn memory_used(&self) -> u64;

    /// Device limits.
    fn limits(&self) -> &DeviceLimits;

    /// Device name.
    fn name(&self) -> &str;

    /// Implementation kind.
    fn kind(&self) -> DeviceKind;

    /// Allocate and fill a buffer.
    fn upload(&self, bytes: &[u8]) -> DataResult<DeviceBuffer> {
        let buffer = self.allocate(bytes.len() as u64)?;
        self.write(&buffer, 0, bytes)?;
        Ok(buffer)
    }

    /// Import a resource owned by another device of the same sharing group.
    fn alias(&self, native: &DeviceBuffer) -> DataResult<DeviceBuffer> {
        if native.group() != self.share_group() {
            return Err(DataError::BackendNotAvailable(format!(
                "{} cannot alias {} from another sharing group",
                self.name(),
                native.id()
            )));
        }
        let alias = native.alias_of()?;
        trace!(device = self.name(), id = %alias.id(), generation = alias.generation(), "alias");
        Ok(alias)
    }

    /// Whether this device can alias memory of `other`.
    fn can_share_with(&self, other: &dyn DevicePrimitives) -> bool {
        self.share_group() == other.share_group()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_reserve_release() {
        let budget = MemoryBudget::new("test", 100);
        budget.reserve(60).unwrap();
        let err = budget.reserve(50).unwrap_err();
        match err {
            DataError::ResourceExhausted { requested, available, .. } => {
                assert_eq!(requested, 50);
                assert_eq!(available, 40);
            }
            other => panic!("unexpected error: {other}"),
        }
        budget.release(60);
        budget.reserve(100).unwrap();
        assert_eq!(budget.used(), 100);
    }
}
