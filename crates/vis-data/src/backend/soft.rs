//! Software device: graphics or compute memory emulated in host memory.
//!
//! A [`SoftPool`] is one memory-sharing group. Devices created from the
//! same pool can alias each other's buffers, which is how a software
//! graphics device and a software compute device model API interop.
//! Each device enforces its own byte budget.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use super::device::{DeviceBuffer, DeviceLimits, DevicePrimitives, MemoryBudget, Storage};
use super::tracker::GenerationTracker;
use super::DeviceKind;
use crate::error::DataResult;

/// Memory-sharing group for software devices.
#[derive(Debug, Clone, Default)]
pub struct SoftPool {
    tracker: Arc<GenerationTracker>,
}

impl SoftPool {
    /// Creates a new, empty sharing group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a device in this group with a byte budget.
    pub fn device(&self, name: impl Into<String>, budget: u64) -> SoftDevice {
        let name = name.into();
        SoftDevice {
            budget: MemoryBudget::new(name.clone(), budget),
            name,
            tracker: self.tracker.clone(),
            limits: DeviceLimits {
                max_buffer_bytes: budget,
                budget,
            },
        }
    }

    /// Number of live native resources in the group.
    pub fn live_resources(&self) -> usize {
        self.tracker.live_count()
    }
}

/// Host-memory backing of a software buffer.
#[derive(Debug)]
pub(crate) struct SoftAllocation {
    bytes: RwLock<Vec<u8>>,
    size: u64,
    budget: Arc<MemoryBudget>,
}

impl SoftAllocation {
    fn new(size: u64, budget: &Arc<MemoryBudget>) -> DataResult<Arc<Self>> {
        budget.reserve(size)?;
        Ok(Arc::new(Self {
            bytes: RwLock::new(vec![0; size as usize]),
            size,
            budget: budget.clone(),
        }))
    }
}

impl Drop for SoftAllocation {
    fn drop(&mut self) {
        self.budget.release(self.size);
    }
}

/// Software graphics or compute device.
#[derive(Debug)]
pub struct SoftDevice {
    name: String,
    tracker: Arc<GenerationTracker>,
    budget: Arc<MemoryBudget>,
    limits: DeviceLimits,
}

impl SoftDevice {
    /// Creates a device in its own sharing group.
    pub fn new(name: impl Into<String>, budget: u64) -> Self {
        SoftPool::new().device(name, budget)
    }

    fn storage<'a>(&self, buffer: &'a DeviceBuffer) -> DataResult<&'a Arc<SoftAllocation>> {
        buffer.check_access(self.tracker.group())?;
        match &buffer.storage {
            Storage::Soft(alloc) => Ok(alloc),
            #[cfg(feature = "wgpu")]
            _ => Err(crate::error::DataError::device(format!("{} is not a software buffer", buffer.id()))),
        }
    }
}

impl DevicePrimitives for SoftDevice {
    fn allocate(&self, size: u64) -> DataResult<DeviceBuffer> {
        trace!(device = %self.name, size, "soft::allocate");
        let alloc = SoftAllocation::new(size, &self.budget)?;
        Ok(DeviceBuffer::owned(Storage::Soft(alloc), size, self.tracker.clone()))
    }

    fn write(&self, buffer: &DeviceBuffer, offset: u64, bytes: &[u8]) -> DataResult<()> {
        let alloc = self.storage(buffer)?;
        let end = offset + bytes.len() as u64;
        if end > alloc.size {
            return Err(vis_core::Error::size_mismatch(alloc.size as usize, end as usize).into());
        }
        let mut dst = alloc.bytes.write().unwrap_or_else(PoisonError::into_inner);
        dst[offset as usize..end as usize].copy_from_slice(bytes);
        Ok(())
    }

    fn read(&self, buffer: &DeviceBuffer) -> DataResult<Vec<u8>> {
        let alloc = self.storage(buffer)?;
        let src = alloc.bytes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(src.clone())
    }

    fn copy(&self, src: &DeviceBuffer, dst: &DeviceBuffer) -> DataResult<()> {
        let from = self.storage(src)?;
        let to = self.storage(dst)?;
        if from.size != to.size {
            return Err(vis_core::Error::size_mismatch(to.size as usize, from.size as usize).into());
        }
        if Arc::ptr_eq(from, to) {
            return Ok(());
        }
        let bytes = from.bytes.read().unwrap_or_else(PoisonError::into_inner);
        to.bytes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .copy_from_slice(&bytes);
        Ok(())
    }

    fn resize(&self, buffer: &mut DeviceBuffer, size: u64) -> DataResult<()> {
        self.storage(buffer)?;
        trace!(device = %self.name, id = %buffer.id(), from = buffer.size(), to = size, "soft::resize");
        let alloc = SoftAllocation::new(size, &self.budget)?;
        buffer.replace_storage(Storage::Soft(alloc), size)
    }

    fn share_group(&self) -> u64 {
        self.tracker.group()
    }

    fn memory_used(&self) -> u64 {
        self.budget.used()
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Soft
    }
}
