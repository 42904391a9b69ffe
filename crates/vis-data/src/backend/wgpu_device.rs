//! wgpu device implementation.
//!
//! Buffers are storage buffers usable by both rasterization and compute
//! passes. Graphics and compute devices created through
//! [`WgpuDevice::share`] run on one `wgpu::Device`, so an alias is the same
//! buffer seen from the other device.

use std::sync::Arc;

use tracing::{debug, trace};

use super::device::{DeviceBuffer, DeviceLimits, DevicePrimitives, MemoryBudget, Storage};
use super::tracker::GenerationTracker;
use super::DeviceKind;
use crate::error::{DataError, DataResult};

const ALIGN: u64 = wgpu::COPY_BUFFER_ALIGNMENT;

#[inline]
fn padded(size: u64) -> u64 {
    size.div_ceil(ALIGN).max(1) * ALIGN
}

/// Device and queue shared by every device of one sharing group.
#[derive(Debug)]
struct WgpuShared {
    device: wgpu::Device,
    queue: wgpu::Queue,
    tracker: Arc<GenerationTracker>,
    max_buffer_size: u64,
}

/// GPU backing of a wgpu buffer.
#[derive(Debug)]
pub(crate) struct WgpuAllocation {
    buffer: wgpu::Buffer,
    size: u64,
    budget: Arc<MemoryBudget>,
}

impl Drop for WgpuAllocation {
    fn drop(&mut self) {
        self.buffer.destroy();
        self.budget.release(padded(self.size));
    }
}

/// wgpu graphics or compute device.
#[derive(Debug)]
pub struct WgpuDevice {
    name: String,
    shared: Arc<WgpuShared>,
    budget: Arc<MemoryBudget>,
    limits: DeviceLimits,
}

impl WgpuDevice {
    /// Check if a wgpu adapter is present.
    pub fn is_available() -> bool {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .is_some()
        })
    }

    /// Create a device with a byte budget.
    pub fn new(name: impl Into<String>, budget: u64) -> DataResult<Self> {
        pollster::block_on(Self::new_async(name.into(), budget))
    }

    async fn new_async(name: String, budget: u64) -> DataResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| DataError::BackendNotAvailable("no wgpu adapter".into()))?;

        let adapter_limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("vis_data_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter_limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| DataError::device(e.to_string()))?;

        let info = adapter.get_info();
        debug!(adapter = %info.name, backend = ?info.backend, "wgpu device created");

        Ok(Self {
            limits: DeviceLimits {
                max_buffer_bytes: adapter_limits.max_buffer_size.min(budget),
                budget,
            },
            budget: MemoryBudget::new(name.clone(), budget),
            name,
            shared: Arc::new(WgpuShared {
                device,
                queue,
                tracker: Arc::new(GenerationTracker::new()),
                max_buffer_size: adapter_limits.max_buffer_size,
            }),
        })
    }

    /// A second device on the same GPU device, sharing memory with this one.
    pub fn share(&self, name: impl Into<String>, budget: u64) -> Self {
        let name = name.into();
        Self {
            limits: DeviceLimits {
                max_buffer_bytes: self.shared.max_buffer_size.min(budget),
                budget,
            },
            budget: MemoryBudget::new(name.clone(), budget),
            name,
            shared: self.shared.clone(),
        }
    }

    fn storage<'a>(&self, buffer: &'a DeviceBuffer) -> DataResult<&'a Arc<WgpuAllocation>> {
        buffer.check_access(self.shared.tracker.group())?;
        match &buffer.storage {
            Storage::Wgpu(alloc) => Ok(alloc),
            _ => Err(DataError::device(format!("{} is not a wgpu buffer", buffer.id()))),
        }
    }

    fn create(&self, size: u64) -> DataResult<Arc<WgpuAllocation>> {
        if size > self.limits.max_buffer_bytes {
            return Err(DataError::ResourceExhausted {
                device: self.name.clone(),
                requested: size,
                available: self.limits.max_buffer_bytes,
            });
        }
        self.budget.reserve(padded(size))?;
        // New wgpu buffers are zero-initialized.
        let buffer = self.shared.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vis_data_buffer"),
            size: padded(size),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(Arc::new(WgpuAllocation {
            buffer,
            size,
            budget: self.budget.clone(),
        }))
    }

    fn download(&self, alloc: &WgpuAllocation) -> DataResult<Vec<u8>> {
        let size = padded(alloc.size);
        let staging = self.shared.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging_buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.shared.device.create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(&alloc.buffer, 0, &staging, 0, size);
        self.shared.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.shared.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| DataError::device("map channel closed"))?
            .map_err(|e| DataError::device(format!("map failed: {e}")))?;

        let data = slice.get_mapped_range();
        let mut result = data.to_vec();
        drop(data);
        staging.unmap();

        result.truncate(alloc.size as usize);
        Ok(result)
    }
}

impl DevicePrimitives for WgpuDevice {
    fn allocate(&self, size: u64) -> DataResult<DeviceBuffer> {
        trace!(device = %self.name, size, "wgpu::allocate");
        let alloc = self.create(size)?;
        Ok(DeviceBuffer::owned(Storage::Wgpu(alloc), size, self.shared.tracker.clone()))
    }

    fn write(&self, buffer: &DeviceBuffer, offset: u64, bytes: &[u8]) -> DataResult<()> {
        let alloc = self.storage(buffer)?;
        let end = offset + bytes.len() as u64;
        if end > alloc.size {
            return Err(vis_core::Error::size_mismatch(alloc.size as usize, end as usize).into());
        }
        if offset % ALIGN == 0 && bytes.len() as u64 % ALIGN == 0 {
            self.shared.queue.write_buffer(&alloc.buffer, offset, bytes);
        } else {
            // Unaligned edits go through a read-modify-write of the whole buffer.
            let mut whole = self.download(alloc)?;
            whole[offset as usize..end as usize].copy_from_slice(bytes);
            whole.resize(padded(alloc.size) as usize, 0);
            self.shared.queue.write_buffer(&alloc.buffer, 0, &whole);
        }
        self.shared.queue.submit(std::iter::empty::<wgpu::CommandBuffer>());
        self.shared.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn read(&self, buffer: &DeviceBuffer) -> DataResult<Vec<u8>> {
        let alloc = self.storage(buffer)?;
        self.download(alloc)
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
        let mut encoder = self.shared.device.create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(&from.buffer, 0, &to.buffer, 0, padded(from.size));
        self.shared.queue.submit(std::iter::once(encoder.finish()));
        self.shared.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn resize(&self, buffer: &mut DeviceBuffer, size: u64) -> DataResult<()> {
        self.storage(buffer)?;
        trace!(device = %self.name, id = %buffer.id(), from = buffer.size(), to = size, "wgpu::resize");
        let alloc = self.create(size)?;
        buffer.replace_storage(Storage::Wgpu(alloc), size)
    }

    fn share_group(&self) -> u64 {
        self.shared.tracker.group()
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
        DeviceKind::Wgpu
    }
}
