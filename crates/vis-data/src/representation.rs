//! Backend-specific containers for one logical dataset.
//!
//! A [`Representation`] is a closed enum over the three backends. Typed
//! access goes through [`BackendRep`], which maps each container type to its
//! [`BackendTag`] without downcasting:
//!
//! ```text
//! Representation::Host(HostRep)          flat HostData in host memory
//! Representation::Graphics(GraphicsRep)  DeviceBuffer on the graphics device
//! Representation::Compute(ComputeRep)    owned DeviceBuffer or SharedView
//! ```
//!
//! Representations know nothing about each other; moving data between
//! backends is the job of [`crate::converter`].

use std::sync::Arc;

use glam::{IVec3, UVec3};
use tracing::trace;
use vis_core::brick::{self, element_count, linear_index, Brick};
use vis_core::dispatch::{dispatch_mut, TypedVisitorMut};
use vis_core::subregion::{self, BorderMode};
use vis_core::{DataFormat, Element, HostData};

use crate::backend::{BackendTag, DeviceBuffer, DevicePrimitives, NativeId};
use crate::context::BackendContext;
use crate::error::{DataError, DataResult};
use crate::sharing::SharedView;

/// Byte length of an array of `extent` elements of `format`.
#[inline]
pub fn byte_len(format: DataFormat, extent: UVec3) -> u64 {
    element_count(extent) as u64 * format.size_in_bytes() as u64
}

fn scalar_offset(format: DataFormat, extent: UVec3, pos: UVec3, component: usize) -> DataResult<usize> {
    if !pos.cmplt(extent).all() || component >= format.components() {
        return Err(vis_core::Error::invalid_region(pos.as_ivec3(), UVec3::ONE, extent).into());
    }
    Ok(linear_index(pos, extent) * format.components() + component)
}

fn check_layout(
    format: DataFormat,
    extent: UVec3,
    other_format: DataFormat,
    other_extent: UVec3,
) -> DataResult<()> {
    if format != other_format {
        return Err(DataError::type_mismatch(format, other_format));
    }
    if extent != other_extent {
        return Err(DataError::ExtentMismatch {
            expected: extent,
            actual: other_extent,
        });
    }
    Ok(())
}

// =============================================================================
// HostRep
// =============================================================================

/// Flat array in host memory.
#[derive(Debug, Clone, PartialEq)]
pub struct HostRep {
    format: DataFormat,
    extent: UVec3,
    data: HostData,
}

struct FillBrick<'a> {
    extent: UVec3,
    brick: &'a Brick,
    value: f64,
}

impl TypedVisitorMut for FillBrick<'_> {
    type Output = vis_core::Result<()>;

    fn visit<T: Element, const C: usize>(self, data: &mut [T]) -> vis_core::Result<()> {
        let v = T::from_f64(self.value);
        brick::for_each_mut(data, C, self.extent, self.brick, |_, elem| elem.fill(v))
    }
}

impl HostRep {
    /// Zero-filled array.
    pub fn new(format: DataFormat, extent: UVec3) -> Self {
        let len = element_count(extent) * format.components();
        Self {
            format,
            extent,
            data: HostData::zeros(format.scalar_type(), len),
        }
    }

    /// Wrap existing scalars, checking type and length.
    pub fn from_data(format: DataFormat, extent: UVec3, data: HostData) -> DataResult<Self> {
        if data.scalar_type() != format.scalar_type() {
            return Err(DataError::type_mismatch(format, data.scalar_type()));
        }
        let expected = element_count(extent) * format.components();
        if data.len() != expected {
            return Err(vis_core::Error::size_mismatch(expected, data.len()).into());
        }
        Ok(Self {
            format,
            extent,
            data,
        })
    }

    /// Wrap a typed vector of `components`-wide elements.
    pub fn from_vec<T: Element>(components: u8, extent: UVec3, data: Vec<T>) -> DataResult<Self> {
        let format = DataFormat::new(T::SCALAR, components)?;
        Self::from_data(format, extent, HostData::from_vec(data))
    }

    /// Element format.
    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Extent in elements.
    pub fn extent(&self) -> UVec3 {
        self.extent
    }

    /// Scalars.
    pub fn data(&self) -> &HostData {
        &self.data
    }

    /// Mutable scalars.
    pub fn data_mut(&mut self) -> &mut HostData {
        &mut self.data
    }

    /// Consume into the scalars.
    pub fn into_data(self) -> HostData {
        self.data
    }

    /// Typed scalars.
    pub fn as_slice<T: Element>(&self) -> DataResult<&[T]> {
        Ok(self.data.as_slice()?)
    }

    /// Mutable typed scalars.
    pub fn as_mut_slice<T: Element>(&mut self) -> DataResult<&mut [T]> {
        Ok(self.data.as_mut_slice()?)
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.data.size_bytes() as u64
    }

    /// One component of the element at `pos`, widened to f64.
    pub fn value(&self, pos: UVec3, component: usize) -> Option<f64> {
        let idx = scalar_offset(self.format, self.extent, pos, component).ok()?;
        self.data.get_f64(idx)
    }

    /// Store one component of the element at `pos`.
    pub fn set_value(&mut self, pos: UVec3, component: usize, value: f64) -> DataResult<()> {
        let idx = scalar_offset(self.format, self.extent, pos, component)?;
        self.data.set_f64(idx, value);
        Ok(())
    }

    /// Set every component of every element in `region` to `value`.
    pub fn fill_region(&mut self, region: &Brick, value: f64) -> DataResult<()> {
        let visitor = FillBrick {
            extent: self.extent,
            brick: region,
            value,
        };
        dispatch_mut(self.format, &mut self.data, visitor)??;
        Ok(())
    }

    /// Independent copy of `extent` elements at `offset`.
    pub fn sub_region(&self, offset: IVec3, extent: UVec3, border: BorderMode) -> DataResult<HostRep> {
        let (data, out) = subregion::sub_region(self.format, &self.data, self.extent, offset, extent, border)?;
        Self::from_data(self.format, out, data)
    }

    /// Reallocate to `extent`; contents are reset to zero.
    pub fn resize(&mut self, extent: UVec3) {
        *self = Self::new(self.format, extent);
    }

    /// Overwrite the scalars from raw bytes of the same length.
    pub fn copy_from_bytes(&mut self, bytes: &[u8]) -> DataResult<()> {
        if bytes.len() != self.data.size_bytes() {
            return Err(vis_core::Error::size_mismatch(self.data.size_bytes(), bytes.len()).into());
        }
        self.data.as_bytes_mut().copy_from_slice(bytes);
        Ok(())
    }
}

// =============================================================================
// GraphicsRep
// =============================================================================

/// Array in graphics-device memory.
#[derive(Debug)]
pub struct GraphicsRep {
    format: DataFormat,
    extent: UVec3,
    buffer: DeviceBuffer,
}

impl GraphicsRep {
    /// Zero-filled array on the graphics device.
    pub fn new(ctx: &BackendContext, format: DataFormat, extent: UVec3) -> DataResult<Self> {
        let buffer = ctx.graphics().allocate(byte_len(format, extent))?;
        Ok(Self {
            format,
            extent,
            buffer,
        })
    }

    /// Upload a host array.
    pub fn upload(ctx: &BackendContext, host: &HostRep) -> DataResult<Self> {
        let buffer = ctx.graphics().upload(host.data().as_bytes())?;
        Ok(Self {
            format: host.format(),
            extent: host.extent(),
            buffer,
        })
    }

    /// Element format.
    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Extent in elements.
    pub fn extent(&self) -> UVec3 {
        self.extent
    }

    /// Native device buffer.
    pub fn buffer(&self) -> &DeviceBuffer {
        &self.buffer
    }

    /// Native identity.
    pub fn native_id(&self) -> NativeId {
        self.buffer.id()
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.buffer.size()
    }

    /// Overwrite the contents with bytes of the same length.
    pub fn write_bytes(&self, ctx: &BackendContext, bytes: &[u8]) -> DataResult<()> {
        ctx.graphics().write(&self.buffer, 0, bytes)
    }

    /// Overwrite the contents from a host array of the same layout.
    pub fn write_host(&self, ctx: &BackendContext, host: &HostRep) -> DataResult<()> {
        check_layout(self.format, self.extent, host.format(), host.extent())?;
        self.write_bytes(ctx, host.data().as_bytes())
    }

    /// Read the contents back into host memory.
    pub fn download(&self, ctx: &BackendContext) -> DataResult<HostRep> {
        let bytes = ctx.graphics().read(&self.buffer)?;
        let data = HostData::from_bytes(self.format.scalar_type(), &bytes)?;
        HostRep::from_data(self.format, self.extent, data)
    }

    /// One component of the element at `pos`.
    pub fn value(&self, ctx: &BackendContext, pos: UVec3, component: usize) -> DataResult<f64> {
        read_value(ctx.graphics(), &self.buffer, self.format, self.extent, pos, component)
    }

    /// Store one component of the element at `pos`.
    pub fn set_value(
        &self,
        ctx: &BackendContext,
        pos: UVec3,
        component: usize,
        value: f64,
    ) -> DataResult<()> {
        write_value(ctx.graphics(), &self.buffer, self.format, self.extent, pos, component, value)
    }

    /// Reallocate to `extent` under the same native identity.
    ///
    /// Contents are reset to zero. Shared compute views are torn down before
    /// the reallocation and recreated after it.
    pub fn resize(&mut self, ctx: &BackendContext, extent: UVec3) -> DataResult<()> {
        trace!(id = %self.native_id(), from = %self.extent, to = %extent, "GraphicsRep::resize");
        let sharing = ctx.sharing();
        sharing.before_reinitialize(self.buffer.id());
        ctx.graphics()
            .resize(&mut self.buffer, byte_len(self.format, extent))?;
        self.extent = extent;
        sharing.after_reinitialize(&self.buffer, ctx.compute())
    }

    /// Deep copy on the graphics device.
    pub fn duplicate(&self, ctx: &BackendContext) -> DataResult<Self> {
        let copy = Self::new(ctx, self.format, self.extent)?;
        ctx.graphics().copy(&self.buffer, &copy.buffer)?;
        Ok(copy)
    }
}

// =============================================================================
// ComputeRep
// =============================================================================

#[derive(Debug)]
enum ComputeMemory {
    Owned(DeviceBuffer),
    /// View plus the generation the format and extent were taken from.
    Shared(SharedView, u64),
}

/// Array in compute-device memory, owned or shared with a graphics resource.
///
/// A shared array describes the graphics resource as it was when the view
/// was acquired. After the resource is reallocated, raw byte access follows
/// the recreated view but element access fails with
/// [`DataError::StaleHandle`] until the array is shared again.
#[derive(Debug)]
pub struct ComputeRep {
    format: DataFormat,
    extent: UVec3,
    memory: ComputeMemory,
}

impl ComputeRep {
    /// Zero-filled array owned by the compute device.
    pub fn new(ctx: &BackendContext, format: DataFormat, extent: UVec3) -> DataResult<Self> {
        let buffer = ctx.compute().allocate(byte_len(format, extent))?;
        Ok(Self {
            format,
            extent,
            memory: ComputeMemory::Owned(buffer),
        })
    }

    /// Upload a host array to the compute device.
    pub fn upload(ctx: &BackendContext, host: &HostRep) -> DataResult<Self> {
        let buffer = ctx.compute().upload(host.data().as_bytes())?;
        Ok(Self {
            format: host.format(),
            extent: host.extent(),
            memory: ComputeMemory::Owned(buffer),
        })
    }

    /// View of a graphics array through the sharing map.
    pub fn shared(ctx: &BackendContext, graphics: &GraphicsRep) -> DataResult<Self> {
        let view = ctx.sharing().acquire(graphics.buffer(), ctx.compute())?;
        Ok(Self {
            format: graphics.format(),
            extent: graphics.extent(),
            memory: ComputeMemory::Shared(view, graphics.buffer().generation()),
        })
    }

    /// Element format.
    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Extent in elements.
    pub fn extent(&self) -> UVec3 {
        self.extent
    }

    /// Whether the memory is shared with a graphics resource.
    pub fn is_shared(&self) -> bool {
        matches!(self.memory, ComputeMemory::Shared(..))
    }

    /// Native identity of the underlying resource.
    pub fn native_id(&self) -> NativeId {
        match &self.memory {
            ComputeMemory::Owned(b) => b.id(),
            ComputeMemory::Shared(v, _) => v.id(),
        }
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> u64 {
        byte_len(self.format, self.extent)
    }

    /// Run `f` on the current device buffer.
    ///
    /// Fails with [`DataError::StaleHandle`] if a shared view no longer
    /// matches its native resource.
    pub fn with_buffer<R>(&self, f: impl FnOnce(&DeviceBuffer) -> DataResult<R>) -> DataResult<R> {
        match &self.memory {
            ComputeMemory::Owned(b) => f(b),
            ComputeMemory::Shared(v, _) => {
                let view: Arc<DeviceBuffer> = v.buffer()?;
                f(&view)
            }
        }
    }

    /// Like [`ComputeRep::with_buffer`], but also fails when a shared view
    /// was recreated for a reallocated resource this array's extent no
    /// longer describes.
    pub fn with_layout<R>(&self, f: impl FnOnce(&DeviceBuffer) -> DataResult<R>) -> DataResult<R> {
        self.with_buffer(|b| {
            if let ComputeMemory::Shared(_, generation) = &self.memory {
                if b.generation() != *generation {
                    return Err(DataError::StaleHandle {
                        id: b.id(),
                        expected: *generation,
                        current: Some(b.generation()),
                    });
                }
            }
            f(b)
        })
    }

    /// Whether the memory is reachable and matches this array's layout.
    pub fn is_current(&self) -> bool {
        self.with_layout(|_| Ok(())).is_ok()
    }

    /// Replace a shared view with an owned copy of its contents.
    ///
    /// No-op for owned memory.
    pub fn detach(&mut self, ctx: &BackendContext) -> DataResult<()> {
        if self.is_shared() {
            let bytes = self.with_layout(|b| ctx.compute().read(b))?;
            let owned = ctx.compute().upload(&bytes)?;
            trace!(id = %self.native_id(), copy = %owned.id(), "ComputeRep::detach");
            self.memory = ComputeMemory::Owned(owned);
        }
        Ok(())
    }

    /// Overwrite the contents with bytes of the same length.
    pub fn write_bytes(&self, ctx: &BackendContext, bytes: &[u8]) -> DataResult<()> {
        self.with_buffer(|b| ctx.compute().write(b, 0, bytes))
    }

    /// Overwrite the contents from a host array of the same layout.
    pub fn write_host(&self, ctx: &BackendContext, host: &HostRep) -> DataResult<()> {
        check_layout(self.format, self.extent, host.format(), host.extent())?;
        self.with_layout(|b| ctx.compute().write(b, 0, host.data().as_bytes()))
    }

    /// Raw contents.
    pub fn read_bytes(&self, ctx: &BackendContext) -> DataResult<Vec<u8>> {
        self.with_buffer(|b| ctx.compute().read(b))
    }

    /// Read the contents back into host memory.
    pub fn download(&self, ctx: &BackendContext) -> DataResult<HostRep> {
        let bytes = self.with_layout(|b| ctx.compute().read(b))?;
        let data = HostData::from_bytes(self.format.scalar_type(), &bytes)?;
        HostRep::from_data(self.format, self.extent, data)
    }

    /// One component of the element at `pos`.
    pub fn value(&self, ctx: &BackendContext, pos: UVec3, component: usize) -> DataResult<f64> {
        self.with_layout(|b| read_value(ctx.compute(), b, self.format, self.extent, pos, component))
    }

    /// Store one component of the element at `pos`.
    pub fn set_value(
        &self,
        ctx: &BackendContext,
        pos: UVec3,
        component: usize,
        value: f64,
    ) -> DataResult<()> {
        self.with_layout(|b| write_value(ctx.compute(), b, self.format, self.extent, pos, component, value))
    }

    /// Reallocate to `extent`; contents are reset to zero.
    ///
    /// A shared array detaches from its graphics resource and becomes owned.
    pub fn resize(&mut self, ctx: &BackendContext, extent: UVec3) -> DataResult<()> {
        let size = byte_len(self.format, extent);
        if let ComputeMemory::Owned(b) = &mut self.memory {
            ctx.compute().resize(b, size)?;
        } else {
            self.memory = ComputeMemory::Owned(ctx.compute().allocate(size)?);
        }
        self.extent = extent;
        Ok(())
    }

    /// Deep copy owned by the compute device.
    pub fn duplicate(&self, ctx: &BackendContext) -> DataResult<Self> {
        let bytes = self.with_layout(|b| ctx.compute().read(b))?;
        Ok(Self {
            format: self.format,
            extent: self.extent,
            memory: ComputeMemory::Owned(ctx.compute().upload(&bytes)?),
        })
    }
}

fn read_value(
    device: &dyn DevicePrimitives,
    buffer: &DeviceBuffer,
    format: DataFormat,
    extent: UVec3,
    pos: UVec3,
    component: usize,
) -> DataResult<f64> {
    let idx = scalar_offset(format, extent, pos, component)?;
    let size = format.scalar_type().size_in_bytes();
    let bytes = device.read(buffer)?;
    let raw = bytes
        .get(idx * size..(idx + 1) * size)
        .ok_or_else(|| vis_core::Error::size_mismatch((idx + 1) * size, bytes.len()))?;
    let scalar = HostData::from_bytes(format.scalar_type(), raw)?;
    scalar
        .get_f64(0)
        .ok_or_else(|| DataError::device("empty scalar read"))
}

fn write_value(
    device: &dyn DevicePrimitives,
    buffer: &DeviceBuffer,
    format: DataFormat,
    extent: UVec3,
    pos: UVec3,
    component: usize,
    value: f64,
) -> DataResult<()> {
    let idx = scalar_offset(format, extent, pos, component)?;
    let mut scalar = HostData::zeros(format.scalar_type(), 1);
    scalar.set_f64(0, value);
    let offset = (idx * format.scalar_type().size_in_bytes()) as u64;
    device.write(buffer, offset, scalar.as_bytes())
}

// =============================================================================
// Representation
// =============================================================================

/// Closed set of backend containers.
#[derive(Debug)]
pub enum Representation {
    /// Host memory.
    Host(HostRep),
    /// Graphics device memory.
    Graphics(GraphicsRep),
    /// Compute device memory.
    Compute(ComputeRep),
}

impl Representation {
    /// Backend this representation lives in.
    pub fn tag(&self) -> BackendTag {
        match self {
            Self::Host(_) => BackendTag::Host,
            Self::Graphics(_) => BackendTag::Graphics,
            Self::Compute(_) => BackendTag::Compute,
        }
    }

    /// Element format.
    pub fn format(&self) -> DataFormat {
        match self {
            Self::Host(r) => r.format(),
            Self::Graphics(r) => r.format(),
            Self::Compute(r) => r.format(),
        }
    }

    /// Extent in elements.
    pub fn extent(&self) -> UVec3 {
        match self {
            Self::Host(r) => r.extent(),
            Self::Graphics(r) => r.extent(),
            Self::Compute(r) => r.extent(),
        }
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> u64 {
        match self {
            Self::Host(r) => r.size_bytes(),
            Self::Graphics(r) => r.size_bytes(),
            Self::Compute(r) => r.size_bytes(),
        }
    }

    /// Deep copy within the same backend.
    pub fn duplicate(&self, ctx: &BackendContext) -> DataResult<Self> {
        Ok(match self {
            Self::Host(r) => Self::Host(r.clone()),
            Self::Graphics(r) => Self::Graphics(r.duplicate(ctx)?),
            Self::Compute(r) => Self::Compute(r.duplicate(ctx)?),
        })
    }

    /// Reallocate to `extent`; contents are reset to zero.
    pub fn resize(&mut self, ctx: &BackendContext, extent: UVec3) -> DataResult<()> {
        match self {
            Self::Host(r) => {
                r.resize(extent);
                Ok(())
            }
            Self::Graphics(r) => r.resize(ctx, extent),
            Self::Compute(r) => r.resize(ctx, extent),
        }
    }
}

/// Typed access to one variant of [`Representation`].
pub trait BackendRep: Sized + Into<Representation> + 'static {
    /// Backend tag of this container type.
    const TAG: BackendTag;

    /// Borrow the matching variant.
    fn from_rep(rep: &Representation) -> Option<&Self>;

    /// Mutably borrow the matching variant.
    fn from_rep_mut(rep: &mut Representation) -> Option<&mut Self>;

    /// Borrow the matching variant or fail with [`DataError::TypeMismatch`].
    fn expect(rep: &Representation) -> DataResult<&Self> {
        Self::from_rep(rep).ok_or_else(|| DataError::type_mismatch(Self::TAG, rep.tag()))
    }

    /// Mutable counterpart of [`BackendRep::expect`].
    fn expect_mut(rep: &mut Representation) -> DataResult<&mut Self> {
        let actual = rep.tag();
        Self::from_rep_mut(rep).ok_or_else(|| DataError::type_mismatch(Self::TAG, actual))
    }
}

macro_rules! impl_backend_rep {
    ($t:ty, $variant:ident) => {
        impl From<$t> for Representation {
            fn from(rep: $t) -> Self {
                Representation::$variant(rep)
            }
        }

        impl BackendRep for $t {
            const TAG: BackendTag = BackendTag::$variant;

            #[inline]
            fn from_rep(rep: &Representation) -> Option<&Self> {
                match rep {
                    Representation::$variant(r) => Some(r),
                    _ => None,
                }
            }

            #[inline]
            fn from_rep_mut(rep: &mut Representation) -> Option<&mut Self> {
                match rep {
                    Representation::$variant(r) => Some(r),
                    _ => None,
                }
            }
        }
    };
}

impl_backend_rep!(HostRep, Host);
impl_backend_rep!(GraphicsRep, Graphics);
impl_backend_rep!(ComputeRep, Compute);
