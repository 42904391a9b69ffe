//! Sub-region extraction with border policies.
//!
//! Extraction is split in two steps:
//! 1. [`plan`] resolves a requested offset and extent against the source
//!    dimensions and a [`BorderMode`], producing a [`RegionPlan`].
//! 2. [`extract`] (typed) or [`extract_host`] (runtime format) copies the
//!    planned voxels scanline by scanline into a new, independent buffer.
//!
//! # Border Modes
//!
//! ```text
//! source 3 wide, request offset -1 extent 3 along x:
//!
//!   Clamp:  [a b]       output clipped to the source
//!   Fill:   [0 a b]     requested size kept, outside cells zero
//! ```
//!
//! A request with a zero-sized extent falls back to the full frame and
//! logs a warning.
//!
//! # Parallelism
//!
//! Each output z-slice is filled by its own rayon task; all tasks read the
//! same immutable source.

use glam::{IVec3, I64Vec3, UVec3};
use rayon::prelude::*;
use tracing::{trace, warn};

use crate::brick::{element_count, linear_index, Brick};
use crate::dispatch::{dispatch, TypedVisitor};
use crate::element::Element;
use crate::format::DataFormat;
use crate::host::HostData;
use crate::{Error, Result};

/// How out-of-bounds parts of a request are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BorderMode {
    /// Clip the output to the source bounds.
    #[default]
    Clamp,
    /// Keep the requested size and zero-fill outside cells.
    Fill,
}

impl BorderMode {
    /// Parse from a name (`clamp` or `fill`).
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "clamp" => Some(Self::Clamp),
            "fill" => Some(Self::Fill),
            _ => None,
        }
    }
}

/// Resolved extraction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionPlan {
    /// Dimensions of the extracted array.
    pub output: UVec3,
    /// Source voxels that are copied; empty when nothing overlaps.
    pub src: Brick,
    /// Where `src` lands inside the output.
    pub dst_offset: UVec3,
}

impl RegionPlan {
    /// Plan that copies a whole array of `dims`.
    pub fn full(dims: UVec3) -> Self {
        Self {
            output: dims,
            src: Brick::full(dims),
            dst_offset: UVec3::ZERO,
        }
    }
}

/// Resolve a request of `extent` voxels at `offset` against a source of `dims`.
///
/// Errors with [`Error::InvalidRegion`] when `Clamp` leaves nothing to copy.
pub fn plan(dims: UVec3, offset: IVec3, extent: UVec3, border: BorderMode) -> Result<RegionPlan> {
    if extent.min_element() == 0 {
        warn!(
            ?offset,
            ?extent,
            ?dims,
            "zero-sized sub-region requested, using full frame"
        );
        return Ok(RegionPlan::full(dims));
    }

    let lo = offset.as_i64vec3();
    let hi = lo + extent.as_i64vec3();
    let clip_lo = lo.max(I64Vec3::ZERO);
    let clip_hi = hi.min(dims.as_i64vec3());
    let overlap = clip_lo.cmplt(clip_hi).all();

    let plan = match border {
        BorderMode::Clamp => {
            if !overlap {
                return Err(Error::invalid_region(offset, extent, dims));
            }
            RegionPlan {
                output: (clip_hi - clip_lo).as_uvec3(),
                src: Brick::new(clip_lo.as_uvec3(), (clip_hi - clip_lo).as_uvec3()),
                dst_offset: UVec3::ZERO,
            }
        }
        BorderMode::Fill => {
            if overlap {
                RegionPlan {
                    output: extent,
                    src: Brick::new(clip_lo.as_uvec3(), (clip_hi - clip_lo).as_uvec3()),
                    dst_offset: (clip_lo - lo).as_uvec3(),
                }
            } else {
                RegionPlan {
                    output: extent,
                    src: Brick::default(),
                    dst_offset: UVec3::ZERO,
                }
            }
        }
    };
    trace!(?offset, ?extent, ?border, src = %plan.src, "subregion::plan");
    Ok(plan)
}

/// Copy the voxels described by `plan` out of `src`.
///
/// `src` holds `components` interleaved scalars per voxel of an array of
/// `dims`. Cells of the output not covered by `plan.src` are zero.
pub fn extract<T: Element>(
    src: &[T],
    components: usize,
    dims: UVec3,
    plan: &RegionPlan,
) -> Result<Vec<T>> {
    let expected = element_count(dims) * components;
    if src.len() != expected {
        return Err(Error::size_mismatch(expected, src.len()));
    }
    if !plan.src.fits(dims) {
        return Err(Error::invalid_region(plan.src.offset.as_ivec3(), plan.src.extent, dims));
    }
    let fits_output = (plan.dst_offset + plan.src.extent).cmple(plan.output).all();
    if !plan.src.is_empty() && !fits_output {
        return Err(Error::invalid_region(plan.dst_offset.as_ivec3(), plan.src.extent, plan.output));
    }

    let mut out = vec![T::default(); element_count(plan.output) * components];
    if out.is_empty() || plan.src.is_empty() {
        return Ok(out);
    }

    let out_dims = plan.output;
    let slice_len = out_dims.x as usize * out_dims.y as usize * components;
    let run = plan.src.extent.x as usize * components;
    let z_range = plan.dst_offset.z..plan.dst_offset.z + plan.src.extent.z;

    out.par_chunks_mut(slice_len)
        .enumerate()
        .for_each(|(z, slice)| {
            let z = z as u32;
            if !z_range.contains(&z) {
                return;
            }
            let sz = plan.src.offset.z + (z - plan.dst_offset.z);
            for y in 0..plan.src.extent.y {
                let s = linear_index(
                    UVec3::new(plan.src.offset.x, plan.src.offset.y + y, sz),
                    dims,
                ) * components;
                let d = (plan.dst_offset.x as usize
                    + (plan.dst_offset.y + y) as usize * out_dims.x as usize)
                    * components;
                slice[d..d + run].copy_from_slice(&src[s..s + run]);
            }
        });

    Ok(out)
}

struct Extract<'a> {
    dims: UVec3,
    plan: &'a RegionPlan,
}

impl TypedVisitor for Extract<'_> {
    type Output = Result<HostData>;

    fn visit<T: Element, const C: usize>(self, data: &[T]) -> Result<HostData> {
        extract(data, C, self.dims, self.plan).map(T::into_host)
    }
}

/// Runtime-format counterpart of [`extract`].
pub fn extract_host(
    format: DataFormat,
    data: &HostData,
    dims: UVec3,
    plan: &RegionPlan,
) -> Result<HostData> {
    dispatch(format, data, Extract { dims, plan })?
}

/// Plan and extract in one step; returns the new data and its dimensions.
pub fn sub_region(
    format: DataFormat,
    data: &HostData,
    dims: UVec3,
    offset: IVec3,
    extent: UVec3,
    border: BorderMode,
) -> Result<(HostData, UVec3)> {
    let plan = plan(dims, offset, extent, border)?;
    let out = extract_host(format, data, dims, &plan)?;
    Ok((out, plan.output))
}
