//! # vis-data
//!
//! Multi-backend data objects with on-demand representation conversion.
//!
//! A dataset (volume, layer or buffer) can live in host memory, in
//! graphics-device memory and in compute-device memory at the same time.
//! Each copy is a [`Representation`]; a [`Data`] object tracks which copies
//! are in sync and converts lazily when a stage asks for a backend it does
//! not have yet.
//!
//! ## Quick Start
//!
//! ```ignore
//! use vis_data::prelude::*;
//!
//! let ctx = BackendContext::new(ContextConfig::from_env())?;
//! let host = HostRep::from_vec(1, UVec3::splat(4), (0..64u32).collect())?;
//! let mut volume = Volume::from_host(VolumeMeta::default(), host)?;
//!
//! // Upload on demand and edit on the graphics device.
//! let gfx = volume.editable_representation::<GraphicsRep>(&ctx)?;
//! gfx.set_value(&ctx, UVec3::ONE, 0, 999.0)?;
//!
//! // Host is stale now; this downloads.
//! let host = volume.representation::<HostRep>(&ctx)?;
//! assert_eq!(host.as_slice::<u32>()?[21], 999);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! BackendContext
//!     +-- graphics / compute devices  (DevicePrimitives)
//!     +-- ConverterRegistry           (kind, src, dst) -> Converter
//!     +-- Arc<SharingMap>             graphics id -> compute view + refs
//!
//! Data<K>
//!     +-- BTreeMap<BackendTag, Representation + valid flag>
//!     +-- authoritative tag
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default) - serialization of descriptors and metadata
//! - `wgpu` - GPU devices via wgpu

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backend;
pub mod config;
pub mod context;
pub mod converter;
pub mod data;
pub mod descriptor;
pub mod error;
pub mod memory;
pub mod registry;
pub mod representation;
pub mod sharing;

pub use backend::{BackendTag, DeviceBuffer, DeviceKind, DevicePrimitives, NativeId, SoftDevice, SoftPool};
pub use config::ContextConfig;
pub use context::BackendContext;
pub use converter::{Converter, ConverterPackage};
pub use data::{
    Buffer, BufferMeta, BufferTarget, BufferUsage, Data, DataKind, DataKindId, Layer, LayerMeta, LayerType,
    Volume, VolumeMeta,
};
pub use descriptor::{DataDescriptor, KindMeta};
pub use error::{DataError, DataResult};
pub use registry::ConverterRegistry;
pub use representation::{BackendRep, ComputeRep, GraphicsRep, HostRep, Representation};
pub use sharing::{ReinitPhase, SharedView, SharingMap, SharingStats};

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use vis_data::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backend::BackendTag;
    pub use crate::config::ContextConfig;
    pub use crate::context::BackendContext;
    pub use crate::converter::Converter;
    pub use crate::data::{Buffer, Data, DataKindId, Layer, Volume, VolumeMeta};
    pub use crate::error::{DataError, DataResult};
    pub use crate::representation::{BackendRep, ComputeRep, GraphicsRep, HostRep};
    pub use glam::{IVec3, UVec3};
    pub use vis_core::{BorderMode, DataFormat, ScalarType};
}
