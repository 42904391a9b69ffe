//! Data objects: one logical dataset, many backend representations.
//!
//! A [`Data`] keeps at most one [`Representation`] per [`BackendTag`], each
//! either valid or stale, plus the tag of the last-written (authoritative)
//! one. Requests for a backend convert lazily through the context's
//! [`ConverterRegistry`](crate::ConverterRegistry).
//!
//! # Access
//!
//! ```text
//! representation::<R>()           convert if missing or stale, siblings untouched
//! editable_representation::<R>()  same, then R becomes authoritative and
//!                                 every other representation is stale
//! add_representation(rep)         seed directly, siblings stale
//! ```
//!
//! Conversion needs `&mut self`; representations that are already valid can
//! be read through `&self` with [`Data::try_representation`].
//!
//! # Example
//!
//! ```ignore
//! let mut volume = Volume::from_host(VolumeMeta::default(), host)?;
//! let gfx: &mut GraphicsRep = volume.editable_representation(&ctx)?;
//! gfx.set_value(&ctx, UVec3::ONE, 0, 999.0)?;
//! let host: &HostRep = volume.representation(&ctx)?;
//! ```

use std::collections::BTreeMap;

use glam::{DVec2, Mat3, UVec3, Vec3};
use tracing::{debug, trace};
use vis_core::DataFormat;

use crate::backend::BackendTag;
use crate::context::BackendContext;
use crate::converter::Converter;
use crate::descriptor::{DataDescriptor, KindMeta};
use crate::error::{DataError, DataResult};
use crate::representation::{BackendRep, ComputeRep, HostRep, Representation};

// =============================================================================
// Data kinds
// =============================================================================

/// Runtime identifier of a data kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DataKindId {
    /// 3D scalar or vector field.
    Volume,
    /// 2D image layer.
    Layer,
    /// 1D attribute buffer.
    Buffer,
}

impl DataKindId {
    /// All kinds.
    pub const ALL: [DataKindId; 3] = [Self::Volume, Self::Layer, Self::Buffer];

    /// Lowercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::Layer => "layer",
            Self::Buffer => "buffer",
        }
    }
}

impl std::fmt::Display for DataKindId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind-specific metadata attached to a [`Data`].
pub trait DataKind: Clone + Default + std::fmt::Debug + Send + Sync + 'static {
    /// Runtime identifier.
    const ID: DataKindId;

    /// Reject extents the kind cannot hold.
    fn validate_extent(_extent: UVec3) -> DataResult<()> {
        Ok(())
    }

    /// Wrap into the serializable metadata enum.
    fn into_meta(self) -> KindMeta;

    /// Unwrap from the serializable metadata enum.
    fn from_meta(meta: KindMeta) -> Option<Self>;
}

/// Spatial metadata of a volume.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VolumeMeta {
    /// Axes of the volume in model space.
    pub basis: Mat3,
    /// Position of the first corner in model space.
    pub offset: Vec3,
    /// Range the stored values map from.
    pub data_range: DVec2,
    /// Range the stored values map to.
    pub value_range: DVec2,
}

impl Default for VolumeMeta {
    fn default() -> Self {
        Self {
            basis: Mat3::IDENTITY,
            offset: Vec3::ZERO,
            data_range: DVec2::new(0.0, 1.0),
            value_range: DVec2::new(0.0, 1.0),
        }
    }
}

impl DataKind for VolumeMeta {
    const ID: DataKindId = DataKindId::Volume;

    fn into_meta(self) -> KindMeta {
        KindMeta::Volume(self)
    }

    fn from_meta(meta: KindMeta) -> Option<Self> {
        match meta {
            KindMeta::Volume(m) => Some(m),
            _ => None,
        }
    }
}

/// Role of an image layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LayerType {
    /// Color output.
    #[default]
    Color,
    /// Depth output.
    Depth,
    /// Picking ids.
    Picking,
}

/// Layer metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerMeta {
    /// Role of the layer.
    pub layer_type: LayerType,
}

impl DataKind for LayerMeta {
    const ID: DataKindId = DataKindId::Layer;

    fn validate_extent(extent: UVec3) -> DataResult<()> {
        if extent.z != 1 {
            return Err(DataError::InvalidExtent {
                kind: Self::ID,
                extent,
                reason: "layer depth must be 1",
            });
        }
        Ok(())
    }

    fn into_meta(self) -> KindMeta {
        KindMeta::Layer(self)
    }

    fn from_meta(meta: KindMeta) -> Option<Self> {
        match meta {
            KindMeta::Layer(m) => Some(m),
            _ => None,
        }
    }
}

/// Binding target of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BufferTarget {
    /// Vertex attributes or generic data.
    #[default]
    Data,
    /// Index data.
    Index,
}

/// Expected update frequency of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BufferUsage {
    /// Written once.
    #[default]
    Static,
    /// Rewritten often.
    Dynamic,
}

/// Buffer metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferMeta {
    /// Binding target.
    pub target: BufferTarget,
    /// Update frequency.
    pub usage: BufferUsage,
}

impl DataKind for BufferMeta {
    const ID: DataKindId = DataKindId::Buffer;

    fn validate_extent(extent: UVec3) -> DataResult<()> {
        if extent.y != 1 || extent.z != 1 {
            return Err(DataError::InvalidExtent {
                kind: Self::ID,
                extent,
                reason: "buffer height and depth must be 1",
            });
        }
        Ok(())
    }

    fn into_meta(self) -> KindMeta {
        KindMeta::Buffer(self)
    }

    fn from_meta(meta: KindMeta) -> Option<Self> {
        match meta {
            KindMeta::Buffer(m) => Some(m),
            _ => None,
        }
    }
}

/// 3D dataset.
pub type Volume = Data<VolumeMeta>;

/// 2D image layer.
pub type Layer = Data<LayerMeta>;

/// 1D attribute buffer.
pub type Buffer = Data<BufferMeta>;

// =============================================================================
// Data
// =============================================================================

#[derive(Debug)]
struct Slot {
    rep: Representation,
    valid: bool,
}

/// One logical dataset with lazily converted backend representations.
#[derive(Debug)]
pub struct Data<K: DataKind> {
    extent: UVec3,
    format: DataFormat,
    meta: K,
    reps: BTreeMap<BackendTag, Slot>,
    last_valid: Option<BackendTag>,
}

impl<K: DataKind> Data<K> {
    /// Empty data object with default metadata.
    ///
    /// A zero-filled host representation is created on first access.
    pub fn new(extent: UVec3, format: DataFormat) -> DataResult<Self> {
        Self::with_meta(K::default(), extent, format)
    }

    /// Empty data object with `meta`.
    pub fn with_meta(meta: K, extent: UVec3, format: DataFormat) -> DataResult<Self> {
        K::validate_extent(extent)?;
        Ok(Self {
            extent,
            format,
            meta,
            reps: BTreeMap::new(),
            last_valid: None,
        })
    }

    /// Data object seeded with a host array; extent and format come from it.
    pub fn from_host(meta: K, host: HostRep) -> DataResult<Self> {
        let mut data = Self::with_meta(meta, host.extent(), host.format())?;
        data.add_representation(host)?;
        Ok(data)
    }

    /// Rebuild an empty data object from persisted metadata.
    pub fn from_descriptor(desc: &DataDescriptor) -> DataResult<Self> {
        if desc.kind != K::ID {
            return Err(DataError::type_mismatch(K::ID, desc.kind));
        }
        let meta = K::from_meta(desc.meta.clone())
            .ok_or_else(|| DataError::type_mismatch(K::ID, desc.meta.kind()))?;
        Self::with_meta(meta, desc.extent, desc.format)
    }

    /// Persistable metadata; representations are not included.
    pub fn descriptor(&self) -> DataDescriptor {
        DataDescriptor {
            kind: K::ID,
            extent: self.extent,
            format: self.format,
            meta: self.meta.clone().into_meta(),
        }
    }

    /// Extent in elements.
    pub fn extent(&self) -> UVec3 {
        self.extent
    }

    /// Element format.
    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Kind metadata.
    pub fn meta(&self) -> &K {
        &self.meta
    }

    /// Mutable kind metadata.
    pub fn meta_mut(&mut self) -> &mut K {
        &mut self.meta
    }

    /// Backend view `R`, converting if it is missing or stale.
    ///
    /// Never invalidates other representations.
    pub fn representation<R: BackendRep>(&mut self, ctx: &BackendContext) -> DataResult<&R> {
        self.resolve(ctx, R::TAG)?;
        let slot = self.slot(R::TAG)?;
        R::expect(&slot.rep)
    }

    /// Backend view `R` for writing.
    ///
    /// `R` becomes authoritative and every other representation is marked
    /// stale.
    pub fn editable_representation<R: BackendRep>(&mut self, ctx: &BackendContext) -> DataResult<&mut R> {
        self.resolve(ctx, R::TAG)?;
        self.invalidate_all_other(R::TAG);
        let slot = self
            .reps
            .get_mut(&R::TAG)
            .ok_or(DataError::MissingRepresentation(R::TAG))?;
        R::expect_mut(&mut slot.rep)
    }

    /// Backend view `R` if it is present and valid.
    pub fn try_representation<R: BackendRep>(&self) -> Option<&R> {
        self.reps
            .get(&R::TAG)
            .filter(|s| s.valid)
            .and_then(|s| R::from_rep(&s.rep))
    }

    /// Whether a representation of `R` is cached, valid or stale.
    pub fn has_representation<R: BackendRep>(&self) -> bool {
        self.reps.contains_key(&R::TAG)
    }

    /// Whether any representation is cached.
    pub fn has_representations(&self) -> bool {
        !self.reps.is_empty()
    }

    /// Whether the representation of `tag` is cached and in sync.
    pub fn is_valid(&self, tag: BackendTag) -> bool {
        self.reps.get(&tag).is_some_and(|s| s.valid)
    }

    /// Tag of the last-written representation.
    pub fn authoritative(&self) -> Option<BackendTag> {
        self.last_valid
    }

    /// Tags of all valid representations, in tag order.
    pub fn valid_tags(&self) -> Vec<BackendTag> {
        self.reps
            .iter()
            .filter(|(_, s)| s.valid)
            .map(|(t, _)| *t)
            .collect()
    }

    /// Seed a representation built outside the converter machinery.
    ///
    /// Replaces any representation of the same tag, makes it authoritative
    /// and marks the others stale.
    pub fn add_representation(&mut self, rep: impl Into<Representation>) -> DataResult<()> {
        let rep = rep.into();
        self.check_rep(&rep)?;
        let tag = rep.tag();
        trace!(kind = %K::ID, %tag, "add_representation");
        if tag == BackendTag::Graphics && self.compute_alias().is_some() {
            // The replaced resource goes away; its compute view must go first.
            self.reps.remove(&BackendTag::Compute);
        }
        self.reps.insert(tag, Slot { rep, valid: true });
        self.invalidate_all_other(tag);
        Ok(())
    }

    /// Remove and return the representation of `tag`.
    ///
    /// If it was authoritative, the lowest valid remaining tag takes over.
    /// A compute representation viewing the removed graphics resource is
    /// detached into its own memory when valid and dropped when stale.
    pub fn remove_representation(
        &mut self,
        ctx: &BackendContext,
        tag: BackendTag,
    ) -> DataResult<Option<Representation>> {
        if tag == BackendTag::Graphics {
            self.release_compute_alias(ctx)?;
        }
        let Some(slot) = self.reps.remove(&tag) else {
            return Ok(None);
        };
        if self.last_valid == Some(tag) {
            self.last_valid = self.valid_tags().first().copied();
        }
        Ok(Some(slot.rep))
    }

    /// Drop every representation except `tag`.
    pub fn remove_other_representations(&mut self, ctx: &BackendContext, tag: BackendTag) -> DataResult<()> {
        if tag == BackendTag::Compute {
            self.release_compute_alias(ctx)?;
        }
        for other in BackendTag::ALL.into_iter().rev().filter(|&t| t != tag) {
            self.reps.remove(&other);
        }
        self.last_valid = self.is_valid(tag).then_some(tag);
        Ok(())
    }

    /// Drop every representation.
    pub fn clear_representations(&mut self) {
        for tag in BackendTag::ALL.into_iter().rev() {
            self.reps.remove(&tag);
        }
        self.last_valid = None;
    }

    /// Mark every representation except `tag` stale and make `tag`
    /// authoritative.
    pub fn invalidate_all_other(&mut self, tag: BackendTag) {
        for (t, slot) in self.reps.iter_mut() {
            if *t != tag {
                slot.valid = false;
            }
        }
        if self.reps.contains_key(&tag) {
            self.last_valid = Some(tag);
        }
    }

    /// Copy of the metadata and a deep copy of the authoritative
    /// representation only.
    pub fn try_clone(&self, ctx: &BackendContext) -> DataResult<Self> {
        let mut reps = BTreeMap::new();
        if let Some(tag) = self.last_valid {
            let rep = self.slot(tag)?.rep.duplicate(ctx)?;
            reps.insert(tag, Slot { rep, valid: true });
        }
        Ok(Self {
            extent: self.extent,
            format: self.format,
            meta: self.meta.clone(),
            reps,
            last_valid: self.last_valid,
        })
    }

    /// Change the extent.
    ///
    /// The authoritative representation is resized with its contents reset
    /// to zero; all other representations are dropped.
    pub fn set_extent(&mut self, ctx: &BackendContext, extent: UVec3) -> DataResult<()> {
        K::validate_extent(extent)?;
        match self.last_valid {
            Some(tag) => {
                self.remove_other_representations(ctx, tag)?;
                if let Some(slot) = self.reps.get_mut(&tag) {
                    slot.rep.resize(ctx, extent)?;
                }
            }
            None => self.clear_representations(),
        }
        debug!(kind = %K::ID, from = %self.extent, to = %extent, "set_extent");
        self.extent = extent;
        Ok(())
    }

    fn slot(&self, tag: BackendTag) -> DataResult<&Slot> {
        self.reps
            .get(&tag)
            .ok_or(DataError::MissingRepresentation(tag))
    }

    /// Validity of the compute representation if it views the cached
    /// graphics resource.
    fn compute_alias(&self) -> Option<bool> {
        let gfx = match self.reps.get(&BackendTag::Graphics).map(|s| &s.rep) {
            Some(Representation::Graphics(g)) => g.native_id(),
            _ => return None,
        };
        let slot = self.reps.get(&BackendTag::Compute)?;
        let cmp = ComputeRep::from_rep(&slot.rep)?;
        (cmp.is_shared() && cmp.native_id() == gfx).then_some(slot.valid)
    }

    /// Cut the compute representation loose from the graphics resource
    /// before that resource is dropped.
    fn release_compute_alias(&mut self, ctx: &BackendContext) -> DataResult<()> {
        match self.compute_alias() {
            Some(true) => {
                debug!(kind = %K::ID, "detaching compute view from removed graphics resource");
                if let Some(slot) = self.reps.get_mut(&BackendTag::Compute) {
                    ComputeRep::expect_mut(&mut slot.rep)?.detach(ctx)?;
                }
            }
            Some(false) => {
                self.reps.remove(&BackendTag::Compute);
            }
            None => {}
        }
        Ok(())
    }

    fn check_rep(&self, rep: &Representation) -> DataResult<()> {
        if rep.format() != self.format {
            return Err(DataError::type_mismatch(self.format, rep.format()));
        }
        if rep.extent() != self.extent {
            return Err(DataError::ExtentMismatch {
                expected: self.extent,
                actual: rep.extent(),
            });
        }
        Ok(())
    }

    fn resolve(&mut self, ctx: &BackendContext, target: BackendTag) -> DataResult<()> {
        if self.is_valid(target) {
            trace!(kind = %K::ID, %target, "representation cached");
            return Ok(());
        }
        if self.valid_tags().is_empty() {
            debug!(kind = %K::ID, extent = %self.extent, format = %self.format, "creating default host representation");
            self.reps.remove(&BackendTag::Host);
            self.reps.insert(
                BackendTag::Host,
                Slot {
                    rep: HostRep::new(self.format, self.extent).into(),
                    valid: true,
                },
            );
            self.last_valid = Some(BackendTag::Host);
            if target == BackendTag::Host {
                return Ok(());
            }
        }

        debug!(kind = %K::ID, %target, "representation missing or stale");
        let sources = self.valid_tags();
        let package = ctx
            .registry()
            .plan(K::ID, &sources, self.last_valid, target)?;

        for hop in package.hops() {
            let (src, dst) = (hop.source(), hop.destination());
            if self.is_valid(dst) {
                continue;
            }
            trace!(kind = %K::ID, hop = %hop.name(), "executing hop");
            match self.reps.remove(&dst) {
                Some(mut slot) => {
                    let result = match self.reps.get(&src) {
                        Some(source) => hop.update(ctx, &source.rep, &mut slot.rep),
                        None => Err(DataError::MissingRepresentation(src)),
                    };
                    let ok = result.is_ok();
                    slot.valid = ok;
                    self.reps.insert(dst, slot);
                    result?;
                }
                None => {
                    let rep = hop.create_from(ctx, &self.slot(src)?.rep)?;
                    self.check_rep(&rep)?;
                    self.reps.insert(dst, Slot { rep, valid: true });
                }
            }
        }
        Ok(())
    }
}

impl<K: DataKind> Drop for Data<K> {
    fn drop(&mut self) {
        // Compute views go before the graphics resources they alias.
        self.clear_representations();
    }
}
