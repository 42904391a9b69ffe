//! Persistable metadata of data objects.
//!
//! Only logical metadata is stored; backend representations are recomputed
//! after loading.
//!
//! ```yaml
//! kind: volume
//! extent: [64, 64, 32]
//! format:
//!   scalar: U16
//!   components: 1
//! meta:
//!   volume:
//!     basis: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
//!     offset: [0.0, 0.0, 0.0]
//!     data_range: [0.0, 4095.0]
//!     value_range: [0.0, 1.0]
//! ```

use glam::UVec3;
use vis_core::DataFormat;

use crate::data::{BufferMeta, DataKindId, LayerMeta, VolumeMeta};

/// Kind-specific metadata as a closed sum type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum KindMeta {
    /// Volume transform and ranges.
    Volume(VolumeMeta),
    /// Layer role.
    Layer(LayerMeta),
    /// Buffer target and usage.
    Buffer(BufferMeta),
}

impl KindMeta {
    /// Kind this metadata belongs to.
    pub fn kind(&self) -> DataKindId {
        match self {
            Self::Volume(_) => DataKindId::Volume,
            Self::Layer(_) => DataKindId::Layer,
            Self::Buffer(_) => DataKindId::Buffer,
        }
    }
}

/// Logical description of a data object.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataDescriptor {
    /// Data kind.
    pub kind: DataKindId,
    /// Extent in elements.
    pub extent: UVec3,
    /// Element format.
    pub format: DataFormat,
    /// Kind-specific metadata.
    pub meta: KindMeta,
}

impl DataDescriptor {
    /// Payload size in bytes once materialized.
    pub fn size_bytes(&self) -> u64 {
        crate::representation::byte_len(self.format, self.extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vis_core::ScalarType;

    #[test]
    fn test_meta_kind() {
        assert_eq!(KindMeta::Layer(LayerMeta::default()).kind(), DataKindId::Layer);
        let desc = DataDescriptor {
            kind: DataKindId::Buffer,
            extent: UVec3::new(16, 1, 1),
            format: DataFormat::vec4(ScalarType::F32),
            meta: KindMeta::Buffer(BufferMeta::default()),
        };
        assert_eq!(desc.size_bytes(), 256);
    }
}
