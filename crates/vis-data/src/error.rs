//! Error types for representation and conversion operations.

use glam::UVec3;
use thiserror::Error;

use crate::backend::{BackendTag, NativeId};
use crate::data::DataKindId;

/// Result type alias using [`DataError`].
pub type DataResult<T> = std::result::Result<T, DataError>;

/// Errors raised by data objects, converters and devices.
#[derive(Debug, Error)]
pub enum DataError {
    /// No registered converter chain reaches the requested backend.
    #[error("no conversion path for {kind} from {tried:?} to {target}")]
    NoConversionPath {
        /// Data kind the lookup was made for
        kind: DataKindId,
        /// Source backends that were tried
        tried: Vec<BackendTag>,
        /// Requested backend
        target: BackendTag,
    },

    /// A representation or format is not the one an operation expects.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected backend tag or format
        expected: String,
        /// Actual backend tag or format
        actual: String,
    },

    /// A device could not satisfy an allocation.
    #[error("{device} out of memory: requested {requested} bytes, {available} available")]
    ResourceExhausted {
        /// Device name
        device: String,
        /// Requested bytes
        requested: u64,
        /// Bytes left in the budget
        available: u64,
    },

    /// A handle outlived the generation of the native resource it aliases.
    #[error("stale handle for {id}: created at generation {expected}, resource is at {current:?}")]
    StaleHandle {
        /// Native resource identity
        id: NativeId,
        /// Generation the handle was created from
        expected: u64,
        /// Current generation, `None` if the resource is gone
        current: Option<u64>,
    },

    /// A data object holds no representation for the backend.
    #[error("no {0} representation")]
    MissingRepresentation(BackendTag),

    /// Release of a native resource with no outstanding acquisition.
    #[error("{0} is not shared")]
    NotShared(NativeId),

    /// A converter for the same (kind, source, destination) already exists.
    #[error("duplicate converter for {kind}: {src} -> {dst}")]
    DuplicateConverter {
        /// Data kind
        kind: DataKindId,
        /// Source backend
        src: BackendTag,
        /// Destination backend
        dst: BackendTag,
    },

    /// A representation's extent disagrees with its data object.
    #[error("extent mismatch: expected {expected}, got {actual}")]
    ExtentMismatch {
        /// Declared extent
        expected: UVec3,
        /// Offending extent
        actual: UVec3,
    },

    /// Extent not allowed for the data kind.
    #[error("invalid extent {extent} for {kind}: {reason}")]
    InvalidExtent {
        /// Data kind
        kind: DataKindId,
        /// Offending extent
        extent: UVec3,
        /// Rule that was broken
        reason: &'static str,
    },

    /// Requested device backend is not compiled in or not present.
    #[error("backend not available: {0}")]
    BackendNotAvailable(String),

    /// Device operation failed.
    #[error("device failure: {0}")]
    DeviceFailure(String),

    /// Error from the core layer.
    #[error(transparent)]
    Core(#[from] vis_core::Error),
}

impl DataError {
    /// Creates a [`DataError::TypeMismatch`] error.
    #[inline]
    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Creates a [`DataError::DeviceFailure`] error.
    #[inline]
    pub fn device(msg: impl Into<String>) -> Self {
        Self::DeviceFailure(msg.into())
    }

    /// Returns `true` for [`DataError::NoConversionPath`].
    #[inline]
    pub fn is_no_path(&self) -> bool {
        matches!(self, Self::NoConversionPath { .. })
    }

    /// Returns `true` for type mismatches from this crate or the core layer.
    #[inline]
    pub fn is_type_error(&self) -> bool {
        match self {
            Self::TypeMismatch { .. } => true,
            Self::Core(e) => e.is_type_error(),
            _ => false,
        }
    }

    /// Returns `true` for [`DataError::StaleHandle`].
    #[inline]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleHandle { .. })
    }

    /// Returns `true` for [`DataError::ResourceExhausted`].
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_path_message_names_everything() {
        let err = DataError::NoConversionPath {
            kind: DataKindId::Volume,
            tried: vec![BackendTag::Host],
            target: BackendTag::Compute,
        };
        let msg = err.to_string();
        assert!(msg.contains("volume"));
        assert!(msg.contains("Host"));
        assert!(msg.contains("compute"));
        assert!(err.is_no_path());
    }

    #[test]
    fn test_core_type_error_is_type_error() {
        let err: DataError = vis_core::Error::type_mismatch("f32", "u8").into();
        assert!(err.is_type_error());
    }
}
