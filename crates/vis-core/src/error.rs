//! Error types for vis-core operations.
//!
//! The [`Error`] enum covers the failure modes of the leaf layer:
//! - Typed access with the wrong element type ([`Error::TypeMismatch`])
//! - Regions that do not fit an array ([`Error::InvalidRegion`])
//! - Buffers whose length disagrees with their extent ([`Error::SizeMismatch`])
//!
//! # Usage
//!
//! ```rust
//! use vis_core::{Error, Result, ScalarType};
//!
//! fn expect_f32(actual: ScalarType) -> Result<()> {
//!     if actual != ScalarType::F32 {
//!         return Err(Error::type_mismatch("f32", actual.name()));
//!     }
//!     Ok(())
//! }
//! assert!(expect_f32(ScalarType::U8).unwrap_err().is_type_error());
//! ```
//!
//! # Used By
//!
//! - [`crate::host::HostData`] - typed slice access
//! - [`crate::brick`] - brick bounds checking
//! - [`crate::subregion`] - region resolution
//! - `vis-data` - wrapped into `DataError::Core`

use glam::{IVec3, UVec3};
use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in format, dispatch and region operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Declared element type disagrees with the type requested by a caller.
    ///
    /// Raised by typed accessors and by the dispatch layer when the
    /// runtime format identifier does not match the stored scalars.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type description
        expected: String,
        /// Actual type description
        actual: String,
    },

    /// A region does not fit into the array it addresses.
    #[error("region offset {offset} extent {extent} does not fit array {dims}")]
    InvalidRegion {
        /// Region origin (may be negative for border requests)
        offset: IVec3,
        /// Region extent
        extent: UVec3,
        /// Array dimensions
        dims: UVec3,
    },

    /// Buffer length does not agree with extent and format.
    #[error("size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch {
        /// Expected scalar count
        expected: usize,
        /// Actual scalar count
        actual: usize,
    },

    /// Format is outside the supported scalar/component set.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates an [`Error::TypeMismatch`] error.
    #[inline]
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an [`Error::InvalidRegion`] error.
    #[inline]
    pub fn invalid_region(offset: IVec3, extent: UVec3, dims: UVec3) -> Self {
        Self::InvalidRegion {
            offset,
            extent,
            dims,
        }
    }

    /// Creates an [`Error::SizeMismatch`] error.
    #[inline]
    pub fn size_mismatch(expected: usize, actual: usize) -> Self {
        Self::SizeMismatch { expected, actual }
    }

    /// Creates an [`Error::UnsupportedFormat`] error.
    #[inline]
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Creates an [`Error::Other`] error.
    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns `true` if this is a type mismatch.
    #[inline]
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    /// Returns `true` if this is a region error.
    #[inline]
    pub fn is_region_error(&self) -> bool {
        matches!(self, Self::InvalidRegion { .. })
    }
}
