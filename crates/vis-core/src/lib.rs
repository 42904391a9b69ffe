//! # vis-core
//!
//! Core types for multi-backend visualization data.
//!
//! This crate provides the leaf layer the data objects in `vis-data` are
//! built on:
//!
//! - [`ScalarType`], [`DataFormat`] - runtime element formats
//! - [`Element`] - compile-time scalar types tied to their runtime tag
//! - [`HostData`] - host-memory scalar storage as a closed sum type
//! - [`dispatch`](mod@dispatch) - runtime format to typed code path
//! - [`Brick`] - linear iteration over sub-boxes of linearized arrays
//! - [`subregion`] - sub-region extraction with border policies
//!
//! ## Design Philosophy
//!
//! Formats are runtime values, algorithms are generic code. The dispatch
//! layer is the only place the two meet: one `match` instantiates an
//! algorithm for the scalar type and component count a dataset carries.
//!
//! ```ignore
//! let sum = dispatch(volume.format(), host.data(), FirstChannelSum)?;
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//! vis-core (this crate)
//!    ^
//!    |
//!    +-- vis-data (representations, converters, data objects)
//!    +-- vis-cli
//!    +-- vis-bench
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` - Enable serialization for format and region types

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod brick;
pub mod dispatch;
pub mod element;
pub mod error;
pub mod format;
pub mod host;
pub mod subregion;

// Re-exports for convenience
pub use brick::{Brick, BrickIter, RowIter};
pub use dispatch::{dispatch_format, dispatch_mut, FormatVisitor, TypedVisitor, TypedVisitorMut};
pub use element::Element;
pub use error::*;
pub use format::*;
pub use host::HostData;
pub use subregion::{BorderMode, RegionPlan};

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use vis_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::brick::{linear_index, position_of, Brick};
    pub use crate::dispatch::{dispatch, dispatch_mut, FormatVisitor, TypedVisitor, TypedVisitorMut};
    pub use crate::element::Element;
    pub use crate::error::{Error, Result};
    pub use crate::format::{DataFormat, NumericKind, ScalarType};
    pub use crate::host::HostData;
    pub use crate::subregion::{BorderMode, RegionPlan};
}
