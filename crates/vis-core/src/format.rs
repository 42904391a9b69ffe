//! Runtime element formats.
//!
//! Every representation of a dataset carries the same [`DataFormat`]: a
//! scalar type plus a component count (1-4). The format is the runtime
//! identifier the dispatch layer maps onto a compile-time typed code path.
//!
//! # Usage
//!
//! ```rust
//! use vis_core::format::{DataFormat, ScalarType};
//!
//! let normals = DataFormat::new(ScalarType::F32, 3).unwrap();
//! assert_eq!(normals.size_in_bytes(), 12);
//! assert_eq!(normals.name(), "Vec3FLOAT32");
//!
//! let density = DataFormat::scalar(ScalarType::U16);
//! assert_eq!(density.precision(), 16);
//! ```

use crate::{Error, Result};

/// Numeric class of a scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumericKind {
    /// Unsigned integer.
    UnsignedInteger,
    /// Signed integer.
    SignedInteger,
    /// IEEE 754 floating point.
    Float,
}

/// Scalar storage type of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarType {
    /// 8-bit unsigned integer.
    U8,
    /// 8-bit signed integer.
    I8,
    /// 16-bit unsigned integer.
    U16,
    /// 16-bit signed integer.
    I16,
    /// 32-bit unsigned integer.
    U32,
    /// 32-bit signed integer.
    I32,
    /// 16-bit half-precision float.
    F16,
    /// 32-bit single-precision float.
    #[default]
    F32,
    /// 64-bit double-precision float.
    F64,
}

impl ScalarType {
    /// Every supported scalar type, in dispatch order.
    pub const ALL: [ScalarType; 9] = [
        Self::U8,
        Self::I8,
        Self::U16,
        Self::I16,
        Self::U32,
        Self::I32,
        Self::F16,
        Self::F32,
        Self::F64,
    ];

    /// Bytes per scalar.
    #[inline]
    pub const fn size_in_bytes(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 | Self::F16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Bits of precision per scalar.
    #[inline]
    pub const fn precision(&self) -> u32 {
        (self.size_in_bytes() * 8) as u32
    }

    /// Numeric class.
    #[inline]
    pub const fn kind(&self) -> NumericKind {
        match self {
            Self::U8 | Self::U16 | Self::U32 => NumericKind::UnsignedInteger,
            Self::I8 | Self::I16 | Self::I32 => NumericKind::SignedInteger,
            Self::F16 | Self::F32 | Self::F64 => NumericKind::Float,
        }
    }

    /// Whether this is a floating-point type.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self.kind(), NumericKind::Float)
    }

    /// Short name for display.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::F16 => "f16",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    /// Parse from the short name.
    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name().eq_ignore_ascii_case(s))
    }

    fn long_name(&self) -> &'static str {
        match self {
            Self::U8 => "UINT8",
            Self::I8 => "INT8",
            Self::U16 => "UINT16",
            Self::I16 => "INT16",
            Self::U32 => "UINT32",
            Self::I32 => "INT32",
            Self::F16 => "FLOAT16",
            Self::F32 => "FLOAT32",
            Self::F64 => "FLOAT64",
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Maximum number of components per element.
pub const MAX_COMPONENTS: u8 = 4;

/// Element format: scalar type and component count.
///
/// # Invariants
///
/// - `components` is in `1..=4`; enforced by [`DataFormat::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataFormat {
    scalar: ScalarType,
    components: u8,
}

impl DataFormat {
    /// Creates a format, rejecting component counts outside `1..=4`.
    pub fn new(scalar: ScalarType, components: u8) -> Result<Self> {
        if components == 0 || components > MAX_COMPONENTS {
            return Err(Error::unsupported_format(format!(
                "{} with {} components",
                scalar, components
            )));
        }
        Ok(Self { scalar, components })
    }

    /// Single-component format.
    #[inline]
    pub const fn scalar(scalar: ScalarType) -> Self {
        Self {
            scalar,
            components: 1,
        }
    }

    /// Four-component format.
    #[inline]
    pub const fn vec4(scalar: ScalarType) -> Self {
        Self {
            scalar,
            components: 4,
        }
    }

    /// Scalar type of each component.
    #[inline]
    pub const fn scalar_type(&self) -> ScalarType {
        self.scalar
    }

    /// Number of components per element.
    #[inline]
    pub const fn components(&self) -> usize {
        self.components as usize
    }

    /// Bits of precision per component.
    #[inline]
    pub const fn precision(&self) -> u32 {
        self.scalar.precision()
    }

    /// Bytes per element.
    #[inline]
    pub const fn size_in_bytes(&self) -> usize {
        self.scalar.size_in_bytes() * self.components as usize
    }

    /// Descriptive name, e.g. `FLOAT32` or `Vec4UINT8`.
    pub fn name(&self) -> String {
        if self.components == 1 {
            self.scalar.long_name().to_string()
        } else {
            format!("Vec{}{}", self.components, self.scalar.long_name())
        }
    }

    /// Parse a compact `<scalar>x<components>` string such as `f32x3`.
    ///
    /// A bare scalar name means one component.
    pub fn parse(s: &str) -> Result<Self> {
        let (scalar, comps) = match s.split_once('x') {
            Some((t, c)) => (
                t,
                c.parse::<u8>()
                    .map_err(|_| Error::unsupported_format(s))?,
            ),
            None => (s, 1),
        };
        let scalar = ScalarType::from_name(scalar).ok_or_else(|| Error::unsupported_format(s))?;
        Self::new(scalar, comps)
    }
}

impl Default for DataFormat {
    fn default() -> Self {
        Self::scalar(ScalarType::F32)
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.scalar, self.components)
    }
}
