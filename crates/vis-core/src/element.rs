//! Element trait for typed scalar storage.
//!
//! [`Element`] ties a Rust scalar type to its runtime [`ScalarType`] tag and
//! to the matching [`HostData`] variant, so typed code can move between the
//! closed sum type and plain slices without downcasting.
//!
//! # Supported Types
//!
//! `u8`, `i8`, `u16`, `i16`, `u32`, `i32`, [`f16`], `f32`, `f64`.
//!
//! # Example
//!
//! ```
//! use vis_core::{Element, HostData, ScalarType};
//!
//! assert_eq!(<u16 as Element>::SCALAR, ScalarType::U16);
//! let data = u16::into_host(vec![1, 2, 3]);
//! assert_eq!(u16::slice(&data), Some(&[1u16, 2, 3][..]));
//! assert_eq!(f32::slice(&data), None);
//! ```

use half::f16;

use crate::format::ScalarType;
use crate::host::HostData;

/// A scalar type that can be stored in a representation.
pub trait Element:
    bytemuck::Pod + Default + PartialEq + PartialOrd + std::fmt::Debug + Send + Sync + 'static
{
    /// Runtime tag of this type.
    const SCALAR: ScalarType;

    /// Widen to f64 (no normalization).
    fn to_f64(self) -> f64;

    /// Narrow from f64. Integer targets truncate and saturate.
    fn from_f64(v: f64) -> Self;

    /// Wrap an owned vector into the matching [`HostData`] variant.
    fn into_host(data: Vec<Self>) -> HostData;

    /// Borrow the matching variant, `None` on type mismatch.
    fn slice(data: &HostData) -> Option<&[Self]>;

    /// Mutably borrow the matching variant, `None` on type mismatch.
    fn slice_mut(data: &mut HostData) -> Option<&mut [Self]>;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            const SCALAR: ScalarType = ScalarType::$variant;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $t
            }

            #[inline]
            fn into_host(data: Vec<Self>) -> HostData {
                HostData::$variant(data)
            }

            #[inline]
            fn slice(data: &HostData) -> Option<&[Self]> {
                match data {
                    HostData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            #[inline]
            fn slice_mut(data: &mut HostData) -> Option<&mut [Self]> {
                match data {
                    HostData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(u8, U8);
impl_element!(i8, I8);
impl_element!(u16, U16);
impl_element!(i16, I16);
impl_element!(u32, U32);
impl_element!(i32, I32);
impl_element!(f32, F32);
impl_element!(f64, F64);

impl Element for f16 {
    const SCALAR: ScalarType = ScalarType::F16;

    #[inline]
    fn to_f64(self) -> f64 {
        self.to_f64()
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        f16::from_f64(v)
    }

    #[inline]
    fn into_host(data: Vec<Self>) -> HostData {
        HostData::F16(data)
    }

    #[inline]
    fn slice(data: &HostData) -> Option<&[Self]> {
        match data {
            HostData::F16(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    fn slice_mut(data: &mut HostData) -> Option<&mut [Self]> {
        match data {
            HostData::F16(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_saturation() {
        assert_eq!(u8::from_f64(300.0), 255);
        assert_eq!(u8::from_f64(-4.0), 0);
        assert_eq!(i16::from_f64(999.7), 999);
    }

    #[test]
    fn test_half_roundtrip() {
        let h = f16::from_f64(0.5);
        assert_eq!(h.to_f64(), 0.5);
    }

    #[test]
    fn test_slice_type_check() {
        let mut data = f32::into_host(vec![1.0, 2.0]);
        assert!(f32::slice_mut(&mut data).is_some());
        assert!(u8::slice(&data).is_none());
    }
}
