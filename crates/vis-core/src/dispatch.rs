//! Runtime format to compile-time type dispatch.
//!
//! Representations carry their element format as a runtime value
//! ([`DataFormat`]). Algorithms are written once, generic over the scalar
//! type `T` and the component count `C`, and the functions here pick the
//! matching instantiation: nine scalar types times four component counts.
//!
//! Three visitor flavours exist:
//! - [`FormatVisitor`] - no data, only the type (e.g. sizing, allocation)
//! - [`TypedVisitor`] - read-only access to the typed scalars
//! - [`TypedVisitorMut`] - in-place mutation of the typed scalars
//!
//! # Example
//!
//! ```rust
//! use vis_core::dispatch::{dispatch, TypedVisitor};
//! use vis_core::{DataFormat, Element, HostData, ScalarType};
//!
//! /// Sums the first component of every element.
//! struct FirstChannelSum;
//!
//! impl TypedVisitor for FirstChannelSum {
//!     type Output = f64;
//!     fn visit<T: Element, const C: usize>(self, data: &[T]) -> f64 {
//!         data.chunks_exact(C).map(|e| e[0].to_f64()).sum()
//!     }
//! }
//!
//! let data = HostData::from_vec(vec![1u8, 10, 2, 20]);
//! let fmt = DataFormat::new(ScalarType::U8, 2).unwrap();
//! assert_eq!(dispatch(fmt, &data, FirstChannelSum).unwrap(), 3.0);
//! ```

use half::f16;

use crate::element::Element;
use crate::format::{DataFormat, ScalarType};
use crate::host::{each_variant, HostData};
use crate::{Error, Result};

/// Visitor instantiated per element type without touching data.
pub trait FormatVisitor {
    /// Result of the visit.
    type Output;

    /// Called with the concrete scalar type and component count.
    fn visit<T: Element, const C: usize>(self) -> Self::Output;
}

/// Visitor over immutable typed scalars.
pub trait TypedVisitor {
    /// Result of the visit.
    type Output;

    /// Called with the interleaved scalars; `data.len()` is a multiple of `C`.
    fn visit<T: Element, const C: usize>(self, data: &[T]) -> Self::Output;
}

/// Visitor over mutable typed scalars.
pub trait TypedVisitorMut {
    /// Result of the visit.
    type Output;

    /// Called with the interleaved scalars; `data.len()` is a multiple of `C`.
    fn visit<T: Element, const C: usize>(self, data: &mut [T]) -> Self::Output;
}

// Component count is validated by DataFormat, so 4 is the only remaining case.
macro_rules! by_components {
    ($comps:expr, $visitor:ident, $data:expr) => {
        match $comps {
            1 => $visitor.visit::<_, 1>($data),
            2 => $visitor.visit::<_, 2>($data),
            3 => $visitor.visit::<_, 3>($data),
            _ => $visitor.visit::<_, 4>($data),
        }
    };
}

fn check(format: DataFormat, data: &HostData) -> Result<()> {
    if format.scalar_type() != data.scalar_type() {
        return Err(Error::type_mismatch(
            format.to_string(),
            data.scalar_type().name(),
        ));
    }
    let comps = format.components();
    if data.len() % comps != 0 {
        return Err(Error::size_mismatch(
            data.len().div_ceil(comps) * comps,
            data.len(),
        ));
    }
    Ok(())
}

/// Run `visitor` over `data` interpreted as `format`.
///
/// Fails with [`Error::TypeMismatch`] when the stored scalars disagree with
/// `format`, and with [`Error::SizeMismatch`] when the scalar count is not a
/// whole number of elements.
pub fn dispatch<V: TypedVisitor>(format: DataFormat, data: &HostData, visitor: V) -> Result<V::Output> {
    check(format, data)?;
    let comps = format.components();
    Ok(each_variant!(data, v => by_components!(comps, visitor, v.as_slice())))
}

/// Mutable counterpart of [`dispatch`].
pub fn dispatch_mut<V: TypedVisitorMut>(
    format: DataFormat,
    data: &mut HostData,
    visitor: V,
) -> Result<V::Output> {
    check(format, data)?;
    let comps = format.components();
    Ok(each_variant!(data, v => by_components!(comps, visitor, v.as_mut_slice())))
}

fn format_components<T: Element, V: FormatVisitor>(comps: usize, visitor: V) -> V::Output {
    match comps {
        1 => visitor.visit::<T, 1>(),
        2 => visitor.visit::<T, 2>(),
        3 => visitor.visit::<T, 3>(),
        _ => visitor.visit::<T, 4>(),
    }
}

/// Instantiate `visitor` for `format` without any data.
pub fn dispatch_format<V: FormatVisitor>(format: DataFormat, visitor: V) -> V::Output {
    let comps = format.components();
    match format.scalar_type() {
        ScalarType::U8 => format_components::<u8, V>(comps, visitor),
        ScalarType::I8 => format_components::<i8, V>(comps, visitor),
        ScalarType::U16 => format_components::<u16, V>(comps, visitor),
        ScalarType::I16 => format_components::<i16, V>(comps, visitor),
        ScalarType::U32 => format_components::<u32, V>(comps, visitor),
        ScalarType::I32 => format_components::<i32, V>(comps, visitor),
        ScalarType::F16 => format_components::<f16, V>(comps, visitor),
        ScalarType::F32 => format_components::<f32, V>(comps, visitor),
        ScalarType::F64 => format_components::<f64, V>(comps, visitor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shape;

    impl TypedVisitor for Shape {
        type Output = (ScalarType, usize, usize);
        fn visit<T: Element, const C: usize>(self, data: &[T]) -> Self::Output {
            (T::SCALAR, C, data.len() / C)
        }
    }

    struct Scale(f64);

    impl TypedVisitorMut for Scale {
        type Output = ();
        fn visit<T: Element, const C: usize>(self, data: &mut [T]) {
            for v in data {
                *v = T::from_f64(v.to_f64() * self.0);
            }
        }
    }

    struct ElementBytes;

    impl FormatVisitor for ElementBytes {
        type Output = usize;
        fn visit<T: Element, const C: usize>(self) -> usize {
            std::mem::size_of::<[T; C]>()
        }
    }

    #[test]
    fn test_dispatch_picks_instantiation() {
        let data = HostData::zeros(ScalarType::I16, 12);
        let fmt = DataFormat::new(ScalarType::I16, 3).unwrap();
        assert_eq!(dispatch(fmt, &data, Shape).unwrap(), (ScalarType::I16, 3, 4));
    }

    #[test]
    fn test_dispatch_type_mismatch() {
        let data = HostData::zeros(ScalarType::U8, 4);
        let err = dispatch(DataFormat::scalar(ScalarType::F32), &data, Shape).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_dispatch_partial_element() {
        let data = HostData::zeros(ScalarType::U8, 5);
        let err = dispatch(DataFormat::vec4(ScalarType::U8), &data, Shape).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 8, actual: 5 }));
    }

    #[test]
    fn test_dispatch_mut() {
        let mut data = HostData::from_vec(vec![1.0f32, 2.0, 3.0, 4.0]);
        dispatch_mut(DataFormat::new(ScalarType::F32, 2).unwrap(), &mut data, Scale(2.0)).unwrap();
        assert_eq!(data.as_slice::<f32>().unwrap(), &[2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_dispatch_format_every_type() {
        for scalar in ScalarType::ALL {
            for comps in 1..=4u8 {
                let fmt = DataFormat::new(scalar, comps).unwrap();
                assert_eq!(dispatch_format(fmt, ElementBytes), fmt.size_in_bytes());
            }
        }
    }
}
