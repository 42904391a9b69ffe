//! Host-memory scalar storage as a closed sum type.
//!
//! [`HostData`] holds a flat, interleaved array of scalars in one of the
//! nine supported scalar types. Component count and extent live with the
//! owner (the host representation); this type only knows its scalars.
//!
//! Byte-level access goes through [`bytemuck`], so the same bytes can be
//! handed to a device upload without an intermediate copy.

use half::f16;

use crate::element::Element;
use crate::format::ScalarType;
use crate::{Error, Result};

/// Flat scalar storage in host memory.
#[derive(Debug, Clone, PartialEq)]
pub enum HostData {
    /// 8-bit unsigned scalars.
    U8(Vec<u8>),
    /// 8-bit signed scalars.
    I8(Vec<i8>),
    /// 16-bit unsigned scalars.
    U16(Vec<u16>),
    /// 16-bit signed scalars.
    I16(Vec<i16>),
    /// 32-bit unsigned scalars.
    U32(Vec<u32>),
    /// 32-bit signed scalars.
    I32(Vec<i32>),
    /// Half-precision scalars.
    F16(Vec<f16>),
    /// Single-precision scalars.
    F32(Vec<f32>),
    /// Double-precision scalars.
    F64(Vec<f64>),
}

/// Expands `$body` once per variant with `$v` bound to the inner vector.
macro_rules! each_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            HostData::U8($v) => $body,
            HostData::I8($v) => $body,
            HostData::U16($v) => $body,
            HostData::I16($v) => $body,
            HostData::U32($v) => $body,
            HostData::I32($v) => $body,
            HostData::F16($v) => $body,
            HostData::F32($v) => $body,
            HostData::F64($v) => $body,
        }
    };
}
pub(crate) use each_variant;

impl HostData {
    /// Zero-filled storage of `len` scalars.
    pub fn zeros(scalar: ScalarType, len: usize) -> Self {
        match scalar {
            ScalarType::U8 => Self::U8(vec![0; len]),
            ScalarType::I8 => Self::I8(vec![0; len]),
            ScalarType::U16 => Self::U16(vec![0; len]),
            ScalarType::I16 => Self::I16(vec![0; len]),
            ScalarType::U32 => Self::U32(vec![0; len]),
            ScalarType::I32 => Self::I32(vec![0; len]),
            ScalarType::F16 => Self::F16(vec![f16::ZERO; len]),
            ScalarType::F32 => Self::F32(vec![0.0; len]),
            ScalarType::F64 => Self::F64(vec![0.0; len]),
        }
    }

    /// Wrap a typed vector.
    #[inline]
    pub fn from_vec<T: Element>(data: Vec<T>) -> Self {
        T::into_host(data)
    }

    /// Rebuild typed storage from raw bytes (e.g. a device read-back).
    ///
    /// The byte count must be a multiple of the scalar size.
    pub fn from_bytes(scalar: ScalarType, bytes: &[u8]) -> Result<Self> {
        let size = scalar.size_in_bytes();
        if bytes.len() % size != 0 {
            return Err(Error::size_mismatch(
                bytes.len().div_ceil(size) * size,
                bytes.len(),
            ));
        }
        Ok(match scalar {
            ScalarType::U8 => Self::U8(bytes.to_vec()),
            ScalarType::I8 => Self::I8(bytemuck::pod_collect_to_vec(bytes)),
            ScalarType::U16 => Self::U16(bytemuck::pod_collect_to_vec(bytes)),
            ScalarType::I16 => Self::I16(bytemuck::pod_collect_to_vec(bytes)),
            ScalarType::U32 => Self::U32(bytemuck::pod_collect_to_vec(bytes)),
            ScalarType::I32 => Self::I32(bytemuck::pod_collect_to_vec(bytes)),
            ScalarType::F16 => Self::F16(bytemuck::pod_collect_to_vec(bytes)),
            ScalarType::F32 => Self::F32(bytemuck::pod_collect_to_vec(bytes)),
            ScalarType::F64 => Self::F64(bytemuck::pod_collect_to_vec(bytes)),
        })
    }

    /// Runtime scalar tag.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::U8(_) => ScalarType::U8,
            Self::I8(_) => ScalarType::I8,
            Self::U16(_) => ScalarType::U16,
            Self::I16(_) => ScalarType::I16,
            Self::U32(_) => ScalarType::U32,
            Self::I32(_) => ScalarType::I32,
            Self::F16(_) => ScalarType::F16,
            Self::F32(_) => ScalarType::F32,
            Self::F64(_) => ScalarType::F64,
        }
    }

    /// Number of scalars.
    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    /// Whether there are no scalars.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.len() * self.scalar_type().size_in_bytes()
    }

    /// Raw byte view.
    pub fn as_bytes(&self) -> &[u8] {
        each_variant!(self, v => bytemuck::cast_slice(v.as_slice()))
    }

    /// Mutable raw byte view.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        each_variant!(self, v => bytemuck::cast_slice_mut(v.as_mut_slice()))
    }

    /// Typed slice, failing with [`Error::TypeMismatch`] on the wrong type.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        T::slice(self).ok_or_else(|| Error::type_mismatch(T::SCALAR.name(), self.scalar_type().name()))
    }

    /// Mutable typed slice, failing with [`Error::TypeMismatch`] on the wrong type.
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        let actual = self.scalar_type();
        T::slice_mut(self).ok_or_else(|| Error::type_mismatch(T::SCALAR.name(), actual.name()))
    }

    /// Scalar at `index` widened to f64.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        each_variant!(self, v => v.get(index).map(|s| s.to_f64()))
    }

    /// Store `value` at `index`, narrowing to the stored type.
    ///
    /// Returns `false` if `index` is out of range.
    pub fn set_f64(&mut self, index: usize, value: f64) -> bool {
        each_variant!(self, v => match v.get_mut(index) {
            Some(slot) => {
                *slot = Element::from_f64(value);
                true
            }
            None => false,
        })
    }

    /// Resize to `len` scalars; new scalars are zero.
    pub fn resize(&mut self, len: usize) {
        each_variant!(self, v => v.resize(len, Default::default()))
    }

    /// Copy bytes into `range` of the storage, starting at byte `offset`.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let dst = self.as_bytes_mut();
        let end = offset
            .checked_add(bytes.len())
            .filter(|&e| e <= dst.len())
            .ok_or_else(|| Error::size_mismatch(dst.len(), offset.saturating_add(bytes.len())))?;
        dst[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}
