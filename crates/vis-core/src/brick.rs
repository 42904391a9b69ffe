//! Linear brick iteration over linearized N-D arrays.
//!
//! A [`Brick`] is an axis-aligned sub-box of a 3-D array stored in row-major
//! order with x varying fastest. 1-D and 2-D arrays use the same layout with
//! the unused dimensions set to 1.
//!
//! ```text
//! linear(x, y, z) = x + y * dx + z * dx * dy
//! ```
//!
//! [`BrickIter`] yields the linear element indices of a brick without
//! copying; [`RowIter`] yields whole scanline runs, which is what bulk
//! copies want. [`for_each_mut`] visits the elements of a brick in place.
//!
//! # Example
//!
//! ```rust
//! use glam::UVec3;
//! use vis_core::brick::Brick;
//!
//! let dims = UVec3::new(4, 4, 1);
//! let brick = Brick::new(UVec3::new(1, 1, 0), UVec3::new(2, 2, 1));
//! let idx: Vec<usize> = brick.iter(dims).unwrap().collect();
//! assert_eq!(idx, vec![5, 6, 9, 10]);
//! ```

use std::iter::FusedIterator;
use std::ops::Range;

use glam::UVec3;

use crate::{Error, Result};

/// Linear index of `pos` in an array of `dims`.
#[inline]
pub fn linear_index(pos: UVec3, dims: UVec3) -> usize {
    let (dx, dy) = (dims.x as usize, dims.y as usize);
    pos.x as usize + pos.y as usize * dx + pos.z as usize * dx * dy
}

/// Inverse of [`linear_index`].
#[inline]
pub fn position_of(index: usize, dims: UVec3) -> UVec3 {
    let (dx, dy) = (dims.x as usize, dims.y as usize);
    let plane = dx * dy;
    UVec3::new(
        (index % dx) as u32,
        ((index % plane) / dx) as u32,
        (index / plane) as u32,
    )
}

/// Number of elements in an array of `dims`.
#[inline]
pub fn element_count(dims: UVec3) -> usize {
    dims.x as usize * dims.y as usize * dims.z as usize
}

/// Axis-aligned sub-box of a 3-D array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Brick {
    /// Origin (inclusive).
    pub offset: UVec3,
    /// Size along each axis.
    pub extent: UVec3,
}

impl Brick {
    /// Creates a brick at `offset` with size `extent`.
    #[inline]
    pub const fn new(offset: UVec3, extent: UVec3) -> Self {
        Self { offset, extent }
    }

    /// Brick covering a whole array of `dims`.
    #[inline]
    pub const fn full(dims: UVec3) -> Self {
        Self::new(UVec3::ZERO, dims)
    }

    /// Number of elements in the brick.
    #[inline]
    pub fn voxel_count(&self) -> usize {
        element_count(self.extent)
    }

    /// Whether any axis has zero size.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extent.min_element() == 0
    }

    /// Exclusive upper corner.
    #[inline]
    pub fn end(&self) -> UVec3 {
        self.offset + self.extent
    }

    /// Whether the brick lies entirely inside an array of `dims`.
    pub fn fits(&self, dims: UVec3) -> bool {
        let end = self.offset.as_u64vec3() + self.extent.as_u64vec3();
        end.cmple(dims.as_u64vec3()).all()
    }

    /// Overlap of two bricks, `None` when they are disjoint.
    pub fn intersect(&self, other: &Brick) -> Option<Brick> {
        let lo = self.offset.max(other.offset);
        let hi = self.end().min(other.end());
        if lo.cmplt(hi).all() {
            Some(Brick::new(lo, hi - lo))
        } else {
            None
        }
    }

    fn checked(&self, dims: UVec3) -> Result<()> {
        if self.fits(dims) {
            Ok(())
        } else {
            Err(Error::invalid_region(self.offset.as_ivec3(), self.extent, dims))
        }
    }

    /// Iterator over the linear indices of this brick in an array of `dims`.
    pub fn iter(&self, dims: UVec3) -> Result<BrickIter> {
        self.checked(dims)?;
        Ok(BrickIter::new(*self, dims))
    }

    /// Iterator over the scanline runs of this brick in an array of `dims`.
    pub fn rows(&self, dims: UVec3) -> Result<RowIter> {
        self.checked(dims)?;
        Ok(RowIter::new(*self, dims))
    }
}

impl std::fmt::Display for Brick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{},{},{}]+[{}x{}x{}]",
            self.offset.x, self.offset.y, self.offset.z, self.extent.x, self.extent.y, self.extent.z
        )
    }
}

/// Linear indices of a brick, x fastest.
#[derive(Debug, Clone)]
pub struct BrickIter {
    brick: Brick,
    dims: UVec3,
    cursor: usize,
    len: usize,
}

impl BrickIter {
    fn new(brick: Brick, dims: UVec3) -> Self {
        Self {
            brick,
            dims,
            cursor: 0,
            len: brick.voxel_count(),
        }
    }
}

impl Iterator for BrickIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.cursor >= self.len {
            return None;
        }
        let local = position_of(self.cursor, self.brick.extent);
        self.cursor += 1;
        Some(linear_index(self.brick.offset + local, self.dims))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.len - self.cursor;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for BrickIter {}
impl FusedIterator for BrickIter {}

/// Scanline runs of a brick: one contiguous element range per (y, z) row.
#[derive(Debug, Clone)]
pub struct RowIter {
    brick: Brick,
    dims: UVec3,
    row: usize,
    rows: usize,
}

impl RowIter {
    fn new(brick: Brick, dims: UVec3) -> Self {
        let rows = if brick.is_empty() {
            0
        } else {
            brick.extent.y as usize * brick.extent.z as usize
        };
        Self {
            brick,
            dims,
            row: 0,
            rows,
        }
    }
}

impl Iterator for RowIter {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        if self.row >= self.rows {
            return None;
        }
        let ey = self.brick.extent.y as usize;
        let y = self.brick.offset.y + (self.row % ey) as u32;
        let z = self.brick.offset.z + (self.row / ey) as u32;
        self.row += 1;
        let start = linear_index(UVec3::new(self.brick.offset.x, y, z), self.dims);
        Some(start..start + self.brick.extent.x as usize)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.rows - self.row;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for RowIter {}
impl FusedIterator for RowIter {}

/// Visit every element of `brick` in place.
///
/// `data` holds `components` interleaved scalars per element of an array of
/// `dims`. The callback receives the element position and its components.
pub fn for_each_mut<T, F>(
    data: &mut [T],
    components: usize,
    dims: UVec3,
    brick: &Brick,
    mut f: F,
) -> Result<()>
where
    F: FnMut(UVec3, &mut [T]),
{
    let expected = element_count(dims) * components;
    if data.len() != expected {
        return Err(Error::size_mismatch(expected, data.len()));
    }
    for run in brick.rows(dims)? {
        let first = position_of(run.start, dims);
        let scalars = run.start * components..run.end * components;
        for (i, elem) in data[scalars].chunks_exact_mut(components).enumerate() {
            f(first + UVec3::new(i as u32, 0, 0), elem);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_index_roundtrip() {
        let dims = UVec3::new(4, 3, 2);
        for i in 0..element_count(dims) {
            assert_eq!(linear_index(position_of(i, dims), dims), i);
        }
        assert_eq!(linear_index(UVec3::new(1, 1, 1), UVec3::splat(4)), 21);
    }

    #[test]
    fn test_brick_iter_order() {
        let dims = UVec3::splat(3);
        let brick = Brick::new(UVec3::new(1, 0, 0), UVec3::new(2, 2, 2));
        let idx: Vec<usize> = brick.iter(dims).unwrap().collect();
        assert_eq!(idx, vec![1, 2, 4, 5, 10, 11, 13, 14]);
    }

    #[test]
    fn test_brick_iter_exact_size() {
        let brick = Brick::new(UVec3::ZERO, UVec3::new(3, 2, 2));
        let mut it = brick.iter(UVec3::splat(4)).unwrap();
        assert_eq!(it.len(), 12);
        it.next();
        assert_eq!(it.len(), 11);
    }

    #[test]
    fn test_brick_out_of_bounds() {
        let brick = Brick::new(UVec3::new(2, 0, 0), UVec3::new(2, 1, 1));
        let err = brick.iter(UVec3::new(3, 1, 1)).unwrap_err();
        assert!(err.is_region_error());
    }

    #[test]
    fn test_rows() {
        let dims = UVec3::new(4, 4, 1);
        let brick = Brick::new(UVec3::new(1, 2, 0), UVec3::new(3, 2, 1));
        let rows: Vec<_> = brick.rows(dims).unwrap().collect();
        assert_eq!(rows, vec![9..12, 13..16]);
    }

    #[test]
    fn test_empty_brick() {
        let brick = Brick::new(UVec3::ZERO, UVec3::new(0, 2, 2));
        assert!(brick.is_empty());
        assert_eq!(brick.iter(UVec3::splat(2)).unwrap().count(), 0);
        assert_eq!(brick.rows(UVec3::splat(2)).unwrap().count(), 0);
    }

    #[test]
    fn test_intersect() {
        let a = Brick::new(UVec3::ZERO, UVec3::splat(4));
        let b = Brick::new(UVec3::splat(2), UVec3::splat(4));
        assert_eq!(a.intersect(&b), Some(Brick::new(UVec3::splat(2), UVec3::splat(2))));
        let c = Brick::new(UVec3::splat(4), UVec3::ONE);
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn test_for_each_mut() {
        let dims = UVec3::new(3, 3, 1);
        let mut data = vec![0u8; 9 * 2];
        let brick = Brick::new(UVec3::new(1, 1, 0), UVec3::new(2, 1, 1));
        for_each_mut(&mut data, 2, dims, &brick, |pos, elem| {
            elem[0] = pos.x as u8;
            elem[1] = 7;
        })
        .unwrap();
        assert_eq!(&data[8..12], &[1, 7, 2, 7]);
        assert_eq!(data.iter().filter(|&&v| v == 7).count(), 2);
    }

    #[test]
    fn test_for_each_mut_size_check() {
        let mut data = vec![0u8; 5];
        let brick = Brick::full(UVec3::new(2, 2, 1));
        assert!(for_each_mut(&mut data, 1, UVec3::new(2, 2, 1), &brick, |_, _| {}).is_err());
    }
}
