/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Index and dimension resolution.
//!
//! User-facing indices are signed: a negative index `i` counts back
//! from the end and resolves to `i + size`. Everything past
//! resolution works with `usize`.

mod coords;
mod selector;

pub use coords::CoordIter;
pub use selector::parse_selectors;
pub use selector::Selector;
pub use selector::SliceSpec;

use crate::error::Result;
use crate::error::ZSpaceError;

/// Resolve `index` against `size`, wrapping negative values.
pub fn resolve_index(label: &str, index: isize, size: usize) -> Result<usize> {
    let resolved = if index < 0 {
        index + size as isize
    } else {
        index
    };
    if resolved < 0 || resolved as usize >= size {
        return Err(ZSpaceError::IndexOutOfRange {
            label: label.to_string(),
            index,
            size,
        });
    }
    Ok(resolved as usize)
}

/// Resolve an exclusive end bound against `size`.
///
/// Unlike [`resolve_index`], the result may be `size` (one past the
/// last element) or `-1` (one before the first, used as the end of a
/// negative-step slice).
pub fn resolve_end_index(label: &str, index: isize, size: usize) -> Result<isize> {
    let size = size as isize;
    let resolved = if index < 0 { index + size } else { index };
    if resolved < -1 || resolved > size {
        return Err(ZSpaceError::IndexOutOfRange {
            label: label.to_string(),
            index,
            size: size as usize,
        });
    }
    Ok(resolved)
}

/// Resolve a dimension index against a rank.
pub fn resolve_dim(dim: isize, ndim: usize) -> Result<usize> {
    resolve_index("invalid dimension", dim, ndim)
}

/// Resolve a list of dimensions, rejecting duplicates.
pub fn resolve_dims(dims: &[isize], ndim: usize) -> Result<Vec<usize>> {
    let mut resolved = Vec::with_capacity(dims.len());
    for &dim in dims {
        let d = resolve_dim(dim, ndim)?;
        if resolved.contains(&d) {
            return Err(ZSpaceError::InvalidArgument(format!(
                "duplicate dimension {dim} in {dims:?}"
            )));
        }
        resolved.push(d);
    }
    Ok(resolved)
}

/// Resolve a permutation of `ndim` dimensions.
///
/// Every entry is resolved with negative wraparound; the result must
/// name each of `0..ndim` exactly once.
pub fn resolve_permutation(perm: &[isize], ndim: usize) -> Result<Vec<usize>> {
    if perm.len() != ndim {
        return Err(ZSpaceError::InvalidPermutation(perm.to_vec()));
    }
    let mut seen = vec![false; ndim];
    let mut resolved = Vec::with_capacity(ndim);
    for &p in perm {
        let d = resolve_dim(p, ndim).map_err(|_| ZSpaceError::InvalidPermutation(perm.to_vec()))?;
        if seen[d] {
            return Err(ZSpaceError::InvalidPermutation(perm.to_vec()));
        }
        seen[d] = true;
        resolved.push(d);
    }
    Ok(resolved)
}

/// Apply a resolved permutation: `result[i] = values[perm[i]]`.
pub fn apply_permutation<T: Clone>(values: &[T], perm: &[usize]) -> Vec<T> {
    perm.iter().map(|&p| values[p].clone()).collect()
}

/// The broadcast shape of two shapes.
///
/// Shapes are right-aligned; the shorter one is padded on the left
/// with ones. Aligned sizes must be equal, or one of them must be 1.
pub fn common_broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>> {
    let ndim = lhs.len().max(rhs.len());
    let mut shape = vec![1; ndim];
    for i in 0..ndim {
        let a = if i < ndim - lhs.len() {
            1
        } else {
            lhs[i - (ndim - lhs.len())]
        };
        let b = if i < ndim - rhs.len() {
            1
        } else {
            rhs[i - (ndim - rhs.len())]
        };
        shape[i] = if a == b || b == 1 {
            a
        } else if a == 1 {
            b
        } else {
            return Err(ZSpaceError::BroadcastIncompatible(vec![
                lhs.to_vec(),
                rhs.to_vec(),
            ]));
        };
    }
    Ok(shape)
}

/// The broadcast shape of any number of shapes. An empty input
/// yields the scalar shape.
pub fn common_broadcast_shape_all<'a>(
    shapes: impl IntoIterator<Item = &'a [usize]>,
) -> Result<Vec<usize>> {
    let mut acc: Vec<usize> = Vec::new();
    let mut seen: Vec<Vec<usize>> = Vec::new();
    for shape in shapes {
        seen.push(shape.to_vec());
        acc = common_broadcast_shape(&acc, shape)
            .map_err(|_| ZSpaceError::BroadcastIncompatible(seen.clone()))?;
    }
    Ok(acc)
}

/// Number of cells in `shape`; the empty shape has one.
pub fn shape_to_size(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Like [`shape_to_size`], but `None` on overflow.
pub fn checked_shape_to_size(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &s| acc.checked_mul(s))
}

/// Row-major strides for a compact layout of `shape`.
///
/// The trailing dimension has stride 1 and each preceding dimension
/// steps over the next. Dimensions of size 1 get stride 0, which makes
/// them broadcastable in place. A shape with any zero-size dimension
/// holds no cells and gets all-zero strides.
pub fn shape_to_strides(shape: &[usize]) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    if shape.contains(&0) {
        return strides;
    }
    let mut step = 1isize;
    for i in (0..shape.len()).rev() {
        if shape[i] > 1 {
            strides[i] = step;
            step *= shape[i] as isize;
        }
    }
    strides
}

/// Linear location of `coords` under `(shape, strides, offset)`.
///
/// Each coordinate is resolved against its dimension with negative
/// wraparound.
pub fn ravel(shape: &[usize], strides: &[isize], offset: isize, coords: &[isize]) -> Result<isize> {
    if shape.len() != strides.len() {
        return Err(ZSpaceError::rank_mismatch("shape/strides", shape.len(), strides.len()));
    }
    if coords.len() != shape.len() {
        return Err(ZSpaceError::rank_mismatch("coords/shape", coords.len(), shape.len()));
    }
    let mut location = offset;
    for ((&c, &size), &stride) in coords.iter().zip(shape).zip(strides) {
        location += resolve_index("coord", c, size)? as isize * stride;
    }
    Ok(location)
}
