/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Strided layouts.
//!
//! A [`Layout`] is an affine map from logical coordinates to buffer
//! locations: `f(x) = offset + dot(strides, x)`. Every tensor view
//! is a layout over a shared buffer, so view operations here are pure
//! layout transformations and never touch cell data.
//!
//! Layouts are kept normalized: a size-1 dimension always has stride
//! 0, and a layout with no cells has all-zero strides and offset 0.
//! Under that normalization a compact row-major layout compares equal
//! to [`Layout::row_major`] of its shape.
//!
//! # Views
//!
//! [`Layout::view`] reinterprets a layout under a new shape without
//! copying. Base dimensions (ignoring size-1 dimensions) are grouped
//! into contiguous chunks, maximal runs satisfying
//!
//! ```text
//! stride[i] == stride[i+1] * size[i+1]
//! ```
//!
//! and each chunk must be covered exactly by a run of new dimensions.
//! If the new shape splits across a chunk boundary the layout cannot
//! be expressed as a view, and callers fall back to a compact copy.

use itertools::Itertools;

use crate::error::Result;
use crate::error::ZSpaceError;
use crate::indexing;
use crate::indexing::CoordIter;
use crate::indexing::SliceSpec;

mod sealed {
    pub trait Sealed {}
}

/// A map from integer coordinates to linear buffer locations.
pub trait LinearIndex: sealed::Sealed {
    /// The number of dimensions in the domain of the map.
    fn rank(&self) -> usize;

    /// The shape of the domain.
    fn sizes(&self) -> &[usize];

    /// Maps a coordinate, with negative wraparound per dimension, to
    /// a buffer location.
    fn offset_of(&self, coord: &[isize]) -> Result<usize>;
}

/// Shape, strides and offset of a tensor view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Layout {
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: isize,
}

impl Layout {
    /// The compact row-major layout of `shape`.
    pub fn row_major(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            strides: indexing::shape_to_strides(shape),
            offset: 0,
        }
    }

    /// The layout of a single cell.
    pub fn scalar() -> Self {
        Self::row_major(&[])
    }

    pub(crate) fn from_parts(shape: Vec<usize>, strides: Vec<isize>, offset: isize) -> Self {
        Self {
            shape,
            strides,
            offset,
        }
        .normalized()
    }

    fn normalized(mut self) -> Self {
        if self.shape.contains(&0) {
            self.strides.iter_mut().for_each(|s| *s = 0);
            self.offset = 0;
            return self;
        }
        for (size, stride) in self.shape.iter().zip(self.strides.iter_mut()) {
            if *size == 1 {
                *stride = 0;
            }
        }
        self
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn offset(&self) -> isize {
        self.offset
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn num_cells(&self) -> usize {
        indexing::shape_to_size(&self.shape)
    }

    pub fn is_empty(&self) -> bool {
        self.shape.contains(&0)
    }

    /// True when the layout is the row-major layout of its shape,
    /// starting at buffer location 0.
    pub fn is_row_major(&self) -> bool {
        self.offset == 0 && self.strides == indexing::shape_to_strides(&self.shape)
    }

    /// True when `dim` is backed by a single cell but has size > 1.
    pub fn is_broadcast_dim(&self, dim: usize) -> bool {
        self.strides[dim] == 0 && self.shape[dim] > 1
    }

    /// Location of an already-resolved coordinate.
    pub(crate) fn location(&self, coord: &[usize]) -> usize {
        debug_assert_eq!(coord.len(), self.ndim());
        let linear: isize = self
            .strides
            .iter()
            .zip(coord)
            .map(|(&s, &c)| s * c as isize)
            .sum();
        (self.offset + linear) as usize
    }

    /// Buffer locations of every cell, in row-major logical order.
    pub fn locations(&self) -> impl Iterator<Item = usize> + '_ {
        CoordIter::new(&self.shape).map(move |coord| self.location(&coord))
    }

    /// Smallest buffer length this layout may index into.
    pub(crate) fn required_len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let mut max = self.offset;
        for (&size, &stride) in self.shape.iter().zip(&self.strides) {
            if stride > 0 {
                max += (size as isize - 1) * stride;
            }
        }
        max as usize + 1
    }

    pub fn resolve_dim(&self, dim: isize) -> Result<usize> {
        indexing::resolve_dim(dim, self.ndim())
    }

    /// Reorder dimensions so that dimension `i` of the result is
    /// dimension `perm[i]` of this layout.
    pub fn permute(&self, perm: &[isize]) -> Result<Self> {
        let perm = indexing::resolve_permutation(perm, self.ndim())?;
        Ok(self.permute_resolved(&perm))
    }

    pub(crate) fn permute_resolved(&self, perm: &[usize]) -> Self {
        Self {
            shape: indexing::apply_permutation(&self.shape, perm),
            strides: indexing::apply_permutation(&self.strides, perm),
            offset: self.offset,
        }
    }

    /// Swap two dimensions.
    pub fn transpose(&self, a: isize, b: isize) -> Result<Self> {
        let a = self.resolve_dim(a)?;
        let b = self.resolve_dim(b)?;
        let mut layout = self.clone();
        layout.shape.swap(a, b);
        layout.strides.swap(a, b);
        Ok(layout)
    }

    /// Reverse the order of all dimensions.
    pub fn reversed_dims(&self) -> Self {
        let perm: Vec<usize> = (0..self.ndim()).rev().collect();
        self.permute_resolved(&perm)
    }

    /// Reverse the direction of traversal along `dim`.
    pub fn reverse(&self, dim: isize) -> Result<Self> {
        let d = self.resolve_dim(dim)?;
        let mut layout = self.clone();
        if layout.shape[d] > 0 {
            layout.offset += (layout.shape[d] as isize - 1) * layout.strides[d];
            layout.strides[d] = -layout.strides[d];
        }
        Ok(layout.normalized())
    }

    /// Fix `dim` at `index`, removing the dimension.
    pub fn select_dim(&self, dim: isize, index: isize) -> Result<Self> {
        self.select_dims(&[dim], &[index])
    }

    /// Fix each of `dims` at the matching entry of `indices`,
    /// removing those dimensions.
    pub fn select_dims(&self, dims: &[isize], indices: &[isize]) -> Result<Self> {
        if dims.len() != indices.len() {
            return Err(ZSpaceError::rank_mismatch(
                "dims/indices",
                dims.len(),
                indices.len(),
            ));
        }
        let dims = indexing::resolve_dims(dims, self.ndim())?;
        let mut offset = self.offset;
        for (&d, &i) in dims.iter().zip(indices) {
            let i = indexing::resolve_index("index", i, self.shape[d])?;
            offset += i as isize * self.strides[d];
        }
        let (shape, strides) = (0..self.ndim())
            .filter(|d| !dims.contains(d))
            .map(|d| (self.shape[d], self.strides[d]))
            .unzip();
        Ok(Self::from_parts(shape, strides, offset))
    }

    /// Slice `dim` by `spec`.
    ///
    /// With a positive step, absent bounds default to `0..size`; with
    /// a negative step they default to the full dimension traversed
    /// backwards.
    pub fn slice_dim(&self, dim: isize, spec: SliceSpec) -> Result<Self> {
        let d = self.resolve_dim(dim)?;
        let size = self.shape[d] as isize;
        let step = spec.step.unwrap_or(1);
        if step == 0 {
            return Err(ZSpaceError::InvalidArgument(format!(
                "slice step cannot be zero: {spec}"
            )));
        }

        let (start, end) = if step > 0 {
            let start = indexing::resolve_end_index("start", spec.start.unwrap_or(0), self.shape[d])?;
            let end = indexing::resolve_end_index("end", spec.end.unwrap_or(size), self.shape[d])?;
            if start < 0 || end < 0 || start > end {
                return Err(ZSpaceError::InvalidArgument(format!(
                    "slice start ({start}) must be <= end ({end}) for positive step ({step}): {spec}"
                )));
            }
            (start, end)
        } else {
            let start = indexing::resolve_end_index("start", spec.start.unwrap_or(size - 1), self.shape[d])?;
            let end = match spec.end {
                Some(end) => indexing::resolve_end_index("end", end, self.shape[d])?,
                None => -1,
            };
            if start >= size || end >= size || start < end {
                return Err(ZSpaceError::InvalidArgument(format!(
                    "slice start ({start}) must be >= end ({end}) for negative step ({step}): {spec}"
                )));
            }
            (start, end)
        };

        let abs_step = step.abs();
        let new_size = ((end - start).abs() + abs_step - 1) / abs_step;

        let mut layout = self.clone();
        layout.shape[d] = new_size as usize;
        if new_size > 0 {
            layout.offset += start * self.strides[d];
        }
        layout.strides[d] = self.strides[d] * step;
        Ok(layout.normalized())
    }

    /// Insert a size-1 dimension at `dim`, resolved against `ndim + 1`.
    pub fn unsqueeze(&self, dim: isize) -> Result<Self> {
        let d = indexing::resolve_dim(dim, self.ndim() + 1)?;
        let mut layout = self.clone();
        layout.shape.insert(d, 1);
        layout.strides.insert(d, 0);
        Ok(layout)
    }

    /// Remove a size-1 dimension.
    pub fn squeeze(&self, dim: isize) -> Result<Self> {
        let d = self.resolve_dim(dim)?;
        if self.shape[d] != 1 {
            return Err(ZSpaceError::InvalidArgument(format!(
                "cannot squeeze dimension {d} of size {}",
                self.shape[d]
            )));
        }
        let mut layout = self.clone();
        layout.shape.remove(d);
        layout.strides.remove(d);
        Ok(layout)
    }

    /// Stretch a single-cell dimension to `size`.
    pub fn broadcast_dim(&self, dim: isize, size: usize) -> Result<Self> {
        let d = self.resolve_dim(dim)?;
        let backed_by_one_cell = self.shape[d] == 1 || (self.strides[d] == 0 && self.shape[d] > 0);
        if !backed_by_one_cell {
            return Err(ZSpaceError::InvalidArgument(format!(
                "cannot broadcast dimension {d} with real-size {}",
                self.shape[d]
            )));
        }
        let mut layout = self.clone();
        layout.shape[d] = size;
        layout.strides[d] = 0;
        Ok(layout.normalized())
    }

    /// Broadcast to `target`, adding leading dimensions as needed.
    pub fn broadcast_to(&self, target: &[usize]) -> Result<Self> {
        let incompatible =
            || ZSpaceError::BroadcastIncompatible(vec![self.shape.clone(), target.to_vec()]);
        if self.ndim() > target.len() {
            return Err(incompatible());
        }
        let lead = target.len() - self.ndim();
        let mut shape = target[..lead].to_vec();
        shape.extend_from_slice(&self.shape);
        let mut strides = vec![0; lead];
        strides.extend_from_slice(&self.strides);

        for (i, &t) in target.iter().enumerate() {
            if shape[i] == t {
                continue;
            }
            if i < lead || shape[i] == 1 {
                shape[i] = t;
                strides[i] = 0;
            } else {
                return Err(incompatible());
            }
        }
        Ok(Self::from_parts(shape, strides, self.offset))
    }

    /// Reinterpret this layout under `shape` without copying.
    ///
    /// Returns `Ok(None)` when the cells cannot be addressed by a
    /// single strided layout of the new shape.
    pub fn view(&self, shape: &[usize]) -> Result<Option<Self>> {
        let cells = indexing::checked_shape_to_size(shape).ok_or_else(|| {
            ZSpaceError::InvalidArgument(format!("shape [{}] is too large", shape.iter().join(", ")))
        })?;
        if cells != self.num_cells() {
            return Err(ZSpaceError::InvalidArgument(format!(
                "cannot view [{}] ({} cells) as [{}] ({} cells)",
                self.shape.iter().join(", "),
                self.num_cells(),
                shape.iter().join(", "),
                cells,
            )));
        }
        if cells == 0 {
            return Ok(Some(Self::row_major(shape)));
        }

        // Size-1 dimensions carry no stride information.
        let base: Vec<(usize, isize)> = self
            .shape
            .iter()
            .zip(&self.strides)
            .filter(|(size, _)| **size != 1)
            .map(|(&size, &stride)| (size, stride))
            .collect();

        let mut strides = vec![0isize; shape.len()];
        let Some(&(_, last_stride)) = base.last() else {
            return Ok(Some(Self::from_parts(shape.to_vec(), strides, self.offset)));
        };

        let mut chunk_base_stride = last_stride;
        let mut base_cells = 1usize;
        let mut view_cells = 1usize;
        let mut view_d = shape.len();
        for base_d in (0..base.len()).rev() {
            base_cells *= base[base_d].0;
            let chunk_ends =
                base_d == 0 || base[base_d - 1].1 != base_cells as isize * chunk_base_stride;
            if !chunk_ends {
                continue;
            }
            while view_d > 0 && (view_cells < base_cells || shape[view_d - 1] == 1) {
                strides[view_d - 1] = view_cells as isize * chunk_base_stride;
                view_cells *= shape[view_d - 1];
                view_d -= 1;
            }
            if view_cells != base_cells {
                return Ok(None);
            }
            if base_d > 0 {
                chunk_base_stride = base[base_d - 1].1;
                base_cells = 1;
                view_cells = 1;
            }
        }
        if view_d != 0 {
            return Ok(None);
        }
        Ok(Some(Self::from_parts(shape.to_vec(), strides, self.offset)))
    }
}

impl sealed::Sealed for Layout {}

impl LinearIndex for Layout {
    fn rank(&self) -> usize {
        self.ndim()
    }

    fn sizes(&self) -> &[usize] {
        &self.shape
    }

    fn offset_of(&self, coord: &[isize]) -> Result<usize> {
        // offset + ∑ᵢ (strideᵢ × coordᵢ); never negative for an
        // in-bounds coordinate.
        let location = indexing::ravel(&self.shape, &self.strides, self.offset, coord)?;
        Ok(location as usize)
    }
}
