/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Capabilities shared by the coordinate-space types.

use crate::error::Result;

/// Types that live in a space with a fixed number of dimensions.
pub trait HasDimension {
    /// The number of dimensions.
    fn ndim(&self) -> usize;
}

/// Types whose dimensions can be reordered.
pub trait HasPermute: Sized {
    /// Dimension `i` of the result is dimension `perm[i]` of `self`.
    /// Negative entries wrap.
    fn permute(&self, perm: &[isize]) -> Result<Self>;
}

/// Maps with separately permutable input and output spaces.
pub trait HasPermuteIO: Sized {
    fn input_ndim(&self) -> usize;

    fn output_ndim(&self) -> usize;

    /// Reorder the input dimensions, preserving the map's meaning
    /// under the reordered coordinates.
    fn permute_input(&self, perm: &[isize]) -> Result<Self>;

    /// Reorder the output dimensions.
    fn permute_output(&self, perm: &[isize]) -> Result<Self>;
}
