/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Property-based generators for shapes, tensors, points, ranges and
//! affine maps.
//!
//! Generated values are kept small: coordinates and cells stay within
//! a few dozen of zero, so sums and products over them never overflow
//! `i32`.
//!
//! Example usage:
//!
//! ```ignore
//! use proptest::prelude::*;
//!
//! use crate::strategy::gen_range;
//!
//! proptest! {
//!     #[test]
//!     fn test_range(r in gen_range(3, 4)) {
//!         // Use `r` as input to containment or split tests
//!     }
//! }
//! ```
//!
//! This module is only included in test builds (`#[cfg(test)]`).

use proptest::prelude::*;

use crate::affine_map::ZAffineMap;
use crate::matrix::ZMatrix;
use crate::point::ZPoint;
use crate::range::ZRange;
use crate::tensor::ZTensor;

/// Generates shapes of rank at most `max_ndim` whose sizes lie in
/// `0..=max_size`. Sizes of 0 and 1 are common, so broadcasting and
/// empty-tensor paths get exercised.
pub fn gen_shape(max_ndim: usize, max_size: usize) -> BoxedStrategy<Vec<usize>> {
    prop::collection::vec(0..=max_size, 0..=max_ndim).boxed()
}

/// Generates compact tensors of rank at most `max_ndim` with every
/// size in `1..=max_size`.
///
/// Zero-size dimensions are excluded: their text forms collapse to an
/// all-zero shape and would not survive a round trip.
pub fn gen_tensor(max_ndim: usize, max_size: usize) -> BoxedStrategy<ZTensor> {
    prop::collection::vec(1..=max_size.max(1), 0..=max_ndim)
        .prop_flat_map(|shape| {
            let num_cells = shape.iter().product::<usize>();
            (Just(shape), prop::collection::vec(-50i32..50, num_cells))
        })
        .prop_map(|(shape, cells)| ZTensor::new(&shape, cells).unwrap())
        .boxed()
}

/// Generates points with exactly `ndim` coordinates in
/// `-bound..=bound`.
pub fn gen_point(ndim: usize, bound: i32) -> BoxedStrategy<ZPoint> {
    prop::collection::vec(-bound..=bound, ndim)
        .prop_map(ZPoint::from)
        .boxed()
}

/// Generates ranges of exactly `ndim` dimensions whose extents lie in
/// `0..=max_size`.
pub fn gen_range_with_ndim(ndim: usize, max_size: usize) -> BoxedStrategy<ZRange> {
    let max_size = max_size as i32;
    (
        gen_point(ndim, 8),
        prop::collection::vec(0..=max_size, ndim),
    )
        .prop_map(|(start, shape)| {
            ZRange::from_start_with_shape(&start, &ZPoint::from(shape)).unwrap()
        })
        .boxed()
}

/// Generates ranges of at most `max_ndim` dimensions.
pub fn gen_range(max_ndim: usize, max_size: usize) -> BoxedStrategy<ZRange> {
    (0..=max_ndim)
        .prop_flat_map(move |ndim| gen_range_with_ndim(ndim, max_size))
        .boxed()
}

/// Generates a pair of ranges sharing a dimensionality in
/// `1..=max_ndim`.
pub fn gen_range_pair(max_ndim: usize, max_size: usize) -> BoxedStrategy<(ZRange, ZRange)> {
    (1..=max_ndim.max(1))
        .prop_flat_map(move |ndim| {
            (
                gen_range_with_ndim(ndim, max_size),
                gen_range_with_ndim(ndim, max_size),
            )
        })
        .boxed()
}

fn gen_affine_map_with(
    max_input_ndim: usize,
    max_output_ndim: usize,
    coefficients: std::ops::RangeInclusive<i32>,
) -> BoxedStrategy<ZAffineMap> {
    (1..=max_input_ndim.max(1), 1..=max_output_ndim.max(1))
        .prop_flat_map(move |(input_ndim, output_ndim)| {
            (
                prop::collection::vec(
                    prop::collection::vec(coefficients.clone(), input_ndim),
                    output_ndim,
                ),
                gen_point(output_ndim, 10),
            )
        })
        .prop_map(|(rows, offset)| ZAffineMap::new(ZMatrix::new(&rows).unwrap(), offset).unwrap())
        .boxed()
}

/// Generates affine maps with small coefficients of either sign. Both
/// spaces have at least one dimension.
pub fn gen_affine_map(max_input_ndim: usize, max_output_ndim: usize) -> BoxedStrategy<ZAffineMap> {
    gen_affine_map_with(max_input_ndim, max_output_ndim, -3..=3)
}

/// Generates affine maps whose projection has no negative entries.
pub fn gen_non_negative_affine_map(
    max_input_ndim: usize,
    max_output_ndim: usize,
) -> BoxedStrategy<ZAffineMap> {
    gen_affine_map_with(max_input_ndim, max_output_ndim, 0..=3)
}
