/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Integer array algebra over N-dimensional coordinate spaces.
//!
//! The crate is built bottom up:
//!
//! - [`indexing`] resolves indices, permutations and broadcast shapes.
//! - [`tensor`] provides strided integer tensors. [`ZTensor`] is
//!   mutable and its views alias the same buffer; [`FrozenZTensor`]
//!   is immutable, hashable and shareable across threads.
//! - [`ZPoint`] is a coordinate, ordered by [`dominance`].
//! - [`ZRange`] is a half-open box of coordinates.
//! - [`ZMatrix`] and [`ZAffineMap`] map one coordinate space into
//!   another, and an [`IndexProjectionFunction`] projects points onto
//!   ranges.
//!
//! ```
//! use zspace::IndexProjectionFunction;
//! use zspace::ZAffineMap;
//! use zspace::ZRange;
//! use zspace::zpoint;
//!
//! let map = ZAffineMap::from_rows(&[[1, 0], [0, 2]]).unwrap();
//! let ipf = IndexProjectionFunction::new(map, zpoint![1, 2]).unwrap();
//! let range = ZRange::parse("zr[0:4, 0:3]").unwrap();
//! assert_eq!(ipf.apply_range(&range).unwrap().to_string(), "zr[0:4, 0:6]");
//! ```

// The point module comes first so that `zpoint!` is in textual scope
// for the modules below it.
#[macro_use]
pub mod point;

pub mod affine_map;
pub mod config;
pub mod dimension_map;
pub mod dominance;
pub mod error;
pub mod indexing;
pub mod ipf;
pub mod matrix;
pub mod range;
pub mod tensor;
pub mod traits;

#[cfg(test)]
mod strategy;

pub use affine_map::ZAffineMap;
pub use dimension_map::DimensionMap;
pub use dimension_map::HasNamedPermute;
pub use dominance::PartialOrdering;
pub use error::Result;
pub use error::ZSpaceError;
pub use indexing::Selector;
pub use ipf::IndexProjectionFunction;
pub use matrix::ZMatrix;
pub use point::ZPoint;
pub use range::ZRange;
pub use tensor::FrozenZTensor;
pub use tensor::Operand;
pub use tensor::TensorRead;
pub use tensor::TensorView;
pub use tensor::ZTensor;
pub use traits::HasDimension;
pub use traits::HasPermute;
pub use traits::HasPermuteIO;

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn test_affine_scenario() -> anyhow::Result<()> {
        init_logging();
        let map = ZAffineMap::new(
            ZMatrix::new(&[[1, 0], [0, 2], [1, 2]])?,
            zpoint![4, 5, 6],
        )?;
        let x = zpoint![1, 1];
        assert_eq!(map.apply(&x)?, zpoint![5, 7, 9]);

        let permuted = map.permute_input(&[1, 0])?;
        assert_eq!(permuted.projection(), &ZMatrix::new(&[[0, 1], [2, 0], [2, 1]])?);
        assert_eq!(permuted.offset(), map.offset());
        assert_eq!(permuted.apply(&x.permute(&[1, 0])?)?, zpoint![5, 7, 9]);

        let ipf = IndexProjectionFunction::new(map, zpoint![4, 4, 1])?;
        let projected = ipf.apply(&zpoint![5, 6])?;
        assert_eq!(projected.start(), &ipf.affine_map().apply(&zpoint![5, 6])?);
        assert_eq!(projected.shape(), &zpoint![4, 4, 1]);
        Ok(())
    }

    #[test]
    fn test_tensor_scenario() -> anyhow::Result<()> {
        init_logging();
        let t = ZTensor::parse("[[1, 2, 3], [4, 5, 6]]")?;
        let column = t.select_str(":, 1")?;
        column.add_(&10)?;
        assert_eq!(t.to_string(), "[[1, 12, 3], [4, 15, 6]]");

        let frozen = t.t().into_frozen();
        assert_eq!(frozen.shape(), &[3, 2]);
        assert_eq!(frozen.sum_dims(&[1])?, ZTensor::new_vector(&[5, 27, 9]));

        let range = ZRange::from_shape(&t.shape_point()?)?;
        assert_eq!(range.to_string(), "zr[0:2, 0:3]");
        assert!(range.contains_point(&zpoint![1, 2])?);
        assert!(!range.contains_point(&zpoint![2, 3])?);
        Ok(())
    }
}
