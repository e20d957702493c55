/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Index projection functions.
//!
//! An [`IndexProjectionFunction`] maps each point of an input index
//! space to a fixed-shape range of an output space: the point's image
//! under an affine map is the start of the range. This is how a
//! tensor operation describes which slice of an operand each point of
//! its iteration space reads or writes.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::affine_map::ZAffineMap;
use crate::error::Result;
use crate::error::ZSpaceError;
use crate::point::ZPoint;
use crate::range::ZRange;
use crate::traits::HasPermuteIO;

/// An affine map paired with the shape of the range it projects each
/// point onto.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "IpfFields", rename_all = "camelCase")]
pub struct IndexProjectionFunction {
    affine_map: ZAffineMap,
    shape: ZPoint,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpfFields {
    affine_map: ZAffineMap,
    #[serde(default)]
    shape: Option<ZPoint>,
}

impl TryFrom<IpfFields> for IndexProjectionFunction {
    type Error = ZSpaceError;

    fn try_from(fields: IpfFields) -> Result<Self> {
        match fields.shape {
            Some(shape) => Self::new(fields.affine_map, shape),
            None => Ok(Self::from_map(fields.affine_map)),
        }
    }
}

impl IndexProjectionFunction {
    /// Fails unless `shape` is non-negative with one coordinate per
    /// output dimension of `affine_map`.
    pub fn new(affine_map: ZAffineMap, shape: ZPoint) -> Result<Self> {
        if affine_map.output_ndim() != shape.ndim() {
            return Err(ZSpaceError::DimensionMismatch(format!(
                "affineMap.outputDim() ({}) != shape.dim() ({})",
                affine_map.output_ndim(),
                shape.ndim()
            )));
        }
        if shape.to_vec().iter().any(|&s| s < 0) {
            return Err(ZSpaceError::InvalidArgument(format!(
                "shape must be non-negative: {shape}"
            )));
        }
        Ok(Self { affine_map, shape })
    }

    /// Projects each point onto the unit range at its image.
    pub fn from_map(affine_map: ZAffineMap) -> Self {
        let shape = ZPoint::new_ones(affine_map.output_ndim());
        Self { affine_map, shape }
    }

    pub fn parse(input: &str) -> Result<Self> {
        tracing::trace!("parse index projection {:?}", input);
        serde_json::from_str(input).map_err(|e| ZSpaceError::malformed(input, e))
    }

    pub fn affine_map(&self) -> &ZAffineMap {
        &self.affine_map
    }

    pub fn shape(&self) -> &ZPoint {
        &self.shape
    }

    pub fn input_ndim(&self) -> usize {
        self.affine_map.input_ndim()
    }

    pub fn output_ndim(&self) -> usize {
        self.affine_map.output_ndim()
    }

    /// The range of `shape` starting at the image of `point`.
    pub fn apply(&self, point: &ZPoint) -> Result<ZRange> {
        ZRange::from_start_with_shape(&self.affine_map.apply(point)?, &self.shape)
    }

    /// Like [`IndexProjectionFunction::apply`], mapping the trailing
    /// `input_ndim` coordinates of `point`. The leading batch
    /// coordinates pass through as unit extents of the result.
    pub fn broadcast_apply(&self, point: &ZPoint) -> Result<ZRange> {
        let start = self.affine_map.broadcast_apply(point)?;
        let batch = ZPoint::new_ones(point.ndim() - self.input_ndim());
        ZRange::from_start_with_shape(&start, &batch.concat(&self.shape))
    }

    /// The bounding range of the projections of the first and last
    /// points of `range`. An empty range projects to an empty range at
    /// the image of its start.
    ///
    /// Covers the projection of every point of `range` when the map's
    /// coefficients are non-negative. With mixed signs, the corners
    /// need not be extreme and points may project outside the result.
    pub fn apply_range(&self, range: &ZRange) -> Result<ZRange> {
        let first = self.affine_map.apply(range.start())?;
        if range.is_empty() {
            return ZRange::from_start_with_shape(&first, &ZPoint::new_zeros(first.ndim()));
        }
        let head = ZRange::from_start_with_shape(&first, &self.shape)?;
        let tail = self.apply(&range.inclusive_end()?)?;
        ZRange::bounding_range([&head, &tail])
    }

    /// Shift the projected ranges by `delta`.
    pub fn translate(&self, delta: &ZPoint) -> Result<Self> {
        Ok(Self {
            affine_map: self.affine_map.translate(delta)?,
            shape: self.shape.clone(),
        })
    }
}

impl fmt::Display for IndexProjectionFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ipf(affineMap={}, shape={})", self.affine_map, self.shape)
    }
}

impl fmt::Debug for IndexProjectionFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::str::FromStr for IndexProjectionFunction {
    type Err = ZSpaceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use proptest::prelude::*;

    use super::*;
    use crate::matrix::ZMatrix;
    use crate::strategy::gen_non_negative_affine_map;
    use crate::strategy::gen_range_with_ndim;
    use crate::zpoint;

    fn example() -> IndexProjectionFunction {
        let map = ZAffineMap::new(
            ZMatrix::new(&[[1, 0], [0, 2], [1, 2]]).unwrap(),
            zpoint![4, 5, 6],
        )
        .unwrap();
        IndexProjectionFunction::new(map, zpoint![4, 4, 1]).unwrap()
    }

    #[test]
    fn test_construction() {
        let ipf = example();
        assert_eq!(ipf.input_ndim(), 2);
        assert_eq!(ipf.output_ndim(), 3);

        let unit = IndexProjectionFunction::from_map(ZAffineMap::identity(2).unwrap());
        assert_eq!(unit.shape(), &zpoint![1, 1]);

        let err = IndexProjectionFunction::new(ZAffineMap::identity(2).unwrap(), zpoint![1])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "dimension mismatch: affineMap.outputDim() (2) != shape.dim() (1)"
        );
        assert!(
            IndexProjectionFunction::new(ZAffineMap::identity(1).unwrap(), zpoint![-1]).is_err()
        );
    }

    #[test]
    fn test_apply_point() {
        let ipf = example();
        let range = ipf.apply(&zpoint![5, 6]).unwrap();
        assert_eq!(range.start(), &ipf.affine_map().apply(&zpoint![5, 6]).unwrap());
        assert_eq!(range.start(), &zpoint![9, 17, 23]);
        assert_eq!(range.shape(), &zpoint![4, 4, 1]);
        assert!(ipf.apply(&zpoint![5]).is_err());
    }

    #[test]
    fn test_broadcast_apply() {
        let ipf = example();
        let range = ipf.broadcast_apply(&zpoint![7, 8, 5, 6]).unwrap();
        assert_eq!(range.start(), &zpoint![7, 8, 9, 17, 23]);
        assert_eq!(range.shape(), &zpoint![1, 1, 4, 4, 1]);
        assert_eq!(ipf.broadcast_apply(&zpoint![5, 6]).unwrap(), ipf.apply(&zpoint![5, 6]).unwrap());
        assert!(ipf.broadcast_apply(&zpoint![5]).is_err());
    }

    #[test]
    fn test_apply_range() {
        let ipf = example();
        let source = ZRange::new(zpoint![0, 0], zpoint![2, 3]).unwrap();
        // Corners (0, 0) and (1, 2) map to (4, 5, 6) and (5, 9, 11).
        assert_eq!(
            ipf.apply_range(&source).unwrap(),
            ZRange::new(zpoint![4, 5, 6], zpoint![9, 13, 12]).unwrap()
        );

        let empty = ZRange::new(zpoint![1, 1], zpoint![1, 3]).unwrap();
        let projected = ipf.apply_range(&empty).unwrap();
        assert_eq!(projected.start(), &zpoint![5, 7, 9]);
        assert!(projected.is_empty());
        assert_eq!(projected.shape(), &zpoint![0, 0, 0]);
    }

    #[test]
    fn test_apply_range_mixed_signs() {
        // y = x0 - x1 over [0, 2) x [0, 2). The corners map to 0 and 0,
        // but (1, 0) maps to 1 and (0, 1) to -1.
        let map = ZAffineMap::from_rows(&[[1, -1]]).unwrap();
        let ipf = IndexProjectionFunction::from_map(map);
        let source = ZRange::from_shape(&zpoint![2, 2]).unwrap();
        let projected = ipf.apply_range(&source).unwrap();
        assert_eq!(projected, ZRange::new(zpoint![0], zpoint![1]).unwrap());

        let escapees: Vec<ZPoint> = source
            .coords()
            .filter(|p| {
                let image = ipf.apply(p).unwrap();
                !projected.contains_range(&image).unwrap()
            })
            .collect();
        assert_eq!(escapees, vec![zpoint![0, 1], zpoint![1, 0]]);
    }

    #[test]
    fn test_translate() {
        let ipf = example().translate(&zpoint![1, 0, -1]).unwrap();
        assert_eq!(ipf.shape(), &zpoint![4, 4, 1]);
        assert_eq!(ipf.apply(&zpoint![0, 0]).unwrap().start(), &zpoint![5, 5, 5]);
        assert!(example().translate(&zpoint![1]).is_err());
    }

    #[test]
    fn test_text_forms() {
        let ipf = example();
        assert_eq!(
            ipf.to_string(),
            "ipf(affineMap=λx.[[1,0],[0,2],[1,2]]⋅x + [4,5,6], shape=[4, 4, 1])"
        );
        let json = serde_json::to_string(&ipf).unwrap();
        assert_eq!(
            json,
            r#"{"affineMap":{"projection":[[1,0],[0,2],[1,2]],"offset":[4,5,6]},"shape":[4,4,1]}"#
        );
        assert_eq!(IndexProjectionFunction::parse(&json).unwrap(), ipf);

        let parsed = IndexProjectionFunction::parse(indoc! {r#"
            {
              "affineMap": {"projection": [[1, 0], [0, 1]]}
            }
        "#})
        .unwrap();
        assert_eq!(parsed.shape(), &zpoint![1, 1]);
        assert!(IndexProjectionFunction::parse(r#"{"shape":[1]}"#).is_err());
    }

    proptest! {
        #[test]
        fn test_corner_bounding_covers_non_negative_maps(
            (map, range) in gen_non_negative_affine_map(3, 3)
                .prop_flat_map(|map| {
                    let ndim = map.input_ndim();
                    (Just(map), gen_range_with_ndim(ndim, 4))
                }),
            shape in prop::collection::vec(0i32..3, 3),
        ) {
            let shape = ZPoint::new(&shape[..map.output_ndim()]);
            let ipf = IndexProjectionFunction::new(map, shape).unwrap();
            let projected = ipf.apply_range(&range).unwrap();
            for p in range.coords() {
                prop_assert!(projected.contains_range(&ipf.apply(&p).unwrap()).unwrap());
            }
        }
    }
}
