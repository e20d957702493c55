/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Half-open integer boxes.
//!
//! A [`ZRange`] is the set of points `p` with `start <= p < end` in
//! every coordinate. Ranges have two text forms, both accepted by
//! [`ZRange::parse`]:
//!
//! ```text
//! zr[2:4, 3:5]
//! {"start":[2,3],"end":[4,5]}
//! ```
//!
//! The 0-dimensional range `zr[]` holds exactly one point, the empty
//! coordinate.

use std::fmt;

use itertools::Itertools;
use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::character::complete::digit1;
use nom::character::complete::multispace0;
use nom::combinator::all_consuming;
use nom::combinator::map_res;
use nom::combinator::opt;
use nom::combinator::recognize;
use nom::multi::separated_list0;
use nom::sequence::delimited;
use nom::sequence::pair;
use nom::sequence::separated_pair;
use nom::IResult;
use serde::Deserialize;
use serde::Serialize;

use crate::dominance;
use crate::error::Result;
use crate::error::ZSpaceError;
use crate::indexing;
use crate::indexing::CoordIter;
use crate::point::ZPoint;
use crate::traits::HasDimension;
use crate::traits::HasPermute;

/// A half-open box `[start, end)` in an integer coordinate space.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RangeBounds")]
pub struct ZRange {
    start: ZPoint,
    end: ZPoint,
    #[serde(skip_serializing)]
    shape: ZPoint,
}

/// The serialized fields of a range, before validation.
#[derive(Deserialize)]
struct RangeBounds {
    start: ZPoint,
    end: ZPoint,
}

impl TryFrom<RangeBounds> for ZRange {
    type Error = ZSpaceError;

    fn try_from(bounds: RangeBounds) -> Result<Self> {
        Self::new(bounds.start, bounds.end)
    }
}

impl ZRange {
    /// The range `[start, end)`. Fails unless the points share a rank
    /// and `start <= end` in every coordinate.
    pub fn new(start: ZPoint, end: ZPoint) -> Result<Self> {
        if start.ndim() != end.ndim() {
            return Err(ZSpaceError::rank_mismatch("range bounds", start.ndim(), end.ndim()));
        }
        if !dominance::le(&start, &end)? {
            return Err(ZSpaceError::InvalidArgument(format!(
                "start {start} must be <= end {end}"
            )));
        }
        let shape = end.sub(&start)?;
        Ok(Self { start, end, shape })
    }

    /// The range `[0, shape)`.
    pub fn from_shape(shape: &ZPoint) -> Result<Self> {
        Self::new(ZPoint::new_zeros(shape.ndim()), shape.clone())
    }

    /// The range `[start, start + shape)`.
    pub fn from_start_with_shape(start: &ZPoint, shape: &ZPoint) -> Result<Self> {
        Self::new(start.clone(), start.add(shape)?)
    }

    /// The 0-dimensional range.
    pub fn scalar() -> Self {
        Self {
            start: ZPoint::new_zeros(0),
            end: ZPoint::new_zeros(0),
            shape: ZPoint::new_zeros(0),
        }
    }

    /// Parses `zr[..]` or the JSON object form.
    pub fn parse(input: &str) -> Result<Self> {
        tracing::trace!("parse range {:?}", input);
        let trimmed = input.trim();
        if trimmed.starts_with('{') {
            return serde_json::from_str(trimmed).map_err(|e| ZSpaceError::malformed(input, e));
        }
        let (_, bounds) = all_consuming(pretty_range)(trimmed)
            .map_err(|e| ZSpaceError::malformed(input, e))?;
        let (start, end): (Vec<i32>, Vec<i32>) = bounds.into_iter().unzip();
        Self::new(ZPoint::from(start), ZPoint::from(end))
    }

    pub fn start(&self) -> &ZPoint {
        &self.start
    }

    pub fn end(&self) -> &ZPoint {
        &self.end
    }

    /// `end - start`.
    pub fn shape(&self) -> &ZPoint {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.start.ndim()
    }

    /// The number of points in the range, saturating at `usize::MAX`.
    pub fn size(&self) -> usize {
        self.shape
            .to_vec()
            .into_iter()
            .fold(1usize, |acc, s| acc.saturating_mul(s as usize))
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn resolve_dim(&self, dim: isize) -> Result<usize> {
        indexing::resolve_dim(dim, self.ndim())
    }

    /// The greatest point in the range, `end - 1`.
    pub fn inclusive_end(&self) -> Result<ZPoint> {
        if self.is_empty() {
            return Err(ZSpaceError::InvalidArgument(format!(
                "empty range {self} has no inclusive end"
            )));
        }
        self.end.sub(&ZPoint::new_ones(self.ndim()))
    }

    /// True when `other` lies within this range. Every 0-dimensional
    /// range contains every other, and an empty range may be contained
    /// by ranges that contain none of its (absent) points.
    pub fn contains_range(&self, other: &ZRange) -> Result<bool> {
        if self.ndim() != other.ndim() {
            return Err(ZSpaceError::rank_mismatch("contains", self.ndim(), other.ndim()));
        }
        if self.ndim() == 0 {
            return Ok(true);
        }
        Ok(dominance::le(&self.start, &other.start)? && dominance::le(&other.end, &self.end)?)
    }

    /// True when `start <= point` and `point < end` under dominance. The
    /// upper bound only needs one coordinate strictly below `end`, so
    /// points on the upper faces other than `end` itself are accepted.
    /// An empty range contains no points; a 0-dimensional range contains
    /// the empty point.
    pub fn contains_point(&self, point: &ZPoint) -> Result<bool> {
        if self.ndim() != point.ndim() {
            return Err(ZSpaceError::rank_mismatch("contains", self.ndim(), point.ndim()));
        }
        if self.is_empty() {
            return Ok(false);
        }
        if self.ndim() == 0 {
            return Ok(true);
        }
        Ok(dominance::le(&self.start, point)? && dominance::lt(point, &self.end)?)
    }

    /// The overlap of two ranges, or `None` when they are disjoint.
    pub fn intersection(&self, other: &ZRange) -> Result<Option<ZRange>> {
        let start = self.start.maximum(&other.start)?;
        let end = self.end.minimum(&other.end)?;
        if !dominance::le(&start, &end)? {
            return Ok(None);
        }
        Ok(Some(Self::new(start, end)?))
    }

    /// The smallest range containing every range in `ranges`.
    pub fn bounding_range<'a>(ranges: impl IntoIterator<Item = &'a ZRange>) -> Result<ZRange> {
        let mut ranges = ranges.into_iter();
        let first = ranges
            .next()
            .ok_or_else(|| ZSpaceError::InvalidArgument("no ranges".to_string()))?;
        let (start, end) = ranges.try_fold(
            (first.start.clone(), first.end.clone()),
            |(start, end), r| Ok::<_, ZSpaceError>((start.minimum(&r.start)?, end.maximum(&r.end)?)),
        )?;
        Self::new(start, end)
    }

    /// Shift both bounds by `delta`.
    pub fn translate(&self, delta: &ZPoint) -> Result<Self> {
        Self::new(self.start.add(delta)?, self.end.add(delta)?)
    }

    /// Cut the range along `dim` into consecutive pieces of
    /// `chunk_size`; the last piece may be shorter.
    pub fn split(&self, dim: isize, chunk_size: usize) -> Result<Vec<ZRange>> {
        let d = self.resolve_dim(dim)?;
        if chunk_size == 0 {
            return Err(ZSpaceError::InvalidArgument(
                "chunk size must be > 0: 0".to_string(),
            ));
        }
        let dim_size = self.dim_size(d);
        if chunk_size >= dim_size {
            return Ok(vec![self.clone()]);
        }
        let num_chunks = dim_size.div_ceil(chunk_size);
        let mut sizes = vec![chunk_size; num_chunks];
        sizes[num_chunks - 1] = dim_size - (num_chunks - 1) * chunk_size;
        self.split_unchecked(d, &sizes)
    }

    /// Cut the range along `dim` into consecutive pieces of the given
    /// sizes, which must be positive and sum to the size of `dim`.
    pub fn split_by_sizes(&self, dim: isize, sizes: &[usize]) -> Result<Vec<ZRange>> {
        let d = self.resolve_dim(dim)?;
        if sizes.contains(&0) {
            return Err(ZSpaceError::InvalidArgument(format!(
                "chunk size must be > 0: {sizes:?}"
            )));
        }
        let total: usize = sizes.iter().sum();
        let dim_size = self.dim_size(d);
        if total != dim_size {
            return Err(ZSpaceError::InvalidArgument(format!(
                "total chunk size ({total}) must be equal to dim size ({dim_size}): {sizes:?}"
            )));
        }
        self.split_unchecked(d, sizes)
    }

    fn dim_size(&self, d: usize) -> usize {
        self.shape.to_vec()[d] as usize
    }

    fn split_unchecked(&self, d: usize, sizes: &[usize]) -> Result<Vec<ZRange>> {
        if sizes.len() == 1 {
            return Ok(vec![self.clone()]);
        }
        let mut start = self.start.to_vec();
        let mut end = self.end.to_vec();
        end[d] = start[d];
        sizes
            .iter()
            .map(|&size| {
                // Sizes sum to a dimension extent, which fits in an i32.
                end[d] += size as i32;
                let piece = Self::new(ZPoint::from(start.clone()), ZPoint::from(end.clone()));
                start[d] += size as i32;
                piece
            })
            .collect()
    }

    /// The range over the concatenated space: this range's dimensions
    /// followed by `other`'s.
    pub fn cartesian_product(&self, other: &ZRange) -> ZRange {
        Self {
            start: self.start.concat(&other.start),
            end: self.end.concat(&other.end),
            shape: self.shape.concat(&other.shape),
        }
    }

    /// Every point of the range, in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = ZPoint> + '_ {
        let shape: Vec<usize> = self.shape.to_vec().into_iter().map(|s| s as usize).collect();
        let start = self.start.to_vec();
        CoordIter::new(&shape).map(move |offset| {
            let coords: Vec<i32> = start
                .iter()
                .zip(offset)
                .map(|(&s, o)| s + o as i32)
                .collect();
            ZPoint::from(coords)
        })
    }

    /// The bounds without the `zr` prefix, e.g. `[2:4, 3:5]`.
    pub fn to_range_string(&self) -> String {
        format!(
            "[{}]",
            self.start
                .to_vec()
                .into_iter()
                .zip(self.end.to_vec())
                .map(|(s, e)| format!("{s}:{e}"))
                .join(", ")
        )
    }

    /// The shape between double bars, e.g. `‖2, 2‖`.
    pub fn to_shape_string(&self) -> String {
        format!("‖{}‖", self.shape.to_vec().iter().join(", "))
    }
}

impl HasDimension for ZRange {
    fn ndim(&self) -> usize {
        ZRange::ndim(self)
    }
}

impl HasPermute for ZRange {
    fn permute(&self, perm: &[isize]) -> Result<Self> {
        Self::new(self.start.permute(perm)?, self.end.permute(perm)?)
    }
}

impl fmt::Display for ZRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zr{}", self.to_range_string())
    }
}

impl fmt::Debug for ZRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::str::FromStr for ZRange {
    type Err = ZSpaceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn coordinate(input: &str) -> IResult<&str, i32> {
    delimited(
        multispace0,
        map_res(recognize(pair(opt(char('-')), digit1)), str::parse),
        multispace0,
    )(input)
}

fn bound(input: &str) -> IResult<&str, (i32, i32)> {
    separated_pair(coordinate, char(':'), coordinate)(input)
}

fn pretty_range(input: &str) -> IResult<&str, Vec<(i32, i32)>> {
    delimited(
        tag("zr["),
        delimited(multispace0, separated_list0(char(','), bound), multispace0),
        char(']'),
    )(input)
}
