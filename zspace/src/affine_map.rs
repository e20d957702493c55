/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Affine maps `y = A·x + b` between integer coordinate spaces.

use std::fmt;

use nom::bytes::complete::tag;
use nom::bytes::complete::take_until;
use nom::character::complete::char;
use nom::character::complete::multispace0;
use nom::combinator::all_consuming;
use nom::combinator::rest;
use nom::sequence::preceded;
use nom::sequence::separated_pair;
use nom::sequence::tuple;
use nom::IResult;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::error::ZSpaceError;
use crate::matrix::ZMatrix;
use crate::point::ZPoint;
use crate::tensor::TensorRead;
use crate::traits::HasPermute;
use crate::traits::HasPermuteIO;

/// An affine map from `Z^input_ndim` to `Z^output_ndim`.
///
/// ```
/// use zspace::ZAffineMap;
/// use zspace::ZMatrix;
/// use zspace::zpoint;
///
/// let map = ZAffineMap::new(
///     ZMatrix::new(&[[1, 0], [0, 2], [1, 2]]).unwrap(),
///     zpoint![4, 5, 6],
/// )
/// .unwrap();
/// assert_eq!(map.apply(&zpoint![1, 1]).unwrap(), zpoint![5, 7, 9]);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "AffineMapFields")]
pub struct ZAffineMap {
    projection: ZMatrix,
    offset: ZPoint,
}

#[derive(Deserialize)]
struct AffineMapFields {
    projection: ZMatrix,
    #[serde(default)]
    offset: Option<ZPoint>,
}

impl TryFrom<AffineMapFields> for ZAffineMap {
    type Error = ZSpaceError;

    fn try_from(fields: AffineMapFields) -> Result<Self> {
        match fields.offset {
            Some(offset) => Self::new(fields.projection, offset),
            None => Ok(Self::from_matrix(fields.projection)),
        }
    }
}

impl ZAffineMap {
    /// Fails unless `offset` has one coordinate per output dimension.
    pub fn new(projection: ZMatrix, offset: ZPoint) -> Result<Self> {
        if offset.ndim() != projection.output_ndim() {
            return Err(ZSpaceError::DimensionMismatch(format!(
                "projection.shape[0] != offset.shape[0]: {} != {}",
                projection.output_ndim(),
                offset.ndim()
            )));
        }
        Ok(Self { projection, offset })
    }

    /// The linear map `A·x`, with a zero offset.
    pub fn from_matrix(projection: ZMatrix) -> Self {
        let offset = ZPoint::new_zeros(projection.output_ndim());
        Self { projection, offset }
    }

    pub fn from_rows<R: AsRef<[i32]>>(rows: &[R]) -> Result<Self> {
        Ok(Self::from_matrix(ZMatrix::new(rows)?))
    }

    pub fn identity(n: usize) -> Result<Self> {
        Ok(Self::from_matrix(ZMatrix::identity(n)?))
    }

    /// The map scaling each coordinate by the matching entry of
    /// `values`.
    pub fn from_diagonal(values: &[i32]) -> Result<Self> {
        Ok(Self::from_matrix(ZMatrix::diagonal(values)?))
    }

    /// Parses the JSON object form, or the `λx.A⋅x + b` form written
    /// by `Display`.
    pub fn parse(input: &str) -> Result<Self> {
        tracing::trace!("parse affine map {:?}", input);
        let trimmed = input.trim();
        if !trimmed.starts_with("λx.") {
            return serde_json::from_str(trimmed).map_err(|e| ZSpaceError::malformed(input, e));
        }
        let (_, (projection, offset)) =
            all_consuming(lambda_form)(trimmed).map_err(|e| ZSpaceError::malformed(input, e))?;
        Self::new(ZMatrix::parse(projection)?, ZPoint::parse(offset)?)
    }

    pub fn projection(&self) -> &ZMatrix {
        &self.projection
    }

    pub fn offset(&self) -> &ZPoint {
        &self.offset
    }

    /// `A·x + b`. Fails unless `x` has `input_ndim` coordinates.
    pub fn apply(&self, x: &ZPoint) -> Result<ZPoint> {
        self.projection.matmul_point(x)?.add(&self.offset)
    }

    /// Applies the map to the trailing `input_ndim` coordinates of `x`
    /// and carries the leading ones through unchanged.
    pub fn broadcast_apply(&self, x: &ZPoint) -> Result<ZPoint> {
        let input_ndim = self.input_ndim();
        if x.ndim() < input_ndim {
            return Err(ZSpaceError::rank_mismatch("broadcast apply", x.ndim(), input_ndim));
        }
        let coords = x.to_vec();
        let (batch, tail) = coords.split_at(coords.len() - input_ndim);
        Ok(ZPoint::new(batch).concat(&self.apply(&ZPoint::new(tail))?))
    }

    /// The map `A·x + (b + delta)`.
    pub fn translate(&self, delta: &ZPoint) -> Result<Self> {
        Self::new(self.projection.clone(), self.offset.add(delta)?)
    }
}

/// Splits `λx.A⋅x + b` into the text of `A` and of `b`.
fn lambda_form(input: &str) -> IResult<&str, (&str, &str)> {
    preceded(
        tag("λx."),
        separated_pair(
            take_until("⋅x"),
            tuple((tag("⋅x"), multispace0, char('+'), multispace0)),
            rest,
        ),
    )(input)
}

impl HasPermuteIO for ZAffineMap {
    fn input_ndim(&self) -> usize {
        self.projection.input_ndim()
    }

    fn output_ndim(&self) -> usize {
        self.projection.output_ndim()
    }

    fn permute_input(&self, perm: &[isize]) -> Result<Self> {
        Self::new(self.projection.permute_input(perm)?, self.offset.clone())
    }

    /// Reorders the projection rows and the offset together.
    fn permute_output(&self, perm: &[isize]) -> Result<Self> {
        Self::new(self.projection.permute_output(perm)?, self.offset.permute(perm)?)
    }
}

impl fmt::Display for ZAffineMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "λx.{}⋅x + {}",
            self.projection.as_tensor().to_json_string(),
            self.offset.as_tensor().to_json_string()
        )
    }
}

impl fmt::Debug for ZAffineMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::str::FromStr for ZAffineMap {
    type Err = ZSpaceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
