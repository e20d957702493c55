/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Integer coordinates.

use std::cmp::Ordering;
use std::fmt;

use serde::de::Error as _;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::dominance;
use crate::error::Result;
use crate::error::ZSpaceError;
use crate::indexing;
use crate::tensor::FrozenZTensor;
use crate::tensor::Layout;
use crate::tensor::Operand;
use crate::tensor::TensorRead;
use crate::traits::HasDimension;
use crate::traits::HasPermute;

/// Construct a [`ZPoint`] from coordinate literals.
///
/// ```
/// use zspace::zpoint;
///
/// let p = zpoint![1, 2, 3];
/// assert_eq!(p.ndim(), 3);
/// assert_eq!(p.to_string(), "[1, 2, 3]");
/// ```
#[macro_export]
macro_rules! zpoint {
    ($($coord:expr),* $(,)?) => {
        $crate::point::ZPoint::new(&[$($coord),*])
    };
}

/// A point in an integer coordinate space: an immutable rank-1
/// tensor whose length is the dimensionality of the space.
///
/// Points are partially ordered by dominance, so `<` and `<=` hold
/// only when they hold for every coordinate, and `partial_cmp` is
/// `None` for incomparable points or points of different rank.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ZPoint {
    coords: FrozenZTensor,
}

impl ZPoint {
    pub fn new(coords: &[i32]) -> Self {
        Self {
            coords: FrozenZTensor::new_vector(coords),
        }
    }

    /// Wrap a rank-1 tensor.
    pub fn from_tensor<T: TensorRead + ?Sized>(tensor: &T) -> Result<Self> {
        if tensor.ndim() != 1 {
            return Err(ZSpaceError::DimensionMismatch(format!(
                "a point requires a rank-1 tensor, got shape {:?}",
                tensor.shape()
            )));
        }
        Ok(Self::new(&tensor.to_vec()))
    }

    /// The point whose coordinates are the sizes of `shape`.
    pub fn from_shape(shape: &[usize]) -> Result<Self> {
        let coords = shape
            .iter()
            .map(|&s| {
                i32::try_from(s).map_err(|_| {
                    ZSpaceError::InvalidArgument(format!("dimension size {s} exceeds the i32 range"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(&coords))
    }

    pub fn new_zeros(ndim: usize) -> Self {
        Self::new(&vec![0; ndim])
    }

    pub fn new_ones(ndim: usize) -> Self {
        Self::new(&vec![1; ndim])
    }

    pub fn new_zeros_like<T: HasDimension + ?Sized>(like: &T) -> Self {
        Self::new_zeros(like.ndim())
    }

    pub fn new_ones_like<T: HasDimension + ?Sized>(like: &T) -> Self {
        Self::new_ones(like.ndim())
    }

    /// Parses the flat JSON array form, e.g. `"[1, 2, 3]"`.
    pub fn parse(input: &str) -> Result<Self> {
        Self::from_tensor(&FrozenZTensor::parse(input)?)
    }

    /// The number of coordinates.
    pub fn ndim(&self) -> usize {
        self.coords.shape()[0]
    }

    /// The coordinate along `dim`; negative dimensions wrap.
    pub fn get(&self, dim: isize) -> Result<i32> {
        self.coords.get(&[dim])
    }

    pub fn to_vec(&self) -> Vec<i32> {
        self.coords.to_vec()
    }

    /// The coordinates as a rank-1 tensor.
    pub fn as_tensor(&self) -> &FrozenZTensor {
        &self.coords
    }

    pub fn resolve_dim(&self, dim: isize) -> Result<usize> {
        indexing::resolve_dim(dim, self.ndim())
    }

    /// Insert `new_dims` zero coordinates before position `index`,
    /// which may be anywhere in `[-(ndim + 1), ndim]`.
    pub fn add_dims(&self, index: isize, new_dims: usize) -> Result<Self> {
        let index = indexing::resolve_dim(index, self.ndim() + 1)?;
        if new_dims == 0 {
            return Ok(self.clone());
        }
        let mut coords = self.to_vec();
        coords.splice(index..index, std::iter::repeat(0).take(new_dims));
        Ok(Self::new(&coords))
    }

    /// Cellwise combination of two points of the same rank.
    fn zip(&self, other: &ZPoint, what: &str, f: impl Fn(i32, i32) -> Result<i32>) -> Result<Self> {
        if self.ndim() != other.ndim() {
            return Err(ZSpaceError::rank_mismatch(what, self.ndim(), other.ndim()));
        }
        let coords = self
            .to_vec()
            .into_iter()
            .zip(other.to_vec())
            .map(|(a, b)| f(a, b))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(&coords))
    }

    pub fn add(&self, other: &ZPoint) -> Result<Self> {
        self.zip(other, "add", |a, b| {
            a.checked_add(b)
                .ok_or_else(|| ZSpaceError::Arithmetic(format!("Add({a}, {b}) overflows")))
        })
    }

    pub fn sub(&self, other: &ZPoint) -> Result<Self> {
        self.zip(other, "sub", |a, b| {
            a.checked_sub(b)
                .ok_or_else(|| ZSpaceError::Arithmetic(format!("Sub({a}, {b}) overflows")))
        })
    }

    pub fn minimum(&self, other: &ZPoint) -> Result<Self> {
        self.zip(other, "minimum", |a, b| Ok(a.min(b)))
    }

    pub fn maximum(&self, other: &ZPoint) -> Result<Self> {
        self.zip(other, "maximum", |a, b| Ok(a.max(b)))
    }

    /// Concatenate the coordinates of `self` and `other`.
    pub fn concat(&self, other: &ZPoint) -> Self {
        let mut coords = self.to_vec();
        coords.extend(other.to_vec());
        Self::new(&coords)
    }
}

impl HasDimension for ZPoint {
    fn ndim(&self) -> usize {
        ZPoint::ndim(self)
    }
}

impl HasPermute for ZPoint {
    fn permute(&self, perm: &[isize]) -> Result<Self> {
        let perm = indexing::resolve_permutation(perm, self.ndim())?;
        Ok(Self::new(&indexing::apply_permutation(&self.to_vec(), &perm)))
    }
}

impl Operand for ZPoint {
    fn with_operand<R, F: FnOnce(&Layout, &[i32]) -> R>(&self, f: F) -> R {
        self.coords.with_operand(f)
    }
}

impl PartialOrd for ZPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        dominance::partial_order_by_grid(self, other)
            .ok()
            .and_then(|order| order.to_ordering())
    }
}

impl From<&[i32]> for ZPoint {
    fn from(coords: &[i32]) -> Self {
        Self::new(coords)
    }
}

impl From<Vec<i32>> for ZPoint {
    fn from(coords: Vec<i32>) -> Self {
        Self::new(&coords)
    }
}

impl<const N: usize> From<[i32; N]> for ZPoint {
    fn from(coords: [i32; N]) -> Self {
        Self::new(&coords)
    }
}

impl TryFrom<&FrozenZTensor> for ZPoint {
    type Error = ZSpaceError;

    fn try_from(tensor: &FrozenZTensor) -> Result<Self> {
        Self::from_tensor(tensor)
    }
}

impl fmt::Display for ZPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.coords, f)
    }
}

impl fmt::Debug for ZPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZPoint({})", self.coords)
    }
}

impl Serialize for ZPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.coords.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ZPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tensor = FrozenZTensor::deserialize(deserializer)?;
        Self::from_tensor(&tensor).map_err(D::Error::custom)
    }
}

impl std::str::FromStr for ZPoint {
    type Err = ZSpaceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
