/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fmt;

use serde::de::Error as _;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::error::Result;
use crate::error::ZSpaceError;
use crate::point::ZPoint;
use crate::tensor::FrozenZTensor;
use crate::tensor::Layout;
use crate::tensor::Operand;
use crate::tensor::TensorRead;
use crate::tensor::ZTensor;
use crate::traits::HasPermuteIO;

/// An immutable integer matrix, viewed as a linear map from
/// `Z^cols` to `Z^rows`.
///
/// Serializes as a nested array of rows.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ZMatrix {
    tensor: FrozenZTensor,
}

impl ZMatrix {
    /// Wraps a rank-2 tensor.
    pub fn from_tensor<T: TensorRead + ?Sized>(tensor: &T) -> Result<Self> {
        if tensor.ndim() != 2 {
            return Err(ZSpaceError::DimensionMismatch(format!(
                "expected a matrix, got shape {:?}",
                tensor.shape()
            )));
        }
        Ok(Self {
            tensor: tensor.to_frozen(),
        })
    }

    pub fn new<R: AsRef<[i32]>>(rows: &[R]) -> Result<Self> {
        Self::from_tensor(&ZTensor::new_matrix(rows)?)
    }

    pub fn new_filled(rows: usize, cols: usize, value: i32) -> Result<Self> {
        Self::from_tensor(&FrozenZTensor::new_filled(&[rows, cols], value)?)
    }

    pub fn new_zeros(rows: usize, cols: usize) -> Result<Self> {
        Self::new_filled(rows, cols, 0)
    }

    pub fn new_ones(rows: usize, cols: usize) -> Result<Self> {
        Self::new_filled(rows, cols, 1)
    }

    pub fn identity(n: usize) -> Result<Self> {
        Self::from_tensor(&ZTensor::new_identity(n)?)
    }

    /// The square matrix with `values` on its diagonal.
    pub fn diagonal(values: &[i32]) -> Result<Self> {
        Self::from_tensor(&ZTensor::new_diagonal(values)?)
    }

    pub fn parse(input: &str) -> Result<Self> {
        Self::from_tensor(&FrozenZTensor::parse(input)?)
    }

    pub fn rows(&self) -> usize {
        self.tensor.shape()[0]
    }

    pub fn cols(&self) -> usize {
        self.tensor.shape()[1]
    }

    pub fn get(&self, row: isize, col: isize) -> Result<i32> {
        self.tensor.get(&[row, col])
    }

    pub fn to_rows(&self) -> Vec<Vec<i32>> {
        let cols = self.cols();
        if cols == 0 {
            return vec![Vec::new(); self.rows()];
        }
        self.tensor.to_vec().chunks(cols).map(<[i32]>::to_vec).collect()
    }

    pub fn as_tensor(&self) -> &FrozenZTensor {
        &self.tensor
    }

    /// The matrix product with a vector or matrix.
    pub fn matmul<T: TensorRead>(&self, rhs: &T) -> Result<ZTensor> {
        self.tensor.matmul(rhs)
    }

    /// The image of `x` under this linear map.
    pub fn matmul_point(&self, x: &ZPoint) -> Result<ZPoint> {
        ZPoint::from_tensor(&self.tensor.matmul(x.as_tensor())?)
    }

    /// The product `self · rhs`.
    pub fn compose(&self, rhs: &ZMatrix) -> Result<ZMatrix> {
        Self::from_tensor(&self.tensor.matmul(&rhs.tensor)?)
    }
}

impl HasPermuteIO for ZMatrix {
    fn input_ndim(&self) -> usize {
        self.cols()
    }

    fn output_ndim(&self) -> usize {
        self.rows()
    }

    /// Reorders the columns.
    fn permute_input(&self, perm: &[isize]) -> Result<Self> {
        Self::from_tensor(&self.tensor.reordered_dim_copy(perm, 1)?)
    }

    /// Reorders the rows.
    fn permute_output(&self, perm: &[isize]) -> Result<Self> {
        Self::from_tensor(&self.tensor.reordered_dim_copy(perm, 0)?)
    }
}

impl Operand for ZMatrix {
    fn with_operand<R, F: FnOnce(&Layout, &[i32]) -> R>(&self, f: F) -> R {
        self.tensor.with_operand(f)
    }
}

impl TryFrom<&FrozenZTensor> for ZMatrix {
    type Error = ZSpaceError;

    fn try_from(tensor: &FrozenZTensor) -> Result<Self> {
        Self::from_tensor(tensor)
    }
}

impl fmt::Display for ZMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.tensor, f)
    }
}

impl fmt::Debug for ZMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZMatrix({})", self.tensor)
    }
}

impl Serialize for ZMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.tensor.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ZMatrix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tensor = FrozenZTensor::deserialize(deserializer)?;
        Self::from_tensor(&tensor).map_err(D::Error::custom)
    }
}

impl std::str::FromStr for ZMatrix {
    type Err = ZSpaceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zpoint;

    #[test]
    fn test_construction() {
        let m = ZMatrix::new(&[[1, 0], [0, 2], [1, 2]]).unwrap();
        assert_eq!(m.rows(), 3);
        assert_eq!(m.cols(), 2);
        assert_eq!(m.output_ndim(), 3);
        assert_eq!(m.input_ndim(), 2);
        assert_eq!(m.get(2, -1).unwrap(), 2);
        assert_eq!(m.to_rows(), vec![vec![1, 0], vec![0, 2], vec![1, 2]]);

        assert_eq!(
            ZMatrix::identity(2).unwrap(),
            ZMatrix::new(&[[1, 0], [0, 1]]).unwrap()
        );
        assert_eq!(
            ZMatrix::diagonal(&[2, 3]).unwrap(),
            ZMatrix::new(&[[2, 0], [0, 3]]).unwrap()
        );
        assert_eq!(ZMatrix::new_zeros(2, 0).unwrap().to_rows(), vec![Vec::<i32>::new(), Vec::new()]);

        assert!(matches!(
            ZMatrix::from_tensor(&FrozenZTensor::new_vector(&[1, 2])),
            Err(ZSpaceError::DimensionMismatch(_))
        ));
        assert!(ZMatrix::new(&[vec![1, 2], vec![3]]).is_err());
    }

    #[test]
    fn test_matmul() {
        let m = ZMatrix::new(&[[1, 0], [0, 2], [1, 2]]).unwrap();
        assert_eq!(m.matmul_point(&zpoint![1, 1]).unwrap(), zpoint![1, 2, 3]);
        assert!(m.matmul_point(&zpoint![1, 1, 1]).is_err());

        let product = m.matmul(&ZTensor::new_matrix(&[[1, 1], [0, 1]]).unwrap()).unwrap();
        assert_eq!(product, ZTensor::new_matrix(&[[1, 1], [0, 2], [1, 3]]).unwrap());

        let square = ZMatrix::new(&[[0, 1], [1, 0]]).unwrap();
        assert_eq!(square.compose(&square).unwrap(), ZMatrix::identity(2).unwrap());
    }

    #[test]
    fn test_permute() {
        let m = ZMatrix::new(&[[1, 0], [0, 2], [1, 2]]).unwrap();
        assert_eq!(
            m.permute_input(&[1, 0]).unwrap(),
            ZMatrix::new(&[[0, 1], [2, 0], [2, 1]]).unwrap()
        );
        assert_eq!(
            m.permute_output(&[2, 0, 1]).unwrap(),
            ZMatrix::new(&[[1, 2], [1, 0], [0, 2]]).unwrap()
        );
        assert!(m.permute_input(&[0, 0]).is_err());
        assert!(m.permute_output(&[0, 1]).is_err());
    }

    #[test]
    fn test_text_forms() {
        let m = ZMatrix::new(&[[1, 0], [0, 2]]).unwrap();
        assert_eq!(m.to_string(), "[[1, 0], [0, 2]]");
        assert_eq!(format!("{m:?}"), "ZMatrix([[1, 0], [0, 2]])");
        assert_eq!(serde_json::to_string(&m).unwrap(), "[[1,0],[0,2]]");
        assert_eq!(ZMatrix::parse("[[1, 0], [0, 2]]").unwrap(), m);
        assert_eq!(serde_json::from_str::<ZMatrix>("[[1,0],[0,2]]").unwrap(), m);
        assert!(serde_json::from_str::<ZMatrix>("[1, 0]").is_err());
    }
}
