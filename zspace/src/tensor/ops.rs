/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Cellwise arithmetic, matrix products and copies.

use itertools::Itertools;

use super::checked_cells;
use super::Layout;
use super::Operand;
use super::TensorRead;
use super::ZTensor;
use crate::config;
use crate::error::Result;
use crate::error::ZSpaceError;
use crate::indexing;
use crate::indexing::CoordIter;

/// Cellwise unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Abs,
}

impl UnaryOp {
    pub fn apply(self, value: i32, checked: bool) -> Result<i32> {
        let result = match (self, checked) {
            (UnaryOp::Neg, true) => value.checked_neg(),
            (UnaryOp::Neg, false) => Some(value.wrapping_neg()),
            (UnaryOp::Abs, true) => value.checked_abs(),
            (UnaryOp::Abs, false) => Some(value.wrapping_abs()),
        };
        result.ok_or_else(|| ZSpaceError::Arithmetic(format!("{self:?}({value}) overflows")))
    }
}

/// Cellwise binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Log,
    Minimum,
    Maximum,
}

impl BinaryOp {
    /// Apply the operation; with `checked` set, overflow is an error
    /// rather than wrapping. Division by zero, a negative exponent and
    /// an out-of-domain logarithm are always errors.
    pub fn apply(self, lhs: i32, rhs: i32, checked: bool) -> Result<i32> {
        let overflow =
            || ZSpaceError::Arithmetic(format!("{self:?}({lhs}, {rhs}) overflows"));
        match self {
            BinaryOp::Add if checked => lhs.checked_add(rhs).ok_or_else(overflow),
            BinaryOp::Add => Ok(lhs.wrapping_add(rhs)),
            BinaryOp::Sub if checked => lhs.checked_sub(rhs).ok_or_else(overflow),
            BinaryOp::Sub => Ok(lhs.wrapping_sub(rhs)),
            BinaryOp::Mul if checked => lhs.checked_mul(rhs).ok_or_else(overflow),
            BinaryOp::Mul => Ok(lhs.wrapping_mul(rhs)),
            BinaryOp::Div | BinaryOp::Rem if rhs == 0 => Err(ZSpaceError::Arithmetic(format!(
                "{self:?}({lhs}, {rhs}): division by zero"
            ))),
            BinaryOp::Div if checked => lhs.checked_div(rhs).ok_or_else(overflow),
            BinaryOp::Div => Ok(lhs.wrapping_div(rhs)),
            BinaryOp::Rem => Ok(lhs.wrapping_rem(rhs)),
            BinaryOp::Pow => {
                let exp = u32::try_from(rhs).map_err(|_| {
                    ZSpaceError::Arithmetic(format!("exponent must be non-negative: {rhs}"))
                })?;
                if checked {
                    lhs.checked_pow(exp).ok_or_else(overflow)
                } else {
                    Ok(lhs.wrapping_pow(exp))
                }
            }
            BinaryOp::Log => {
                if rhs <= 1 {
                    return Err(ZSpaceError::Arithmetic(format!(
                        "log base must be greater than 1: {rhs}"
                    )));
                }
                if lhs <= 0 {
                    return Err(ZSpaceError::Arithmetic(format!(
                        "log value must be positive: {lhs}"
                    )));
                }
                Ok(lhs.ilog(rhs) as i32)
            }
            BinaryOp::Minimum => Ok(lhs.min(rhs)),
            BinaryOp::Maximum => Ok(lhs.max(rhs)),
        }
    }
}

fn checked_arithmetic() -> bool {
    config::global::get().checked_arithmetic
}

pub(crate) fn map_cells<T, F>(tensor: &T, mut f: F) -> Result<ZTensor>
where
    T: TensorRead + ?Sized,
    F: FnMut(i32) -> Result<i32>,
{
    let cells = tensor.with_data(|data| {
        tensor
            .layout()
            .locations()
            .map(|l| f(data[l]))
            .collect::<Result<Vec<_>>>()
    })?;
    Ok(ZTensor::from_compact(tensor.shape(), cells))
}

pub(crate) fn unary<T: TensorRead + ?Sized>(tensor: &T, op: UnaryOp) -> Result<ZTensor> {
    let checked = checked_arithmetic();
    map_cells(tensor, |v| op.apply(v, checked))
}

/// Broadcast two (layout, buffer) pairs against each other and combine
/// them cell by cell. Returns the broadcast shape and the cells.
pub(crate) fn zip_layouts<F>(
    (lhs_layout, lhs): (&Layout, &[i32]),
    (rhs_layout, rhs): (&Layout, &[i32]),
    mut f: F,
) -> Result<(Vec<usize>, Vec<i32>)>
where
    F: FnMut(i32, i32) -> Result<i32>,
{
    let shape = indexing::common_broadcast_shape(lhs_layout.shape(), rhs_layout.shape())?;
    checked_cells(&shape)?;
    let lhs_layout = lhs_layout.broadcast_to(&shape)?;
    let rhs_layout = rhs_layout.broadcast_to(&shape)?;
    let cells = lhs_layout
        .locations()
        .zip(rhs_layout.locations())
        .map(|(l, r)| f(lhs[l], rhs[r]))
        .collect::<Result<Vec<_>>>()?;
    Ok((shape, cells))
}

pub(crate) fn zip_cells<T, O, F>(lhs: &T, rhs: &O, f: F) -> Result<ZTensor>
where
    T: TensorRead + ?Sized,
    O: Operand + ?Sized,
    F: FnMut(i32, i32) -> Result<i32>,
{
    let (shape, cells) = lhs.with_data(|lhs_data| {
        rhs.with_operand(|rhs_layout, rhs_data| {
            zip_layouts((lhs.layout(), lhs_data), (rhs_layout, rhs_data), f)
        })
    })?;
    Ok(ZTensor::from_compact(&shape, cells))
}

pub(crate) fn binary<T, O>(lhs: &T, rhs: &O, op: BinaryOp) -> Result<ZTensor>
where
    T: TensorRead + ?Sized,
    O: Operand + ?Sized,
{
    let checked = checked_arithmetic();
    zip_cells(lhs, rhs, |a, b| op.apply(a, b, checked))
}

/// Values for an in-place update of `target`: `f(target, rhs)` per
/// cell, in row-major order of `target`. The broadcast of the two
/// shapes must be `target`'s own shape.
pub(crate) fn in_place_values<T, O, F>(target: &T, rhs: &O, mut f: F) -> Result<Vec<i32>>
where
    T: TensorRead + ?Sized,
    O: Operand + ?Sized,
    F: FnMut(i32, i32) -> Result<i32>,
{
    target.with_data(|lhs| {
        rhs.with_operand(|rhs_layout, rhs_data| {
            let shape = indexing::common_broadcast_shape(target.shape(), rhs_layout.shape())?;
            if shape != target.shape() {
                return Err(ZSpaceError::BroadcastIncompatible(vec![
                    target.shape().to_vec(),
                    rhs_layout.shape().to_vec(),
                ]));
            }
            let rhs_layout = rhs_layout.broadcast_to(&shape)?;
            target
                .layout()
                .locations()
                .zip(rhs_layout.locations())
                .map(|(l, r)| f(lhs[l], rhs_data[r]))
                .collect()
        })
    })
}

pub(crate) fn in_place_binary_values<T, O>(target: &T, rhs: &O, op: BinaryOp) -> Result<Vec<i32>>
where
    T: TensorRead + ?Sized,
    O: Operand + ?Sized,
{
    let checked = checked_arithmetic();
    in_place_values(target, rhs, |a, b| op.apply(a, b, checked))
}

pub(crate) fn matmul<L, R>(lhs: &L, rhs: &R) -> Result<ZTensor>
where
    L: TensorRead + ?Sized,
    R: TensorRead + ?Sized,
{
    let incompatible = || {
        ZSpaceError::DimensionMismatch(format!(
            "lhs shape [{}] not compatible with rhs shape [{}]",
            lhs.shape().iter().join(", "),
            rhs.shape().iter().join(", "),
        ))
    };
    if lhs.ndim() != 2 {
        return Err(incompatible());
    }
    let (n, k) = (lhs.shape()[0], lhs.shape()[1]);
    let (rhs_layout, is_vector) = match rhs.ndim() {
        1 => (rhs.layout().unsqueeze(1)?, true),
        2 => (rhs.layout().clone(), false),
        _ => return Err(incompatible()),
    };
    if rhs_layout.shape()[0] != k {
        return Err(incompatible());
    }
    let m = rhs_layout.shape()[1];
    checked_cells(&[n, m])?;

    let checked = checked_arithmetic();
    let cells = lhs.with_data(|a| {
        rhs.with_data(|b| {
            let mut cells = Vec::with_capacity(n * m);
            for i in 0..n {
                for j in 0..m {
                    let mut acc = 0i32;
                    for p in 0..k {
                        let product = BinaryOp::Mul.apply(
                            a[lhs.layout().location(&[i, p])],
                            b[rhs_layout.location(&[p, j])],
                            checked,
                        )?;
                        acc = BinaryOp::Add.apply(acc, product, checked)?;
                    }
                    cells.push(acc);
                }
            }
            Ok::<_, ZSpaceError>(cells)
        })
    })?;

    if is_vector {
        Ok(ZTensor::from_compact(&[n], cells))
    } else {
        Ok(ZTensor::from_compact(&[n, m], cells))
    }
}

pub(crate) fn reordered_dim_copy<T>(tensor: &T, perm: &[isize], dim: isize) -> Result<ZTensor>
where
    T: TensorRead + ?Sized,
{
    let d = tensor.resolve_dim(dim)?;
    let perm = indexing::resolve_permutation(perm, tensor.shape()[d])?;
    let cells = tensor.with_data(|data| {
        CoordIter::new(tensor.shape())
            .map(|mut coord| {
                coord[d] = perm[coord[d]];
                data[tensor.layout().location(&coord)]
            })
            .collect()
    });
    Ok(ZTensor::from_compact(tensor.shape(), cells))
}

/// Concatenate tensors along `axis`. All inputs must share rank and
/// agree on every other dimension.
pub fn concat<'a, T>(axis: isize, tensors: impl IntoIterator<Item = &'a T>) -> Result<ZTensor>
where
    T: TensorRead + 'a,
{
    let tensors: Vec<&T> = tensors.into_iter().collect();
    let Some(first) = tensors.first() else {
        return Err(ZSpaceError::InvalidArgument(
            "concat requires at least one tensor".to_string(),
        ));
    };
    let d = first.resolve_dim(axis)?;

    let mut shape = first.shape().to_vec();
    shape[d] = 0;
    for t in &tensors {
        let compatible = t.ndim() == first.ndim()
            && t
                .shape()
                .iter()
                .zip(first.shape())
                .enumerate()
                .all(|(i, (a, b))| i == d || a == b);
        if !compatible {
            return Err(ZSpaceError::DimensionMismatch(format!(
                "cannot concat shape {:?} with {:?} along axis {d}",
                t.shape(),
                first.shape()
            )));
        }
        shape[d] += t.shape()[d];
    }
    checked_cells(&shape)?;

    let out = Layout::row_major(&shape);
    let mut cells = vec![0; out.num_cells()];
    let mut base = 0usize;
    for t in &tensors {
        t.with_data(|data| {
            for coord in CoordIter::new(t.shape()) {
                let value = data[t.layout().location(&coord)];
                let mut target = coord;
                target[d] += base;
                cells[out.location(&target)] = value;
            }
        });
        base += t.shape()[d];
    }
    Ok(ZTensor::from_compact(&shape, cells))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorView;

    #[test]
    fn test_binary_ops() {
        assert_eq!(BinaryOp::Add.apply(2, 3, true).unwrap(), 5);
        assert_eq!(BinaryOp::Sub.apply(2, 3, true).unwrap(), -1);
        assert_eq!(BinaryOp::Mul.apply(-2, 3, true).unwrap(), -6);
        assert_eq!(BinaryOp::Div.apply(-7, 2, true).unwrap(), -3);
        assert_eq!(BinaryOp::Rem.apply(-7, 2, true).unwrap(), -1);
        assert_eq!(BinaryOp::Pow.apply(3, 4, true).unwrap(), 81);
        assert_eq!(BinaryOp::Pow.apply(5, 0, true).unwrap(), 1);
        assert_eq!(BinaryOp::Log.apply(8, 2, true).unwrap(), 3);
        assert_eq!(BinaryOp::Log.apply(9, 2, true).unwrap(), 3);
        assert_eq!(BinaryOp::Log.apply(1, 10, true).unwrap(), 0);
        assert_eq!(BinaryOp::Minimum.apply(4, -4, true).unwrap(), -4);
        assert_eq!(BinaryOp::Maximum.apply(4, -4, true).unwrap(), 4);
    }

    #[test]
    fn test_binary_op_errors() {
        assert!(matches!(
            BinaryOp::Div.apply(1, 0, true),
            Err(ZSpaceError::Arithmetic(_))
        ));
        assert!(matches!(
            BinaryOp::Rem.apply(1, 0, false),
            Err(ZSpaceError::Arithmetic(_))
        ));
        assert!(BinaryOp::Pow.apply(2, -1, true).is_err());
        assert!(BinaryOp::Log.apply(8, 1, true).is_err());
        assert!(BinaryOp::Log.apply(0, 2, true).is_err());
        assert!(BinaryOp::Add.apply(i32::MAX, 1, true).is_err());
        assert!(BinaryOp::Div.apply(i32::MIN, -1, true).is_err());
        assert!(UnaryOp::Neg.apply(i32::MIN, true).is_err());
    }

    #[test]
    fn test_wrapping_ops() {
        assert_eq!(BinaryOp::Add.apply(i32::MAX, 1, false).unwrap(), i32::MIN);
        assert_eq!(BinaryOp::Mul.apply(i32::MAX, 2, false).unwrap(), -2);
        assert_eq!(BinaryOp::Pow.apply(2, 32, false).unwrap(), 0);
        assert_eq!(UnaryOp::Abs.apply(i32::MIN, false).unwrap(), i32::MIN);
    }

    #[test]
    fn test_zip_broadcasts() {
        let col = ZTensor::new_matrix(&[[1], [2]]).unwrap();
        let row = ZTensor::new_vector(&[10, 20, 30]);
        let sum = col.add(&row).unwrap();
        assert_eq!(
            sum,
            ZTensor::new_matrix(&[[11, 21, 31], [12, 22, 32]]).unwrap()
        );

        let err = row.add(&ZTensor::new_vector(&[1, 2])).unwrap_err();
        assert_eq!(err.to_string(), "cannot broadcast shapes: [3], [2]");
    }

    #[test]
    fn test_unary() {
        let t = ZTensor::new_vector(&[-1, 0, 2]);
        assert_eq!(t.neg().unwrap(), ZTensor::new_vector(&[1, 0, -2]));
        assert_eq!(t.abs().unwrap(), ZTensor::new_vector(&[1, 0, 2]));
    }

    #[test]
    fn test_matmul() {
        let a = ZTensor::new_matrix(&[[1, 0], [0, 2], [1, 2]]).unwrap();
        let x = ZTensor::new_vector(&[1, 1]);
        assert_eq!(a.matmul(&x).unwrap(), ZTensor::new_vector(&[1, 2, 3]));

        let b = ZTensor::new_matrix(&[[1, 2], [3, 4]]).unwrap();
        assert_eq!(
            a.matmul(&b).unwrap(),
            ZTensor::new_matrix(&[[1, 2], [6, 8], [7, 10]]).unwrap()
        );
        assert_eq!(
            b.matmul(&b.t()).unwrap(),
            ZTensor::new_matrix(&[[5, 11], [11, 25]]).unwrap()
        );

        assert_eq!(
            a.matmul(&ZTensor::new_vector(&[1, 2, 3])).unwrap_err().to_string(),
            "dimension mismatch: lhs shape [3, 2] not compatible with rhs shape [3]"
        );
        assert!(x.matmul(&a).is_err());
    }

    #[test]
    fn test_reordered_dim_copy() {
        let t = ZTensor::new_matrix(&[[0, 1, 2], [3, 4, 5]]).unwrap();
        assert_eq!(
            t.reordered_dim_copy(&[1, 0, 2], 1).unwrap(),
            ZTensor::new_matrix(&[[1, 0, 2], [4, 3, 5]]).unwrap()
        );
        assert_eq!(
            t.reordered_dim_copy(&[1, 0], 0).unwrap(),
            ZTensor::new_matrix(&[[3, 4, 5], [0, 1, 2]]).unwrap()
        );
        assert!(t.reordered_dim_copy(&[0, 0, 1], 1).is_err());
    }

    #[test]
    fn test_concat() {
        let a = ZTensor::new_matrix(&[[1, 2], [3, 4]]).unwrap();
        let b = ZTensor::new_matrix(&[[5, 6]]).unwrap();
        assert_eq!(
            concat(0, [&a, &b]).unwrap(),
            ZTensor::new_matrix(&[[1, 2], [3, 4], [5, 6]]).unwrap()
        );
        assert_eq!(
            concat(-1, [&a, &a.t()]).unwrap(),
            ZTensor::new_matrix(&[[1, 2, 1, 3], [3, 4, 2, 4]]).unwrap()
        );
        assert!(concat(1, [&a, &b]).is_err());
        assert!(concat::<ZTensor>(0, []).is_err());
    }
}
