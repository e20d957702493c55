/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use super::BinaryOp;
use super::TensorRead;
use super::ZTensor;
use crate::config;
use crate::error::Result;
use crate::indexing;
use crate::indexing::CoordIter;

/// `op` as a fold step, honoring the configured overflow policy.
pub(crate) fn checked(op: BinaryOp) -> impl FnMut(i32, i32) -> Result<i32> {
    let checked = config::global::get().checked_arithmetic;
    move |a, b| op.apply(a, b, checked)
}

pub(crate) fn fold_all<T, F>(tensor: &T, mut op: F, initial: i32) -> Result<i32>
where
    T: TensorRead + ?Sized,
    F: FnMut(i32, i32) -> Result<i32>,
{
    tensor.with_data(|data| {
        tensor
            .layout()
            .locations()
            .try_fold(initial, |acc, l| op(acc, data[l]))
    })
}

pub(crate) fn fold_dims<T, F>(tensor: &T, mut op: F, initial: i32, dims: &[isize]) -> Result<ZTensor>
where
    T: TensorRead + ?Sized,
    F: FnMut(i32, i32) -> Result<i32>,
{
    let reduced = indexing::resolve_dims(dims, tensor.ndim())?;
    let kept: Vec<usize> = (0..tensor.ndim()).filter(|d| !reduced.contains(d)).collect();
    let kept_dims: Vec<isize> = kept.iter().map(|&d| d as isize).collect();
    let acc_shape: Vec<usize> = kept.iter().map(|&d| tensor.shape()[d]).collect();

    let cells = tensor.with_data(|data| {
        CoordIter::new(&acc_shape)
            .map(|coord| {
                let indices: Vec<isize> = coord.iter().map(|&c| c as isize).collect();
                let slice = tensor.layout().select_dims(&kept_dims, &indices)?;
                let folded = slice.locations().try_fold(initial, |acc, l| op(acc, data[l]));
                folded
            })
            .collect::<Result<Vec<_>>>()
    })?;
    Ok(ZTensor::from_compact(&acc_shape, cells))
}
