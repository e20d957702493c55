/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::cell::RefCell;
use std::rc::Rc;

use super::checked_cells;
use super::codec;
use super::ops;
use super::sealed;
use super::BinaryOp;
use super::FrozenZTensor;
use super::Layout;
use super::LinearIndex;
use super::Operand;
use super::TensorRead;
use super::TensorView;
use super::UnaryOp;
use crate::config;
use crate::error::Result;
use crate::error::ZSpaceError;
use crate::indexing::CoordIter;

/// A mutable strided tensor of `i32` cells.
///
/// Views created through [`TensorView`] share the buffer of the tensor
/// they were derived from: a write through any of them is observed by
/// every view covering the written cell. Writes take `&self`; the
/// buffer is the shared state, not the handle.
///
/// `Clone` is a deep copy into a fresh compact buffer. Use
/// [`ZTensor::alias`] for another handle on the same buffer.
///
/// A write through a broadcast dimension lands on the single backing
/// cell; when several logical cells are written at once, the last one
/// in row-major order wins.
pub struct ZTensor {
    data: Rc<RefCell<Vec<i32>>>,
    layout: Layout,
}

impl ZTensor {
    /// Wraps `cells` as a row-major tensor. `cells.len()` must equal
    /// the cell count of `shape`.
    pub(crate) fn from_compact(shape: &[usize], cells: Vec<i32>) -> Self {
        let layout = Layout::row_major(shape);
        debug_assert_eq!(cells.len(), layout.num_cells());
        Self {
            data: Rc::new(RefCell::new(cells)),
            layout,
        }
    }

    /// A tensor of `shape` holding `cells` in row-major order.
    pub fn new(shape: &[usize], cells: Vec<i32>) -> Result<Self> {
        let expected = checked_cells(shape)?;
        if cells.len() != expected {
            return Err(ZSpaceError::DimensionMismatch(format!(
                "shape {shape:?} requires {expected} cells, got {}",
                cells.len()
            )));
        }
        Ok(Self::from_compact(shape, cells))
    }

    pub fn new_scalar(value: i32) -> Self {
        Self::from_compact(&[], vec![value])
    }

    pub fn new_vector(values: &[i32]) -> Self {
        Self::from_compact(&[values.len()], values.to_vec())
    }

    /// A rank-2 tensor from its rows; every row must have the same
    /// length. No rows gives shape `[0, 0]`.
    pub fn new_matrix<R: AsRef<[i32]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        if let Some(row) = rows.iter().find(|r| r.as_ref().len() != cols) {
            return Err(ZSpaceError::DimensionMismatch(format!(
                "ragged matrix: row of length {} in a matrix of {cols} columns",
                row.as_ref().len()
            )));
        }
        let shape = [rows.len(), cols];
        checked_cells(&shape)?;
        let cells = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        Ok(Self::from_compact(&shape, cells))
    }

    pub fn new_filled(shape: &[usize], value: i32) -> Result<Self> {
        let cells = checked_cells(shape)?;
        Ok(Self::from_compact(shape, vec![value; cells]))
    }

    pub fn new_zeros(shape: &[usize]) -> Result<Self> {
        Self::new_filled(shape, 0)
    }

    pub fn new_ones(shape: &[usize]) -> Result<Self> {
        Self::new_filled(shape, 1)
    }

    pub fn new_zeros_like<T: TensorRead + ?Sized>(like: &T) -> Self {
        Self::from_compact(like.shape(), vec![0; like.num_cells()])
    }

    pub fn new_ones_like<T: TensorRead + ?Sized>(like: &T) -> Self {
        Self::from_compact(like.shape(), vec![1; like.num_cells()])
    }

    pub fn new_filled_like<T: TensorRead + ?Sized>(like: &T, value: i32) -> Self {
        Self::from_compact(like.shape(), vec![value; like.num_cells()])
    }

    /// A square matrix with `values` on the diagonal.
    pub fn new_diagonal(values: &[i32]) -> Result<Self> {
        let n = values.len();
        let t = Self::new_zeros(&[n, n])?;
        {
            let mut data = t.data.borrow_mut();
            for (i, &v) in values.iter().enumerate() {
                data[i * n + i] = v;
            }
        }
        Ok(t)
    }

    pub fn new_identity(n: usize) -> Result<Self> {
        Self::new_diagonal(&vec![1; n])
    }

    /// The vector `[0, 1, ..., n - 1]`.
    pub fn new_iota(n: usize) -> Result<Self> {
        let end = i32::try_from(n).map_err(|_| {
            ZSpaceError::InvalidArgument(format!("iota({n}) exceeds the i32 range"))
        })?;
        checked_cells(&[n])?;
        Ok(Self::from_compact(&[n], (0..end).collect()))
    }

    /// A tensor of `shape` whose cell at each coordinate is `f(coord)`.
    pub fn new_from_fn<F: FnMut(&[usize]) -> i32>(shape: &[usize], mut f: F) -> Result<Self> {
        checked_cells(shape)?;
        let cells = CoordIter::new(shape).map(|coord| f(&coord)).collect();
        Ok(Self::from_compact(shape, cells))
    }

    /// Parses the nested-array text form; see [`std::fmt::Display`].
    pub fn parse(input: &str) -> Result<Self> {
        let (shape, cells) = codec::parse_cells(input)?;
        Self::new(&shape, cells)
    }

    /// Builds a tensor from a nested JSON array value.
    pub fn from_nested(value: &serde_json::Value) -> Result<Self> {
        let (shape, cells) = codec::nested_value_cells(value)?;
        Self::new(&shape, cells)
    }

    /// Another handle on the same buffer, with the same layout.
    pub fn alias(&self) -> Self {
        self.with_layout(self.layout.clone())
    }

    /// True when `self` and `other` are views over one buffer.
    pub fn shares_buffer_with(&self, other: &ZTensor) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    /// Freezes the tensor. The buffer is handed over without copying
    /// when this is its only handle and the view is compact; otherwise
    /// the cells are copied into a fresh compact buffer.
    pub fn into_frozen(self) -> FrozenZTensor {
        let compact = self.is_compact();
        let Self { data, layout } = self;
        let data = if compact {
            match Rc::try_unwrap(data) {
                Ok(cell) => return FrozenZTensor::from_compact(layout.shape(), cell.into_inner()),
                Err(shared) => shared,
            }
        } else {
            data
        };
        tracing::debug!("freezing {:?} requires a compact copy", layout);
        let cells = {
            let buffer = data.borrow();
            layout.locations().map(|l| buffer[l]).collect()
        };
        FrozenZTensor::from_compact(layout.shape(), cells)
    }

    /// Write `value` at `coord`; negative coordinates wrap.
    pub fn set(&self, coord: &[isize], value: i32) -> Result<()> {
        let location = self.layout.offset_of(coord)?;
        self.data.borrow_mut()[location] = value;
        Ok(())
    }

    pub fn fill(&self, value: i32) {
        self.write(vec![value; self.layout.num_cells()]);
    }

    /// Copy `source` into this view, broadcasting it to this shape.
    pub fn assign<O: Operand + ?Sized>(&self, source: &O) -> Result<()> {
        self.zip_with_(source, |_, v| Ok(v))
    }

    /// Replace each cell with `f` of its value. `f` may read this
    /// tensor or its aliases; it sees the values from before the call.
    pub fn map_<F: FnMut(i32) -> i32>(&self, mut f: F) {
        let values = self.with_data(|data| self.layout.locations().map(|l| f(data[l])).collect());
        self.write(values);
    }

    /// Like [`ZTensor::map_`], for fallible cell functions. Nothing is
    /// written if any cell fails.
    pub fn try_map_<F: FnMut(i32) -> Result<i32>>(&self, mut f: F) -> Result<()> {
        let values = self.with_data(|data| {
            self.layout
                .locations()
                .map(|l| f(data[l]))
                .collect::<Result<Vec<_>>>()
        })?;
        self.write(values);
        Ok(())
    }

    /// Combine each cell with the matching cell of `rhs` and store the
    /// result here. `rhs` must broadcast to this view's shape.
    ///
    /// `rhs` may alias this tensor's buffer: every value is computed
    /// before anything is written.
    pub fn zip_with_<O, F>(&self, rhs: &O, f: F) -> Result<()>
    where
        O: Operand + ?Sized,
        F: FnMut(i32, i32) -> Result<i32>,
    {
        let values = ops::in_place_values(self, rhs, f)?;
        self.write(values);
        Ok(())
    }

    fn binary_<O: Operand + ?Sized>(&self, rhs: &O, op: BinaryOp) -> Result<()> {
        let values = ops::in_place_binary_values(self, rhs, op)?;
        self.write(values);
        Ok(())
    }

    fn unary_(&self, op: UnaryOp) -> Result<()> {
        let checked = config::global::get().checked_arithmetic;
        self.try_map_(|v| op.apply(v, checked))
    }

    pub fn add_<O: Operand + ?Sized>(&self, rhs: &O) -> Result<()> {
        self.binary_(rhs, BinaryOp::Add)
    }

    pub fn sub_<O: Operand + ?Sized>(&self, rhs: &O) -> Result<()> {
        self.binary_(rhs, BinaryOp::Sub)
    }

    pub fn mul_<O: Operand + ?Sized>(&self, rhs: &O) -> Result<()> {
        self.binary_(rhs, BinaryOp::Mul)
    }

    pub fn div_<O: Operand + ?Sized>(&self, rhs: &O) -> Result<()> {
        self.binary_(rhs, BinaryOp::Div)
    }

    pub fn rem_<O: Operand + ?Sized>(&self, rhs: &O) -> Result<()> {
        self.binary_(rhs, BinaryOp::Rem)
    }

    pub fn pow_<O: Operand + ?Sized>(&self, exp: &O) -> Result<()> {
        self.binary_(exp, BinaryOp::Pow)
    }

    pub fn log_<O: Operand + ?Sized>(&self, base: &O) -> Result<()> {
        self.binary_(base, BinaryOp::Log)
    }

    pub fn minimum_<O: Operand + ?Sized>(&self, rhs: &O) -> Result<()> {
        self.binary_(rhs, BinaryOp::Minimum)
    }

    pub fn maximum_<O: Operand + ?Sized>(&self, rhs: &O) -> Result<()> {
        self.binary_(rhs, BinaryOp::Maximum)
    }

    pub fn neg_(&self) -> Result<()> {
        self.unary_(UnaryOp::Neg)
    }

    pub fn abs_(&self) -> Result<()> {
        self.unary_(UnaryOp::Abs)
    }

    /// Store `values`, given in row-major order of this view.
    fn write(&self, values: Vec<i32>) {
        let mut data = self.data.borrow_mut();
        for (l, v) in self.layout.locations().zip(values) {
            data[l] = v;
        }
    }
}

impl Clone for ZTensor {
    fn clone(&self) -> Self {
        self.to_mutable()
    }
}

impl sealed::Sealed for ZTensor {}

impl TensorRead for ZTensor {
    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn with_data<R, F: FnOnce(&[i32]) -> R>(&self, f: F) -> R {
        f(&self.data.borrow())
    }
}

impl TensorView for ZTensor {
    fn with_layout(&self, layout: Layout) -> Self {
        debug_assert!(layout.required_len() <= self.data.borrow().len());
        Self {
            data: Rc::clone(&self.data),
            layout,
        }
    }

    fn from_cells(shape: &[usize], cells: Vec<i32>) -> Result<Self> {
        Self::new(shape, cells)
    }
}
