/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Strided N-dimensional integer tensors.
//!
//! Two concrete types share one read-only capability:
//!
//! - [`ZTensor`] is mutable. Its buffer is shared by every view
//!   derived from it, so a write through one view is visible through
//!   all overlapping views.
//! - [`FrozenZTensor`] is immutable. It is `Send + Sync`, hashable,
//!   and cheap to clone.
//!
//! Reading, arithmetic and reductions live on [`TensorRead`];
//! aliasing view constructors live on [`TensorView`]. Cellwise binary
//! operations accept any [`Operand`]: another tensor, a point, a
//! matrix or a bare `i32` scalar.
//!
//! Freezing is one way. [`ZTensor::into_frozen`] hands over the
//! buffer when nothing else aliases it, and copies otherwise.

mod codec;
mod frozen;
mod layout;
mod mutable;
mod ops;
mod reduce;

pub use frozen::FrozenZTensor;
pub use layout::Layout;
pub use layout::LinearIndex;
pub use mutable::ZTensor;
pub use ops::concat;
pub use ops::BinaryOp;
pub use ops::UnaryOp;

use crate::error::Result;
use crate::error::ZSpaceError;
use crate::indexing;
use crate::indexing::Selector;
use crate::indexing::SliceSpec;
use crate::point::ZPoint;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Read access to a strided integer tensor.
pub trait TensorRead: sealed::Sealed {
    /// The view's layout over its buffer.
    fn layout(&self) -> &Layout;

    /// Run `f` over the backing buffer.
    fn with_data<R, F: FnOnce(&[i32]) -> R>(&self, f: F) -> R;

    fn shape(&self) -> &[usize] {
        self.layout().shape()
    }

    fn ndim(&self) -> usize {
        self.layout().ndim()
    }

    fn num_cells(&self) -> usize {
        self.layout().num_cells()
    }

    /// True when some dimension has size 0.
    fn is_empty(&self) -> bool {
        self.layout().is_empty()
    }

    fn is_scalar(&self) -> bool {
        self.ndim() == 0
    }

    /// The shape as a point.
    fn shape_point(&self) -> Result<ZPoint> {
        ZPoint::from_shape(self.shape())
    }

    /// True when the view is row-major over exactly its own cells.
    fn is_compact(&self) -> bool {
        self.layout().is_row_major() && self.with_data(|data| data.len() == self.num_cells())
    }

    /// True when `dim` has size > 1 but is backed by a single cell.
    fn is_broadcast_dim(&self, dim: isize) -> Result<bool> {
        let d = self.resolve_dim(dim)?;
        Ok(self.layout().is_broadcast_dim(d))
    }

    fn resolve_dim(&self, dim: isize) -> Result<usize> {
        self.layout().resolve_dim(dim)
    }

    /// The cell at `coord`; negative coordinates wrap.
    fn get(&self, coord: &[isize]) -> Result<i32> {
        let location = self.layout().offset_of(coord)?;
        Ok(self.with_data(|data| data[location]))
    }

    /// The value of a tensor holding exactly one cell.
    fn item(&self) -> Result<i32> {
        if self.num_cells() != 1 {
            return Err(ZSpaceError::InvalidArgument(format!(
                "item() requires exactly one cell; shape is {:?}",
                self.shape()
            )));
        }
        let location = self.layout().location(&vec![0; self.ndim()]);
        Ok(self.with_data(|data| data[location]))
    }

    /// All cell values in row-major order.
    fn to_vec(&self) -> Vec<i32> {
        self.with_data(|data| self.layout().locations().map(|l| data[l]).collect())
    }

    /// A compact, frozen copy.
    fn to_frozen(&self) -> FrozenZTensor {
        FrozenZTensor::from_compact(self.shape(), self.to_vec())
    }

    /// A compact, mutable copy that aliases nothing.
    fn to_mutable(&self) -> ZTensor {
        ZTensor::from_compact(self.shape(), self.to_vec())
    }

    /// The JSON nested-array form.
    fn to_json_string(&self) -> String {
        self.with_data(|data| codec::render(self.layout(), data, ","))
    }

    fn all_match<P: Fn(i32) -> bool>(&self, predicate: P) -> bool {
        self.with_data(|data| self.layout().locations().all(|l| predicate(data[l])))
    }

    fn any_match<P: Fn(i32) -> bool>(&self, predicate: P) -> bool {
        self.with_data(|data| self.layout().locations().any(|l| predicate(data[l])))
    }

    /// A new tensor with `f` applied to every cell.
    fn map<F: FnMut(i32) -> i32>(&self, mut f: F) -> ZTensor {
        ZTensor::from_compact(
            self.shape(),
            self.with_data(|data| self.layout().locations().map(|l| f(data[l])).collect()),
        )
    }

    /// Like [`TensorRead::map`], for fallible cell functions.
    fn try_map<F: FnMut(i32) -> Result<i32>>(&self, f: F) -> Result<ZTensor> {
        ops::map_cells(self, f)
    }

    /// Combine with `other` under broadcasting; the result has the
    /// common broadcast shape.
    fn zip_with<O: Operand + ?Sized, F: FnMut(i32, i32) -> Result<i32>>(
        &self,
        other: &O,
        f: F,
    ) -> Result<ZTensor>
    where
        Self: Sized,
    {
        ops::zip_cells(self, other, f)
    }

    fn neg(&self) -> Result<ZTensor> {
        ops::unary(self, UnaryOp::Neg)
    }

    fn abs(&self) -> Result<ZTensor> {
        ops::unary(self, UnaryOp::Abs)
    }

    fn add<O: Operand + ?Sized>(&self, rhs: &O) -> Result<ZTensor>
    where
        Self: Sized,
    {
        ops::binary(self, rhs, BinaryOp::Add)
    }

    fn sub<O: Operand + ?Sized>(&self, rhs: &O) -> Result<ZTensor>
    where
        Self: Sized,
    {
        ops::binary(self, rhs, BinaryOp::Sub)
    }

    fn mul<O: Operand + ?Sized>(&self, rhs: &O) -> Result<ZTensor>
    where
        Self: Sized,
    {
        ops::binary(self, rhs, BinaryOp::Mul)
    }

    /// Truncating division.
    fn div<O: Operand + ?Sized>(&self, rhs: &O) -> Result<ZTensor>
    where
        Self: Sized,
    {
        ops::binary(self, rhs, BinaryOp::Div)
    }

    /// Truncating remainder; the sign follows the dividend.
    fn rem<O: Operand + ?Sized>(&self, rhs: &O) -> Result<ZTensor>
    where
        Self: Sized,
    {
        ops::binary(self, rhs, BinaryOp::Rem)
    }

    fn pow<O: Operand + ?Sized>(&self, exp: &O) -> Result<ZTensor>
    where
        Self: Sized,
    {
        ops::binary(self, exp, BinaryOp::Pow)
    }

    /// Floor of the logarithm of each cell in `base`.
    fn log<O: Operand + ?Sized>(&self, base: &O) -> Result<ZTensor>
    where
        Self: Sized,
    {
        ops::binary(self, base, BinaryOp::Log)
    }

    fn minimum<O: Operand + ?Sized>(&self, rhs: &O) -> Result<ZTensor>
    where
        Self: Sized,
    {
        ops::binary(self, rhs, BinaryOp::Minimum)
    }

    fn maximum<O: Operand + ?Sized>(&self, rhs: &O) -> Result<ZTensor>
    where
        Self: Sized,
    {
        ops::binary(self, rhs, BinaryOp::Maximum)
    }

    /// Fold every cell into `initial`. The visiting order is
    /// row-major, but callers should pass an associative and
    /// commutative `op`.
    fn reduce_cells_atomic<F: FnMut(i32, i32) -> Result<i32>>(
        &self,
        op: F,
        initial: i32,
    ) -> Result<i32> {
        reduce::fold_all(self, op, initial)
    }

    /// Fold over `dims`; the result drops exactly those dimensions.
    fn reduce_cells<F: FnMut(i32, i32) -> Result<i32>>(
        &self,
        op: F,
        initial: i32,
        dims: &[isize],
    ) -> Result<ZTensor> {
        reduce::fold_dims(self, op, initial, dims)
    }

    fn sum(&self) -> Result<i32> {
        self.reduce_cells_atomic(reduce::checked(BinaryOp::Add), 0)
    }

    fn sum_dims(&self, dims: &[isize]) -> Result<ZTensor> {
        self.reduce_cells(reduce::checked(BinaryOp::Add), 0, dims)
    }

    fn prod(&self) -> Result<i32> {
        self.reduce_cells_atomic(reduce::checked(BinaryOp::Mul), 1)
    }

    fn prod_dims(&self, dims: &[isize]) -> Result<ZTensor> {
        self.reduce_cells(reduce::checked(BinaryOp::Mul), 1, dims)
    }

    /// Smallest cell; `i32::MAX` for an empty tensor.
    fn min(&self) -> i32 {
        self.with_data(|data| {
            self.layout()
                .locations()
                .map(|l| data[l])
                .fold(i32::MAX, i32::min)
        })
    }

    fn min_dims(&self, dims: &[isize]) -> Result<ZTensor> {
        self.reduce_cells(|a, b| Ok(a.min(b)), i32::MAX, dims)
    }

    /// Largest cell; `i32::MIN` for an empty tensor.
    fn max(&self) -> i32 {
        self.with_data(|data| {
            self.layout()
                .locations()
                .map(|l| data[l])
                .fold(i32::MIN, i32::max)
        })
    }

    fn max_dims(&self, dims: &[isize]) -> Result<ZTensor> {
        self.reduce_cells(|a, b| Ok(a.max(b)), i32::MIN, dims)
    }

    /// Integer matrix product. `self` must be a matrix; `rhs` may be a
    /// matrix or a vector, in which case the result is a vector.
    fn matmul<O: TensorRead>(&self, rhs: &O) -> Result<ZTensor>
    where
        Self: Sized,
    {
        ops::matmul(self, rhs)
    }

    /// A compact copy with the indices of `dim` reordered: index `i`
    /// of the result is index `perm[i]` of this tensor.
    fn reordered_dim_copy(&self, perm: &[isize], dim: isize) -> Result<ZTensor>
    where
        Self: Sized,
    {
        ops::reordered_dim_copy(self, perm, dim)
    }
}

/// Tensors that can produce views over their own buffer.
pub trait TensorView: TensorRead + Sized {
    /// A view of the same buffer under `layout`.
    fn with_layout(&self, layout: Layout) -> Self;

    /// A fresh compact tensor holding `cells`, laid out row-major
    /// over `shape`.
    fn from_cells(shape: &[usize], cells: Vec<i32>) -> Result<Self>;

    /// Dimension `i` of the view is dimension `perm[i]` of `self`.
    fn permute(&self, perm: &[isize]) -> Result<Self> {
        Ok(self.with_layout(self.layout().permute(perm)?))
    }

    fn transpose(&self, a: isize, b: isize) -> Result<Self> {
        Ok(self.with_layout(self.layout().transpose(a, b)?))
    }

    /// All dimensions in reverse order.
    fn t(&self) -> Self {
        self.with_layout(self.layout().reversed_dims())
    }

    fn reverse(&self, dim: isize) -> Result<Self> {
        Ok(self.with_layout(self.layout().reverse(dim)?))
    }

    fn select_dim(&self, dim: isize, index: isize) -> Result<Self> {
        Ok(self.with_layout(self.layout().select_dim(dim, index)?))
    }

    fn select_dims(&self, dims: &[isize], indices: &[isize]) -> Result<Self> {
        Ok(self.with_layout(self.layout().select_dims(dims, indices)?))
    }

    fn slice_dim(&self, dim: isize, spec: SliceSpec) -> Result<Self> {
        Ok(self.with_layout(self.layout().slice_dim(dim, spec)?))
    }

    fn unsqueeze(&self, dim: isize) -> Result<Self> {
        Ok(self.with_layout(self.layout().unsqueeze(dim)?))
    }

    fn squeeze(&self, dim: isize) -> Result<Self> {
        Ok(self.with_layout(self.layout().squeeze(dim)?))
    }

    fn broadcast_dim(&self, dim: isize, size: usize) -> Result<Self> {
        Ok(self.with_layout(self.layout().broadcast_dim(dim, size)?))
    }

    fn broadcast_to(&self, shape: &[usize]) -> Result<Self> {
        Ok(self.with_layout(self.layout().broadcast_to(shape)?))
    }

    /// The same cells under a new shape. Aliases the buffer when the
    /// layout allows it, and falls back to a compact copy otherwise.
    fn reshape(&self, shape: &[usize]) -> Result<Self> {
        match self.layout().view(shape)? {
            Some(layout) => Ok(self.with_layout(layout)),
            None => {
                tracing::debug!(
                    "reshape of {:?} to {:?} requires a compact copy",
                    self.layout(),
                    shape
                );
                Self::from_cells(shape, self.to_vec())
            }
        }
    }

    /// Apply selectors left to right; see [`indexing::Selector`].
    fn select(&self, selectors: &[Selector]) -> Result<Self> {
        if selectors.iter().filter(|s| s.is_ellipsis()).count() > 1 {
            return Err(ZSpaceError::InvalidArgument(format!(
                "multiple ellipsis in selection: {selectors:?}"
            )));
        }

        let mut cur = self.with_layout(self.layout().clone());
        let mut next_dim = 0usize;
        for (i, selector) in selectors.iter().enumerate() {
            match *selector {
                Selector::Index(index) => cur = cur.select_dim(next_dim as isize, index)?,
                Selector::Slice(spec) => {
                    cur = cur.slice_dim(next_dim as isize, spec)?;
                    next_dim += 1;
                }
                Selector::NewAxis(size) => {
                    cur = cur.unsqueeze(next_dim as isize)?;
                    if size != 1 {
                        cur = cur.broadcast_dim(next_dim as isize, size)?;
                    }
                    next_dim += 1;
                }
                Selector::Ellipsis => {
                    let consumed = selectors[i + 1..]
                        .iter()
                        .filter(|s| s.is_index() || s.is_slice())
                        .count();
                    let skip_to = cur.ndim().checked_sub(consumed).filter(|&d| d >= next_dim);
                    next_dim = skip_to.ok_or_else(|| {
                        ZSpaceError::InvalidArgument(format!(
                            "too many selectors for shape {:?}: {selectors:?}",
                            self.shape()
                        ))
                    })?;
                }
            }
            if next_dim > cur.ndim() {
                return Err(ZSpaceError::InvalidArgument(format!(
                    "too many selectors for shape {:?}: {selectors:?}",
                    self.shape()
                )));
            }
        }
        Ok(cur)
    }

    /// Parse and apply a selector expression such as `"..., 1:3"`.
    fn select_str(&self, expr: &str) -> Result<Self> {
        self.select(&indexing::parse_selectors(expr)?)
    }
}

/// Anything usable as an operand of a cellwise binary operation.
pub trait Operand {
    /// Run `f` over the operand's layout and buffer.
    fn with_operand<R, F: FnOnce(&Layout, &[i32]) -> R>(&self, f: F) -> R;
}

impl Operand for i32 {
    fn with_operand<R, F: FnOnce(&Layout, &[i32]) -> R>(&self, f: F) -> R {
        f(&Layout::scalar(), std::slice::from_ref(self))
    }
}

macro_rules! impl_tensor_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Operand for $ty {
                fn with_operand<R, F: FnOnce(&Layout, &[i32]) -> R>(&self, f: F) -> R {
                    self.with_data(|data| f(self.layout(), data))
                }
            }
        )*
    };
}

impl_tensor_operand!(ZTensor, FrozenZTensor);

/// Structural equality: same shape and same cell values.
pub(crate) fn cells_equal<A: TensorRead + ?Sized, B: TensorRead + ?Sized>(a: &A, b: &B) -> bool {
    a.shape() == b.shape()
        && a.with_data(|lhs| {
            b.with_data(|rhs| {
                a.layout()
                    .locations()
                    .zip(b.layout().locations())
                    .all(|(l, r)| lhs[l] == rhs[r])
            })
        })
}

macro_rules! impl_cross_eq {
    ($lhs:ty, $rhs:ty) => {
        impl PartialEq<$rhs> for $lhs {
            fn eq(&self, other: &$rhs) -> bool {
                cells_equal(self, other)
            }
        }
    };
}

impl_cross_eq!(ZTensor, ZTensor);
impl_cross_eq!(ZTensor, FrozenZTensor);
impl_cross_eq!(FrozenZTensor, ZTensor);
impl_cross_eq!(FrozenZTensor, FrozenZTensor);

impl Eq for ZTensor {}
impl Eq for FrozenZTensor {}

/// Fail when a fresh allocation of `cells` would exceed the
/// configured limit.
pub(crate) fn check_cells(cells: usize) -> Result<()> {
    enforce_cell_limit(cells, crate::config::global::get().max_cells)
}

fn enforce_cell_limit(cells: usize, max_cells: usize) -> Result<()> {
    if cells > max_cells {
        return Err(ZSpaceError::InvalidArgument(format!(
            "{cells} cells exceeds the limit of {max_cells}"
        )));
    }
    Ok(())
}

/// Cell count of `shape`, bounded by the configured limit.
pub(crate) fn checked_cells(shape: &[usize]) -> Result<usize> {
    let cells = indexing::checked_shape_to_size(shape).ok_or_else(|| {
        ZSpaceError::InvalidArgument(format!("shape {shape:?} is too large"))
    })?;
    check_cells(cells)?;
    Ok(cells)
}
