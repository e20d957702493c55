/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use super::codec;
use super::sealed;
use super::Layout;
use super::TensorRead;
use super::TensorView;
use super::ZTensor;
use crate::error::Result;
use crate::error::ZSpaceError;

/// An immutable strided tensor of `i32` cells.
///
/// The buffer is reference counted and never written, so clones and
/// views are cheap and the type may be shared across threads. Unlike
/// [`ZTensor`], it implements [`Hash`]: its value cannot change once it
/// is placed in a hashed collection.
#[derive(Clone)]
pub struct FrozenZTensor {
    data: Arc<Vec<i32>>,
    layout: Layout,
}

impl FrozenZTensor {
    pub(crate) fn from_compact(shape: &[usize], cells: Vec<i32>) -> Self {
        let layout = Layout::row_major(shape);
        debug_assert_eq!(cells.len(), layout.num_cells());
        Self {
            data: Arc::new(cells),
            layout,
        }
    }

    pub fn new(shape: &[usize], cells: Vec<i32>) -> Result<Self> {
        Ok(ZTensor::new(shape, cells)?.into_frozen())
    }

    pub fn new_scalar(value: i32) -> Self {
        Self::from_compact(&[], vec![value])
    }

    pub fn new_vector(values: &[i32]) -> Self {
        Self::from_compact(&[values.len()], values.to_vec())
    }

    pub fn new_matrix<R: AsRef<[i32]>>(rows: &[R]) -> Result<Self> {
        Ok(ZTensor::new_matrix(rows)?.into_frozen())
    }

    pub fn new_filled(shape: &[usize], value: i32) -> Result<Self> {
        Ok(ZTensor::new_filled(shape, value)?.into_frozen())
    }

    pub fn new_zeros(shape: &[usize]) -> Result<Self> {
        Self::new_filled(shape, 0)
    }

    pub fn new_ones(shape: &[usize]) -> Result<Self> {
        Self::new_filled(shape, 1)
    }

    pub fn parse(input: &str) -> Result<Self> {
        let (shape, cells) = codec::parse_cells(input)?;
        Self::new(&shape, cells)
    }

    pub fn from_nested(value: &serde_json::Value) -> Result<Self> {
        let (shape, cells) = codec::nested_value_cells(value)?;
        Self::new(&shape, cells)
    }

    /// This tensor if it is already compact, otherwise a compact copy.
    pub fn clone_compact(&self) -> Self {
        if self.is_compact() {
            return self.clone();
        }
        tracing::debug!("compacting {:?}", self.layout);
        self.to_frozen()
    }

    /// Reclaims the buffer as a mutable tensor. Fails when the buffer
    /// is shared with another frozen handle, or when this view does
    /// not cover it exactly.
    pub fn try_into_mutable(self) -> Result<ZTensor> {
        if !self.is_compact() {
            return Err(ZSpaceError::Mutability(format!(
                "cannot reclaim a non-compact view {:?}",
                self.layout
            )));
        }
        let Self { data, layout } = self;
        match Arc::try_unwrap(data) {
            Ok(cells) => Ok(ZTensor::from_compact(layout.shape(), cells)),
            Err(_) => Err(ZSpaceError::Mutability(
                "cannot reclaim a buffer shared by other frozen handles".to_string(),
            )),
        }
    }
}

impl Hash for FrozenZTensor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shape().hash(state);
        for l in self.layout.locations() {
            self.data[l].hash(state);
        }
    }
}

impl sealed::Sealed for FrozenZTensor {}

impl TensorRead for FrozenZTensor {
    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn with_data<R, F: FnOnce(&[i32]) -> R>(&self, f: F) -> R {
        f(&self.data)
    }
}

impl TensorView for FrozenZTensor {
    fn with_layout(&self, layout: Layout) -> Self {
        debug_assert!(layout.required_len() <= self.data.len());
        Self {
            data: Arc::clone(&self.data),
            layout,
        }
    }

    fn from_cells(shape: &[usize], cells: Vec<i32>) -> Result<Self> {
        Self::new(shape, cells)
    }
}

impl From<ZTensor> for FrozenZTensor {
    fn from(tensor: ZTensor) -> Self {
        tensor.into_frozen()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;

    use super::*;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_hash_is_stable() {
        let t = ZTensor::new_matrix(&[[1, 2], [3, 4]]).unwrap();
        let frozen = t.to_frozen();
        assert_eq!(hash_of(&frozen), hash_of(&frozen));
        assert_eq!(hash_of(&frozen), hash_of(&frozen.clone_compact()));

        let transposed = frozen.t();
        assert!(!transposed.is_compact());
        assert_eq!(hash_of(&transposed), hash_of(&transposed.clone_compact()));
        assert_ne!(hash_of(&transposed), hash_of(&frozen));
    }

    #[test]
    fn test_hash_ignores_layout() {
        let broadcast = FrozenZTensor::new_vector(&[5]).broadcast_to(&[2, 3]).unwrap();
        let filled = FrozenZTensor::new_filled(&[2, 3], 5).unwrap();
        assert_eq!(broadcast, filled);
        assert_eq!(hash_of(&broadcast), hash_of(&filled));

        let set: HashSet<FrozenZTensor> = [broadcast, filled].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_send_across_threads() {
        let frozen = FrozenZTensor::new_vector(&[1, 2, 3]);
        let view = frozen.reverse(0).unwrap();
        let sum = std::thread::spawn(move || view.sum().unwrap())
            .join()
            .unwrap();
        assert_eq!(sum, 6);
    }

    #[test]
    fn test_try_into_mutable() {
        let frozen = FrozenZTensor::new_vector(&[1, 2, 3]);
        let shared = frozen.clone();
        assert!(matches!(
            frozen.try_into_mutable(),
            Err(ZSpaceError::Mutability(_))
        ));

        let t = shared.try_into_mutable().unwrap();
        t.set(&[0], 7).unwrap();
        assert_eq!(t.to_vec(), vec![7, 2, 3]);

        let view = FrozenZTensor::new_vector(&[1, 2, 3]).reverse(0).unwrap();
        assert!(view.try_into_mutable().is_err());
    }

    #[test]
    fn test_to_mutable_copies() {
        let frozen = FrozenZTensor::new_zeros(&[2]).unwrap();
        let t = frozen.to_mutable();
        t.fill(4);
        assert_eq!(frozen.to_vec(), vec![0, 0]);
        assert_eq!(FrozenZTensor::from(t), FrozenZTensor::new_filled(&[2], 4).unwrap());
    }
}
