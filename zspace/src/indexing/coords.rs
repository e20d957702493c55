/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::iter::FusedIterator;

/// Row-major iterator over every coordinate of a shape; the last
/// dimension varies fastest.
///
/// A 0-dimensional shape yields exactly one (empty) coordinate. A
/// shape with any zero-size dimension yields nothing.
#[derive(Debug, Clone)]
pub struct CoordIter {
    shape: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl CoordIter {
    pub fn new(shape: &[usize]) -> Self {
        let next = (!shape.contains(&0)).then(|| vec![0; shape.len()]);
        Self {
            shape: shape.to_vec(),
            next,
        }
    }

    /// The shape being iterated.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

impl Iterator for CoordIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;

        let mut succ = current.clone();
        let mut carried = true;
        for d in (0..succ.len()).rev() {
            succ[d] += 1;
            if succ[d] < self.shape[d] {
                carried = false;
                break;
            }
            succ[d] = 0;
        }
        if !carried {
            self.next = Some(succ);
        }

        Some(current)
    }
}

impl FusedIterator for CoordIter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shape() {
        let coords: Vec<_> = CoordIter::new(&[]).collect();
        assert_eq!(coords, vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_empty_shape() {
        assert_eq!(CoordIter::new(&[3, 0, 2]).count(), 0);
        assert_eq!(CoordIter::new(&[0]).count(), 0);
    }

    #[test]
    fn test_row_major_order() {
        let coords: Vec<_> = CoordIter::new(&[2, 3]).collect();
        assert_eq!(
            coords,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2],
            ]
        );
    }

    #[test]
    fn test_fused() {
        let mut it = CoordIter::new(&[1]);
        assert_eq!(it.next(), Some(vec![0]));
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
        assert_eq!(it.shape(), &[1]);
    }
}
