/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Errors raised by zspace operations.
//!
//! Every failure is detected synchronously at the call that observes
//! it; no operation produces a partial result.

use itertools::Itertools;

/// Errors that can occur while building or transforming tensors,
/// points, ranges and maps.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ZSpaceError {
    /// Operands that must share a rank (or shape) do not.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// An index, after negative wraparound, still falls outside its
    /// bound.
    #[error("{label}: index {index} out of range [0, {size})")]
    IndexOutOfRange {
        label: String,
        index: isize,
        size: usize,
    },

    /// A permutation with a duplicate or out-of-range entry, or of
    /// the wrong length.
    #[error("invalid permutation: [{}]", .0.iter().join(", "))]
    InvalidPermutation(Vec<isize>),

    /// Shapes that cannot be unified by the broadcasting rule.
    #[error("cannot broadcast shapes: {}", .0.iter().map(|s| format!("[{}]", s.iter().join(", "))).join(", "))]
    BroadcastIncompatible(Vec<Vec<usize>>),

    /// Division or modulo by zero, overflow under checked arithmetic,
    /// or a value outside an operation's domain.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// A frozen buffer was asked to become writable while shared.
    #[error("mutability violation: {0}")]
    Mutability(String),

    /// Text that does not match the expected grammar.
    #[error("malformed literal {literal:?}: {reason}")]
    MalformedLiteral { literal: String, reason: String },

    /// A dimension name that is not part of a dimension map.
    #[error("no such dimension: {0:?}")]
    NoSuchDimension(String),

    /// Any other invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ZSpaceError {
    pub(crate) fn malformed(literal: &str, reason: impl ToString) -> Self {
        ZSpaceError::MalformedLiteral {
            literal: literal.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn rank_mismatch(what: &str, lhs: usize, rhs: usize) -> Self {
        ZSpaceError::DimensionMismatch(format!("{what}: rank {lhs} != rank {rhs}"))
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = ZSpaceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            ZSpaceError::IndexOutOfRange {
                label: "invalid dimension".to_string(),
                index: -4,
                size: 3,
            }
            .to_string(),
            "invalid dimension: index -4 out of range [0, 3)"
        );
        assert_eq!(
            ZSpaceError::InvalidPermutation(vec![0, 0]).to_string(),
            "invalid permutation: [0, 0]"
        );
        assert_eq!(
            ZSpaceError::BroadcastIncompatible(vec![vec![2, 3], vec![4]]).to_string(),
            "cannot broadcast shapes: [2, 3], [4]"
        );
        assert_eq!(
            ZSpaceError::malformed("abc", "expected a value").to_string(),
            "malformed literal \"abc\": expected a value"
        );
    }
}
