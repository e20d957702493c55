/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The cellwise dominance partial order.
//!
//! `a` is below `b` when every cell of `a` is at most the matching
//! cell of `b` and at least one is strictly smaller. Operands whose
//! cells disagree in both directions are incomparable: `(0, 1)` and
//! `(1, 0)` are neither below nor above each other.

use std::cmp::Ordering;

use derive_more::Display;

use crate::error::Result;
use crate::error::ZSpaceError;
use crate::tensor::Operand;

/// The four outcomes of a partial comparison.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartialOrdering {
    #[display("LESS_THAN")]
    LessThan,
    #[display("EQUAL")]
    Equal,
    #[display("GREATER_THAN")]
    GreaterThan,
    #[display("INCOMPARABLE")]
    Incomparable,
}

impl PartialOrdering {
    /// The equivalent [`Ordering`], if the operands are comparable.
    pub fn to_ordering(self) -> Option<Ordering> {
        match self {
            PartialOrdering::LessThan => Some(Ordering::Less),
            PartialOrdering::Equal => Some(Ordering::Equal),
            PartialOrdering::GreaterThan => Some(Ordering::Greater),
            PartialOrdering::Incomparable => None,
        }
    }
}

/// Compare two operands of identical shape cell by cell.
pub fn partial_order_by_grid<A, B>(lhs: &A, rhs: &B) -> Result<PartialOrdering>
where
    A: Operand + ?Sized,
    B: Operand + ?Sized,
{
    lhs.with_operand(|lhs_layout, lhs_data| {
        rhs.with_operand(|rhs_layout, rhs_data| {
            if lhs_layout.shape() != rhs_layout.shape() {
                return Err(ZSpaceError::DimensionMismatch(format!(
                    "cannot compare shape {:?} with {:?}",
                    lhs_layout.shape(),
                    rhs_layout.shape()
                )));
            }
            let mut less = false;
            let mut greater = false;
            for (l, r) in lhs_layout.locations().zip(rhs_layout.locations()) {
                match lhs_data[l].cmp(&rhs_data[r]) {
                    Ordering::Less => less = true,
                    Ordering::Greater => greater = true,
                    Ordering::Equal => {}
                }
                if less && greater {
                    return Ok(PartialOrdering::Incomparable);
                }
            }
            Ok(match (less, greater) {
                (false, false) => PartialOrdering::Equal,
                (true, false) => PartialOrdering::LessThan,
                (false, true) => PartialOrdering::GreaterThan,
                (true, true) => PartialOrdering::Incomparable,
            })
        })
    })
}

pub fn lt<A: Operand + ?Sized, B: Operand + ?Sized>(lhs: &A, rhs: &B) -> Result<bool> {
    Ok(partial_order_by_grid(lhs, rhs)? == PartialOrdering::LessThan)
}

pub fn le<A: Operand + ?Sized, B: Operand + ?Sized>(lhs: &A, rhs: &B) -> Result<bool> {
    Ok(matches!(
        partial_order_by_grid(lhs, rhs)?,
        PartialOrdering::LessThan | PartialOrdering::Equal
    ))
}

pub fn gt<A: Operand + ?Sized, B: Operand + ?Sized>(lhs: &A, rhs: &B) -> Result<bool> {
    Ok(partial_order_by_grid(lhs, rhs)? == PartialOrdering::GreaterThan)
}

pub fn ge<A: Operand + ?Sized, B: Operand + ?Sized>(lhs: &A, rhs: &B) -> Result<bool> {
    Ok(matches!(
        partial_order_by_grid(lhs, rhs)?,
        PartialOrdering::GreaterThan | PartialOrdering::Equal
    ))
}

pub fn eq<A: Operand + ?Sized, B: Operand + ?Sized>(lhs: &A, rhs: &B) -> Result<bool> {
    Ok(partial_order_by_grid(lhs, rhs)? == PartialOrdering::Equal)
}

pub fn ne<A: Operand + ?Sized, B: Operand + ?Sized>(lhs: &A, rhs: &B) -> Result<bool> {
    Ok(partial_order_by_grid(lhs, rhs)? != PartialOrdering::Equal)
}
