/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Dimensional selector expressions.
//!
//! A selector list is a comma-separated sequence of atoms, applied
//! left to right over the dimensions of a tensor:
//!
//! | atom      | meaning                                          |
//! |-----------|--------------------------------------------------|
//! | `3`, `-1` | select one index, dropping the dimension         |
//! | `a:b:c`   | slice `[a, b)` with step `c`; each part optional |
//! | `+`, `+4` | insert a new axis, broadcast to the given size   |
//! | `...`     | skip as many dimensions as needed                |

use std::fmt;

use enum_as_inner::EnumAsInner;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::character::complete::digit1;
use nom::character::complete::multispace0;
use nom::combinator::all_consuming;
use nom::combinator::map;
use nom::combinator::map_res;
use nom::combinator::opt;
use nom::combinator::recognize;
use nom::combinator::value;
use nom::multi::separated_list1;
use nom::sequence::delimited;
use nom::sequence::pair;
use nom::sequence::preceded;
use nom::sequence::tuple;
use nom::IResult;

use crate::error::Result;
use crate::error::ZSpaceError;

/// A `start:end:step` slice; absent parts take their defaults
/// relative to the sign of `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SliceSpec {
    pub start: Option<isize>,
    pub end: Option<isize>,
    pub step: Option<isize>,
}

impl SliceSpec {
    pub fn new(start: Option<isize>, end: Option<isize>, step: Option<isize>) -> Self {
        Self { start, end, step }
    }

    /// The full slice `:`.
    pub fn all() -> Self {
        Self::default()
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{}", start)?;
        }
        f.write_str(":")?;
        if let Some(end) = self.end {
            write!(f, "{}", end)?;
        }
        if let Some(step) = self.step {
            write!(f, ":{}", step)?;
        }
        Ok(())
    }
}

/// One atom of a selector expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumAsInner)]
pub enum Selector {
    /// Fix one index of the current dimension, removing it.
    Index(isize),

    /// Slice the current dimension.
    Slice(SliceSpec),

    /// Insert a dimension of the given size, backed by a single cell.
    NewAxis(usize),

    /// Skip over the dimensions not addressed by the remaining atoms.
    Ellipsis,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(i) => write!(f, "{}", i),
            Selector::Slice(s) => write!(f, "{}", s),
            Selector::NewAxis(1) => f.write_str("+"),
            Selector::NewAxis(n) => write!(f, "+{}", n),
            Selector::Ellipsis => f.write_str("..."),
        }
    }
}

fn integer(input: &str) -> IResult<&str, isize> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse)(input)
}

fn padded_integer(input: &str) -> IResult<&str, isize> {
    delimited(multispace0, integer, multispace0)(input)
}

fn ellipsis(input: &str) -> IResult<&str, Selector> {
    value(Selector::Ellipsis, tag("..."))(input)
}

fn new_axis(input: &str) -> IResult<&str, Selector> {
    map(
        preceded(char('+'), opt(map_res(digit1, str::parse::<usize>))),
        |size| Selector::NewAxis(size.unwrap_or(1)),
    )(input)
}

fn slice(input: &str) -> IResult<&str, Selector> {
    map(
        tuple((
            opt(padded_integer),
            char(':'),
            opt(padded_integer),
            opt(preceded(char(':'), opt(padded_integer))),
        )),
        |(start, _, end, step)| Selector::Slice(SliceSpec::new(start, end, step.flatten())),
    )(input)
}

fn index(input: &str) -> IResult<&str, Selector> {
    map(integer, Selector::Index)(input)
}

fn selector(input: &str) -> IResult<&str, Selector> {
    delimited(
        multispace0,
        alt((ellipsis, new_axis, slice, index)),
        multispace0,
    )(input)
}

/// Parse a comma-separated selector expression such as `"1, :, +, ..."`.
pub fn parse_selectors(input: &str) -> Result<Vec<Selector>> {
    tracing::trace!("parse_selectors({:?})", input);
    all_consuming(separated_list1(char(','), selector))(input)
        .map(|(_, selectors)| selectors)
        .map_err(|e| ZSpaceError::malformed(input, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_atoms() {
        assert_eq!(
            parse_selectors("1, -2, ..., +, +3").unwrap(),
            vec![
                Selector::Index(1),
                Selector::Index(-2),
                Selector::Ellipsis,
                Selector::NewAxis(1),
                Selector::NewAxis(3),
            ]
        );
    }

    #[test]
    fn test_parse_slices() {
        assert_eq!(
            parse_selectors(":, 1:, :3, 1:3, ::-1, 4:0:-2").unwrap(),
            vec![
                Selector::Slice(SliceSpec::all()),
                Selector::Slice(SliceSpec::new(Some(1), None, None)),
                Selector::Slice(SliceSpec::new(None, Some(3), None)),
                Selector::Slice(SliceSpec::new(Some(1), Some(3), None)),
                Selector::Slice(SliceSpec::new(None, None, Some(-1))),
                Selector::Slice(SliceSpec::new(Some(4), Some(0), Some(-2))),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_selectors("").is_err());
        assert!(parse_selectors("a").is_err());
        assert!(parse_selectors("1,,2").is_err());
        assert!(parse_selectors("1:2:3:4").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let input = "1, 2:, :-1, 1:5:2, ::-1, +, +4, ...";
        let selectors = parse_selectors(input).unwrap();
        let rendered = selectors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        assert_eq!(rendered, input);
        assert_eq!(parse_selectors(&rendered).unwrap(), selectors);
    }

    #[test]
    fn test_enum_accessors() {
        let selectors = parse_selectors("..., 2").unwrap();
        assert!(selectors[0].is_ellipsis());
        assert_eq!(selectors[1].as_index(), Some(&2));
    }
}
