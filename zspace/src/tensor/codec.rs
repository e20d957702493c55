/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Text and JSON encodings of tensors.
//!
//! Both forms are nested arrays with scalars written bare. The pretty
//! form separates elements with `", "`, the JSON form with `","`.
//!
//! A tensor with a zero-size dimension has no cells to print, so it is
//! written as `ndim` nested empty brackets regardless of which
//! dimension is empty: `zeros(0, 5)` and `zeros(3, 0)` both render as
//! `[[]]`. Parsing such a nesting yields an all-zero shape of the same
//! rank.

use std::fmt;

use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use super::FrozenZTensor;
use super::Layout;
use super::TensorRead;
use super::ZTensor;
use crate::error::Result;
use crate::error::ZSpaceError;

pub(crate) fn render(layout: &Layout, data: &[i32], sep: &str) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_nested(&mut out, layout, data, sep);
    out
}

pub(crate) fn write_nested(
    out: &mut impl fmt::Write,
    layout: &Layout,
    data: &[i32],
    sep: &str,
) -> fmt::Result {
    if layout.is_empty() {
        for _ in 0..layout.ndim() {
            out.write_char('[')?;
        }
        for _ in 0..layout.ndim() {
            out.write_char(']')?;
        }
        return Ok(());
    }
    write_dim(out, layout, data, sep, 0, layout.offset())
}

fn write_dim(
    out: &mut impl fmt::Write,
    layout: &Layout,
    data: &[i32],
    sep: &str,
    dim: usize,
    base: isize,
) -> fmt::Result {
    if dim == layout.ndim() {
        return write!(out, "{}", data[base as usize]);
    }
    out.write_char('[')?;
    for i in 0..layout.shape()[dim] {
        if i > 0 {
            out.write_str(sep)?;
        }
        write_dim(
            out,
            layout,
            data,
            sep,
            dim + 1,
            base + i as isize * layout.strides()[dim],
        )?;
    }
    out.write_char(']')
}

/// Serializes the cells of a view as nested sequences.
struct NestedCells<'a> {
    layout: &'a Layout,
    data: &'a [i32],
    dim: usize,
    base: isize,
}

impl Serialize for NestedCells<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.dim == self.layout.ndim() {
            return serializer.serialize_i32(self.data[self.base as usize]);
        }
        let size = self.layout.shape()[self.dim];
        let stride = self.layout.strides()[self.dim];
        let mut seq = serializer.serialize_seq(Some(size))?;
        for i in 0..size {
            seq.serialize_element(&NestedCells {
                dim: self.dim + 1,
                base: self.base + i as isize * stride,
                ..*self
            })?;
        }
        seq.end()
    }
}

/// Serializes `depth` nested sequences around an empty innermost one.
struct EmptyNesting(usize);

impl Serialize for EmptyNesting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 <= 1 {
            return serializer.serialize_seq(Some(0))?.end();
        }
        let mut seq = serializer.serialize_seq(Some(1))?;
        seq.serialize_element(&EmptyNesting(self.0 - 1))?;
        seq.end()
    }
}

fn serialize_view<S: Serializer>(
    layout: &Layout,
    data: &[i32],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    if layout.is_empty() {
        return EmptyNesting(layout.ndim()).serialize(serializer);
    }
    NestedCells {
        layout,
        data,
        dim: 0,
        base: layout.offset(),
    }
    .serialize(serializer)
}

/// The parsed nested-array form, before its shape is checked.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Nested {
    Scalar(i32),
    Array(Vec<Nested>),
}

impl Nested {
    fn has_scalars(&self) -> bool {
        match self {
            Nested::Scalar(_) => true,
            Nested::Array(items) => items.iter().any(Nested::has_scalars),
        }
    }

    fn depth(&self) -> usize {
        match self {
            Nested::Scalar(_) => 0,
            Nested::Array(items) => 1 + items.iter().map(Nested::depth).max().unwrap_or(0),
        }
    }

    /// The row-major shape and cells of a rectangular nesting.
    pub(crate) fn into_cells(self) -> std::result::Result<(Vec<usize>, Vec<i32>), String> {
        let mut shape = Vec::new();
        let mut cur = &self;
        while let Nested::Array(items) = cur {
            shape.push(items.len());
            match items.first() {
                Some(first) => cur = first,
                None => break,
            }
        }

        if shape.contains(&0) {
            if self.has_scalars() {
                return Err("ragged nesting".to_string());
            }
            return Ok((vec![0; self.depth()], Vec::new()));
        }

        let mut cells = Vec::with_capacity(shape.iter().product());
        self.flatten(&shape, &mut cells)?;
        Ok((shape, cells))
    }

    fn flatten(self, shape: &[usize], cells: &mut Vec<i32>) -> std::result::Result<(), String> {
        match (self, shape.split_first()) {
            (Nested::Scalar(v), None) => {
                cells.push(v);
                Ok(())
            }
            (Nested::Array(items), Some((&size, rest))) if items.len() == size => {
                items.into_iter().try_for_each(|item| item.flatten(rest, cells))
            }
            _ => Err("ragged nesting".to_string()),
        }
    }
}

pub(crate) fn parse_cells(input: &str) -> Result<(Vec<usize>, Vec<i32>)> {
    tracing::trace!("parse tensor {:?}", input);
    let nested: Nested =
        serde_json::from_str(input).map_err(|e| ZSpaceError::malformed(input, e))?;
    nested
        .into_cells()
        .map_err(|reason| ZSpaceError::malformed(input, reason))
}

pub(crate) fn nested_value_cells(value: &serde_json::Value) -> Result<(Vec<usize>, Vec<i32>)> {
    let literal = value.to_string();
    Nested::deserialize(value)
        .map_err(|e| ZSpaceError::malformed(&literal, e))?
        .into_cells()
        .map_err(|reason| ZSpaceError::malformed(&literal, reason))
}

macro_rules! impl_codec {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.with_data(|data| write_nested(f, self.layout(), data, ", "))
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($ty), self)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.with_data(|data| serialize_view(self.layout(), data, serializer))
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let (shape, cells) = Nested::deserialize(deserializer)?
                    .into_cells()
                    .map_err(D::Error::custom)?;
                <$ty>::new(&shape, cells).map_err(D::Error::custom)
            }
        }

        impl std::str::FromStr for $ty {
            type Err = ZSpaceError;

            fn from_str(s: &str) -> Result<Self> {
                <$ty>::parse(s)
            }
        }
    };
}

impl_codec!(ZTensor);
impl_codec!(FrozenZTensor);

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use proptest::prelude::*;

    use super::*;
    use crate::strategy::gen_tensor;
    use crate::tensor::TensorView;

    #[test]
    fn test_display() {
        assert_eq!(ZTensor::new_scalar(3).to_string(), "3");
        assert_eq!(ZTensor::new_vector(&[1, 2, 3]).to_string(), "[1, 2, 3]");
        let m = ZTensor::new_matrix(&[[1, 2], [3, 4]]).unwrap();
        assert_eq!(m.to_string(), "[[1, 2], [3, 4]]");
        assert_eq!(m.t().to_string(), "[[1, 3], [2, 4]]");
        assert_eq!(m.to_json_string(), "[[1,2],[3,4]]");
        assert_eq!(format!("{:?}", m), "ZTensor([[1, 2], [3, 4]])");
    }

    #[test]
    fn test_degenerate_forms() {
        for shape in [[0, 5], [3, 0], [0, 0]] {
            let t = ZTensor::new_zeros(&shape).unwrap();
            assert_eq!(t.to_string(), "[[]]");
            assert_eq!(t.to_json_string(), "[[]]");
            assert_eq!(serde_json::to_string(&t).unwrap(), "[[]]");
        }
        assert_eq!(ZTensor::new_zeros(&[0]).unwrap().to_string(), "[]");
        assert_eq!(ZTensor::new_zeros(&[2, 0, 1]).unwrap().to_string(), "[[[]]]");

        let parsed = ZTensor::parse("[[]]").unwrap();
        assert_eq!(parsed.shape(), &[0, 0]);
        assert_eq!(ZTensor::parse("[[], []]").unwrap().shape(), &[0, 0]);
        assert_eq!(ZTensor::parse("[]").unwrap().shape(), &[0]);
    }

    #[test]
    fn test_parse() {
        assert_eq!(ZTensor::parse("7").unwrap(), ZTensor::new_scalar(7));
        assert_eq!(
            ZTensor::parse(" [ [1,2] ,[3, 4]] ").unwrap(),
            ZTensor::new_matrix(&[[1, 2], [3, 4]]).unwrap()
        );
        let multi_line = indoc! {"
            [[1, 2, 3],
             [4, 5, 6]]
        "};
        assert_eq!(ZTensor::parse(multi_line).unwrap().shape(), &[2, 3]);
        let from_str: FrozenZTensor = "[1, 2]".parse().unwrap();
        assert_eq!(from_str, ZTensor::new_vector(&[1, 2]));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "abc", "[1, [2]]", "[[1, 2], [3]]", "[[1], []]", "[1.5]", "[4294967296]"] {
            assert!(
                matches!(ZTensor::parse(bad), Err(ZSpaceError::MalformedLiteral { .. })),
                "expected a parse error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_serde() {
        let m = ZTensor::new_matrix(&[[1, 2], [3, 4]]).unwrap();
        let json = serde_json::to_string(&m.t()).unwrap();
        assert_eq!(json, "[[1,3],[2,4]]");
        let back: FrozenZTensor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m.t());
        assert!(serde_json::from_str::<ZTensor>("[[1], [2, 3]]").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn test_text_round_trip(t in gen_tensor(3, 4)) {
            let pretty = ZTensor::parse(&t.to_string()).unwrap();
            prop_assert_eq!(&pretty, &t);
            let json: ZTensor = serde_json::from_str(&serde_json::to_string(&t).unwrap()).unwrap();
            prop_assert_eq!(json, t);
        }
    }
}
