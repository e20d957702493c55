/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Named dimensions.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::error::ZSpaceError;
use crate::indexing;
use crate::traits::HasDimension;
use crate::traits::HasPermute;

static ATOMIC_IDENTIFIER: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$"));

/// Fail unless `name` is a letter followed by letters, digits and
/// underscores.
pub fn valid_atomic_identifier(name: &str) -> Result<&str> {
    let pattern = ATOMIC_IDENTIFIER
        .as_ref()
        .map_err(|e| ZSpaceError::InvalidArgument(e.to_string()))?;
    if !pattern.is_match(name) {
        return Err(ZSpaceError::InvalidArgument(format!(
            "invalid atomic identifier: {name:?}"
        )));
    }
    Ok(name)
}

/// Types whose dimensions can also be addressed by name.
pub trait HasNamedPermute: HasPermute + HasDimension {
    /// The position of the dimension called `name`.
    fn index_of(&self, name: &str) -> Result<usize>;

    /// The permutation placing the named dimensions in the given
    /// order. `names` must name every dimension exactly once.
    fn to_permutation<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<isize>> {
        let perm = names
            .iter()
            .map(|name| self.index_of(name.as_ref()).map(|i| i as isize))
            .collect::<Result<Vec<_>>>()?;
        indexing::resolve_permutation(&perm, self.ndim())?;
        Ok(perm)
    }

    /// Permute so that dimension `i` of the result is `names[i]`.
    fn permute_by_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        self.permute(&self.to_permutation(names)?)
    }
}

/// An ordered set of unique dimension names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct DimensionMap {
    names: Vec<String>,
}

impl DimensionMap {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut validated: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = valid_atomic_identifier(name.as_ref())?;
            if validated.iter().any(|n| n == name) {
                return Err(ZSpaceError::InvalidArgument(format!(
                    "duplicate name: {name:?}"
                )));
            }
            validated.push(name.to_string());
        }
        Ok(Self { names: validated })
    }

    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ZSpaceError::malformed(json, e))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ZSpaceError::NoSuchDimension(name.to_string()))
    }

    /// The name at `index`; negative indices wrap.
    pub fn name_of(&self, index: isize) -> Result<&str> {
        let i = indexing::resolve_index("dimension index", index, self.names.len())?;
        Ok(&self.names[i])
    }
}

impl HasDimension for DimensionMap {
    fn ndim(&self) -> usize {
        self.names.len()
    }
}

impl HasPermute for DimensionMap {
    fn permute(&self, perm: &[isize]) -> Result<Self> {
        let perm = indexing::resolve_permutation(perm, self.names.len())?;
        Ok(Self {
            names: indexing::apply_permutation(&self.names, &perm),
        })
    }
}

impl HasNamedPermute for DimensionMap {
    fn index_of(&self, name: &str) -> Result<usize> {
        DimensionMap::index_of(self, name)
    }
}

impl TryFrom<Vec<String>> for DimensionMap {
    type Error = ZSpaceError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(&names)
    }
}

impl From<DimensionMap> for Vec<String> {
    fn from(map: DimensionMap) -> Self {
        map.names
    }
}

/// The JSON array form.
impl fmt::Display for DimensionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.names).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(valid_atomic_identifier("x").is_ok());
        assert!(valid_atomic_identifier("batch_2").is_ok());
        for bad in ["", "2x", "_x", "a.b", "a b", "naïve"] {
            assert!(valid_atomic_identifier(bad).is_err(), "{bad:?} should be rejected");
        }
        assert_eq!(
            valid_atomic_identifier("a-b").unwrap_err().to_string(),
            "invalid argument: invalid atomic identifier: \"a-b\""
        );
    }

    #[test]
    fn test_lookup() {
        let dims = DimensionMap::new(&["x", "y", "z"]).unwrap();
        assert_eq!(dims.ndim(), 3);
        assert_eq!(dims.index_of("y").unwrap(), 1);
        assert_eq!(dims.name_of(-1).unwrap(), "z");
        assert!(dims.contains("x"));
        assert!(!dims.contains("w"));
        assert_eq!(
            dims.index_of("w").unwrap_err(),
            ZSpaceError::NoSuchDimension("w".to_string())
        );
        assert!(dims.name_of(3).is_err());
    }

    #[test]
    fn test_rejects_duplicates() {
        assert!(DimensionMap::new(&["x", "x"]).is_err());
        assert!(DimensionMap::new(&["x", "1"]).is_err());
        assert!(DimensionMap::new::<&str>(&[]).unwrap().names().is_empty());
    }

    #[test]
    fn test_permute() {
        let dims = DimensionMap::new(&["x", "y", "z"]).unwrap();
        assert_eq!(
            dims.permute(&[1, 2, 0]).unwrap().names(),
            &["y", "z", "x"]
        );
        assert_eq!(dims.to_permutation(&["z", "x", "y"]).unwrap(), vec![2, 0, 1]);
        assert_eq!(
            dims.permute_by_names(&["z", "x", "y"]).unwrap(),
            DimensionMap::new(&["z", "x", "y"]).unwrap()
        );
        assert!(dims.permute_by_names(&["z", "x"]).is_err());
        assert!(dims.permute_by_names(&["z", "x", "x"]).is_err());
        assert!(dims.permute_by_names(&["z", "x", "w"]).is_err());
    }

    #[test]
    fn test_json() {
        let dims = DimensionMap::new(&["x", "y"]).unwrap();
        assert_eq!(dims.to_string(), r#"["x","y"]"#);
        assert_eq!(serde_json::to_string(&dims).unwrap(), r#"["x","y"]"#);
        assert_eq!(DimensionMap::parse(r#"["x", "y"]"#).unwrap(), dims);
        assert!(DimensionMap::parse(r#"["x", "x"]"#).is_err());
        assert!(DimensionMap::parse(r#"["x", 1]"#).is_err());
    }
}
