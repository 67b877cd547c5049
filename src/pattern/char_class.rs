//! Character class membership tests for `Set` and `RangeClass` patterns.

use std::collections::BTreeSet;

use crate::error::ConstructionError;

use super::subject::Element;

/// A set of elements. Members are strings so that token streams can match
/// multi-character tokens; text input only ever matches one-char members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharSet {
    members: BTreeSet<String>,
}

impl CharSet {
    /// A set of the characters in `chars`.
    pub fn from_chars(chars: &str) -> Result<Self, ConstructionError> {
        Self::from_members(chars.chars().map(String::from))
    }

    /// A set of arbitrary string members.
    pub fn from_members<I, S>(members: I) -> Result<Self, ConstructionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: BTreeSet<String> = members.into_iter().map(Into::into).collect();
        if members.is_empty() {
            return Err(ConstructionError::EmptySet);
        }
        Ok(Self { members })
    }

    pub fn contains(&self, element: Element<'_>) -> bool {
        match element {
            Element::Char(ch) => {
                let mut buf = [0u8; 4];
                self.members.contains(&*ch.encode_utf8(&mut buf))
            }
            Element::Value(v) => v.as_str().is_some_and(|s| self.members.contains(s)),
        }
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }
}

/// A list of inclusive `(lo, hi)` character ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharRanges {
    ranges: Vec<(char, char)>,
}

impl CharRanges {
    pub fn new(ranges: Vec<(char, char)>) -> Result<Self, ConstructionError> {
        if ranges.is_empty() {
            return Err(ConstructionError::EmptyRange);
        }
        if let Some(&(lo, hi)) = ranges.iter().find(|(lo, hi)| lo > hi) {
            return Err(ConstructionError::InvalidRange(lo, hi));
        }
        Ok(Self { ranges })
    }

    /// Parse the `"az"` two-character shorthand used by `R("az", "AZ")`.
    pub fn parse_pair(pair: &str) -> Result<(char, char), ConstructionError> {
        let mut chars = pair.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(lo), Some(hi), None) if lo <= hi => Ok((lo, hi)),
            (Some(lo), Some(hi), None) => Err(ConstructionError::InvalidRange(lo, hi)),
            _ => Err(ConstructionError::EmptyRange),
        }
    }

    pub fn contains(&self, element: Element<'_>) -> bool {
        let ch = match element {
            Element::Char(ch) => ch,
            Element::Value(v) => match v.as_char() {
                Some(ch) => ch,
                None => return false,
            },
        };
        self.ranges.iter().any(|&(lo, hi)| lo <= ch && ch <= hi)
    }

    pub fn ranges(&self) -> &[(char, char)] {
        &self.ranges
    }
}
