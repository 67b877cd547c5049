//! The input being matched.
//!
//! All positions are **element** indices: characters for text, items for
//! value sequences.

use crate::value::Value;

/// A fully materialised input sequence.
#[derive(Debug, Clone)]
pub enum Subject<'a> {
    Text(Vec<char>),
    Values(&'a [Value]),
}

/// One element of a [`Subject`].
#[derive(Debug, Clone, Copy)]
pub enum Element<'a> {
    Char(char),
    Value(&'a Value),
}

impl Element<'_> {
    /// Does this element stand for the character `ch`?
    pub fn is_char(&self, ch: char) -> bool {
        match self {
            Element::Char(c) => *c == ch,
            Element::Value(v) => v.as_char() == Some(ch),
        }
    }
}

impl<'a> Subject<'a> {
    pub fn text(s: &str) -> Self {
        Subject::Text(s.chars().collect())
    }

    pub fn values(values: &'a [Value]) -> Self {
        Subject::Values(values)
    }

    pub fn len(&self) -> usize {
        match self {
            Subject::Text(chars) => chars.len(),
            Subject::Values(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Subject::Text(_))
    }

    pub fn get(&self, pos: usize) -> Option<Element<'_>> {
        match self {
            Subject::Text(chars) => chars.get(pos).copied().map(Element::Char),
            Subject::Values(values) => values.get(pos).map(Element::Value),
        }
    }

    /// The matched span `start..end` as a capture value: a substring for
    /// text, a sub-list otherwise.
    pub fn slice(&self, start: usize, end: usize) -> Value {
        match self {
            Subject::Text(chars) => Value::Str(chars[start..end].iter().collect()),
            Subject::Values(values) => Value::List(values[start..end].to_vec()),
        }
    }
}
