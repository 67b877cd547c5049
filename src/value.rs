//! Values flowing through the engine: input elements and capture results.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use serde::Serialize;

/// A capture value, or one element of a generic (non-text) input sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Table(Table),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// The single character this element stands for, if it is a one-char string.
    pub(crate) fn as_char(&self) -> Option<char> {
        let s = self.as_str()?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Some(ch),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => write!(f, "[{}]", items.iter().join(", ")),
            Value::Table(t) => write!(f, "{t}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<char> for Value {
    fn from(ch: char) -> Self {
        Value::Str(ch.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Value::Table(t)
    }
}

/// The aggregate produced by a table capture.
///
/// Positional captures keep their order; named groups are keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub items: Vec<Value>,
    pub named: BTreeMap<String, Value>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.named.is_empty()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self.items.iter().map(ToString::to_string);
        let named = self.named.iter().map(|(k, v)| format!("{k} = {v}"));
        write!(f, "{{{}}}", items.chain(named).join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_char_only_for_single_char_strings() {
        assert_eq!(Value::from("x").as_char(), Some('x'));
        assert_eq!(Value::from("xy").as_char(), None);
        assert_eq!(Value::from("").as_char(), None);
        assert_eq!(Value::Int(1).as_char(), None);
    }

    #[test]
    fn positions_past_i64_saturate() {
        assert_eq!(Value::from(42usize), Value::Int(42));
        assert_eq!(Value::from(usize::MAX), Value::Int(i64::MAX));
    }

    #[test]
    fn display_table() {
        let mut t = Table::new();
        t.items.push(Value::from("a"));
        t.named.insert("k".to_string(), Value::Int(2));
        assert_eq!(t.to_string(), "{a, k = 2}");
        assert_eq!(Value::List(vec![1i64.into(), true.into()]).to_string(), "[1, true]");
    }

    #[test]
    fn serializes_untagged() {
        let mut t = Table::new();
        t.items.push(Value::Int(1));
        t.named.insert("rule".to_string(), Value::from("x"));
        let json = serde_json::to_string(&Value::Table(t)).unwrap();
        assert_eq!(json, r#"{"items":[1],"named":{"rule":"x"}}"#);
    }
}
