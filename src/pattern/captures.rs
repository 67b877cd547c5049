//! Transactional capture stack.
//!
//! Each pending combinator evaluation that may fail owns one frame. A failed
//! attempt pops its frame and everything it captured disappears; a successful
//! one merges its frame into the parent.

use std::collections::BTreeMap;
use std::mem;

use crate::value::{Table, Value};

/// A capture value together with the span it was taken from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Captured {
    pub value: Value,
    pub start: usize,
    pub end: usize,
}

impl Captured {
    pub fn new(value: Value, start: usize, end: usize) -> Self {
        Self { value, start, end }
    }

    /// A capture that covers no input (positions, constants).
    pub fn at(value: Value, pos: usize) -> Self {
        Self::new(value, pos, pos)
    }
}

/// The captures of one scope: positional values and named groups.
#[derive(Debug, Default)]
pub(crate) struct Frame {
    pub items: Vec<Captured>,
    pub named: BTreeMap<String, Vec<Value>>,
}

impl Frame {
    pub fn values(&self) -> Vec<Value> {
        self.items.iter().map(|c| c.value.clone()).collect()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.items.into_iter().map(|c| c.value).collect()
    }

    /// Move the positional captures under `name`.
    pub fn file_under(&mut self, name: &str) {
        let values = mem::take(&mut self.items)
            .into_iter()
            .map(|c| c.value)
            .collect();
        self.named.insert(name.to_string(), values);
    }

    /// Fold the named groups into `into`; a one-element group becomes a bare value.
    pub fn collect_named(&mut self, into: &mut Table) {
        for (name, mut values) in mem::take(&mut self.named) {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::List(values)
            };
            into.named.insert(name, value);
        }
    }

    fn absorb(&mut self, child: Frame, prepend: bool) {
        if prepend {
            let mut items = child.items;
            items.append(&mut self.items);
            self.items = items;
        } else {
            self.items.extend(child.items);
        }
        self.named.extend(child.named);
    }
}

#[derive(Debug, Default)]
pub(crate) struct CaptureStack {
    current: Frame,
    saved: Vec<Frame>,
}

impl CaptureStack {
    /// Enter a fresh capture scope.
    pub fn push(&mut self) {
        let parent = mem::take(&mut self.current);
        self.saved.push(parent);
    }

    /// Discard the current scope and return to its parent.
    pub fn pop(&mut self) {
        self.current = self.saved.pop().unwrap_or_default();
    }

    /// Fold the current scope into its parent, after or before the parent's captures.
    pub fn merge_and_pop(&mut self, prepend: bool) {
        let child = mem::take(&mut self.current);
        self.pop();
        self.current.absorb(child, prepend);
    }

    /// Replace the current scope's contents with an empty frame, returning them.
    pub fn take_current(&mut self) -> Frame {
        mem::take(&mut self.current)
    }

    pub fn current(&self) -> &Frame {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut Frame {
        &mut self.current
    }

    pub fn append(&mut self, capture: Captured) {
        self.current.items.push(capture);
    }

    pub fn prepend(&mut self, capture: Captured) {
        self.current.items.insert(0, capture);
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn into_frame(self) -> Frame {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(s: &str) -> Captured {
        Captured::at(Value::from(s), 0)
    }

    fn values(stack: &CaptureStack) -> Vec<Value> {
        stack.current().values()
    }

    #[test]
    fn pop_discards_scope() {
        let mut stack = CaptureStack::default();
        stack.append(cap("a"));
        stack.push();
        stack.append(cap("b"));
        stack.pop();
        assert_eq!(values(&stack), [Value::from("a")]);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn merge_appends_or_prepends() {
        let mut stack = CaptureStack::default();
        stack.append(cap("a"));
        stack.push();
        stack.append(cap("b"));
        stack.merge_and_pop(false);
        assert_eq!(values(&stack), [Value::from("a"), Value::from("b")]);

        stack.push();
        stack.append(cap("c"));
        stack.merge_and_pop(true);
        assert_eq!(
            values(&stack),
            [Value::from("c"), Value::from("a"), Value::from("b")]
        );
    }

    #[test]
    fn named_entries_merge_upwards() {
        let mut stack = CaptureStack::default();
        stack.push();
        stack.append(cap("x"));
        stack.current_mut().file_under("k");
        stack.merge_and_pop(false);
        assert!(stack.current().items.is_empty());
        assert_eq!(stack.current().named["k"], [Value::from("x")]);
    }

    #[test]
    fn collect_named_collapses_singletons() {
        let mut frame = Frame::default();
        frame.named.insert("one".into(), vec![Value::Int(1)]);
        frame.named.insert("two".into(), vec![Value::Int(1), Value::Int(2)]);
        let mut table = Table::new();
        frame.collect_named(&mut table);
        assert_eq!(table.get("one"), Some(&Value::Int(1)));
        assert_eq!(
            table.get("two"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
        assert!(frame.named.is_empty());
    }
}
