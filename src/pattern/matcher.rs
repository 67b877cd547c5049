//! Match engine: evaluate a [`Pattern`] against a [`Subject`].
//!
//! Failure to match is the ordinary `false` result and drives backtracking.
//! Every node that fails restores the position it started from, and every
//! combinator that may fail evaluates its operands inside a capture scope
//! so a failed attempt leaves no captures behind. Grammar defects are
//! reported through [`MatchError`] and abort the whole call.

use log::trace;

use crate::error::MatchError;
use crate::value::{Table, Value};

use super::captures::{CaptureStack, Captured, Frame};
use super::grammar::ScopeStack;
use super::subject::{Element, Subject};
use super::{Node, Pattern, Transform, TransformArgs};

/// The result of a successful top-level match.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// No captures were produced; the position the match ended at.
    Position(usize),
    /// The top-level captures, in order.
    Captures(Vec<Value>),
}

impl MatchResult {
    pub fn position(&self) -> Option<usize> {
        match self {
            MatchResult::Position(pos) => Some(*pos),
            MatchResult::Captures(_) => None,
        }
    }

    pub fn captures(&self) -> &[Value] {
        match self {
            MatchResult::Position(_) => &[],
            MatchResult::Captures(values) => values,
        }
    }
}

/// A successful match with both its end position and its captures.
#[derive(Debug, Clone, PartialEq)]
pub struct Matched {
    pub end: usize,
    pub captures: Vec<Value>,
}

impl From<Matched> for MatchResult {
    fn from(m: Matched) -> Self {
        if m.captures.is_empty() {
            MatchResult::Position(m.end)
        } else {
            MatchResult::Captures(m.captures)
        }
    }
}

/// Outcome of one match call, including the furthest position reached.
#[derive(Debug)]
pub struct Run {
    pub matched: Option<Matched>,
    pub furthest: usize,
}

// ─── Public API ─────────────────────────────────────────────────────────────

/// Match `pattern` against `subject` starting at element `start`.
pub fn match_at(
    pattern: &Pattern,
    subject: &Subject<'_>,
    start: usize,
) -> Result<Option<MatchResult>, MatchError> {
    Ok(run(pattern, subject, start)?.matched.map(MatchResult::from))
}

/// Like [`match_at`], reporting the end position alongside the captures and
/// the furthest position any sub-pattern reached.
pub fn run(pattern: &Pattern, subject: &Subject<'_>, start: usize) -> Result<Run, MatchError> {
    if start > subject.len() {
        return Ok(Run { matched: None, furthest: start });
    }
    let mut matcher = Matcher::new(subject, start);
    let ok = matcher.eval(pattern)?;
    debug_assert_eq!(matcher.captures.depth(), 0);
    let furthest = matcher.furthest;
    let matched = ok.then(|| Matched {
        end: matcher.pos,
        captures: matcher.captures.into_frame().into_values(),
    });
    Ok(Run { matched, furthest })
}

// ─── Matcher state ──────────────────────────────────────────────────────────

/// Mutable state for a single match call.
struct Matcher<'a> {
    subject: &'a Subject<'a>,
    pos: usize,
    furthest: usize,
    scopes: ScopeStack,
    captures: CaptureStack,
    /// Nesting depth of substitution captures currently being evaluated.
    substitutions: usize,
}

type Eval = Result<bool, MatchError>;

impl<'a> Matcher<'a> {
    fn new(subject: &'a Subject<'a>, start: usize) -> Self {
        Self {
            subject,
            pos: start,
            furthest: start,
            scopes: ScopeStack::default(),
            captures: CaptureStack::default(),
            substitutions: 0,
        }
    }

    fn eval(&mut self, pattern: &Pattern) -> Eval {
        let start = self.pos;
        let ok = match pattern.node() {
            Node::Literal(text) => self.match_literal(text),
            Node::Skip(n) => self.match_skip(*n),
            Node::Const(value) => *value,
            Node::Set(set) => self.match_element(|el| set.contains(el)),
            Node::Range(ranges) => self.match_element(|el| ranges.contains(el)),
            Node::Sequence(first, second) => {
                self.transaction(|m| Ok(m.eval(first)? && m.eval(second)?))?
            }
            Node::Choice(first, second) => {
                self.transaction(|m| m.eval(first))? || self.transaction(|m| m.eval(second))?
            }
            Node::Repetition(p, n) => self.transaction(|m| m.repeat(p, *n))?,
            Node::Difference(p, excluded) => self.transaction(|m| {
                if !m.eval(p)? {
                    return Ok(false);
                }
                let end = m.pos;
                m.pos = start;
                let blocked = m.probe(excluded)?;
                m.pos = end;
                Ok(!blocked)
            })?,
            Node::Lookahead(p) => self.probe(p)?,
            Node::Grammar(table) => {
                let root = table
                    .root()
                    .ok_or_else(|| MatchError::UndefinedRule(String::new()))?;
                self.scopes.push(table.clone());
                trace!("enter grammar scope {} at {}", self.scopes.depth(), start);
                let result = self.eval(root);
                self.scopes.pop();
                result?
            }
            Node::RuleRef(name) => {
                let rule = self
                    .scopes
                    .resolve(name)
                    .ok_or_else(|| MatchError::UndefinedRule(name.clone()))?;
                trace!("rule {name} at {start}");
                let ok = self.transaction(|m| m.eval(&rule))?;
                trace!("rule {name} {} at {}", if ok { "matched" } else { "failed" }, self.pos);
                ok
            }
            Node::Capture(p) => self.scoped(p, |m, start| {
                let whole = m.subject.slice(start, m.pos);
                m.captures.prepend(Captured::new(whole, start, m.pos));
                Ok(true)
            })?,
            Node::Position => {
                self.captures.append(Captured::at(Value::from(start), start));
                true
            }
            Node::ConstCapture(value) => {
                self.captures.append(Captured::at(value.clone(), start));
                true
            }
            Node::Table(p) => {
                if self.substitutions > 0 {
                    return Err(MatchError::TableInSubstitution);
                }
                self.scoped(p, |m, start| {
                    let mut frame = m.captures.take_current();
                    let mut table = Table::new();
                    frame.collect_named(&mut table);
                    table.items = frame.into_values();
                    m.captures.append(Captured::new(Value::Table(table), start, m.pos));
                    Ok(true)
                })?
            }
            Node::Group(p, name) => self.scoped(p, |m, start| {
                match name {
                    Some(name) => m.captures.current_mut().file_under(name),
                    None if m.captures.current().items.is_empty() => {
                        let whole = m.subject.slice(start, m.pos);
                        m.captures.append(Captured::new(whole, start, m.pos));
                    }
                    None => {}
                }
                Ok(true)
            })?,
            Node::Transform(p, transform) => {
                self.scoped(p, |m, start| m.apply_transform(transform, start))?
            }
            Node::Substitute(p) => {
                self.substitutions += 1;
                let result = self.scoped(p, |m, start| {
                    let frame = m.captures.take_current();
                    let spliced = splice(m.subject, start, m.pos, &frame);
                    m.captures.append(Captured::new(spliced, start, m.pos));
                    Ok(true)
                });
                self.substitutions -= 1;
                result?
            }
        };
        if ok {
            self.furthest = self.furthest.max(self.pos);
        } else {
            self.pos = start;
        }
        Ok(ok)
    }

    // ─── Capture scopes ─────────────────────────────────────────────────────

    /// Evaluate `p` in a fresh capture scope. On success `finish` may rewrite
    /// the scope's captures (or reject the match) before they are merged into
    /// the parent. On failure or error the scope is discarded.
    fn scoped<F>(&mut self, p: &Pattern, finish: F) -> Eval
    where
        F: FnOnce(&mut Self, usize) -> Eval,
    {
        let start = self.pos;
        self.captures.push();
        let outcome = match self.eval(p) {
            Ok(true) => finish(self, start),
            other => other,
        };
        if let Ok(true) = outcome {
            self.captures.merge_and_pop(false);
        } else {
            self.captures.pop();
            self.pos = start;
        }
        outcome
    }

    /// Run `f` as one all-or-nothing unit with respect to position and captures.
    fn transaction<F>(&mut self, f: F) -> Eval
    where
        F: FnOnce(&mut Self) -> Eval,
    {
        let start = self.pos;
        self.captures.push();
        let outcome = f(self);
        if let Ok(true) = outcome {
            self.captures.merge_and_pop(false);
        } else {
            self.captures.pop();
            self.pos = start;
        }
        outcome
    }

    /// Test `p` here without consuming input or keeping its captures.
    fn probe(&mut self, p: &Pattern) -> Eval {
        let start = self.pos;
        self.captures.push();
        let outcome = self.eval(p);
        self.captures.pop();
        self.pos = start;
        outcome
    }

    // ─── Primitives ─────────────────────────────────────────────────────────

    fn match_literal(&mut self, text: &str) -> bool {
        let mut cur = self.pos;
        for ch in text.chars() {
            match self.subject.get(cur) {
                Some(el) if el.is_char(ch) => cur += 1,
                _ => return false,
            }
        }
        self.pos = cur;
        true
    }

    fn match_skip(&mut self, n: i64) -> bool {
        let remaining = self.subject.len().saturating_sub(self.pos);
        if n > 0 {
            let n = n as usize;
            if n > remaining {
                return false;
            }
            self.pos += n;
            true
        } else if (remaining as u64) < n.unsigned_abs() {
            if remaining > 0 {
                self.pos += 1;
            }
            true
        } else {
            false
        }
    }

    fn match_element(&mut self, accept: impl Fn(Element<'_>) -> bool) -> bool {
        match self.subject.get(self.pos) {
            Some(el) if accept(el) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn repeat(&mut self, p: &Pattern, n: i64) -> Eval {
        if n < 0 {
            for _ in 0..n.unsigned_abs() {
                if !self.eval(p)? {
                    break;
                }
            }
            return Ok(true);
        }
        for _ in 0..n {
            if !self.eval(p)? {
                return Ok(false);
            }
        }
        // A body that can match without consuming never terminates here.
        while self.eval(p)? {}
        Ok(true)
    }

    // ─── Transforms ─────────────────────────────────────────────────────────

    fn apply_transform(&mut self, transform: &Transform, start: usize) -> Eval {
        let frame = self.captures.take_current();
        let captures = frame.values();
        let args = TransformArgs {
            matched: self.subject.slice(start, self.pos),
            start,
            end: self.pos,
            captures: &captures,
        };
        let produced = match transform {
            Transform::Format(format) => vec![Value::Str(expand_format(format, &args))],
            Transform::Function(f) => f(&args),
            Transform::MatchTime(f) => match f(&args) {
                Some(values) => values,
                None => return Ok(false),
            },
        };
        let end = self.pos;
        for value in produced {
            self.captures.append(Captured::new(value, start, end));
        }
        // Named groups inside the transformed pattern still reach enclosing tables.
        self.captures.current_mut().named = frame.named;
        Ok(true)
    }
}

/// Expand `%0`..`%9` and `%%` in a format capture.
fn expand_format(format: &str, args: &TransformArgs<'_>) -> String {
    let mut out = String::new();
    let mut chars = format.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let idx = d as usize - '0' as usize;
                if idx == 0 {
                    out.push_str(&args.matched.to_string());
                } else if let Some(v) = args.captures.get(idx - 1) {
                    out.push_str(&v.to_string());
                }
            }
            _ => out.push('%'),
        }
    }
    out
}

/// Rebuild `start..end` with each top-level capture replacing the span it
/// was taken from. Zero-width captures are inserted at their position;
/// captures nested inside an already replaced span are skipped.
fn splice(subject: &Subject<'_>, start: usize, end: usize, frame: &Frame) -> Value {
    match subject {
        Subject::Text(chars) => {
            let mut out = String::new();
            let mut cursor = start;
            for c in &frame.items {
                if c.start < cursor {
                    continue;
                }
                out.extend(&chars[cursor..c.start]);
                out.push_str(&c.value.to_string());
                cursor = c.end;
            }
            out.extend(&chars[cursor..end]);
            Value::Str(out)
        }
        Subject::Values(values) => {
            let mut out = Vec::new();
            let mut cursor = start;
            for c in &frame.items {
                if c.start < cursor {
                    continue;
                }
                out.extend_from_slice(&values[cursor..c.start]);
                out.push(c.value.clone());
                cursor = c.end;
            }
            out.extend_from_slice(&values[cursor..end]);
            Value::List(out)
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
