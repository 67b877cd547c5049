//! Pattern combinators.
//!
//! A [`Pattern`] is an immutable, reference-counted node of a combinator
//! tree. Combining patterns never mutates an existing node; it always
//! allocates a new one that shares its operands.
//!
//! # Operators
//!
//! | Method                  | Meaning                                            |
//! |-------------------------|----------------------------------------------------|
//! | `a.then(&b)`            | Sequence: `a` then `b`                             |
//! | `a.or(&b)`              | Ordered choice: `a`, else `b`                      |
//! | `a.repeat(n)`           | `n > 0`: at least n; `0`: any number; `n < 0`: at most -n |
//! | `a.minus(&b)`           | `a`, provided `b` does not match at the same place |
//! | `a.invert()`            | Any one element that does not start an `a`         |
//! | `a.ignore()`            | Zero-width positive lookahead                      |
//! | `a.absent()`            | Zero-width negative lookahead                      |
//!
//! # Captures
//!
//! | Constructor             | Produces                                           |
//! |-------------------------|----------------------------------------------------|
//! | `p.capture()`           | the matched span, then `p`'s captures              |
//! | `Pattern::position()`   | the current position                               |
//! | `Pattern::const_capture(v)` | `v`                                            |
//! | `p.table()`             | one [`Table`](crate::Table) of `p`'s captures      |
//! | `p.group()`             | `p`'s captures (or the span if there are none)     |
//! | `p.named(name)`         | `p`'s captures filed under `name`                  |
//! | `p.format(fmt)`         | `fmt` with `%n` replaced by captures               |
//! | `p.function(f)`         | `f` applied to the match                           |
//! | `p.match_time(f)`       | like `function`, but `f` may reject the match      |
//! | `p.substitute()`        | the matched text with captures spliced in          |

pub mod builtins;
mod captures;
pub mod char_class;
pub mod grammar;
pub mod matcher;
pub mod subject;


use std::fmt;
use std::sync::Arc;

use crate::error::{ConstructionError, MatchError};
use crate::value::Value;

use char_class::{CharRanges, CharSet};
use grammar::RuleTable;
use matcher::MatchResult;
use subject::Subject;

/// Arguments handed to a capture function.
#[derive(Debug)]
pub struct TransformArgs<'a> {
    /// The matched span as a value (substring or sub-list).
    pub matched: Value,
    pub start: usize,
    pub end: usize,
    /// Captures produced by the transformed pattern.
    pub captures: &'a [Value],
}

pub type CaptureFn = Arc<dyn Fn(&TransformArgs<'_>) -> Vec<Value> + Send + Sync>;
pub type MatchTimeFn = Arc<dyn Fn(&TransformArgs<'_>) -> Option<Vec<Value>> + Send + Sync>;

/// How a [`Node::Transform`] rewrites its operand's captures.
#[derive(Clone)]
pub enum Transform {
    /// `%0` is the whole match, `%1`..`%9` the nth capture, `%%` a percent sign.
    Format(String),
    Function(CaptureFn),
    /// Returning `None` rejects the match.
    MatchTime(MatchTimeFn),
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Format(s) => f.debug_tuple("Format").field(s).finish(),
            Transform::Function(_) => f.write_str("Function(..)"),
            Transform::MatchTime(_) => f.write_str("MatchTime(..)"),
        }
    }
}

/// The closed set of pattern operations.
#[derive(Debug)]
pub enum Node {
    Literal(String),
    Skip(i64),
    Const(bool),
    Set(CharSet),
    Range(CharRanges),
    Sequence(Pattern, Pattern),
    Choice(Pattern, Pattern),
    Repetition(Pattern, i64),
    Difference(Pattern, Pattern),
    Lookahead(Pattern),
    Grammar(Arc<RuleTable>),
    RuleRef(String),
    Capture(Pattern),
    Position,
    ConstCapture(Value),
    Table(Pattern),
    Group(Pattern, Option<String>),
    Transform(Pattern, Transform),
    Substitute(Pattern),
}

/// A shared handle to an immutable pattern node.
#[derive(Debug, Clone)]
pub struct Pattern(Arc<Node>);

impl Pattern {
    fn new(node: Node) -> Self {
        Self(Arc::new(node))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    // ─── Primitives ─────────────────────────────────────────────────────────

    /// Match `text` exactly.
    pub fn literal(text: &str) -> Result<Self, ConstructionError> {
        if text.is_empty() {
            return Err(ConstructionError::EmptyLiteral);
        }
        Ok(Self::new(Node::Literal(text.to_string())))
    }

    /// `n > 0`: consume exactly `n` elements. `n < 0`: succeed only when
    /// fewer than `-n` elements remain.
    pub fn skip(n: i64) -> Result<Self, ConstructionError> {
        if n == 0 {
            return Err(ConstructionError::ZeroSkip);
        }
        Ok(Self::new(Node::Skip(n)))
    }

    /// Always succeed (`true`) or always fail (`false`) without consuming.
    pub fn constant(value: bool) -> Self {
        Self::new(Node::Const(value))
    }

    /// Any one of the characters in `chars`.
    pub fn set(chars: &str) -> Result<Self, ConstructionError> {
        Ok(Self::new(Node::Set(CharSet::from_chars(chars)?)))
    }

    /// Any one element equal to one of `members`.
    pub fn set_of<I, S>(members: I) -> Result<Self, ConstructionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::new(Node::Set(CharSet::from_members(members)?)))
    }

    /// Any one character inside one of the two-character ranges, e.g. `["az", "09"]`.
    pub fn range(pairs: &[&str]) -> Result<Self, ConstructionError> {
        let ranges = pairs
            .iter()
            .map(|pair| CharRanges::parse_pair(pair))
            .collect::<Result<Vec<_>, _>>()?;
        Self::ranges(ranges)
    }

    pub fn ranges(ranges: Vec<(char, char)>) -> Result<Self, ConstructionError> {
        Ok(Self::new(Node::Range(CharRanges::new(ranges)?)))
    }

    /// A new rule scope; matching delegates to the table's root rule.
    pub fn grammar(table: RuleTable) -> Result<Self, ConstructionError> {
        table.validate()?;
        Ok(Self::new(Node::Grammar(Arc::new(table))))
    }

    /// A reference to a rule, resolved when matched.
    pub fn rule(name: impl Into<String>) -> Self {
        Self::new(Node::RuleRef(name.into()))
    }

    // ─── Combinators ────────────────────────────────────────────────────────

    pub fn then(&self, next: &Pattern) -> Self {
        Self::new(Node::Sequence(self.clone(), next.clone()))
    }

    pub fn or(&self, alternative: &Pattern) -> Self {
        Self::new(Node::Choice(self.clone(), alternative.clone()))
    }

    pub fn repeat(&self, n: i64) -> Self {
        Self::new(Node::Repetition(self.clone(), n))
    }

    pub fn minus(&self, excluded: &Pattern) -> Self {
        Self::new(Node::Difference(self.clone(), excluded.clone()))
    }

    /// One element, provided `self` does not match here.
    pub fn invert(&self) -> Self {
        Self::new(Node::Skip(1)).minus(self)
    }

    pub fn ignore(&self) -> Self {
        Self::new(Node::Lookahead(self.clone()))
    }

    /// Succeed without consuming, provided `self` does not match here.
    pub fn absent(&self) -> Self {
        Self::constant(true).minus(self)
    }

    // ─── Captures ───────────────────────────────────────────────────────────

    pub fn capture(&self) -> Self {
        Self::new(Node::Capture(self.clone()))
    }

    pub fn position() -> Self {
        Self::new(Node::Position)
    }

    pub fn const_capture(value: impl Into<Value>) -> Self {
        Self::new(Node::ConstCapture(value.into()))
    }

    pub fn table(&self) -> Self {
        Self::new(Node::Table(self.clone()))
    }

    pub fn group(&self) -> Self {
        Self::new(Node::Group(self.clone(), None))
    }

    pub fn named(&self, name: impl Into<String>) -> Self {
        Self::new(Node::Group(self.clone(), Some(name.into())))
    }

    pub fn format(&self, format: impl Into<String>) -> Self {
        self.transform(Transform::Format(format.into()))
    }

    pub fn function<F>(&self, f: F) -> Self
    where
        F: Fn(&TransformArgs<'_>) -> Vec<Value> + Send + Sync + 'static,
    {
        self.transform(Transform::Function(Arc::new(f)))
    }

    pub fn match_time<F>(&self, f: F) -> Self
    where
        F: Fn(&TransformArgs<'_>) -> Option<Vec<Value>> + Send + Sync + 'static,
    {
        self.transform(Transform::MatchTime(Arc::new(f)))
    }

    pub fn transform(&self, transform: Transform) -> Self {
        Self::new(Node::Transform(self.clone(), transform))
    }

    pub fn substitute(&self) -> Self {
        Self::new(Node::Substitute(self.clone()))
    }

    // ─── Matching ───────────────────────────────────────────────────────────

    /// Match against the start of `input`.
    ///
    /// `Ok(None)` means no match; `Err` means the grammar itself is broken.
    pub fn match_str(&self, input: &str) -> Result<Option<MatchResult>, MatchError> {
        matcher::match_at(self, &Subject::text(input), 0)
    }

    /// Match against the start of a generic value sequence.
    pub fn match_values(&self, input: &[Value]) -> Result<Option<MatchResult>, MatchError> {
        matcher::match_at(self, &Subject::values(input), 0)
    }

    pub fn match_at(
        &self,
        subject: &Subject<'_>,
        start: usize,
    ) -> Result<Option<MatchResult>, MatchError> {
        matcher::match_at(self, subject, start)
    }
}
