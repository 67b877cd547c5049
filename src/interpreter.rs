//! Folds the syntax tree of a grammar text into a [`Pattern`].
//!
//! The tree is the capture output of the bootstrap parser in
//! [`compiler`](crate::compiler): every node is a [`Table`] tagged either
//! `rule = <name>` (children in `items`) or `token = <kind>` (matched text
//! as its only item). Statements are processed in order to collect the
//! definitions and the category each was made under; the definitions are
//! then turned into patterns and merged with the built-in library into a
//! single grammar.

use std::collections::HashMap;
use std::fmt;
use std::vec;

use itertools::Itertools;
use log::debug;
use phf::{Map, phf_map};

use crate::error::{CompileError, ConstructionError};
use crate::pattern::builtins::{library, rule, token};
use crate::pattern::{CaptureFn, MatchTimeFn, Pattern, Transform, TransformArgs};
use crate::value::{Table, Value};

type Result<T> = std::result::Result<T, CompileError>;

const TOKENS: &str = "tokens";
const RULES: &str = "rules";

/// Named Rust functions that grammar text can reference through
/// `Cfunc(p, "name")` and `Cmt(p, "name")`.
#[derive(Clone, Default)]
pub struct Functions {
    captures: HashMap<String, CaptureFn>,
    match_time: HashMap<String, MatchTimeFn>,
}

impl Functions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capture function for `Cfunc`.
    pub fn capture<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&TransformArgs<'_>) -> Vec<Value> + Send + Sync + 'static,
    {
        self.captures.insert(name.into(), std::sync::Arc::new(f));
        self
    }

    /// Register a match-time function for `Cmt`. Returning `None` rejects the match.
    pub fn match_time<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&TransformArgs<'_>) -> Option<Vec<Value>> + Send + Sync + 'static,
    {
        self.match_time.insert(name.into(), std::sync::Arc::new(f));
        self
    }
}

impl fmt::Debug for Functions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Functions")
            .field("captures", &self.captures.keys().sorted().collect_vec())
            .field("match_time", &self.match_time.keys().sorted().collect_vec())
            .finish()
    }
}

// ─── Callable table ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Callable {
    Pattern,
    Rule,
    Set,
    Range,
    Capture,
    Position,
    Constant,
    Table,
    Group,
    Substitute,
    Format,
    Function,
    MatchTime,
    Token,
}

struct CallInfo {
    callable: Callable,
    name: &'static str,
    min_args: usize,
    max_args: usize,
}

/// Functions callable from grammar text, with their arity.
const CALLABLES: Map<&'static str, CallInfo> = phf_map! {
    "P" => CallInfo { callable: Callable::Pattern, name: "P", min_args: 1, max_args: 1 },
    "V" => CallInfo { callable: Callable::Rule, name: "V", min_args: 1, max_args: 1 },
    "S" => CallInfo { callable: Callable::Set, name: "S", min_args: 1, max_args: usize::MAX },
    "R" => CallInfo { callable: Callable::Range, name: "R", min_args: 1, max_args: usize::MAX },
    "C" => CallInfo { callable: Callable::Capture, name: "C", min_args: 1, max_args: 1 },
    "Cp" => CallInfo { callable: Callable::Position, name: "Cp", min_args: 0, max_args: 0 },
    "Cc" => CallInfo { callable: Callable::Constant, name: "Cc", min_args: 1, max_args: 1 },
    "Ct" => CallInfo { callable: Callable::Table, name: "Ct", min_args: 1, max_args: 1 },
    "Cg" => CallInfo { callable: Callable::Group, name: "Cg", min_args: 1, max_args: 2 },
    "Cs" => CallInfo { callable: Callable::Substitute, name: "Cs", min_args: 1, max_args: 1 },
    "Cstr" => CallInfo { callable: Callable::Format, name: "Cstr", min_args: 2, max_args: 2 },
    "Cfunc" => CallInfo { callable: Callable::Function, name: "Cfunc", min_args: 2, max_args: 2 },
    "Cmt" => CallInfo { callable: Callable::MatchTime, name: "Cmt", min_args: 2, max_args: 2 },
    "T" => CallInfo { callable: Callable::Token, name: "T", min_args: 1, max_args: 1 },
};

fn invalid(function: &'static str, reason: impl Into<String>) -> CompileError {
    CompileError::InvalidArgument {
        function,
        reason: reason.into(),
    }
}

// ─── Operands ───────────────────────────────────────────────────────────────

/// An evaluated sub-expression. Literals stay plain values until an operator
/// or a function needs a pattern.
#[derive(Debug, Clone)]
enum Operand {
    Pattern(Pattern),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Operand {
    /// Strings match literally, integers skip, booleans always or never match.
    fn into_pattern(self, function: &'static str) -> Result<Pattern> {
        Ok(match self {
            Operand::Pattern(p) => p,
            Operand::Str(s) => Pattern::literal(&s)?,
            Operand::Int(n) => Pattern::skip(n)?,
            Operand::Bool(b) => Pattern::constant(b),
            Operand::Float(x) => return Err(invalid(function, format!("{x} is not a pattern"))),
        })
    }

    fn into_value(self, function: &'static str) -> Result<Value> {
        Ok(match self {
            Operand::Str(s) => Value::Str(s),
            Operand::Int(n) => Value::Int(n),
            Operand::Float(x) => Value::Float(x),
            Operand::Bool(b) => Value::Bool(b),
            Operand::Pattern(_) => return Err(invalid(function, "expected a constant, found a pattern")),
        })
    }

    fn into_string(self, function: &'static str) -> Result<String> {
        match self {
            Operand::Str(s) => Ok(s),
            other => Err(invalid(function, format!("expected a string, found {other:?}"))),
        }
    }
}

/// The evaluated arguments of one call, consumed left to right.
struct Args {
    function: &'static str,
    items: vec::IntoIter<Operand>,
}

impl Args {
    fn next(&mut self) -> Result<Operand> {
        self.items
            .next()
            .ok_or_else(|| invalid(self.function, "missing argument"))
    }

    fn pattern(&mut self) -> Result<Pattern> {
        let function = self.function;
        self.next()?.into_pattern(function)
    }

    fn string(&mut self) -> Result<String> {
        let function = self.function;
        self.next()?.into_string(function)
    }

    fn value(&mut self) -> Result<Value> {
        let function = self.function;
        self.next()?.into_value(function)
    }

    fn optional_string(&mut self) -> Result<Option<String>> {
        let function = self.function;
        self.items
            .next()
            .map(|o| o.into_string(function))
            .transpose()
    }

    fn strings(self) -> Result<Vec<String>> {
        let function = self.function;
        self.items.map(|o| o.into_string(function)).collect()
    }
}

// ─── Syntax tree access ─────────────────────────────────────────────────────

fn malformed(ast: &Value) -> CompileError {
    CompileError::MalformedTree(ast.to_string())
}

fn node(ast: &Value) -> Result<&Table> {
    ast.as_table().ok_or_else(|| malformed(ast))
}

fn rule_of(ast: &Value) -> Option<&str> {
    ast.as_table()?.get("rule")?.as_str()
}

/// `(kind, text)` of a token node.
fn token_of(ast: &Value) -> Option<(&str, &str)> {
    let table = ast.as_table()?;
    Some((table.get("token")?.as_str()?, table.items.first()?.as_str()?))
}

fn identifier(ast: &Value) -> Result<&str> {
    match token_of(ast) {
        Some(("identifier", name)) => Ok(name),
        _ => Err(CompileError::ExpectedIdentifier),
    }
}

/// Strip the quotes of a string token and resolve its escapes.
fn unescape(quoted: &str) -> String {
    let inner = quoted.get(1..quoted.len().saturating_sub(1)).unwrap_or_default();
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(ch @ ('"' | '\'' | '\\')) => out.push(ch),
            Some(ch) => {
                out.push('\\');
                out.push(ch);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn literal(kind: &str, text: &str) -> Result<Operand> {
    match kind {
        "identifier" => Ok(Operand::Pattern(Pattern::rule(text))),
        "doubleQuoteString" | "singleQuoteString" => Ok(Operand::Str(unescape(text))),
        "bool" => Ok(Operand::Bool(text == "true")),
        "number" if text.contains(['.', 'e', 'E']) => text
            .parse()
            .map(Operand::Float)
            .map_err(|e| invalid("number", format!("{text}: {e}"))),
        "number" => text
            .parse()
            .map(Operand::Int)
            .map_err(|e| invalid("number", format!("{text}: {e}"))),
        _ => Err(CompileError::MalformedTree(format!("unknown token kind '{kind}'"))),
    }
}

// ─── Interpreter ────────────────────────────────────────────────────────────

struct Definition<'a> {
    name: String,
    expr: &'a Value,
    category: String,
}

pub(crate) struct Interpreter<'a> {
    functions: &'a Functions,
    category: String,
    definitions: Vec<Definition<'a>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(functions: &'a Functions) -> Self {
        Self {
            functions,
            category: "anonymous".to_string(),
            definitions: Vec::new(),
        }
    }

    /// Turn a `statement_list` tree into a grammar pattern.
    pub fn compile(mut self, ast: &'a Value) -> Result<Pattern> {
        if rule_of(ast) != Some("statement_list") {
            return Err(malformed(ast));
        }
        for statement in &node(ast)?.items {
            match rule_of(statement) {
                Some("label_statement") => self.label_statement(statement)?,
                Some("expression_statement") => self.expression_statement(statement)?,
                _ => return Err(malformed(statement)),
            }
        }
        self.into_grammar()
    }

    /// `name:` switches the category of the definitions that follow.
    fn label_statement(&mut self, ast: &Value) -> Result<()> {
        let label = node(ast)?.items.first().ok_or_else(|| malformed(ast))?;
        self.category = identifier(label)?.to_string();
        Ok(())
    }

    /// `name = expr;` records a definition. Redefinition keeps the original slot.
    fn expression_statement(&mut self, ast: &'a Value) -> Result<()> {
        let assignment = node(ast)?.items.first().ok_or_else(|| malformed(ast))?;
        let items = &node(assignment)?.items;
        let name = identifier(items.first().ok_or_else(|| malformed(assignment))?)?;
        let expr = items
            .get(2)
            .ok_or_else(|| CompileError::MissingDefinition(name.to_string()))?;
        let category = self.category.clone();
        match self.definitions.iter_mut().find(|d| d.name == name) {
            Some(existing) => {
                existing.expr = expr;
                existing.category = category;
            }
            None => self.definitions.push(Definition {
                name: name.to_string(),
                expr,
                category,
            }),
        }
        Ok(())
    }

    /// `root` if defined, else the first rule, else the first definition.
    fn root_name(&self) -> Option<&str> {
        let defs = &self.definitions;
        defs.iter()
            .find(|d| d.name == "root")
            .or_else(|| defs.iter().find(|d| d.category == RULES))
            .or_else(|| defs.first())
            .map(|d| d.name.as_str())
    }

    fn into_grammar(mut self) -> Result<Pattern> {
        let root = self
            .root_name()
            .ok_or(ConstructionError::EmptyGrammar)?
            .to_string();
        let mut table = library()?.table();
        let definitions = std::mem::take(&mut self.definitions);
        for def in &definitions {
            self.category = def.category.clone();
            let body = self.expression(def.expr)?.into_pattern("=")?;
            let pattern = match def.category.as_str() {
                TOKENS => token(&body, Some(&def.name)),
                RULES => rule(&body, &def.name),
                _ => body,
            };
            table.define(def.name.clone(), pattern);
        }
        debug!(
            "compiled {} definitions, root '{}'",
            definitions.len(),
            root
        );
        table.set_root(root);
        Ok(Pattern::grammar(table)?)
    }

    // ─── Expressions ────────────────────────────────────────────────────────

    fn in_rules(&self) -> bool {
        self.category == RULES
    }

    fn expression(&self, ast: &Value) -> Result<Operand> {
        if let Some((kind, text)) = token_of(ast) {
            return literal(kind, text);
        }
        let items = &node(ast)?.items;
        match rule_of(ast) {
            Some("additive_expression") => self.additive(items),
            Some("and_expression") => self.sequence(items),
            Some("repetition_expression") => self.repetition(items),
            Some("function_call") => self.function_call(items),
            Some("primary_value" | "subexpression") => match items.as_slice() {
                [inner] => self.expression(inner),
                _ => Err(malformed(ast)),
            },
            _ => Err(malformed(ast)),
        }
    }

    /// `a + b` is ordered choice, `a - b` is difference; left-associative.
    fn additive(&self, items: &[Value]) -> Result<Operand> {
        let (first, rest) = items.split_first().ok_or_else(empty_chain)?;
        let mut acc = self.expression(first)?;
        for (op, rhs) in rest.iter().tuples() {
            let (function, choice) = match op.as_str() {
                Some("+") => ("+", true),
                Some("-") => ("-", false),
                _ => return Err(malformed(op)),
            };
            let lhs = acc.into_pattern(function)?;
            let rhs = self.expression(rhs)?.into_pattern(function)?;
            acc = Operand::Pattern(if choice { lhs.or(&rhs) } else { lhs.minus(&rhs) });
        }
        Ok(acc)
    }

    /// `a * b` is sequence. Under `rules:` whitespace may separate the operands.
    fn sequence(&self, items: &[Value]) -> Result<Operand> {
        let (first, rest) = items.split_first().ok_or_else(empty_chain)?;
        let mut acc = self.expression(first)?;
        for (op, rhs) in rest.iter().tuples() {
            if op.as_str() != Some("*") {
                return Err(malformed(op));
            }
            let mut lhs = acc.into_pattern("*")?;
            if self.in_rules() {
                lhs = lhs.then(&library()?.whitespace);
            }
            let rhs = self.expression(rhs)?.into_pattern("*")?;
            acc = Operand::Pattern(lhs.then(&rhs));
        }
        Ok(acc)
    }

    /// `p ^ n`. Under `rules:` each repetition may be followed by whitespace.
    fn repetition(&self, items: &[Value]) -> Result<Operand> {
        let (first, rest) = items.split_first().ok_or_else(empty_chain)?;
        let mut acc = self.expression(first)?;
        for (op, count) in rest.iter().tuples() {
            if op.as_str() != Some("^") {
                return Err(malformed(op));
            }
            let n = match self.expression(count)? {
                Operand::Int(n) => n,
                other => {
                    return Err(invalid("^", format!("count must be an integer, found {other:?}")));
                }
            };
            let mut body = acc.into_pattern("^")?;
            if self.in_rules() {
                body = body.then(&library()?.whitespace);
            }
            acc = Operand::Pattern(body.repeat(n));
        }
        Ok(acc)
    }

    fn function_call(&self, items: &[Value]) -> Result<Operand> {
        match items {
            [primary] => self.expression(primary),
            [callee, args] => {
                let name = identifier(callee)?;
                let args = node(args)?
                    .items
                    .iter()
                    .map(|arg| self.expression(arg))
                    .collect::<Result<Vec<_>>>()?;
                self.call(name, args).map(Operand::Pattern)
            }
            _ => Err(CompileError::MalformedTree(format!(
                "function call with {} parts",
                items.len()
            ))),
        }
    }

    fn call(&self, name: &str, args: Vec<Operand>) -> Result<Pattern> {
        let info = CALLABLES
            .get(name)
            .ok_or_else(|| CompileError::UnknownFunction(name.to_string()))?;
        if args.len() < info.min_args || args.len() > info.max_args {
            return Err(invalid(
                info.name,
                format!("wrong number of arguments ({})", args.len()),
            ));
        }
        let mut args = Args {
            function: info.name,
            items: args.into_iter(),
        };
        let pattern = match info.callable {
            Callable::Pattern => args.pattern()?,
            Callable::Rule => Pattern::rule(args.string()?),
            Callable::Set => {
                let members = args.strings()?;
                if members.len() == 1 {
                    Pattern::set(&members[0])?
                } else {
                    Pattern::set_of(members)?
                }
            }
            Callable::Range => {
                let pairs = args.strings()?;
                Pattern::range(&pairs.iter().map(String::as_str).collect_vec())?
            }
            Callable::Capture => args.pattern()?.capture(),
            Callable::Position => Pattern::position(),
            Callable::Constant => Pattern::const_capture(args.value()?),
            Callable::Table => args.pattern()?.table(),
            Callable::Group => {
                let p = args.pattern()?;
                match args.optional_string()? {
                    Some(name) => p.named(name),
                    None => p.group(),
                }
            }
            Callable::Substitute => args.pattern()?.substitute(),
            Callable::Format => {
                let p = args.pattern()?;
                p.format(args.string()?)
            }
            Callable::Function => {
                let p = args.pattern()?;
                let name = args.string()?;
                let f = self.functions.captures.get(&name).ok_or_else(|| {
                    invalid(info.name, format!("no capture function named '{name}'"))
                })?;
                p.transform(Transform::Function(f.clone()))
            }
            Callable::MatchTime => {
                let p = args.pattern()?;
                let name = args.string()?;
                let f = self.functions.match_time.get(&name).ok_or_else(|| {
                    invalid(info.name, format!("no match-time function named '{name}'"))
                })?;
                p.transform(Transform::MatchTime(f.clone()))
            }
            Callable::Token => token(&args.pattern()?, None),
        };
        Ok(pattern)
    }
}

fn empty_chain() -> CompileError {
    CompileError::MalformedTree("empty expression".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{create, create_with};
    use crate::pattern::matcher::MatchResult;

    fn compile_ok(text: &str) -> Pattern {
        create(text).unwrap()
    }

    fn compile_err(text: &str) -> CompileError {
        create(text).unwrap_err()
    }

    fn end(p: &Pattern, input: &str) -> Option<usize> {
        p.match_str(input).unwrap().and_then(|r| r.position())
    }

    fn captures(p: &Pattern, input: &str) -> Option<Vec<Value>> {
        p.match_str(input).unwrap().map(|r| r.captures().to_vec())
    }

    // --- Helpers ---

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#""a\"b""#), "a\"b");
        assert_eq!(unescape(r"'it\'s'"), "it's");
        assert_eq!(unescape(r#""\t\n\\""#), "\t\n\\");
        assert_eq!(unescape(r#""\q""#), "\\q");
        assert_eq!(unescape(r#""""#), "");
    }

    #[test]
    fn test_literal_tokens() {
        assert!(matches!(literal("number", "-12"), Ok(Operand::Int(-12))));
        assert!(matches!(literal("number", "1.5"), Ok(Operand::Float(x)) if x == 1.5));
        assert!(matches!(literal("bool", "false"), Ok(Operand::Bool(false))));
        assert!(matches!(literal("identifier", "x"), Ok(Operand::Pattern(_))));
        assert!(literal("number", "99999999999999999999").is_err());
    }

    // --- Operators ---

    #[test]
    fn test_choice_and_difference() {
        let p = compile_ok(r#"root = ("a" + "b") - "b";"#);
        assert_eq!(end(&p, "a"), Some(1));
        assert_eq!(end(&p, "b"), None);
    }

    #[test]
    fn test_precedence() {
        // * binds tighter than +, ^ tighter than *
        let p = compile_ok(r#"root = "a" * "b" ^ 1 + "c";"#);
        assert_eq!(end(&p, "abbb"), Some(4));
        assert_eq!(end(&p, "c"), Some(1));
        assert_eq!(end(&p, "a"), None);
    }

    #[test]
    fn test_operand_coercion() {
        let p = compile_ok(r#"root = 2 * true * "x";"#);
        assert_eq!(end(&p, "abx"), Some(3));
        let p = compile_ok("root = false + -1;");
        assert_eq!(end(&p, ""), Some(0));
        assert_eq!(end(&p, "a"), None);
    }

    #[test]
    fn test_single_literal_definition() {
        let p = compile_ok(r#"root = "hello";"#);
        assert_eq!(end(&p, "hello world"), Some(5));
    }

    // --- Categories ---

    #[test]
    fn test_rules_insert_whitespace() {
        let p = compile_ok(r#"rules: pair = "(" * "x" ^ 1 * ")";"#);
        let got = captures(&p, "( x x )").unwrap();
        let table = got[0].as_table().unwrap();
        assert_eq!(table.get("rule"), Some(&Value::from("pair")));
        assert!(table.items.is_empty());
    }

    #[test]
    fn test_tokens_are_tagged() {
        let text = r#"
            tokens: word = R("az") ^ 1;
            rules: root = word ^ 0;
        "#;
        let p = compile_ok(text);
        let got = captures(&p, "ab cd").unwrap();
        let root = got[0].as_table().unwrap();
        assert_eq!(root.items.len(), 2);
        let first = root.items[0].as_table().unwrap();
        assert_eq!(first.items, [Value::from("ab")]);
        assert_eq!(first.get("token"), Some(&Value::from("word")));
    }

    #[test]
    fn test_other_labels_are_anonymous() {
        let p = compile_ok(r#"helpers: root = "x" * "y";"#);
        assert_eq!(end(&p, "xy"), Some(2));
        assert_eq!(end(&p, "x y"), None);
    }

    // --- Root selection ---

    #[test]
    fn test_root_prefers_name_root() {
        let p = compile_ok(r#"a = "a"; rules: b = "b"; root = "r";"#);
        assert_eq!(end(&p, "r"), Some(1));
    }

    #[test]
    fn test_root_falls_back_to_first_rule() {
        let p = compile_ok(r#"a = "a"; rules: b = "b";"#);
        assert!(captures(&p, "b").is_some());
        assert_eq!(captures(&p, "a"), None);
    }

    #[test]
    fn test_redefinition_replaces_pattern() {
        let p = compile_ok(r#"x = "1"; y = "2"; x = "3";"#);
        assert_eq!(end(&p, "3"), Some(1));
        assert_eq!(end(&p, "1"), None);
    }

    #[test]
    fn test_user_definition_shadows_builtin() {
        let p = compile_ok(r#"root = digit ^ 1; digit = "x";"#);
        assert_eq!(end(&p, "xx1"), Some(2));
    }

    // --- Callables ---

    #[test]
    fn test_sets_and_ranges() {
        let p = compile_ok(r#"root = S("abc") * R("09", "az");"#);
        assert_eq!(end(&p, "b7"), Some(2));
        assert_eq!(end(&p, "bq"), Some(2));
        assert_eq!(end(&p, "d7"), None);
    }

    #[test]
    fn test_string_call_syntax() {
        let p = compile_ok(r#"root = S"xy" ^ 1;"#);
        assert_eq!(end(&p, "xyxz"), Some(3));
    }

    #[test]
    fn test_capture_callables() {
        let p = compile_ok(r#"root = Ct(Cg(C(R("az") ^ 1), "name") * "=" * Cg(Cc(7), "value"));"#);
        let got = captures(&p, "abc=").unwrap();
        let table = got[0].as_table().unwrap();
        assert_eq!(table.get("name"), Some(&Value::from("abc")));
        assert_eq!(table.get("value"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_group_without_captures() {
        let p = compile_ok(r#"root = Ct(Cg("ab", "k"));"#);
        let got = captures(&p, "ab").unwrap();
        let table = got[0].as_table().unwrap();
        assert_eq!(table.get("k"), Some(&Value::List(vec![])));

        let p = compile_ok(r#"root = Cg("ab");"#);
        assert_eq!(captures(&p, "ab"), Some(vec![Value::from("ab")]));
    }

    #[test]
    fn test_position_format_substitute() {
        let p = compile_ok(r#"root = "ab" * Cp();"#);
        assert_eq!(captures(&p, "ab"), Some(vec![Value::Int(2)]));

        let p = compile_ok(r#"root = Cstr(C(R("az") ^ 1) * "-" * C(R("az") ^ 1), "%2 %1");"#);
        assert_eq!(captures(&p, "ab-cd"), Some(vec![Value::from("cd ab")]));

        let p = compile_ok(r#"root = Cs((Cstr("a", "4") + 1) ^ 0);"#);
        assert_eq!(captures(&p, "banana"), Some(vec![Value::from("b4n4n4")]));
    }

    #[test]
    fn test_rule_reference_by_name() {
        let p = compile_ok(r#"root = V("other"); other = "o";"#);
        assert_eq!(end(&p, "o"), Some(1));
    }

    #[test]
    fn test_token_helper_coerces() {
        let p = compile_ok(r#"root = T("x") * T(1);"#);
        assert_eq!(end(&p, "xy"), Some(2));
    }

    #[test]
    fn test_registered_functions() {
        let mut functions = Functions::new();
        functions
            .capture("len", |args| vec![Value::from(args.end - args.start)])
            .match_time("even", |args| {
                let n: i64 = args.matched.as_str()?.parse().ok()?;
                (n % 2 == 0).then(Vec::new)
            });
        let p = create_with(r#"root = Cfunc(R("az") ^ 1, "len");"#, &functions).unwrap();
        assert_eq!(captures(&p, "abc"), Some(vec![Value::Int(3)]));

        let p = create_with(r#"root = Cmt(R("09") ^ 1, "even");"#, &functions).unwrap();
        assert_eq!(end(&p, "42"), Some(2));
        assert_eq!(end(&p, "43"), None);
        assert_eq!(
            p.match_str("42").unwrap(),
            Some(MatchResult::Position(2))
        );
    }

    // --- Errors ---

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            compile_err(r#"root = Q("x");"#),
            CompileError::UnknownFunction("Q".to_string())
        );
    }

    #[test]
    fn test_missing_definition() {
        assert_eq!(
            compile_err("x;"),
            CompileError::MissingDefinition("x".to_string())
        );
    }

    #[test]
    fn test_bad_arguments() {
        assert!(matches!(
            compile_err(r#"root = C("a", "b");"#),
            CompileError::InvalidArgument { function: "C", .. }
        ));
        assert!(matches!(
            compile_err("root = \"a\" ^ 1.5;"),
            CompileError::InvalidArgument { function: "^", .. }
        ));
        assert!(matches!(
            compile_err(r#"root = Cc(C("a"));"#),
            CompileError::InvalidArgument { function: "Cc", .. }
        ));
        assert!(matches!(
            compile_err(r#"root = Cfunc("a", "nope");"#),
            CompileError::InvalidArgument { function: "Cfunc", .. }
        ));
        assert!(matches!(
            compile_err("root = 1.5;"),
            CompileError::InvalidArgument { function: "=", .. }
        ));
    }

    #[test]
    fn test_construction_errors_surface() {
        assert_eq!(
            compile_err(r#"root = "";"#),
            CompileError::Construction(ConstructionError::EmptyLiteral)
        );
        assert_eq!(
            compile_err("root = 0;"),
            CompileError::Construction(ConstructionError::ZeroSkip)
        );
        assert_eq!(
            compile_err(r#"root = R("z");"#),
            CompileError::Construction(ConstructionError::EmptyRange)
        );
    }

    #[test]
    fn test_empty_grammar() {
        assert_eq!(
            compile_err("  "),
            CompileError::Construction(ConstructionError::EmptyGrammar)
        );
    }

    #[test]
    fn test_functions_debug_lists_names() {
        let mut functions = Functions::new();
        functions.capture("b", |_| Vec::new()).capture("a", |_| Vec::new());
        assert_eq!(
            format!("{functions:?}"),
            r#"Functions { captures: ["a", "b"], match_time: [] }"#
        );
    }
}
