//! Grammar-text compiler.
//!
//! Grammar text is parsed by a bootstrap grammar written with the pattern
//! combinators themselves. Its captures form a syntax tree of tagged tables
//! that the [`interpreter`](crate::interpreter) folds into a [`Pattern`].
//!
//! ```text
//! # comments run to the end of the line
//! tokens:
//!     number = R("09") ^ 1;
//! rules:
//!     root = number * ("+" * number) ^ 0;
//! ```
//!
//! Precedence, loosest first: `+`/`-` (choice / difference), `*`
//! (sequence), postfix `^n` (repetition), then function calls,
//! parenthesised expressions, identifiers and literals.

use log::debug;
use once_cell::sync::Lazy;

use crate::error::{CompileError, ConstructionError};
use crate::interpreter::{Functions, Interpreter};
use crate::pattern::Pattern;
use crate::pattern::builtins::{library, rule, token};
use crate::pattern::grammar::RuleTable;
use crate::pattern::matcher;
use crate::pattern::subject::Subject;
use crate::value::Value;

/// Compile grammar text into a pattern.
pub fn create(text: &str) -> Result<Pattern, CompileError> {
    create_with(text, &Functions::default())
}

/// Compile grammar text, resolving `Cfunc`/`Cmt` names through `functions`.
pub fn create_with(text: &str, functions: &Functions) -> Result<Pattern, CompileError> {
    let ast = parse_grammar_text(text)?;
    Interpreter::new(functions).compile(&ast)
}

/// Parse grammar text into its syntax tree without interpreting it.
pub fn parse_grammar_text(text: &str) -> Result<Value, CompileError> {
    let parser = BOOTSTRAP.as_ref().map_err(Clone::clone)?;
    let run = matcher::run(parser, &Subject::text(text), 0)?;
    let Some(matched) = run.matched else {
        let (line, column) = line_column(text, run.furthest);
        debug!("grammar text rejected at {line}:{column}");
        return Err(CompileError::Syntax { line, column });
    };
    matched
        .captures
        .into_iter()
        .next()
        .ok_or_else(|| CompileError::MalformedTree("no statement list".to_string()))
}

/// 1-based line and column of the character at `pos`.
fn line_column(text: &str, pos: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for ch in text.chars().take(pos) {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

static BOOTSTRAP: Lazy<Result<Pattern, ConstructionError>> = Lazy::new(bootstrap);

fn bootstrap() -> Result<Pattern, ConstructionError> {
    let lib = library()?;
    let p = Pattern::literal;
    let v = |name: &str| Pattern::rule(name);

    let comment = p("#")?.then(&p("\n")?.invert().repeat(0));
    let ws = lib.space.or(&comment).repeat(0);
    // `ws op ws`, capturing the operator
    let op = |o: &Pattern| ws.then(&o.capture()).then(&ws);

    let literal = v("number")
        .or(&v("doubleQuoteString"))
        .or(&v("singleQuoteString"))
        .or(&v("bool"));
    let subexpression = p("(")?
        .then(&ws)
        .then(&v("additive_expression"))
        .then(&ws)
        .then(&p(")")?);
    let primary_value = v("subexpression").or(&v("literal")).or(&v("identifier"));

    let argument = v("additive_expression").then(&ws);
    let argument_list = argument
        .then(&p(",")?.then(&ws).then(&argument).repeat(0))
        .repeat(-1);
    let function_args = p("(")?
        .then(&ws)
        .then(&argument_list)
        .then(&p(")")?)
        .or(&v("singleQuoteString"))
        .or(&v("doubleQuoteString"));
    let function_call = v("identifier")
        .then(&v("function_args"))
        .or(&v("primary_value"));

    let repetition_expression = v("function_call").then(&op(&p("^")?).then(&v("number")).repeat(0));
    let and_expression = v("repetition_expression")
        .then(&op(&p("*")?).then(&v("repetition_expression")).repeat(0));
    let additive_expression = v("and_expression")
        .then(&op(&p("+")?.or(&p("-")?)).then(&v("and_expression")).repeat(0));
    let assignment_expression = v("identifier")
        .then(&op(&p("=")?).then(&v("additive_expression")).repeat(-1));

    let expression_statement = v("assignment_expression").then(&ws).then(&p(";")?);
    let label_statement = v("identifier").then(&p(":")?);
    let statement_list = ws.then(
        &v("expression_statement")
            .or(&v("label_statement"))
            .then(&ws)
            .repeat(0),
    );

    let mut rules = RuleTable::with_root("statement_list");
    rules
        .define("statement_list", rule(&statement_list, "statement_list"))
        .define("label_statement", rule(&label_statement, "label_statement"))
        .define(
            "expression_statement",
            rule(&expression_statement, "expression_statement"),
        )
        .define(
            "assignment_expression",
            rule(&assignment_expression, "assignment_expression"),
        )
        .define(
            "additive_expression",
            rule(&additive_expression, "additive_expression"),
        )
        .define("and_expression", rule(&and_expression, "and_expression"))
        .define(
            "repetition_expression",
            rule(&repetition_expression, "repetition_expression"),
        )
        .define("function_call", rule(&function_call, "function_call"))
        .define("function_args", rule(&function_args, "function_args"))
        .define("primary_value", rule(&primary_value, "primary_value"))
        .define("subexpression", rule(&subexpression, "subexpression"))
        .define("literal", literal)
        .define("identifier", token(&lib.identifier, Some("identifier")))
        .define("number", token(&lib.float.or(&lib.integer), Some("number")))
        .define("doubleQuoteString", token(&lib.string, Some("doubleQuoteString")))
        .define(
            "singleQuoteString",
            token(&lib.single_quote_string, Some("singleQuoteString")),
        )
        .define("bool", token(&lib.bool, Some("bool")));

    Ok(Pattern::grammar(rules)?.then(&Pattern::skip(-1)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::matcher::MatchResult;
    use crate::value::Table;

    fn parse_ok(text: &str) -> Table {
        match parse_grammar_text(text).unwrap() {
            Value::Table(t) => t,
            other => panic!("expected a table, got {other}"),
        }
    }

    fn syntax_err(text: &str) -> (usize, usize) {
        match parse_grammar_text(text).unwrap_err() {
            CompileError::Syntax { line, column } => (line, column),
            other => panic!("expected a syntax error, got {other}"),
        }
    }

    fn rule_name(v: &Value) -> Option<&str> {
        v.as_table()?.get("rule")?.as_str()
    }

    /// Follow single-child rule nodes down to the first token.
    fn innermost(v: &Value) -> &Table {
        let t = v.as_table().unwrap();
        match t.items.first() {
            Some(child @ Value::Table(_)) if t.get("rule").is_some() => innermost(child),
            _ => t,
        }
    }

    // --- Parse tree ---

    #[test]
    fn test_statement_tree() {
        let list = parse_ok(r#"num = "1";"#);
        assert_eq!(list.get("rule"), Some(&Value::from("statement_list")));
        assert_eq!(list.items.len(), 1);

        let stmt = &list.items[0];
        assert_eq!(rule_name(stmt), Some("expression_statement"));
        let assignment = &stmt.as_table().unwrap().items[0];
        assert_eq!(rule_name(assignment), Some("assignment_expression"));

        let parts = &assignment.as_table().unwrap().items;
        assert_eq!(parts.len(), 3);
        assert_eq!(innermost(&parts[0]).items, [Value::from("num")]);
        assert_eq!(parts[1], Value::from("="));
        let literal = innermost(&parts[2]);
        assert_eq!(literal.get("token"), Some(&Value::from("doubleQuoteString")));
        assert_eq!(literal.items, [Value::from("\"1\"")]);
    }

    #[test]
    fn test_operators_are_captured() {
        let list = parse_ok(r#"x = "a" * "b" ^ 2 + "c";"#);
        let assignment = &list.items[0].as_table().unwrap().items[0];
        let additive = &assignment.as_table().unwrap().items[2];
        assert_eq!(rule_name(additive), Some("additive_expression"));
        let items = &additive.as_table().unwrap().items;
        assert_eq!(items.len(), 3);
        assert_eq!(items[1], Value::from("+"));
        let and = &items[0].as_table().unwrap().items;
        assert_eq!(and[1], Value::from("*"));
    }

    #[test]
    fn test_labels_and_comments() {
        let text = "# leading comment\ntokens: # trailing\n  a = 1;\n\nrules:\n";
        let list = parse_ok(text);
        let kinds: Vec<_> = list.items.iter().filter_map(rule_name).collect();
        assert_eq!(
            kinds,
            ["label_statement", "expression_statement", "label_statement"]
        );
    }

    #[test]
    fn test_bool_is_literal_not_identifier() {
        let list = parse_ok("x = true; y = trueish;");
        let value = |i: usize| {
            let assignment = &list.items[i].as_table().unwrap().items[0];
            innermost(&assignment.as_table().unwrap().items[2]).clone()
        };
        assert_eq!(value(0).get("token"), Some(&Value::from("bool")));
        assert_eq!(value(1).get("token"), Some(&Value::from("identifier")));
    }

    #[test]
    fn test_empty_text_parses() {
        assert!(parse_ok("").items.is_empty());
        assert!(parse_ok(" \n\t").items.is_empty());
    }

    // --- Syntax errors ---

    #[test]
    fn test_syntax_error_location() {
        assert_eq!(syntax_err("a = ;"), (1, 5));
        assert_eq!(syntax_err("a = \"x\";\nb = \"y\" +;"), (2, 10));
        assert_eq!(syntax_err("a = \"unterminated;"), (1, 19));
    }

    #[test]
    fn test_trailing_garbage_is_rejected() {
        assert!(matches!(
            parse_grammar_text("a = \"x\"; !"),
            Err(CompileError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            create("a = b = c;"),
            Err(CompileError::Syntax { .. })
        ));
    }

    #[test]
    fn test_line_column() {
        assert_eq!(line_column("ab\ncd", 0), (1, 1));
        assert_eq!(line_column("ab\ncd", 4), (2, 2));
        assert_eq!(line_column("ab", 10), (1, 3));
    }

    // --- End to end ---

    #[test]
    fn test_alternation_round_trip() {
        let num = create(r#"num = "1" + "2" + "3";"#).unwrap();
        assert_eq!(num.match_str("2").unwrap(), Some(MatchResult::Position(1)));
        assert_eq!(num.match_str("4").unwrap(), None);
    }

    #[test]
    fn test_greeting_scenario() {
        let text = r#"ws: space = " " ^0; rules: greeting = "hi" * ws * "there";"#;
        let greeting = create(text).unwrap();

        let subject = Subject::text("hi   there");
        let run = matcher::run(&greeting, &subject, 0).unwrap();
        let matched = run.matched.unwrap();
        assert_eq!(matched.end, 10);
        let tree = matched.captures[0].as_table().unwrap();
        assert_eq!(tree.get("rule"), Some(&Value::from("greeting")));

        // whitespace between rule operands may be empty
        assert!(greeting.match_str("hithere").unwrap().is_some());
        assert_eq!(greeting.match_str("hi there!").unwrap().map(|r| r.captures().len()), Some(1));
        assert_eq!(greeting.match_str("hello").unwrap(), None);
    }

    #[test]
    fn test_builtins_are_available() {
        let p = create("tokens: num = float + integer; rules: root = num ^ 1;").unwrap();
        let got = p.match_str("1.5 -2 0").unwrap().unwrap();
        let root = got.captures()[0].as_table().unwrap();
        let texts: Vec<_> = root
            .items
            .iter()
            .map(|t| t.as_table().unwrap().items[0].clone())
            .collect();
        assert_eq!(
            texts,
            [Value::from("1.5"), Value::from("-2"), Value::from("0")]
        );
    }

    #[test]
    fn test_recursive_grammar_text() {
        let text = r#"
            # balanced parentheses
            root = "(" * root ^ 0 * ")";
        "#;
        let p = create(text).unwrap();
        assert_eq!(p.match_str("(()(()))").unwrap(), Some(MatchResult::Position(8)));
        assert_eq!(p.match_str("(()").unwrap(), None);
    }

    #[test]
    fn test_undefined_rule_fails_at_match_time() {
        let p = create("root = missing;").unwrap();
        assert!(p.match_str("x").is_err());
    }
}
