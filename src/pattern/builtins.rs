//! Built-in character classes and lexical patterns, plus the helpers used to
//! tag token and rule captures.
//!
//! The library is built once per process and merged into every grammar
//! produced by [`create`](crate::create), where its patterns are available
//! by name:
//!
//! | Name                | Matches                                          |
//! |---------------------|--------------------------------------------------|
//! | `space`             | one of space, tab, CR, LF                        |
//! | `whitespace`, `ws`  | any run of `space`, possibly empty               |
//! | `nonzero`, `zero`, `digit` | `1-9`, `0`, `0-9`                         |
//! | `char`, `idchar`    | an ASCII letter; a letter or `_`                 |
//! | `hexadecimalDigit`  | `0-9`, `a-f`, `A-F`                              |
//! | `bool`              | `true` or `false` as a whole word                |
//! | `integer`           | optional `-`, then `0` or a number without leading zeros |
//! | `fractional`        | any run of digits                                |
//! | `scientific`        | exponent part: `e`/`E`, optional sign, digits    |
//! | `float`             | `-.5`, `1.`, `1.25e-3` and similar               |
//! | `string`            | double-quoted string with escapes                |
//! | `singleQuoteString` | single-quoted string with escapes                |
//! | `stringEscapes`     | `\"` `\\` `\b` `\f` `\n` `\r` `\t`               |
//! | `identifier`        | `idchar` followed by `idchar` or digits          |

use once_cell::sync::Lazy;

use crate::error::ConstructionError;
use crate::value::Value;

use super::Pattern;
use super::grammar::RuleTable;

/// The built-in patterns, one field per library name.
#[derive(Debug, Clone)]
pub struct Library {
    pub space: Pattern,
    pub whitespace: Pattern,
    pub nonzero: Pattern,
    pub zero: Pattern,
    pub digit: Pattern,
    pub char: Pattern,
    pub idchar: Pattern,
    pub hexadecimal_digit: Pattern,
    pub bool: Pattern,
    pub integer: Pattern,
    pub fractional: Pattern,
    pub scientific: Pattern,
    pub float: Pattern,
    pub string: Pattern,
    pub single_quote_string: Pattern,
    pub string_escapes: Pattern,
    pub identifier: Pattern,
}

const ESCAPES: [&str; 7] = ["\\\"", "\\\\", "\\b", "\\f", "\\n", "\\r", "\\t"];

impl Library {
    fn build() -> Result<Self, ConstructionError> {
        let space = Pattern::set(" \t\r\n")?;
        let whitespace = space.repeat(0);
        let nonzero = Pattern::range(&["19"])?;
        let zero = Pattern::literal("0")?;
        let digit = Pattern::range(&["09"])?;
        let char = Pattern::range(&["az", "AZ"])?;
        let idchar = char.or(&Pattern::literal("_")?);
        let hexadecimal_digit = Pattern::range(&["09", "af", "AF"])?;

        let bool = Pattern::literal("false")?
            .or(&Pattern::literal("true")?)
            .then(&idchar.or(&digit).absent());

        let minus = Pattern::literal("-")?.repeat(-1);
        let integer = minus.then(&zero.or(&nonzero.then(&digit.repeat(0))));
        let fractional = digit.repeat(0);
        let scientific = Pattern::set("eE")?
            .then(&Pattern::set("-+")?.repeat(-1))
            .then(&fractional);
        let dot = Pattern::literal(".")?;
        let float = minus.then(
            &dot.then(&fractional).or(&integer
                .then(&dot)
                .then(&fractional.repeat(-1))
                .then(&scientific.repeat(-1))),
        );

        let string_escapes = any_literal(&ESCAPES)?;
        let string = quoted("\"", &string_escapes)?;
        let single_quote_string = quoted("'", &string_escapes.or(&Pattern::literal("\\'")?))?;

        let identifier = idchar.then(&idchar.or(&digit).repeat(0));

        Ok(Self {
            space,
            whitespace,
            nonzero,
            zero,
            digit,
            char,
            idchar,
            hexadecimal_digit,
            bool,
            integer,
            fractional,
            scientific,
            float,
            string,
            single_quote_string,
            string_escapes,
            identifier,
        })
    }

    /// The library as a rule table, keyed by the names grammar text uses.
    pub fn table(&self) -> RuleTable {
        let mut table = RuleTable::new();
        table
            .define("space", self.space.clone())
            .define("whitespace", self.whitespace.clone())
            .define("ws", self.whitespace.clone())
            .define("nonzero", self.nonzero.clone())
            .define("zero", self.zero.clone())
            .define("digit", self.digit.clone())
            .define("char", self.char.clone())
            .define("idchar", self.idchar.clone())
            .define("hexadecimalDigit", self.hexadecimal_digit.clone())
            .define("bool", self.bool.clone())
            .define("integer", self.integer.clone())
            .define("fractional", self.fractional.clone())
            .define("scientific", self.scientific.clone())
            .define("float", self.float.clone())
            .define("string", self.string.clone())
            .define("singleQuoteString", self.single_quote_string.clone())
            .define("stringEscapes", self.string_escapes.clone())
            .define("identifier", self.identifier.clone());
        table
    }
}

/// `quote (escapes | !quote .)* quote`
fn quoted(quote: &str, escapes: &Pattern) -> Result<Pattern, ConstructionError> {
    let quote = Pattern::literal(quote)?;
    let body = escapes.or(&quote.invert()).repeat(0);
    Ok(quote.then(&body).then(&quote))
}

/// Ordered choice over several literals.
fn any_literal(items: &[&str]) -> Result<Pattern, ConstructionError> {
    let mut alternatives = items.iter().map(|s| Pattern::literal(s));
    let first = alternatives.next().ok_or(ConstructionError::EmptySet)??;
    alternatives.try_fold(first, |acc, p| Ok(acc.or(&p?)))
}

static LIBRARY: Lazy<Result<Library, ConstructionError>> = Lazy::new(Library::build);

/// The process-wide built-in library.
pub fn library() -> Result<&'static Library, ConstructionError> {
    LIBRARY.as_ref().map_err(Clone::clone)
}

// ─── Tagging helpers ────────────────────────────────────────────────────────

/// A zero-width capture of `value` filed under `name`.
pub fn field(name: &str, value: impl Into<Value>) -> Pattern {
    Pattern::const_capture(value).named(name)
}

/// `p` followed by [`field`]`(name, value)`.
pub fn tag(p: &Pattern, name: &str, value: impl Into<Value>) -> Pattern {
    p.then(&field(name, value))
}

/// With a name, a table holding the matched text and `token = name`.
/// Without one, `p` itself.
pub fn token(p: &Pattern, name: Option<&str>) -> Pattern {
    match name {
        Some(name) => tag(&p.capture(), "token", name).table(),
        None => p.clone(),
    }
}

/// A table holding `p`'s captures and `rule = name`.
pub fn rule(p: &Pattern, name: &str) -> Pattern {
    tag(p, "rule", name).table()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::matcher::MatchResult;

    fn end(p: &Pattern, input: &str) -> Option<usize> {
        match p.match_str(input).unwrap()? {
            MatchResult::Position(pos) => Some(pos),
            MatchResult::Captures(_) => panic!("unexpected captures"),
        }
    }

    fn lib() -> &'static Library {
        library().unwrap()
    }

    #[test]
    fn whitespace_and_classes() {
        assert_eq!(end(&lib().whitespace, " \t\r\nx"), Some(4));
        assert_eq!(end(&lib().whitespace, "x"), Some(0));
        assert_eq!(end(&lib().hexadecimal_digit, "F"), Some(1));
        assert_eq!(end(&lib().hexadecimal_digit, "g"), None);
        assert_eq!(end(&lib().idchar, "_"), Some(1));
        assert_eq!(end(&lib().char, "_"), None);
    }

    #[test]
    fn integers() {
        let integer = &lib().integer;
        assert_eq!(end(integer, "0"), Some(1));
        assert_eq!(end(integer, "007"), Some(1));
        assert_eq!(end(integer, "-120x"), Some(4));
        assert_eq!(end(integer, "-"), None);
    }

    #[test]
    fn floats() {
        let float = &lib().float;
        assert_eq!(end(float, "1.25e-3;"), Some(7));
        assert_eq!(end(float, "-.5"), Some(3));
        assert_eq!(end(float, "3."), Some(2));
        assert_eq!(end(float, "3"), None);
    }

    #[test]
    fn bool_is_a_whole_word() {
        assert_eq!(end(&lib().bool, "true"), Some(4));
        assert_eq!(end(&lib().bool, "false)"), Some(5));
        assert_eq!(end(&lib().bool, "trueish"), None);
        assert_eq!(end(&lib().bool, "false2"), None);
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(end(&lib().string, r#""a\"b" rest"#), Some(6));
        assert_eq!(end(&lib().string, r#""unterminated"#), None);
        assert_eq!(end(&lib().single_quote_string, r"'it\'s'"), Some(7));
        assert_eq!(end(&lib().string_escapes, r"\n"), Some(2));
        assert_eq!(end(&lib().string_escapes, r"\q"), None);
    }

    #[test]
    fn identifiers() {
        assert_eq!(end(&lib().identifier, "_foo42 bar"), Some(6));
        assert_eq!(end(&lib().identifier, "4x"), None);
    }

    #[test]
    fn table_exposes_original_names() {
        let table = lib().table();
        assert!(table.contains("hexadecimalDigit"));
        assert!(table.contains("singleQuoteString"));
        assert!(table.contains("ws"));
        assert_eq!(table.root_name(), Some("space"));
    }

    #[test]
    fn token_and_rule_tables() {
        let digit = &lib().digit;
        let number = token(&digit.repeat(1), Some("number"));
        let got = number.match_str("42").unwrap().unwrap();
        let table = got.captures()[0].as_table().unwrap();
        assert_eq!(table.items, [Value::from("42")]);
        assert_eq!(table.get("token"), Some(&Value::from("number")));

        let pair = rule(&number.then(&number), "pair");
        let got = pair.match_str("1").unwrap();
        assert_eq!(got, None);

        let untagged = token(digit, None);
        assert_eq!(end(&untagged, "7"), Some(1));
    }
}
