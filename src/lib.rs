//! PEG pattern matching with captures, and a compiler for textual grammars.
//!
//! # Example
//!
//! ```rust
//! use pegpat::{MatchResult, Pattern, Value, create};
//!
//! // Combinators
//! let digits = Pattern::range(&["09"]).unwrap().repeat(1);
//! let pair = digits.capture().then(&Pattern::literal(",").unwrap()).then(&digits.capture());
//! assert_eq!(
//!     pair.match_str("12,345").unwrap(),
//!     Some(MatchResult::Captures(vec![Value::from("12"), Value::from("345")]))
//! );
//!
//! // Grammar text
//! let num = create(r#"num = "1" + "2" + "3";"#).unwrap();
//! assert_eq!(num.match_str("2").unwrap(), Some(MatchResult::Position(1)));
//! assert_eq!(num.match_str("4").unwrap(), None);
//! ```

pub mod compiler;
pub mod error;
mod interpreter;
pub mod pattern;
pub mod value;

pub use compiler::{create, create_with, parse_grammar_text};
pub use error::{CompileError, ConstructionError, MatchError};
pub use interpreter::Functions;
pub use pattern::builtins::{field, library, rule, tag, token};
pub use pattern::grammar::RuleTable;
pub use pattern::matcher::{MatchResult, Matched};
pub use pattern::subject::Subject;
pub use pattern::{Node, Pattern, Transform, TransformArgs};
pub use value::{Table, Value};
