//! Error types.
//!
//! Ordinary match failure is not an error: it is the `Ok(None)` result of a
//! match call. The types here cover the fatal cases only.

use thiserror::Error;

/// Invalid arguments passed to a pattern constructor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("literal must not be empty")]
    EmptyLiteral,
    #[error("skip count must be non-zero")]
    ZeroSkip,
    #[error("character set must not be empty")]
    EmptySet,
    #[error("character range must not be empty")]
    EmptyRange,
    #[error("invalid character range {0:?}..{1:?}")]
    InvalidRange(char, char),
    #[error("grammar has no rules")]
    EmptyGrammar,
    #[error("grammar root '{0}' is not defined")]
    UndefinedRoot(String),
}

/// A grammar defect discovered while matching. Aborts the whole match call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("grammar has no definition for rule '{0}'")]
    UndefinedRule(String),
    #[error("table capture inside a substitution capture")]
    TableInSubstitution,
}

/// Failure to turn grammar text into a pattern.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("syntax error in grammar text at line {line}, column {column}")]
    Syntax { line: usize, column: usize },
    #[error("identifier expected")]
    ExpectedIdentifier,
    #[error("'{0}' is not an assignment")]
    MissingDefinition(String),
    #[error("invalid function name '{0}'")]
    UnknownFunction(String),
    #[error("invalid argument to {function}: {reason}")]
    InvalidArgument {
        function: &'static str,
        reason: String,
    },
    #[error("unexpected grammar tree node: {0}")]
    MalformedTree(String),
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    #[error(transparent)]
    Match(#[from] MatchError),
}
