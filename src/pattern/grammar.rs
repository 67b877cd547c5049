//! Named rule tables and the scope stack used to resolve rule references.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConstructionError;

use super::Pattern;

/// A named collection of patterns with a designated root rule.
///
/// Once wrapped by [`Pattern::grammar`] the table is frozen.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    order: Vec<String>,
    rules: HashMap<String, Pattern>,
    root: Option<String>,
}

impl RuleTable {
    /// An empty table whose root is the first rule defined.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Define (or redefine) a rule. Redefinition keeps the original order.
    pub fn define(&mut self, name: impl Into<String>, pattern: Pattern) -> &mut Self {
        let name = name.into();
        if self.rules.insert(name.clone(), pattern).is_none() {
            self.order.push(name);
        }
        self
    }

    pub fn set_root(&mut self, name: impl Into<String>) -> &mut Self {
        self.root = Some(name.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.rules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// The configured root name, or the first rule defined.
    pub fn root_name(&self) -> Option<&str> {
        self.root.as_deref().or_else(|| self.order.first().map(String::as_str))
    }

    pub fn root(&self) -> Option<&Pattern> {
        self.root_name().and_then(|name| self.get(name))
    }

    /// Rule names in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), ConstructionError> {
        match self.root_name() {
            None => Err(ConstructionError::EmptyGrammar),
            Some(root) if !self.contains(root) => {
                Err(ConstructionError::UndefinedRoot(root.to_string()))
            }
            Some(_) => Ok(()),
        }
    }
}

/// The grammar scopes in effect during a match, innermost last.
#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    scopes: Vec<Arc<RuleTable>>,
}

impl ScopeStack {
    pub fn push(&mut self, table: Arc<RuleTable>) {
        self.scopes.push(table);
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Find `name` in the innermost scope that defines it.
    pub fn resolve(&self, name: &str) -> Option<Pattern> {
        self.scopes
            .iter()
            .rev()
            .find_map(|table| table.get(name))
            .cloned()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}
