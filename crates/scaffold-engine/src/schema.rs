//! Declared variable kinds used to type-check conditions

use std::collections::BTreeMap;

use crate::context::VariableContext;
use crate::value::ValueKind;

/// Mapping from top-level variable name to its declared kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableSchema {
    kinds: BTreeMap<String, ValueKind>,
}

impl VariableSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable, replacing any previous declaration
    pub fn declare(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.kinds.insert(name.into(), kind);
        self
    }

    /// Declared kind of `name`
    pub fn kind_of(&self, name: &str) -> Option<ValueKind> {
        self.kinds.get(name).copied()
    }

    /// Whether `name` is declared
    pub fn is_declared(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// Iterate declarations in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, ValueKind)> {
        self.kinds.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    /// Derive a schema from the values currently visible in a context
    pub fn from_context(context: &VariableContext) -> Self {
        let kinds = context
            .names()
            .into_iter()
            .filter_map(|name| {
                context
                    .resolve(name)
                    .ok()
                    .map(|value| (name.to_string(), value.kind()))
            })
            .collect();
        Self { kinds }
    }
}
