//! Layered variable context
//!
//! A [`VariableContext`] is a stack of immutable name/value layers. Pushing a
//! layer returns a new context that shares the previous stack through an
//! [`Arc`], so earlier contexts stay valid and unchanged. Lookups walk from
//! the newest layer to the oldest and stop at the first match.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::BuildError;
use crate::value::Value;

/// A variable name could not be resolved in any layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unbound variable `{name}`")]
pub struct UnboundVariable {
    /// Dotted path that failed to resolve
    pub name: String,
}

/// Dotted reference to a (possibly nested) variable, e.g. `author.email`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariablePath {
    segments: Vec<String>,
}

impl VariablePath {
    /// Parse a dotted path
    ///
    /// Every segment must be an identifier (`[A-Za-z_][A-Za-z0-9_]*`).
    /// Returns `None` for anything else, including surrounding whitespace.
    pub fn parse(text: &str) -> Option<Self> {
        let segments: Vec<String> = text.split('.').map(str::to_string).collect();
        if segments.iter().all(|s| is_identifier(s)) {
            Some(Self { segments })
        } else {
            None
        }
    }

    /// The top-level variable name
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Field segments after the root
    pub fn fields(&self) -> &[String] {
        &self.segments[1..]
    }

    /// Whether the path is a bare top-level name
    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }
}

impl fmt::Display for VariablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug)]
struct Layer {
    label: String,
    bindings: BTreeMap<String, Value>,
    parent: Option<Arc<Layer>>,
}

/// Layered name/value bindings, most specific layer on top
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    top: Option<Arc<Layer>>,
}

impl VariableContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new layer on top of this context
    ///
    /// # Arguments
    /// * `label` - Human-readable layer name used in diagnostics
    /// * `bindings` - Name/value pairs for the new layer
    ///
    /// # Returns
    /// A new context whose parent is `self`, or
    /// [`BuildError::DuplicateBinding`] if a name appears twice in `bindings`
    pub fn push_layer<I>(&self, label: impl Into<String>, bindings: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let label = label.into();
        let mut layer = BTreeMap::new();

        for (name, value) in bindings {
            if layer.contains_key(&name) {
                return Err(BuildError::DuplicateBinding { name, layer: label });
            }
            layer.insert(name, value);
        }

        Ok(Self {
            top: Some(Arc::new(Layer {
                label,
                bindings: layer,
                parent: self.top.clone(),
            })),
        })
    }

    /// Resolve a top-level name
    pub fn resolve(&self, name: &str) -> Result<&Value, UnboundVariable> {
        self.layers()
            .find_map(|layer| layer.bindings.get(name))
            .ok_or_else(|| UnboundVariable {
                name: name.to_string(),
            })
    }

    /// Resolve a dotted path, walking into nested mappings
    pub fn resolve_path(&self, path: &VariablePath) -> Result<&Value, UnboundVariable> {
        let unbound = || UnboundVariable {
            name: path.to_string(),
        };

        let mut value = self.resolve(path.root()).map_err(|_| unbound())?;
        for field in path.fields() {
            value = value.get(field).ok_or_else(unbound)?;
        }
        Ok(value)
    }

    /// Whether the path resolves
    pub fn is_bound(&self, path: &VariablePath) -> bool {
        self.resolve_path(path).is_ok()
    }

    /// Label of the layer that provides `name`, if any
    pub fn layer_of(&self, name: &str) -> Option<&str> {
        self.layers()
            .find(|layer| layer.bindings.contains_key(name))
            .map(|layer| layer.label.as_str())
    }

    /// Number of layers
    pub fn depth(&self) -> usize {
        self.layers().count()
    }

    /// All bound top-level names, sorted
    pub fn names(&self) -> BTreeSet<&str> {
        self.layers()
            .flat_map(|layer| layer.bindings.keys().map(String::as_str))
            .collect()
    }

    fn layers(&self) -> impl Iterator<Item = &Layer> {
        std::iter::successors(self.top.as_deref(), |layer| layer.parent.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_newest_layer_wins() {
        let base = VariableContext::new()
            .push_layer("global", layer(&[("author", "anon".into()), ("year", Value::Integer(2024))]))
            .unwrap();
        let top = base
            .push_layer("user", layer(&[("author", "jo".into())]))
            .unwrap();

        assert_eq!(top.resolve("author").unwrap(), &Value::from("jo"));
        assert_eq!(top.resolve("year").unwrap(), &Value::Integer(2024));
        assert_eq!(top.layer_of("author"), Some("user"));
        assert_eq!(top.depth(), 2);
    }

    #[test]
    fn test_push_is_non_destructive() {
        let base = VariableContext::new()
            .push_layer("global", layer(&[("name", "a".into())]))
            .unwrap();
        let _top = base
            .push_layer("user", layer(&[("name", "b".into())]))
            .unwrap();

        assert_eq!(base.resolve("name").unwrap(), &Value::from("a"));
        assert_eq!(base.depth(), 1);
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let err = VariableContext::new()
            .push_layer("user", layer(&[("x", Value::Integer(1)), ("x", Value::Integer(2))]))
            .unwrap_err();

        assert_eq!(
            err,
            BuildError::DuplicateBinding {
                name: "x".to_string(),
                layer: "user".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_nested_path() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("{email: a@b.c}").unwrap();
        let ctx = VariableContext::new()
            .push_layer("user", vec![("author".to_string(), Value::try_from(yaml).unwrap())])
            .unwrap();

        let path = VariablePath::parse("author.email").unwrap();
        assert_eq!(ctx.resolve_path(&path).unwrap(), &Value::from("a@b.c"));

        let missing = VariablePath::parse("author.name").unwrap();
        assert_eq!(ctx.resolve_path(&missing).unwrap_err().name, "author.name");
    }

    #[test]
    fn test_unbound() {
        let ctx = VariableContext::new();
        assert_eq!(ctx.resolve("nope").unwrap_err().name, "nope");
        assert!(!ctx.is_bound(&VariablePath::parse("nope").unwrap()));
    }

    #[test]
    fn test_path_parsing() {
        assert!(VariablePath::parse("a.b_c.d1").is_some());
        assert!(VariablePath::parse("").is_none());
        assert!(VariablePath::parse("a..b").is_none());
        assert!(VariablePath::parse("1a").is_none());
        assert!(VariablePath::parse(" a").is_none());
        assert_eq!(VariablePath::parse("x.y").unwrap().to_string(), "x.y");
    }
}
