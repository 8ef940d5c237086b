//! Error types for the scaffolding engine
//!
//! Build-time failures abort planning and never produce a plan. Execution-time
//! failures live in [`crate::executor::ExecutionFailure`] and are recorded per
//! operation in the execution report instead of being returned.

use std::path::PathBuf;

use thiserror::Error;

use crate::render::RenderError;

/// Errors raised while loading a scaffold or building a plan
#[derive(Debug, Error)]
pub enum ScaffoldError {
    /// A placeholder or condition referenced a variable no layer binds
    #[error(
        "Unbound variable `{name}` in {node}{}",
        offset.map(|o| format!(" at offset {}", o)).unwrap_or_default()
    )]
    UnboundVariable {
        /// Dotted variable path that failed to resolve
        name: String,
        /// Pattern path of the node (or hook) being processed
        node: String,
        /// Character offset of the placeholder; `None` for conditions
        offset: Option<usize>,
    },

    /// Rendering a node name or file content failed
    #[error("Failed to render {field} of {node}: {source}")]
    Render {
        /// Pattern path of the node (or hook) being rendered
        node: String,
        /// Which field was rendered (`name`, `content`, `args`, ...)
        field: &'static str,
        /// Underlying render failure with its character offset
        #[source]
        source: RenderError,
    },

    /// Structural validation failed
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The scaffold document is malformed
    #[error("Invalid scaffold document: {0}")]
    Load(String),

    /// A file referenced by the scaffold document could not be read
    #[error("Failed to read {path}: {source}")]
    ReadFile {
        /// Path that was read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A variable override does not match its declaration
    #[error("Invalid value for variable `{name}`: {message}")]
    InvalidOverride {
        /// Variable name
        name: String,
        /// Why the value was rejected
        message: String,
    },

    /// Hooks were requested for an execution that did not fully succeed
    #[error("Post-generation hooks require a fully successful execution")]
    HooksBlocked,

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Structural errors detected while building a tree, context, or plan
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Two planned operations resolved to the same output path
    #[error("Duplicate output path `{path}` produced by {node}")]
    DuplicatePath {
        /// Rendered output path
        path: String,
        /// Pattern path of the second node producing it
        node: String,
    },

    /// A node name did not render to a single valid path segment
    #[error("Invalid path segment `{segment}` for {node}: {reason}")]
    InvalidPathSegment {
        /// Rendered segment
        segment: String,
        /// Pattern path of the node
        node: String,
        /// What is wrong with the segment
        reason: &'static str,
    },

    /// A condition does not produce a boolean
    #[error("Condition type error in {node}: {message}")]
    ConditionType {
        /// Pattern path of the node (or hook)
        node: String,
        /// Type error description
        message: String,
    },

    /// A condition failed to parse
    #[error("Condition syntax error in {node} at offset {offset} of `{condition}`: {message}")]
    ConditionSyntax {
        /// Pattern path of the node (or hook)
        node: String,
        /// Condition source text
        condition: String,
        /// Character offset of the error within the condition
        offset: usize,
        /// Parser message
        message: String,
    },

    /// Two siblings share the same name pattern
    #[error("Duplicate name pattern `{name}` under {parent}")]
    DuplicateName {
        /// Name pattern
        name: String,
        /// Pattern path of the parent directory
        parent: String,
    },

    /// A name was bound twice while building one context layer
    #[error("Variable `{name}` bound twice in layer `{layer}`")]
    DuplicateBinding {
        /// Variable name
        name: String,
        /// Layer label
        layer: String,
    },

    /// Template includes form a cycle
    #[error("Cyclic template include: {}", chain.join(" -> "))]
    CyclicInclude {
        /// Include chain, ending with the repeated template
        chain: Vec<String>,
    },
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, ScaffoldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_include_display() {
        let err = BuildError::CyclicInclude {
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "Cyclic template include: a -> b -> a");
    }

    #[test]
    fn test_unbound_display_includes_offset() {
        let err = ScaffoldError::UnboundVariable {
            name: "missing".to_string(),
            node: "root/a.txt".to_string(),
            offset: Some(3),
        };
        assert_eq!(err.to_string(), "Unbound variable `missing` in root/a.txt at offset 3");

        let err = ScaffoldError::UnboundVariable {
            name: "ci".to_string(),
            node: "root/ci.yml".to_string(),
            offset: None,
        };
        assert_eq!(err.to_string(), "Unbound variable `ci` in root/ci.yml");
    }

    #[test]
    fn test_build_error_is_transparent() {
        let err: ScaffoldError = BuildError::DuplicatePath {
            path: "demo/output".to_string(),
            node: "{{ name }}/output".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Duplicate output path `demo/output` produced by {{ name }}/output"
        );
    }
}
