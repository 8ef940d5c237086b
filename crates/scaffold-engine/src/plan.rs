//! Execution plan construction
//!
//! [`PlanBuilder`] walks a [`ScaffoldTree`] depth-first in declared order,
//! evaluating conditions and rendering names and contents, and produces an
//! [`ExecutionPlan`]: an ordered list of filesystem operations with no side
//! effects. Directories always precede the files inside them and every path
//! appears at most once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::condition::{ConditionError, ConditionEvaluator};
use crate::context::VariableContext;
use crate::error::{BuildError, Result, ScaffoldError};
use crate::node::{child_path, NodeSource, ScaffoldTree, TemplateNode};
use crate::render::{RenderError, Renderer};

/// A single filesystem operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Create a directory
    MkDir {
        /// Path relative to the output root
        path: PathBuf,
    },
    /// Write a file
    WriteFile {
        /// Path relative to the output root
        path: PathBuf,
        /// Final file content
        content: String,
        /// Optional Unix permission bits
        mode: Option<u32>,
    },
}

impl Operation {
    /// Target path relative to the output root
    pub fn path(&self) -> &Path {
        match self {
            Operation::MkDir { path } | Operation::WriteFile { path, .. } => path,
        }
    }

    /// Operation kind
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::MkDir { .. } => OperationKind::MkDir,
            Operation::WriteFile { .. } => OperationKind::WriteFile,
        }
    }
}

/// Kind of an [`Operation`], used in previews
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Directory creation
    MkDir,
    /// File write
    WriteFile,
}

/// Dry-run view of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationSummary {
    /// Path relative to the output root
    pub path: PathBuf,
    /// Operation kind
    pub kind: OperationKind,
    /// Content length in bytes, for file writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,
    /// Unix mode, for file writes that set one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

/// Ordered, immutable list of operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    operations: Vec<Operation>,
}

impl ExecutionPlan {
    pub(crate) fn from_operations(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    /// Operations in execution order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Iterate operations in execution order
    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the plan is empty
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Dry-run preview: path, kind and content length of each operation
    pub fn preview(&self) -> Vec<OperationSummary> {
        self.operations
            .iter()
            .map(|op| match op {
                Operation::MkDir { path } => OperationSummary {
                    path: path.clone(),
                    kind: OperationKind::MkDir,
                    content_length: None,
                    mode: None,
                },
                Operation::WriteFile {
                    path,
                    content,
                    mode,
                } => OperationSummary {
                    path: path.clone(),
                    kind: OperationKind::WriteFile,
                    content_length: Some(content.len()),
                    mode: *mode,
                },
            })
            .collect()
    }

    /// Preview rendered as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.preview())?)
    }
}

impl<'a> IntoIterator for &'a ExecutionPlan {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// Builds execution plans from scaffold trees
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    base: PathBuf,
}

impl PlanBuilder {
    /// Create a builder whose paths start at the output root
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every planned path with `base` (relative to the output root)
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = base.into();
        self
    }

    /// Build a plan
    ///
    /// # Arguments
    /// * `tree` - Validated scaffold tree
    /// * `context` - Variables for conditions and placeholders
    ///
    /// # Returns
    /// The plan, or the first error encountered. No partial plan is returned.
    pub fn build(&self, tree: &ScaffoldTree, context: &VariableContext) -> Result<ExecutionPlan> {
        let mut walk = Walk {
            context,
            seen: HashSet::new(),
            operations: Vec::new(),
        };

        walk.visit(tree.root(), "", &self.base)?;

        info!(
            operations = walk.operations.len(),
            "Built execution plan"
        );
        Ok(ExecutionPlan::from_operations(walk.operations))
    }
}

struct Walk<'a> {
    context: &'a VariableContext,
    seen: HashSet<PathBuf>,
    operations: Vec<Operation>,
}

impl Walk<'_> {
    fn visit(&mut self, node: &TemplateNode, parent_pattern: &str, parent_out: &Path) -> Result<()> {
        let node_path = child_path(parent_pattern, node.name_pattern());

        if let Some(condition) = node.condition() {
            let included = ConditionEvaluator::evaluate(condition, self.context)
                .map_err(|e| condition_error(e, &node_path))?;
            if !included {
                debug!(node = %node_path, condition = %condition, "Pruned node");
                return Ok(());
            }
        }

        let name = Renderer::render(node.name_pattern(), self.context)
            .map_err(|e| render_error(e, &node_path, "name"))?;
        validate_segment(&name, &node_path)?;

        let out = parent_out.join(&name);
        if !self.seen.insert(out.clone()) {
            return Err(BuildError::DuplicatePath {
                path: out.display().to_string(),
                node: node_path,
            }
            .into());
        }

        match node.source() {
            NodeSource::Directory(children) => {
                debug!(node = %node_path, path = %out.display(), "Planned directory");
                self.operations.push(Operation::MkDir { path: out.clone() });
                for child in children {
                    self.visit(child, &node_path, &out)?;
                }
            }
            NodeSource::TemplateFile(file) => {
                let content = Renderer::render(&file.content, self.context)
                    .map_err(|e| render_error(e, &node_path, "content"))?;
                debug!(node = %node_path, path = %out.display(), bytes = content.len(), "Planned template file");
                self.operations.push(Operation::WriteFile {
                    path: out,
                    content,
                    mode: file.mode,
                });
            }
            NodeSource::LiteralFile(file) => {
                debug!(node = %node_path, path = %out.display(), "Planned literal file");
                self.operations.push(Operation::WriteFile {
                    path: out,
                    content: file.content.clone(),
                    mode: file.mode,
                });
            }
        }

        Ok(())
    }
}

fn validate_segment(segment: &str, node: &str) -> std::result::Result<(), BuildError> {
    let reason = if segment.is_empty() {
        Some("renders to an empty name")
    } else if segment == "." || segment == ".." {
        Some("renders to a relative path component")
    } else if segment.contains('/') || segment.contains('\\') {
        Some("contains a path separator")
    } else if segment.contains('\0') {
        Some("contains a NUL byte")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(BuildError::InvalidPathSegment {
            segment: segment.to_string(),
            node: node.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

pub(crate) fn condition_error(error: ConditionError, node: &str) -> ScaffoldError {
    match error {
        ConditionError::Unbound(unbound) => ScaffoldError::UnboundVariable {
            name: unbound.name,
            node: node.to_string(),
            offset: None,
        },
        ConditionError::TypeMismatch(message) => BuildError::ConditionType {
            node: node.to_string(),
            message,
        }
        .into(),
    }
}

pub(crate) fn render_error(error: RenderError, node: &str, field: &'static str) -> ScaffoldError {
    match error {
        RenderError::Unbound { name, offset } => ScaffoldError::UnboundVariable {
            name,
            node: node.to_string(),
            offset: Some(offset),
        },
        source => ScaffoldError::Render {
            node: node.to_string(),
            field,
            source,
        },
    }
}
