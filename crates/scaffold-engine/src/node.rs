//! Template node model
//!
//! A [`TemplateNode`] mirrors one entry of the target file tree. Directories
//! own their children in declared order; files carry content and an optional
//! Unix mode. A [`ScaffoldTree`] wraps a validated root node together with the
//! schema its conditions were checked against.

use std::collections::HashSet;

use tracing::debug;

use crate::condition::Condition;
use crate::error::BuildError;
use crate::schema::VariableSchema;

/// Content and permissions of a file node
#[derive(Debug, Clone, PartialEq)]
pub struct FileSource {
    /// File content (rendered for template files, verbatim for literal files)
    pub content: String,
    /// Optional Unix permission bits
    pub mode: Option<u32>,
}

/// What a node produces
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSource {
    /// File copied verbatim
    LiteralFile(FileSource),
    /// File whose content is rendered
    TemplateFile(FileSource),
    /// Directory with ordered children
    Directory(Vec<TemplateNode>),
}

/// Discriminant of [`NodeSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Literal file
    LiteralFile,
    /// Template file
    TemplateFile,
    /// Directory
    Directory,
}

/// A node in the scaffold tree
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateNode {
    name: String,
    condition: Option<Condition>,
    source: NodeSource,
}

impl TemplateNode {
    /// Create a directory node
    pub fn directory(name: impl Into<String>, children: Vec<TemplateNode>) -> Self {
        Self {
            name: name.into(),
            condition: None,
            source: NodeSource::Directory(children),
        }
    }

    /// Create a template file node whose content is rendered
    pub fn template_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: None,
            source: NodeSource::TemplateFile(FileSource {
                content: content.into(),
                mode: None,
            }),
        }
    }

    /// Create a literal file node whose content is copied verbatim
    pub fn literal_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: None,
            source: NodeSource::LiteralFile(FileSource {
                content: content.into(),
                mode: None,
            }),
        }
    }

    /// Gate the node behind a condition, replacing any existing one
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Set the Unix mode of a file node; ignored for directories
    pub fn with_mode(mut self, mode: u32) -> Self {
        if let NodeSource::LiteralFile(file) | NodeSource::TemplateFile(file) = &mut self.source {
            file.mode = Some(mode);
        }
        self
    }

    /// Name pattern, possibly containing placeholders
    pub fn name_pattern(&self) -> &str {
        &self.name
    }

    /// Inclusion condition
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// Node kind
    pub fn kind(&self) -> NodeKind {
        match self.source {
            NodeSource::LiteralFile(_) => NodeKind::LiteralFile,
            NodeSource::TemplateFile(_) => NodeKind::TemplateFile,
            NodeSource::Directory(_) => NodeKind::Directory,
        }
    }

    /// Underlying source
    pub fn source(&self) -> &NodeSource {
        &self.source
    }

    /// Children of a directory; empty for files
    pub fn children(&self) -> &[TemplateNode] {
        match &self.source {
            NodeSource::Directory(children) => children,
            _ => &[],
        }
    }

    /// Content of a file node
    pub fn content(&self) -> Option<&str> {
        self.file().map(|f| f.content.as_str())
    }

    /// Mode of a file node
    pub fn mode(&self) -> Option<u32> {
        self.file().and_then(|f| f.mode)
    }

    fn file(&self) -> Option<&FileSource> {
        match &self.source {
            NodeSource::LiteralFile(file) | NodeSource::TemplateFile(file) => Some(file),
            NodeSource::Directory(_) => None,
        }
    }
}

/// Join a parent pattern path with a child name pattern
pub(crate) fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// A validated, read-only scaffold tree
#[derive(Debug, Clone)]
pub struct ScaffoldTree {
    root: TemplateNode,
    schema: VariableSchema,
}

impl ScaffoldTree {
    /// Validate a node tree
    ///
    /// # Arguments
    /// * `root` - Root node
    /// * `schema` - Declared variables conditions may reference
    ///
    /// # Returns
    /// The tree, or the first structural error found in pre-order
    pub fn new(root: TemplateNode, schema: VariableSchema) -> Result<Self, BuildError> {
        validate(&root, "", &schema)?;
        debug!(root = %root.name, "Validated scaffold tree");
        Ok(Self { root, schema })
    }

    /// Root node
    pub fn root(&self) -> &TemplateNode {
        &self.root
    }

    /// Schema conditions were checked against
    pub fn schema(&self) -> &VariableSchema {
        &self.schema
    }
}

fn validate(node: &TemplateNode, parent: &str, schema: &VariableSchema) -> Result<(), BuildError> {
    let path = child_path(parent, &node.name);

    if node.name.trim().is_empty() {
        return Err(BuildError::InvalidPathSegment {
            segment: node.name.clone(),
            node: path,
            reason: "name pattern is empty",
        });
    }

    if let Some(condition) = &node.condition {
        condition
            .check(schema)
            .map_err(|message| BuildError::ConditionType {
                node: path.clone(),
                message,
            })?;
    }

    let mut seen = HashSet::new();
    for child in node.children() {
        if !seen.insert(child.name.as_str()) {
            return Err(BuildError::DuplicateName {
                name: child.name.clone(),
                parent: path,
            });
        }
        validate(child, &path, schema)?;
    }

    Ok(())
}
