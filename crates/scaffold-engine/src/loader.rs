//! Scaffold document loader
//!
//! Parses a YAML scaffold document into a validated [`ScaffoldTree`], the
//! variable declarations with their defaults, and the post-generation hooks.
//! Named templates are expanded in place at load time; an include stack
//! detects cycles.
//!
//! ```yaml
//! name: service
//! variables:
//!   project_name: { type: string, default: demo }
//! root:
//!   dir: "{{ project_name }}"
//!   children:
//!     - file: README.md
//!       content: "# {{ project_name }}\n"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::condition::Condition;
use crate::context::{is_identifier, VariableContext};
use crate::error::{BuildError, Result, ScaffoldError};
use crate::hooks::PostGenerationHook;
use crate::node::{child_path, ScaffoldTree, TemplateNode};
use crate::render::Renderer;
use crate::schema::VariableSchema;
use crate::value::{Value, ValueKind};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScaffoldDocument {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    variables: BTreeMap<String, VariableSpec>,
    #[serde(default)]
    templates: BTreeMap<String, Vec<NodeSpec>>,
    root: NodeSpec,
    #[serde(default)]
    hooks: Vec<HookSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VariableSpec {
    #[serde(rename = "type")]
    kind: ValueKind,
    #[serde(default)]
    default: Option<serde_yaml::Value>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeSpec {
    #[serde(default)]
    dir: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    literal: Option<String>,
    #[serde(default)]
    include: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    content_file: Option<String>,
    #[serde(default)]
    when: Option<String>,
    #[serde(default)]
    mode: Option<ModeSpec>,
    #[serde(default)]
    children: Vec<NodeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModeSpec {
    Number(u32),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HookSpec {
    name: String,
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    working_dir: Option<String>,
    #[serde(default)]
    when: Option<String>,
}

/// A declared scaffold variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    /// Declared kind
    pub kind: ValueKind,
    /// Scaffold-level default, already coerced to `kind`
    pub default: Option<Value>,
    /// Free-form description
    pub description: Option<String>,
}

/// A loaded scaffold: tree, variables, and hooks
#[derive(Debug, Clone)]
pub struct Scaffold {
    /// Scaffold name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Declared variables by name
    pub declarations: BTreeMap<String, VariableDeclaration>,
    /// Validated node tree
    pub tree: ScaffoldTree,
    /// Post-generation hooks, in declared order
    pub hooks: Vec<PostGenerationHook>,
}

impl Scaffold {
    /// Push the scaffold defaults layer over `globals`
    pub fn context(&self, globals: &VariableContext) -> Result<VariableContext> {
        let defaults = self
            .declarations
            .iter()
            .filter_map(|(name, decl)| decl.default.clone().map(|v| (name.clone(), v)));
        Ok(globals.push_layer(format!("scaffold:{}", self.name), defaults)?)
    }

    /// Convert command-line text into a value for `name`
    ///
    /// String variables keep `raw` verbatim. Other declared variables parse
    /// `raw` as YAML and must match their kind. Undeclared names infer their
    /// kind from YAML, falling back to a plain string.
    pub fn coerce_override(&self, name: &str, raw: &str) -> Result<Value> {
        match self.declarations.get(name) {
            Some(decl) if decl.kind == ValueKind::String => Ok(Value::String(raw.to_string())),
            Some(decl) => {
                let yaml: serde_yaml::Value =
                    serde_yaml::from_str(raw).map_err(|e| invalid_override(name, e.to_string()))?;
                let value = Value::try_from(yaml).map_err(|e| invalid_override(name, e.to_string()))?;
                coerce_kind(value, decl.kind).map_err(|message| invalid_override(name, message))
            }
            None => Ok(serde_yaml::from_str::<serde_yaml::Value>(raw)
                .ok()
                .and_then(|yaml| Value::try_from(yaml).ok())
                .unwrap_or_else(|| Value::String(raw.to_string()))),
        }
    }

    /// Check a typed override (e.g. from a YAML vars file) against its declaration
    pub fn check_override(&self, name: &str, value: Value) -> Result<Value> {
        match self.declarations.get(name) {
            Some(decl) => {
                coerce_kind(value, decl.kind).map_err(|message| invalid_override(name, message))
            }
            None => Ok(value),
        }
    }

    /// Declared variables that `context` does not bind
    pub fn missing_variables(&self, context: &VariableContext) -> Vec<&str> {
        self.declarations
            .keys()
            .filter(|name| context.resolve(name).is_err())
            .map(String::as_str)
            .collect()
    }
}

fn invalid_override(name: &str, message: String) -> ScaffoldError {
    ScaffoldError::InvalidOverride {
        name: name.to_string(),
        message,
    }
}

fn coerce_kind(value: Value, kind: ValueKind) -> std::result::Result<Value, String> {
    match (value, kind) {
        (Value::Integer(i), ValueKind::Float) => Ok(Value::Float(i as f64)),
        (value, kind) if value.kind() == kind => Ok(value),
        (value, kind) => Err(format!("expected {}, found {}", kind, value.kind())),
    }
}

/// Loads scaffold documents
#[derive(Debug, Clone)]
pub struct ScaffoldLoader {
    base_dir: PathBuf,
}

impl ScaffoldLoader {
    /// Create a loader resolving `content_file` paths against `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Load a document from disk, resolving files relative to its directory
    pub fn load_file(path: &Path) -> Result<Scaffold> {
        let text = fs::read_to_string(path).map_err(|source| ScaffoldError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::new(base_dir).load_str(&text)
    }

    /// Load a document from YAML text
    ///
    /// # Returns
    /// The scaffold, or the first load or validation error
    pub fn load_str(&self, yaml: &str) -> Result<Scaffold> {
        let document: ScaffoldDocument = serde_yaml::from_str(yaml)?;

        let declarations = declarations(&document.variables)?;
        let schema = declarations
            .iter()
            .fold(VariableSchema::new(), |schema, (name, decl)| {
                schema.declare(name.clone(), decl.kind)
            });

        let mut expander = Expander {
            base_dir: &self.base_dir,
            templates: &document.templates,
            schema: &schema,
            stack: Vec::new(),
        };

        let mut roots = expander.expand(&document.root, "")?;
        let root = match (roots.pop(), roots.is_empty()) {
            (Some(root), true) => root,
            _ => {
                return Err(ScaffoldError::Load(
                    "root must expand to exactly one node".to_string(),
                ))
            }
        };
        let tree = ScaffoldTree::new(root, schema.clone())?;

        let hooks = document
            .hooks
            .iter()
            .map(|spec| expander.hook(spec))
            .collect::<Result<Vec<_>>>()?;

        info!(
            scaffold = %document.name,
            variables = declarations.len(),
            hooks = hooks.len(),
            "Loaded scaffold"
        );

        Ok(Scaffold {
            name: document.name,
            description: document.description,
            declarations,
            tree,
            hooks,
        })
    }
}

fn declarations(
    specs: &BTreeMap<String, VariableSpec>,
) -> Result<BTreeMap<String, VariableDeclaration>> {
    let mut out = BTreeMap::new();

    for (name, spec) in specs {
        if !is_identifier(name) {
            return Err(ScaffoldError::Load(format!(
                "variable name `{}` is not an identifier",
                name
            )));
        }

        let default = match &spec.default {
            Some(yaml) => {
                let value = Value::try_from(yaml.clone()).map_err(|e| {
                    ScaffoldError::Load(format!("default for `{}`: {}", name, e))
                })?;
                Some(coerce_kind(value, spec.kind).map_err(|message| {
                    ScaffoldError::Load(format!("default for `{}`: {}", name, message))
                })?)
            }
            None => None,
        };

        out.insert(
            name.clone(),
            VariableDeclaration {
                kind: spec.kind,
                default,
                description: spec.description.clone(),
            },
        );
    }

    Ok(out)
}

struct Expander<'a> {
    base_dir: &'a Path,
    templates: &'a BTreeMap<String, Vec<NodeSpec>>,
    schema: &'a VariableSchema,
    stack: Vec<String>,
}

impl Expander<'_> {
    fn expand(&mut self, spec: &NodeSpec, parent: &str) -> Result<Vec<TemplateNode>> {
        let kinds = [&spec.dir, &spec.file, &spec.literal, &spec.include];
        if kinds.iter().filter(|k| k.is_some()).count() != 1 {
            return Err(ScaffoldError::Load(format!(
                "node under `{}` must set exactly one of dir, file, literal, include",
                display_parent(parent)
            )));
        }

        if let Some(template) = &spec.include {
            return self.include(template, spec, parent);
        }

        let node = match (&spec.dir, &spec.file, &spec.literal) {
            (Some(name), _, _) => {
                let path = child_path(parent, name);
                if spec.content.is_some() || spec.content_file.is_some() || spec.mode.is_some() {
                    return Err(ScaffoldError::Load(format!(
                        "directory `{}` cannot have content or mode",
                        path
                    )));
                }
                self.check_placeholders(name, &path, "name")?;

                let mut children = Vec::new();
                for child in &spec.children {
                    children.extend(self.expand(child, &path)?);
                }
                TemplateNode::directory(name.clone(), children)
            }
            (_, Some(name), _) => {
                let path = child_path(parent, name);
                let content = self.content(spec, &path)?;
                self.check_placeholders(name, &path, "name")?;
                self.check_placeholders(&content, &path, "content")?;
                TemplateNode::template_file(name.clone(), content)
            }
            (_, _, Some(name)) => {
                let path = child_path(parent, name);
                let content = self.content(spec, &path)?;
                self.check_placeholders(name, &path, "name")?;
                TemplateNode::literal_file(name.clone(), content)
            }
            (None, None, None) => return Ok(Vec::new()),
        };

        let path = child_path(parent, node.name_pattern());
        let node = match &spec.mode {
            Some(mode) => node.with_mode(parse_mode(mode, &path)?),
            None => node,
        };
        let node = match &spec.when {
            Some(when) => node.with_condition(parse_condition(when, &path)?),
            None => node,
        };

        Ok(vec![node])
    }

    fn include(&mut self, template: &str, spec: &NodeSpec, parent: &str) -> Result<Vec<TemplateNode>> {
        let label = format!("include `{}` under `{}`", template, display_parent(parent));
        if spec.content.is_some()
            || spec.content_file.is_some()
            || spec.mode.is_some()
            || !spec.children.is_empty()
        {
            return Err(ScaffoldError::Load(format!(
                "{} cannot have content, mode, or children",
                label
            )));
        }

        if self.stack.iter().any(|t| t == template) {
            let mut chain = self.stack.clone();
            chain.push(template.to_string());
            return Err(BuildError::CyclicInclude { chain }.into());
        }

        let specs = self
            .templates
            .get(template)
            .ok_or_else(|| ScaffoldError::Load(format!("{} names an unknown template", label)))?;
        let gate = spec
            .when
            .as_deref()
            .map(|when| parse_condition(when, &label))
            .transpose()?;

        debug!(template = %template, parent = %display_parent(parent), "Expanding include");
        self.stack.push(template.to_string());
        let mut nodes = Vec::new();
        for child in specs {
            nodes.extend(self.expand(child, parent)?);
        }
        self.stack.pop();

        Ok(match gate {
            Some(gate) => nodes
                .into_iter()
                .map(|node| {
                    let combined = match node.condition() {
                        Some(own) => gate.clone().and(own.clone()),
                        None => gate.clone(),
                    };
                    node.with_condition(combined)
                })
                .collect(),
            None => nodes,
        })
    }

    fn content(&self, spec: &NodeSpec, path: &str) -> Result<String> {
        if !spec.children.is_empty() {
            return Err(ScaffoldError::Load(format!("file `{}` cannot have children", path)));
        }

        match (&spec.content, &spec.content_file) {
            (Some(_), Some(_)) => Err(ScaffoldError::Load(format!(
                "file `{}` sets both content and content_file",
                path
            ))),
            (Some(content), None) => Ok(content.clone()),
            (None, Some(file)) => {
                let full = self.base_dir.join(file);
                fs::read_to_string(&full).map_err(|source| ScaffoldError::ReadFile {
                    path: full,
                    source,
                })
            }
            (None, None) => Ok(String::new()),
        }
    }

    fn hook(&self, spec: &HookSpec) -> Result<PostGenerationHook> {
        let label = format!("hook `{}`", spec.name);

        let condition = match &spec.when {
            Some(when) => {
                let condition = parse_condition(when, &label)?;
                condition
                    .check(self.schema)
                    .map_err(|message| BuildError::ConditionType {
                        node: label.clone(),
                        message,
                    })?;
                Some(condition)
            }
            None => None,
        };

        for arg in &spec.args {
            self.check_placeholders(arg, &label, "args")?;
        }
        if let Some(dir) = &spec.working_dir {
            self.check_placeholders(dir, &label, "working_dir")?;
        }

        Ok(PostGenerationHook {
            name: spec.name.clone(),
            command: spec.command.clone(),
            args: spec.args.clone(),
            working_dir: spec.working_dir.clone(),
            condition,
        })
    }

    /// Reject malformed placeholders early and warn about undeclared ones
    fn check_placeholders(&self, text: &str, node: &str, field: &'static str) -> Result<()> {
        let paths = Renderer::placeholders(text).map_err(|source| ScaffoldError::Render {
            node: node.to_string(),
            field,
            source,
        })?;

        for path in paths.iter().filter(|p| !self.schema.is_declared(p.root())) {
            warn!(
                variable = %path,
                node = %node,
                field = %field,
                "Placeholder references an undeclared variable"
            );
        }
        Ok(())
    }
}

fn display_parent(parent: &str) -> &str {
    if parent.is_empty() {
        "<root>"
    } else {
        parent
    }
}

fn parse_condition(source: &str, node: &str) -> Result<Condition> {
    Condition::parse(source).map_err(|e| {
        BuildError::ConditionSyntax {
            node: node.to_string(),
            condition: source.to_string(),
            offset: e.offset,
            message: e.message,
        }
        .into()
    })
}

/// Parse a file mode. Strings are octal (`"0755"`, `"0o644"`); integers are
/// read digit-for-digit as octal so `755` and `"0755"` agree.
fn parse_mode(mode: &ModeSpec, node: &str) -> Result<u32> {
    let digits = match mode {
        ModeSpec::Number(n) => n.to_string(),
        ModeSpec::Text(text) => text.trim().trim_start_matches("0o").to_string(),
    };

    match u32::from_str_radix(&digits, 8) {
        Ok(mode) if mode <= 0o7777 => Ok(mode),
        _ => Err(ScaffoldError::Load(format!(
            "invalid mode for `{}`: expected octal permission bits, got `{}`",
            node, digits
        ))),
    }
}
