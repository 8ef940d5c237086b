// Global defaults and per-invocation variable overrides

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use scaffold_engine::{Scaffold, Value, VariableContext};
use tracing::{debug, info};

use crate::error::{CliError, CliResult};

/// Environment variable naming an explicit global defaults file
pub const DEFAULTS_ENV: &str = "SCAFFOLD_DEFAULTS";

/// Where global defaults come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultsSource {
    /// Named by `$SCAFFOLD_DEFAULTS`; must exist
    Explicit(PathBuf),
    /// The per-user config location; optional
    UserConfig(PathBuf),
}

impl DefaultsSource {
    /// Locate the defaults file
    pub fn locate() -> Option<Self> {
        if let Some(path) = std::env::var_os(DEFAULTS_ENV).filter(|p| !p.is_empty()) {
            return Some(DefaultsSource::Explicit(PathBuf::from(path)));
        }
        dirs::config_dir()
            .map(|dir| DefaultsSource::UserConfig(dir.join("scaffold").join("defaults.yaml")))
    }

    /// Path of the defaults file
    pub fn path(&self) -> &Path {
        match self {
            DefaultsSource::Explicit(path) | DefaultsSource::UserConfig(path) => path,
        }
    }
}

/// Load global defaults into the bottom context layer
///
/// # Arguments
/// * `source` - Where to read defaults from; `None` yields an empty context
///
/// # Returns
/// A context with a single `global` layer, or an empty context when the
/// user config file does not exist
pub fn load_global_defaults(source: Option<&DefaultsSource>) -> CliResult<VariableContext> {
    let path = match source {
        None => return Ok(VariableContext::new()),
        Some(DefaultsSource::UserConfig(path)) if !path.exists() => {
            debug!(path = %path.display(), "No global defaults file");
            return Ok(VariableContext::new());
        }
        Some(source) => source.path(),
    };

    let bindings = read_variables_file(path)?;
    info!(path = %path.display(), count = bindings.len(), "Loaded global defaults");
    VariableContext::new()
        .push_layer("global", bindings)
        .map_err(|e| CliError::Config(e.to_string()))
}

/// Read a YAML mapping of variable names to values
pub fn read_variables_file(path: &Path) -> CliResult<BTreeMap<String, Value>> {
    let text = fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let yaml: serde_yaml::Value = serde_yaml::from_str(&text)
        .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))?;
    let value = Value::try_from(yaml)
        .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))?;

    match value {
        Value::Mapping(map) => Ok(map),
        other => Err(CliError::Config(format!(
            "{}: expected a mapping of variables, found {}",
            path.display(),
            other.kind()
        ))),
    }
}

/// Parse a `KEY=VALUE` command-line override
pub fn parse_key_val(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", arg))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in `{}`", arg));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Build the full variable context for a scaffold
///
/// Layers, bottom to top: global defaults, scaffold defaults, the vars
/// file, then `--var` overrides. A name given twice with `--var` is rejected.
pub fn build_context(
    scaffold: &Scaffold,
    globals: &VariableContext,
    vars_file: Option<&Path>,
    overrides: &[(String, String)],
) -> CliResult<VariableContext> {
    let mut context = scaffold.context(globals)?;

    if let Some(path) = vars_file {
        let bindings = read_variables_file(path)?
            .into_iter()
            .map(|(name, value)| {
                let value = scaffold.check_override(&name, value)?;
                Ok((name, value))
            })
            .collect::<scaffold_engine::Result<Vec<_>>>()?;
        context = context
            .push_layer("vars-file", bindings)
            .map_err(scaffold_engine::ScaffoldError::from)?;
    }

    if !overrides.is_empty() {
        let bindings = overrides
            .iter()
            .map(|(name, raw)| Ok((name.clone(), scaffold.coerce_override(name, raw)?)))
            .collect::<scaffold_engine::Result<Vec<_>>>()?;
        context = context
            .push_layer("command-line", bindings)
            .map_err(scaffold_engine::ScaffoldError::from)?;
    }

    let missing: Vec<String> = scaffold
        .missing_variables(&context)
        .into_iter()
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(CliError::MissingVariables(missing));
    }

    Ok(context)
}
