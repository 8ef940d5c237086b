// Command handlers for the scaffold CLI

pub mod apply;
pub mod plan;

pub use apply::ApplyCommand;
pub use plan::PlanCommand;

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use scaffold_engine::{Scaffold, ScaffoldLoader, VariableContext};
use tracing::debug;

use crate::config::{self, DefaultsSource};
use crate::error::CliResult;

/// Trait for command handlers
pub trait Command {
    /// Execute the command
    fn execute(&self) -> CliResult<()>;
}

/// Output format for plans and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Variable sources shared by every subcommand
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableArgs {
    /// Set a variable (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = config::parse_key_val)]
    pub vars: Vec<(String, String)>,

    /// YAML file mapping variable names to values
    #[arg(long, value_name = "FILE")]
    pub vars_file: Option<PathBuf>,

    /// Ignore the global defaults file
    #[arg(long)]
    pub no_global_defaults: bool,
}

/// A loaded scaffold with its fully layered context
pub struct Prepared {
    /// The loaded scaffold
    pub scaffold: Scaffold,
    /// Globals, scaffold defaults and overrides
    pub context: VariableContext,
}

/// Load `spec` and build its variable context from `vars`
pub fn prepare(spec: &Path, vars: &VariableArgs) -> CliResult<Prepared> {
    let scaffold = ScaffoldLoader::load_file(spec)?;

    let source = if vars.no_global_defaults {
        None
    } else {
        DefaultsSource::locate()
    };
    let globals = config::load_global_defaults(source.as_ref())?;

    let context = config::build_context(
        &scaffold,
        &globals,
        vars.vars_file.as_deref(),
        &vars.vars,
    )?;
    debug!(
        scaffold = %scaffold.name,
        layers = context.depth(),
        "Prepared variable context"
    );

    Ok(Prepared { scaffold, context })
}
