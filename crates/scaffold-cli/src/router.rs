// Command routing and dispatch

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::commands::apply::ApplyOptions;
use crate::commands::*;
use crate::error::CliResult;

/// Scaffold - materialize project skeletons from declarative YAML
#[derive(Parser, Debug)]
#[command(name = "scaffold")]
#[command(bin_name = "scaffold")]
#[command(about = "Materialize project skeletons from declarative YAML scaffolds")]
#[command(
    long_about = "Scaffold: generate directory trees from a YAML scaffold.\n\nA scaffold declares variables, a tree of directories and files with\n{{ placeholder }} templates, optional `when` conditions, and\npost-generation hooks.\n\nQuick start:\n  scaffold plan service.yaml --var name=demo\n  scaffold apply service.yaml --var name=demo -o ./out"
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the operations a scaffold would perform
    #[command(about = "Print the execution plan without touching the filesystem")]
    Plan {
        /// Path to the scaffold document
        #[arg(value_name = "SPEC")]
        spec: PathBuf,

        #[command(flatten)]
        vars: VariableArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Generate files from a scaffold
    #[command(about = "Build the plan, apply it, and run post-generation hooks")]
    Apply {
        /// Path to the scaffold document
        #[arg(value_name = "SPEC")]
        spec: PathBuf,

        /// Output directory (created if missing)
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,

        #[command(flatten)]
        vars: VariableArgs,

        /// Replace files that already exist
        #[arg(long)]
        overwrite: bool,

        /// Do not keep `.bak` copies of replaced files
        #[arg(long)]
        no_backup: bool,

        /// Undo applied operations if execution fails
        #[arg(long)]
        rollback_on_failure: bool,

        /// Do not run post-generation hooks
        #[arg(long)]
        skip_hooks: bool,

        /// Report format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

/// Routes parsed arguments to command handlers
pub struct CommandRouter;

impl CommandRouter {
    /// Parse CLI arguments and route to appropriate handler
    pub fn route() -> CliResult<()> {
        let cli = Cli::parse();

        crate::logging::init_logging(cli.verbose, cli.quiet);

        Self::execute(&cli)
    }

    /// Execute a command
    pub fn execute(cli: &Cli) -> CliResult<()> {
        match &cli.command {
            Commands::Plan { spec, vars, format } => {
                let cmd = PlanCommand::new(spec.clone(), vars.clone()).with_format(*format);
                cmd.execute()
            }
            Commands::Apply {
                spec,
                output,
                vars,
                overwrite,
                no_backup,
                rollback_on_failure,
                skip_hooks,
                format,
            } => {
                let cmd = ApplyCommand::new(spec.clone(), output.clone(), vars.clone())
                    .with_options(ApplyOptions {
                        overwrite: *overwrite,
                        backup: !*no_backup,
                        rollback_on_failure: *rollback_on_failure,
                        skip_hooks: *skip_hooks,
                        format: *format,
                    });
                cmd.execute()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_plan() {
        let cli = Cli::try_parse_from([
            "scaffold",
            "-vv",
            "plan",
            "service.yaml",
            "--var",
            "name=demo",
            "--var",
            "port=80",
            "--format",
            "json",
            "--no-global-defaults",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Plan { spec, vars, format } => {
                assert_eq!(spec, PathBuf::from("service.yaml"));
                assert_eq!(
                    vars.vars,
                    vec![
                        ("name".to_string(), "demo".to_string()),
                        ("port".to_string(), "80".to_string())
                    ]
                );
                assert!(vars.no_global_defaults);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_apply_defaults() {
        let cli = Cli::try_parse_from(["scaffold", "apply", "s.yaml", "-q"]).unwrap();

        assert!(cli.quiet);
        match cli.command {
            Commands::Apply {
                output,
                overwrite,
                no_backup,
                skip_hooks,
                ..
            } => {
                assert_eq!(output, PathBuf::from("."));
                assert!(!overwrite);
                assert!(!no_backup);
                assert!(!skip_hooks);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_malformed_var() {
        assert!(Cli::try_parse_from(["scaffold", "plan", "s.yaml", "--var", "novalue"]).is_err());
    }
}
