// Apply command: build, execute, report, then run hooks

use std::fs;
use std::path::PathBuf;

use scaffold_engine::{
    resolve_hooks, CancellationToken, ExecutionReport, Executor, ExecutorConfig, PlanBuilder,
};
use tracing::{info, warn};

use crate::commands::{prepare, Command, OutputFormat, VariableArgs};
use crate::error::{CliError, CliResult};
use crate::hooks::HookRunner;
use crate::output::{self, ReportSummary};

/// Options controlling how a plan is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Replace existing files
    pub overwrite: bool,
    /// Keep a `.bak` copy of replaced files
    pub backup: bool,
    /// Undo applied operations when execution fails
    pub rollback_on_failure: bool,
    /// Do not run post-generation hooks
    pub skip_hooks: bool,
    /// Report format
    pub format: OutputFormat,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            backup: true,
            rollback_on_failure: false,
            skip_hooks: false,
            format: OutputFormat::Text,
        }
    }
}

/// Materialize a scaffold into an output directory
pub struct ApplyCommand {
    spec: PathBuf,
    output_dir: PathBuf,
    vars: VariableArgs,
    options: ApplyOptions,
}

impl ApplyCommand {
    /// Create a new apply command
    pub fn new(spec: PathBuf, output_dir: PathBuf, vars: VariableArgs) -> Self {
        Self {
            spec,
            output_dir,
            vars,
            options: ApplyOptions::default(),
        }
    }

    /// Set apply options
    pub fn with_options(mut self, options: ApplyOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the full pipeline with an explicit cancellation token
    ///
    /// # Returns
    /// The execution report when every operation and hook succeeded
    pub fn run(&self, token: &CancellationToken) -> CliResult<ExecutionReport> {
        let prepared = prepare(&self.spec, &self.vars)?;
        let plan = PlanBuilder::new().build(&prepared.scaffold.tree, &prepared.context)?;

        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(CliError::InvalidArgument {
                message: format!(
                    "output path {} exists and is not a directory",
                    self.output_dir.display()
                ),
            });
        }
        fs::create_dir_all(&self.output_dir)?;
        let root = fs::canonicalize(&self.output_dir)?;

        let executor = Executor::with_config(ExecutorConfig {
            overwrite: self.options.overwrite,
            create_backups: self.options.backup,
        });
        let report = executor.execute_with_cancellation(&plan, &root, token);
        self.print_report(&report)?;

        if let Some((outcome, failure)) = report.failure() {
            let message = format!("{}: {}", outcome.operation.path().display(), failure);

            if self.options.rollback_on_failure {
                warn!(root = %root.display(), "Rolling back partial output");
                let rollback = executor.rollback(&report);
                eprint!("{}", output::format_rollback(&rollback));
                if !rollback.is_complete() {
                    output::print_warning("some changes could not be rolled back");
                }
            }

            return Err(if report.was_cancelled() {
                CliError::Cancelled(format!(
                    "{} operation(s) were not applied",
                    report.pending().count() + 1
                ))
            } else {
                CliError::Execution(message)
            });
        }

        if self.options.skip_hooks {
            info!("Skipping post-generation hooks");
        } else {
            let invocations = resolve_hooks(&prepared.scaffold.hooks, &prepared.context, &report)?;
            let results = HookRunner::new().run_all(&invocations)?;
            info!(hooks = results.len(), "Post-generation hooks finished");
            // Keep JSON output a single document
            if self.options.format == OutputFormat::Text {
                print!("{}", output::format_hook_results(&results));
            }
        }

        Ok(report)
    }

    fn print_report(&self, report: &ExecutionReport) -> CliResult<()> {
        match self.options.format {
            OutputFormat::Text => print!("{}", output::format_report(report)),
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&ReportSummary::from(report))?
            ),
        }
        Ok(())
    }
}

impl Command for ApplyCommand {
    fn execute(&self) -> CliResult<()> {
        let token = CancellationToken::new();
        let handler_token = token.clone();
        if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
            warn!(error = %e, "Could not install Ctrl-C handler");
        }

        self.run(&token).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SPEC: &str = r##"
name: service
variables:
  name:
    type: string
  with_docs:
    type: bool
    default: false
root:
  dir: "{{ name }}"
  children:
    - file: README.md
      content: "# {{ name | title }}\n"
    - dir: docs
      when: with_docs
      children:
        - literal: index.md
          content: "{{ not rendered }}"
hooks:
  - name: marker
    command: sh
    args: ["-c", "touch hooked-{{ name }}"]
    working_dir: "{{ name }}"
"##;

    fn setup() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let spec = temp.path().join("scaffold.yaml");
        fs::write(&spec, SPEC).unwrap();
        (temp, spec)
    }

    fn vars(pairs: &[(&str, &str)]) -> VariableArgs {
        VariableArgs {
            vars: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            vars_file: None,
            no_global_defaults: true,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_apply_creates_tree_and_runs_hooks() {
        let (temp, spec) = setup();
        let out = temp.path().join("out");

        let report = ApplyCommand::new(spec, out.clone(), vars(&[("name", "my-app"), ("with_docs", "true")]))
            .run(&CancellationToken::new())
            .unwrap();

        assert!(report.is_success());
        assert_eq!(
            fs::read_to_string(out.join("my-app/README.md")).unwrap(),
            "# My App\n"
        );
        assert_eq!(
            fs::read_to_string(out.join("my-app/docs/index.md")).unwrap(),
            "{{ not rendered }}"
        );
        assert!(out.join("my-app/hooked-my-app").exists());
    }

    #[test]
    fn test_apply_refuses_overwrite_and_rolls_back() {
        let (temp, spec) = setup();
        let out = temp.path().join("out");
        fs::create_dir_all(out.join("demo")).unwrap();
        fs::write(out.join("demo/README.md"), "mine").unwrap();

        let err = ApplyCommand::new(spec, out.clone(), vars(&[("name", "demo")]))
            .with_options(ApplyOptions {
                rollback_on_failure: true,
                ..ApplyOptions::default()
            })
            .run(&CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, CliError::Execution(_)));
        assert_eq!(fs::read_to_string(out.join("demo/README.md")).unwrap(), "mine");
        assert!(out.join("demo").is_dir());
    }

    #[test]
    fn test_apply_cancelled_before_start() {
        let (temp, spec) = setup();
        let out = temp.path().join("out");
        let token = CancellationToken::new();
        token.cancel();

        let err = ApplyCommand::new(spec, out.clone(), vars(&[("name", "demo")]))
            .run(&token)
            .unwrap_err();

        assert!(matches!(err, CliError::Cancelled(_)));
        assert!(!out.join("demo").exists());
    }

    #[test]
    fn test_output_path_must_be_a_directory() {
        let (temp, spec) = setup();
        let out = temp.path().join("out");
        fs::write(&out, "not a dir").unwrap();

        let err = ApplyCommand::new(spec, out.clone(), vars(&[("name", "demo")]))
            .run(&CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, CliError::InvalidArgument { .. }));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(fs::read_to_string(&out).unwrap(), "not a dir");
    }

    #[test]
    fn test_apply_skip_hooks() {
        let (temp, spec) = setup();
        let out = temp.path().join("out");

        ApplyCommand::new(spec, out.clone(), vars(&[("name", "demo")]))
            .with_options(ApplyOptions {
                skip_hooks: true,
                ..ApplyOptions::default()
            })
            .run(&CancellationToken::new())
            .unwrap();

        assert!(out.join("demo/README.md").exists());
        assert!(!out.join("demo/docs").exists());
        assert!(!out.join("demo/hooked-demo").exists());
    }
}
