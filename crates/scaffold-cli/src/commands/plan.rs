// Dry-run command: print what `apply` would do

use std::path::PathBuf;

use scaffold_engine::{ExecutionPlan, PlanBuilder};
use tracing::info;

use crate::commands::{prepare, Command, OutputFormat, VariableArgs};
use crate::error::CliResult;
use crate::output;

/// Build a plan and print its preview without touching the filesystem
pub struct PlanCommand {
    spec: PathBuf,
    vars: VariableArgs,
    format: OutputFormat,
}

impl PlanCommand {
    /// Create a new plan command
    pub fn new(spec: PathBuf, vars: VariableArgs) -> Self {
        Self {
            spec,
            vars,
            format: OutputFormat::Text,
        }
    }

    /// Set the output format
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Build the plan
    pub fn build(&self) -> CliResult<ExecutionPlan> {
        let prepared = prepare(&self.spec, &self.vars)?;
        let plan = PlanBuilder::new().build(&prepared.scaffold.tree, &prepared.context)?;
        info!(
            scaffold = %prepared.scaffold.name,
            operations = plan.len(),
            "Built plan"
        );
        Ok(plan)
    }

    /// Render the plan in the configured format
    pub fn render(&self, plan: &ExecutionPlan) -> CliResult<String> {
        match self.format {
            OutputFormat::Text => Ok(output::format_plan(plan)),
            OutputFormat::Json => Ok(format!("{}\n", plan.to_json()?)),
        }
    }
}

impl Command for PlanCommand {
    fn execute(&self) -> CliResult<()> {
        let plan = self.build()?;
        print!("{}", self.render(&plan)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SPEC: &str = r##"
name: readme
variables:
  project_name:
    type: string
root:
  dir: "{{ project_name }}"
  children:
    - file: README.md
      content: "# {{ project_name }}\n"
"##;

    fn args(name: &str) -> VariableArgs {
        VariableArgs {
            vars: vec![("project_name".to_string(), name.to_string())],
            vars_file: None,
            no_global_defaults: true,
        }
    }

    #[test]
    fn test_plan_text_and_json() {
        let temp = TempDir::new().unwrap();
        let spec = temp.path().join("scaffold.yaml");
        fs::write(&spec, SPEC).unwrap();

        let command = PlanCommand::new(spec.clone(), args("demo"));
        let plan = command.build().unwrap();

        assert_eq!(plan.len(), 2);
        assert!(command.render(&plan).unwrap().starts_with("mkdir  demo/\n"));

        let json = PlanCommand::new(spec, args("demo"))
            .with_format(OutputFormat::Json)
            .render(&plan)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[1]["path"], "demo/README.md");
        assert_eq!(parsed[1]["kind"], "write_file");
        assert_eq!(parsed[1]["content_length"], 7);
        assert!(!temp.path().join("demo").exists());
    }
}
