//! End-to-end scaffold workflows
//!
//! Each test writes a scaffold document to a temporary directory and drives it
//! through loading, planning, execution, rollback, and hooks.

use std::fs;
use std::path::{Path, PathBuf};

use proptest::prelude::*;
use scaffold_cli::commands::apply::{ApplyCommand, ApplyOptions};
use scaffold_cli::commands::{PlanCommand, VariableArgs};
use scaffold_cli::CliError;
use scaffold_engine::executor::backup_path;
use scaffold_engine::{
    resolve_hooks, CancellationToken, Executor, ExecutorConfig, PlanBuilder, ScaffoldError,
    ScaffoldLoader, Value,
};
use tempfile::TempDir;

const SERVICE: &str = r##"
name: rust-service
description: Minimal Rust service
variables:
  name:
    type: string
    description: Crate name
  port:
    type: integer
    default: 8080
  features:
    type: sequence
    default: [http]
  ci:
    type: bool
    default: true
templates:
  ci:
    - dir: .github
      children:
        - dir: workflows
          children:
            - file: ci.yml
              content_file: files/ci.yml
root:
  dir: "{{ name | kebab }}"
  children:
    - file: Cargo.toml
      content_file: files/Cargo.toml
    - dir: src
      children:
        - file: main.rs
          content: "const PORT: u16 = {{ port }};\n"
        - file: grpc.rs
          when: "'grpc' in features"
          content: "// grpc\n"
    - literal: run.sh
      mode: "755"
      content: "#!/bin/sh\necho {{ not a placeholder }}\n"
    - include: ci
      when: ci
hooks:
  - name: mark
    command: sh
    args: ["-c", "echo {{ name | snake }} > .hooked"]
    working_dir: "{{ name | kebab }}"
    when: ci
"##;

fn write_scaffold(dir: &Path) -> PathBuf {
    fs::create_dir_all(dir.join("files")).unwrap();
    fs::write(
        dir.join("files/Cargo.toml"),
        "[package]\nname = \"{{ name | snake }}\"\n",
    )
    .unwrap();
    fs::write(dir.join("files/ci.yml"), "name: {{ name }} CI\n").unwrap();
    let spec = dir.join("scaffold.yaml");
    fs::write(&spec, SERVICE).unwrap();
    spec
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

fn relative_paths(plan: &scaffold_engine::ExecutionPlan) -> Vec<String> {
    plan.iter()
        .map(|op| op.path().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_plan_reflects_conditions_and_includes() {
    let temp = TempDir::new().unwrap();
    let spec = write_scaffold(temp.path());

    let plan = PlanCommand::new(spec.clone(), vars(&[("name", "My Service")]))
        .build()
        .unwrap();
    assert_eq!(
        relative_paths(&plan),
        vec![
            "my-service",
            "my-service/Cargo.toml",
            "my-service/src",
            "my-service/src/main.rs",
            "my-service/run.sh",
            "my-service/.github",
            "my-service/.github/workflows",
            "my-service/.github/workflows/ci.yml",
        ]
    );

    let plan = PlanCommand::new(
        spec,
        vars(&[("name", "svc"), ("ci", "false"), ("features", "[http, grpc]")]),
    )
    .build()
    .unwrap();
    assert_eq!(
        relative_paths(&plan),
        vec!["svc", "svc/Cargo.toml", "svc/src", "svc/src/main.rs", "svc/src/grpc.rs", "svc/run.sh"]
    );
}

#[cfg(unix)]
#[test]
fn test_apply_writes_rendered_tree_and_runs_hooks() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let spec = write_scaffold(temp.path());
    let out = temp.path().join("out");

    let report = ApplyCommand::new(spec, out.clone(), vars(&[("name", "My Service"), ("port", "9090")]))
        .run(&CancellationToken::new())
        .unwrap();

    assert!(report.is_success());
    let root = out.join("my-service");
    assert_eq!(
        fs::read_to_string(root.join("Cargo.toml")).unwrap(),
        "[package]\nname = \"my_service\"\n"
    );
    assert_eq!(
        fs::read_to_string(root.join("src/main.rs")).unwrap(),
        "const PORT: u16 = 9090;\n"
    );
    assert_eq!(
        fs::read_to_string(root.join("run.sh")).unwrap(),
        "#!/bin/sh\necho {{ not a placeholder }}\n"
    );
    let mode = fs::metadata(root.join("run.sh")).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
    assert_eq!(
        fs::read_to_string(root.join(".github/workflows/ci.yml")).unwrap(),
        "name: My Service CI\n"
    );
    assert_eq!(fs::read_to_string(root.join(".hooked")).unwrap(), "my_service\n");
}

#[test]
fn test_reapply_with_overwrite_keeps_backups() {
    let temp = TempDir::new().unwrap();
    let spec = write_scaffold(temp.path());
    let out = temp.path().join("out");
    let options = ApplyOptions {
        skip_hooks: true,
        ..ApplyOptions::default()
    };

    ApplyCommand::new(spec.clone(), out.clone(), vars(&[("name", "svc")]))
        .with_options(options.clone())
        .run(&CancellationToken::new())
        .unwrap();
    fs::write(out.join("svc/src/main.rs"), "// edited\n").unwrap();

    let refused = ApplyCommand::new(spec.clone(), out.clone(), vars(&[("name", "svc")]))
        .with_options(options.clone())
        .run(&CancellationToken::new())
        .unwrap_err();
    assert!(matches!(refused, CliError::Execution(_)));
    assert_eq!(fs::read_to_string(out.join("svc/src/main.rs")).unwrap(), "// edited\n");

    ApplyCommand::new(spec, out.clone(), vars(&[("name", "svc")]))
        .with_options(ApplyOptions {
            overwrite: true,
            ..options
        })
        .run(&CancellationToken::new())
        .unwrap();

    let main = out.join("svc/src/main.rs");
    assert_eq!(fs::read_to_string(&main).unwrap(), "const PORT: u16 = 8080;\n");
    assert_eq!(fs::read_to_string(backup_path(&main)).unwrap(), "// edited\n");
}

#[test]
fn test_engine_pipeline_with_rollback() {
    let temp = TempDir::new().unwrap();
    let spec = write_scaffold(temp.path());
    let out = TempDir::new().unwrap();

    let scaffold = ScaffoldLoader::load_file(&spec).unwrap();
    let overrides = vec![("name".to_string(), scaffold.coerce_override("name", "svc").unwrap())];
    let context = scaffold
        .context(&scaffold_engine::VariableContext::new())
        .unwrap()
        .push_layer("command-line", overrides)
        .unwrap();
    assert_eq!(context.resolve("port").unwrap(), &Value::Integer(8080));

    let plan = PlanBuilder::new().build(&scaffold.tree, &context).unwrap();
    let executor = Executor::with_config(ExecutorConfig::default());
    fs::create_dir_all(out.path().join("svc/src")).unwrap();
    fs::write(out.path().join("svc/src/main.rs"), "fn main() {}\n").unwrap();

    let report = executor.execute(&plan, out.path());
    assert!(!report.is_success());
    assert!(matches!(
        resolve_hooks(&scaffold.hooks, &context, &report),
        Err(ScaffoldError::HooksBlocked)
    ));

    let rollback = executor.rollback(&report);
    assert!(rollback.is_complete());
    assert!(!out.path().join("svc/Cargo.toml").exists());
    assert_eq!(
        fs::read_to_string(out.path().join("svc/src/main.rs")).unwrap(),
        "fn main() {}\n"
    );

    let resumed = executor.execute(&report.remaining_plan(), out.path());
    assert!(!resumed.is_success());
    assert_eq!(resumed.applied().count(), 0);
}

#[test]
fn test_missing_variable_is_reported_before_planning() {
    let temp = TempDir::new().unwrap();
    let spec = write_scaffold(temp.path());

    let err = PlanCommand::new(spec, vars(&[])).build().unwrap_err();

    assert!(matches!(err, CliError::MissingVariables(ref names) if names == &["name"]));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: loading and planning the same document twice yields identical JSON previews
    #[test]
    fn prop_loaded_plan_is_deterministic(name in r"[a-z][a-z0-9]{0,10}", ci in any::<bool>()) {
        let temp = TempDir::new().unwrap();
        let spec = write_scaffold(temp.path());
        let args = vars(&[("name", name.as_str()), ("ci", if ci { "true" } else { "false" })]);

        let first = PlanCommand::new(spec.clone(), args.clone()).build().unwrap();
        let second = PlanCommand::new(spec, args).build().unwrap();

        prop_assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
        prop_assert_eq!(first.len(), if ci { 8 } else { 5 });
    }
}
