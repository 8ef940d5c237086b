// Post-generation hook runner

use std::process::Command;
use std::time::Instant;

use scaffold_engine::HookInvocation;
use tracing::{debug, error, info};

use crate::error::{CliError, CliResult};

/// Outcome of a hook that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResult {
    /// Hook name
    pub name: String,
    /// Captured standard output
    pub stdout: String,
    /// Wall-clock duration
    pub duration_ms: u64,
}

/// Runs resolved hooks one after another
#[derive(Debug, Clone, Default)]
pub struct HookRunner;

impl HookRunner {
    /// Create a new hook runner
    pub fn new() -> Self {
        Self
    }

    /// Run every invocation in order, stopping at the first failure
    ///
    /// # Returns
    /// Results of all hooks, or the error of the first one that could not be
    /// spawned or exited non-zero
    pub fn run_all(&self, invocations: &[HookInvocation]) -> CliResult<Vec<HookResult>> {
        invocations.iter().map(|inv| self.run(inv)).collect()
    }

    /// Run a single invocation
    pub fn run(&self, invocation: &HookInvocation) -> CliResult<HookResult> {
        let start = Instant::now();

        debug!(
            hook = %invocation.name,
            program = %invocation.program,
            args = ?invocation.args,
            working_dir = %invocation.working_dir.display(),
            "Starting hook"
        );

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .output()
            .map_err(|e| {
                error!(hook = %invocation.name, error = %e, "Failed to spawn hook");
                CliError::Hook {
                    name: invocation.name.clone(),
                    message: format!("cannot run `{}`: {}", invocation.program, e),
                }
            })?;

        let duration_ms = start.elapsed().as_millis() as u64;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(
                hook = %invocation.name,
                status = %output.status,
                duration_ms = duration_ms,
                "Hook exited unsuccessfully"
            );
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                format!("exited with {}: {}", output.status, stderr)
            };
            return Err(CliError::Hook {
                name: invocation.name.clone(),
                message,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        info!(hook = %invocation.name, duration_ms = duration_ms, "Hook finished");
        debug!(hook = %invocation.name, stdout = %stdout.trim_end(), "Hook output");

        Ok(HookResult {
            name: invocation.name.clone(),
            stdout,
            duration_ms,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn invocation(name: &str, program: &str, args: &[&str], dir: &TempDir) -> HookInvocation {
        HookInvocation {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            working_dir: dir.path().to_path_buf(),
        }
    }

    #[test]
    fn test_runs_in_working_dir() {
        let temp = TempDir::new().unwrap();
        let result = HookRunner::new()
            .run(&invocation("touch", "sh", &["-c", "touch marker && echo done"], &temp))
            .unwrap();

        assert_eq!(result.stdout.trim(), "done");
        assert!(temp.path().join("marker").exists());
    }

    #[test]
    fn test_stops_at_first_failure() {
        let temp = TempDir::new().unwrap();
        let invocations = vec![
            invocation("fail", "sh", &["-c", "echo broken >&2; exit 3"], &temp),
            invocation("after", "sh", &["-c", "touch after"], &temp),
        ];

        let err = HookRunner::new().run_all(&invocations).unwrap_err();

        match err {
            CliError::Hook { name, message } => {
                assert_eq!(name, "fail");
                assert!(message.contains("broken"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!temp.path().join("after").exists());
    }

    #[test]
    fn test_missing_program() {
        let temp = TempDir::new().unwrap();
        let err = HookRunner::new()
            .run(&invocation("ghost", "definitely-not-a-real-program-xyz", &[], &temp))
            .unwrap_err();

        assert!(matches!(err, CliError::Hook { .. }));
    }
}
