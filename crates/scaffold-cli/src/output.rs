// Output formatting for plans and reports

use std::fmt::Write as _;
use std::path::PathBuf;

use scaffold_engine::{
    AppliedChange, ExecutionPlan, ExecutionReport, OperationKind, OperationStatus, RollbackReport,
};
use serde::Serialize;

use crate::hooks::HookResult;

/// Render a dry-run preview, one operation per line
pub fn format_plan(plan: &ExecutionPlan) -> String {
    let mut out = String::new();
    for summary in plan.preview() {
        let _ = match summary.kind {
            OperationKind::MkDir => writeln!(out, "mkdir  {}/", summary.path.display()),
            OperationKind::WriteFile => {
                let mut line = format!(
                    "write  {} ({} bytes)",
                    summary.path.display(),
                    summary.content_length.unwrap_or(0)
                );
                if let Some(mode) = summary.mode {
                    let _ = write!(line, " mode {:o}", mode);
                }
                writeln!(out, "{}", line)
            }
        };
    }
    let _ = writeln!(out, "{} operation(s)", plan.len());
    out
}

/// Render an execution report
pub fn format_report(report: &ExecutionReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        let line = match &outcome.status {
            OperationStatus::Applied(change) => {
                format!("{:<10} {}", change_label(change), outcome.target.display())
            }
            OperationStatus::Failed(failure) => {
                format!("{:<10} {}: {}", "failed", outcome.target.display(), failure)
            }
            OperationStatus::Pending => format!("{:<10} {}", "pending", outcome.target.display()),
        };
        let _ = writeln!(out, "{}", line);
        if let OperationStatus::Applied(AppliedChange::ReplacedFile {
            backup: Some(backup),
        }) = &outcome.status
        {
            let _ = writeln!(out, "{:<10} {}", "  backup", backup.display());
        }
    }

    let applied = report.applied().count();
    let pending = report.pending().count();
    if report.is_success() {
        let _ = writeln!(out, "{} operation(s) applied under {}", applied, report.root.display());
    } else {
        let _ = writeln!(
            out,
            "{} applied, 1 failed, {} pending under {}",
            applied,
            pending,
            report.root.display()
        );
    }
    out
}

/// Render a rollback report
pub fn format_rollback(report: &RollbackReport) -> String {
    let mut out = String::new();
    for path in &report.reverted {
        let _ = writeln!(out, "{:<10} {}", "reverted", path.display());
    }
    for (path, reason) in &report.retained {
        let _ = writeln!(out, "{:<10} {}: {}", "kept", path.display(), reason);
    }
    out
}

/// Render finished hooks with their captured output
pub fn format_hook_results(results: &[HookResult]) -> String {
    let mut out = String::new();
    for result in results {
        let _ = writeln!(out, "{:<10} {} ({} ms)", "hook", result.name, result.duration_ms);
        for line in result.stdout.lines() {
            let _ = writeln!(out, "  | {}", line);
        }
    }
    out
}

fn change_label(change: &AppliedChange) -> &'static str {
    match change {
        AppliedChange::CreatedDir => "created",
        AppliedChange::ExistingDir => "exists",
        AppliedChange::CreatedFile => "created",
        AppliedChange::ReplacedFile { .. } => "replaced",
    }
}

/// Machine-readable summary of an execution report
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    /// Output root
    pub root: PathBuf,
    /// Whether every operation was applied
    pub success: bool,
    /// Whether execution stopped because of cancellation
    pub cancelled: bool,
    /// Targets that were applied
    pub applied: Vec<PathBuf>,
    /// Failed target and reason, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<FailedOperation>,
    /// Targets never attempted
    pub pending: Vec<PathBuf>,
}

/// The operation that stopped execution
#[derive(Debug, Clone, Serialize)]
pub struct FailedOperation {
    /// Absolute target path
    pub path: PathBuf,
    /// Failure description
    pub reason: String,
}

impl From<&ExecutionReport> for ReportSummary {
    fn from(report: &ExecutionReport) -> Self {
        Self {
            root: report.root.clone(),
            success: report.is_success(),
            cancelled: report.was_cancelled(),
            applied: report.applied().map(|o| o.target.clone()).collect(),
            failed: report.failure().map(|(outcome, failure)| FailedOperation {
                path: outcome.target.clone(),
                reason: failure.to_string(),
            }),
            pending: report.pending().map(|o| o.target.clone()).collect(),
        }
    }
}

/// Print error message to stderr
pub fn print_error(msg: &str) {
    eprintln!("error: {}", msg);
}

/// Print warning message to stderr
pub fn print_warning(msg: &str) {
    eprintln!("warning: {}", msg);
}
