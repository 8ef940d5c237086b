//! Plan execution with partial-progress tracking and rollback
//!
//! The [`Executor`] applies an [`ExecutionPlan`] strictly in order and halts
//! at the first failure. The resulting [`ExecutionReport`] records every
//! operation as applied, failed, or still pending, which is enough to resume
//! (via [`ExecutionReport::remaining_plan`]) or undo (via
//! [`Executor::rollback`]) the run.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::plan::{ExecutionPlan, Operation};

const MAX_BACKUP_ATTEMPTS: usize = 100;

/// Configuration for plan execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Whether existing files may be replaced
    pub overwrite: bool,
    /// Whether replaced files are first copied to `<file>.bak`
    pub create_backups: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            create_backups: true,
        }
    }
}

/// Shared flag for cancelling an execution between operations
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Why an operation failed
#[derive(Debug, Error)]
pub enum ExecutionFailure {
    /// The target exists with the wrong type
    #[error("Path conflict at {path}: {reason}")]
    PathConflict {
        /// Filesystem path
        path: PathBuf,
        /// What is in the way
        reason: &'static str,
    },

    /// The target file exists and overwriting was not granted
    #[error("Refusing to overwrite existing file {path}")]
    OverwriteRefused {
        /// Filesystem path
        path: PathBuf,
    },

    /// Filesystem error
    #[error("IO error at {path}: {source}")]
    Io {
        /// Filesystem path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Execution was cancelled before this operation started
    #[error("Cancelled")]
    Cancelled,
}

/// What applying an operation changed on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedChange {
    /// A new directory was created
    CreatedDir,
    /// The directory already existed and was left alone
    ExistingDir,
    /// A new file was created
    CreatedFile,
    /// An existing file was replaced
    ReplacedFile {
        /// Copy of the original content, if backups were enabled
        backup: Option<PathBuf>,
    },
}

/// Per-operation state
#[derive(Debug)]
pub enum OperationStatus {
    /// Not attempted
    Pending,
    /// Applied successfully
    Applied(AppliedChange),
    /// Attempted and failed
    Failed(ExecutionFailure),
}

/// Outcome of one planned operation
#[derive(Debug)]
pub struct OperationOutcome {
    /// The planned operation
    pub operation: Operation,
    /// Absolute (root-joined) target path
    pub target: PathBuf,
    /// Final state
    pub status: OperationStatus,
}

/// Result of executing a plan
#[derive(Debug)]
pub struct ExecutionReport {
    /// Output root the plan was applied to
    pub root: PathBuf,
    /// One outcome per planned operation, in plan order
    pub outcomes: Vec<OperationOutcome>,
}

impl ExecutionReport {
    /// Whether every operation was applied
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o.status, OperationStatus::Applied(_)))
    }

    /// The failed operation and its cause, if any
    pub fn failure(&self) -> Option<(&OperationOutcome, &ExecutionFailure)> {
        self.outcomes.iter().find_map(|o| match &o.status {
            OperationStatus::Failed(failure) => Some((o, failure)),
            _ => None,
        })
    }

    /// Whether execution stopped because of cancellation
    pub fn was_cancelled(&self) -> bool {
        matches!(self.failure(), Some((_, ExecutionFailure::Cancelled)))
    }

    /// Applied operations, in plan order
    pub fn applied(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OperationStatus::Applied(_)))
    }

    /// Operations never attempted, in plan order
    pub fn pending(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OperationStatus::Pending))
    }

    /// Failed and pending operations as a new plan, for resuming
    pub fn remaining_plan(&self) -> ExecutionPlan {
        ExecutionPlan::from_operations(
            self.outcomes
                .iter()
                .filter(|o| !matches!(o.status, OperationStatus::Applied(_)))
                .map(|o| o.operation.clone())
                .collect(),
        )
    }
}

/// Result of rolling back an execution
#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Paths restored to their pre-execution state
    pub reverted: Vec<PathBuf>,
    /// Paths that could not be reverted, with the reason
    pub retained: Vec<(PathBuf, String)>,
}

impl RollbackReport {
    /// Whether every applied change was reverted
    pub fn is_complete(&self) -> bool {
        self.retained.is_empty()
    }
}

/// Applies execution plans to the filesystem
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    /// Create an executor with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor with custom configuration
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Execute a plan under `root`
    pub fn execute(&self, plan: &ExecutionPlan, root: &Path) -> ExecutionReport {
        self.execute_with_cancellation(plan, root, &CancellationToken::new())
    }

    /// Execute a plan under `root`, checking `token` before each operation
    ///
    /// # Arguments
    /// * `plan` - Plan to apply
    /// * `root` - Output root; planned paths are joined onto it
    /// * `token` - Cancellation flag
    ///
    /// # Returns
    /// A report with one outcome per planned operation. Execution stops at
    /// the first failure; later operations stay pending.
    pub fn execute_with_cancellation(
        &self,
        plan: &ExecutionPlan,
        root: &Path,
        token: &CancellationToken,
    ) -> ExecutionReport {
        let mut outcomes = Vec::with_capacity(plan.len());
        let mut halted = false;

        for operation in plan {
            let target = root.join(operation.path());

            let status = if halted {
                OperationStatus::Pending
            } else if token.is_cancelled() {
                halted = true;
                warn!(path = %target.display(), "Execution cancelled");
                OperationStatus::Failed(ExecutionFailure::Cancelled)
            } else {
                match self.apply(operation, &target) {
                    Ok(change) => {
                        debug!(path = %target.display(), change = ?change, "Applied operation");
                        OperationStatus::Applied(change)
                    }
                    Err(failure) => {
                        halted = true;
                        warn!(path = %target.display(), error = %failure, "Operation failed");
                        OperationStatus::Failed(failure)
                    }
                }
            };

            outcomes.push(OperationOutcome {
                operation: operation.clone(),
                target,
                status,
            });
        }

        let report = ExecutionReport {
            root: root.to_path_buf(),
            outcomes,
        };
        info!(
            applied = report.applied().count(),
            pending = report.pending().count(),
            success = report.is_success(),
            "Execution finished"
        );
        report
    }

    fn apply(&self, operation: &Operation, target: &Path) -> Result<AppliedChange, ExecutionFailure> {
        match operation {
            Operation::MkDir { .. } => make_dir(target),
            Operation::WriteFile { content, mode, .. } => {
                let change = self.write_file(target, content)?;
                match mode {
                    Some(mode) => settle(target, change, set_mode(target, *mode)),
                    None => Ok(change),
                }
            }
        }
    }

    fn write_file(&self, target: &Path, content: &str) -> Result<AppliedChange, ExecutionFailure> {
        match fs::metadata(target) {
            Ok(meta) if meta.is_dir() => Err(ExecutionFailure::PathConflict {
                path: target.to_path_buf(),
                reason: "a directory exists at the file path",
            }),
            Ok(_) => self.replace_file(target, content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                match OpenOptions::new().write(true).create_new(true).open(target) {
                    Ok(mut file) => {
                        let written = file
                            .write_all(content.as_bytes())
                            .map_err(|e| io_failure(target, e));
                        drop(file);
                        settle(target, AppliedChange::CreatedFile, written)
                    }
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                        self.replace_file(target, content)
                    }
                    Err(e) => Err(io_failure(target, e)),
                }
            }
            Err(e) => Err(io_failure(target, e)),
        }
    }

    fn replace_file(&self, target: &Path, content: &str) -> Result<AppliedChange, ExecutionFailure> {
        if !self.config.overwrite {
            return Err(ExecutionFailure::OverwriteRefused {
                path: target.to_path_buf(),
            });
        }

        let backup = if self.config.create_backups {
            let backup = create_backup(target)?;
            debug!(path = %target.display(), backup = %backup.display(), "Created backup");
            Some(backup)
        } else {
            None
        };

        let written = fs::write(target, content).map_err(|e| io_failure(target, e));
        settle(target, AppliedChange::ReplacedFile { backup }, written)
    }

    /// Undo the applied operations of a report, newest first
    ///
    /// Created files are removed, replaced files are restored from their
    /// backup, created directories are removed if empty. Pre-existing
    /// directories are never touched.
    pub fn rollback(&self, report: &ExecutionReport) -> RollbackReport {
        let mut result = RollbackReport::default();

        for outcome in report.outcomes.iter().rev() {
            let OperationStatus::Applied(change) = &outcome.status else {
                continue;
            };
            let target = &outcome.target;

            if *change == AppliedChange::ExistingDir {
                continue;
            }

            match revert(change, target) {
                Ok(()) => {
                    debug!(path = %target.display(), "Reverted");
                    result.reverted.push(target.clone());
                }
                Err(reason) => {
                    warn!(path = %target.display(), reason = %reason, "Could not revert");
                    result.retained.push((target.clone(), reason));
                }
            }
        }

        info!(
            reverted = result.reverted.len(),
            retained = result.retained.len(),
            "Rollback finished"
        );
        result
    }
}

fn make_dir(target: &Path) -> Result<AppliedChange, ExecutionFailure> {
    match fs::create_dir(target) {
        Ok(()) => Ok(AppliedChange::CreatedDir),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => match fs::metadata(target) {
            Ok(meta) if meta.is_dir() => Ok(AppliedChange::ExistingDir),
            Ok(_) => Err(ExecutionFailure::PathConflict {
                path: target.to_path_buf(),
                reason: "a file exists at the directory path",
            }),
            Err(e) => Err(io_failure(target, e)),
        },
        Err(e) => Err(io_failure(target, e)),
    }
}

fn revert(change: &AppliedChange, target: &Path) -> Result<(), String> {
    match change {
        AppliedChange::ExistingDir => Ok(()),
        AppliedChange::CreatedDir => fs::remove_dir(target).map_err(|e| e.to_string()),
        AppliedChange::CreatedFile => fs::remove_file(target).map_err(|e| e.to_string()),
        AppliedChange::ReplacedFile { backup: Some(backup) } => {
            fs::rename(backup, target).map_err(|e| e.to_string())
        }
        AppliedChange::ReplacedFile { backup: None } => {
            Err("file was replaced without a backup".to_string())
        }
    }
}

/// Keep `change` if the follow-up `step` succeeded, otherwise undo it so a
/// failed operation leaves nothing behind
fn settle(
    target: &Path,
    change: AppliedChange,
    step: Result<(), ExecutionFailure>,
) -> Result<AppliedChange, ExecutionFailure> {
    match step {
        Ok(()) => Ok(change),
        Err(failure) => {
            if let Err(reason) = revert(&change, target) {
                warn!(path = %target.display(), reason = %reason, "Could not discard partial write");
            }
            Err(failure)
        }
    }
}

/// Backup location for a replaced file: `<file>.bak` next to it
///
/// If that name is taken, the executor falls back to `<file>.bak.1`,
/// `<file>.bak.2`, and so on. Existing files are never overwritten.
pub fn backup_path(target: &Path) -> PathBuf {
    numbered_backup_path(target, 0)
}

fn numbered_backup_path(target: &Path, attempt: usize) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    if attempt > 0 {
        name.push(format!(".{}", attempt));
    }
    target.with_file_name(name)
}

fn create_backup(target: &Path) -> Result<PathBuf, ExecutionFailure> {
    let mut source = fs::File::open(target).map_err(|e| io_failure(target, e))?;
    let permissions = source
        .metadata()
        .map_err(|e| io_failure(target, e))?
        .permissions();

    for attempt in 0..MAX_BACKUP_ATTEMPTS {
        let backup = numbered_backup_path(target, attempt);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&backup) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(io_failure(&backup, e)),
        };

        let copied = io::copy(&mut source, &mut file)
            .and_then(|_| fs::set_permissions(&backup, permissions.clone()));
        drop(file);
        if let Err(e) = copied {
            let _ = fs::remove_file(&backup);
            return Err(io_failure(&backup, e));
        }
        return Ok(backup);
    }

    Err(ExecutionFailure::PathConflict {
        path: backup_path(target),
        reason: "no free backup file name",
    })
}

#[cfg(unix)]
fn set_mode(target: &Path, mode: u32) -> Result<(), ExecutionFailure> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(target, fs::Permissions::from_mode(mode)).map_err(|e| io_failure(target, e))
}

#[cfg(not(unix))]
fn set_mode(target: &Path, mode: u32) -> Result<(), ExecutionFailure> {
    debug!(path = %target.display(), mode, "Ignoring file mode on this platform");
    Ok(())
}

fn io_failure(path: &Path, source: io::Error) -> ExecutionFailure {
    ExecutionFailure::Io {
        path: path.to_path_buf(),
        source,
    }
}
