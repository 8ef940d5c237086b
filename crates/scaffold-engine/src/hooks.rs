//! Post-generation hooks
//!
//! Hooks are external commands declared by a scaffold and run after a
//! successful execution (e.g. `git init`). The engine only resolves them into
//! concrete [`HookInvocation`]s; running them is left to the caller.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::condition::{Condition, ConditionEvaluator};
use crate::context::VariableContext;
use crate::error::{BuildError, Result, ScaffoldError};
use crate::executor::ExecutionReport;
use crate::plan::{condition_error, render_error};
use crate::render::Renderer;

/// A command declared by a scaffold to run after generation
#[derive(Debug, Clone, PartialEq)]
pub struct PostGenerationHook {
    /// Hook name, used in diagnostics
    pub name: String,
    /// Program to run
    pub command: String,
    /// Argument templates
    pub args: Vec<String>,
    /// Working directory template, relative to the output root
    pub working_dir: Option<String>,
    /// Optional gate
    pub condition: Option<Condition>,
}

/// A fully resolved command ready to be spawned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInvocation {
    /// Hook name
    pub name: String,
    /// Program to run
    pub program: String,
    /// Rendered arguments
    pub args: Vec<String>,
    /// Working directory (output root joined with the rendered `working_dir`)
    pub working_dir: PathBuf,
}

/// Resolve hooks against the context of a finished execution
///
/// # Arguments
/// * `hooks` - Declared hooks, in order
/// * `context` - Variables for conditions and argument templates
/// * `report` - Report of the execution the hooks follow
///
/// # Returns
/// Invocations for every hook whose condition holds, in declared order, or
/// [`ScaffoldError::HooksBlocked`] if the execution did not fully succeed
pub fn resolve_hooks(
    hooks: &[PostGenerationHook],
    context: &VariableContext,
    report: &ExecutionReport,
) -> Result<Vec<HookInvocation>> {
    if !report.is_success() {
        return Err(ScaffoldError::HooksBlocked);
    }

    let mut invocations = Vec::new();
    for hook in hooks {
        let label = format!("hook `{}`", hook.name);

        if let Some(condition) = &hook.condition {
            let enabled = ConditionEvaluator::evaluate(condition, context)
                .map_err(|e| condition_error(e, &label))?;
            if !enabled {
                debug!(hook = %hook.name, "Hook condition not met, skipping");
                continue;
            }
        }

        let args = hook
            .args
            .iter()
            .map(|arg| Renderer::render(arg, context).map_err(|e| render_error(e, &label, "args")))
            .collect::<Result<Vec<_>>>()?;

        let working_dir = match &hook.working_dir {
            Some(dir) => {
                let rendered = Renderer::render(dir, context)
                    .map_err(|e| render_error(e, &label, "working_dir"))?;
                validate_working_dir(&rendered, &label)?;
                report.root.join(rendered)
            }
            None => report.root.clone(),
        };

        debug!(hook = %hook.name, program = %hook.command, args = ?args, "Resolved hook");
        invocations.push(HookInvocation {
            name: hook.name.clone(),
            program: hook.command.clone(),
            args,
            working_dir,
        });
    }

    Ok(invocations)
}

fn validate_working_dir(dir: &str, hook: &str) -> std::result::Result<(), BuildError> {
    let escapes = dir.contains('\0')
        || Path::new(dir)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(BuildError::InvalidPathSegment {
            segment: dir.to_string(),
            node: hook.to_string(),
            reason: "working directory must stay inside the output root",
        });
    }
    Ok(())
}
