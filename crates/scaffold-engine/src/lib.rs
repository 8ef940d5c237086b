#![warn(missing_docs)]

//! Project scaffolding engine
//!
//! Turns a declarative scaffold (a tree of named directories, template files
//! and literal files, each optionally gated by a condition) plus layered
//! variables into a deterministic [`ExecutionPlan`], and applies that plan to
//! the filesystem with enough bookkeeping to resume or roll back.
//!
//! The pipeline is:
//!
//! 1. [`ScaffoldLoader`] parses a YAML document into a [`Scaffold`]
//! 2. [`Scaffold::context`] layers scaffold defaults over caller globals;
//!    overrides are pushed on top with [`VariableContext::push_layer`]
//! 3. [`PlanBuilder::build`] evaluates conditions and renders names and
//!    contents into an [`ExecutionPlan`] (inspectable as a dry run)
//! 4. [`Executor::execute`] applies the plan and returns an
//!    [`ExecutionReport`]
//! 5. [`resolve_hooks`] turns the scaffold's post-generation hooks into
//!    commands for the caller to run

pub mod condition;
pub mod context;
pub mod error;
pub mod executor;
pub mod hooks;
pub mod loader;
pub mod node;
pub mod plan;
pub mod render;
pub mod schema;
pub mod value;

pub use condition::{Condition, ConditionError, ConditionEvaluator, ConditionSyntaxError};
pub use context::{UnboundVariable, VariableContext, VariablePath};
pub use error::{BuildError, Result, ScaffoldError};
pub use executor::{
    AppliedChange, CancellationToken, ExecutionFailure, ExecutionReport, Executor, ExecutorConfig,
    OperationOutcome, OperationStatus, RollbackReport,
};
pub use hooks::{resolve_hooks, HookInvocation, PostGenerationHook};
pub use loader::{Scaffold, ScaffoldLoader, VariableDeclaration};
pub use node::{FileSource, NodeKind, NodeSource, ScaffoldTree, TemplateNode};
pub use plan::{ExecutionPlan, Operation, OperationKind, OperationSummary, PlanBuilder};
pub use render::{Filter, RenderError, Renderer};
pub use schema::VariableSchema;
pub use value::{Value, ValueKind};
