// Scaffold CLI library
// Command-line front end for the scaffold engine

pub mod commands;
pub mod config;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod output;
pub mod router;

pub use error::{CliError, CliResult};
pub use hooks::{HookResult, HookRunner};
pub use router::{Cli, CommandRouter, Commands};
