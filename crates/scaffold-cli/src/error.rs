// CLI error types and user-facing messages

use scaffold_engine::ScaffoldError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Scaffold(#[from] ScaffoldError),

    #[error("Missing required variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Interrupted: {0}")]
    Cancelled(String),

    #[error("Hook `{name}` failed: {message}")]
    Hook { name: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidArgument { message } => {
                format!(
                    "Invalid argument: {}\n\nRun 'scaffold --help' for usage information.",
                    message
                )
            }
            CliError::Io(e) => format!("File operation failed: {}", e),
            CliError::Config(msg) => {
                format!(
                    "Configuration error: {}\n\nCheck the file named by ${} or pass --no-global-defaults.",
                    msg,
                    crate::config::DEFAULTS_ENV
                )
            }
            CliError::Scaffold(e) => format!("Scaffold error: {}", e),
            CliError::MissingVariables(names) => {
                let flags: Vec<String> = names.iter().map(|n| format!("--var {}=...", n)).collect();
                format!(
                    "Missing required variables: {}\n\nProvide them with {}",
                    names.join(", "),
                    flags.join(" ")
                )
            }
            CliError::Execution(msg) => {
                format!(
                    "Execution failed: {}\n\nRe-run with --overwrite to replace existing files, or --rollback-on-failure to undo partial output.",
                    msg
                )
            }
            CliError::Cancelled(msg) => format!("Interrupted: {}", msg),
            CliError::Hook { name, message } => {
                format!(
                    "Post-generation hook '{}' failed: {}\n\nThe generated files were kept. Use --skip-hooks to skip hooks.",
                    name, message
                )
            }
            CliError::Serialization(e) => format!("Could not serialize output: {}", e),
        }
    }

    /// Get technical details for verbose mode
    pub fn technical_details(&self) -> String {
        format!("{:?}", self)
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument { .. } => 2,
            CliError::Cancelled(_) => 130,
            _ => 1,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
