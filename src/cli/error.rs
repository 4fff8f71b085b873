//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) => crate::exitcode::USAGE,
            CliError::Infra(e) => match e {
                InfraError::Store(_) => crate::exitcode::IOERR,
                InfraError::Application(app) => match app {
                    ApplicationError::Config { .. } => crate::exitcode::CONFIG,
                    _ if app.is_corruption() => crate::exitcode::SOFTWARE,
                    _ if app.is_structural() => crate::exitcode::DATAERR,
                    ApplicationError::OperationFailed { .. } => crate::exitcode::IOERR,
                    _ => crate::exitcode::SOFTWARE,
                },
            },
        }
    }

    /// Corrupted state that needs an operator's attention.
    pub fn is_corruption(&self) -> bool {
        matches!(self, CliError::Infra(InfraError::Application(app)) if app.is_corruption())
    }
}
