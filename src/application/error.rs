//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::{DomainError, NodeId, ResponseId, StructuralViolation};
use crate::infrastructure::traits::StoreError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("re-association of {root} from response {from} to {to} failed; subtree ownership is unverified")]
    PartialUpdate {
        root: NodeId,
        from: ResponseId,
        to: ResponseId,
        #[source]
        source: StoreError,
    },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    /// Corrupted state: must reach an operator, not a retry loop.
    pub fn is_corruption(&self) -> bool {
        match self {
            ApplicationError::Domain(e) => e.is_corruption(),
            ApplicationError::PartialUpdate { .. } => true,
            _ => false,
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ApplicationError::Domain(DomainError::Structural(_))
                | ApplicationError::Domain(DomainError::NodeNotFound(_))
        )
    }
}

impl From<StructuralViolation> for ApplicationError {
    fn from(v: StructuralViolation) -> Self {
        ApplicationError::Domain(v.into())
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
