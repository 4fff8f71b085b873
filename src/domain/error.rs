//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::{NodeId, ResponseId};

/// Operations that would break the shape of a response tree.
///
/// These are refused, never repaired silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralViolation {
    #[error("node {node} cannot be placed under {parent}: it would become its own ancestor")]
    Cycle { node: NodeId, parent: NodeId },

    #[error("node {node} references missing parent {parent}")]
    DanglingParent { node: NodeId, parent: NodeId },

    #[error("mixed responses in one tree: expected {expected}, found {found}")]
    MixedResponses {
        expected: ResponseId,
        found: ResponseId,
    },

    #[error("node {0} is not a root node")]
    NotARoot(NodeId),

    #[error("duplicate node id: {0}")]
    DuplicateId(NodeId),

    #[error("no rank left for node {node}: sibling ranks reach the integer limit")]
    RankOverflow { node: NodeId },
}

/// Domain errors represent violations of the response tree model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("structural violation: {0}")]
    Structural(#[from] StructuralViolation),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("cycle detected in response tree at node {0}")]
    CycleDetected(NodeId),
}

impl DomainError {
    /// Corrupted state that retrying will not heal.
    pub fn is_corruption(&self) -> bool {
        matches!(self, DomainError::CycleDetected(_))
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
