//! Error conversion helpers for store operations
//!
//! Provides an extension trait for attaching context to store errors.

use crate::application::{ApplicationError, ApplicationResult};
use crate::infrastructure::traits::StoreResult;

/// Extension trait for converting `StoreResult` to `ApplicationResult` with context.
pub trait StoreResultExt<T> {
    /// Add context to a store error.
    ///
    /// # Example
    /// ```ignore
    /// store.load(response).with_context("load response", response)?;
    /// ```
    fn with_context(self, action: &str, subject: impl std::fmt::Display) -> ApplicationResult<T>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn with_context(self, action: &str, subject: impl std::fmt::Display) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::OperationFailed {
            context: format!("{}: {}", action, subject),
            source: Box::new(e),
        })
    }
}
