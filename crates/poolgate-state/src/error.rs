//! Error types for the worker registry.

use thiserror::Error;

/// Result type alias for registry operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during registry mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("port {0} is already registered")]
    DuplicatePort(u16),

    #[error("port {0} is not registered")]
    UnknownPort(u16),
}
