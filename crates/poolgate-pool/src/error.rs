//! Pool lifecycle error types.

use thiserror::Error;

/// Errors that can occur while starting or stopping workers.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to spawn worker on port {port}: {source}")]
    Spawn {
        port: u16,
        source: std::io::Error,
    },

    #[error("port {0} is still held by a registered worker")]
    PortCollision(u16),

    #[error("registry error: {0}")]
    State(#[from] poolgate_state::StateError),
}

pub type PoolResult<T> = Result<T, PoolError>;
