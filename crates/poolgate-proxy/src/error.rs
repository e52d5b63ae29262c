//! Dispatcher error types.

use thiserror::Error;

/// Errors raised while forwarding a request to a worker.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to connect to worker on port {port}: {source}")]
    Connect {
        port: u16,
        source: std::io::Error,
    },

    #[error("HTTP handshake with worker failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("worker request failed: {0}")]
    Upstream(#[source] hyper::Error),
}

pub type ProxyResult<T> = Result<T, ProxyError>;
