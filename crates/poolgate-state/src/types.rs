//! Registry domain types.

use serde::{Deserialize, Serialize};

/// Occupancy flag of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
}

impl WorkerStatus {
    pub fn is_idle(self) -> bool {
        self == WorkerStatus::Idle
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Idle => write!(f, "idle"),
            WorkerStatus::Busy => write!(f, "busy"),
        }
    }
}

/// A point-in-time view of one registered worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInstance {
    pub port: u16,
    pub status: WorkerStatus,
}

impl WorkerInstance {
    pub fn new(port: u16, status: WorkerStatus) -> Self {
        Self { port, status }
    }

    /// Loopback address the worker listens on.
    pub fn endpoint(&self) -> String {
        format!("localhost:{}", self.port)
    }
}
