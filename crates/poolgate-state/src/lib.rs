//! poolgate-state — the worker registry.
//!
//! Holds the authoritative, ordered set of worker ports and each one's
//! idle/busy flag. The registry itself is a plain data structure with no
//! interior locking; `poolgate-pool` wraps it in a mutex so that the
//! dispatcher, the autoscaler and the lifecycle manager observe a
//! consistent view.
//!
//! # Invariants
//!
//! - Every port in the ordered sequence has exactly one status entry,
//!   and every status entry has a port in the sequence.
//! - A port is never inserted twice while it is registered.

pub mod error;
pub mod registry;
pub mod types;

pub use error::{StateError, StateResult};
pub use registry::WorkerRegistry;
pub use types::{WorkerInstance, WorkerStatus};
