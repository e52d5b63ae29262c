//! poolgate-autoscale — occupancy-driven worker scaling.
//!
//! Every tick reads the worker pool and decides on at most one kind of
//! change.
//!
//! # Scaling Algorithm
//!
//! ```text
//! ceiling = min(logical cpus, max_workers)
//! idle    = ports currently Idle (snapshot taken before acting)
//!
//! if busy == size and size < ceiling:
//!     start one worker at base_port + size
//!
//! for port in idle:
//!     if size > 1: stop port
//! ```
//!
//! The idle set is captured once at the start of the tick, so a worker
//! started by the same tick is never considered for scale-down.

pub mod scaler;

pub use scaler::{Autoscaler, ScaleDecision, host_cpu_count};
