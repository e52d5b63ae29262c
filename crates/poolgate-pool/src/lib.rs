//! poolgate-pool — worker pool lifecycle management.
//!
//! `WorkerPool` owns both the worker registry and the OS process behind
//! every registered port. All reads and mutations go through a single
//! mutex so the dispatcher and the autoscaler can run on different
//! runtime threads without breaking the registry invariants.
//!
//! Process creation is behind the `WorkerSpawner` trait. The daemon uses
//! `CommandSpawner`, which launches `<program> [args...] <port>`; tests
//! substitute spawners that never touch the OS.

pub mod error;
pub mod pool;
pub mod process;

pub use error::{PoolError, PoolResult};
pub use pool::{WorkerClaim, WorkerPool};
pub use process::{CommandSpawner, WorkerProcess, WorkerSpawner};
