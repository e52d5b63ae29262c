//! Worker pool — registry plus the processes behind it.
//!
//! Starting a worker spawns its process, registers the port as `Idle`
//! and keeps the process handle. Stopping a worker sends a kill signal
//! and deregisters the port immediately; it does not wait for the
//! process to exit or for in-flight requests to finish.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use poolgate_state::{WorkerInstance, WorkerRegistry, WorkerStatus};

use crate::error::{PoolError, PoolResult};
use crate::process::{WorkerProcess, WorkerSpawner};

struct PoolState {
    registry: WorkerRegistry,
    processes: HashMap<u16, ManagedWorker>,
    next_generation: u64,
}

/// Process behind a registered port, tagged with the start that created it.
struct ManagedWorker {
    process: Box<dyn WorkerProcess>,
    generation: u64,
}

/// A worker marked `Busy` by `claim_idle`.
///
/// The generation tells apart two workers started on the same port, so a
/// claim outliving its worker cannot release a successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerClaim {
    pub port: u16,
    pub generation: u64,
}

/// Thread-safe handle to the worker pool. Cloning shares the same pool.
#[derive(Clone)]
pub struct WorkerPool {
    state: Arc<Mutex<PoolState>>,
    spawner: Arc<dyn WorkerSpawner>,
}

impl WorkerPool {
    pub fn new(spawner: Arc<dyn WorkerSpawner>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PoolState {
                registry: WorkerRegistry::new(),
                processes: HashMap::new(),
                next_generation: 0,
            })),
            spawner,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn a worker bound to `port` and register it as `Idle`.
    ///
    /// Refuses ports that are still registered; the previous holder keeps
    /// its entry and no process is spawned.
    pub fn start_worker(&self, port: u16) -> PoolResult<()> {
        let mut state = self.lock();
        if state.registry.contains(port) {
            return Err(PoolError::PortCollision(port));
        }

        let process = self
            .spawner
            .spawn(port)
            .map_err(|source| PoolError::Spawn { port, source })?;
        let pid = process.id();

        state.registry.insert(port)?;
        let generation = state.next_generation;
        state.next_generation += 1;
        state
            .processes
            .insert(port, ManagedWorker { process, generation });

        info!(
            port,
            pid = ?pid,
            generation,
            size = state.registry.len(),
            "worker started"
        );
        Ok(())
    }

    /// Kill the worker on `port` and deregister it.
    ///
    /// Returns `false` if no such worker is registered.
    pub fn stop_worker(&self, port: u16) -> bool {
        let mut state = self.lock();
        let Some(mut worker) = state.processes.remove(&port) else {
            debug!(port, "stop requested for unknown worker");
            return false;
        };

        if let Err(e) = worker.process.kill() {
            warn!(port, error = %e, "failed to signal worker process");
        }
        let last_status = state.registry.remove(port);

        info!(
            port,
            status = ?last_status,
            size = state.registry.len(),
            "worker stopped"
        );
        true
    }

    /// Mark the first idle worker (creation order) `Busy` and claim it.
    pub fn claim_idle(&self) -> Option<WorkerClaim> {
        let mut state = self.lock();
        debug_assert!(
            !state.registry.is_empty(),
            "dispatch against an empty worker pool"
        );

        let port = state.registry.first_idle()?;
        let generation = state.processes.get(&port)?.generation;
        state.registry.set_status(port, WorkerStatus::Busy).ok()?;
        Some(WorkerClaim { port, generation })
    }

    /// Mark a claimed worker `Idle` again.
    ///
    /// Ignored when the worker was stopped in the meantime, including when
    /// another worker has since been started on the same port.
    pub fn release(&self, claim: WorkerClaim) {
        let mut state = self.lock();
        let current = state.processes.get(&claim.port).map(|w| w.generation);
        if current != Some(claim.generation) {
            debug!(
                port = claim.port,
                generation = claim.generation,
                "released worker is no longer registered"
            );
            return;
        }
        // Registry and process table share their key set.
        let _ = state.registry.set_status(claim.port, WorkerStatus::Idle);
    }

    /// Ordered view of every registered worker.
    pub fn snapshot(&self) -> Vec<WorkerInstance> {
        self.lock().registry.list()
    }

    pub fn status_of(&self, port: u16) -> Option<WorkerStatus> {
        self.lock().registry.status_of(port)
    }

    pub fn len(&self) -> usize {
        self.lock().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().registry.is_empty()
    }

    pub fn busy_count(&self) -> usize {
        self.lock().registry.busy_count()
    }

    /// Registry and process table agree on the same set of ports.
    pub fn is_consistent(&self) -> bool {
        let state = self.lock();
        state.registry.is_consistent()
            && state.processes.len() == state.registry.len()
            && state
                .processes
                .keys()
                .all(|port| state.registry.contains(*port))
    }

    /// Kill every worker. Used when the daemon exits.
    pub fn shutdown(&self) {
        let ports: Vec<u16> = self.snapshot().iter().map(|w| w.port).collect();
        for port in &ports {
            self.stop_worker(*port);
        }
        info!(stopped = ports.len(), "worker pool shut down");
    }
}
