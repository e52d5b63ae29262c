//! Autoscaler — occupancy-driven pool resizing.
//!
//! Reads the worker pool on a fixed interval and either starts one
//! worker (every worker busy, room under the CPU ceiling) or stops idle
//! workers down to a floor of one. The actual process work is delegated
//! to the pool.

use std::time::Duration;

use tracing::{debug, info, warn};

use poolgate_pool::WorkerPool;
use poolgate_state::WorkerInstance;

/// A scaling decision for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Start one worker on this port.
    ScaleUp { port: u16 },
    /// Stop these idle workers, in order.
    ScaleDown { ports: Vec<u16> },
    /// No change needed.
    NoChange,
}

/// Source of the host's logical processor count.
pub type CpuProbe = Box<dyn Fn() -> usize + Send + Sync>;

/// Number of logical processors available to this process.
pub fn host_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// The autoscaler evaluates pool occupancy and grows or shrinks the pool.
pub struct Autoscaler {
    pool: WorkerPool,
    base_port: u16,
    /// Optional cap below the CPU count.
    max_workers: Option<usize>,
    cpu_count: CpuProbe,
}

impl Autoscaler {
    /// Create a new autoscaler deriving worker ports from `base_port`.
    pub fn new(pool: WorkerPool, base_port: u16) -> Self {
        Self {
            pool,
            base_port,
            max_workers: None,
            cpu_count: Box::new(host_cpu_count),
        }
    }

    pub fn with_max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Replace the CPU count probe (hosts with a fixed budget, tests).
    pub fn with_cpu_probe(mut self, probe: impl Fn() -> usize + Send + Sync + 'static) -> Self {
        self.cpu_count = Box::new(probe);
        self
    }

    /// Maximum pool size for this tick.
    pub fn ceiling(&self) -> usize {
        let cpus = (self.cpu_count)();
        match self.max_workers {
            Some(max) => max.min(cpus),
            None => cpus,
        }
    }

    /// Decide what one tick should do with the given pool view.
    pub fn evaluate(&self, workers: &[WorkerInstance], ceiling: usize) -> ScaleDecision {
        let size = workers.len();
        let busy = workers.iter().filter(|w| !w.status.is_idle()).count();

        if busy == size && size < ceiling {
            let Some(port) = u16::try_from(size)
                .ok()
                .and_then(|offset| self.base_port.checked_add(offset))
            else {
                warn!(base_port = self.base_port, size, "worker port range exhausted");
                return ScaleDecision::NoChange;
            };
            debug!(busy, size, ceiling, port, "scaling up");
            return ScaleDecision::ScaleUp { port };
        }

        let mut remaining = size;
        let mut ports = Vec::new();
        for worker in workers.iter().filter(|w| w.status.is_idle()) {
            if remaining <= 1 {
                break;
            }
            ports.push(worker.port);
            remaining -= 1;
        }

        if ports.is_empty() {
            ScaleDecision::NoChange
        } else {
            debug!(busy, size, stopping = ports.len(), "scaling down");
            ScaleDecision::ScaleDown { ports }
        }
    }

    /// Evaluate the current pool and apply the decision.
    pub fn tick(&self) -> anyhow::Result<ScaleDecision> {
        let workers = self.pool.snapshot();
        let decision = self.evaluate(&workers, self.ceiling());

        match &decision {
            ScaleDecision::ScaleUp { port } => {
                self.pool.start_worker(*port)?;
            }
            ScaleDecision::ScaleDown { ports } => {
                for port in ports {
                    if self.pool.len() <= 1 {
                        break;
                    }
                    self.pool.stop_worker(*port);
                }
            }
            ScaleDecision::NoChange => {}
        }

        Ok(decision)
    }

    /// Run the autoscaler loop.
    pub async fn run(
        &self,
        interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!(
            interval = ?interval,
            base_port = self.base_port,
            "autoscaler started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.tick() {
                        warn!(error = %e, "scaling action failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }
}
