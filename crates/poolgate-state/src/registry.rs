//! WorkerRegistry — ordered worker set plus a port → status map.
//!
//! The sequence records creation order, which is also the order the
//! dispatcher scans for an idle worker and the autoscaler scans for
//! scale-down candidates. Both structures are updated together by every
//! mutation so they never disagree.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{StateError, StateResult};
use crate::types::{WorkerInstance, WorkerStatus};

#[derive(Debug, Default, Clone)]
pub struct WorkerRegistry {
    order: Vec<u16>,
    status: HashMap<u16, WorkerStatus>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered snapshot of every registered worker.
    pub fn list(&self) -> Vec<WorkerInstance> {
        self.order
            .iter()
            .map(|port| WorkerInstance::new(*port, self.status[port]))
            .collect()
    }

    pub fn status_of(&self, port: u16) -> Option<WorkerStatus> {
        self.status.get(&port).copied()
    }

    pub fn set_status(&mut self, port: u16, status: WorkerStatus) -> StateResult<()> {
        let entry = self
            .status
            .get_mut(&port)
            .ok_or(StateError::UnknownPort(port))?;
        *entry = status;
        trace!(port, %status, "worker status updated");
        Ok(())
    }

    /// Append a worker in the `Idle` state.
    pub fn insert(&mut self, port: u16) -> StateResult<()> {
        if self.status.contains_key(&port) {
            return Err(StateError::DuplicatePort(port));
        }
        self.order.push(port);
        self.status.insert(port, WorkerStatus::Idle);
        trace!(port, size = self.order.len(), "worker registered");
        Ok(())
    }

    /// Remove a worker, returning its last status. Absent ports are a no-op.
    pub fn remove(&mut self, port: u16) -> Option<WorkerStatus> {
        let status = self.status.remove(&port)?;
        self.order.retain(|p| *p != port);
        trace!(port, size = self.order.len(), "worker deregistered");
        Some(status)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.status.contains_key(&port)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn busy_count(&self) -> usize {
        self.status.values().filter(|s| !s.is_idle()).count()
    }

    /// First idle port in creation order.
    pub fn first_idle(&self) -> Option<u16> {
        self.order
            .iter()
            .copied()
            .find(|port| self.status[port].is_idle())
    }

    /// Whether the sequence and the status map describe the same ports.
    pub fn is_consistent(&self) -> bool {
        self.order.len() == self.status.len()
            && self.order.iter().all(|port| self.status.contains_key(port))
    }
}
