//! Worker process spawning.
//!
//! A worker is an external program that binds an HTTP listener on the
//! port it receives as its final argument. There is no readiness
//! handshake: the pool registers the worker as soon as the OS process
//! exists.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

/// A live worker process, exclusively owned by the pool.
pub trait WorkerProcess: Send {
    /// OS process id, if the process is still known to the OS.
    fn id(&self) -> Option<u32>;

    /// Send a kill signal without waiting for the process to exit.
    fn kill(&mut self) -> std::io::Result<()>;
}

/// Creates worker processes bound to a given port.
pub trait WorkerSpawner: Send + Sync {
    fn spawn(&self, port: u16) -> std::io::Result<Box<dyn WorkerProcess>>;
}

/// Spawns `<program> [args...] <port>` as a child process.
///
/// Children are spawned with kill-on-drop, so a worker never outlives
/// the pool that owns it.
#[derive(Debug, Clone)]
pub struct CommandSpawner {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandSpawner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before the port.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl WorkerSpawner for CommandSpawner {
    fn spawn(&self, port: u16) -> std::io::Result<Box<dyn WorkerProcess>> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(port.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        debug!(
            program = %self.program.display(),
            port,
            pid = ?child.id(),
            "spawned worker process"
        );
        Ok(Box::new(ChildProcess { child }))
    }
}

struct ChildProcess {
    child: Child,
}

impl WorkerProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}
