use std::time::Duration;

use crate::{
    error::Result,
    process_manager::types::{CommandSpec, Exit, ProcId, Spawned},
};

#[async_trait::async_trait]
pub trait ProcessManager: Send + Sync {
    /// Spawn a new process.
    async fn spawn(&mut self, spec: CommandSpec) -> Result<Spawned>;
    /// Gracefully shutdown a process group. Succeeds if it is already gone.
    async fn shutdown(&mut self, id: ProcId) -> Result<()>;
    /// Wait up to `d` for a process to exit.
    async fn wait(&mut self, id: ProcId, d: Duration) -> Result<Option<Exit>>;
    /// Forcefully kill a process group. Succeeds if it is already gone.
    async fn kill(&mut self, id: ProcId) -> Result<()>;
    /// Whether the process is still alive. Works for processes spawned by an
    /// earlier supervisor invocation as well.
    fn is_running(&mut self, id: ProcId) -> bool;
}
