mod base;
mod implementations;
mod types;

pub use base::ProcessManager;
#[cfg(test)]
pub use implementations::MockProcessManager;
#[cfg(unix)]
pub use implementations::UnixProcessManager;
pub use types::{BoxStream, CommandSpec, Exit, Output, ProcId, Spawned};
