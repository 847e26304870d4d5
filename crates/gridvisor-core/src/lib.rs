mod browser;
mod error;
pub mod logs;
mod port;
mod process_manager;
mod registry;
pub mod setup;
mod shutdown;
mod supervisor;
mod types;

pub use browser::{dashboard_url, open_url};
pub use error::{Error, Result};
pub use port::{find_free_port, is_port_free};
#[cfg(test)]
pub(crate) use process_manager::MockProcessManager;
#[cfg(unix)]
pub use process_manager::UnixProcessManager;
pub use process_manager::{BoxStream, CommandSpec, Exit, Output, ProcId, ProcessManager, Spawned};
pub use registry::{Registry, RunningService};
pub use shutdown::{cancel_on_signal, terminate, ShutdownList, Termination};
pub use tokio_util::sync::CancellationToken;
pub use supervisor::{Supervisor, SupervisorEvent};
pub use types::{ServiceState, StartOutcome, Status, StopOutcome};
