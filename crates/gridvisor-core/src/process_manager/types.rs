use std::{fmt::Debug, path::PathBuf, pin::Pin};

use futures::Stream;
use gridvisor_types::LaunchMode;

pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

#[derive(Clone, Debug, PartialEq)]
pub struct CommandSpec {
    pub name: String,
    pub cmd: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Append-only log file; background children write to it directly.
    pub log: PathBuf,
    pub mode: LaunchMode,
}

/// OS process id of a spawned child. Children lead their own process group,
/// so this is also the group id that signals are sent to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ProcId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Exit {
    Code(i32),
    Signal(i32),
    /// The process was not our child, so its status cannot be collected.
    Unknown,
}

impl Exit {
    #[must_use]
    pub fn success(self) -> bool {
        matches!(self, Exit::Code(0))
    }
}

impl std::fmt::Display for Exit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exit::Code(code) => write!(f, "exit code {code}"),
            Exit::Signal(signal) => write!(f, "signal {signal}"),
            Exit::Unknown => f.write_str("unknown status"),
        }
    }
}

pub struct Output {
    pub stdout: BoxStream<Vec<u8>>,
    pub stderr: BoxStream<Vec<u8>>,
}

pub struct Spawned {
    pub id: ProcId,
    /// Piped output, present for foreground launches only.
    pub output: Option<Output>,
}

impl Debug for Spawned {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spawned")
            .field("id", &self.id)
            .field("output", &self.output.as_ref().map(|_| "<streams>"))
            .finish()
    }
}
