use std::{fmt, path::PathBuf};

use chrono::{DateTime, Local};

use crate::{Exit, ProcId};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    Running,
    Stopped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Running => f.write_str("RUNNING"),
            Status::Stopped => f.write_str("STOPPED"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceState {
    pub name: String,
    pub status: Status,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub started_at: Option<DateTime<Local>>,
    pub log: PathBuf,
    /// Last lines of `log`.
    pub tail: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    AlreadyRunning { id: ProcId, port: Option<u16> },
    /// Background launch.
    Started {
        id: ProcId,
        port: Option<u16>,
        log: PathBuf,
    },
    /// Foreground launch that has finished.
    Finished { exit: Exit, interrupted: bool },
    /// Interrupted before the service was up.
    Interrupted,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopOutcome {
    NotRunning,
    Stopped,
    Killed,
}
