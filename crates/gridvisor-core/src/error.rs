use std::path::PathBuf;

use gridvisor_config::ConfigError;

use crate::ProcId;

pub type Result<R, E = Error> = std::result::Result<R, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("environment file has not been loaded")]
    EnvironmentNotLoaded,

    #[error("no free port in {start}..{} ({attempts} attempts)", u32::from(*start) + u32::from(*attempts))]
    NoFreePort { start: u16, attempts: u16 },

    #[error("dependency installation failed: {0}")]
    DependencyInstall(String),

    #[error("failed to launch `{service}`: {source}")]
    ProcessLaunch {
        service: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{service}` exited right after starting, see {}", log.display())]
    ExitedEarly { service: String, log: PathBuf },

    #[error("setup failed: {0}")]
    Setup(String),

    #[error("unknown service `{0}`")]
    ServiceNotFound(String),

    #[error("unknown process {0:?}")]
    UnknownProcess(ProcId),

    #[error("corrupt registry record {}: {source}", path.display())]
    Record {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error: {0}")]
    IOError(#[from] std::io::Error),
}
