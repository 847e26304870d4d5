use std::{collections::BTreeMap, path::PathBuf, time::Duration};

/// Primary trading service, always run in the foreground.
pub const BOT: &str = "bot";
/// Local web dashboard, needs a free port.
pub const DASHBOARD: &str = "dashboard";
/// Realised-profit watcher.
pub const PROFIT_WATCHER: &str = "profit-watcher";

/// Environment variable carrying the selected dashboard port into the child.
pub const PORT_ENV: &str = "DASH_PORT";
/// Argument token replaced by the selected port at launch time.
pub const PORT_PLACEHOLDER: &str = "{port}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub cmd: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub needs_port: bool,
}

impl ServiceSpec {
    /// Command line with every `{port}` token replaced.
    #[must_use]
    pub fn cmd_with_port(&self, port: Option<u16>) -> Vec<String> {
        match port {
            Some(port) => self
                .cmd
                .iter()
                .map(|arg| arg.replace(PORT_PLACEHOLDER, &port.to_string()))
                .collect(),
            None => self.cmd.clone(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LaunchMode {
    /// Caller blocks until the process exits; output is mirrored to the terminal.
    Foreground,
    /// Detached; output goes straight to the log file.
    Background,
}

/// Deployment settings resolved from CLI flags, environment and the project file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub root: PathBuf,
    pub env_file: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
    pub venv_dir: PathBuf,
    pub dashboard_port: u16,
    pub port_attempts: u16,
    pub open_browser: bool,
    pub backfill_days: u32,
    pub grace: Duration,
    pub restart_delay: Duration,
    pub stop_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub settings: Settings,
    pub services: BTreeMap<String, ServiceSpec>,
}
