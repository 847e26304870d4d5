mod defaults;
mod env;
mod model;
mod raw;

use std::path::{Path, PathBuf};

pub use defaults::{python_for, DEFAULT_DASHBOARD_PORT, DEFAULT_PORT_ATTEMPTS};
pub use env::{Environment, Region};
use gridvisor_types::Project;

/// Optional project file looked up in the project root.
pub const PROJECT_FILE: &str = "gridvisor.toml";

/// Error type for configuration parsing and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("env file parse error: {0}")]
    Env(#[from] dotenvy::Error),

    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("missing required key `{0}`")]
    MissingKey(String),

    #[error("invalid value `{value}` for `{key}`: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("validation error(s): {0}")]
    Validation(String),
}

/// Values coming from the command line or the process environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root: PathBuf,
    pub env_file: Option<PathBuf>,
    pub dashboard_port: Option<u16>,
    pub open_browser: Option<bool>,
    pub backfill_days: Option<u32>,
}

/// Load the project rooted at `overrides.root`.
///
/// `gridvisor.toml` is optional; without it the built-in services are used.
///
/// # Errors
///
/// Returns a `ConfigError` if the project file exists but cannot be read, parsed
/// or validated.
pub fn load_project(overrides: &Overrides) -> Result<Project, ConfigError> {
    let path = overrides.root.join(PROJECT_FILE);
    if path.is_file() {
        load_from_path(&path, overrides)
    } else {
        raw::RawProject::default().into_project(overrides)
    }
}

/// Load a project configuration from a file path.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration file cannot be read or parsed.
pub fn load_from_path(path: &Path, overrides: &Overrides) -> Result<Project, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_toml(&text, overrides)
}

/// Parse a project configuration from a string.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration string cannot be parsed.
pub fn parse_toml(config: &str, overrides: &Overrides) -> Result<Project, ConfigError> {
    let raw_project = toml::from_str::<raw::RawProject>(config)?;
    raw_project.into_project(overrides)
}
