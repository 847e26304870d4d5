use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use gridvisor_types::{Project, ServiceSpec, Settings};

use crate::{
    defaults::{
        default_services, DEFAULT_DASHBOARD_PORT, DEFAULT_GRACE_SECS, DEFAULT_PORT_ATTEMPTS,
        DEFAULT_RESTART_DELAY_SECS, DEFAULT_STOP_TIMEOUT_SECS,
    },
    raw::{RawProject, RawService},
    ConfigError, Overrides,
};

fn resolve(root: &Path, value: Option<String>, default: &str) -> PathBuf {
    let path = PathBuf::from(value.unwrap_or_else(|| default.to_owned()));
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "service `{name}`: name must be non-empty and contain only [A-Za-z0-9_-]"
        )));
    }
    Ok(())
}

fn to_service(name: String, raw: RawService, root: &Path) -> Result<ServiceSpec, ConfigError> {
    validate_name(&name)?;
    if raw.cmd.is_empty() {
        return Err(ConfigError::Validation(format!(
            "service `{name}`: cmd is empty"
        )));
    }
    if raw.cmd.iter().any(|c| c.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "service `{name}`: cmd contains empty element"
        )));
    }

    Ok(ServiceSpec {
        cmd: raw.cmd,
        cwd: Some(resolve(root, raw.cwd, ".")),
        env: raw.env.map(BTreeMap::from_iter).unwrap_or_default(),
        needs_port: raw.needs_port.unwrap_or(false),
        name,
    })
}

impl RawProject {
    /// Merge the file contents with the built-in defaults and the caller's overrides.
    ///
    /// Precedence: overrides, then the project file, then defaults.
    pub(crate) fn into_project(self, overrides: &Overrides) -> Result<Project, ConfigError> {
        let root = overrides.root.clone();
        let raw = self.settings;

        let env_file = overrides
            .env_file
            .clone()
            .unwrap_or_else(|| resolve(&root, raw.env_file, ".env"));

        let settings = Settings {
            env_file,
            log_dir: resolve(&root, raw.log_dir, "logs"),
            state_dir: resolve(&root, raw.state_dir, ".gridvisor"),
            venv_dir: resolve(&root, raw.venv_dir, ".venv"),
            dashboard_port: overrides
                .dashboard_port
                .or(raw.dashboard_port)
                .unwrap_or(DEFAULT_DASHBOARD_PORT),
            port_attempts: raw.port_attempts.unwrap_or(DEFAULT_PORT_ATTEMPTS),
            open_browser: overrides
                .open_browser
                .or(raw.open_browser)
                .unwrap_or(false),
            backfill_days: overrides
                .backfill_days
                .or(raw.backfill_days)
                .unwrap_or(0),
            grace: Duration::from_secs(raw.grace_secs.unwrap_or(DEFAULT_GRACE_SECS)),
            restart_delay: Duration::from_secs(
                raw.restart_delay_secs
                    .unwrap_or(DEFAULT_RESTART_DELAY_SECS),
            ),
            stop_timeout: Duration::from_secs(
                raw.stop_timeout_secs.unwrap_or(DEFAULT_STOP_TIMEOUT_SECS),
            ),
            root: root.clone(),
        };

        if settings.port_attempts == 0 {
            return Err(ConfigError::Validation(
                "settings: port_attempts must be at least 1".into(),
            ));
        }

        let mut services = default_services(&settings);
        for (name, raw_service) in self.services {
            let service = to_service(name, raw_service, &root)?;
            services.insert(service.name.clone(), service);
        }

        Ok(Project { settings, services })
    }
}
