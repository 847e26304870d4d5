use std::{collections::BTreeMap, path::Path};

use gridvisor_types::{ServiceSpec, Settings, BOT, DASHBOARD, PORT_PLACEHOLDER, PROFIT_WATCHER};

pub const DEFAULT_DASHBOARD_PORT: u16 = 8050;
pub const DEFAULT_PORT_ATTEMPTS: u16 = 50;
pub const DEFAULT_GRACE_SECS: u64 = 2;
pub const DEFAULT_RESTART_DELAY_SECS: u64 = 2;
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 5;

/// Interpreter used for the built-in services: the project venv when it exists.
#[must_use]
pub fn python_for(venv_dir: &Path) -> String {
    let venv_python = venv_dir.join("bin").join("python");
    if venv_python.exists() {
        venv_python.to_string_lossy().into_owned()
    } else {
        "python3".to_owned()
    }
}

/// Built-in definitions for the bot, the dashboard and the profit watcher.
#[must_use]
pub fn default_services(settings: &Settings) -> BTreeMap<String, ServiceSpec> {
    let python = python_for(&settings.venv_dir);
    let service = |name: &str, args: &[&str], needs_port: bool| {
        let mut cmd = vec![python.clone()];
        cmd.extend(args.iter().map(|a| (*a).to_owned()));
        (
            name.to_owned(),
            ServiceSpec {
                name: name.to_owned(),
                cmd,
                cwd: Some(settings.root.clone()),
                env: BTreeMap::new(),
                needs_port,
            },
        )
    };

    let mut services = BTreeMap::from([
        service(BOT, &["-u", "main.py"], false),
        service(
            DASHBOARD,
            &[
                "-u",
                "dash_server.py",
                "--host",
                "127.0.0.1",
                "--port",
                PORT_PLACEHOLDER,
            ],
            true,
        ),
        service(PROFIT_WATCHER, &["-u", "profit_watcher.py"], false),
    ]);

    if settings.backfill_days > 0 {
        if let Some(watcher) = services.get_mut(PROFIT_WATCHER) {
            watcher.cmd.extend([
                "--backfill".to_owned(),
                "--since-days".to_owned(),
                settings.backfill_days.to_string(),
            ]);
        }
    }

    services
}
