use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawProject {
    #[serde(default)]
    pub settings: RawSettings,
    #[serde(default)]
    pub services: BTreeMap<String, RawService>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawSettings {
    pub env_file: Option<String>,
    pub log_dir: Option<String>,
    pub state_dir: Option<String>,
    pub venv_dir: Option<String>,
    pub dashboard_port: Option<u16>,
    pub port_attempts: Option<u16>,
    pub open_browser: Option<bool>,
    pub backfill_days: Option<u32>,
    pub grace_secs: Option<u64>,
    pub restart_delay_secs: Option<u64>,
    pub stop_timeout_secs: Option<u64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawService {
    pub cmd: Vec<String>,
    pub cwd: Option<String>,
    pub env: Option<HashMap<String, String>>,
    pub needs_port: Option<bool>,
}
