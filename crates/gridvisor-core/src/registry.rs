//! Registry of services started by the supervisor.
//!
//! One JSON record per service lives in the state directory so that later
//! invocations (`status`, `stop`) see what earlier ones launched. Liveness is
//! always checked against the recorded pid; the process table is never
//! scanned.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    ProcId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningService {
    pub name: String,
    pub pid: u32,
    pub log: PathBuf,
    pub started_at: DateTime<Local>,
    pub port: Option<u16>,
    pub foreground: bool,
}

impl RunningService {
    #[must_use]
    pub fn id(&self) -> ProcId {
        ProcId(self.pid)
    }
}

#[derive(Debug)]
pub struct Registry {
    dir: PathBuf,
    services: BTreeMap<String, RunningService>,
}

impl Registry {
    /// Load every record found in `dir`, creating the directory if needed.
    /// Unreadable records are discarded with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or listed.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mut services = BTreeMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path) {
                Ok(record) => {
                    services.insert(record.name.clone(), record);
                }
                Err(err) => {
                    tracing::warn!("Discarding registry record: {err}");
                    let _ = std::fs::remove_file(&path);
                }
            }
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            services,
        })
    }

    fn read_record(path: &Path) -> Result<RunningService> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|source| Error::Record {
            path: path.to_path_buf(),
            source,
        })
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RunningService> {
        self.services.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunningService> {
        self.services.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Track a service, replacing any previous record for the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub fn insert(&mut self, record: RunningService) -> Result<()> {
        let path = self.record_path(&record.name);
        let tmp = path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(&record).map_err(|source| Error::Record {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &path)?;

        self.services.insert(record.name.clone(), record);
        Ok(())
    }

    /// Forget a service. Removing an unknown name is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the record file exists but cannot be deleted.
    pub fn remove(&mut self, name: &str) -> Result<Option<RunningService>> {
        match std::fs::remove_file(self.record_path(name)) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(self.services.remove(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, pid: u32) -> RunningService {
        RunningService {
            name: name.to_owned(),
            pid,
            log: PathBuf::from(format!("/tmp/{name}.log")),
            started_at: Local::now(),
            port: None,
            foreground: false,
        }
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut registry = Registry::open(dir.path()).unwrap();
            registry.insert(record("dashboard", 42)).unwrap();
            registry.insert(record("profit-watcher", 43)).unwrap();
            registry.remove("profit-watcher").unwrap();
        }

        let registry = Registry::open(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("dashboard").unwrap().pid, 42);
        assert!(registry.get("profit-watcher").is_none());
    }

    #[test]
    fn test_insert_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        registry.insert(record("bot", 1)).unwrap();
        registry.insert(record("bot", 2)).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("bot").unwrap().id(), ProcId(2));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        assert!(registry.remove("bot").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_record_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bot.json"), "{not json").unwrap();

        let registry = Registry::open(dir.path()).unwrap();
        assert!(registry.is_empty());
        assert!(!dir.path().join("bot.json").exists());
    }
}
