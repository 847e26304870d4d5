use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use gridvisor_types::LaunchMode;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    error::{Error, Result},
    CommandSpec, Exit, Output, ProcId, ProcessManager, Spawned,
};

#[derive(Debug, Default)]
pub struct MockState {
    pub spawned: Vec<CommandSpec>,
    pub shutdowns: Vec<ProcId>,
    pub kills: Vec<ProcId>,
    pub alive: HashSet<ProcId>,
    /// Service names whose launch fails as if the program were missing.
    pub failing: HashSet<String>,
    /// Background services that launch but exit straight away.
    pub exits_on_start: HashSet<String>,
    /// Foreground services that keep running until shut down.
    pub lingering: HashSet<String>,
    next_pid: u32,
}

/// Foreground children exit immediately with code 0 unless `lingering`;
/// background children stay alive until shut down unless `exits_on_start`.
#[derive(Debug, Default, Clone)]
pub struct MockProcessManager {
    state: Arc<Mutex<MockState>>,
}

impl MockProcessManager {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn spawned_names(&self) -> Vec<String> {
        self.state().spawned.iter().map(|s| s.name.clone()).collect()
    }
}

#[async_trait]
impl ProcessManager for MockProcessManager {
    async fn spawn(&mut self, spec: CommandSpec) -> Result<Spawned> {
        let mut state = self.state();
        if state.failing.contains(&spec.name) {
            return Err(Error::ProcessLaunch {
                service: spec.name,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        state.next_pid += 1;
        let id = ProcId(10_000 + state.next_pid);
        let output = match spec.mode {
            LaunchMode::Background => {
                if !state.exits_on_start.contains(&spec.name) {
                    state.alive.insert(id);
                }
                None
            }
            LaunchMode::Foreground => {
                if state.lingering.contains(&spec.name) {
                    state.alive.insert(id);
                }
                let (_, stdout) = tokio::sync::mpsc::channel::<Vec<u8>>(1);
                let (_, stderr) = tokio::sync::mpsc::channel::<Vec<u8>>(1);
                Some(Output {
                    stdout: Box::pin(ReceiverStream::new(stdout)),
                    stderr: Box::pin(ReceiverStream::new(stderr)),
                })
            }
        };
        state.spawned.push(spec);

        Ok(Spawned { id, output })
    }

    async fn shutdown(&mut self, id: ProcId) -> Result<()> {
        let mut state = self.state();
        state.shutdowns.push(id);
        state.alive.remove(&id);
        Ok(())
    }

    async fn wait(&mut self, id: ProcId, d: Duration) -> Result<Option<Exit>> {
        let alive = self.state().alive.contains(&id);
        if alive {
            tokio::time::sleep(d).await;
        }
        if self.state().alive.contains(&id) {
            Ok(None)
        } else {
            Ok(Some(Exit::Code(0)))
        }
    }

    async fn kill(&mut self, id: ProcId) -> Result<()> {
        let mut state = self.state();
        state.kills.push(id);
        state.alive.remove(&id);
        Ok(())
    }

    fn is_running(&mut self, id: ProcId) -> bool {
        self.state().alive.contains(&id)
    }
}
