mod events;
mod group;
mod output;

use std::{collections::BTreeSet, path::PathBuf, time::Duration};

use chrono::Local;
pub use events::SupervisorEvent;
use gridvisor_config::Environment;
use gridvisor_types::{LaunchMode, Project, ServiceSpec, PORT_ENV};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    logs::{self, LogDir},
    port::find_free_port,
    registry::{Registry, RunningService},
    shutdown::{terminate, ShutdownList, Termination},
    types::{ServiceState, StartOutcome, Status, StopOutcome},
    CommandSpec, Exit, ProcId, ProcessManager, Spawned,
};

const POLL: Duration = Duration::from_millis(250);
const OUTPUT_DRAIN: Duration = Duration::from_secs(1);

enum Watch {
    Exited(Result<Exit>),
    Interrupted,
}

async fn wait_for_exit<P: ProcessManager>(pm: &mut P, id: ProcId) -> Result<Exit> {
    loop {
        if let Some(exit) = pm.wait(id, POLL).await? {
            return Ok(exit);
        }
    }
}

/// Starts, stops and reports on the services of one project.
///
/// Operations run one at a time; nothing is queued.
#[derive(Debug)]
pub struct Supervisor<P: ProcessManager> {
    project: Project,
    env: Option<Environment>,
    pm: P,
    registry: Registry,
    logs: LogDir,
    background: ShutdownList,
    events: mpsc::Sender<SupervisorEvent>,
    cancel: CancellationToken,
}

impl<P: ProcessManager> Supervisor<P> {
    /// Open the registry in the project's state directory.
    ///
    /// # Errors
    /// Returns an error if the state directory cannot be prepared.
    pub fn new(project: Project, pm: P) -> Result<(Self, mpsc::Receiver<SupervisorEvent>)> {
        let registry = Registry::open(&project.settings.state_dir)?;
        let logs = LogDir::new(project.settings.log_dir.clone());
        let (events, output_rx) = mpsc::channel(100);
        tracing::debug!("Supervisor initialized with {} tracked services", registry.len());

        Ok((
            Self {
                project,
                env: None,
                pm,
                registry,
                logs,
                background: ShutdownList::default(),
                events,
                cancel: CancellationToken::new(),
            },
            output_rx,
        ))
    }

    /// Attach the validated environment; required by every launch.
    #[must_use]
    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    /// Cancelling this token interrupts the running operation: a foreground
    /// service is terminated and a group stops before its foreground launch.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn project(&self) -> &Project {
        &self.project
    }

    #[must_use]
    pub fn logs(&self) -> &LogDir {
        &self.logs
    }

    /// Configured services plus anything still tracked from an older config.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        self.project
            .services
            .keys()
            .cloned()
            .chain(self.registry.iter().map(|r| r.name.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn spec(&self, name: &str) -> Result<ServiceSpec> {
        self.project
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ServiceNotFound(name.to_owned()))
    }

    /// Registry record for `name` if its process is still alive. Stale records
    /// are dropped.
    fn live(&mut self, name: &str) -> Result<Option<RunningService>> {
        let Some(record) = self.registry.get(name).cloned() else {
            return Ok(None);
        };
        if self.pm.is_running(record.id()) {
            return Ok(Some(record));
        }

        tracing::info!("`{name}` ({}) is no longer running", record.pid);
        self.registry.remove(name)?;
        Ok(None)
    }

    /// Drop the record of `name` if it still belongs to `id`.
    fn forget(&mut self, name: &str, id: ProcId) -> Result<()> {
        if self.registry.get(name).is_some_and(|r| r.id() == id) {
            self.registry.remove(name)?;
        }
        Ok(())
    }

    /// Sleep for `d`. Returns `false` if interrupted first.
    async fn pause(&self, d: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(d) => {}
            () = self.cancel.cancelled() => {}
        }
        !self.cancel.is_cancelled()
    }

    fn command_spec(
        &self,
        spec: &ServiceSpec,
        port: Option<u16>,
        log: PathBuf,
        mode: LaunchMode,
    ) -> Result<CommandSpec> {
        let env = self.env.as_ref().ok_or(Error::EnvironmentNotLoaded)?;

        let mut vars: Vec<(String, String)> = env
            .vars()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        vars.extend(spec.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(port) = port {
            vars.push((PORT_ENV.to_owned(), port.to_string()));
        }

        Ok(CommandSpec {
            name: spec.name.clone(),
            cmd: spec.cmd_with_port(port),
            cwd: spec.cwd.clone(),
            env: vars,
            log,
            mode,
        })
    }

    async fn emit(&self, event: SupervisorEvent) {
        if let Err(err) = self.events.send(event).await {
            tracing::debug!("Event dropped: {err}");
        }
    }

    /// Start a service unless it is already running.
    ///
    /// Foreground launches block until the process exits or the supervisor is
    /// interrupted, in which case the process is terminated first.
    ///
    /// # Errors
    /// Returns an error if the service is unknown, the environment is missing,
    /// no port is free for a port-bound service, or the launch fails.
    pub async fn start(&mut self, name: &str, mode: LaunchMode) -> Result<StartOutcome> {
        let spec = self.spec(name)?;
        if self.env.is_none() {
            return Err(Error::EnvironmentNotLoaded);
        }

        if let Some(record) = self.live(name)? {
            tracing::info!("Service `{name}` is already running ({})", record.pid);
            return Ok(StartOutcome::AlreadyRunning {
                id: record.id(),
                port: record.port,
            });
        }

        if mode == LaunchMode::Foreground && self.cancel.is_cancelled() {
            tracing::info!("Interrupted, not starting `{name}`");
            return Ok(StartOutcome::Interrupted);
        }

        let port = if spec.needs_port {
            let settings = &self.project.settings;
            Some(find_free_port(
                settings.dashboard_port,
                settings.port_attempts,
            )?)
        } else {
            None
        };

        self.logs.prepare()?;
        let log = self.logs.today(name);
        let command = self.command_spec(&spec, port, log.clone(), mode)?;

        tracing::info!("Starting `{name}`: {}", command.cmd.join(" "));
        let spawned = self.pm.spawn(command).await?;
        let id = spawned.id;

        let record = RunningService {
            name: name.to_owned(),
            pid: id.0,
            log: log.clone(),
            started_at: Local::now(),
            port,
            foreground: mode == LaunchMode::Foreground,
        };
        if let Err(err) = self.registry.insert(record) {
            tracing::error!("Cannot record `{name}`, stopping it: {err}");
            if let Err(stop_err) =
                terminate(&mut self.pm, id, self.project.settings.stop_timeout).await
            {
                tracing::error!("Failed to stop unrecorded `{name}` ({}): {stop_err}", id.0);
            }
            return Err(err);
        }

        self.emit(SupervisorEvent::Started {
            service: name.to_owned(),
            id,
            port,
        })
        .await;

        match mode {
            LaunchMode::Background => Ok(StartOutcome::Started { id, port, log }),
            LaunchMode::Foreground => self.supervise_foreground(name, spawned, log).await,
        }
    }

    async fn supervise_foreground(
        &mut self,
        name: &str,
        spawned: Spawned,
        log: PathBuf,
    ) -> Result<StartOutcome> {
        let id = spawned.id;
        let mut tasks = Vec::with_capacity(2);
        if let Some(output) = spawned.output {
            for stream in [output.stdout, output.stderr] {
                tasks.push(tokio::spawn(output::follow_output(
                    stream,
                    name.to_owned(),
                    log.clone(),
                    self.events.clone(),
                )));
            }
        }

        let cancel = self.cancel.clone();
        let watch = tokio::select! {
            exit = wait_for_exit(&mut self.pm, id) => Watch::Exited(exit),
            () = cancel.cancelled() => Watch::Interrupted,
        };

        let (exit, interrupted) = match watch {
            Watch::Exited(exit) => (exit?, false),
            Watch::Interrupted => {
                tracing::info!("Interrupted, stopping `{name}`");
                let exit =
                    match terminate(&mut self.pm, id, self.project.settings.stop_timeout).await? {
                        Termination::Graceful(exit) => exit,
                        Termination::Killed => Exit::Signal(libc::SIGKILL),
                    };
                (exit, true)
            }
        };

        for task in tasks {
            if tokio::time::timeout(OUTPUT_DRAIN, task).await.is_err() {
                tracing::warn!("Output of `{name}` still open after exit, detaching");
            }
        }

        self.registry.remove(name)?;
        tracing::info!("`{name}` finished with {exit}");
        self.emit(SupervisorEvent::Stopped {
            service: name.to_owned(),
            exit,
        })
        .await;

        Ok(StartOutcome::Finished { exit, interrupted })
    }

    /// Terminate a tracked service. Stopping a service that is not running is
    /// a no-op.
    ///
    /// # Errors
    /// Returns an error if the name is unknown or a signal cannot be sent.
    pub async fn stop(&mut self, name: &str) -> Result<StopOutcome> {
        if !self.project.services.contains_key(name) && self.registry.get(name).is_none() {
            return Err(Error::ServiceNotFound(name.to_owned()));
        }

        let Some(record) = self.live(name)? else {
            tracing::info!("Service `{name}` is not running");
            return Ok(StopOutcome::NotRunning);
        };

        tracing::info!("Stopping `{name}` ({})", record.pid);
        let termination =
            terminate(&mut self.pm, record.id(), self.project.settings.stop_timeout).await?;
        self.registry.remove(name)?;

        Ok(match termination {
            Termination::Graceful(_) => StopOutcome::Stopped,
            Termination::Killed => StopOutcome::Killed,
        })
    }

    /// `stop` for every known service; one failure does not prevent the rest.
    pub async fn stop_all(&mut self) -> Vec<(String, Result<StopOutcome>)> {
        let mut outcomes = Vec::new();
        for name in self.service_names() {
            let outcome = self.stop(&name).await;
            if let Err(err) = &outcome {
                tracing::error!("Failed to stop `{name}`: {err}");
            }
            outcomes.push((name, outcome));
        }
        outcomes
    }

    /// Start `name` in the background and check that it is still alive after
    /// the grace period. Interrupting the wait stops the service again.
    ///
    /// # Errors
    /// Returns the errors of `start`, and `Error::ExitedEarly` when the service
    /// died during the grace period.
    pub async fn start_detached(&mut self, name: &str) -> Result<StartOutcome> {
        let outcome = self.start(name, LaunchMode::Background).await?;
        let (id, log) = match &outcome {
            StartOutcome::Started { id, log, .. } => (*id, log.clone()),
            _ => return Ok(outcome),
        };

        if !self.pause(self.project.settings.grace).await {
            tracing::info!("Interrupted, stopping `{name}`");
            terminate(&mut self.pm, id, self.project.settings.stop_timeout).await?;
            self.forget(name, id)?;
            return Ok(StartOutcome::Interrupted);
        }

        if self.pm.is_running(id) {
            return Ok(outcome);
        }
        self.forget(name, id)?;
        Err(Error::ExitedEarly {
            service: name.to_owned(),
            log,
        })
    }

    /// Stop, give the OS a moment to release sockets, start in the background.
    ///
    /// # Errors
    /// Returns an error if either step fails.
    pub async fn restart(&mut self, name: &str) -> Result<StartOutcome> {
        self.stop(name).await?;
        if !self.pause(self.project.settings.restart_delay).await {
            return Ok(StartOutcome::Interrupted);
        }
        self.start_detached(name).await
    }

    /// RUNNING/STOPPED for every known service with the tail of its log.
    ///
    /// # Errors
    /// Returns an error if the registry cannot be updated or a log is unreadable.
    pub fn status(&mut self, lines: usize) -> Result<Vec<ServiceState>> {
        let mut states = Vec::new();
        for name in self.service_names() {
            let state = match self.live(&name)? {
                Some(record) => ServiceState {
                    tail: logs::tail(&record.log, lines)?,
                    status: Status::Running,
                    pid: Some(record.pid),
                    port: record.port,
                    started_at: Some(record.started_at),
                    log: record.log,
                    name,
                },
                None => {
                    let log = self.logs.today(&name);
                    ServiceState {
                        tail: logs::tail(&log, lines)?,
                        status: Status::Stopped,
                        pid: None,
                        port: None,
                        started_at: None,
                        log,
                        name,
                    }
                }
            };
            states.push(state);
        }
        Ok(states)
    }

    /// Terminate every background service started by this invocation, in
    /// launch order. Failures are collected and the sequence continues.
    pub async fn shutdown(&mut self) -> Vec<(String, Error)> {
        let mut failures = Vec::new();
        for (name, id) in self.background.take() {
            tracing::info!("Stopping background service `{name}` ({})", id.0);
            match terminate(&mut self.pm, id, self.project.settings.stop_timeout).await {
                Ok(_) => {
                    if let Err(err) = self.forget(&name, id) {
                        failures.push((name, err));
                    }
                }
                Err(err) => {
                    tracing::error!("Failed to stop `{name}`: {err}");
                    failures.push((name, err));
                }
            }
        }
        failures
    }
}
