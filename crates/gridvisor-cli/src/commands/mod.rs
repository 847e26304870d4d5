pub mod logs;
pub mod service;
pub mod setup;
pub mod status;

use anyhow::{Context, Result};
use gridvisor_config::{load_project, Environment};
use gridvisor_core::{cancel_on_signal, Supervisor, SupervisorEvent, UnixProcessManager};
use gridvisor_types::Project;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{config::GlobalArgs, logger::Logger};

pub type CliSupervisor = Supervisor<UnixProcessManager>;

pub fn project(global: &GlobalArgs) -> Result<Project> {
    load_project(&global.overrides())
        .with_context(|| format!("Cannot load the project in {}", global.root.display()))
}

/// Load and validate the env file. Nothing has been started when this fails.
pub fn environment(project: &Project) -> Result<Environment> {
    let path = &project.settings.env_file;
    let env = Environment::load(path)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    tracing::info!("Configuration OK: {} on {}", env.pair(), env.region());
    Ok(env)
}

/// A supervisor that can only inspect and stop services.
pub fn inspector(project: Project) -> Result<(CliSupervisor, JoinHandle<()>)> {
    let (supervisor, events) = Supervisor::new(project, UnixProcessManager::new())?;
    Ok((supervisor, tokio::spawn(print_events(events))))
}

/// A supervisor that can launch services with `env`. Ctrl-C and SIGTERM are
/// routed to it before anything is launched.
pub fn launcher(project: Project, env: Environment) -> Result<(CliSupervisor, JoinHandle<()>)> {
    let (supervisor, printer) = inspector(project)?;
    let _signals = cancel_on_signal(supervisor.cancellation_token())
        .context("Cannot install the signal handlers")?;
    Ok((supervisor.with_environment(env), printer))
}

/// Drop the supervisor so the event channel closes, then let the printer drain.
pub async fn finish(supervisor: CliSupervisor, printer: JoinHandle<()>) {
    drop(supervisor);
    if let Err(err) = printer.await {
        tracing::debug!("Event printer ended abnormally: {err}");
    }
}

async fn print_events(mut events: mpsc::Receiver<SupervisorEvent>) {
    let mut logger = Logger::default();
    while let Some(event) = events.recv().await {
        match event {
            SupervisorEvent::Log { service, message } => logger.log(&service, &message),
            SupervisorEvent::Started { service, id, port } => match port {
                Some(port) => {
                    logger.system(&format!("{service} started (pid {}, port {port})", id.0));
                }
                None => logger.system(&format!("{service} started (pid {})", id.0)),
            },
            SupervisorEvent::Stopped { service, exit } => {
                logger.system(&format!("{service} stopped: {exit}"));
            }
            SupervisorEvent::Error { service, message } => {
                logger.error(&format!("{service}: {message}"));
            }
        }
    }
}
