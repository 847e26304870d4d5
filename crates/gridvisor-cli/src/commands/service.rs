use anyhow::Result;
use gridvisor_core::{dashboard_url, open_url, Exit, StartOutcome, StopOutcome};
use gridvisor_types::{LaunchMode, BOT, DASHBOARD, PROFIT_WATCHER};

use crate::{commands, config::GlobalArgs, logger::Logger};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Launch {
    Bot,
    Dashboard,
    ProfitWatcher,
    Both,
    All,
}

/// Exit code of the CLI after a foreground service finished.
fn exit_code(outcome: &StartOutcome) -> u8 {
    match outcome {
        StartOutcome::Finished {
            interrupted: true, ..
        } => 0,
        StartOutcome::Finished {
            exit: Exit::Code(code),
            ..
        } => u8::try_from(*code).unwrap_or(1),
        StartOutcome::Finished { exit, .. } if !exit.success() => 1,
        _ => 0,
    }
}

fn report_background(logger: &mut Logger, name: &str, outcome: &StartOutcome) {
    match outcome {
        StartOutcome::Started { id, port, log } => {
            logger.system(&format!(
                "{name} running in the background (pid {}), logging to {}",
                id.0,
                log.display()
            ));
            if let Some(port) = port {
                logger.system(&format!("Dashboard available at {}", dashboard_url(*port)));
            }
        }
        StartOutcome::AlreadyRunning { id, port } => {
            logger.system(&format!("{name} is already running (pid {})", id.0));
            if let Some(port) = port {
                logger.system(&format!("Dashboard available at {}", dashboard_url(*port)));
            }
        }
        StartOutcome::Finished { exit, .. } => {
            logger.system(&format!("{name} finished: {exit}"));
        }
        StartOutcome::Interrupted => logger.system(&format!("{name} was interrupted and stopped")),
    }
}

pub async fn launch(global: &GlobalArgs, launch: Launch) -> Result<u8> {
    let project = commands::project(global)?;
    let env = commands::environment(&project)?;
    let open_browser = project.settings.open_browser;
    let (mut supervisor, printer) = commands::launcher(project, env)?;

    let result = match launch {
        Launch::Bot => supervisor
            .start(BOT, LaunchMode::Foreground)
            .await
            .map(|outcome| exit_code(&outcome)),
        Launch::Both => supervisor
            .run_group(&[DASHBOARD], BOT)
            .await
            .map(|outcome| exit_code(&outcome)),
        Launch::All => supervisor
            .run_group(&[DASHBOARD, PROFIT_WATCHER], BOT)
            .await
            .map(|outcome| exit_code(&outcome)),
        Launch::Dashboard | Launch::ProfitWatcher => {
            let name = if launch == Launch::Dashboard {
                DASHBOARD
            } else {
                PROFIT_WATCHER
            };
            match supervisor.start_detached(name).await {
                Ok(outcome) => {
                    report_background(&mut Logger::default(), name, &outcome);
                    if let (true, StartOutcome::Started { port: Some(port), .. }) =
                        (open_browser, &outcome)
                    {
                        if let Err(err) = open_url(&dashboard_url(*port)).await {
                            tracing::warn!("Cannot open the browser: {err}");
                        }
                    }
                    Ok(0)
                }
                Err(err) => Err(err),
            }
        }
    };

    commands::finish(supervisor, printer).await;
    Ok(result?)
}

pub async fn stop(global: &GlobalArgs, service: Option<String>) -> Result<()> {
    let project = commands::project(global)?;
    let (mut supervisor, printer) = commands::inspector(project)?;
    let mut logger = Logger::default();

    let outcomes = match service {
        Some(name) => {
            let outcome = supervisor.stop(&name).await;
            vec![(name, outcome)]
        }
        None => supervisor.stop_all().await,
    };

    let mut failed = 0;
    for (name, outcome) in outcomes {
        match outcome {
            Ok(StopOutcome::NotRunning) => logger.system(&format!("{name} is not running")),
            Ok(StopOutcome::Stopped) => logger.system(&format!("{name} stopped")),
            Ok(StopOutcome::Killed) => {
                logger.system(&format!("{name} did not exit in time and was killed"));
            }
            Err(err) => {
                logger.error(&format!("{name}: {err}"));
                failed += 1;
            }
        }
    }

    commands::finish(supervisor, printer).await;
    if failed > 0 {
        anyhow::bail!("{failed} service(s) could not be stopped");
    }
    Ok(())
}

pub async fn restart(global: &GlobalArgs, service: &str) -> Result<()> {
    let project = commands::project(global)?;
    let env = commands::environment(&project)?;
    let (mut supervisor, printer) = commands::launcher(project, env)?;

    let result = supervisor.restart(service).await;
    if let Ok(outcome) = &result {
        report_background(&mut Logger::default(), service, outcome);
    }

    commands::finish(supervisor, printer).await;
    result?;
    Ok(())
}
