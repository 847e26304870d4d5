use gridvisor_types::LaunchMode;

use crate::{
    browser,
    error::{Error, Result},
    supervisor::{Supervisor, SupervisorEvent},
    types::StartOutcome,
    ProcessManager,
};

impl<P: ProcessManager> Supervisor<P> {
    /// Start `background` services, then run `foreground` until it exits.
    ///
    /// Background services started here are terminated when the foreground
    /// service exits or the supervisor is interrupted, whichever comes first.
    /// A background service that fails to start, or dies during the grace
    /// period, is reported and does not prevent the foreground one from
    /// running. Services that were already running are left alone, and nothing
    /// is started when `foreground` itself is already running.
    ///
    /// # Errors
    /// Returns an error if the environment is missing or the foreground service
    /// is unknown or cannot be launched.
    pub async fn run_group(
        &mut self,
        background: &[&str],
        foreground: &str,
    ) -> Result<StartOutcome> {
        if self.env.is_none() {
            return Err(Error::EnvironmentNotLoaded);
        }
        self.spec(foreground)?;
        if let Some(record) = self.live(foreground)? {
            tracing::warn!(
                "`{foreground}` is already running ({}), not starting {}",
                record.pid,
                background.join(", ")
            );
            return Ok(StartOutcome::AlreadyRunning {
                id: record.id(),
                port: record.port,
            });
        }

        let result = if self.prepare_background(background).await {
            self.start(foreground, LaunchMode::Foreground).await
        } else {
            tracing::info!("Interrupted before `{foreground}` was started");
            Ok(StartOutcome::Interrupted)
        };

        let failures = self.shutdown().await;
        if !failures.is_empty() {
            tracing::warn!("{} background service(s) could not be stopped", failures.len());
        }

        result
    }

    /// Background phase of `run_group`. Returns `false` if interrupted.
    async fn prepare_background(&mut self, background: &[&str]) -> bool {
        let mut ports = Vec::new();
        let mut started_any = false;
        for name in background {
            if self.cancel.is_cancelled() {
                return false;
            }
            match self.start(name, LaunchMode::Background).await {
                Ok(StartOutcome::Started { id, port, log }) => {
                    tracing::info!("`{name}` started ({}), logging to {}", id.0, log.display());
                    self.background.push(*name, id);
                    ports.extend(port.map(|p| ((*name).to_owned(), p)));
                    started_any = true;
                }
                Ok(StartOutcome::AlreadyRunning { id, port }) => {
                    tracing::info!("`{name}` already running ({}), leaving it up", id.0);
                    ports.extend(port.map(|p| ((*name).to_owned(), p)));
                }
                Ok(StartOutcome::Finished { .. } | StartOutcome::Interrupted) => {}
                Err(err) => {
                    tracing::error!("Failed to start `{name}`: {err}");
                    self.emit(SupervisorEvent::Error {
                        service: (*name).to_owned(),
                        message: err.to_string(),
                    })
                    .await;
                }
            }
        }

        if started_any && !self.pause(self.project.settings.grace).await {
            return false;
        }

        let exited = self.drop_exited_background().await;
        ports.retain(|(name, _)| !exited.contains(name));

        if self.project.settings.open_browser {
            if let Some((_, port)) = ports.first() {
                if let Err(err) = browser::open_url(&browser::dashboard_url(*port)).await {
                    tracing::warn!("Cannot open the browser: {err}");
                }
            }
        }

        !self.cancel.is_cancelled()
    }

    /// Remove background services that are no longer alive from the shutdown
    /// list and the registry, reporting each one. Returns their names.
    async fn drop_exited_background(&mut self) -> Vec<String> {
        let mut exited = Vec::new();
        for (name, id) in self.background.take() {
            if self.pm.is_running(id) {
                self.background.push(name, id);
                continue;
            }

            let log = self.logs.today(&name);
            tracing::error!("`{name}` ({}) exited during startup, see {}", id.0, log.display());
            if let Err(err) = self.forget(&name, id) {
                tracing::warn!("Cannot drop the record of `{name}`: {err}");
            }
            self.emit(SupervisorEvent::Error {
                service: name.clone(),
                message: Error::ExitedEarly {
                    service: name.clone(),
                    log,
                }
                .to_string(),
            })
            .await;
            exited.push(name);
        }
        exited
    }
}
