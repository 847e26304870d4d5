use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{error::Result, Exit, ProcId, ProcessManager};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Termination {
    /// Exited after SIGTERM.
    Graceful(Exit),
    /// Needed SIGKILL.
    Killed,
}

/// SIGTERM the process group, wait up to `timeout`, then SIGKILL.
///
/// # Errors
///
/// Returns an error if a signal cannot be delivered.
pub async fn terminate<P: ProcessManager + ?Sized>(
    pm: &mut P,
    id: ProcId,
    timeout: Duration,
) -> Result<Termination> {
    pm.shutdown(id).await?;
    if let Some(exit) = pm.wait(id, timeout).await? {
        return Ok(Termination::Graceful(exit));
    }

    tracing::warn!("{id:?} ignored SIGTERM for {timeout:?}, sending SIGKILL");
    pm.kill(id).await?;
    let _ = pm.wait(id, Duration::from_millis(500)).await?;
    Ok(Termination::Killed)
}

/// Cancel `token` on the first Ctrl-C or SIGTERM.
///
/// The handlers are in place when this returns; from then on those signals no
/// longer terminate the process, they only cancel the token.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
pub fn cancel_on_signal(token: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = interrupt.recv() => tracing::info!("Received SIGINT"),
                _ = terminate.recv() => tracing::info!("Received SIGTERM"),
                () = token.cancelled() => return,
            }
            token.cancel();
        }))
    }

    #[cfg(not(unix))]
    {
        Ok(tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(err) = result {
                        tracing::warn!("Cannot listen for Ctrl-C: {err}");
                        return;
                    }
                }
                () = token.cancelled() => return,
            }
            token.cancel();
        }))
    }
}

/// Background children started by one invocation, in launch order.
#[derive(Debug, Default)]
pub struct ShutdownList {
    entries: Vec<(String, ProcId)>,
}

impl ShutdownList {
    pub fn push(&mut self, name: impl Into<String>, id: ProcId) {
        self.entries.push((name.into(), id));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Hand out every entry in launch order, leaving the list empty.
    pub fn take(&mut self) -> Vec<(String, ProcId)> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use gridvisor_types::LaunchMode;

    use super::*;
    use crate::{CommandSpec, MockProcessManager};

    #[tokio::test]
    async fn test_terminate_graceful() {
        let mut pm = MockProcessManager::default();
        let spawned = pm
            .spawn(CommandSpec {
                name: "dashboard".to_owned(),
                cmd: vec!["python3".to_owned()],
                cwd: None,
                env: vec![],
                log: "/tmp/dashboard.log".into(),
                mode: LaunchMode::Background,
            })
            .await
            .unwrap();

        let result = terminate(&mut pm, spawned.id, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(result, Termination::Graceful(Exit::Code(0)));
        assert_eq!(pm.state().shutdowns, vec![spawned.id]);
        assert!(pm.state().kills.is_empty());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_sigterm_cancels_token() {
        let token = CancellationToken::new();
        let handle = cancel_on_signal(token.clone()).unwrap();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_signal_task_ends_with_token() {
        let token = CancellationToken::new();
        let handle = cancel_on_signal(token.clone()).unwrap();

        token.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_list_keeps_launch_order() {
        let mut list = ShutdownList::default();
        list.push("dashboard", ProcId(1));
        list.push("profit-watcher", ProcId(2));

        assert_eq!(list.len(), 2);
        assert_eq!(
            list.take(),
            vec![
                ("dashboard".to_owned(), ProcId(1)),
                ("profit-watcher".to_owned(), ProcId(2)),
            ]
        );
        assert!(list.is_empty());
    }
}
