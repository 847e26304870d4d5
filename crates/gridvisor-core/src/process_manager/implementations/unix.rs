use std::{
    collections::HashMap,
    fs::OpenOptions,
    os::unix::process::ExitStatusExt,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use futures::StreamExt;
use gridvisor_types::LaunchMode;
use libc::{killpg, setsid, SIGKILL, SIGTERM};
use tokio::{
    io::BufReader,
    process::{Child, Command},
    time::{sleep, Instant},
};
use tokio_util::io::ReaderStream;

use crate::{
    error::{Error, Result},
    process_manager::{
        base::ProcessManager,
        types::{CommandSpec, Exit, Output, ProcId, Spawned},
    },
};

fn to_exit(status: ExitStatus) -> Exit {
    match (status.code(), status.signal()) {
        (Some(code), _) => Exit::Code(code),
        (None, Some(signal)) => Exit::Signal(signal),
        (None, None) => Exit::Unknown,
    }
}

fn to_pid(id: ProcId) -> Result<libc::pid_t> {
    libc::pid_t::try_from(id.0).map_err(|_| Error::UnknownProcess(id))
}

fn signal_group(id: ProcId, signal: libc::c_int) -> Result<()> {
    let pgid = to_pid(id)?;

    #[allow(unsafe_code)]
    let rc = unsafe { killpg(pgid, signal) };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        // Group already gone.
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        return Err(Error::IOError(err));
    }

    Ok(())
}

/// Unix-specific process manager.
#[derive(Debug, Default)]
pub struct UnixProcessManager {
    children: HashMap<ProcId, Child>,
    exited: HashMap<ProcId, Exit>,
}

impl UnixProcessManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reap our own child if it has exited, remembering its status.
    fn poll_child(&mut self, id: ProcId) -> Option<Exit> {
        if let Some(exit) = self.exited.get(&id) {
            return Some(*exit);
        }
        let child = self.children.get_mut(&id)?;
        match child.try_wait() {
            Ok(Some(status)) => {
                let exit = to_exit(status);
                self.children.remove(&id);
                self.exited.insert(id, exit);
                Some(exit)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!("Cannot poll process {id:?}: {err}");
                None
            }
        }
    }

    fn is_alive(id: ProcId) -> bool {
        let Ok(pid) = to_pid(id) else {
            return false;
        };

        #[allow(unsafe_code)]
        let rc = unsafe { libc::kill(pid, 0) };
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}

#[async_trait::async_trait]
impl ProcessManager for UnixProcessManager {
    async fn spawn(&mut self, spec: CommandSpec) -> Result<Spawned> {
        let launch_error = |source| Error::ProcessLaunch {
            service: spec.name.clone(),
            source,
        };

        let Some((program, args)) = spec.cmd.split_first() else {
            return Err(launch_error(std::io::Error::other("empty command")));
        };

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        #[allow(unsafe_code)]
        unsafe {
            cmd.pre_exec(|| {
                if setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        cmd.stdin(Stdio::null());
        match spec.mode {
            LaunchMode::Foreground => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            LaunchMode::Background => {
                let log = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&spec.log)?;
                cmd.stdout(Stdio::from(log.try_clone()?))
                    .stderr(Stdio::from(log));
            }
        }

        let mut child = cmd.spawn().map_err(launch_error)?;

        let id = ProcId(
            child
                .id()
                .ok_or_else(|| Error::IOError(std::io::Error::other("pid not available")))?,
        );

        let output = match spec.mode {
            LaunchMode::Background => None,
            LaunchMode::Foreground => {
                let stdout = child
                    .stdout
                    .take()
                    .ok_or_else(|| Error::IOError(std::io::Error::other("stdout not piped")))?;
                let stderr = child
                    .stderr
                    .take()
                    .ok_or_else(|| Error::IOError(std::io::Error::other("stderr not piped")))?;

                let out_stream = ReaderStream::new(BufReader::new(stdout))
                    .filter_map(|res| async move { res.ok().map(|b| b.to_vec()) });
                let err_stream = ReaderStream::new(BufReader::new(stderr))
                    .filter_map(|res| async move { res.ok().map(|b| b.to_vec()) });

                Some(Output {
                    stdout: Box::pin(out_stream),
                    stderr: Box::pin(err_stream),
                })
            }
        };

        tracing::debug!("Spawned `{}` as {id:?} ({:?})", spec.name, spec.mode);
        self.exited.remove(&id);
        self.children.insert(id, child);

        Ok(Spawned { id, output })
    }

    async fn shutdown(&mut self, id: ProcId) -> Result<()> {
        if self.poll_child(id).is_some() {
            return Ok(());
        }
        signal_group(id, SIGTERM)
    }

    async fn wait(&mut self, id: ProcId, d: Duration) -> Result<Option<Exit>> {
        let own = self.children.contains_key(&id) || self.exited.contains_key(&id);

        let start = Instant::now();
        loop {
            if own {
                if let Some(exit) = self.poll_child(id) {
                    return Ok(Some(exit));
                }
            } else if !Self::is_alive(id) {
                return Ok(Some(Exit::Unknown));
            }

            if start.elapsed() >= d {
                return Ok(None);
            }
            sleep(Duration::from_millis(50)).await;
        }
    }

    async fn kill(&mut self, id: ProcId) -> Result<()> {
        if self.poll_child(id).is_some() {
            return Ok(());
        }
        signal_group(id, SIGKILL)
    }

    fn is_running(&mut self, id: ProcId) -> bool {
        if self.children.contains_key(&id) || self.exited.contains_key(&id) {
            return self.poll_child(id).is_none();
        }
        Self::is_alive(id)
    }
}
