use futures::StreamExt;
use gridvisor_core::{BoxStream, CommandSpec, Exit, ProcessManager, UnixProcessManager};
use gridvisor_types::LaunchMode;
use std::{path::Path, time::Duration};

fn spec(script: &str, log: &Path, mode: LaunchMode) -> CommandSpec {
    CommandSpec {
        name: script.trim_end_matches(".sh").to_owned(),
        cmd: vec!["bash".to_owned(), format!("./{script}")],
        cwd: Some("./tests/fixtures/".parse().unwrap()),
        env: vec![],
        log: log.to_path_buf(),
        mode,
    }
}

async fn collect(mut stream: BoxStream<Vec<u8>>) -> String {
    let mut actual = String::new();
    while let Some(line) = stream.next().await {
        actual.push_str(&String::from_utf8_lossy(&line));
    }
    actual
}

#[tokio::test]
#[cfg(unix)]
async fn test_process_manager_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let mut pm = UnixProcessManager::new();

    let out = pm
        .spawn(spec("stdout.sh", &dir.path().join("x.log"), LaunchMode::Foreground))
        .await
        .unwrap();

    let output = out.output.unwrap();
    assert_eq!(
        collect(output.stdout).await,
        "INFO: line 1\nINFO: line 2\nINFO: stdout.sh finished\n"
    );
    assert_eq!(collect(output.stderr).await, "");
}

#[tokio::test]
#[cfg(unix)]
async fn test_process_manager_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let mut pm = UnixProcessManager::new();

    let out = pm
        .spawn(spec("stderr.sh", &dir.path().join("x.log"), LaunchMode::Foreground))
        .await
        .unwrap();

    let output = out.output.unwrap();
    assert_eq!(collect(output.stdout).await, "");
    assert_eq!(
        collect(output.stderr).await,
        "ERROR: line 1\nERROR: line 2\nERROR: stderr.sh finished\n"
    );
}

#[tokio::test]
#[cfg(unix)]
async fn test_process_manager_background_appends_to_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("both_20240101.log");
    std::fs::write(&log, "previous run\n").unwrap();
    let mut pm = UnixProcessManager::new();

    for script in ["stdout.sh", "stderr.sh"] {
        let out = pm
            .spawn(spec(script, &log, LaunchMode::Background))
            .await
            .unwrap();
        assert!(out.output.is_none());
        let exit = pm.wait(out.id, Duration::from_secs(5)).await.unwrap();
        assert_eq!(exit, Some(Exit::Code(0)));
    }

    assert_eq!(
        std::fs::read_to_string(&log).unwrap(),
        "previous run\nINFO: line 1\nINFO: line 2\nINFO: stdout.sh finished\n\
         ERROR: line 1\nERROR: line 2\nERROR: stderr.sh finished\n"
    );
}

#[tokio::test]
#[cfg(unix)]
async fn test_process_manager_env() {
    let dir = tempfile::tempdir().unwrap();
    let mut pm = UnixProcessManager::new();

    let mut spec = spec("env.sh", &dir.path().join("x.log"), LaunchMode::Foreground);
    spec.env = vec![
        ("PAIR".to_owned(), "DOGE/USDT".to_owned()),
        ("DASH_PORT".to_owned(), "8051".to_owned()),
    ];
    let out = pm.spawn(spec).await.unwrap();

    assert_eq!(
        collect(out.output.unwrap().stdout).await,
        "pair=DOGE/USDT port=8051\n"
    );
}

#[tokio::test]
#[cfg(unix)]
async fn test_process_manager_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let mut pm = UnixProcessManager::new();

    let out = pm
        .spawn(spec("exit_code.sh", &dir.path().join("x.log"), LaunchMode::Background))
        .await
        .unwrap();

    let exit = pm.wait(out.id, Duration::from_secs(5)).await.unwrap();
    assert_eq!(exit, Some(Exit::Code(3)));
    assert!(!pm.is_running(out.id));
    // Signalling an exited process is not an error.
    pm.shutdown(out.id).await.unwrap();
    pm.kill(out.id).await.unwrap();
}

#[tokio::test]
#[cfg(unix)]
async fn test_process_manager_missing_program() {
    let dir = tempfile::tempdir().unwrap();
    let mut pm = UnixProcessManager::new();

    let mut spec = spec("stdout.sh", &dir.path().join("x.log"), LaunchMode::Background);
    spec.cmd = vec!["./definitely-not-here".to_owned()];
    let result = pm.spawn(spec).await;

    assert!(matches!(
        result,
        Err(gridvisor_core::Error::ProcessLaunch { .. })
    ));
}

#[tokio::test]
#[cfg(unix)]
async fn test_process_manager_sigterm() {
    let dir = tempfile::tempdir().unwrap();
    let mut pm = UnixProcessManager::new();

    let out = pm
        .spawn(spec(
            "infinite_sigterm_exits.sh",
            &dir.path().join("x.log"),
            LaunchMode::Background,
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(pm.is_running(out.id));

    pm.shutdown(out.id).await.unwrap();
    let result = pm.wait(out.id, Duration::from_secs(5)).await.unwrap();
    assert_eq!(result, Some(Exit::Code(0)));
}

#[tokio::test]
#[cfg(unix)]
async fn test_process_manager_sigkill() {
    let dir = tempfile::tempdir().unwrap();
    let mut pm = UnixProcessManager::new();

    let out = pm
        .spawn(spec(
            "ignore_sigterm_sigkill_only.sh",
            &dir.path().join("x.log"),
            LaunchMode::Background,
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    pm.shutdown(out.id).await.unwrap();
    let result = pm.wait(out.id, Duration::from_millis(300)).await.unwrap();
    assert_eq!(result, None);
    pm.kill(out.id).await.unwrap();
    let result = pm.wait(out.id, Duration::from_secs(5)).await.unwrap();
    assert_eq!(result, Some(Exit::Signal(libc::SIGKILL)));
}

#[tokio::test]
#[cfg(unix)]
async fn test_process_manager_foreign_process() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("x.log");
    let mut first = UnixProcessManager::new();
    let out = first
        .spawn(spec("infinite_sigterm_exits.sh", &log, LaunchMode::Background))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // A second manager only knows the pid, like a later CLI invocation.
    let mut second = UnixProcessManager::new();
    assert!(second.is_running(out.id));
    second.shutdown(out.id).await.unwrap();

    assert_eq!(
        first.wait(out.id, Duration::from_secs(5)).await.unwrap(),
        Some(Exit::Code(0))
    );
    assert!(!second.is_running(out.id));
}
