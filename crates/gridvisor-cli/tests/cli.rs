use std::{
    net::TcpListener,
    path::Path,
    process::{Command, Output, Stdio},
    thread::sleep,
    time::{Duration, Instant},
};

const VALID_ENV: &str = "\
BINANCE_API_KEY=key
BINANCE_API_SECRET=secret
BINANCE_REGION=us
PAIR=DOGE/USDT
";

fn gridvisor(root: &Path, args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_gridvisor"));
    command
        .arg("--root")
        .arg(root)
        .args(args)
        .env_remove("GRIDVISOR_ROOT")
        .env_remove("DASH_PORT")
        .env_remove("AUTO_OPEN_BROWSER")
        .env_remove("BACKFILL_DAYS")
        .env("RUST_LOG", "warn");
    command
}

fn run(command: &mut Command) -> Output {
    command.output().unwrap()
}

fn recorded_pid(root: &Path, service: &str) -> Option<u32> {
    let record = root.join(".gridvisor").join(format!("{service}.json"));
    let text = std::fs::read_to_string(record).ok()?;
    let rest = text.split("\"pid\":").nth(1)?.trim_start();
    rest.split(|c: char| !c.is_ascii_digit()).next()?.parse().ok()
}

fn is_alive(pid: u32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(Stdio::null())
        .status()
        .unwrap()
        .success()
}

fn wait_for<T>(timeout: Duration, mut probe: impl FnMut() -> Option<T>) -> Option<T> {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if let Some(value) = probe() {
            return Some(value);
        }
        sleep(Duration::from_millis(50));
    }
    None
}

#[test]
fn test_unknown_region_starts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".env"),
        VALID_ENV.replace("BINANCE_REGION=us", "BINANCE_REGION=uk"),
    )
    .unwrap();

    let output = run(&mut gridvisor(dir.path(), &["all"]));

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("BINANCE_REGION"));
    assert!(!dir.path().join("logs").exists());
    assert!(!dir.path().join(".gridvisor").exists());
}

#[test]
fn test_missing_env_file_starts_nothing() {
    let dir = tempfile::tempdir().unwrap();

    let output = run(&mut gridvisor(dir.path(), &["bot"]));

    assert!(!output.status.success());
    assert!(!dir.path().join("logs").exists());
}

#[test]
fn test_dashboard_without_free_port() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), VALID_ENV).unwrap();
    std::fs::write(
        dir.path().join("gridvisor.toml"),
        "[settings]\nport_attempts = 1\n",
    )
    .unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port().to_string();

    let output = run(gridvisor(dir.path(), &["dashboard"]).env("DASH_PORT", &port));

    assert!(!output.status.success());
    assert!(!dir.path().join("logs").exists());
    assert!(!dir.path().join(".gridvisor").join("dashboard.json").exists());
    drop(listener);
}

#[test]
fn test_stop_and_status_with_nothing_running() {
    let dir = tempfile::tempdir().unwrap();

    let output = run(&mut gridvisor(dir.path(), &["stop"]));
    assert!(output.status.success());

    let output = run(&mut gridvisor(dir.path(), &["status"]));
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["bot", "dashboard", "profit-watcher"] {
        assert!(stdout.contains(name), "{name} missing from {stdout}");
    }
    assert_eq!(stdout.matches("STOPPED").count(), 3);
}

#[test]
fn test_unknown_command() {
    let dir = tempfile::tempdir().unwrap();

    let output = run(&mut gridvisor(dir.path(), &["launch"]));

    assert!(!output.status.success());
}

#[test]
#[cfg(unix)]
fn test_interrupt_during_grace_stops_background() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), VALID_ENV).unwrap();
    std::fs::write(
        dir.path().join("gridvisor.toml"),
        r#"
[settings]
grace_secs = 30

[services.dashboard]
cmd = ["sleep", "60"]

[services.profit-watcher]
cmd = ["sleep", "61"]

[services.bot]
cmd = ["sleep", "62"]
"#,
    )
    .unwrap();

    let mut supervisor = gridvisor(dir.path(), &["all"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let pids = wait_for(Duration::from_secs(10), || {
        Some((
            recorded_pid(dir.path(), "dashboard")?,
            recorded_pid(dir.path(), "profit-watcher")?,
        ))
    })
    .expect("background services were not started");

    let status = Command::new("kill")
        .args(["-INT", &supervisor.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let exit = wait_for(Duration::from_secs(10), || supervisor.try_wait().unwrap())
        .expect("supervisor did not exit after SIGINT");
    assert!(exit.success());
    assert!(!is_alive(pids.0), "dashboard still running");
    assert!(!is_alive(pids.1), "profit-watcher still running");
    assert!(recorded_pid(dir.path(), "bot").is_none());
}

#[test]
#[cfg(unix)]
fn test_dashboard_that_exits_at_startup_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), VALID_ENV).unwrap();
    std::fs::write(
        dir.path().join("gridvisor.toml"),
        r#"
[settings]
grace_secs = 1

[services.dashboard]
cmd = ["sh", "-c", "exit 1"]
needs_port = true
"#,
    )
    .unwrap();

    let output = run(&mut gridvisor(dir.path(), &["dashboard"]));

    assert!(!output.status.success());
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Dashboard available"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("exited right after starting"));
    assert!(recorded_pid(dir.path(), "dashboard").is_none());
}
