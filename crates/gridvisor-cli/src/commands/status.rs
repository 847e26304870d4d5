use anyhow::Result;
use chrono::{DateTime, Duration, Local};
use colored::Colorize;
use gridvisor_core::{dashboard_url, ServiceState, Status};

use crate::commands;
use crate::config::GlobalArgs;

fn uptime(started_at: DateTime<Local>, now: DateTime<Local>) -> String {
    let elapsed = (now - started_at).max(Duration::zero());
    let secs = elapsed.num_seconds();
    let (days, secs) = (secs / 86_400, secs % 86_400);
    let (hours, mins, secs) = (secs / 3600, secs % 3600 / 60, secs % 60);
    if days > 0 {
        format!("{days}d {hours:02}:{mins:02}:{secs:02}")
    } else {
        format!("{hours:02}:{mins:02}:{secs:02}")
    }
}

fn render(state: &ServiceState, now: DateTime<Local>) -> String {
    let status = match state.status {
        Status::Running => state.status.to_string().green().bold(),
        Status::Stopped => state.status.to_string().red(),
    };
    let mut out = format!("{:<16} {status}", state.name);
    if let Some(pid) = state.pid {
        out.push_str(&format!("  pid {pid}"));
    }
    if let Some(started_at) = state.started_at {
        out.push_str(&format!("  up {}", uptime(started_at, now)));
    }
    if let Some(port) = state.port {
        out.push_str(&format!("  {}", dashboard_url(port)));
    }
    out.push_str(&format!("\n  log: {}", state.log.display()));
    for line in &state.tail {
        out.push_str(&format!("\n  | {line}"));
    }
    out
}

pub async fn status(global: &GlobalArgs, lines: usize) -> Result<()> {
    let project = commands::project(global)?;
    let (mut supervisor, printer) = commands::inspector(project)?;

    let states = supervisor.status(lines);
    commands::finish(supervisor, printer).await;

    let now = Local::now();
    for state in states? {
        println!("{}", render(&state, now));
    }
    Ok(())
}
