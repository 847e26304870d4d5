use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use gridvisor_core::logs::{read_new, tail, LogDir};
use gridvisor_types::Project;

use crate::{commands, config::GlobalArgs, logger::Logger};

const FOLLOW_INTERVAL: Duration = Duration::from_millis(500);

fn targets(
    project: &Project,
    logs: &LogDir,
    component: Option<String>,
) -> Result<Vec<(String, PathBuf)>> {
    let names: Vec<String> = match component {
        Some(name) => {
            if !project.services.contains_key(&name) && !logs.today(&name).exists() {
                anyhow::bail!("Unknown service `{name}`");
            }
            vec![name]
        }
        None => project.services.keys().cloned().collect(),
    };
    Ok(names
        .into_iter()
        .map(|name| {
            let path = logs.today(&name);
            (name, path)
        })
        .collect())
}

pub async fn logs(
    global: &GlobalArgs,
    component: Option<String>,
    lines: usize,
    follow: bool,
) -> Result<()> {
    let project = commands::project(global)?;
    let logs = LogDir::new(project.settings.log_dir.clone());
    let targets = targets(&project, &logs, component)?;
    let mut logger = Logger::default();

    let mut offsets = Vec::with_capacity(targets.len());
    for (name, path) in &targets {
        if !path.exists() {
            logger.system(&format!("No log for {name} today ({})", path.display()));
        }
        for line in tail(path, lines)? {
            logger.log(name, &line);
        }
        offsets.push(std::fs::metadata(path).map_or(0, |m| m.len()));
    }

    if !follow {
        return Ok(());
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            () = tokio::time::sleep(FOLLOW_INTERVAL) => {}
        }
        for ((name, path), offset) in targets.iter().zip(offsets.iter_mut()) {
            let (chunk, next) = read_new(path, *offset)?;
            *offset = next;
            if !chunk.is_empty() {
                logger.log(name, &String::from_utf8_lossy(&chunk));
            }
        }
    }
}
