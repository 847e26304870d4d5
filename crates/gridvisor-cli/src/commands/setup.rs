use std::path::Path;

use anyhow::Result;
use gridvisor_core::setup::{setup as prepare, Dependencies};

use crate::{commands, config::GlobalArgs, logger::Logger};

const SYSTEM_PYTHON: &str = "python3";

pub async fn setup(global: &GlobalArgs) -> Result<()> {
    let project = commands::project(global)?;
    let settings = &project.settings;
    let report = prepare(settings, Path::new(SYSTEM_PYTHON)).await?;

    let mut logger = Logger::default();
    if report.venv_created {
        logger.system(&format!(
            "Created virtual environment in {}",
            settings.venv_dir.display()
        ));
    }
    match report.dependencies {
        Dependencies::Installed => logger.system("Dependencies installed"),
        Dependencies::NoRequirements => logger.system("No requirements.txt, nothing to install"),
        Dependencies::Failed(message) => logger.error(&message),
    }
    if report.env_file_created {
        logger.system(&format!(
            "Created {}; fill in your exchange credentials before starting the bot",
            settings.env_file.display()
        ));
    } else if !settings.env_file.exists() {
        logger.error(&format!("{} is missing", settings.env_file.display()));
    }
    logger.system("Setup complete");
    Ok(())
}
