//! Prepares the runtime environment: directories, Python venv, dependencies.

use std::{path::Path, process::Stdio};

use gridvisor_types::Settings;
use tokio::process::Command;

use crate::error::{Error, Result};

pub const REQUIREMENTS_FILE: &str = "requirements.txt";
pub const ENV_TEMPLATE: &str = ".env.example";

#[derive(Debug, PartialEq, Eq)]
pub enum Dependencies {
    Installed,
    NoRequirements,
    /// Installation failed; whatever was already installed is kept.
    Failed(String),
}

#[derive(Debug)]
pub struct SetupReport {
    pub venv_created: bool,
    pub dependencies: Dependencies,
    pub env_file_created: bool,
}

async fn run(program: &Path, args: &[&str], cwd: &Path, what: &str) -> Result<()> {
    tracing::info!("Running {} {}", program.display(), args.join(" "));
    let status = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|source| Error::ProcessLaunch {
            service: what.to_owned(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::Setup(format!("{what} exited with {status}")))
    }
}

/// Create directories and the virtual environment, then install dependencies.
///
/// `python` is the interpreter used to create the venv.
///
/// # Errors
///
/// Returns an error if a directory cannot be created or the venv cannot be
/// built. A failed dependency install is reported in the result instead.
pub async fn setup(settings: &Settings, python: &Path) -> Result<SetupReport> {
    std::fs::create_dir_all(&settings.log_dir)?;
    std::fs::create_dir_all(&settings.state_dir)?;

    let venv_python = settings.venv_dir.join("bin").join("python");
    let venv_created = if venv_python.exists() {
        tracing::info!("Virtual environment found at {}", settings.venv_dir.display());
        false
    } else {
        let venv = settings.venv_dir.to_string_lossy();
        run(python, &["-m", "venv", &venv], &settings.root, "venv").await?;
        true
    };

    let requirements = settings.root.join(REQUIREMENTS_FILE);
    let dependencies = if requirements.is_file() {
        let pip = settings.venv_dir.join("bin").join("pip");
        match run(
            &pip,
            &["install", "-r", REQUIREMENTS_FILE],
            &settings.root,
            "pip",
        )
        .await
        {
            Ok(()) => Dependencies::Installed,
            Err(err) => {
                let err = Error::DependencyInstall(err.to_string());
                tracing::warn!("{err}; continuing with the installed packages");
                Dependencies::Failed(err.to_string())
            }
        }
    } else {
        Dependencies::NoRequirements
    };

    let template = settings.root.join(ENV_TEMPLATE);
    let env_file_created = if !settings.env_file.exists() && template.is_file() {
        std::fs::copy(&template, &settings.env_file)?;
        tracing::warn!(
            "Created {} from {ENV_TEMPLATE}; fill in the exchange credentials",
            settings.env_file.display()
        );
        true
    } else {
        false
    };

    Ok(SetupReport {
        venv_created,
        dependencies,
        env_file_created,
    })
}
