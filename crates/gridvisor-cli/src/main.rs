use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod logger;

use commands::service::Launch;
use config::{Cli, Commands};
use logger::Logger;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let global = &cli.global;
    let done = |()| 0;
    match cli.command {
        Commands::Setup => commands::setup::setup(global).await.map(done),
        Commands::Bot => commands::service::launch(global, Launch::Bot).await,
        Commands::Dashboard => commands::service::launch(global, Launch::Dashboard).await,
        Commands::ProfitWatcher => commands::service::launch(global, Launch::ProfitWatcher).await,
        Commands::Both => commands::service::launch(global, Launch::Both).await,
        Commands::All => commands::service::launch(global, Launch::All).await,
        Commands::Status { lines } => commands::status::status(global, lines).await.map(done),
        Commands::Logs {
            component,
            lines,
            follow,
        } => commands::logs::logs(global, component, lines, follow)
            .await
            .map(done),
        Commands::Stop { service } => commands::service::stop(global, service).await.map(done),
        Commands::Restart { service } => {
            commands::service::restart(global, &service).await.map(done)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            Logger::stderr().error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
