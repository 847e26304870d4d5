use std::path::PathBuf;

use clap::{builder::BoolishValueParser, Args, Parser, Subcommand};
use gridvisor_config::Overrides;

/// CLI for gridvisor
#[derive(Parser, Debug)]
#[command(
    name = "gridvisor",
    version,
    about = "Supervisor for the grid trading bot, its dashboard and profit watcher"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Project root holding the services, `.env` and `gridvisor.toml`
    #[arg(long, global = true, env = "GRIDVISOR_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Env file with exchange credentials and trading parameters
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// First port tried for the dashboard
    #[arg(long, global = true, env = "DASH_PORT")]
    pub port: Option<u16>,

    /// Open the dashboard in a browser once it is up
    #[arg(
        long,
        global = true,
        env = "AUTO_OPEN_BROWSER",
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub open_browser: Option<bool>,

    /// Launch the profit watcher with a backfill of this many days
    #[arg(long, global = true, env = "BACKFILL_DAYS")]
    pub backfill_days: Option<u32>,
}

impl GlobalArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            root: self.root.clone(),
            env_file: self.env_file.clone(),
            dashboard_port: self.port,
            open_browser: self.open_browser,
            backfill_days: self.backfill_days,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create directories, the virtual environment and install dependencies
    Setup,

    /// Run the trading bot in the foreground
    Bot,

    /// Start the dashboard in the background
    Dashboard,

    /// Start the profit watcher in the background
    ProfitWatcher,

    /// Dashboard in the background, bot in the foreground
    Both,

    /// Dashboard and profit watcher in the background, bot in the foreground
    All,

    /// Show which services are running
    Status {
        /// Log lines shown per service
        #[arg(short = 'n', long, default_value_t = 5)]
        lines: usize,
    },

    /// Print the log of one service, or of every service
    Logs {
        component: Option<String>,

        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,

        /// Keep printing new lines until interrupted
        #[arg(short, long)]
        follow: bool,
    },

    /// Stop one service, or every service
    Stop { service: Option<String> },

    /// Stop a service and start it again in the background
    Restart { service: String },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_logs() {
        let cli = Cli::parse_from(["gridvisor", "--root", "/srv/grid", "logs", "bot", "-n", "10"]);
        assert_eq!(cli.global.root, PathBuf::from("/srv/grid"));
        match cli.command {
            Commands::Logs {
                component,
                lines,
                follow,
            } => {
                assert_eq!(component.as_deref(), Some("bot"));
                assert_eq!(lines, 10);
                assert!(!follow);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_open_browser_flag() {
        let cli = Cli::parse_from(["gridvisor", "all", "--open-browser"]);
        assert_eq!(cli.global.open_browser, Some(true));

        let cli = Cli::parse_from(["gridvisor", "all", "--open-browser", "no"]);
        assert_eq!(cli.global.open_browser, Some(false));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["gridvisor", "launch"]).is_err());
    }
}
