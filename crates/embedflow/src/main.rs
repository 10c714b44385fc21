//! Embedflow launcher
//!
//! Runs the local resource poller once, forever, or just checks its
//! configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use embedflow_logging::{init_logging, LogConfig};
use embedflow_poller::{handler_for, notifier_from_config, PollReport, PollerConfig, ResourceHandler};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "embedflow", about = "Poll application resources and notify the executor")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Directory for log files (default: $EMBEDFLOW_HOME/logs)
    #[arg(long, global = true, env = "EMBEDFLOW_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single poll pass
    Poll {
        /// Poller configuration file (TOML)
        #[arg(short, long, env = "EMBEDFLOW_CONFIG")]
        config: PathBuf,
    },

    /// Poll repeatedly until interrupted
    Watch {
        /// Poller configuration file (TOML)
        #[arg(short, long, env = "EMBEDFLOW_CONFIG")]
        config: PathBuf,

        /// Seconds between passes, overrides the configured interval
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Validate a configuration and print it with defaults filled in
    CheckConfig {
        /// Poller configuration file (TOML)
        #[arg(short, long, env = "EMBEDFLOW_CONFIG")]
        config: PathBuf,
    },
}

fn load_config(path: &Path) -> Result<PollerConfig> {
    let config = PollerConfig::load(path)
        .with_context(|| format!("Failed to load config: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    Ok(config)
}

fn build_handler(config: PollerConfig) -> Result<Box<dyn ResourceHandler>> {
    let notifier = notifier_from_config(&config.executor);
    handler_for(config, notifier).context("Failed to create resource handler")
}

fn print_report(report: &PollReport) {
    println!(
        "seen: {}  downloaded: {}  unchanged: {}  skipped: {}  errors: {}",
        report.files_seen,
        report.files_downloaded,
        report.files_unchanged,
        report.files_skipped,
        report.errors.len()
    );
    for name in &report.changed_files {
        println!("  + {}", name);
    }
    for err in &report.errors {
        println!("  ! {}: {}", err.path, err.message);
    }
    if report.has_changes() && !report.notified {
        println!("  executor was not notified, see logs");
    }
}

fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Poll { config } => {
            let mut handler = build_handler(load_config(&config)?)?;
            let report = handler.poll();
            print_report(&report);
            Ok(())
        }
        Commands::Watch { config, interval } => {
            let config = load_config(&config)?;
            let secs = interval.unwrap_or(config.poll_interval_secs).max(1);
            let mut handler = build_handler(config)?;
            info!(interval_secs = secs, "Watching for changes");
            loop {
                let report = handler.poll();
                if report.has_changes() || !report.errors.is_empty() {
                    print_report(&report);
                }
                std::thread::sleep(Duration::from_secs(secs));
            }
        }
        Commands::CheckConfig { config } => {
            let config = load_config(&config)?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

impl Commands {
    fn config_path(&self) -> &Path {
        match self {
            Commands::Poll { config } | Commands::CheckConfig { config } => config.as_path(),
            Commands::Watch { config, .. } => config.as_path(),
        }
    }
}

fn log_config(cli: &Cli) -> LogConfig {
    LogConfig::for_config_file(cli.command.config_path(), cli.verbose).with_log_dir(cli.log_dir.clone())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(&log_config(&cli)) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:?}", err);
            None
        }
    };

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch_with_interval() {
        let cli = Cli::try_parse_from(["embedflow", "-v", "watch", "--config", "p.toml", "--interval", "5"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Watch { config, interval } => {
                assert_eq!(config, PathBuf::from("p.toml"));
                assert_eq!(interval, Some(5));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_log_file_follows_config_name() {
        let cli = Cli::try_parse_from([
            "embedflow",
            "--log-dir",
            "/tmp/ef-logs",
            "poll",
            "--config",
            "/etc/embedflow/models.toml",
        ])
        .unwrap();
        let config = log_config(&cli);
        assert_eq!(config.name, "embedflow-models");
        assert_eq!(config.resolved_log_dir(), PathBuf::from("/tmp/ef-logs"));
    }

    #[test]
    fn test_load_config_rejects_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("poller.toml");
        std::fs::write(
            &path,
            "poll_interval_secs = 0\n\n[app_location]\npath = \"/srv/app\"\n",
        )
        .unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(format!("{:?}", err).contains("poll_interval_secs"));
    }

    #[test]
    fn test_poll_command_downloads() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        let out = temp.path().join("out");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join("a.csv"), "a").unwrap();

        let mut config = PollerConfig::local(app.to_string_lossy().to_string(), vec!["a.csv".to_string()]);
        config.download_location = out.to_string_lossy().to_string();
        let path = temp.path().join("poller.toml");
        config.save(&path).unwrap();

        let cli = Cli::try_parse_from(["embedflow", "poll", "--config", path.to_str().unwrap()]).unwrap();
        run_command(cli).unwrap();
        assert_eq!(std::fs::read_to_string(out.join("a.csv")).unwrap(), "a");
    }
}
