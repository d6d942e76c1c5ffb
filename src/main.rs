mod commands;
mod render;
mod utils;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use schoolcal_core::baseline::parse_month_override;
use schoolcal_core::config::Settings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "schoolcal", version)]
#[command(about = "Merge school calendar events, publish the snapshot and check the published copy")]
struct Cli {
    /// Config file (default: ~/.config/schoolcal/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Also append logs to this file (default: `log_file` from config)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild, validate, write and publish the snapshot
    Update {
        /// Treat this date as today (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        no_publish: bool,
    },
    /// Extract events from new inbox documents, then update
    Scan {
        #[arg(long)]
        no_publish: bool,
    },
    /// Merge a JSON file of extracted events, then update
    Merge {
        file: PathBuf,

        #[arg(long)]
        no_publish: bool,
    },
    /// Extract events from one PDF and print them
    Extract {
        file: PathBuf,

        /// Also write the events to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare the local and published snapshots with the baseline
    Verify {
        /// Republish when only the published copy is wrong
        #[arg(long)]
        fix: bool,

        /// Expected total event count
        #[arg(long)]
        expect_total: Option<usize>,

        /// Expected count for one month, e.g. 10=9 (repeatable)
        #[arg(long, value_parser = parse_month_override)]
        expect_month: Vec<(u32, usize)>,
    },
    /// Pin or show the expected event counts
    Baseline {
        #[command(subcommand)]
        action: BaselineAction,
    },
    /// Remove one event by date and exact title
    Retract {
        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        title: String,

        #[arg(long)]
        no_publish: bool,
    },
    /// Drop events dated before a cutoff
    Prune {
        #[arg(long)]
        before: NaiveDate,

        #[arg(long)]
        no_publish: bool,
    },
}

#[derive(Subcommand)]
enum BaselineAction {
    /// Pin counts from the local snapshot
    Pin,
    /// Print the pinned counts
    Show,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let log_file = cli
        .log_file
        .clone()
        .or_else(|| Settings::load(config).ok().and_then(|s| s.log_file()));
    // Flushes the file writer on drop
    let _log_guard = setup_tracing(cli.log_format, cli.verbose, log_file.as_deref())?;

    match cli.command {
        Commands::Update { date, no_publish } => {
            commands::update::run(config, date, no_publish).await?
        }
        Commands::Scan { no_publish } => commands::scan::run(config, no_publish).await?,
        Commands::Merge { file, no_publish } => {
            commands::merge::run(config, &file, no_publish).await?
        }
        Commands::Extract { file, output } => {
            commands::extract::run(config, &file, output.as_deref()).await?
        }
        Commands::Verify {
            fix,
            expect_total,
            expect_month,
        } => {
            let code = commands::verify::run(config, fix, expect_total, &expect_month).await?;
            return Ok(ExitCode::from(code));
        }
        Commands::Baseline { action } => match action {
            BaselineAction::Pin => commands::baseline::pin(config)?,
            BaselineAction::Show => commands::baseline::show(config)?,
        },
        Commands::Retract {
            date,
            title,
            no_publish,
        } => commands::retract::run(config, date, &title, no_publish).await?,
        Commands::Prune { before, no_publish } => {
            commands::prune::run(config, before, no_publish).await?
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_tracing(
    format: LogFormat,
    verbose: bool,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            tracing_subscriber::EnvFilter::new("schoolcal=debug,schoolcal_core=debug,warn")
        } else {
            tracing_subscriber::EnvFilter::new("schoolcal=info,schoolcal_core=info,warn")
        }
    });

    let (file_writer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_log_file(path)?);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };
    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
    });

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }

    Ok(guard)
}

/// Append-only log file; the parent directory is created if missing.
fn open_log_file(path: &Path) -> Result<RollingFileAppender> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let Some(name) = path.file_name() else {
        anyhow::bail!("Log file path has no file name: {}", path.display());
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Could not create log directory {}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy().into_owned())
        .build(dir)
        .with_context(|| format!("Could not open log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_created_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("update.log");

        let appender = open_log_file(&path).unwrap();
        drop(appender);
        assert!(path.exists());
    }

    #[test]
    fn test_log_file_flag_parses() {
        let cli = Cli::try_parse_from(["schoolcal", "--log-file", "/tmp/update.log", "baseline", "show"])
            .unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/update.log")));
    }
}
