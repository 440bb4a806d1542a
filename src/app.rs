//! Program entry shared by every binary.
//!
//! Parses the CLI, loads config, starts logging, runs one variant and prints
//! `Answer: <n>`. Logs go to a file because stdout carries the status line.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::display::Terminal;
use crate::indicator::IndicatorSpec;
use crate::substrate::{ProcessSubstrate, TaskSubstrate, ThreadSubstrate, process};
use crate::supervisor::{supervise, supervise_async_with};
use crate::work::{self, WorkResult};

pub fn setup_logging(default_level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(env!("CARGO_PKG_NAME"))
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join(format!("{}.log", env!("CARGO_PKG_NAME")));

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .try_init()
        .context("Failed to initialize logger")?;

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Run the program, using `default` when no subcommand was given.
pub fn standalone(default: Commands) -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(default);

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // The status line still works without a log file
    if let Err(e) = setup_logging(config.log_level.as_deref().unwrap_or("info")) {
        eprintln!("{} {:#}", "Logging disabled:".yellow(), e);
    }
    info!("Starting {:?} with config from: {:?}", command, cli.config);

    if let Commands::Indicator { message, interval_ms } = &command {
        return run_indicator_child(message, *interval_ms);
    }

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let result = run(&command, &config).context("Application failed")?;
    println!("Answer: {}", result);
    Ok(())
}

/// Supervise the slow work with the indicator on the chosen substrate.
pub fn run(command: &Commands, config: &Config) -> Result<WorkResult> {
    let spec = config.indicator_spec();
    let duration = config.work.duration();
    let answer = config.work.answer;

    match command {
        Commands::Thread => {
            let substrate = ThreadSubstrate::new(Terminal::new());
            println!("spinner object: {:?}", substrate);
            Ok(supervise(&substrate, &spec, || work::slow(duration, answer))?)
        }
        Commands::Process => {
            let substrate = ProcessSubstrate::current_exe()?;
            println!("spinner object: {:?}", substrate);
            Ok(supervise(&substrate, &spec, || work::slow(duration, answer))?)
        }
        Commands::Async => run_async(&spec, duration, answer),
        Commands::Indicator { .. } => Err(eyre::eyre!("indicator runs only as a child process")),
    }
}

fn run_async(spec: &IndicatorSpec, duration: Duration, answer: WorkResult) -> Result<WorkResult> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build scheduler")?;

    let substrate = TaskSubstrate::new(runtime.handle().clone(), Terminal::new());
    let result = runtime.block_on(supervise_async_with(
        &substrate,
        spec,
        |handle| println!("spinner object: {:?}", handle),
        || work::slow_async(duration, answer),
    ))?;
    Ok(result)
}

fn run_indicator_child(message: &str, interval_ms: u64) -> Result<()> {
    let spec = IndicatorSpec::new(message).with_interval(Duration::from_millis(interval_ms.max(1)));
    let report = process::run_child(spec).context("Indicator child failed")?;
    info!("Indicator child done after {} frames", report.frames);
    Ok(())
}
