//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - thread: indicator on an OS thread
//! - process: indicator in a child process
//! - async: indicator as a cooperative task
//! - indicator (hidden): child-process entry used by `process`

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Spinner - a busy indicator supervised three ways
#[derive(Parser, Debug)]
#[command(name = "spinner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the indicator on a thread while the main thread blocks
    Thread,

    /// Run the indicator in a child process
    Process,

    /// Run the indicator as a task on a single-threaded scheduler
    Async,

    /// Animate until stdin says stop (child side of `process`)
    #[command(hide = true)]
    Indicator {
        /// Message shown next to the frame
        #[arg(long)]
        message: String,

        /// Pause between frames in milliseconds
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },
}
