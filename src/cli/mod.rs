//! CLI module for spinner - command-line interface and subcommands.
//!
//! Every binary shares the same [`Cli`]; they differ only in which variant
//! runs when no subcommand is given.

pub mod commands;

pub use commands::{Cli, Commands};
