//! Spinner - a busy indicator supervised over three concurrency models
//!
//! A supervisor starts an indicator, runs a slow call, stops the indicator and
//! waits for it to erase itself before handing back the result. The indicator
//! can live on an OS thread, in a child process, or as a cooperative task.

pub mod app;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod indicator;
pub mod stop;
pub mod substrate;
pub mod supervisor;
pub mod work;

pub use error::{Result, SpinnerError};
