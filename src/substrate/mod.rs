//! Substrate adapters
//!
//! Each adapter knows how to start an indicator as a concurrent unit and how to
//! deliver its stop condition:
//! - [`thread`]: OS thread, shared in-process flag
//! - [`process`]: child process, flag proxied over a pipe
//! - [`task`]: tokio task on a single-threaded scheduler, cancelled by abort

pub mod process;
pub mod task;
pub mod thread;

use std::fmt;

pub use process::{ProcessHandle, ProcessSubstrate};
pub use task::{TaskHandle, TaskSubstrate};
pub use thread::{ThreadHandle, ThreadSubstrate};

use crate::error::Result;
use crate::indicator::{IndicatorReport, IndicatorSpec, IndicatorState};

/// How an indicator ended, as seen by whoever joined it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Observed the stop flag and erased its line
    Stopped(IndicatorReport),
    /// Child process exited cleanly after observing the stop flag
    Exited,
    /// Cancelled by the scheduler at a suspension point
    Cancelled,
}

/// A substrate whose units are started and joined with blocking calls.
pub trait Substrate {
    type Handle: IndicatorHandle;

    /// Start an indicator without waiting for it.
    fn spawn(&self, spec: &IndicatorSpec) -> Result<Self::Handle>;
}

/// Handle to one running indicator.
pub trait IndicatorHandle: fmt::Debug {
    /// Raise the stop condition. Safe to call more than once.
    fn stop(&self);

    fn state(&self) -> IndicatorState;

    fn is_finished(&self) -> bool;

    /// Block until the indicator has exited and erased its line.
    fn join(self) -> Result<Termination>;
}
