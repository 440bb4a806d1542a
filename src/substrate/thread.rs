//! Thread substrate
//!
//! The indicator runs on its own OS thread and polls an [`Event`] shared by
//! reference with the supervising thread.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::debug;

use crate::display::StatusLine;
use crate::error::{Result, SpinnerError};
use crate::indicator::{Indicator, IndicatorReport, IndicatorSpec, IndicatorState, StateCell, spin_polling};
use crate::stop::{Event, StopCondition};

use super::{IndicatorHandle, Substrate, Termination};

/// Default name given to indicator threads.
pub const THREAD_NAME: &str = "spinner";

/// Spawns indicators on dedicated threads, drawing on clones of `display`.
#[derive(Debug, Clone)]
pub struct ThreadSubstrate<D> {
    display: D,
    name: String,
}

impl<D> ThreadSubstrate<D>
where
    D: StatusLine + Clone + 'static,
{
    pub fn new(display: D) -> Self {
        Self {
            display,
            name: THREAD_NAME.to_string(),
        }
    }

    /// Name the indicator thread.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<D> Substrate for ThreadSubstrate<D>
where
    D: StatusLine + Clone + 'static,
{
    type Handle = ThreadHandle;

    fn spawn(&self, spec: &IndicatorSpec) -> Result<ThreadHandle> {
        let event = Arc::new(Event::new());
        let state = StateCell::new();
        let indicator = Indicator::with_state(spec.clone(), self.display.clone(), state.clone());

        let flag = event.clone();
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || spin_polling(indicator, flag.as_ref()))
            .map_err(|e| SpinnerError::Spawn(format!("thread '{}': {}", self.name, e)))?;

        debug!("Spawned indicator thread '{}'", self.name);
        Ok(ThreadHandle {
            name: self.name.clone(),
            handle,
            stop: StopCondition::pollable(event),
            state,
        })
    }
}

/// Handle to an indicator thread.
pub struct ThreadHandle {
    name: String,
    handle: JoinHandle<Result<IndicatorReport>>,
    stop: StopCondition,
    state: StateCell,
}

impl ThreadHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl IndicatorHandle for ThreadHandle {
    fn stop(&self) {
        self.stop.raise();
        self.state.request_stop();
    }

    fn state(&self) -> IndicatorState {
        self.state.get()
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn join(self) -> Result<Termination> {
        let ThreadHandle { name, handle, stop, .. } = self;
        let report = handle
            .join()
            .map_err(|_| SpinnerError::Join(format!("indicator thread '{}' panicked", name)))??;
        debug!("Joined indicator thread '{}' ({} frames)", name, report.frames);
        drop(stop);
        Ok(Termination::Stopped(report))
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("name", &self.name)
            .field("state", &self.state.get())
            .finish()
    }
}
