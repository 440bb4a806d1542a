//! Cooperative task substrate
//!
//! The indicator is registered as a task on an explicitly passed tokio runtime
//! (normally a current-thread runtime, so supervisor and indicator share one
//! thread). Stopping it means aborting the task: the scheduler drops the
//! indicator at its next suspension point and the erase runs as part of that
//! drop. No flag is shared.

use std::fmt;

use log::debug;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::display::StatusLine;
use crate::error::{Result, SpinnerError};
use crate::indicator::{Indicator, IndicatorSpec, IndicatorState, StateCell, spin_cooperative};
use crate::stop::StopCondition;

use super::Termination;

/// Spawns indicators as tasks on a given runtime.
#[derive(Debug, Clone)]
pub struct TaskSubstrate<D> {
    runtime: Handle,
    display: D,
}

impl<D> TaskSubstrate<D>
where
    D: StatusLine + Clone + 'static,
{
    pub fn new(runtime: Handle, display: D) -> Self {
        Self { runtime, display }
    }

    /// Use the runtime the caller is running on.
    pub fn current(display: D) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| SpinnerError::Spawn(format!("no scheduler to run the indicator: {}", e)))?;
        Ok(Self::new(runtime, display))
    }

    /// Schedule an indicator. It first runs when the caller next yields.
    pub fn spawn(&self, spec: &IndicatorSpec) -> TaskHandle {
        let state = StateCell::new();
        let indicator = Indicator::with_state(spec.clone(), self.display.clone(), state.clone());
        let task = self.runtime.spawn(spin_cooperative(indicator));
        debug!("Scheduled indicator task {}", task.id());

        TaskHandle {
            stop: StopCondition::cancellable(task.abort_handle()),
            task,
            state,
        }
    }
}

/// Handle to an indicator task.
pub struct TaskHandle {
    task: JoinHandle<SpinnerError>,
    stop: StopCondition,
    state: StateCell,
}

impl TaskHandle {
    /// Request cancellation. Does not wait; safe to call more than once.
    pub fn stop(&self) {
        self.stop.raise();
        self.state.request_stop();
    }

    pub fn state(&self) -> IndicatorState {
        self.state.get()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to unwind. Cancellation is the only successful outcome.
    pub async fn join(self) -> Result<Termination> {
        let TaskHandle { task, stop, state } = self;
        let id = task.id();
        let joined = task.await;
        drop(stop);

        match joined {
            Ok(e) => Err(e),
            Err(e) if e.is_cancelled() => {
                debug!("Indicator task {} cancelled ({:?})", id, state.get());
                Ok(Termination::Cancelled)
            }
            Err(e) => Err(SpinnerError::Join(format!("indicator task {} failed: {}", id, e))),
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.task.id())
            .field("state", &self.state.get())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}
