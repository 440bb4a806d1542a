//! Stop conditions for the indicator.
//!
//! Two shapes of the same capability:
//! - pollable: a flag the indicator checks while it pauses between frames
//!   (threads and processes)
//! - cancellable: the scheduler aborts the indicator's task at its next
//!   suspension point (cooperative tasks)

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::task::AbortHandle;

/// A write-once flag that can be waited on with a timeout.
pub trait StopSignal: Send + Sync + fmt::Debug {
    /// Raise the flag. Calling this again has no further effect.
    fn set(&self);

    /// Block for up to `timeout`; true iff the flag is or becomes set.
    fn wait(&self, timeout: Duration) -> bool;

    fn is_set(&self) -> bool {
        self.wait(Duration::ZERO)
    }
}

/// In-process flag shared between threads by reference.
#[derive(Debug, Default)]
pub struct Event {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StopSignal for Event {
    fn set(&self) {
        let mut flag = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        *flag = true;
        self.cond.notify_all();
    }

    fn wait(&self, timeout: Duration) -> bool {
        let flag = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        if *flag || timeout.is_zero() {
            return *flag;
        }
        let (flag, _) = self
            .cond
            .wait_timeout_while(flag, timeout, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
        *flag
    }
}

/// How a stop request reaches the indicator.
#[derive(Debug)]
pub enum Capability {
    Pollable(Arc<dyn StopSignal>),
    Cancellable(AbortHandle),
}

/// The stop request for exactly one supervised indicator.
///
/// Dropping an unraised condition raises it, so an indicator never outlives
/// the handle that owns its stop condition.
pub struct StopCondition {
    capability: Capability,
    raised: AtomicBool,
}

impl StopCondition {
    pub fn pollable(signal: Arc<dyn StopSignal>) -> Self {
        Self {
            capability: Capability::Pollable(signal),
            raised: AtomicBool::new(false),
        }
    }

    pub fn cancellable(handle: AbortHandle) -> Self {
        Self {
            capability: Capability::Cancellable(handle),
            raised: AtomicBool::new(false),
        }
    }

    /// Ask the indicator to stop. Only the first call does anything.
    pub fn raise(&self) {
        if self.raised.swap(true, Ordering::AcqRel) {
            debug!("Stop condition already raised");
            return;
        }
        match &self.capability {
            Capability::Pollable(signal) => {
                debug!("Setting stop flag");
                signal.set();
            }
            Capability::Cancellable(handle) => {
                debug!("Requesting cancellation of indicator task");
                handle.abort();
            }
        }
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }
}

impl Drop for StopCondition {
    fn drop(&mut self) {
        if !self.is_raised() {
            self.raise();
        }
    }
}

impl fmt::Debug for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.capability {
            Capability::Pollable(_) => "pollable",
            Capability::Cancellable(_) => "cancellable",
        };
        f.debug_struct("StopCondition")
            .field("kind", &kind)
            .field("raised", &self.is_raised())
            .finish()
    }
}
