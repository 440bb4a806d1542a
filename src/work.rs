//! Stand-ins for the slow call the indicator covers for.

use std::thread;
use std::time::Duration;

use log::info;

use crate::error::{Result, SpinnerError};

/// Value produced by the unit of work.
pub type WorkResult = i64;

pub const DEFAULT_ANSWER: WorkResult = 42;

pub const DEFAULT_DURATION: Duration = Duration::from_secs(3);

/// Block the calling thread for `duration`, then return `answer`.
pub fn slow(duration: Duration, answer: WorkResult) -> Result<WorkResult> {
    info!("Slow work started ({:?})", duration);
    thread::sleep(duration);
    Ok(answer)
}

/// Suspend the calling task for `duration`, then return `answer`.
pub async fn slow_async(duration: Duration, answer: WorkResult) -> Result<WorkResult> {
    info!("Slow work started ({:?})", duration);
    tokio::time::sleep(duration).await;
    Ok(answer)
}

/// Block for `duration`, then fail with `reason`.
pub fn failing(duration: Duration, reason: &str) -> Result<WorkResult> {
    thread::sleep(duration);
    Err(SpinnerError::Work(reason.to_string()))
}

/// Suspend for `duration`, then fail with `reason`.
pub async fn failing_async(duration: Duration, reason: &str) -> Result<WorkResult> {
    tokio::time::sleep(duration).await;
    Err(SpinnerError::Work(reason.to_string()))
}
