//! Supervisor
//!
//! Runs one indicator alongside one unit of work. The order of steps is the
//! whole contract:
//! 1. start the indicator (fresh stop condition, does not block)
//! 2. run the work; this blocks the supervisor but not the indicator
//! 3. raise the stop condition, whether the work succeeded or failed
//! 4. wait for the indicator to exit and erase its line
//! 5. hand back the work's result
//!
//! The blocking form serves the thread and process substrates; the async
//! form serves the cooperative one, where awaiting the work is what lets the
//! indicator run at all.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, info, warn};

use crate::display::StatusLine;
use crate::error::Result;
use crate::indicator::IndicatorSpec;
use crate::substrate::{IndicatorHandle, Substrate, TaskHandle, TaskSubstrate, Termination};
use crate::work::WorkResult;

/// Supervise `work` on a blocking substrate.
pub fn supervise<S, F>(substrate: &S, spec: &IndicatorSpec, work: F) -> Result<WorkResult>
where
    S: Substrate,
    F: FnOnce() -> Result<WorkResult>,
{
    supervise_with(substrate, spec, |_| {}, work)
}

/// Like [`supervise`], calling `on_start` with the handle once the indicator runs.
pub fn supervise_with<S, G, F>(substrate: &S, spec: &IndicatorSpec, on_start: G, work: F) -> Result<WorkResult>
where
    S: Substrate,
    G: FnOnce(&S::Handle),
    F: FnOnce() -> Result<WorkResult>,
{
    let handle = substrate.spawn(spec)?;
    info!("Indicator started: {:?}", handle);
    on_start(&handle);

    // A panicking work call still stops and joins the indicator before unwinding
    let outcome = panic::catch_unwind(AssertUnwindSafe(work));

    handle.stop();
    debug!("Stop raised, joining {:?}", handle);
    let joined = handle.join();

    match outcome {
        Ok(outcome) => settle(outcome, joined),
        Err(payload) => {
            warn!("Work panicked, indicator joined with {:?}", joined);
            panic::resume_unwind(payload)
        }
    }
}

/// Supervise `work` on the cooperative substrate.
pub async fn supervise_async<D, F, Fut>(substrate: &TaskSubstrate<D>, spec: &IndicatorSpec, work: F) -> Result<WorkResult>
where
    D: StatusLine + Clone + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<WorkResult>>,
{
    supervise_async_with(substrate, spec, |_| {}, work).await
}

/// Like [`supervise_async`], calling `on_start` with the scheduled handle.
pub async fn supervise_async_with<D, G, F, Fut>(
    substrate: &TaskSubstrate<D>,
    spec: &IndicatorSpec,
    on_start: G,
    work: F,
) -> Result<WorkResult>
where
    D: StatusLine + Clone + 'static,
    G: FnOnce(&TaskHandle),
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<WorkResult>>,
{
    let handle = substrate.spawn(spec);
    info!("Indicator scheduled: {:?}", handle);
    on_start(&handle);

    let outcome = work().await;

    handle.stop();
    debug!("Cancellation requested, awaiting {:?}", handle);
    let joined = handle.join().await;

    settle(outcome, joined)
}

/// Combine the work's outcome with how the indicator ended.
///
/// A work failure wins over a join failure; the latter is only logged.
fn settle(outcome: Result<WorkResult>, joined: Result<Termination>) -> Result<WorkResult> {
    match (outcome, joined) {
        (Ok(result), Ok(termination)) => {
            info!("Work returned {} after indicator {:?}", result, termination);
            Ok(result)
        }
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(termination)) => {
            info!("Work failed after indicator {:?}: {}", termination, e);
            Err(e)
        }
        (Err(e), Err(join_err)) => {
            warn!("Indicator also failed to join: {}", join_err);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Recorder;
    use crate::error::SpinnerError;
    use crate::indicator::{IndicatorReport, IndicatorState};
    use crate::substrate::ThreadSubstrate;
    use crate::work;
    use std::cell::RefCell;
    use std::time::Duration;

    fn spec() -> IndicatorSpec {
        IndicatorSpec::new("thinking!").with_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_settle_prefers_work_error() {
        let result = settle(
            Err(SpinnerError::Work("work".to_string())),
            Err(SpinnerError::Join("join".to_string())),
        );
        assert!(matches!(result, Err(SpinnerError::Work(_))));
    }

    #[test]
    fn test_settle_reports_join_error_on_success() {
        let result = settle(Ok(1), Err(SpinnerError::Join("join".to_string())));
        assert!(matches!(result, Err(SpinnerError::Join(_))));
    }

    #[test]
    fn test_settle_passes_result_through() {
        let report = IndicatorReport {
            frames: 3,
            erase_width: 11,
        };
        assert_eq!(settle(Ok(42), Ok(Termination::Stopped(report))).unwrap(), 42);
    }

    #[test]
    fn test_supervise_returns_work_result() {
        let recorder = Recorder::new();
        let substrate = ThreadSubstrate::new(recorder.clone());

        let result = supervise(&substrate, &spec(), || work::slow(Duration::from_millis(40), 42)).unwrap();

        assert_eq!(result, 42);
        assert!(recorder.frame_count() >= 1);
        assert_eq!(recorder.erase_count(), 1);
        assert!(recorder.renders().last().unwrap().is_erase());
    }

    #[test]
    fn test_supervise_cleans_up_on_work_failure() {
        let recorder = Recorder::new();
        let substrate = ThreadSubstrate::new(recorder.clone());

        let err = supervise(&substrate, &spec(), || work::failing(Duration::from_millis(30), "unreachable"))
            .unwrap_err();

        assert!(matches!(err, SpinnerError::Work(_)));
        assert_eq!(recorder.erase_count(), 1);
        assert!(recorder.renders().last().unwrap().is_erase());
    }

    #[test]
    fn test_supervise_joins_indicator_when_work_panics() {
        let recorder = Recorder::new();
        let substrate = ThreadSubstrate::new(recorder.clone());
        let slow_frames = IndicatorSpec::new("thinking!").with_interval(Duration::from_millis(200));

        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            supervise(&substrate, &slow_frames, || -> Result<WorkResult> {
                std::thread::sleep(Duration::from_millis(50));
                panic!("work exploded");
            })
        }));

        assert!(unwound.is_err());
        assert_eq!(recorder.erase_count(), 1);
        assert!(recorder.renders().last().unwrap().is_erase());
    }

    #[test]
    fn test_supervise_with_sees_running_handle() {
        let substrate = ThreadSubstrate::new(Recorder::new());
        let seen = RefCell::new(None);

        supervise_with(
            &substrate,
            &spec(),
            |handle| *seen.borrow_mut() = Some(format!("{:?}", handle)),
            || Ok(7),
        )
        .unwrap();

        let seen = seen.into_inner().unwrap();
        assert!(seen.starts_with("ThreadHandle"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_supervise_async_returns_work_result() {
        let recorder = Recorder::new();
        let substrate = TaskSubstrate::current(recorder.clone()).unwrap();

        let result = supervise_async(&substrate, &spec(), || work::slow_async(Duration::from_millis(40), 42))
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert!(recorder.frame_count() >= 1);
        assert_eq!(recorder.erase_count(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_supervise_async_cleans_up_on_work_failure() {
        let recorder = Recorder::new();
        let substrate = TaskSubstrate::current(recorder.clone()).unwrap();

        let err = supervise_async(&substrate, &spec(), || work::failing_async(Duration::from_millis(30), "refused"))
            .await
            .unwrap_err();

        assert!(matches!(err, SpinnerError::Work(_)));
        assert_eq!(recorder.erase_count(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_supervise_async_with_sees_scheduled_handle() {
        let substrate = TaskSubstrate::current(Recorder::new()).unwrap();
        let mut state = None;

        supervise_async_with(&substrate, &spec(), |handle| state = Some(handle.state()), || async { Ok(1) })
            .await
            .unwrap();

        assert_eq!(state, Some(IndicatorState::Running));
    }
}
