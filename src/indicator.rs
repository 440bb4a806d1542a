//! The busy indicator.
//!
//! An [`Indicator`] cycles through [`FRAMES`], drawing `<frame> <message>` on a
//! [`StatusLine`] until it is told to stop, then blanks the line. The state
//! machine is shared by every substrate; only the driver differs:
//! - [`spin_polling`] pauses on a [`StopSignal`], so the pause doubles as the poll
//! - [`spin_cooperative`] pauses at an await point and is ended by cancellation
//!
//! Erasing is the transition action into [`IndicatorState::Terminated`]. It runs
//! exactly once, either from [`Indicator::finish`] or from `Drop` when the
//! indicator is torn down some other way (task cancellation, an early error).

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use log::{debug, warn};

use crate::display::StatusLine;
use crate::error::{Result, SpinnerError};
use crate::stop::StopSignal;

/// Animation frames, cycled with wraparound.
pub const FRAMES: [char; 4] = ['\\', '|', '/', '-'];

/// Default message shown next to the frame.
pub const DEFAULT_MESSAGE: &str = "thinking!";

/// Default pause between frames.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Format one status line.
pub fn status_line(frame: char, message: &str) -> String {
    format!("{} {}", frame, message)
}

/// Columns needed to blank out `status`.
pub fn erase_width(status: &str) -> usize {
    status.chars().count()
}

/// What an indicator shows and how fast it animates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSpec {
    pub message: String,
    pub interval: Duration,
}

impl IndicatorSpec {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for IndicatorSpec {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE)
    }
}

/// Lifecycle of one indicator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    Running,
    StopRequested,
    Terminated,
}

impl IndicatorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => IndicatorState::Running,
            1 => IndicatorState::StopRequested,
            _ => IndicatorState::Terminated,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            IndicatorState::Running => 0,
            IndicatorState::StopRequested => 1,
            IndicatorState::Terminated => 2,
        }
    }
}

/// Indicator state readable from outside the unit that runs it.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(IndicatorState::Running.as_u8())))
    }

    pub fn get(&self) -> IndicatorState {
        IndicatorState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: IndicatorState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    /// Running -> StopRequested. Leaves a terminated indicator alone.
    pub fn request_stop(&self) {
        let _ = self.0.compare_exchange(
            IndicatorState::Running.as_u8(),
            IndicatorState::StopRequested.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a finished indicator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorReport {
    /// Animated frames rendered.
    pub frames: u64,
    /// Width of the final erase, zero when nothing was drawn.
    pub erase_width: usize,
}

pub struct Indicator<D: StatusLine> {
    spec: IndicatorSpec,
    display: D,
    next_frame: usize,
    rendered: u64,
    last_width: Option<usize>,
    state: StateCell,
}

impl<D: StatusLine> Indicator<D> {
    pub fn new(spec: IndicatorSpec, display: D) -> Self {
        Self::with_state(spec, display, StateCell::new())
    }

    /// Build an indicator that publishes its state through `state`.
    pub fn with_state(spec: IndicatorSpec, display: D, state: StateCell) -> Self {
        Self {
            spec,
            display,
            next_frame: 0,
            rendered: 0,
            last_width: None,
            state,
        }
    }

    pub fn state(&self) -> IndicatorState {
        self.state.get()
    }

    pub fn interval(&self) -> Duration {
        self.spec.interval
    }

    /// Draw the next frame over the previous one.
    pub fn render_next(&mut self) -> io::Result<()> {
        if self.state() == IndicatorState::Terminated {
            return Ok(());
        }
        let frame = FRAMES[self.next_frame % FRAMES.len()];
        let status = status_line(frame, &self.spec.message);
        self.display.render(&status)?;
        self.next_frame = (self.next_frame + 1) % FRAMES.len();
        self.rendered += 1;
        self.last_width = Some(erase_width(&status));
        Ok(())
    }

    /// Record that the stop flag was observed.
    pub fn request_stop(&mut self) {
        self.state.request_stop();
    }

    /// Blank the last status line and move to `Terminated`.
    ///
    /// Only the first call erases; later calls return the same report.
    pub fn finish(&mut self) -> io::Result<IndicatorReport> {
        if self.state() == IndicatorState::Terminated {
            return Ok(self.report());
        }
        self.state.set(IndicatorState::Terminated);
        if let Some(width) = self.last_width {
            self.display.erase(width)?;
        }
        debug!("Indicator finished after {} frames", self.rendered);
        Ok(self.report())
    }

    pub fn report(&self) -> IndicatorReport {
        IndicatorReport {
            frames: self.rendered,
            erase_width: self.last_width.unwrap_or(0),
        }
    }
}

impl<D: StatusLine> Drop for Indicator<D> {
    fn drop(&mut self) {
        if self.state() != IndicatorState::Terminated {
            if let Err(e) = self.finish() {
                warn!("Failed to erase indicator: {}", e);
            }
        }
    }
}

/// Animate until `stop` is set, then erase.
///
/// Each pause waits on the flag, so the indicator notices a stop within one
/// interval.
pub fn spin_polling<D: StatusLine>(mut indicator: Indicator<D>, stop: &dyn StopSignal) -> Result<IndicatorReport> {
    loop {
        indicator.render_next()?;
        if stop.wait(indicator.interval()) {
            indicator.request_stop();
            break;
        }
    }
    Ok(indicator.finish()?)
}

/// Animate until the surrounding task is cancelled.
///
/// Cancellation at the sleep never returns; dropping the indicator performs
/// the erase. The future only completes when drawing fails, with that error.
pub async fn spin_cooperative<D: StatusLine>(mut indicator: Indicator<D>) -> SpinnerError {
    loop {
        if let Err(e) = indicator.render_next() {
            warn!("Indicator could not draw: {}", e);
            return e.into();
        }
        tokio::time::sleep(indicator.interval()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{Recorder, Render};
    use crate::stop::Event;

    fn fast_spec() -> IndicatorSpec {
        IndicatorSpec::new("thinking!").with_interval(Duration::from_millis(5))
    }

    #[test]
    fn test_status_line_format() {
        assert_eq!(status_line('|', "thinking!"), "| thinking!");
        assert_eq!(erase_width("| thinking!"), 11);
    }

    #[test]
    fn test_default_spec() {
        let spec = IndicatorSpec::default();
        assert_eq!(spec.message, "thinking!");
        assert_eq!(spec.interval, Duration::from_millis(100));
    }

    #[test]
    fn test_frames_cycle_with_wraparound() {
        let recorder = Recorder::new();
        let mut indicator = Indicator::new(fast_spec(), recorder.clone());
        for _ in 0..6 {
            indicator.render_next().unwrap();
        }

        let frames: Vec<String> = recorder
            .renders()
            .into_iter()
            .filter_map(|r| match r {
                Render::Frame { text, .. } => Some(text),
                Render::Erase { .. } => None,
            })
            .collect();
        assert_eq!(
            frames,
            vec![
                "\\ thinking!",
                "| thinking!",
                "/ thinking!",
                "- thinking!",
                "\\ thinking!",
                "| thinking!",
            ]
        );
    }

    #[test]
    fn test_finish_erases_last_width_once() {
        let recorder = Recorder::new();
        let mut indicator = Indicator::new(IndicatorSpec::new("hi"), recorder.clone());
        indicator.render_next().unwrap();

        let report = indicator.finish().unwrap();
        let again = indicator.finish().unwrap();
        drop(indicator);

        assert_eq!(report, again);
        assert_eq!(report.frames, 1);
        assert_eq!(report.erase_width, 4);
        assert_eq!(recorder.erase_count(), 1);
    }

    #[test]
    fn test_no_render_after_finish() {
        let recorder = Recorder::new();
        let mut indicator = Indicator::new(fast_spec(), recorder.clone());
        indicator.render_next().unwrap();
        indicator.finish().unwrap();
        indicator.render_next().unwrap();

        assert_eq!(recorder.frame_count(), 1);
        assert!(recorder.renders().last().unwrap().is_erase());
    }

    #[test]
    fn test_drop_erases_running_indicator() {
        let recorder = Recorder::new();
        let state = StateCell::new();
        {
            let mut indicator = Indicator::with_state(fast_spec(), recorder.clone(), state.clone());
            indicator.render_next().unwrap();
            assert_eq!(state.get(), IndicatorState::Running);
        }

        assert_eq!(state.get(), IndicatorState::Terminated);
        assert_eq!(recorder.erase_count(), 1);
    }

    #[test]
    fn test_drop_without_render_skips_erase() {
        let recorder = Recorder::new();
        let indicator = Indicator::new(fast_spec(), recorder.clone());
        drop(indicator);
        assert!(recorder.renders().is_empty());
    }

    #[test]
    fn test_request_stop_does_not_revive_terminated() {
        let state = StateCell::new();
        state.request_stop();
        assert_eq!(state.get(), IndicatorState::StopRequested);

        state.set(IndicatorState::Terminated);
        state.request_stop();
        assert_eq!(state.get(), IndicatorState::Terminated);
    }

    #[test]
    fn test_spin_polling_stops_on_preset_flag() {
        let recorder = Recorder::new();
        let event = Event::new();
        event.set();

        let report = spin_polling(Indicator::new(fast_spec(), recorder.clone()), &event).unwrap();

        assert_eq!(report.frames, 1);
        assert_eq!(report.erase_width, erase_width("\\ thinking!"));
        assert_eq!(recorder.frame_count(), 1);
        assert_eq!(recorder.erase_count(), 1);
    }

    #[test]
    fn test_spin_polling_erase_matches_last_frame() {
        let recorder = Recorder::new();
        let event = Arc::new(Event::new());
        let setter = event.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(40));
            setter.set();
        });
        let report = spin_polling(Indicator::new(fast_spec(), recorder.clone()), event.as_ref()).unwrap();
        handle.join().unwrap();

        let renders = recorder.renders();
        assert!(report.frames >= 1);
        assert_eq!(renders.len() as u64, report.frames + 1);
        let last = recorder.last_frame().unwrap();
        match renders.last().unwrap() {
            Render::Erase { width, .. } => assert_eq!(*width, erase_width(&last)),
            Render::Frame { .. } => panic!("Expected erase as final render"),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_spin_cooperative_erases_on_cancel() {
        let recorder = Recorder::new();
        let state = StateCell::new();
        let indicator = Indicator::with_state(fast_spec(), recorder.clone(), state.clone());

        let task = tokio::spawn(spin_cooperative(indicator));
        tokio::time::sleep(Duration::from_millis(30)).await;
        task.abort();
        let err = task.await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(state.get(), IndicatorState::Terminated);
        assert!(recorder.frame_count() >= 1);
        assert_eq!(recorder.erase_count(), 1);
        assert!(recorder.renders().last().unwrap().is_erase());
    }

    /// A display that refuses every write.
    struct Unplugged;

    impl StatusLine for Unplugged {
        fn render(&mut self, _text: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal went away"))
        }

        fn erase(&mut self, _width: usize) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal went away"))
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_spin_cooperative_ends_only_on_draw_error() {
        let state = StateCell::new();
        let indicator = Indicator::with_state(fast_spec(), Unplugged, state.clone());

        let err = spin_cooperative(indicator).await;

        assert!(matches!(err, SpinnerError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(state.get(), IndicatorState::Terminated);
    }
}
