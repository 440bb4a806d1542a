//! Process substrate
//!
//! The indicator runs in a child process that shares no memory with its
//! supervisor. The stop flag crosses the boundary over the child's stdin:
//! - the supervisor side ([`PipeSignal`]) writes one byte and closes the pipe
//! - the child side ([`PipeListener`]) treats that byte, or end-of-file, as set
//!
//! End-of-file also covers a supervisor that died without stopping its child.
//!
//! The child is the current program re-executed with the hidden
//! [`INDICATOR_COMMAND`] subcommand, see [`run_child`].

use std::ffi::OsString;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

use crate::display::Terminal;
use crate::error::{Result, SpinnerError};
use crate::indicator::{Indicator, IndicatorReport, IndicatorSpec, IndicatorState, StateCell, spin_polling};
use crate::stop::{Event, StopCondition, StopSignal};

use super::{IndicatorHandle, Substrate, Termination};

/// Subcommand that turns the program into an indicator child.
pub const INDICATOR_COMMAND: &str = "indicator";

const STOP_BYTE: &[u8] = b"\n";

/// Supervisor end of the stop flag.
#[derive(Debug)]
pub struct PipeSignal {
    local: Event,
    pipe: Mutex<Option<ChildStdin>>,
}

impl PipeSignal {
    pub fn new(pipe: ChildStdin) -> Self {
        Self {
            local: Event::new(),
            pipe: Mutex::new(Some(pipe)),
        }
    }
}

impl StopSignal for PipeSignal {
    fn set(&self) {
        self.local.set();
        let pipe = self.pipe.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut pipe) = pipe {
            // A child that already exited closed its end; nothing left to stop.
            if let Err(e) = pipe.write_all(STOP_BYTE).and_then(|_| pipe.flush()) {
                debug!("Indicator process already gone: {}", e);
            }
        }
    }

    fn wait(&self, timeout: Duration) -> bool {
        self.local.wait(timeout)
    }
}

/// Child end of the stop flag.
#[derive(Debug, Clone)]
pub struct PipeListener {
    event: Arc<Event>,
}

impl PipeListener {
    /// Watch `source` on a background thread; any byte or EOF sets the flag.
    pub fn watch<R>(mut source: R) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let event = Arc::new(Event::new());
        let flag = event.clone();
        thread::Builder::new()
            .name("stop-listener".to_string())
            .spawn(move || {
                let mut byte = [0u8; 1];
                match source.read(&mut byte) {
                    Ok(0) => debug!("Control pipe closed"),
                    Ok(_) => debug!("Stop requested over control pipe"),
                    Err(e) => warn!("Control pipe failed: {}", e),
                }
                flag.set();
            })
            .map_err(|e| SpinnerError::Signal(format!("cannot watch control pipe: {}", e)))?;
        Ok(Self { event })
    }

    /// Watch this process's stdin.
    pub fn stdin() -> Result<Self> {
        Self::watch(io::stdin())
    }
}

impl StopSignal for PipeListener {
    fn set(&self) {
        self.event.set();
    }

    fn wait(&self, timeout: Duration) -> bool {
        self.event.wait(timeout)
    }
}

/// Body of the indicator child: animate on stdout until stdin says stop.
pub fn run_child(spec: IndicatorSpec) -> Result<IndicatorReport> {
    let listener = PipeListener::stdin()?;
    debug!("Indicator child {} started", std::process::id());
    spin_polling(Indicator::new(spec, Terminal::new()), &listener)
}

/// Spawns indicators as child processes.
#[derive(Debug, Clone)]
pub struct ProcessSubstrate {
    program: PathBuf,
    args: Vec<OsString>,
    capture: bool,
}

impl ProcessSubstrate {
    /// Run `program indicator --message .. --interval-ms ..` as the child.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![OsString::from(INDICATOR_COMMAND)],
            capture: false,
        }
    }

    /// Re-execute the running program as the child.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|e| SpinnerError::Spawn(format!("cannot locate current executable: {}", e)))?;
        Ok(Self::new(program))
    }

    /// Replace the arguments placed before `--message`.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Pipe the child's stdout back instead of sharing the terminal.
    pub fn capture_output(mut self) -> Self {
        self.capture = true;
        self
    }

    fn command(&self, spec: &IndicatorSpec) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--message")
            .arg(&spec.message)
            .arg("--interval-ms")
            .arg(spec.interval.as_millis().to_string())
            .stdin(Stdio::piped())
            .stderr(Stdio::inherit());
        if self.capture {
            cmd.stdout(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit());
        }
        cmd
    }
}

impl Substrate for ProcessSubstrate {
    type Handle = ProcessHandle;

    fn spawn(&self, spec: &IndicatorSpec) -> Result<ProcessHandle> {
        let mut child = self
            .command(spec)
            .spawn()
            .map_err(|e| SpinnerError::Spawn(format!("process '{}': {}", self.program.display(), e)))?;

        let Some(stdin) = child.stdin.take() else {
            reap(child);
            return Err(SpinnerError::Spawn("indicator process has no control pipe".to_string()));
        };

        let output = match child.stdout.take() {
            Some(stdout) => match drain(stdout) {
                Ok(reader) => Some(reader),
                Err(e) => {
                    reap(child);
                    return Err(e);
                }
            },
            None => None,
        };

        let pid = child.id();
        debug!("Spawned indicator process {}", pid);
        Ok(ProcessHandle {
            pid,
            child: Mutex::new(child),
            stop: StopCondition::pollable(Arc::new(PipeSignal::new(stdin))),
            state: StateCell::new(),
            output,
        })
    }
}

/// Kill a child that will never get a handle, and wait so it leaves no zombie.
fn reap(mut child: Child) {
    if let Err(e) = child.kill() {
        debug!("Indicator process {} already gone: {}", child.id(), e);
    }
    if let Err(e) = child.wait() {
        warn!("Failed to reap indicator process {}: {}", child.id(), e);
    }
}

/// Read a child's stdout to the end so it never blocks on a full pipe.
fn drain<R>(mut source: R) -> Result<JoinHandle<io::Result<Vec<u8>>>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("indicator-output".to_string())
        .spawn(move || {
            let mut buf = Vec::new();
            source.read_to_end(&mut buf)?;
            Ok(buf)
        })
        .map_err(|e| SpinnerError::Spawn(format!("cannot read indicator output: {}", e)))
}

/// Handle to an indicator child process.
pub struct ProcessHandle {
    pid: u32,
    child: Mutex<Child>,
    stop: StopCondition,
    state: StateCell,
    output: Option<JoinHandle<io::Result<Vec<u8>>>>,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Join, also returning whatever the child wrote when output is captured.
    pub fn join_captured(self) -> Result<(Termination, Option<String>)> {
        let ProcessHandle {
            pid,
            child,
            stop,
            state,
            output,
        } = self;

        let mut child = child.into_inner().unwrap_or_else(PoisonError::into_inner);
        let status = child.wait()?;
        state.set(IndicatorState::Terminated);
        drop(stop);

        let captured = match output {
            Some(reader) => {
                let bytes = reader
                    .join()
                    .map_err(|_| SpinnerError::Join("indicator output reader panicked".to_string()))??;
                Some(String::from_utf8_lossy(&bytes).into_owned())
            }
            None => None,
        };

        if !status.success() {
            return Err(SpinnerError::Join(format!("indicator process {} exited with {}", pid, status)));
        }
        debug!("Joined indicator process {}", pid);
        Ok((Termination::Exited, captured))
    }
}

impl IndicatorHandle for ProcessHandle {
    fn stop(&self) {
        self.stop.raise();
        self.state.request_stop();
    }

    fn state(&self) -> IndicatorState {
        if self.is_finished() {
            return IndicatorState::Terminated;
        }
        self.state.get()
    }

    fn is_finished(&self) -> bool {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(child.try_wait(), Ok(Some(_)))
    }

    fn join(self) -> Result<Termination> {
        self.join_captured().map(|(termination, _)| termination)
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("parent", &std::process::id())
            .field("state", &self.state.get())
            .finish()
    }
}
