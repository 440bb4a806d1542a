//! Display surface for the status line.
//!
//! The indicator is the only writer while it runs. Every render overwrites the
//! previous one in place by returning the cursor to column zero first.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// A single-line surface the indicator draws on.
pub trait StatusLine: Send {
    /// Overwrite the line with `text`.
    fn render(&mut self, text: &str) -> io::Result<()>;

    /// Blank out `width` columns and leave the cursor at column zero.
    fn erase(&mut self, width: usize) -> io::Result<()>;
}

/// Status line on the process's stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }
}

impl StatusLine for Terminal {
    fn render(&mut self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        write!(out, "\r{}", text)?;
        out.flush()
    }

    fn erase(&mut self, width: usize) -> io::Result<()> {
        let mut out = io::stdout().lock();
        write!(out, "\r{}\r", " ".repeat(width))?;
        out.flush()
    }
}

/// One call made against a [`Recorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Render {
    Frame { text: String, at: Instant },
    Erase { width: usize, at: Instant },
}

impl Render {
    pub fn is_erase(&self) -> bool {
        matches!(self, Render::Erase { .. })
    }

    pub fn at(&self) -> Instant {
        match self {
            Render::Frame { at, .. } | Render::Erase { at, .. } => *at,
        }
    }
}

/// In-memory status line that keeps every render, for tests and diagnostics.
///
/// Clones share the same history, so one clone can be handed to an indicator
/// while another is inspected from the supervising side.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    renders: Arc<Mutex<Vec<Render>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything rendered so far.
    pub fn renders(&self) -> Vec<Render> {
        self.renders.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of animated frames rendered so far.
    pub fn frame_count(&self) -> usize {
        self.renders().iter().filter(|r| !r.is_erase()).count()
    }

    /// Number of erase renders so far.
    pub fn erase_count(&self) -> usize {
        self.renders().iter().filter(|r| r.is_erase()).count()
    }

    /// Text of the most recent animated frame.
    pub fn last_frame(&self) -> Option<String> {
        self.renders().into_iter().rev().find_map(|r| match r {
            Render::Frame { text, .. } => Some(text),
            Render::Erase { .. } => None,
        })
    }

    fn push(&self, render: Render) {
        self.renders.lock().unwrap_or_else(PoisonError::into_inner).push(render);
    }
}

impl StatusLine for Recorder {
    fn render(&mut self, text: &str) -> io::Result<()> {
        self.push(Render::Frame {
            text: text.to_string(),
            at: Instant::now(),
        });
        Ok(())
    }

    fn erase(&mut self, width: usize) -> io::Result<()> {
        self.push(Render::Erase {
            width,
            at: Instant::now(),
        });
        Ok(())
    }
}
