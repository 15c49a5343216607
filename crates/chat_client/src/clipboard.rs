//! Copy-to-clipboard action with a transient confirmation state.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// How long the confirmation icon stays up after a successful copy.
pub const COPY_FEEDBACK: Duration = Duration::from_millis(2000);

/// Clipboard write error.
#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("no clipboard tool available")]
    Unavailable,
    #[error("clipboard tool failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything text can be copied into.
pub trait Clipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Clipboard backed by the platform's command-line tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

const TOOLS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
    ("clip", &[]),
];

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        for (program, args) in TOOLS {
            match pipe_to(Command::new(program).args(*args), text) {
                Ok(true) => return Ok(()),
                Ok(false) => continue,
                Err(ClipboardError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ClipboardError::Unavailable)
    }
}

/// Pipe `text` into `command`'s stdin and wait for it to exit.
/// Returns whether it exited successfully.
///
/// The child is always reaped, even when the write fails.
fn pipe_to(command: &mut Command, text: &str) -> Result<bool, ClipboardError> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    // Stdin is dropped at the end of this block so the tool sees EOF.
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(text.as_bytes()),
        None => Ok(()),
    };
    let status = child.wait()?;
    written?;
    Ok(status.success())
}

/// Icon shown on a message's copy control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyIcon {
    Copy,
    Check,
}

impl CopyIcon {
    pub fn glyph(self) -> &'static str {
        match self {
            CopyIcon::Copy => "⧉",
            CopyIcon::Check => "✓",
        }
    }
}

/// Per-message copy control.
#[derive(Debug, Clone, Copy)]
pub struct CopyAction {
    feedback: Duration,
    confirmed_until: Option<Instant>,
}

impl Default for CopyAction {
    fn default() -> Self {
        Self::new(COPY_FEEDBACK)
    }
}

impl CopyAction {
    pub fn new(feedback: Duration) -> Self {
        Self {
            feedback,
            confirmed_until: None,
        }
    }

    /// Copy `text`. Failures leave the icon unchanged and are not reported.
    pub fn invoke(&mut self, clipboard: &dyn Clipboard, text: &str, now: Instant) {
        match clipboard.write_text(text) {
            Ok(()) => self.confirmed_until = Some(now + self.feedback),
            Err(e) => tracing::debug!(error = %e, "copy to clipboard failed"),
        }
    }

    pub fn icon(&self, now: Instant) -> CopyIcon {
        match self.confirmed_until {
            Some(until) if now < until => CopyIcon::Check,
            _ => CopyIcon::Copy,
        }
    }
}
