//! ui::output
//!
//! Output streams and display helpers.
//!
//! # Design
//!
//! Commands never print directly. They write through [`IoStreams`], which
//! owns stdout/stderr handles and knows whether each is a terminal. Tests
//! swap the handles for in-memory buffers with [`IoStreams::test`].
//!
//! Output respects the quiet flag: progress and warnings are dropped in
//! quiet mode, command results are not.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    #[default]
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

type Stream = Box<dyn Write + Send>;

/// Process I/O handles with terminal detection.
pub struct IoStreams {
    out: Mutex<Stream>,
    err: Mutex<Stream>,
    stdin_tty: bool,
    stdout_tty: bool,
    stderr_tty: bool,
    prompt_disabled: bool,
    verbosity: Verbosity,
}

impl std::fmt::Debug for IoStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoStreams")
            .field("stdin_tty", &self.stdin_tty)
            .field("stdout_tty", &self.stdout_tty)
            .field("stderr_tty", &self.stderr_tty)
            .field("prompt_disabled", &self.prompt_disabled)
            .field("verbosity", &self.verbosity)
            .finish()
    }
}

/// Captured output of [`IoStreams::test`].
#[derive(Debug, Clone, Default)]
pub struct TestOutput {
    out: Arc<Mutex<Vec<u8>>>,
    err: Arc<Mutex<Vec<u8>>>,
}

impl TestOutput {
    /// Everything written to stdout so far.
    pub fn stdout(&self) -> String {
        let buf = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Everything written to stderr so far.
    pub fn stderr(&self) -> String {
        let buf = self.err.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl IoStreams {
    /// Streams attached to the process stdio.
    pub fn system() -> Self {
        Self {
            out: Mutex::new(Box::new(io::stdout())),
            err: Mutex::new(Box::new(io::stderr())),
            stdin_tty: io::stdin().is_terminal(),
            stdout_tty: io::stdout().is_terminal(),
            stderr_tty: io::stderr().is_terminal(),
            prompt_disabled: false,
            verbosity: Verbosity::Normal,
        }
    }

    /// Streams writing to in-memory buffers. No stream is a terminal.
    pub fn test() -> (Self, TestOutput) {
        let output = TestOutput::default();
        let streams = Self {
            out: Mutex::new(Box::new(SharedBuffer(Arc::clone(&output.out)))),
            err: Mutex::new(Box::new(SharedBuffer(Arc::clone(&output.err)))),
            stdin_tty: false,
            stdout_tty: false,
            stderr_tty: false,
            prompt_disabled: false,
            verbosity: Verbosity::Normal,
        };
        (streams, output)
    }

    /// Pretend every stream is (or is not) a terminal.
    pub fn with_tty(mut self, tty: bool) -> Self {
        self.stdin_tty = tty;
        self.stdout_tty = tty;
        self.stderr_tty = tty;
        self
    }

    pub fn with_prompt_disabled(mut self, disabled: bool) -> Self {
        self.prompt_disabled = disabled;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Locked stdout handle.
    pub fn out(&self) -> MutexGuard<'_, Stream> {
        self.out.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locked stderr handle.
    pub fn err(&self) -> MutexGuard<'_, Stream> {
        self.err.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_stdin_tty(&self) -> bool {
        self.stdin_tty
    }

    pub fn is_stdout_tty(&self) -> bool {
        self.stdout_tty
    }

    pub fn is_stderr_tty(&self) -> bool {
        self.stderr_tty
    }

    /// Whether interactive prompts may be shown.
    pub fn can_prompt(&self) -> bool {
        self.stdin_tty && self.stdout_tty && !self.prompt_disabled
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Print a progress message to stderr (respects quiet mode).
    pub fn progress(&self, message: impl Display) -> io::Result<()> {
        if self.verbosity == Verbosity::Quiet {
            return Ok(());
        }
        writeln!(self.err(), "{}", message)
    }

    /// Print a warning message (respects quiet mode).
    pub fn warn(&self, message: impl Display) -> io::Result<()> {
        if self.verbosity == Verbosity::Quiet {
            return Ok(());
        }
        writeln!(self.err(), "warning: {}", message)
    }

    /// Style `text` as bold when stdout is a terminal.
    pub fn bold(&self, text: &str) -> String {
        if self.stdout_tty {
            console::style(text).bold().force_styling(true).to_string()
        } else {
            text.to_string()
        }
    }

    /// Style `text` in gray when stdout is a terminal.
    pub fn muted(&self, text: &str) -> String {
        if self.stdout_tty {
            console::style(text).dim().force_styling(true).to_string()
        } else {
            text.to_string()
        }
    }

    /// Style `text` in green when stdout is a terminal.
    pub fn success_style(&self, text: &str) -> String {
        if self.stdout_tty {
            console::style(text).green().force_styling(true).to_string()
        } else {
            text.to_string()
        }
    }

    /// Style `text` in red when stdout is a terminal.
    pub fn failure_style(&self, text: &str) -> String {
        if self.stdout_tty {
            console::style(text).red().force_styling(true).to_string()
        } else {
            text.to_string()
        }
    }
}
