//! ui::browser
//!
//! Opening URLs in a web browser.

use std::io;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// Something that can show a URL to the user.
pub trait Browser: Send + Sync {
    fn browse(&self, url: &str) -> io::Result<()>;
}

/// Opens URLs with the configured browser command, or the system default.
#[derive(Debug, Clone, Default)]
pub struct SystemBrowser {
    command: Option<String>,
}

impl SystemBrowser {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }
}

impl Browser for SystemBrowser {
    fn browse(&self, url: &str) -> io::Result<()> {
        debug!(url, command = ?self.command, "opening browser");
        match &self.command {
            Some(command) => open::with(url, command),
            None => open::that(url),
        }
    }
}

/// Records URLs instead of opening them.
#[derive(Debug, Default)]
pub struct StubBrowser {
    urls: Mutex<Vec<String>>,
}

impl StubBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs browsed so far.
    pub fn urls(&self) -> Vec<String> {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Browser for StubBrowser {
    fn browse(&self, url: &str) -> io::Result<()> {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        Ok(())
    }
}
