//! Terminal display using crossterm
//!
//! The editor and the device session only produce text and escape sequences;
//! this module puts the local terminal into raw mode and writes that text out.

use std::io::{self, Write};

use crossterm::terminal;
use tracing::{debug, error};

/// Anything the core can write display text to
pub trait DisplaySink {
    fn write_display(&mut self, text: &str);
}

/// Collects display output in memory
impl DisplaySink for String {
    fn write_display(&mut self, text: &str) {
        self.push_str(text);
    }
}

/// Raw-mode stdout display
pub struct TerminalDisplay {
    stdout: io::Stdout,
    /// Whether raw mode is currently enabled
    initialized: bool,
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
            initialized: false,
        }
    }

    /// Enter raw mode so every keystroke reaches the editor unprocessed
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        self.initialized = true;
        debug!("Raw mode enabled");
        Ok(())
    }

    /// Restore the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.initialized {
            terminal::disable_raw_mode()?;
            self.initialized = false;
            debug!("Raw mode disabled");
        }
        self.stdout.flush()
    }
}

impl DisplaySink for TerminalDisplay {
    fn write_display(&mut self, text: &str) {
        if let Err(e) = self
            .stdout
            .write_all(text.as_bytes())
            .and_then(|()| self.stdout.flush())
        {
            error!("Failed to write to terminal: {}", e);
        }
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
