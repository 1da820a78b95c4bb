//! Command history for tspterm
//!
//! Keeps the lines submitted to the instrument during this session and lets
//! the line editor walk back and forth through them with Up/Down.

use std::collections::VecDeque;

/// Maximum number of history entries
pub const HISTORY_LIMIT: usize = 100;

/// Session command history with an Up/Down navigation cursor
#[derive(Debug)]
pub struct CommandHistory {
    /// All history entries (newest last)
    entries: VecDeque<String>,
    /// Navigation position, independent of where entries are added
    index: usize,
    /// Maximum entries
    max_entries: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_LIMIT),
            index: 0,
            max_entries: HISTORY_LIMIT,
        }
    }

    /// Add a command to history
    pub fn add(&mut self, command: &str) {
        // Skip if same as last command (dedup consecutive)
        let duplicate = self.entries.back().is_some_and(|last| last == command);
        if !duplicate {
            self.entries.push_back(command.to_string());

            // Trim if exceeding limit
            while self.entries.len() > self.max_entries {
                self.entries.pop_front();
            }
        }

        self.index = self.entries.len().saturating_sub(1);
    }

    /// Step towards older entries.
    ///
    /// Returns the entry under the cursor, then moves the cursor back. Once
    /// the oldest entry is reached it keeps being returned.
    pub fn navigate_up(&mut self) -> String {
        let Some(entry) = self.entries.get(self.index).cloned() else {
            return String::new();
        };
        self.index = self.index.saturating_sub(1);
        entry
    }

    /// Step towards newer entries.
    ///
    /// Returns an empty string once the cursor moves past the newest entry,
    /// which the editor shows as a fresh blank line.
    pub fn navigate_down(&mut self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }

        self.index += 1;
        let last = self.entries.len() - 1;
        if self.index > last {
            self.index = last;
            return String::new();
        }
        self.entries[self.index].clone()
    }

    /// Get entry count
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if history is empty
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries, oldest first
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}
