//! Line editor
//!
//! Owns the line being typed and keeps the terminal in step with it using
//! small cursor-relative escape sequences instead of redrawing the line.

use std::collections::VecDeque;

use tracing::debug;

use super::decoder::{decode, EditCommand};
use crate::history::CommandHistory;
use crate::ui::DisplaySink;

const CURSOR_LEFT: &str = "\x1b[D";
const CURSOR_RIGHT: &str = "\x1b[C";
const SAVE_CURSOR: &str = "\x1b7";
const RESTORE_CURSOR: &str = "\x1b8";
const DELETE_CHAR: &str = "\x1b[P";
const CLEAR_TO_EOL: &str = "\x1b[K";
const NEWLINE: &str = "\r\n";

/// Something the editor needs the host to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// A committed line to send to the device as one terminated line
    Submit(String),
    /// Fetch clipboard text and hand it back through [`LineEditor::complete_paste`]
    /// with the same id
    RequestPaste(u64),
}

/// The line being edited
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EditableLine {
    text: Vec<char>,
    cursor: usize,
}

impl EditableLine {
    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn tail(&self, from: usize) -> String {
        self.text[from..].iter().collect()
    }

    fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }
}

/// Line editor state machine
#[derive(Debug, Default)]
pub struct LineEditor {
    line: EditableLine,
    history: CommandHistory,
    /// Id of the outstanding clipboard read
    pending_paste: Option<u64>,
    /// Last paste id handed out
    paste_seq: u64,
    /// Tokens that arrived while the paste was outstanding
    queued: VecDeque<Vec<u8>>,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn line(&self) -> &EditableLine {
        &self.line
    }

    #[cfg(test)]
    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    #[cfg(test)]
    pub fn paste_pending(&self) -> bool {
        self.pending_paste.is_some()
    }

    /// Decode and apply one keystroke token.
    ///
    /// While a paste is outstanding the token is queued instead and replayed
    /// by [`complete_paste`](Self::complete_paste).
    pub fn handle_token(&mut self, token: &[u8], out: &mut dyn DisplaySink) -> Option<EditorAction> {
        if self.pending_paste.is_some() {
            self.queued.push_back(token.to_vec());
            return None;
        }
        self.apply(decode(token), out)
    }

    /// Apply one logical edit command
    pub fn apply(&mut self, command: EditCommand, out: &mut dyn DisplaySink) -> Option<EditorAction> {
        match command {
            EditCommand::InsertPrintable(ch) => self.insert_char(ch, out),
            EditCommand::Backspace => self.backspace(out),
            EditCommand::Delete => self.delete(out),
            EditCommand::Home => {
                while self.line.cursor > 0 {
                    self.line.cursor -= 1;
                    out.write_display(CURSOR_LEFT);
                }
            }
            EditCommand::End => {
                while self.line.cursor < self.line.len() {
                    self.line.cursor += 1;
                    out.write_display(CURSOR_RIGHT);
                }
            }
            EditCommand::CursorLeft => {
                if self.line.cursor > 0 {
                    self.line.cursor -= 1;
                    out.write_display(CURSOR_LEFT);
                }
            }
            EditCommand::CursorRight => {
                if self.line.cursor < self.line.len() {
                    self.line.cursor += 1;
                    out.write_display(CURSOR_RIGHT);
                }
            }
            EditCommand::CursorUp => {
                let text = self.history.navigate_up();
                self.replace_line(&text, out);
            }
            EditCommand::CursorDown => {
                let text = self.history.navigate_down();
                self.replace_line(&text, out);
            }
            EditCommand::Enter => return self.commit(out),
            EditCommand::PasteRequest => {
                self.paste_seq += 1;
                self.pending_paste = Some(self.paste_seq);
                return Some(EditorAction::RequestPaste(self.paste_seq));
            }
            EditCommand::Ignore => {}
        }
        None
    }

    /// Apply clipboard text from an outstanding paste, then replay any
    /// tokens queued behind it.
    ///
    /// Replay stops early if a queued token asks for another paste; the
    /// remaining tokens stay queued behind that one. A completion whose id is
    /// not the outstanding request (e.g. one abandoned by [`reset`](Self::reset))
    /// is dropped.
    pub fn complete_paste(&mut self, id: u64, text: &str, out: &mut dyn DisplaySink) -> Vec<EditorAction> {
        if self.pending_paste != Some(id) {
            debug!("Stale paste completion {}, ignoring", id);
            return Vec::new();
        }
        self.pending_paste = None;
        self.insert_str(text, out);

        let mut actions = Vec::new();
        while let Some(token) = self.queued.pop_front() {
            if let Some(action) = self.apply(decode(&token), out) {
                actions.push(action);
            }
            if self.pending_paste.is_some() {
                break;
            }
        }
        actions
    }

    /// Clear the line and forget queued input, e.g. when a new session opens
    pub fn reset(&mut self) {
        self.line.clear();
        self.pending_paste = None;
        self.queued.clear();
    }

    fn insert_char(&mut self, ch: char, out: &mut dyn DisplaySink) {
        let at_end = self.line.cursor == self.line.len();
        self.line.text.insert(self.line.cursor, ch);
        self.line.cursor += 1;

        if at_end {
            out.write_display(ch.encode_utf8(&mut [0; 4]));
        } else {
            let tail = self.line.tail(self.line.cursor - 1);
            out.write_display(&format!("{SAVE_CURSOR}{tail}{RESTORE_CURSOR}{CURSOR_RIGHT}"));
        }
    }

    /// Insert pasted text. Control characters (line breaks, escapes) are
    /// dropped so every inserted char occupies one column.
    fn insert_str(&mut self, text: &str, out: &mut dyn DisplaySink) {
        let chars: Vec<char> = text.chars().filter(|ch| !ch.is_control()).collect();
        if chars.is_empty() {
            return;
        }

        let start = self.line.cursor;
        let rest = self.line.text.split_off(start);
        self.line.text.extend(chars.iter().copied());
        self.line.text.extend(rest);
        self.line.cursor += chars.len();

        let tail = self.line.tail(start);
        out.write_display(&format!(
            "{SAVE_CURSOR}{tail}{RESTORE_CURSOR}\x1b[{}C",
            chars.len()
        ));
    }

    fn backspace(&mut self, out: &mut dyn DisplaySink) {
        if self.line.cursor == 0 {
            return;
        }
        self.line.cursor -= 1;
        self.line.text.remove(self.line.cursor);
        out.write_display(&format!("{CURSOR_LEFT}{DELETE_CHAR}"));
    }

    fn delete(&mut self, out: &mut dyn DisplaySink) {
        if self.line.cursor == self.line.len() {
            return;
        }
        self.line.text.remove(self.line.cursor);
        let tail = self.line.tail(self.line.cursor);
        out.write_display(&format!("{SAVE_CURSOR}{tail} {RESTORE_CURSOR}"));
    }

    fn replace_line(&mut self, text: &str, out: &mut dyn DisplaySink) {
        self.line.text = text.chars().collect();
        self.line.cursor = self.line.len();
        out.write_display(&format!("\r{CLEAR_TO_EOL}{text}"));
    }

    fn commit(&mut self, out: &mut dyn DisplaySink) -> Option<EditorAction> {
        out.write_display(NEWLINE);
        let text = self.line.text();
        self.line.clear();

        if text.trim().is_empty() {
            return None;
        }
        self.history.add(&text);
        Some(EditorAction::Submit(text))
    }
}
