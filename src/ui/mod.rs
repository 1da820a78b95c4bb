//! Local terminal input and output.
//!
//! - **keymapper**: crossterm key events to raw keystroke tokens
//! - **display**: the `DisplaySink` the core writes to, and the raw-mode
//!   stdout implementation

pub mod display;
pub mod keymapper;

pub use display::{DisplaySink, TerminalDisplay};
pub use keymapper::KeyMapper;
