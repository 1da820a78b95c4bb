//! Interactive line editing.
//!
//! - **decoder**: keystroke token to logical edit command
//! - **line**: the editable line, its cursor, and the display deltas that
//!   keep the terminal in step with it
//!
//! # Data Flow
//!
//! ```text
//! token ──► decode() ──► EditCommand ──► LineEditor ──► display deltas
//!                                           │
//!                                           ├── CommandHistory (Up/Down)
//!                                           └── EditorAction::Submit ──► DeviceSession
//! ```

pub mod decoder;
pub mod line;

pub use decoder::{decode, EditCommand};
pub use line::{EditableLine, EditorAction, LineEditor};
