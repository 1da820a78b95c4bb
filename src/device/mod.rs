//! Instrument connection.
//!
//! - **protocol**: fixed commands, script framing, inbound line endings
//! - **session**: TCP connection lifecycle and the send operations
//!
//! # Architecture
//!
//! ```text
//! DeviceSession (event loop thread)
//! ├── connector thread ──► DeviceEvent::Connected / ConnectFailed
//! └── reader thread    ──► DeviceEvent::Data / Closed
//! ```

pub mod protocol;
pub mod session;

pub use protocol::DEVICE_PORT;
pub use session::{ConnectionState, DeviceError, DeviceEvent, DeviceSession, SessionNotice};
