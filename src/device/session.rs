//! Device session management
//!
//! Owns the TCP connection to the instrument. Connecting and reading happen on
//! helper threads that report back as [`DeviceEvent`]s through the caller's
//! event channel; everything else runs on the thread that owns the session.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::Sender;
use std::thread;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::protocol::{
    script_frames, LineEndings, DEVICE_PORT, DRAIN_ERRORS_COMMAND, INIT_COMMAND,
};

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Not connected to an instrument")]
    NotConnected,

    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write to instrument: {0}")]
    Write(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Write half of an instrument connection
pub trait Link: Write + Send {
    /// Close the connection in both directions
    fn close(&mut self);
}

impl Link for TcpStream {
    fn close(&mut self) {
        let _ = self.shutdown(Shutdown::Both);
    }
}

/// Events produced by the connector and reader threads.
///
/// Each carries the generation of the connect attempt it belongs to, so
/// events from a replaced connection can be told apart and dropped.
#[derive(Debug)]
pub enum DeviceEvent {
    /// TCP connection established
    Connected { generation: u64, stream: TcpStream },
    /// TCP connection could not be established
    ConnectFailed { generation: u64, error: io::Error },
    /// Bytes received from the instrument
    Data { generation: u64, bytes: Vec<u8> },
    /// The instrument closed the connection, or reading failed
    Closed { generation: u64 },
}

/// What the host should show after a device event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// Now connected to the given `host:port`
    Connected(String),
    /// The connect attempt failed
    ConnectFailed(String),
    /// Normalized text received from the instrument
    Output(String),
    /// The connection was lost
    Disconnected,
}

/// A session with one instrument
pub struct DeviceSession<E> {
    state: ConnectionState,
    address: String,
    port: u16,
    /// Open connection, present only while Connected
    link: Option<Box<dyn Link>>,
    /// Current connect attempt
    generation: u64,
    line_endings: LineEndings,
    /// Channel the helper threads report to
    events: Sender<E>,
}

impl<E> DeviceSession<E>
where
    E: From<DeviceEvent> + Send + 'static,
{
    /// Create a disconnected session reporting to `events`
    pub fn new(events: Sender<E>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            address: String::new(),
            port: DEVICE_PORT,
            link: None,
            generation: 0,
            line_endings: LineEndings::new(),
            events,
        }
    }

    /// Use a port other than the instrument default
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Address of the current or last connection
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Start connecting to `address`.
    ///
    /// Any existing connection is closed first. The result arrives later as a
    /// [`DeviceEvent`] to pass to [`handle_event`](Self::handle_event).
    pub fn connect(&mut self, address: &str) {
        self.disconnect();

        self.generation += 1;
        let generation = self.generation;
        self.address = address.to_string();
        self.state = ConnectionState::Connecting;
        info!("Connecting to {}:{} (attempt {})", address, self.port, generation);

        let host = address.to_string();
        let port = self.port;
        let events = self.events.clone();
        thread::spawn(move || {
            let event = match TcpStream::connect((host.as_str(), port)) {
                Ok(stream) => DeviceEvent::Connected { generation, stream },
                Err(error) => DeviceEvent::ConnectFailed { generation, error },
            };
            let _ = events.send(event.into());
        });
    }

    /// Close the connection. Safe to call in any state.
    pub fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
            info!("Disconnected from {}:{}", self.address, self.port);
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Write `text` verbatim; the caller supplies any terminator
    pub fn send(&mut self, text: &str) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(DeviceError::NotConnected);
        }
        let Some(link) = self.link.as_mut() else {
            return Err(DeviceError::NotConnected);
        };

        if let Err(e) = link.write_all(text.as_bytes()).and_then(|()| link.flush()) {
            error!("Write to {} failed: {}", self.address, e);
            self.disconnect();
            return Err(DeviceError::Write(e));
        }
        debug!("Sent {} bytes", text.len());
        Ok(())
    }

    pub fn send_line(&mut self, text: &str) -> Result<()> {
        self.send(&format!("{}\n", text))
    }

    /// Send a script framed by the begin/end sentinels.
    ///
    /// The three messages are written back to back without waiting for the
    /// instrument. If the link drops part way the next write fails and the
    /// whole script has to be sent again.
    pub fn run_script(&mut self, source: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(DeviceError::NotConnected);
        }
        for frame in script_frames(source) {
            self.send(&frame)?;
        }
        info!("Sent script ({} bytes)", source.len());
        Ok(())
    }

    /// Ask the instrument to print and clear its error queue
    pub fn drain_error_queue(&mut self) -> Result<()> {
        self.send(DRAIN_ERRORS_COMMAND)
    }

    /// Apply an event from a connector or reader thread
    pub fn handle_event(&mut self, event: DeviceEvent) -> Option<SessionNotice> {
        match event {
            DeviceEvent::Connected { generation, stream } => self.on_connected(generation, stream),
            DeviceEvent::ConnectFailed { generation, error } => {
                if !self.is_current(generation, ConnectionState::Connecting) {
                    return None;
                }
                self.state = ConnectionState::Disconnected;
                let err = DeviceError::Connect {
                    address: format!("{}:{}", self.address, self.port),
                    source: error,
                };
                warn!("{}", err);
                Some(SessionNotice::ConnectFailed(err.to_string()))
            }
            DeviceEvent::Data { generation, bytes } => {
                if !self.is_current(generation, ConnectionState::Connected) {
                    return None;
                }
                Some(SessionNotice::Output(self.line_endings.normalize(&bytes)))
            }
            DeviceEvent::Closed { generation } => {
                if !self.is_current(generation, ConnectionState::Connected) {
                    return None;
                }
                self.on_close();
                Some(SessionNotice::Disconnected)
            }
        }
    }

    fn is_current(&self, generation: u64, state: ConnectionState) -> bool {
        if generation != self.generation || self.state != state {
            debug!("Dropping stale event from attempt {}", generation);
            return false;
        }
        true
    }

    fn on_connected(&mut self, generation: u64, mut stream: TcpStream) -> Option<SessionNotice> {
        if !self.is_current(generation, ConnectionState::Connecting) {
            stream.close();
            return None;
        }

        let reader = match stream.try_clone() {
            Ok(reader) => reader,
            Err(e) => {
                stream.close();
                self.state = ConnectionState::Disconnected;
                error!("Failed to clone socket: {}", e);
                return Some(SessionNotice::ConnectFailed(e.to_string()));
            }
        };
        self.spawn_reader(generation, reader);

        self.link = Some(Box::new(stream));
        self.state = ConnectionState::Connected;
        self.line_endings = LineEndings::new();
        let target = format!("{}:{}", self.address, self.port);
        info!("Connected to {}", target);

        if let Err(e) = self.send(INIT_COMMAND) {
            warn!("Initialization command failed: {}", e);
            return Some(SessionNotice::Disconnected);
        }
        Some(SessionNotice::Connected(target))
    }

    fn spawn_reader(&self, generation: u64, mut reader: TcpStream) {
        let events = self.events.clone();
        thread::spawn(move || {
            let mut buffer = vec![0u8; 4096];

            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        let event = DeviceEvent::Data {
                            generation,
                            bytes: buffer[..n].to_vec(),
                        };
                        if events.send(event.into()).is_err() {
                            return;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!("Read from instrument ended: {}", e);
                        break;
                    }
                }
            }
            let _ = events.send(DeviceEvent::Closed { generation }.into());
        });
    }

    fn on_close(&mut self) {
        self.link = None;
        self.state = ConnectionState::Disconnected;
        info!("Connection to {}:{} closed", self.address, self.port);
    }
}

impl<E> Drop for DeviceSession<E> {
    fn drop(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
        }
    }
}
