//! Application event loop
//!
//! Every input source (keyboard, instrument socket, clipboard) runs on its own
//! thread and reports through one channel; this loop is the only place that
//! touches editor and session state, so events are applied strictly in
//! arrival order.

use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, error, info, warn};

use crate::device::{ConnectionState, DeviceError, DeviceEvent, DeviceSession, SessionNotice};
use crate::editor::{EditorAction, LineEditor};
use crate::ui::{DisplaySink, KeyMapper};

/// Events consumed by the main loop
#[derive(Debug)]
pub enum AppEvent {
    /// Local terminal event
    Input(Event),
    /// Connector or reader thread event
    Device(DeviceEvent),
    /// Clipboard text for the paste request with this id
    PasteCompleted { id: u64, text: String },
}

impl From<DeviceEvent> for AppEvent {
    fn from(event: DeviceEvent) -> Self {
        AppEvent::Device(event)
    }
}

/// Keys handled by the application rather than the line editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Quit,
    Reconnect,
    Disconnect,
    RunScript,
    DrainErrors,
}

impl HostCommand {
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q')
                if key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                Some(HostCommand::Quit)
            }
            KeyCode::F(2) => Some(HostCommand::Reconnect),
            KeyCode::F(3) => Some(HostCommand::Disconnect),
            KeyCode::F(5) => Some(HostCommand::RunScript),
            KeyCode::F(6) => Some(HostCommand::DrainErrors),
            _ => None,
        }
    }
}

/// Write a status line on a line of its own
fn write_notice(out: &mut dyn DisplaySink, text: &str) {
    out.write_display(&format!("\r\n\x1b[7m {} \x1b[0m\r\n", text));
}

/// The terminal application
pub struct App<D: DisplaySink> {
    display: D,
    editor: LineEditor,
    session: DeviceSession<AppEvent>,
    /// Script file sent by F5
    script: Option<PathBuf>,
    events_tx: Sender<AppEvent>,
    events_rx: Receiver<AppEvent>,
    running: bool,
}

impl<D: DisplaySink> App<D> {
    pub fn new(display: D, port: u16, script: Option<PathBuf>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            display,
            editor: LineEditor::new(),
            session: DeviceSession::new(events_tx.clone()).with_port(port),
            script,
            events_tx,
            events_rx,
            running: true,
        }
    }

    #[cfg(test)]
    pub fn editor(&self) -> &LineEditor {
        &self.editor
    }

    #[cfg(test)]
    pub fn session(&self) -> &DeviceSession<AppEvent> {
        &self.session
    }

    #[cfg(test)]
    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run until the user quits
    pub fn run(&mut self, address: Option<&str>) -> anyhow::Result<()> {
        self.spawn_input_reader();

        match address {
            Some(address) => self.connect(address),
            None => write_notice(&mut self.display, "Not connected. Press F2 to connect."),
        }

        while self.is_running() {
            let event = self.events_rx.recv()?;
            self.handle_event(event);
        }

        self.session.disconnect();
        info!("Event loop finished");
        Ok(())
    }

    /// Forward terminal events to the loop
    fn spawn_input_reader(&self) {
        let tx = self.events_tx.clone();
        thread::spawn(move || loop {
            match event::read() {
                Ok(evt) => {
                    if tx.send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read terminal input: {}", e);
                    break;
                }
            }
        });
    }

    /// Apply one event
    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Input(Event::Key(key)) => self.handle_key(&key),
            AppEvent::Input(_) => {}
            AppEvent::Device(event) => {
                if let Some(notice) = self.session.handle_event(event) {
                    self.show(notice);
                }
            }
            AppEvent::PasteCompleted { id, text } => {
                let actions = self.editor.complete_paste(id, &text, &mut self.display);
                for action in actions {
                    self.perform(action);
                }
            }
        }
    }

    fn handle_key(&mut self, key: &KeyEvent) {
        // Only process key press events
        if key.kind != KeyEventKind::Press {
            return;
        }

        if let Some(command) = HostCommand::from_key(key) {
            self.host_command(command);
            return;
        }

        if let Some(token) = KeyMapper::map(key) {
            if let Some(action) = self.editor.handle_token(&token, &mut self.display) {
                self.perform(action);
            }
        }
    }

    fn host_command(&mut self, command: HostCommand) {
        debug!("Host command {:?}", command);
        match command {
            HostCommand::Quit => self.running = false,
            HostCommand::Reconnect => {
                let address = self.session.address().to_string();
                if address.is_empty() {
                    write_notice(&mut self.display, "No instrument address. Start with --address <HOST>.");
                } else {
                    self.connect(&address);
                }
            }
            HostCommand::Disconnect => {
                if self.session.state() == ConnectionState::Disconnected {
                    return;
                }
                self.session.disconnect();
                write_notice(&mut self.display, "Disconnected");
            }
            HostCommand::RunScript => self.submit_script(),
            HostCommand::DrainErrors => {
                let result = self.session.drain_error_queue();
                self.report(result);
            }
        }
    }

    fn perform(&mut self, action: EditorAction) {
        match action {
            EditorAction::Submit(line) => {
                let result = self.session.send_line(&line);
                self.report(result);
            }
            EditorAction::RequestPaste(id) => self.request_clipboard(id),
        }
    }

    /// Connect to `address`, replacing any existing connection
    pub fn connect(&mut self, address: &str) {
        self.editor.reset();
        write_notice(
            &mut self.display,
            &format!("Connecting to {}:{}...", address, self.session.port()),
        );
        self.session.connect(address);
    }

    /// Read the script file and send it framed
    fn submit_script(&mut self) {
        let Some(path) = self.script.clone() else {
            write_notice(&mut self.display, "No script file. Start with --script <FILE>.");
            return;
        };
        if !self.session.is_connected() {
            self.report(Err(DeviceError::NotConnected));
            return;
        }

        match fs::read_to_string(&path) {
            Ok(source) => {
                info!("Running script {}", path.display());
                let result = self.session.run_script(&source);
                self.report(result);
            }
            Err(e) => {
                warn!("Failed to read script {}: {}", path.display(), e);
                write_notice(&mut self.display, &format!("Cannot read {}: {}", path.display(), e));
            }
        }
    }

    /// Read the clipboard off the loop thread
    fn request_clipboard(&self, id: u64) {
        let tx = self.events_tx.clone();
        thread::spawn(move || {
            let text = match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.get_text()) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Clipboard read failed: {}", e);
                    String::new()
                }
            };
            let _ = tx.send(AppEvent::PasteCompleted { id, text });
        });
    }

    fn show(&mut self, notice: SessionNotice) {
        match notice {
            SessionNotice::Output(text) => self.display.write_display(&text),
            SessionNotice::Connected(target) => {
                write_notice(&mut self.display, &format!("Connected to {}", target));
            }
            SessionNotice::ConnectFailed(reason) => write_notice(&mut self.display, &reason),
            SessionNotice::Disconnected => {
                write_notice(&mut self.display, "Connection closed. Press F2 to reconnect.");
            }
        }
    }

    fn report(&mut self, result: Result<(), DeviceError>) {
        match result {
            Ok(()) => {}
            Err(DeviceError::NotConnected) => {
                warn!("Command skipped, not connected");
                write_notice(&mut self.display, "Not connected. Press F2 to reconnect.");
            }
            Err(e) => {
                error!("{}", e);
                write_notice(&mut self.display, &e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> AppEvent {
        AppEvent::Input(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn app() -> App<String> {
        App::new(String::new(), 5025, None)
    }

    #[test]
    fn test_host_keys() {
        let ctrl_q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert_eq!(HostCommand::from_key(&ctrl_q), Some(HostCommand::Quit));
        let plain_q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(HostCommand::from_key(&plain_q), None);
        let f5 = KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE);
        assert_eq!(HostCommand::from_key(&f5), Some(HostCommand::RunScript));
    }

    #[test]
    fn test_typing_reaches_editor() {
        let mut app = app();
        app.handle_event(press(KeyCode::Char('h')));
        app.handle_event(press(KeyCode::Char('i')));
        app.handle_event(press(KeyCode::Left));

        assert_eq!(app.editor().line().text(), "hi");
        assert_eq!(app.editor().line().cursor(), 1);
        assert_eq!(app.display(), "hi\x1b[D");
    }

    #[test]
    fn test_submit_while_disconnected_warns() {
        let mut app = app();
        app.handle_event(press(KeyCode::Char('x')));
        app.handle_event(press(KeyCode::Enter));

        assert!(app.display().contains("Not connected"));
        assert!(app.editor().line().is_empty());
        assert_eq!(app.editor().history().len(), 1);
        assert_eq!(app.session().state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_host_commands_while_disconnected() {
        let mut app = app();
        app.handle_event(press(KeyCode::F(5)));
        assert!(app.display().contains("No script file"));

        app.handle_event(press(KeyCode::F(6)));
        assert!(app.display().contains("Not connected"));

        app.handle_event(press(KeyCode::F(2)));
        assert!(app.display().contains("No instrument address"));
    }

    #[test]
    fn test_paste_completion_applies_queued_keys() {
        let mut app = app();
        app.handle_event(AppEvent::Input(Event::Key(KeyEvent::new(
            KeyCode::Char('v'),
            KeyModifiers::CONTROL,
        ))));
        assert!(app.editor().paste_pending());

        app.handle_event(press(KeyCode::Char('!')));
        app.handle_event(AppEvent::PasteCompleted { id: 1, text: "abc".to_string() });
        assert_eq!(app.editor().line().text(), "abc!");
    }

    #[test]
    fn test_paste_abandoned_by_reconnect_is_dropped() {
        let ctrl_v = || AppEvent::Input(Event::Key(KeyEvent::new(KeyCode::Char('v'), KeyModifiers::CONTROL)));
        let mut app = App::new(String::new(), 1, None);
        app.handle_event(ctrl_v());

        // Connecting resets the editor; nothing listens on port 1
        app.connect("127.0.0.1");
        app.handle_event(ctrl_v());
        assert!(app.editor().paste_pending());

        app.handle_event(AppEvent::PasteCompleted { id: 1, text: "stale".to_string() });
        assert!(app.editor().paste_pending());
        assert!(app.editor().line().is_empty());

        app.handle_event(AppEvent::PasteCompleted { id: 2, text: "fresh".to_string() });
        assert_eq!(app.editor().line().text(), "fresh");
    }

    #[test]
    fn test_ctrl_q_stops_loop() {
        let mut app = app();
        assert!(app.is_running());
        app.handle_event(AppEvent::Input(Event::Key(KeyEvent::new(
            KeyCode::Char('q'),
            KeyModifiers::CONTROL,
        ))));
        assert!(!app.is_running());
    }
}
