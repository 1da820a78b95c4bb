//! tspterm - a line-editing terminal for Lua/TSP instruments
//!
//! Connects to an instrument's raw socket (port 5025) and gives its Lua
//! command interpreter a local line editor: cursor keys, history and paste
//! work before a line is sent, since the instrument only ever sees whole
//! lines.
//!
//! # Quick Start
//!
//! ```text
//! tspterm -a 192.168.0.42                 # Connect and start typing
//! tspterm -a 192.168.0.42 -s sweep.lua    # F5 sends sweep.lua as a script
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | ←/→, Home/End | Move within the line |
//! | ↑/↓ | Recall history |
//! | Ctrl+V | Paste clipboard |
//! | F2 | Reconnect |
//! | F3 | Disconnect |
//! | F5 | Run script file |
//! | F6 | Print and clear the error queue |
//! | Ctrl+Q | Quit |

mod app;
mod config;
mod device;
mod editor;
mod history;
mod ui;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::FmtSubscriber;

use crate::app::App;
use crate::config::Config as TsptermConfig;
use crate::ui::TerminalDisplay;

/// Command line options
#[derive(Debug, Default)]
struct Args {
    /// Instrument address
    address: Option<String>,
    /// Script file for F5
    script: Option<PathBuf>,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("tspterm {}", VERSION);
}

fn print_help() {
    eprintln!("tspterm {} - Line-editing terminal for Lua/TSP instruments", VERSION);
    eprintln!();
    eprintln!("Usage: tspterm [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -a, --address <HOST>  Instrument address (prompted for if not set)");
    eprintln!("  -s, --script <FILE>   Script file sent with F5");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Ctrl+V                Paste clipboard into the line");
    eprintln!("  Up/Down               Recall history");
    eprintln!("  F2                    Reconnect");
    eprintln!("  F3                    Disconnect");
    eprintln!("  F5                    Run script file");
    eprintln!("  F6                    Print and clear the instrument error queue");
    eprintln!("  Ctrl+Q                Quit");
    eprintln!();
    eprintln!("Configuration: ~/.tspterm/config.toml");
    eprintln!("Log file:      ~/.tspterm/tspterm.log");
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-a" | "--address" => {
                i += 1;
                let value = args.get(i).ok_or("Missing address argument")?;
                parsed.address = Some(value.clone());
            }
            "-s" | "--script" => {
                i += 1;
                let value = args.get(i).ok_or("Missing script argument")?;
                parsed.script = Some(PathBuf::from(value));
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Ask for the instrument address on the normal (cooked) terminal.
///
/// An empty answer takes `default`; `None` means start disconnected.
fn prompt_for_address(default: Option<&str>) -> io::Result<Option<String>> {
    let mut stderr = io::stderr();
    match default {
        Some(default) => write!(stderr, "Instrument address [{}]: ", default)?,
        None => write!(stderr, "Instrument address: ")?,
    }
    stderr.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim();

    if answer.is_empty() {
        Ok(default.map(str::to_string))
    } else {
        Ok(Some(answer.to_string()))
    }
}

/// Log to ~/.tspterm/tspterm.log; stdout belongs to the raw-mode terminal
fn init_logging(config: &TsptermConfig) {
    let log_path = crate::config::data_dir()
        .map(|dir| dir.join("tspterm.log"))
        .unwrap_or_else(|| PathBuf::from("tspterm.log"));

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(config.level())
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let argv: Vec<String> = env::args().collect();
    let args = match parse_args(&argv) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let config = TsptermConfig::load();
    init_logging(&config);
    info!("tspterm {} starting...", VERSION);

    // Without --address, ask, offering the configured address as the default
    let address = match args.address {
        Some(address) => Some(address),
        None => prompt_for_address(config.address.as_deref())?,
    };
    info!("Instrument: {:?} port {}", address, config.port);

    let mut display = TerminalDisplay::new();
    display.init()?;

    let mut app = App::new(display, config.port, args.script);
    let result = app.run(address.as_deref());

    // Dropping the app restores cooked mode
    drop(app);
    eprintln!();
    result
}
