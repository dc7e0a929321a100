//! vtty - attach the local console to a virtual TTY
//!
//! Creates an interface from a URI, starts it and attaches this terminal as
//! its only client. Typed keys go to the backend; backend output is shown
//! as-is by the host terminal.
//!
//! # Quick Start
//!
//! ```text
//! vtty echo://                    # everything typed is echoed back
//! vtty tcp://localhost:7777       # raw TCP session
//! vtty "tcp://host:23?local_echo=0&buffer=raw://"
//! vtty ssl://host:992            # TLS session, needs the `tls` feature
//! ```
//!
//! Press Ctrl+] to detach. Logs go to `~/.vtty/vtty.log`; set `VTTY_LOG`
//! (e.g. `VTTY_LOG=debug`) to change the level.

mod console;

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vtty::{Callbacks, ConfigPatch, Geometry};

use crate::console::{encode_key, ConsoleClient};

const VERSION: &str = env!("CARGO_PKG_VERSION");

struct Args {
    uri: String,
    config_file: Option<PathBuf>,
    overrides: ConfigPatch,
}

fn print_help() {
    eprintln!("vtty {} - attach this terminal to a virtual TTY", VERSION);
    eprintln!();
    eprintln!("Usage: vtty [OPTIONS] <URI>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>   Config file (default: ~/.vtty/config.toml)");
    eprintln!("  -t, --title <TITLE>   Interface title");
    eprintln!("  -b, --buffer <URI>    Scroll-back buffer (terminal://, line://, raw://)");
    eprintln!("  -l, --list            List available schemes");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Ctrl+]                Detach and exit");
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut uri = None;
    let mut config_file = None;
    let mut overrides = ConfigPatch::default();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            "-v" | "--version" => {
                eprintln!("vtty {}", VERSION);
                return Ok(None);
            }
            "-l" | "--list" => {
                eprintln!("backends: {}", vtty::backend::registry().schemes().join(", "));
                eprintln!("buffers:  {}", vtty::buffer::registry().schemes().join(", "));
                return Ok(None);
            }
            "-c" | "--config" => {
                let path = args.next().context("--config requires a file")?;
                config_file = Some(PathBuf::from(path));
            }
            "-t" | "--title" => {
                overrides = overrides.with_title(args.next().context("--title requires a value")?);
            }
            "-b" | "--buffer" => {
                overrides = overrides.with_buffer(args.next().context("--buffer requires a URI")?);
            }
            other if other.starts_with('-') => bail!("unknown option {}", other),
            other => {
                if uri.replace(other.to_string()).is_some() {
                    bail!("only one URI may be given");
                }
            }
        }
    }

    let uri = uri.context("missing URI")?;
    Ok(Some(Args {
        uri,
        config_file,
        overrides,
    }))
}

fn init_logging() {
    let log_path = vtty::config::log_path().unwrap_or_else(|| PathBuf::from("vtty.log"));
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("VTTY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => return Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("vtty {} starting", VERSION);

    // Command line settings win over the config file
    let file_patch = match &args.config_file {
        Some(path) => ConfigPatch::load_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ConfigPatch::load(),
    };
    let mut overrides = file_patch;
    merge(&mut overrides, args.overrides);

    let iface = vtty::create(&args.uri, &overrides, Callbacks::new())
        .with_context(|| format!("cannot open {}", args.uri))?;
    iface
        .start()
        .with_context(|| format!("cannot start {}", args.uri))?;

    terminal::enable_raw_mode().context("failed to enable raw mode")?;
    let result = run(&iface);

    let _ = terminal::disable_raw_mode();
    print!("\x1b[0m\r\n");
    let _ = std::io::stdout().flush();

    iface.shutdown();
    if let Err(e) = &result {
        error!("session ended with error: {:#}", e);
    }
    info!("vtty exiting");
    result
}

fn merge(base: &mut ConfigPatch, top: ConfigPatch) {
    base.title = top.title.or(base.title.take());
    base.buffer_uri = top.buffer_uri.or(base.buffer_uri.take());
    base.extra.extend(top.extra);
}

/// Pump key and resize events until the interface shuts down or the user
/// detaches
fn run(iface: &Arc<vtty::Interface>) -> anyhow::Result<()> {
    let (cols, rows) = terminal::size()?;
    let client = Arc::new(ConsoleClient::new());
    let handle = iface.attach_client(client, Geometry::new(rows, cols))?;
    info!("attached as client {} at {}x{}", handle.id(), rows, cols);

    while !iface.is_shutdown() {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                if key.code == KeyCode::Char(']') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    info!("detach requested");
                    break;
                }
                if let Some(bytes) = encode_key(&key, &iface.modes()) {
                    if let Err(e) = handle.send(&bytes) {
                        if e.is_shutdown() {
                            break;
                        }
                        return Err(e.into());
                    }
                }
            }
            Event::Paste(text) => handle.send(text.as_bytes())?,
            Event::Resize(cols, rows) => handle.resize(Geometry::new(rows, cols))?,
            _ => {}
        }
    }

    handle.detach();
    Ok(())
}
