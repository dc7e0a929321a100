//! vtty - a virtual TTY engine
//!
//! Bridges a backend (a closure, a socket, anything that produces bytes) and
//! any number of display clients, while behaving like a real terminal: the
//! output is interpreted by a VT screen model, history is kept in a
//! scroll-back buffer, and late clients are brought up to date on attach.
//!
//! # Architecture
//!
//! ```text
//! Registry ──create(uri)──▶ Interface
//!                           ├── Backend        (echo, tcp, function, plugins)
//!                           ├── Terminal       (screen model + VT parser)
//!                           ├── ScrollbackBuffer (terminal, line, raw)
//!                           ├── CaptureController
//!                           └── clients + negotiated geometry
//! ```

pub mod backend;
pub mod buffer;
pub mod config;
pub mod core;
pub mod error;
pub mod registry;
pub mod uri;

pub use crate::config::{ConfigPatch, InterfaceConfig};
pub use crate::core::capture::{CaptureController, CaptureMode, CaptureOutcome};
pub use crate::core::geometry::{negotiate, ClientId, Geometry};
pub use crate::core::interface::{
    Backend, Callbacks, Client, ClientHandle, Interface, InterfaceHandle, InterfaceState,
};
pub use crate::core::term::{TermEvent, Terminal, TerminalModes};
pub use crate::error::{CorruptSequenceError, Result, VttyError};
pub use crate::registry::{create, create_with, PluginEntry, PluginSource, Registry};
pub use crate::uri::ParsedUri;
