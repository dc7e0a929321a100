//! Scroll-back buffers, selected per interface by `buffer_uri`.
//!
//! - **terminal**: the shared screen's own history, replayed as a screen dump
//! - **line**: the last N logical lines of raw output
//! - **raw**: the last N bytes of raw output
//!
//! Whichever buffer is configured is the only scroll-back an interface
//! keeps; the non-terminal buffers turn the screen's history off.

mod line;
mod raw;
mod terminal;

use std::sync::{Arc, OnceLock};

pub use line::LineBuffer;
pub use raw::RawBuffer;
pub use terminal::TerminalBuffer;

use crate::config::InterfaceConfig;
use crate::core::term::Terminal;
use crate::error::{Result, VttyError};
use crate::registry::Registry;
use crate::uri::ParsedUri;

pub trait ScrollbackBuffer: Send {
    /// Record output that has just been applied to `screen`
    fn record(&mut self, data: &[u8], screen: &Terminal);

    /// Bytes that bring a freshly attached client up to date
    fn replay(&self, screen: &Terminal) -> Vec<u8>;

    /// History lines the shared screen should keep itself
    fn screen_history(&self) -> usize {
        0
    }
}

pub type BufferFactory =
    Arc<dyn Fn(&ParsedUri, &InterfaceConfig) -> Result<Box<dyn ScrollbackBuffer>> + Send + Sync>;

/// Process-wide buffer registry, preloaded with the built-in schemes
pub fn registry() -> &'static Registry<BufferFactory> {
    static BUFFERS: OnceLock<Registry<BufferFactory>> = OnceLock::new();
    BUFFERS.get_or_init(|| {
        let registry = Registry::new("buffer");
        registry.register("terminal", Arc::new(TerminalBuffer::create) as BufferFactory);
        registry.register("line", Arc::new(LineBuffer::create) as BufferFactory);
        registry.register("raw", Arc::new(RawBuffer::create) as BufferFactory);
        registry
    })
}

/// Build the buffer named by `config.buffer_uri`
pub fn create(config: &InterfaceConfig) -> Result<Box<dyn ScrollbackBuffer>> {
    let uri = ParsedUri::parse(&config.buffer_uri)?;
    let factory = registry().resolve(&uri.scheme)?;
    factory(&uri, config)
}

/// `size` query override, else `default`
fn capacity(uri: &ParsedUri, default: usize) -> Result<usize> {
    match uri.query_value("size") {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| VttyError::malformed(&uri.raw, format!("invalid size {:?}", value))),
    }
}
