use crate::config::InterfaceConfig;
use crate::core::term::Terminal;
use crate::error::Result;
use crate::uri::ParsedUri;

use super::{capacity, ScrollbackBuffer};

/// Keeps history in the shared screen and replays it as a screen dump
pub struct TerminalBuffer {
    history: usize,
}

impl TerminalBuffer {
    pub fn new(history: usize) -> Self {
        Self { history }
    }

    pub fn create(uri: &ParsedUri, config: &InterfaceConfig) -> Result<Box<dyn ScrollbackBuffer>> {
        Ok(Box::new(Self::new(capacity(uri, config.scrollback_size)?)))
    }
}

impl ScrollbackBuffer for TerminalBuffer {
    fn record(&mut self, _data: &[u8], _screen: &Terminal) {}

    fn replay(&self, screen: &Terminal) -> Vec<u8> {
        if screen.cursor_position().is_none() {
            return Vec::new();
        }
        screen.get_buffer()
    }

    fn screen_history(&self) -> usize {
        self.history
    }
}
