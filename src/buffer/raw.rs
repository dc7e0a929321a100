use std::collections::VecDeque;

use crate::config::InterfaceConfig;
use crate::core::term::Terminal;
use crate::error::Result;
use crate::uri::ParsedUri;

use super::{capacity, ScrollbackBuffer};

/// The last `limit` bytes of output, replayed verbatim
pub struct RawBuffer {
    data: VecDeque<u8>,
    limit: usize,
}

impl RawBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            data: VecDeque::new(),
            limit,
        }
    }

    /// Defaults to `scrollback_size` full-width lines worth of bytes
    pub fn create(uri: &ParsedUri, config: &InterfaceConfig) -> Result<Box<dyn ScrollbackBuffer>> {
        let default = config.scrollback_size.saturating_mul(config.cols as usize);
        Ok(Box::new(Self::new(capacity(uri, default)?)))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ScrollbackBuffer for RawBuffer {
    fn record(&mut self, data: &[u8], _screen: &Terminal) {
        let data = &data[data.len().saturating_sub(self.limit)..];
        let overflow = (self.data.len() + data.len()).saturating_sub(self.limit);
        self.data.drain(..overflow.min(self.data.len()));
        self.data.extend(data);
    }

    fn replay(&self, _screen: &Terminal) -> Vec<u8> {
        self.data.iter().copied().collect()
    }
}
