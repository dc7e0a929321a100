use std::collections::VecDeque;

use crate::config::InterfaceConfig;
use crate::core::term::Terminal;
use crate::error::Result;
use crate::uri::ParsedUri;

use super::{capacity, ScrollbackBuffer};

/// The last `max_lines` logical lines of output, split on `\n`
pub struct LineBuffer {
    lines: VecDeque<Vec<u8>>,
    max_lines: usize,
}

impl LineBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::from([Vec::new()]),
            max_lines: max_lines.max(1),
        }
    }

    /// Room for the scroll-back plus one visible screen
    pub fn create(uri: &ParsedUri, config: &InterfaceConfig) -> Result<Box<dyn ScrollbackBuffer>> {
        let size = capacity(uri, config.scrollback_size)?;
        Ok(Box::new(Self::new(size + config.rows as usize)))
    }

    pub fn lines(&self) -> impl Iterator<Item = &[u8]> {
        self.lines.iter().map(Vec::as_slice)
    }
}

impl ScrollbackBuffer for LineBuffer {
    fn record(&mut self, data: &[u8], _screen: &Terminal) {
        for &byte in data {
            match byte {
                b'\n' => {
                    self.lines.push_back(Vec::new());
                    while self.lines.len() > self.max_lines {
                        self.lines.pop_front();
                    }
                }
                b'\r' => {}
                _ => {
                    if let Some(line) = self.lines.back_mut() {
                        line.push(byte);
                    }
                }
            }
        }
    }

    fn replay(&self, _screen: &Terminal) -> Vec<u8> {
        let mut lines: Vec<&[u8]> = self.lines().collect();
        if lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        lines.join(&b"\r\n"[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_accumulate_and_evict() {
        let screen = Terminal::new(80, 5, 0);
        let mut buffer = LineBuffer::new(15);
        assert!(buffer.replay(&screen).is_empty());

        buffer.record(b"Hello", &screen);
        buffer.record(b"Hello", &screen);
        assert_eq!(buffer.replay(&screen), b"HelloHello");

        buffer.record(b"\r\nHello\n", &screen);
        assert_eq!(buffer.replay(&screen), b"HelloHello\r\nHello");

        for i in 1..20 {
            buffer.record(format!("<{}>\n", i).as_bytes(), &screen);
        }
        let text = String::from_utf8(buffer.replay(&screen)).unwrap();
        for i in 1..6 {
            assert!(!text.contains(&format!("<{}>", i)));
        }
        for i in 6..20 {
            assert!(text.contains(&format!("<{}>", i)));
        }
    }
}
