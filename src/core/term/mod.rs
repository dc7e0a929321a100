//! Terminal emulation: screen model plus escape interpreter.

mod dump;
mod parser;
mod state;

pub use dump::sgr;
pub use parser::{TermEvent, VtParser, MAX_SEQUENCE_LEN};
pub use state::{
    AttrFlags, Cell, CellAttrs, Color, CursorState, Dirty, Row, ScreenBuffer, ScreenState,
    TerminalModes, DEFAULT_SCROLLBACK_LIMIT,
};

/// A screen model driven by a streaming VT parser
pub struct Terminal {
    state: ScreenState,
    parser: VtParser,
    fed: bool,
    corrupt_sequences: u64,
}

impl Terminal {
    pub fn new(cols: u16, rows: u16, scrollback_limit: usize) -> Self {
        Self::with_parser(cols, rows, scrollback_limit, VtParser::new())
    }

    pub fn with_parser(cols: u16, rows: u16, scrollback_limit: usize, parser: VtParser) -> Self {
        Self {
            state: ScreenState::new(cols, rows, scrollback_limit),
            parser,
            fed: false,
            corrupt_sequences: 0,
        }
    }

    /// Interpret `bytes`, mutating the screen, and return structural events
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<TermEvent> {
        self.fed = true;
        let mut events = Vec::new();
        for &byte in bytes {
            if let Some(event) = self.parser.feed(byte, &mut self.state) {
                if matches!(event, TermEvent::CorruptSequence(_)) {
                    self.corrupt_sequences += 1;
                }
                events.push(event);
            }
        }
        events
    }

    /// Replayable dump of scroll-back, grid, cursor and style
    pub fn get_buffer(&self) -> Vec<u8> {
        dump::dump_screen(&self.state)
    }

    /// `(row, col)` of the cursor; `None` until the first feed
    pub fn cursor_position(&self) -> Option<(u16, u16)> {
        if !self.fed {
            return None;
        }
        let cursor = self.state.active_cursor();
        Some((cursor.row, cursor.col))
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.state.resize(cols, rows);
    }

    pub fn size(&self) -> (u16, u16) {
        (self.state.cols, self.state.rows)
    }

    pub fn title(&self) -> &str {
        &self.state.title
    }

    pub fn line_text(&self, row: usize) -> String {
        self.state.line_text(row)
    }

    /// Scroll-back lines, oldest first
    pub fn scrollback_lines(&self) -> Vec<String> {
        self.state
            .primary_screen
            .scrollback
            .iter()
            .map(Row::text)
            .collect()
    }

    pub fn take_dirty(&mut self) -> Dirty {
        self.state.take_dirty()
    }

    /// Number of sequences abandoned for overrunning the lookahead budget
    pub fn corrupt_sequences(&self) -> u64 {
        self.corrupt_sequences
    }

    pub fn state(&self) -> &ScreenState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hello_world_scenario() {
        let mut term = Terminal::new(80, 24, 100);
        assert_eq!(term.cursor_position(), None);

        term.feed(b"Hello\r\nWorld");

        assert_eq!(term.cursor_position(), Some((1, 5)));
        assert_eq!(term.line_text(0), "Hello");
        assert_eq!(term.line_text(1), "World");
    }

    #[test]
    fn test_unterminated_sequence_recovers() {
        let mut term = Terminal::new(80, 24, 100);
        let mut junk = b"\x1b]0;".to_vec();
        junk.extend(std::iter::repeat(b'A').take(50_000));

        let events = term.feed(&junk);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, TermEvent::CorruptSequence(_)))
                .count(),
            1
        );
        assert_eq!(term.corrupt_sequences(), 1);

        term.feed(b"\x1b[2J\x1b[Hplain text");
        assert_eq!(term.line_text(0), "plain text");
        assert_eq!(term.cursor_position(), Some((0, 10)));
    }

    #[test]
    fn test_round_trip_with_styles_and_history() {
        let mut term = Terminal::new(20, 4, 100);
        term.feed(b"one\r\ntwo\r\n\x1b[1;32mthree\x1b[0m\r\nfour\r\nfive\r\n\x1b[4mtail");
        term.feed("漢字".as_bytes());

        let mut copy = Terminal::new(20, 4, 100);
        copy.feed(&term.get_buffer());

        for row in 0..4 {
            assert_eq!(copy.line_text(row), term.line_text(row));
        }
        assert_eq!(copy.scrollback_lines(), term.scrollback_lines());
        assert_eq!(copy.cursor_position(), term.cursor_position());
        assert_eq!(copy.state().current_attrs, term.state().current_attrs);
        assert_eq!(
            copy.state().active_screen().rows[0].cells[0].attrs,
            term.state().active_screen().rows[0].cells[0].attrs
        );
    }

    #[test]
    fn test_round_trip_pending_wrap() {
        let mut term = Terminal::new(5, 2, 0);
        term.feed(b"abcde");
        assert_eq!(term.cursor_position(), Some((0, 5)));

        let mut copy = Terminal::new(5, 2, 0);
        copy.feed(&term.get_buffer());
        assert_eq!(copy.cursor_position(), Some((0, 5)));
        assert_eq!(copy.line_text(0), "abcde");
    }

    proptest! {
        #[test]
        fn prop_cursor_stays_in_bounds(
            cols in 1u16..40,
            rows in 1u16..12,
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16),
        ) {
            let mut term = Terminal::new(cols, rows, 16);
            for chunk in &chunks {
                term.feed(chunk);
                let (row, col) = term.cursor_position().unwrap_or((0, 0));
                prop_assert!(row < rows);
                prop_assert!(col <= cols);
            }
        }

        #[test]
        fn prop_cursor_in_bounds_for_escape_soup(
            cols in 1u16..30,
            rows in 1u16..10,
            pieces in prop::collection::vec(
                prop::sample::select(vec![
                    "\x1b[", "\x1b]", "\x1b", "\r", "\n", "\x08", "\t", ";", "9", "99",
                    "A", "B", "C", "D", "H", "J", "K", "L", "M", "P", "@", "S", "T",
                    "r", "m", "?1049h", "?1049l", "漢", "x", "\x07",
                ]),
                0..200,
            ),
            new_size in (1u16..30, 1u16..10),
        ) {
            let mut term = Terminal::new(cols, rows, 8);
            term.feed(pieces.concat().as_bytes());
            let (row, col) = term.cursor_position().unwrap_or((0, 0));
            prop_assert!(row < rows && col <= cols);

            term.resize(new_size.0, new_size.1);
            term.feed(b"z");
            let (row, col) = term.cursor_position().unwrap_or((0, 0));
            prop_assert!(row < new_size.1 && col <= new_size.0);
        }

        #[test]
        fn prop_round_trip_plain_text(
            lines in prop::collection::vec("[a-z ]{0,12}", 0..10),
        ) {
            let mut term = Terminal::new(12, 5, 50);
            term.feed(lines.join("\r\n").as_bytes());

            let mut copy = Terminal::new(12, 5, 50);
            copy.feed(&term.get_buffer());

            for row in 0..5 {
                prop_assert_eq!(copy.line_text(row), term.line_text(row));
            }
            prop_assert_eq!(copy.cursor_position(), term.cursor_position());
        }
    }
}
