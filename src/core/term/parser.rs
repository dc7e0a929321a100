//! VT sequence parser
//!
//! Parses ANSI/VT escape sequences byte by byte and updates the screen model.
//! State survives across calls, so a sequence may be split over any number of
//! deliveries. Pending sequences are bounded: once a sequence runs past the
//! lookahead budget without a terminator the parser prints its bytes as
//! plain text, returns to ground and reports a [`CorruptSequenceError`].

use super::state::{AttrFlags, Color, ScreenState};
use crate::error::CorruptSequenceError;

/// Default lookahead budget for a single pending sequence, in bytes
pub const MAX_SEQUENCE_LEN: usize = 4096;

/// Structural events surfaced while interpreting a byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermEvent {
    /// OSC 0/1/2 set the window title
    TitleChanged(String),
    /// BEL in ground state
    Bell,
    /// Bytes the terminal must answer the backend with (DSR, DA)
    Reply(Vec<u8>),
    /// The application asked for a new size (CSI 8 ; rows ; cols t)
    ResizeRequest { rows: u16, cols: u16 },
    /// A pending sequence overran the lookahead budget and was shown as text
    CorruptSequence(CorruptSequenceError),
}

/// Parser state machine
pub struct VtParser {
    state: ParserState,
    params: Vec<u16>,
    intermediates: Vec<u8>,
    current_param: Option<u16>,
    osc_string: Vec<u8>,
    utf8: Utf8Decoder,
    /// Bytes consumed by the sequence currently pending
    seq_len: usize,
    /// Those bytes, kept for the overrun fallback
    pending: Vec<u8>,
    limit: usize,
}

#[derive(Clone, Copy, Default, Debug, PartialEq)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    /// Malformed CSI: swallow until a final byte
    CsiIgnore,
    OscString,
    EscapeInOsc,
    /// DCS/SOS/PM/APC payloads are swallowed until ST
    IgnoreString,
    EscapeInIgnore,
}

impl Default for VtParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VtParser {
    pub fn new() -> Self {
        Self::with_limit(MAX_SEQUENCE_LEN)
    }

    /// Parser with a custom lookahead budget (minimum 16 bytes)
    pub fn with_limit(limit: usize) -> Self {
        Self {
            state: ParserState::Ground,
            params: Vec::with_capacity(16),
            intermediates: Vec::with_capacity(4),
            current_param: None,
            osc_string: Vec::new(),
            utf8: Utf8Decoder::default(),
            seq_len: 0,
            pending: Vec::new(),
            limit: limit.max(16),
        }
    }

    /// True when no sequence or multi-byte character is pending
    pub fn is_ground(&self) -> bool {
        self.state == ParserState::Ground && self.utf8.is_empty()
    }

    /// Feed a single byte to the parser
    pub fn feed(&mut self, byte: u8, state: &mut ScreenState) -> Option<TermEvent> {
        if self.state != ParserState::Ground {
            self.seq_len += 1;
            self.pending.push(byte);
            if self.seq_len > self.limit {
                tracing::warn!(
                    "Escape sequence unterminated after {} bytes in {:?}, printing it",
                    self.seq_len - 1,
                    self.state
                );
                let pending = std::mem::take(&mut self.pending);
                self.reset();
                print_literal(&pending, state);
                return Some(TermEvent::CorruptSequence(CorruptSequenceError {
                    limit: self.limit,
                }));
            }
        }

        if byte < 0x80 && !self.utf8.is_empty() {
            // Truncated multi-byte character
            self.utf8.clear();
            state.put_char(char::REPLACEMENT_CHARACTER);
        }

        // CAN and SUB abort any sequence
        if byte == 0x18 || byte == 0x1A {
            self.reset();
            return None;
        }

        let in_string = matches!(
            self.state,
            ParserState::OscString
                | ParserState::EscapeInOsc
                | ParserState::IgnoreString
                | ParserState::EscapeInIgnore
        );

        // C0 controls execute anywhere except inside string payloads
        if byte < 0x20 && !in_string {
            return self.execute_c0(byte, state);
        }

        match self.state {
            ParserState::Ground => self.ground(byte, state),
            ParserState::Escape => self.escape(byte, state),
            ParserState::EscapeIntermediate => self.escape_intermediate(byte),
            ParserState::CsiEntry => self.csi_entry(byte, state),
            ParserState::CsiParam => self.csi_param(byte, state),
            ParserState::CsiIntermediate => self.csi_intermediate(byte, state),
            ParserState::CsiIgnore => self.csi_ignore(byte),
            ParserState::OscString => self.osc_string_state(byte, state),
            ParserState::EscapeInOsc => self.escape_in_osc(byte, state),
            ParserState::IgnoreString => self.ignore_string(byte),
            ParserState::EscapeInIgnore => self.escape_in_ignore(byte, state),
        }
    }

    fn reset(&mut self) {
        self.state = ParserState::Ground;
        self.params.clear();
        self.intermediates.clear();
        self.current_param = None;
        self.osc_string.clear();
        self.seq_len = 0;
        self.pending.clear();
    }

    fn to_ground(&mut self) {
        self.state = ParserState::Ground;
        self.seq_len = 0;
        self.pending.clear();
    }

    fn execute_c0(&mut self, byte: u8, state: &mut ScreenState) -> Option<TermEvent> {
        match byte {
            0x1B => self.enter_escape(),
            0x07 => return Some(TermEvent::Bell),
            0x08 => state.backspace(),
            0x09 => state.horizontal_tab(),
            0x0A..=0x0C => state.linefeed(),
            0x0D => state.carriage_return(),
            _ => {}
        }
        None
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.params.clear();
        self.intermediates.clear();
        self.current_param = None;
        self.seq_len = 0;
        self.pending.clear();
    }

    fn ground(&mut self, byte: u8, state: &mut ScreenState) -> Option<TermEvent> {
        match byte {
            0x20..=0x7E => state.put_char(byte as char),
            0x7F => {} // DEL
            _ => {
                for ch in self.utf8.push(byte) {
                    state.put_char(ch);
                }
            }
        }
        None
    }

    fn escape(&mut self, byte: u8, state: &mut ScreenState) -> Option<TermEvent> {
        match byte {
            b'[' => {
                self.state = ParserState::CsiEntry;
                self.params.clear();
                self.intermediates.clear();
                self.current_param = None;
                return None;
            }
            b']' => {
                self.state = ParserState::OscString;
                self.osc_string.clear();
                return None;
            }
            b'P' | b'X' | b'^' | b'_' => {
                self.state = ParserState::IgnoreString;
                return None;
            }
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::EscapeIntermediate;
                return None;
            }
            // DECSC / DECRC
            b'7' => state.save_cursor(),
            b'8' => state.restore_cursor(),
            // IND
            b'D' => state.index(),
            // NEL
            b'E' => {
                state.carriage_return();
                state.index();
            }
            // RI
            b'M' => state.reverse_index(),
            // RIS
            b'c' => state.reset(),
            _ => {
                tracing::debug!("Unknown ESC: final={:?}", byte as char);
            }
        }
        self.to_ground();
        None
    }

    fn escape_intermediate(&mut self, byte: u8) -> Option<TermEvent> {
        match byte {
            0x20..=0x2F => self.intermediates.push(byte),
            // Charset designations and friends; accepted and ignored
            _ => self.to_ground(),
        }
        None
    }

    fn csi_entry(&mut self, byte: u8, state: &mut ScreenState) -> Option<TermEvent> {
        match byte {
            b'0'..=b'9' => {
                self.current_param = Some((byte - b'0') as u16);
                self.state = ParserState::CsiParam;
            }
            b';' => {
                self.params.push(0);
                self.state = ParserState::CsiParam;
            }
            b'?' | b'>' | b'!' | b'=' => {
                self.intermediates.push(byte);
            }
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => return self.execute_csi(byte, state),
            _ => self.state = ParserState::CsiIgnore,
        }
        None
    }

    fn csi_param(&mut self, byte: u8, state: &mut ScreenState) -> Option<TermEvent> {
        match byte {
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u16;
                self.current_param = Some(
                    self.current_param
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
            }
            // Sub-parameters are flattened into the parameter list
            b';' | b':' => {
                self.params.push(self.current_param.take().unwrap_or(0));
            }
            0x20..=0x2F => {
                if let Some(p) = self.current_param.take() {
                    self.params.push(p);
                }
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => {
                if let Some(p) = self.current_param.take() {
                    self.params.push(p);
                }
                return self.execute_csi(byte, state);
            }
            _ => self.state = ParserState::CsiIgnore,
        }
        None
    }

    fn csi_intermediate(&mut self, byte: u8, state: &mut ScreenState) -> Option<TermEvent> {
        match byte {
            0x20..=0x2F => self.intermediates.push(byte),
            0x40..=0x7E => return self.execute_csi(byte, state),
            _ => self.state = ParserState::CsiIgnore,
        }
        None
    }

    fn csi_ignore(&mut self, byte: u8) -> Option<TermEvent> {
        if (0x40..=0x7E).contains(&byte) {
            self.to_ground();
        }
        None
    }

    fn osc_string_state(&mut self, byte: u8, state: &mut ScreenState) -> Option<TermEvent> {
        match byte {
            // BEL terminates OSC
            0x07 => {
                self.to_ground();
                self.execute_osc(state)
            }
            0x1B => {
                self.state = ParserState::EscapeInOsc;
                None
            }
            0x00..=0x1F => None,
            _ => {
                self.osc_string.push(byte);
                None
            }
        }
    }

    /// ESC received within OSC: either ST or the start of a new sequence
    fn escape_in_osc(&mut self, byte: u8, state: &mut ScreenState) -> Option<TermEvent> {
        let event = self.execute_osc(state);
        if byte == b'\\' {
            self.to_ground();
        } else {
            self.enter_escape();
            // A title change wins over whatever the new sequence would report
            let next = self.escape(byte, state);
            return event.or(next);
        }
        event
    }

    fn ignore_string(&mut self, byte: u8) -> Option<TermEvent> {
        match byte {
            0x07 => self.to_ground(),
            0x1B => self.state = ParserState::EscapeInIgnore,
            _ => {}
        }
        None
    }

    fn escape_in_ignore(&mut self, byte: u8, state: &mut ScreenState) -> Option<TermEvent> {
        if byte == b'\\' {
            self.to_ground();
            None
        } else {
            self.enter_escape();
            self.escape(byte, state)
        }
    }

    fn execute_csi(&mut self, final_byte: u8, state: &mut ScreenState) -> Option<TermEvent> {
        let is_private = self.intermediates.contains(&b'?');
        let is_gt = self.intermediates.contains(&b'>');
        let has_other = self
            .intermediates
            .iter()
            .any(|b| !matches!(b, b'?' | b'>'));
        let params = &self.params;
        let first = |default: u16| params.first().copied().filter(|p| *p != 0).unwrap_or(default);

        let event = match (is_private, is_gt, has_other, final_byte) {
            // Cursor movement
            (false, false, false, b'A') => {
                state.cursor_up(first(1));
                None
            }
            (false, false, false, b'B') | (false, false, false, b'e') => {
                state.cursor_down(first(1));
                None
            }
            (false, false, false, b'C') | (false, false, false, b'a') => {
                state.cursor_forward(first(1));
                None
            }
            (false, false, false, b'D') => {
                state.cursor_backward(first(1));
                None
            }
            (false, false, false, b'E') => {
                // CNL
                state.cursor_down(first(1));
                state.carriage_return();
                None
            }
            (false, false, false, b'F') => {
                // CPL
                state.cursor_up(first(1));
                state.carriage_return();
                None
            }
            (false, false, false, b'G') | (false, false, false, b'`') => {
                state.cursor_column(first(1));
                None
            }
            (false, false, false, b'H') | (false, false, false, b'f') => {
                let row = params.first().copied().unwrap_or(1);
                let col = params.get(1).copied().unwrap_or(1);
                state.cursor_position(row, col);
                None
            }
            (false, false, false, b'd') => {
                state.cursor_row(first(1));
                None
            }

            // Erase
            (false, false, false, b'J') | (true, false, false, b'J') => {
                state.erase_in_display(params.first().copied().unwrap_or(0));
                None
            }
            (false, false, false, b'K') | (true, false, false, b'K') => {
                state.erase_in_line(params.first().copied().unwrap_or(0));
                None
            }

            // Line operations
            (false, false, false, b'L') => {
                state.insert_lines(first(1));
                None
            }
            (false, false, false, b'M') => {
                state.delete_lines(first(1));
                None
            }

            // Character operations
            (false, false, false, b'@') => {
                state.insert_chars(first(1));
                None
            }
            (false, false, false, b'P') => {
                state.delete_chars(first(1));
                None
            }
            (false, false, false, b'X') => {
                state.erase_chars(first(1));
                None
            }

            // Scroll
            (false, false, false, b'S') => {
                state.scroll_up(first(1));
                None
            }
            (false, false, false, b'T') => {
                state.scroll_down(first(1));
                None
            }

            // DECSTBM
            (false, false, false, b'r') => {
                let top = params.first().copied().unwrap_or(1);
                let bottom = params.get(1).copied().filter(|b| *b != 0).unwrap_or(state.rows);
                state.set_scroll_region(top, bottom);
                state.cursor_position(1, 1);
                None
            }

            (false, false, false, b'm') => {
                Self::execute_sgr(params, state);
                None
            }

            (false, false, false, b's') => {
                state.save_cursor();
                None
            }
            (false, false, false, b'u') => {
                state.restore_cursor();
                None
            }

            // Device Status Report
            (false, false, false, b'n') => match params.first() {
                Some(5) => Some(TermEvent::Reply(b"\x1b[0n".to_vec())),
                Some(6) => {
                    let cursor = state.active_cursor();
                    let col = cursor.col.min(state.cols - 1);
                    Some(TermEvent::Reply(
                        format!("\x1b[{};{}R", cursor.row + 1, col + 1).into_bytes(),
                    ))
                }
                _ => None,
            },

            // Device Attributes: report a VT220
            (false, false, false, b'c') => Some(TermEvent::Reply(b"\x1b[?62;c".to_vec())),
            (false, true, false, b'c') => Some(TermEvent::Reply(b"\x1b[>1;10;0c".to_vec())),

            // Window manipulation: only the resize request is surfaced
            (false, false, false, b't') => match params.as_slice() {
                [8, rows, cols, ..] if *rows > 0 && *cols > 0 => Some(TermEvent::ResizeRequest {
                    rows: *rows,
                    cols: *cols,
                }),
                _ => None,
            },

            // DEC private modes
            (true, false, false, b'h') => {
                for &p in params {
                    state.set_private_mode(p, true);
                }
                None
            }
            (true, false, false, b'l') => {
                for &p in params {
                    state.set_private_mode(p, false);
                }
                None
            }

            // ANSI modes
            (false, false, false, b'h') | (false, false, false, b'l') => {
                let enable = final_byte == b'h';
                for &p in params {
                    match p {
                        4 => state.modes.insert_mode = enable,
                        20 => state.modes.linefeed_newline = enable,
                        _ => {}
                    }
                }
                None
            }

            _ => {
                tracing::debug!(
                    "Unknown CSI: intermediates={:?}, params={:?}, final={:?}",
                    self.intermediates,
                    params,
                    final_byte as char
                );
                None
            }
        };

        self.to_ground();
        event
    }

    fn execute_sgr(params: &[u16], state: &mut ScreenState) {
        if params.is_empty() {
            state.current_attrs.reset();
            return;
        }

        let attrs = &mut state.current_attrs;
        let mut iter = params.iter().copied();

        while let Some(param) = iter.next() {
            match param {
                0 => attrs.reset(),
                1 => attrs.flags |= AttrFlags::BOLD,
                2 => attrs.flags |= AttrFlags::DIM,
                3 => attrs.flags |= AttrFlags::ITALIC,
                4 => attrs.flags |= AttrFlags::UNDERLINE,
                5 => attrs.flags |= AttrFlags::BLINK,
                7 => attrs.flags |= AttrFlags::INVERSE,
                8 => attrs.flags |= AttrFlags::HIDDEN,
                9 => attrs.flags |= AttrFlags::STRIKETHROUGH,

                22 => attrs.flags &= !(AttrFlags::BOLD | AttrFlags::DIM),
                23 => attrs.flags &= !AttrFlags::ITALIC,
                24 => attrs.flags &= !AttrFlags::UNDERLINE,
                25 => attrs.flags &= !AttrFlags::BLINK,
                27 => attrs.flags &= !AttrFlags::INVERSE,
                28 => attrs.flags &= !AttrFlags::HIDDEN,
                29 => attrs.flags &= !AttrFlags::STRIKETHROUGH,

                30..=37 => attrs.fg = Color::Indexed((param - 30) as u8),
                38 => {
                    if let Some(color) = extended_color(&mut iter) {
                        attrs.fg = color;
                    }
                }
                39 => attrs.fg = Color::Default,

                40..=47 => attrs.bg = Color::Indexed((param - 40) as u8),
                48 => {
                    if let Some(color) = extended_color(&mut iter) {
                        attrs.bg = color;
                    }
                }
                49 => attrs.bg = Color::Default,

                90..=97 => attrs.fg = Color::Indexed((param - 90 + 8) as u8),
                100..=107 => attrs.bg = Color::Indexed((param - 100 + 8) as u8),

                _ => {}
            }
        }
    }

    fn execute_osc(&mut self, state: &mut ScreenState) -> Option<TermEvent> {
        let payload = String::from_utf8_lossy(&self.osc_string).into_owned();
        self.osc_string.clear();

        let (code, text) = payload.split_once(';')?;
        match code {
            "0" | "1" | "2" => {
                state.title = text.to_string();
                Some(TermEvent::TitleChanged(text.to_string()))
            }
            _ => None,
        }
    }
}

/// `38;5;n` / `38;2;r;g;b` (and the 48 equivalents)
fn extended_color(iter: &mut impl Iterator<Item = u16>) -> Option<Color> {
    match iter.next()? {
        5 => iter.next().map(|n| Color::Indexed(n as u8)),
        2 => {
            let r = iter.next().unwrap_or(0) as u8;
            let g = iter.next().unwrap_or(0) as u8;
            let b = iter.next().unwrap_or(0) as u8;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

/// Show an abandoned sequence as text. Controls inside it already ran.
fn print_literal(bytes: &[u8], state: &mut ScreenState) {
    let text: Vec<u8> = bytes
        .iter()
        .copied()
        .filter(|&b| b >= 0x20 && b != 0x7F)
        .collect();
    for ch in String::from_utf8_lossy(&text).chars() {
        state.put_char(ch);
    }
}

/// Incremental UTF-8 decoder; invalid input decodes to U+FFFD
#[derive(Default)]
struct Utf8Decoder {
    buf: [u8; 4],
    len: usize,
    need: usize,
}

impl Utf8Decoder {
    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn clear(&mut self) {
        self.len = 0;
        self.need = 0;
    }

    /// Push a byte >= 0x80; yields zero, one or two characters
    fn push(&mut self, byte: u8) -> Vec<char> {
        let mut out = Vec::new();

        if self.len > 0 {
            if byte & 0xC0 == 0x80 {
                self.buf[self.len] = byte;
                self.len += 1;
                if self.len == self.need {
                    let decoded = std::str::from_utf8(&self.buf[..self.len])
                        .ok()
                        .and_then(|s| s.chars().next())
                        .unwrap_or(char::REPLACEMENT_CHARACTER);
                    out.push(decoded);
                    self.clear();
                }
                return out;
            }
            // Lead byte interrupted the pending sequence
            out.push(char::REPLACEMENT_CHARACTER);
            self.clear();
        }

        let need = match byte {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => {
                out.push(char::REPLACEMENT_CHARACTER);
                return out;
            }
        };
        self.buf[0] = byte;
        self.len = 1;
        self.need = need;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut VtParser, state: &mut ScreenState, bytes: &[u8]) -> Vec<TermEvent> {
        bytes.iter().filter_map(|b| parser.feed(*b, state)).collect()
    }

    #[test]
    fn test_cursor_movement() {
        let mut state = ScreenState::new(80, 24, 0);
        let mut parser = VtParser::new();

        feed_all(&mut parser, &mut state, b"\x1b[5;10H");

        assert_eq!(state.active_cursor().row, 4);
        assert_eq!(state.active_cursor().col, 9);
    }

    #[test]
    fn test_sgr_colors() {
        let mut state = ScreenState::new(80, 24, 0);
        let mut parser = VtParser::new();

        feed_all(&mut parser, &mut state, b"\x1b[1;31;48;2;1;2;3m");

        assert_eq!(state.current_attrs.fg, Color::Indexed(1));
        assert_eq!(state.current_attrs.bg, Color::Rgb(1, 2, 3));
        assert!(state.current_attrs.flags.contains(AttrFlags::BOLD));
    }

    #[test]
    fn test_title_over_split_feeds() {
        let mut state = ScreenState::new(80, 24, 0);
        let mut parser = VtParser::new();

        let mut events = feed_all(&mut parser, &mut state, b"\x1b]2;hel");
        assert!(events.is_empty());
        events.extend(feed_all(&mut parser, &mut state, b"lo\x1b\\"));

        assert_eq!(events, vec![TermEvent::TitleChanged("hello".into())]);
        assert_eq!(state.title, "hello");
    }

    #[test]
    fn test_bell_and_reports() {
        let mut state = ScreenState::new(80, 24, 0);
        let mut parser = VtParser::new();

        let events = feed_all(&mut parser, &mut state, b"ab\x07\x1b[6n");
        assert_eq!(
            events,
            vec![TermEvent::Bell, TermEvent::Reply(b"\x1b[1;3R".to_vec())]
        );
    }

    #[test]
    fn test_resize_request() {
        let mut state = ScreenState::new(80, 24, 0);
        let mut parser = VtParser::new();

        let events = feed_all(&mut parser, &mut state, b"\x1b[8;30;100t");
        assert_eq!(events, vec![TermEvent::ResizeRequest { rows: 30, cols: 100 }]);
    }

    #[test]
    fn test_utf8_split_across_feeds() {
        let mut state = ScreenState::new(80, 24, 0);
        let mut parser = VtParser::new();
        let bytes = "héllo".as_bytes();

        feed_all(&mut parser, &mut state, &bytes[..2]);
        feed_all(&mut parser, &mut state, &bytes[2..]);

        assert_eq!(state.line_text(0), "héllo");
        assert_eq!(state.active_cursor().col, 5);
    }

    #[test]
    fn test_dcs_is_discarded() {
        let mut state = ScreenState::new(80, 24, 0);
        let mut parser = VtParser::new();

        feed_all(&mut parser, &mut state, b"a\x1bPq#0;2;0;0;0\x1b\\b");
        assert_eq!(state.line_text(0), "ab");
    }

    #[test]
    fn test_overflow_resets_to_ground() {
        let mut state = ScreenState::new(80, 24, 0);
        let mut parser = VtParser::with_limit(64);

        let mut bytes = b"\x1b]0;".to_vec();
        bytes.extend(std::iter::repeat(b'x').take(100));
        let events = feed_all(&mut parser, &mut state, &bytes);

        assert_eq!(
            events,
            vec![TermEvent::CorruptSequence(CorruptSequenceError { limit: 64 })]
        );
        assert!(parser.is_ground());

        // The abandoned sequence and everything after it land as text
        let expected: String = "]0;".chars().chain(std::iter::repeat('x').take(77)).collect();
        assert_eq!(state.line_text(0), expected);
        assert_eq!(state.line_text(1), "x".repeat(23));
    }

    #[test]
    fn test_overflow_keeps_bytes_split_across_feeds() {
        let mut state = ScreenState::new(80, 24, 0);
        let mut parser = VtParser::with_limit(16);

        feed_all(&mut parser, &mut state, b"\x1b[1;2;3;4;");
        let events = feed_all(&mut parser, &mut state, b"5;6;7;8;9;10ok");
        assert_eq!(events.len(), 1);
        assert_eq!(state.line_text(0), "[1;2;3;4;5;6;7;8;9;10ok");
    }

    #[test]
    fn test_unknown_sequences_are_ignored() {
        let mut state = ScreenState::new(80, 24, 0);
        let mut parser = VtParser::new();

        let events = feed_all(&mut parser, &mut state, b"\x1b[?1234z\x1b%Gok\x1b[1;2$p");
        assert!(events.is_empty());
        assert_eq!(state.line_text(0), "ok");
    }
}
