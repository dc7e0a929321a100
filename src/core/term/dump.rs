//! Screen serialization for client catch-up
//!
//! Produces a byte stream that, replayed into a fresh terminal of the same
//! geometry, recreates the scroll-back, the visible grid, the cursor position
//! and the active style.

use std::fmt::Write;

use super::state::{AttrFlags, CellAttrs, Color, Row, ScreenState};

/// Serialize `state` as replayable VT output
pub fn dump_screen(state: &ScreenState) -> Vec<u8> {
    let mut out = String::from("\x1b[0m");

    // History: paint each line on the top row, then scroll it off
    if !state.using_alternate {
        for row in &state.primary_screen.scrollback {
            out.push_str("\x1b[H\x1b[2K");
            write_row(&mut out, row, state.cols as usize);
            out.push_str("\x1b[0m\x1b[S");
        }
    }

    out.push_str("\x1b[H\x1b[2J");
    let screen = state.active_screen();
    for (r, row) in screen.rows.iter().enumerate() {
        let used = used_width(row);
        if used == 0 {
            continue;
        }
        let _ = write!(out, "\x1b[{};1H", r + 1);
        write_row(&mut out, row, used);
        out.push_str("\x1b[0m");
    }

    let cursor = state.active_cursor();
    if cursor.col >= state.cols {
        // Pending wrap: redraw the final glyph so the cursor lands past it
        let row = &screen.rows[cursor.row as usize];
        let mut start = row.cells.len().saturating_sub(1);
        if start > 0 && row.cells[start].is_continuation() {
            start -= 1;
        }
        let cell = &row.cells[start];
        let _ = write!(out, "\x1b[{};{}H", cursor.row + 1, start + 1);
        out.push_str(&sgr(&cell.attrs));
        out.push_str(cell.display_char());
    } else {
        let _ = write!(out, "\x1b[{};{}H", cursor.row + 1, cursor.col + 1);
    }

    out.push_str(&sgr(&state.current_attrs));
    out.into_bytes()
}

/// Number of leading cells worth emitting: everything up to the last
/// non-blank cell
fn used_width(row: &Row) -> usize {
    row.cells
        .iter()
        .rposition(|cell| !cell.is_blank())
        .map(|i| i + 1)
        .unwrap_or(0)
}

fn write_row(out: &mut String, row: &Row, limit: usize) {
    let mut current = CellAttrs::default();
    for cell in row.cells.iter().take(limit.min(used_width(row))) {
        if cell.is_continuation() {
            continue;
        }
        if cell.attrs != current {
            out.push_str(&sgr(&cell.attrs));
            current = cell.attrs;
        }
        out.push_str(cell.display_char());
    }
}

/// Full SGR for `attrs`, starting from a reset
pub fn sgr(attrs: &CellAttrs) -> String {
    let mut codes = vec!["0".to_string()];
    let table = [
        (AttrFlags::BOLD, "1"),
        (AttrFlags::DIM, "2"),
        (AttrFlags::ITALIC, "3"),
        (AttrFlags::UNDERLINE, "4"),
        (AttrFlags::BLINK, "5"),
        (AttrFlags::INVERSE, "7"),
        (AttrFlags::HIDDEN, "8"),
        (AttrFlags::STRIKETHROUGH, "9"),
    ];
    for (flag, code) in table {
        if attrs.flags.contains(flag) {
            codes.push(code.to_string());
        }
    }
    push_color(&mut codes, attrs.fg, 30, 38);
    push_color(&mut codes, attrs.bg, 40, 48);
    format!("\x1b[{}m", codes.join(";"))
}

fn push_color(codes: &mut Vec<String>, color: Color, base: u16, extended: u16) {
    match color {
        Color::Default => {}
        Color::Indexed(n) if n < 8 => codes.push((base + n as u16).to_string()),
        Color::Indexed(n) if n < 16 => codes.push((base + 60 + (n - 8) as u16).to_string()),
        Color::Indexed(n) => codes.push(format!("{};5;{}", extended, n)),
        Color::Rgb(r, g, b) => codes.push(format!("{};2;{};{};{}", extended, r, g, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sgr_encoding() {
        let attrs = CellAttrs {
            fg: Color::Indexed(9),
            bg: Color::Rgb(1, 2, 3),
            flags: AttrFlags::BOLD | AttrFlags::UNDERLINE,
        };
        assert_eq!(sgr(&attrs), "\x1b[0;1;4;91;48;2;1;2;3m");
        assert_eq!(sgr(&CellAttrs::default()), "\x1b[0m");
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let mut state = ScreenState::new(10, 3, 0);
        state.put_char('x');
        let dump = String::from_utf8(dump_screen(&state)).unwrap_or_default();
        assert!(dump.contains("\x1b[1;1Hx"));
        assert!(!dump.contains("\x1b[2;1H"));
        assert!(dump.ends_with("\x1b[1;2H\x1b[0m"));
    }
}
