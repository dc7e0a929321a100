//! Screen model
//!
//! Holds the cell grid, cursor, scroll-back ring and dirty tracking. Knows
//! nothing about I/O; the parser drives it.

use bitflags::bitflags;
use std::collections::{BTreeSet, VecDeque};
use unicode_width::UnicodeWidthChar;

/// Default scroll-back capacity in lines
pub const DEFAULT_SCROLLBACK_LIMIT: usize = 10_000;

/// Terminal screen state
pub struct ScreenState {
    pub cols: u16,
    pub rows: u16,
    pub primary_screen: ScreenBuffer,
    pub alternate_screen: ScreenBuffer,
    pub using_alternate: bool,
    pub primary_cursor: CursorState,
    pub alternate_cursor: CursorState,
    pub current_attrs: CellAttrs,
    pub modes: TerminalModes,
    pub title: String,
    /// Scroll region (top, bottom) - 0-indexed, inclusive
    pub scroll_region: (u16, u16),
}

impl ScreenState {
    pub fn new(cols: u16, rows: u16, scrollback_limit: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            primary_screen: ScreenBuffer::new(cols, rows, scrollback_limit),
            alternate_screen: ScreenBuffer::new(cols, rows, 0),
            using_alternate: false,
            primary_cursor: CursorState::default(),
            alternate_cursor: CursorState::default(),
            current_attrs: CellAttrs::default(),
            modes: TerminalModes::default(),
            title: String::new(),
            scroll_region: (0, rows - 1),
        }
    }

    /// Full reset (RIS). Scroll-back survives; everything visible is cleared.
    pub fn reset(&mut self) {
        let limit = self.primary_screen.scrollback_limit;
        let scrollback = std::mem::take(&mut self.primary_screen.scrollback);
        *self = Self::new(self.cols, self.rows, limit);
        self.primary_screen.scrollback = scrollback;
    }

    pub fn active_screen(&self) -> &ScreenBuffer {
        if self.using_alternate {
            &self.alternate_screen
        } else {
            &self.primary_screen
        }
    }

    pub fn active_screen_mut(&mut self) -> &mut ScreenBuffer {
        if self.using_alternate {
            &mut self.alternate_screen
        } else {
            &mut self.primary_screen
        }
    }

    pub fn active_cursor(&self) -> &CursorState {
        if self.using_alternate {
            &self.alternate_cursor
        } else {
            &self.primary_cursor
        }
    }

    pub fn active_cursor_mut(&mut self) -> &mut CursorState {
        if self.using_alternate {
            &mut self.alternate_cursor
        } else {
            &mut self.primary_cursor
        }
    }

    /// Resize the visible grid.
    ///
    /// When the grid loses rows beneath the cursor, the top rows move into
    /// scroll-back so the cursor line stays visible. Existing scroll-back is
    /// never reshaped.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let cols = cols.max(1);
        let rows = rows.max(1);

        if self.primary_cursor.row >= rows {
            let shift = self.primary_cursor.row - rows + 1;
            for _ in 0..shift {
                if self.primary_screen.rows.is_empty() {
                    break;
                }
                let row = self.primary_screen.rows.remove(0);
                self.primary_screen.push_to_scrollback(row);
            }
            self.primary_cursor.row -= shift;
        }

        self.cols = cols;
        self.rows = rows;
        self.primary_screen.resize(cols, rows);
        self.alternate_screen.resize(cols, rows);
        self.scroll_region = (0, rows - 1);

        let max_col = cols - 1;
        let max_row = rows - 1;

        for cursor in [&mut self.primary_cursor, &mut self.alternate_cursor] {
            cursor.col = cursor.col.min(max_col);
            cursor.row = cursor.row.min(max_row);
            if let Some(saved) = cursor.saved.as_mut() {
                saved.col = saved.col.min(max_col);
                saved.row = saved.row.min(max_row);
            }
        }
    }

    /// Put a character at the current cursor position
    pub fn put_char(&mut self, ch: char) {
        let width = ch.width().unwrap_or(0) as u16;

        if width == 0 {
            // Combining character - append to previous cell
            self.append_to_previous_cell(ch);
            return;
        }

        let (cursor_row, cursor_col) = {
            let cursor = self.active_cursor();
            (cursor.row, cursor.col)
        };

        // Wrap lazily: the cursor may rest at `cols` until the next glyph arrives.
        // A wide glyph that would straddle the edge wraps early.
        let overflows = cursor_col >= self.cols || (width == 2 && cursor_col + 1 >= self.cols && self.cols > 1);
        if overflows {
            if self.modes.auto_wrap {
                self.active_screen_mut().rows[cursor_row as usize].wrapped = true;
                self.active_cursor_mut().col = 0;
                self.linefeed();
            } else {
                self.active_cursor_mut().col = self.cols.saturating_sub(width);
            }
        }

        let (row, col) = {
            let cursor = self.active_cursor();
            (cursor.row as usize, cursor.col as usize)
        };
        let cols = self.cols as usize;
        if col >= cols {
            return;
        }

        if self.modes.insert_mode {
            self.insert_chars(width);
        }

        self.handle_wide_char_overwrite(row, col);

        let attrs = self.current_attrs;
        let screen = self.active_screen_mut();

        screen.rows[row].cells[col] = Cell {
            grapheme: ch.to_string(),
            width: width as u8,
            attrs,
        };

        if width == 2 && col + 1 < cols {
            screen.rows[row].cells[col + 1] = Cell::continuation(&attrs);
        }

        screen.mark_dirty(row);

        let cursor = self.active_cursor_mut();
        cursor.col = (col as u16 + width).min(cols as u16);
    }

    fn append_to_previous_cell(&mut self, ch: char) {
        let (row, col) = {
            let cursor = self.active_cursor();
            (cursor.row as usize, cursor.col as usize)
        };

        if col > 0 {
            let screen = self.active_screen_mut();
            let mut target = col - 1;
            if screen.rows[row].cells[target].is_continuation() && target > 0 {
                target -= 1;
            }
            screen.rows[row].cells[target].grapheme.push(ch);
            screen.mark_dirty(row);
        }
    }

    fn handle_wide_char_overwrite(&mut self, row: usize, col: usize) {
        let attrs = self.current_attrs;
        let cols = self.cols as usize;
        let screen = self.active_screen_mut();

        // Overwriting the right half of a wide char
        if col > 0 && screen.rows[row].cells[col].is_continuation() {
            screen.rows[row].cells[col - 1] = Cell::blank(&attrs);
        }

        // Overwriting the left half of a wide char
        if screen.rows[row].cells[col].width == 2 && col + 1 < cols {
            screen.rows[row].cells[col + 1] = Cell::blank(&attrs);
        }
    }

    /// Carriage return - move cursor to column 0
    pub fn carriage_return(&mut self) {
        self.active_cursor_mut().col = 0;
    }

    /// Line feed - move cursor down, scroll if needed
    pub fn linefeed(&mut self) {
        let cursor_row = self.active_cursor().row;
        let scroll_bottom = self.scroll_region.1;

        if cursor_row == scroll_bottom {
            self.scroll_up(1);
        } else if cursor_row < self.rows - 1 {
            self.active_cursor_mut().row += 1;
        }

        if self.modes.linefeed_newline {
            self.carriage_return();
        }
    }

    /// Backspace - move cursor left
    pub fn backspace(&mut self) {
        let cols = self.cols;
        let cursor = self.active_cursor_mut();
        // Leaving the pending-wrap position lands on the last column
        if cursor.col >= cols {
            cursor.col = cols - 1;
        }
        if cursor.col > 0 {
            cursor.col -= 1;
        }
    }

    /// Horizontal tab
    pub fn horizontal_tab(&mut self) {
        let cols = self.cols;
        let cursor = self.active_cursor_mut();
        // Tab stops every 8 columns
        cursor.col = ((cursor.col / 8) + 1) * 8;
        if cursor.col >= cols {
            cursor.col = cols - 1;
        }
    }

    /// Scroll the scroll region up by n lines
    pub fn scroll_up(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let cols = self.cols;
        let is_primary = !self.using_alternate;
        let n = n.min(bottom - top + 1);

        let screen = self.active_screen_mut();

        for _ in 0..n {
            let removed_row = screen.rows.remove(top as usize);
            // Only whole-screen scrolls on the primary screen feed history
            if is_primary && top == 0 {
                screen.push_to_scrollback(removed_row);
            }
            screen.rows.insert(bottom as usize, Row::new(cols));
        }
        screen.mark_all_dirty();
    }

    /// Scroll the scroll region down by n lines
    pub fn scroll_down(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let cols = self.cols;
        let n = n.min(bottom - top + 1);

        let screen = self.active_screen_mut();

        for _ in 0..n {
            screen.rows.remove(bottom as usize);
            screen.rows.insert(top as usize, Row::new(cols));
        }
        screen.mark_all_dirty();
    }

    pub fn cursor_up(&mut self, n: u16) {
        let cursor = self.active_cursor_mut();
        cursor.row = cursor.row.saturating_sub(n);
    }

    pub fn cursor_down(&mut self, n: u16) {
        let rows = self.rows;
        let cursor = self.active_cursor_mut();
        cursor.row = cursor.row.saturating_add(n).min(rows - 1);
    }

    pub fn cursor_forward(&mut self, n: u16) {
        let cols = self.cols;
        let cursor = self.active_cursor_mut();
        cursor.col = cursor.col.saturating_add(n).min(cols - 1);
    }

    pub fn cursor_backward(&mut self, n: u16) {
        let cols = self.cols;
        let cursor = self.active_cursor_mut();
        cursor.col = cursor.col.min(cols - 1).saturating_sub(n);
    }

    /// Set cursor position (1-indexed parameters)
    pub fn cursor_position(&mut self, row: u16, col: u16) {
        let rows = self.rows;
        let cols = self.cols;
        let cursor = self.active_cursor_mut();
        cursor.row = row.saturating_sub(1).min(rows - 1);
        cursor.col = col.saturating_sub(1).min(cols - 1);
    }

    /// Set cursor column (1-indexed)
    pub fn cursor_column(&mut self, col: u16) {
        let cols = self.cols;
        self.active_cursor_mut().col = col.saturating_sub(1).min(cols - 1);
    }

    /// Set cursor row (1-indexed)
    pub fn cursor_row(&mut self, row: u16) {
        let rows = self.rows;
        self.active_cursor_mut().row = row.saturating_sub(1).min(rows - 1);
    }

    /// Erase in display
    pub fn erase_in_display(&mut self, mode: u16) {
        let cursor_row = self.active_cursor().row as usize;
        let attrs = self.current_attrs;
        match mode {
            0 => {
                self.erase_in_line(0);
                let screen = self.active_screen_mut();
                for r in (cursor_row + 1)..screen.rows.len() {
                    screen.rows[r].clear(&attrs);
                    screen.mark_dirty(r);
                }
            }
            1 => {
                {
                    let screen = self.active_screen_mut();
                    for r in 0..cursor_row {
                        screen.rows[r].clear(&attrs);
                        screen.mark_dirty(r);
                    }
                }
                self.erase_in_line(1);
            }
            2 => {
                let screen = self.active_screen_mut();
                for row in &mut screen.rows {
                    row.clear(&attrs);
                }
                screen.mark_all_dirty();
            }
            3 => {
                // Entire screen plus scroll-back
                self.erase_in_display(2);
                self.active_screen_mut().scrollback.clear();
            }
            _ => {}
        }
    }

    /// Erase in line
    pub fn erase_in_line(&mut self, mode: u16) {
        let (row, cursor_col) = {
            let cursor = self.active_cursor();
            (cursor.row as usize, cursor.col as usize)
        };
        let attrs = self.current_attrs;
        let screen = self.active_screen_mut();
        let cells = &mut screen.rows[row].cells;
        let last = cells.len().saturating_sub(1);

        match mode {
            0 => {
                for cell in cells.iter_mut().skip(cursor_col) {
                    cell.clear(&attrs);
                }
            }
            1 => {
                for cell in cells.iter_mut().take(cursor_col.min(last) + 1) {
                    cell.clear(&attrs);
                }
            }
            2 => screen.rows[row].clear(&attrs),
            _ => {}
        }
        screen.mark_dirty(row);
    }

    /// Erase n characters from the cursor (ECH)
    pub fn erase_chars(&mut self, n: u16) {
        let (row, col) = {
            let cursor = self.active_cursor();
            (cursor.row as usize, cursor.col as usize)
        };
        let attrs = self.current_attrs;
        let screen = self.active_screen_mut();
        for cell in screen.rows[row].cells.iter_mut().skip(col).take(n as usize) {
            cell.clear(&attrs);
        }
        screen.mark_dirty(row);
    }

    /// Insert n blank characters at the cursor (ICH)
    pub fn insert_chars(&mut self, n: u16) {
        let (row, col) = {
            let cursor = self.active_cursor();
            (cursor.row as usize, cursor.col as usize)
        };
        let screen = self.active_screen_mut();
        let cells = &mut screen.rows[row].cells;
        if col >= cells.len() {
            return;
        }
        for _ in 0..n.min(cells.len() as u16) {
            cells.pop();
            cells.insert(col, Cell::default());
        }
        screen.mark_dirty(row);
    }

    /// Delete n characters at the cursor (DCH)
    pub fn delete_chars(&mut self, n: u16) {
        let (row, col) = {
            let cursor = self.active_cursor();
            (cursor.row as usize, cursor.col as usize)
        };
        let screen = self.active_screen_mut();
        let cells = &mut screen.rows[row].cells;
        if col >= cells.len() {
            return;
        }
        for _ in 0..n.min(cells.len() as u16) {
            cells.remove(col);
            cells.push(Cell::default());
        }
        screen.mark_dirty(row);
    }

    /// Insert lines at cursor position (IL), within the scroll region
    pub fn insert_lines(&mut self, n: u16) {
        let cursor_row = self.active_cursor().row;
        let (top, bottom) = self.scroll_region;
        if cursor_row < top || cursor_row > bottom {
            return;
        }
        let cols = self.cols;
        let screen = self.active_screen_mut();

        for _ in 0..n.min(bottom - cursor_row + 1) {
            screen.rows.remove(bottom as usize);
            screen.rows.insert(cursor_row as usize, Row::new(cols));
        }
        screen.mark_all_dirty();
    }

    /// Delete lines at cursor position (DL), within the scroll region
    pub fn delete_lines(&mut self, n: u16) {
        let cursor_row = self.active_cursor().row;
        let (top, bottom) = self.scroll_region;
        if cursor_row < top || cursor_row > bottom {
            return;
        }
        let cols = self.cols;
        let screen = self.active_screen_mut();

        for _ in 0..n.min(bottom - cursor_row + 1) {
            screen.rows.remove(cursor_row as usize);
            screen.rows.insert(bottom as usize, Row::new(cols));
        }
        screen.mark_all_dirty();
    }

    /// Set scroll region (1-indexed, inclusive)
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let rows = self.rows;
        let top = top.saturating_sub(1).min(rows - 1);
        let bottom = bottom.saturating_sub(1).min(rows - 1);
        if top < bottom {
            self.scroll_region = (top, bottom);
        }
    }

    pub fn save_cursor(&mut self) {
        let (col, row) = {
            let cursor = self.active_cursor();
            (cursor.col, cursor.row)
        };
        let attrs = self.current_attrs;
        self.active_cursor_mut().saved = Some(SavedCursor { col, row, attrs });
    }

    pub fn restore_cursor(&mut self) {
        let saved = self.active_cursor().saved.clone();
        if let Some(saved) = saved {
            let cursor = self.active_cursor_mut();
            cursor.col = saved.col;
            cursor.row = saved.row;
            self.current_attrs = saved.attrs;
        }
    }

    /// Set DEC private mode
    pub fn set_private_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            1 => self.modes.application_cursor = enable,
            7 => self.modes.auto_wrap = enable,
            25 => self.active_cursor_mut().visible = enable,
            47 | 1047 => {
                if enable {
                    self.enter_alternate();
                } else {
                    self.using_alternate = false;
                }
                self.active_screen_mut().mark_all_dirty();
            }
            1048 => {
                if enable {
                    self.save_cursor();
                } else {
                    self.restore_cursor();
                }
            }
            1049 => {
                if enable {
                    self.save_cursor();
                    self.enter_alternate();
                    self.alternate_cursor = CursorState::default();
                } else {
                    self.using_alternate = false;
                    self.restore_cursor();
                }
                self.active_screen_mut().mark_all_dirty();
            }
            2004 => self.modes.bracketed_paste = enable,
            _ => {}
        }
    }

    fn enter_alternate(&mut self) {
        self.using_alternate = true;
        self.alternate_screen = ScreenBuffer::new(self.cols, self.rows, 0);
    }

    /// Reverse index - cursor up, scroll if at top
    pub fn reverse_index(&mut self) {
        if self.active_cursor().row == self.scroll_region.0 {
            self.scroll_down(1);
        } else {
            self.cursor_up(1);
        }
    }

    /// Index - cursor down, scroll if at bottom
    pub fn index(&mut self) {
        let lnm = std::mem::replace(&mut self.modes.linefeed_newline, false);
        self.linefeed();
        self.modes.linefeed_newline = lnm;
    }

    /// Text of a visible row with trailing blanks removed
    pub fn line_text(&self, row: usize) -> String {
        self.active_screen()
            .rows
            .get(row)
            .map(Row::text)
            .unwrap_or_default()
    }

    /// Collect and clear the rows touched since the last call
    pub fn take_dirty(&mut self) -> Dirty {
        let rows = self.rows;
        let screen = self.active_screen_mut();
        let dirty = if screen.full_redraw {
            Dirty::All
        } else if screen.dirty_lines.is_empty() {
            Dirty::Clean
        } else {
            Dirty::Rows(
                screen
                    .dirty_lines
                    .iter()
                    .copied()
                    .filter(|r| *r < rows as usize)
                    .collect(),
            )
        };
        screen.clear_dirty();
        dirty
    }
}

/// Rows changed since the last [`ScreenState::take_dirty`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dirty {
    Clean,
    Rows(Vec<usize>),
    All,
}

/// Screen buffer with scroll-back
pub struct ScreenBuffer {
    /// Visible rows
    pub rows: Vec<Row>,
    /// Scroll-back history, oldest first
    pub scrollback: VecDeque<Row>,
    /// Maximum scroll-back lines
    pub scrollback_limit: usize,
    pub dirty_lines: BTreeSet<usize>,
    pub full_redraw: bool,
}

impl ScreenBuffer {
    pub fn new(cols: u16, rows: u16, scrollback_limit: usize) -> Self {
        Self {
            rows: (0..rows).map(|_| Row::new(cols)).collect(),
            scrollback: VecDeque::new(),
            scrollback_limit,
            dirty_lines: BTreeSet::new(),
            full_redraw: true,
        }
    }

    pub fn resize(&mut self, new_cols: u16, new_rows: u16) {
        while self.rows.len() < new_rows as usize {
            self.rows.push(Row::new(new_cols));
        }
        self.rows.truncate(new_rows as usize);

        for row in &mut self.rows {
            row.resize(new_cols);
        }

        self.mark_all_dirty();
    }

    /// Add a row to scroll-back, evicting the oldest at capacity
    pub fn push_to_scrollback(&mut self, row: Row) {
        if self.scrollback_limit == 0 {
            return;
        }
        while self.scrollback.len() >= self.scrollback_limit {
            self.scrollback.pop_front();
        }
        self.scrollback.push_back(row);
    }

    pub fn mark_dirty(&mut self, line: usize) {
        self.dirty_lines.insert(line);
    }

    pub fn mark_all_dirty(&mut self) {
        self.full_redraw = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty_lines.clear();
        self.full_redraw = false;
    }
}

/// A single row
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub wrapped: bool,
}

impl Row {
    pub fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
            wrapped: false,
        }
    }

    pub fn resize(&mut self, new_cols: u16) {
        self.cells.resize(new_cols as usize, Cell::default());
    }

    pub fn clear(&mut self, attrs: &CellAttrs) {
        for cell in &mut self.cells {
            cell.clear(attrs);
        }
        self.wrapped = false;
    }

    /// Printable content with trailing blanks trimmed
    pub fn text(&self) -> String {
        let mut out = String::new();
        for cell in &self.cells {
            if !cell.is_continuation() {
                out.push_str(cell.display_char());
            }
        }
        out.truncate(out.trim_end_matches(' ').len());
        out
    }
}

/// A single cell
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub grapheme: String,
    pub width: u8,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            grapheme: String::new(),
            width: 1,
            attrs: CellAttrs::default(),
        }
    }
}

impl Cell {
    pub fn clear(&mut self, attrs: &CellAttrs) {
        self.grapheme.clear();
        self.width = 1;
        self.attrs = *attrs;
    }

    pub fn blank(attrs: &CellAttrs) -> Self {
        Self {
            grapheme: " ".to_string(),
            width: 1,
            attrs: *attrs,
        }
    }

    pub fn continuation(attrs: &CellAttrs) -> Self {
        Self {
            grapheme: String::new(),
            width: 0,
            attrs: *attrs,
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// True for a cell that renders as a default-styled space
    pub fn is_blank(&self) -> bool {
        self.attrs == CellAttrs::default() && (self.grapheme.is_empty() || self.grapheme == " ")
    }

    /// Get the display character (space if empty)
    pub fn display_char(&self) -> &str {
        if self.grapheme.is_empty() {
            " "
        } else {
            &self.grapheme
        }
    }
}

/// Cell attributes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellAttrs {
    pub fg: Color,
    pub bg: Color,
    pub flags: AttrFlags,
}

impl CellAttrs {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Color definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrFlags: u16 {
        const BOLD          = 0b0000_0000_0001;
        const DIM           = 0b0000_0000_0010;
        const ITALIC        = 0b0000_0000_0100;
        const UNDERLINE     = 0b0000_0000_1000;
        const BLINK         = 0b0000_0001_0000;
        const INVERSE       = 0b0000_0010_0000;
        const HIDDEN        = 0b0000_0100_0000;
        const STRIKETHROUGH = 0b0000_1000_0000;
    }
}

/// Cursor state
#[derive(Clone, Debug)]
pub struct CursorState {
    pub col: u16,
    pub row: u16,
    pub visible: bool,
    pub saved: Option<SavedCursor>,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            col: 0,
            row: 0,
            visible: true,
            saved: None,
        }
    }
}

/// Saved cursor state
#[derive(Clone, Debug)]
pub struct SavedCursor {
    pub col: u16,
    pub row: u16,
    pub attrs: CellAttrs,
}

/// Terminal modes
#[derive(Clone, Debug)]
pub struct TerminalModes {
    pub application_cursor: bool,
    pub auto_wrap: bool,
    pub insert_mode: bool,
    pub linefeed_newline: bool,
    pub bracketed_paste: bool,
}

impl Default for TerminalModes {
    fn default() -> Self {
        Self {
            application_cursor: false,
            auto_wrap: true,
            insert_mode: false,
            linefeed_newline: false,
            bracketed_paste: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(state: &mut ScreenState, text: &str) {
        for ch in text.chars() {
            state.put_char(ch);
        }
    }

    #[test]
    fn test_wrap_is_lazy() {
        let mut state = ScreenState::new(5, 3, 10);
        write(&mut state, "abcde");
        assert_eq!(state.active_cursor().col, 5);
        assert_eq!(state.active_cursor().row, 0);

        write(&mut state, "f");
        assert_eq!(state.line_text(1), "f");
        assert!(state.primary_screen.rows[0].wrapped);
    }

    #[test]
    fn test_scrollback_evicts_oldest() {
        let mut state = ScreenState::new(10, 2, 3);
        for i in 0..6 {
            write(&mut state, &format!("L{}", i));
            state.carriage_return();
            state.linefeed();
        }
        let history: Vec<String> = state.primary_screen.scrollback.iter().map(Row::text).collect();
        assert_eq!(history, vec!["L2", "L3", "L4"]);
    }

    #[test]
    fn test_resize_keeps_cursor_line_visible() {
        let mut state = ScreenState::new(10, 5, 100);
        for i in 0..4 {
            write(&mut state, &format!("row{}", i));
            state.carriage_return();
            state.linefeed();
        }
        write(&mut state, "last");
        assert_eq!(state.active_cursor().row, 4);

        state.resize(10, 2);
        assert_eq!(state.active_cursor().row, 1);
        assert_eq!(state.line_text(1), "last");
        assert_eq!(state.primary_screen.scrollback.len(), 3);
    }

    #[test]
    fn test_resize_leaves_scrollback_verbatim() {
        let mut state = ScreenState::new(10, 1, 100);
        write(&mut state, "0123456789");
        state.carriage_return();
        state.linefeed();
        state.resize(4, 1);
        assert_eq!(state.primary_screen.scrollback[0].cells.len(), 10);
        assert_eq!(state.primary_screen.scrollback[0].text(), "0123456789");
    }

    #[test]
    fn test_wide_char_never_passes_edge() {
        let mut state = ScreenState::new(3, 2, 0);
        write(&mut state, "ab");
        state.put_char('漢');
        assert_eq!(state.line_text(1), "漢");
        assert!(state.active_cursor().col <= state.cols);
    }

    #[test]
    fn test_dirty_tracking() {
        let mut state = ScreenState::new(10, 3, 0);
        state.take_dirty();
        write(&mut state, "x");
        assert_eq!(state.take_dirty(), Dirty::Rows(vec![0]));
        assert_eq!(state.take_dirty(), Dirty::Clean);
        state.scroll_up(1);
        assert_eq!(state.take_dirty(), Dirty::All);
    }

    #[test]
    fn test_alternate_screen_keeps_primary() {
        let mut state = ScreenState::new(10, 3, 0);
        write(&mut state, "main");
        state.set_private_mode(1049, true);
        write(&mut state, "alt");
        assert_eq!(state.line_text(0), "alt");
        state.set_private_mode(1049, false);
        assert_eq!(state.line_text(0), "main");
        assert_eq!(state.active_cursor().col, 4);
    }
}
