//! Per-pane screen state: cell grid, cursor, scroll region, buffers.
//! Byte-level parsing lives in [`super::parser`]; this module owns the
//! grid and the primitive operations the parser dispatches to.

use std::collections::BTreeSet;

use super::cell::{Cell, CellStyle};

pub type Grid = Vec<Vec<Cell>>;

fn new_grid(rows: usize, cols: usize) -> Grid {
    vec![vec![Cell::default(); cols]; rows]
}

const DEFAULT_TAB_WIDTH: usize = 8;

/// The result of feeding a chunk of bytes to a [`Screen`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessResult {
    pub changed_rows: Vec<usize>,
    pub cursor_moved: bool,
    pub full_redraw: bool,
}

/// One pane's terminal emulator state.
pub struct Screen {
    pub(super) rows: usize,
    pub(super) cols: usize,
    pub(super) primary: Grid,
    pub(super) alternate: Option<Grid>,
    pub(super) cursor_row: usize,
    pub(super) cursor_col: usize,
    pub(super) pending_wrap: bool,
    pub(super) saved_cursor: Option<(usize, usize)>,
    pub(super) scroll_top: usize,
    pub(super) scroll_bottom: usize,
    pub(super) tab_stops: BTreeSet<usize>,
    pub(super) current_style: CellStyle,
    pub(super) working_directory: Option<String>,
    pub(super) title: Option<String>,
    pub(super) parser: vte::Parser,
}

impl Screen {
    pub fn new(rows: usize, cols: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Screen {
            rows,
            cols,
            primary: new_grid(rows, cols),
            alternate: None,
            cursor_row: 0,
            cursor_col: 0,
            pending_wrap: false,
            saved_cursor: None,
            scroll_top: 0,
            scroll_bottom: rows - 1,
            tab_stops: default_tab_stops(cols),
            current_style: CellStyle::default(),
            working_directory: None,
            title: None,
            parser: vte::Parser::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn is_alt_screen(&self) -> bool {
        self.alternate.is_some()
    }

    /// The grid currently being rendered to (alternate if active).
    pub fn grid(&self) -> &Grid {
        self.alternate.as_ref().unwrap_or(&self.primary)
    }

    pub(super) fn active_grid_mut(&mut self) -> &mut Grid {
        self.alternate.as_mut().unwrap_or(&mut self.primary)
    }

    /// Reallocate the primary grid preserving overlapping top-left content;
    /// clamp the cursor; reset the scroll region to full screen. The
    /// alternate grid, if present, is reallocated blank.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let mut grid = new_grid(rows, cols);
        for (r, row) in self.primary.iter().enumerate().take(rows) {
            for (c, cell) in row.iter().enumerate().take(cols) {
                grid[r][c] = cell.clone();
            }
        }
        self.primary = grid;
        if self.alternate.is_some() {
            self.alternate = Some(new_grid(rows, cols));
        }
        self.rows = rows;
        self.cols = cols;
        self.cursor_row = self.cursor_row.min(rows - 1);
        self.cursor_col = self.cursor_col.min(cols - 1);
        self.pending_wrap = false;
        self.scroll_top = 0;
        self.scroll_bottom = rows - 1;
        self.tab_stops = default_tab_stops(cols);
    }

    pub(super) fn clamp_row(&self, row: i64) -> usize {
        row.clamp(0, self.rows as i64 - 1) as usize
    }

    pub(super) fn clamp_col(&self, col: i64) -> usize {
        col.clamp(0, self.cols as i64 - 1) as usize
    }

    pub(super) fn set_cursor(&mut self, row: usize, col: usize) {
        self.cursor_row = row.min(self.rows - 1);
        self.cursor_col = col.min(self.cols - 1);
        self.pending_wrap = false;
    }

    pub(super) fn next_tab_stop(&self, from: usize) -> usize {
        self.tab_stops
            .iter()
            .copied()
            .find(|&c| c > from)
            .unwrap_or(self.cols - 1)
    }

    /// Advance by one row, scrolling the scroll region up by one line if
    /// the cursor was already at the region's bottom.
    pub(super) fn index(&mut self, changed: &mut BTreeSet<usize>) {
        if self.cursor_row == self.scroll_bottom {
            self.scroll_region_up(1, changed);
        } else {
            self.cursor_row = (self.cursor_row + 1).min(self.rows - 1);
            changed.insert(self.cursor_row);
        }
    }

    pub(super) fn reverse_index(&mut self, changed: &mut BTreeSet<usize>) {
        if self.cursor_row == self.scroll_top {
            self.scroll_region_down(1, changed);
        } else if self.cursor_row > 0 {
            self.cursor_row -= 1;
            changed.insert(self.cursor_row);
        }
    }

    pub(super) fn scroll_region_up(&mut self, n: usize, changed: &mut BTreeSet<usize>) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        self.shift_rows_up(top, bottom, n, changed);
    }

    pub(super) fn scroll_region_down(&mut self, n: usize, changed: &mut BTreeSet<usize>) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        self.shift_rows_down(top, bottom, n, changed);
    }

    /// Shift rows `[top, bottom]` up by `n`, dropping the top rows and
    /// filling the exposed bottom with blanks. Used both for scroll-region
    /// index and for `L`/`M` (insert/delete lines), which operate on
    /// `[cursor_row, scroll_bottom]` instead of the full region.
    pub(super) fn shift_rows_up(
        &mut self,
        top: usize,
        bottom: usize,
        n: usize,
        changed: &mut BTreeSet<usize>,
    ) {
        if top > bottom || bottom >= self.rows {
            return;
        }
        let style = self.current_style;
        let cols = self.cols;
        let n = n.min(bottom - top + 1);
        let grid = self.active_grid_mut();
        for _ in 0..n {
            grid.remove(top);
            grid.insert(bottom, vec![Cell::blank_with(style); cols]);
        }
        for r in top..=bottom {
            changed.insert(r);
        }
    }

    pub(super) fn shift_rows_down(
        &mut self,
        top: usize,
        bottom: usize,
        n: usize,
        changed: &mut BTreeSet<usize>,
    ) {
        if top > bottom || bottom >= self.rows {
            return;
        }
        let style = self.current_style;
        let cols = self.cols;
        let n = n.min(bottom - top + 1);
        let grid = self.active_grid_mut();
        for _ in 0..n {
            grid.remove(bottom);
            grid.insert(top, vec![Cell::blank_with(style); cols]);
        }
        for r in top..=bottom {
            changed.insert(r);
        }
    }

    /// `L` — insert n blank lines at the cursor, within the scroll region.
    /// A no-op if the cursor is outside the active scroll region.
    pub(super) fn insert_lines(&mut self, n: usize, changed: &mut BTreeSet<usize>) {
        if self.cursor_row < self.scroll_top || self.cursor_row > self.scroll_bottom {
            return;
        }
        let (row, bottom) = (self.cursor_row, self.scroll_bottom);
        self.shift_rows_down(row, bottom, n, changed);
    }

    /// `M` — delete n lines at the cursor, within the scroll region.
    pub(super) fn delete_lines(&mut self, n: usize, changed: &mut BTreeSet<usize>) {
        if self.cursor_row < self.scroll_top || self.cursor_row > self.scroll_bottom {
            return;
        }
        let (row, bottom) = (self.cursor_row, self.scroll_bottom);
        self.shift_rows_up(row, bottom, n, changed);
    }

    /// `P` — delete n characters at the cursor, shifting the remainder of
    /// the row left and filling the tail with default cells.
    pub(super) fn delete_chars(&mut self, n: usize) {
        let (row, col) = (self.cursor_row, self.cursor_col);
        let style = self.current_style;
        let cols = self.cols;
        let grid = self.active_grid_mut();
        let line = &mut grid[row];
        let n = n.min(cols - col);
        line.drain(col..col + n);
        for _ in 0..n {
            line.push(Cell::blank_with(style));
        }
    }

    /// `@` — insert n blank characters at the cursor, shifting the
    /// remainder of the row right and truncating at the last column.
    pub(super) fn insert_chars(&mut self, n: usize) {
        let (row, col) = (self.cursor_row, self.cursor_col);
        let style = self.current_style;
        let cols = self.cols;
        let grid = self.active_grid_mut();
        let line = &mut grid[row];
        let n = n.min(cols - col);
        for _ in 0..n {
            line.insert(col, Cell::blank_with(style));
        }
        line.truncate(cols);
    }

    /// `X` — erase n characters in place starting at the cursor.
    pub(super) fn erase_chars(&mut self, n: usize) {
        let row = self.cursor_row;
        let from = self.cursor_col;
        let to = (from + n).saturating_sub(1).min(self.cols - 1);
        if n > 0 {
            self.erase_row_range(row, from, to);
        }
    }

    pub(super) fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let top = top.min(self.rows - 1);
        let bottom = bottom.clamp(top, self.rows - 1);
        self.scroll_top = top;
        self.scroll_bottom = bottom;
    }

    /// Enter the alternate screen, snapshotting nothing but the cursor
    /// position (preserved across the swap per the 1049 convention).
    pub(super) fn enter_alt_screen(&mut self) {
        if self.alternate.is_none() {
            self.alternate = Some(new_grid(self.rows, self.cols));
        }
    }

    pub(super) fn exit_alt_screen(&mut self) {
        self.alternate = None;
    }

    pub(super) fn erase_row_range(&mut self, row: usize, from: usize, to_inclusive: usize) {
        let style = self.current_style;
        let cols = self.cols;
        let grid = self.active_grid_mut();
        let to = to_inclusive.min(cols.saturating_sub(1));
        if row >= grid.len() || from > to {
            return;
        }
        for c in from..=to {
            grid[row][c] = Cell::blank_with(style);
        }
    }

    pub(super) fn erase_rows(&mut self, from: usize, to_inclusive: usize) {
        for r in from..=to_inclusive.min(self.rows.saturating_sub(1)) {
            self.erase_row_range(r, 0, self.cols - 1);
        }
    }
}

fn default_tab_stops(cols: usize) -> BTreeSet<usize> {
    (0..cols).step_by(DEFAULT_TAB_WIDTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_screen_has_correct_dimensions() {
        let s = Screen::new(24, 80);
        assert_eq!(s.rows(), 24);
        assert_eq!(s.cols(), 80);
        assert_eq!(s.grid().len(), 24);
        assert_eq!(s.grid()[0].len(), 80);
        assert_eq!(s.scroll_bottom, 23);
    }

    #[test]
    fn resize_preserves_top_left_content() {
        let mut s = Screen::new(4, 4);
        s.primary[0][0].ch = 'x';
        s.resize(2, 2);
        assert_eq!(s.grid()[0][0].ch, 'x');
        assert_eq!(s.rows(), 2);
        assert_eq!(s.cols(), 2);
        assert_eq!(s.scroll_bottom, 1);
    }

    #[test]
    fn resize_clamps_cursor() {
        let mut s = Screen::new(10, 10);
        s.cursor_row = 9;
        s.cursor_col = 9;
        s.resize(3, 3);
        assert_eq!(s.cursor(), (2, 2));
    }

    #[test]
    fn default_tab_stops_every_8_columns() {
        let s = Screen::new(24, 80);
        assert_eq!(s.next_tab_stop(0), 8);
        assert_eq!(s.next_tab_stop(8), 16);
    }
}
