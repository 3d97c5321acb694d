//! Byte-level VT state machine. Wraps `vte`'s tokenizer in a thin
//! `Perform` shim and dispatches onto [`super::screen::Screen`]'s
//! primitive operations.

use std::collections::BTreeSet;
use std::mem;

use vte::{Params, Perform};

use super::cell::{Attrs, Cell, CellStyle, Color};
use super::screen::{ProcessResult, Screen};

impl Screen {
    /// Feed a chunk of bytes through the parser, applying every completed
    /// escape sequence and printable character to this screen. Never
    /// fails: malformed input is absorbed silently.
    pub fn process(&mut self, bytes: &[u8]) -> ProcessResult {
        let mut parser = mem::take(&mut self.parser);
        let mut performer = Performer {
            screen: self,
            changed: BTreeSet::new(),
            cursor_moved: false,
            full_redraw: false,
        };
        for &b in bytes {
            parser.advance(&mut performer, b);
        }
        let result = ProcessResult {
            changed_rows: performer.changed.into_iter().collect(),
            cursor_moved: performer.cursor_moved,
            full_redraw: performer.full_redraw,
        };
        self.parser = parser;
        result
    }
}

struct Performer<'a> {
    screen: &'a mut Screen,
    changed: BTreeSet<usize>,
    cursor_moved: bool,
    full_redraw: bool,
}

fn flatten_params(params: &Params) -> Vec<i64> {
    params
        .iter()
        .flat_map(|group| group.iter().map(|&v| v as i64))
        .collect()
}

/// `n`-style count parameter: absent or zero both mean 1.
fn count(nums: &[i64], idx: usize) -> usize {
    match nums.get(idx).copied().unwrap_or(0) {
        v if v <= 0 => 1,
        v => v as usize,
    }
}

/// 1-based position parameter converted to a 0-based index; absent or zero
/// means the first row/column.
fn pos0(nums: &[i64], idx: usize) -> usize {
    match nums.get(idx).copied().unwrap_or(0) {
        v if v <= 0 => 0,
        v => (v - 1) as usize,
    }
}

/// Mode parameter (J/K) where 0 is itself a meaningful, distinct value.
fn mode(nums: &[i64], idx: usize) -> i64 {
    nums.get(idx).copied().unwrap_or(0)
}

fn parse_osc7_path(value: &str) -> Option<String> {
    try_parse_osc7_path(value).ok()
}

/// Inner fallible form of [`parse_osc7_path`]. An OSC 7 payload that isn't
/// a `file://host/path` URI, or carries no path component, is absorbed by
/// the caller rather than treated as a parser error.
fn try_parse_osc7_path(value: &str) -> anyhow::Result<String> {
    let rest = value
        .strip_prefix("file://")
        .ok_or_else(|| anyhow::anyhow!("OSC 7 payload is not a file:// URI: {value:?}"))?;
    let slash = rest
        .find('/')
        .ok_or_else(|| anyhow::anyhow!("OSC 7 URI has no path component: {value:?}"))?;
    Ok(rest[slash..].to_string())
}

impl<'a> Performer<'a> {
    fn full_reset(&mut self) {
        let (rows, cols) = (self.screen.rows, self.screen.cols);
        *self.screen = Screen::new(rows, cols);
        self.full_redraw = true;
        self.cursor_moved = true;
        self.changed.extend(0..rows);
    }

    fn apply_sgr(&mut self, nums: &[i64]) {
        if nums.is_empty() {
            self.screen.current_style = CellStyle::default();
            return;
        }
        let mut i = 0;
        while i < nums.len() {
            let n = nums[i];
            match n {
                0 => self.screen.current_style = CellStyle::default(),
                1 => self.screen.current_style.attrs.insert(Attrs::BOLD),
                2 => self.screen.current_style.attrs.insert(Attrs::DIM),
                3 => self.screen.current_style.attrs.insert(Attrs::ITALIC),
                4 => self.screen.current_style.attrs.insert(Attrs::UNDERLINE),
                5 | 6 => self.screen.current_style.attrs.insert(Attrs::BLINK),
                7 => self.screen.current_style.attrs.insert(Attrs::REVERSE),
                8 => self.screen.current_style.attrs.insert(Attrs::HIDDEN),
                9 => self
                    .screen
                    .current_style
                    .attrs
                    .insert(Attrs::STRIKETHROUGH),
                21 | 22 => self
                    .screen
                    .current_style
                    .attrs
                    .remove(Attrs::BOLD | Attrs::DIM),
                23 => self.screen.current_style.attrs.remove(Attrs::ITALIC),
                24 => self.screen.current_style.attrs.remove(Attrs::UNDERLINE),
                25 => self.screen.current_style.attrs.remove(Attrs::BLINK),
                27 => self.screen.current_style.attrs.remove(Attrs::REVERSE),
                28 => self.screen.current_style.attrs.remove(Attrs::HIDDEN),
                29 => self
                    .screen
                    .current_style
                    .attrs
                    .remove(Attrs::STRIKETHROUGH),
                30..=37 => self.screen.current_style.fg = Color::Basic((n - 30) as u8),
                38 => {
                    if let Some(consumed) = self.apply_extended_color(&nums[i..], true) {
                        i += consumed;
                        continue;
                    }
                }
                39 => self.screen.current_style.fg = Color::Default,
                40..=47 => self.screen.current_style.bg = Color::Basic((n - 40) as u8),
                48 => {
                    if let Some(consumed) = self.apply_extended_color(&nums[i..], false) {
                        i += consumed;
                        continue;
                    }
                }
                49 => self.screen.current_style.bg = Color::Default,
                90..=97 => self.screen.current_style.fg = Color::Basic((n - 90 + 8) as u8),
                100..=107 => self.screen.current_style.bg = Color::Basic((n - 100 + 8) as u8),
                _ => {}
            }
            i += 1;
        }
    }

    /// Parses `38;5;N`, `38;2;R;G;B` (and the `48;...` background forms)
    /// starting at `nums[0]`. Returns how many entries were consumed, or
    /// `None` if the form is malformed (in which case the caller just
    /// advances past the `38`/`48` and ignores it).
    fn apply_extended_color(&mut self, nums: &[i64], is_fg: bool) -> Option<usize> {
        match nums.get(1) {
            Some(5) => {
                let idx = *nums.get(2)? as u8;
                let color = Color::Indexed(idx);
                if is_fg {
                    self.screen.current_style.fg = color;
                } else {
                    self.screen.current_style.bg = color;
                }
                Some(3)
            }
            Some(2) => {
                let r = *nums.get(2)? as u8;
                let g = *nums.get(3)? as u8;
                let b = *nums.get(4)? as u8;
                let color = Color::Rgb(r, g, b);
                if is_fg {
                    self.screen.current_style.fg = color;
                } else {
                    self.screen.current_style.bg = color;
                }
                Some(5)
            }
            _ => None,
        }
    }

    fn erase_display(&mut self, mode: i64) {
        let (row, col) = (self.screen.cursor_row, self.screen.cursor_col);
        let rows = self.screen.rows;
        let cols = self.screen.cols;
        match mode {
            0 => {
                self.screen.erase_row_range(row, col, cols - 1);
                if row + 1 < rows {
                    self.screen.erase_rows(row + 1, rows - 1);
                }
                self.changed.extend(row..rows);
            }
            1 => {
                if row > 0 {
                    self.screen.erase_rows(0, row - 1);
                }
                self.screen.erase_row_range(row, 0, col);
                self.changed.extend(0..=row);
            }
            2 | 3 => {
                self.screen.erase_rows(0, rows - 1);
                self.changed.extend(0..rows);
            }
            _ => {}
        }
    }

    fn erase_line(&mut self, mode: i64) {
        let (row, col) = (self.screen.cursor_row, self.screen.cursor_col);
        let cols = self.screen.cols;
        match mode {
            0 => self.screen.erase_row_range(row, col, cols - 1),
            1 => self.screen.erase_row_range(row, 0, col),
            2 => self.screen.erase_row_range(row, 0, cols - 1),
            _ => return,
        }
        self.changed.insert(row);
    }
}

impl<'a> Perform for Performer<'a> {
    fn print(&mut self, c: char) {
        if self.screen.pending_wrap {
            self.screen.cursor_col = 0;
            self.screen.index(&mut self.changed);
            self.screen.pending_wrap = false;
        }
        let (row, col) = (self.screen.cursor_row, self.screen.cursor_col);
        let style = self.screen.current_style;
        self.screen.active_grid_mut()[row][col] = Cell { ch: c, style };
        self.changed.insert(row);
        if col + 1 >= self.screen.cols {
            self.screen.pending_wrap = true;
        } else {
            self.screen.cursor_col += 1;
        }
        self.cursor_moved = true;
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x0D => {
                self.screen.cursor_col = 0;
                self.screen.pending_wrap = false;
                self.cursor_moved = true;
            }
            0x0A | 0x0B | 0x0C => {
                self.screen.index(&mut self.changed);
                self.screen.cursor_col = 0;
                self.screen.pending_wrap = false;
                self.cursor_moved = true;
            }
            0x08 => {
                self.screen.cursor_col = self.screen.cursor_col.saturating_sub(1);
                self.screen.pending_wrap = false;
                self.cursor_moved = true;
            }
            0x09 => {
                let next = self.screen.next_tab_stop(self.screen.cursor_col);
                self.screen.cursor_col = next;
                self.cursor_moved = true;
            }
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, byte: u8) {
        match byte {
            b'7' => {
                self.screen.saved_cursor = Some((self.screen.cursor_row, self.screen.cursor_col));
            }
            b'8' => {
                if let Some((r, c)) = self.screen.saved_cursor {
                    self.screen.set_cursor(r, c);
                    self.cursor_moved = true;
                }
            }
            b'M' => {
                self.screen.reverse_index(&mut self.changed);
                self.cursor_moved = true;
            }
            b'D' => {
                self.screen.index(&mut self.changed);
                self.cursor_moved = true;
            }
            b'c' => self.full_reset(),
            _ => {}
        }
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        let Some(&cmd) = params.first() else {
            return;
        };
        match cmd {
            b"0" | b"1" | b"2" => {
                if let Some(title) = params.get(1).and_then(|b| std::str::from_utf8(b).ok()) {
                    self.screen.title = Some(title.to_string());
                }
            }
            b"7" => {
                if let Some(uri) = params.get(1).and_then(|b| std::str::from_utf8(b).ok()) {
                    self.screen.working_directory = parse_osc7_path(uri);
                }
            }
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        let nums = flatten_params(params);
        let private = intermediates.first() == Some(&b'?');

        match action {
            'A' => {
                let n = count(&nums, 0);
                self.screen.cursor_row = self.screen.cursor_row.saturating_sub(n);
                self.screen.pending_wrap = false;
                self.cursor_moved = true;
            }
            'B' => {
                let n = count(&nums, 0);
                self.screen.cursor_row = (self.screen.cursor_row + n).min(self.screen.rows - 1);
                self.screen.pending_wrap = false;
                self.cursor_moved = true;
            }
            'C' => {
                let n = count(&nums, 0);
                self.screen.cursor_col = (self.screen.cursor_col + n).min(self.screen.cols - 1);
                self.screen.pending_wrap = false;
                self.cursor_moved = true;
            }
            'D' => {
                let n = count(&nums, 0);
                self.screen.cursor_col = self.screen.cursor_col.saturating_sub(n);
                self.screen.pending_wrap = false;
                self.cursor_moved = true;
            }
            'E' => {
                let n = count(&nums, 0);
                let row = (self.screen.cursor_row + n).min(self.screen.rows - 1);
                self.screen.set_cursor(row, 0);
                self.cursor_moved = true;
            }
            'F' => {
                let n = count(&nums, 0);
                let row = self.screen.cursor_row.saturating_sub(n);
                self.screen.set_cursor(row, 0);
                self.cursor_moved = true;
            }
            'G' => {
                let col = self.screen.clamp_col(pos0(&nums, 0) as i64);
                self.screen.set_cursor(self.screen.cursor_row, col);
                self.cursor_moved = true;
            }
            'H' | 'f' => {
                let row = self.screen.clamp_row(pos0(&nums, 0) as i64);
                let col = self.screen.clamp_col(pos0(&nums, 1) as i64);
                self.screen.set_cursor(row, col);
                self.cursor_moved = true;
            }
            'd' => {
                let row = self.screen.clamp_row(pos0(&nums, 0) as i64);
                self.screen.set_cursor(row, self.screen.cursor_col);
                self.cursor_moved = true;
            }
            'J' => self.erase_display(mode(&nums, 0)),
            'K' => self.erase_line(mode(&nums, 0)),
            'L' => {
                let n = count(&nums, 0);
                self.screen.insert_lines(n, &mut self.changed);
            }
            'M' => {
                let n = count(&nums, 0);
                self.screen.delete_lines(n, &mut self.changed);
            }
            'P' => self.screen.delete_chars(count(&nums, 0)),
            '@' => self.screen.insert_chars(count(&nums, 0)),
            'X' => {
                self.screen.erase_chars(count(&nums, 0));
                self.changed.insert(self.screen.cursor_row);
            }
            'S' => {
                let n = count(&nums, 0);
                self.screen.scroll_region_up(n, &mut self.changed);
            }
            'T' => {
                let n = count(&nums, 0);
                self.screen.scroll_region_down(n, &mut self.changed);
            }
            'r' => {
                let top = pos0(&nums, 0);
                let bottom = match nums.get(1).copied().unwrap_or(0) {
                    v if v <= 0 => self.screen.rows - 1,
                    v => (v - 1) as usize,
                };
                self.screen.set_scroll_region(top, bottom);
                self.screen.set_cursor(0, 0);
                self.cursor_moved = true;
            }
            's' => {
                self.screen.saved_cursor = Some((self.screen.cursor_row, self.screen.cursor_col));
            }
            'u' => {
                if let Some((r, c)) = self.screen.saved_cursor {
                    self.screen.set_cursor(r, c);
                    self.cursor_moved = true;
                }
            }
            'm' => self.apply_sgr(&nums),
            'h' if private => {
                if nums.first() == Some(&1049) {
                    self.screen.enter_alt_screen();
                    self.full_redraw = true;
                    self.cursor_moved = true;
                }
            }
            'l' if private => {
                if nums.first() == Some(&1049) {
                    self.screen.exit_alt_screen();
                    self.full_redraw = true;
                    self.cursor_moved = true;
                }
            }
            'c' | 'n' => {}
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_output_applies_to_grid() {
        let mut screen = Screen::new(24, 80);
        let r = screen.process(b"hello world\n");
        assert_eq!(screen.cursor(), (1, 0));
        assert!(r.cursor_moved);
        let row: String = screen.grid()[0].iter().take(11).map(|c| c.ch).collect();
        assert_eq!(row, "hello world");
    }

    #[test]
    fn sgr_basic_color_and_reset() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"\x1b[31mA\x1b[0mB");
        assert_eq!(screen.grid()[0][0].ch, 'A');
        assert_eq!(screen.grid()[0][0].style.fg, Color::Basic(1));
        assert_eq!(screen.grid()[0][1].ch, 'B');
        assert_eq!(screen.grid()[0][1].style, CellStyle::default());
        assert_eq!(screen.cursor(), (0, 2));
    }

    #[test]
    fn alt_screen_round_trip() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"primary");
        assert_eq!(screen.grid()[0][0].ch, 'p');

        let enter = screen.process(b"\x1b[?1049h\x1b[2JX");
        assert!(enter.full_redraw);
        assert!(screen.is_alt_screen());
        assert_eq!(screen.grid()[0][0].ch, 'X');

        let exit = screen.process(b"\x1b[?1049l");
        assert!(exit.full_redraw);
        assert!(!screen.is_alt_screen());
        assert_eq!(screen.grid()[0][0].ch, 'p');
    }

    #[test]
    fn pending_wrap_latch_not_column_equals_columns() {
        let mut screen = Screen::new(1, 3);
        screen.process(b"abc");
        assert!(screen.pending_wrap);
        assert_eq!(screen.cursor(), (0, 2));
        screen.process(b"d");
        assert_eq!(screen.grid()[0][0].ch, 'd');
        assert_eq!(screen.cursor(), (0, 1));
    }

    #[test]
    fn chunked_escape_sequence_resumes_across_calls() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"\x1b[3");
        screen.process(b"1mA");
        assert_eq!(screen.grid()[0][0].ch, 'A');
        assert_eq!(screen.grid()[0][0].style.fg, Color::Basic(1));
    }

    #[test]
    fn scroll_region_crossing_drops_top_line() {
        let mut screen = Screen::new(3, 10);
        screen.process(b"line1\r\nline2\r\nline3\r\n");
        assert_eq!(screen.grid()[0][0].ch, 'l');
        let row0: String = screen.grid()[1].iter().take(5).map(|c| c.ch).collect();
        assert_eq!(row0, "line2");
    }

    #[test]
    fn scroll_region_set_and_index() {
        let mut screen = Screen::new(5, 10);
        screen.process(b"\x1b[2;4r");
        assert_eq!(screen.cursor(), (0, 0));
        assert_eq!(screen.scroll_top, 1);
        assert_eq!(screen.scroll_bottom, 3);
    }

    #[test]
    fn erase_display_mode_2_clears_all() {
        let mut screen = Screen::new(2, 4);
        screen.process(b"abcd");
        let r = screen.process(b"\x1b[2J");
        assert_eq!(screen.grid()[0][0].ch, ' ');
        assert!(r.changed_rows.contains(&0));
        assert!(r.changed_rows.contains(&1));
    }

    #[test]
    fn insert_and_delete_chars() {
        let mut screen = Screen::new(1, 5);
        screen.process(b"abcde");
        screen.process(b"\x1b[H\x1b[2P"); // delete 2 chars at col 0
        let row: String = screen.grid()[0].iter().map(|c| c.ch).collect();
        assert_eq!(row, "cde  ");
    }

    #[test]
    fn osc7_updates_working_directory() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"\x1b]7;file://host/home/user\x07");
        assert_eq!(screen.working_directory(), Some("/home/user"));
    }

    #[test]
    fn full_reset_sets_full_redraw() {
        let mut screen = Screen::new(3, 3);
        screen.process(b"abc");
        let r = screen.process(b"\x1bc");
        assert!(r.full_redraw);
        assert_eq!(screen.grid()[0][0].ch, ' ');
    }
}
