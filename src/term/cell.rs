//! Cell and style types for the terminal emulator.

use bitflags::bitflags;

bitflags! {
    /// Boolean style attributes. Represented as a tagged bitfield rather
    /// than individual `bool`s so SGR reset ranges (`21..29`) can clear a
    /// whole group in one mask operation.
    #[derive(Default)]
    pub struct Attrs: u16 {
        const BOLD          = 0b0000_0001;
        const DIM           = 0b0000_0010;
        const ITALIC        = 0b0000_0100;
        const UNDERLINE     = 0b0000_1000;
        const BLINK         = 0b0001_0000;
        const REVERSE       = 0b0010_0000;
        const HIDDEN        = 0b0100_0000;
        const STRIKETHROUGH = 0b1000_0000;
    }
}

/// A foreground/background color, represented as a tagged sum rather than a
/// class hierarchy so equality is structural and coalescing is cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// The terminal's default fg/bg (SGR 39/49).
    Default,
    /// One of the 16 basic ANSI colors, 0-7 normal and 8-15 bright.
    Basic(u8),
    /// 256-color palette index (SGR `38;5;N` / `48;5;N`).
    Indexed(u8),
    /// 24-bit truecolor (SGR `38;2;R;G;B` / `48;2;R;G;B`).
    Rgb(u8, u8, u8),
}

impl Default for Color {
    fn default() -> Self {
        Color::Default
    }
}

/// The style in effect when a cell was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellStyle {
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attrs,
}

/// One grapheme plus the style it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: CellStyle,
}

impl Cell {
    pub const BLANK_CHAR: char = ' ';

    /// A default cell carrying the given style (used to fill exposed rows
    /// after scrolling/erasing so the fill inherits the *erasing* style,
    /// matching common VT behavior for background color erase).
    pub fn blank_with(style: CellStyle) -> Self {
        Cell {
            ch: Self::BLANK_CHAR,
            style,
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            ch: Self::BLANK_CHAR,
            style: CellStyle::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrs_default_is_empty() {
        assert_eq!(Attrs::default(), Attrs::empty());
    }

    #[test]
    fn default_cell_is_blank_default_style() {
        let c = Cell::default();
        assert_eq!(c.ch, ' ');
        assert_eq!(c.style, CellStyle::default());
    }
}
