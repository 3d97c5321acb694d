//! Per-pane VT terminal emulation.

pub mod cell;
pub mod parser;
pub mod screen;

pub use cell::{Attrs, Cell, CellStyle, Color};
pub use screen::{Grid, ProcessResult, Screen};
