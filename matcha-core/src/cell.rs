//! Terminal cell representation.
//!
//! A cell is one character position in the grid: a glyph plus the
//! rendering attributes it was written with.

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Attribute flags for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellFlags {
    bits: u16,
}

impl CellFlags {
    pub const BOLD: u16 = 1 << 0;
    pub const FAINT: u16 = 1 << 1;
    pub const ITALIC: u16 = 1 << 2;
    pub const UNDERLINE: u16 = 1 << 3;
    pub const BLINK: u16 = 1 << 4;
    pub const INVERSE: u16 = 1 << 5;
    pub const HIDDEN: u16 = 1 << 6;
    pub const STRIKETHROUGH: u16 = 1 << 7;
    pub const WIDE: u16 = 1 << 8;
    pub const WIDE_SPACER: u16 = 1 << 9;

    pub const fn empty() -> Self {
        CellFlags { bits: 0 }
    }

    pub fn contains(&self, flag: u16) -> bool {
        self.bits & flag != 0
    }

    pub fn set(&mut self, flag: u16, value: bool) {
        if value {
            self.bits |= flag;
        } else {
            self.bits &= !flag;
        }
    }

    pub fn insert(&mut self, flag: u16) {
        self.bits |= flag;
    }

    pub fn remove(&mut self, flag: u16) {
        self.bits &= !flag;
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

/// The pen: attributes applied to newly written cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pen {
    pub fg: Color,
    pub bg: Color,
    pub flags: CellFlags,
}

impl Pen {
    pub fn reset(&mut self) {
        *self = Pen::default();
    }
}

/// A single cell in the terminal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
    pub flags: CellFlags,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            ch: ' ',
            fg: Color::Default,
            bg: Color::Default,
            flags: CellFlags::empty(),
        }
    }
}

impl Cell {
    pub fn new(ch: char, pen: Pen) -> Self {
        Cell {
            ch,
            fg: pen.fg,
            bg: pen.bg,
            flags: pen.flags,
        }
    }

    /// A blank cell carrying only a background color, used for erases.
    pub fn blank(bg: Color) -> Self {
        Cell {
            bg,
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Cell::default();
    }

    pub fn is_blank(&self) -> bool {
        self.ch == ' '
            && self.fg == Color::Default
            && self.bg == Color::Default
            && self.flags.is_empty()
    }

    /// Display width of the cell: 0 for a wide-char spacer, 2 for a wide
    /// glyph, 1 otherwise.
    pub fn width(&self) -> usize {
        if self.flags.contains(CellFlags::WIDE_SPACER) {
            0
        } else if self.flags.contains(CellFlags::WIDE) {
            2
        } else {
            use unicode_width::UnicodeWidthChar;
            self.ch.width().unwrap_or(1).max(1)
        }
    }

    pub fn is_wide(&self) -> bool {
        self.flags.contains(CellFlags::WIDE)
    }

    pub fn is_wide_spacer(&self) -> bool {
        self.flags.contains(CellFlags::WIDE_SPACER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_default_is_blank() {
        let cell = Cell::default();
        assert_eq!(cell.ch, ' ');
        assert!(cell.is_blank());
    }

    #[test]
    fn test_cell_new_takes_pen() {
        let mut pen = Pen::default();
        pen.flags.insert(CellFlags::BOLD);
        let cell = Cell::new('A', pen);
        assert_eq!(cell.ch, 'A');
        assert!(cell.flags.contains(CellFlags::BOLD));
        assert!(!cell.is_blank());
    }

    #[test]
    fn test_flags_set_and_remove() {
        let mut flags = CellFlags::empty();
        flags.insert(CellFlags::BOLD);
        flags.insert(CellFlags::UNDERLINE);
        assert!(flags.contains(CellFlags::BOLD));

        flags.remove(CellFlags::BOLD);
        assert!(!flags.contains(CellFlags::BOLD));
        assert!(flags.contains(CellFlags::UNDERLINE));
    }

    #[test]
    fn test_wide_cell_width() {
        let mut cell = Cell::new('中', Pen::default());
        cell.flags.insert(CellFlags::WIDE);
        assert_eq!(cell.width(), 2);

        let mut spacer = Cell::default();
        spacer.flags.insert(CellFlags::WIDE_SPACER);
        assert_eq!(spacer.width(), 0);
    }
}
