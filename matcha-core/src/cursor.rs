//! Cursor state management.

use serde::{Deserialize, Serialize};

use crate::cell::Pen;

/// Cursor shape requested by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CursorStyle {
    #[default]
    Block,
    Underline,
    Bar,
}

/// Cursor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Row position, 0-indexed from the top of the visible grid.
    pub row: usize,
    /// Column position, 0-indexed.
    pub col: usize,
    pub style: CursorStyle,
    pub visible: bool,
    /// The pen applied to newly written cells.
    pub pen: Pen,
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor {
            row: 0,
            col: 0,
            style: CursorStyle::Block,
            visible: true,
            pen: Pen::default(),
        }
    }
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Saved cursor state for DECSC/DECRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCursor {
    pub row: usize,
    pub col: usize,
    pub pen: Pen,
    pub origin_mode: bool,
    pub autowrap: bool,
}

impl SavedCursor {
    pub fn capture(cursor: &Cursor, origin_mode: bool, autowrap: bool) -> Self {
        SavedCursor {
            row: cursor.row,
            col: cursor.col,
            pen: cursor.pen,
            origin_mode,
            autowrap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellFlags;

    #[test]
    fn test_cursor_default() {
        let cursor = Cursor::default();
        assert_eq!(cursor.row, 0);
        assert_eq!(cursor.col, 0);
        assert!(cursor.visible);
        assert_eq!(cursor.style, CursorStyle::Block);
    }

    #[test]
    fn test_saved_cursor_capture() {
        let mut cursor = Cursor::new();
        cursor.row = 5;
        cursor.col = 10;
        cursor.pen.flags.insert(CellFlags::BOLD);

        let saved = SavedCursor::capture(&cursor, true, false);
        assert_eq!(saved.row, 5);
        assert_eq!(saved.col, 10);
        assert!(saved.pen.flags.contains(CellFlags::BOLD));
        assert!(saved.origin_mode);
        assert!(!saved.autowrap);
    }
}
