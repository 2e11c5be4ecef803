//! Line representation for the terminal grid.
//!
//! A line is a row of cells plus a wrap flag telling whether it
//! continues onto the next row.

use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::color::Color;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    cells: Vec<Cell>,
    pub wrapped: bool,
}

impl Line {
    pub fn new(cols: usize) -> Self {
        Line {
            cells: vec![Cell::default(); cols],
            wrapped: false,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, col: usize) -> Option<&Cell> {
        self.cells.get(col)
    }

    pub fn get_mut(&mut self, col: usize) -> Option<&mut Cell> {
        self.cells.get_mut(col)
    }

    pub fn set(&mut self, col: usize, cell: Cell) {
        if col < self.cells.len() {
            self.cells[col] = cell;
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.reset();
        }
        self.wrapped = false;
    }

    pub fn clear_with_bg(&mut self, bg: Color) {
        for cell in &mut self.cells {
            *cell = Cell::blank(bg);
        }
        self.wrapped = false;
    }

    /// Clear cells in `start..end` (end exclusive, clamped).
    pub fn clear_range_with_bg(&mut self, start: usize, end: usize, bg: Color) {
        let end = end.min(self.cells.len());
        for col in start..end {
            self.cells[col] = Cell::blank(bg);
        }
    }

    pub fn resize(&mut self, new_cols: usize) {
        self.cells.resize(new_cols, Cell::default());
    }

    /// Shift cells right from `col`, dropping cells off the end.
    pub fn insert_cells(&mut self, col: usize, count: usize) {
        if col >= self.cells.len() {
            return;
        }
        let count = count.min(self.cells.len() - col);
        self.cells.truncate(self.cells.len() - count);
        for _ in 0..count {
            self.cells.insert(col, Cell::default());
        }
    }

    /// Shift cells left into `col`, filling the end with blanks.
    pub fn delete_cells(&mut self, col: usize, count: usize) {
        if col >= self.cells.len() {
            return;
        }
        let cols = self.cells.len();
        let count = count.min(cols - col);
        self.cells.drain(col..col + count);
        self.cells.resize(cols, Cell::default());
    }

    /// Visible text of the line, wide-char spacers skipped, trailing
    /// blanks trimmed.
    pub fn text(&self) -> String {
        let mut s = String::new();
        for cell in &self.cells {
            if !cell.is_wide_spacer() {
                s.push(cell.ch);
            }
        }
        s.trim_end().to_string()
    }
}
