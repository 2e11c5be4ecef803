//! Screen model.
//!
//! A `Screen` is ONE character grid with its own scrollback, cursor,
//! pen, tab stops, scroll region, selection and URL-extraction history.
//! The emulation engine owns two instances (primary and alternate) and
//! switches an active selector between them; this type knows nothing
//! about its sibling.

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellFlags};
use crate::cursor::{Cursor, SavedCursor};
use crate::line::Line;
use crate::links::{Coordinate, UrlExtractor};
use crate::scrollback::Scrollback;
use crate::selection::{Selection, SelectionMode, SelectionPoint};

/// Scrollback retention, configured from outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryPolicy {
    /// No scrollback at all (the alternate screen runs with this).
    None,
    /// Keep at most this many rows.
    Bounded(usize),
    /// Keep every row.
    Unlimited,
}

impl HistoryPolicy {
    fn max_lines(self) -> usize {
        match self {
            HistoryPolicy::None => 0,
            HistoryPolicy::Bounded(n) => n,
            HistoryPolicy::Unlimited => usize::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollRegion {
    pub top: usize,
    pub bottom: usize,
}

impl ScrollRegion {
    pub fn full(rows: usize) -> Self {
        ScrollRegion {
            top: 0,
            bottom: rows.saturating_sub(1),
        }
    }

    pub fn contains(&self, row: usize) -> bool {
        row >= self.top && row <= self.bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenModes {
    pub origin_mode: bool,
    pub autowrap: bool,
    pub insert_mode: bool,
    pub linefeed_mode: bool,
}

impl Default for ScreenModes {
    fn default() -> Self {
        ScreenModes {
            origin_mode: false,
            autowrap: true,
            insert_mode: false,
            linefeed_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabStops {
    stops: Vec<bool>,
}

impl TabStops {
    pub fn new(cols: usize) -> Self {
        let mut stops = vec![false; cols];
        for i in (0..cols).step_by(8) {
            stops[i] = true;
        }
        TabStops { stops }
    }

    pub fn set(&mut self, col: usize) {
        if col < self.stops.len() {
            self.stops[col] = true;
        }
    }

    pub fn clear(&mut self, col: usize) {
        if col < self.stops.len() {
            self.stops[col] = false;
        }
    }

    pub fn clear_all(&mut self) {
        self.stops.iter_mut().for_each(|s| *s = false);
    }

    pub fn next_stop(&self, col: usize) -> usize {
        for i in (col + 1)..self.stops.len() {
            if self.stops[i] {
                return i;
            }
        }
        self.stops.len().saturating_sub(1)
    }

    pub fn resize(&mut self, new_cols: usize) {
        let old_len = self.stops.len();
        self.stops.resize(new_cols, false);
        for i in old_len..new_cols {
            self.stops[i] = i % 8 == 0;
        }
    }
}

/// Minimal changed-region accumulator drained by the refresh machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dirty {
    /// Inclusive changed-row span in the visible grid.
    pub rows: Option<(usize, usize)>,
    /// The whole image needs repainting (scroll, clear, resize).
    pub full: bool,
}

impl Dirty {
    pub fn is_clean(&self) -> bool {
        self.rows.is_none() && !self.full
    }

    fn mark_row(&mut self, row: usize) {
        self.rows = Some(match self.rows {
            Some((lo, hi)) => (lo.min(row), hi.max(row)),
            None => (row, row),
        });
    }

    fn mark_all(&mut self) {
        self.full = true;
    }

    pub fn merge(&mut self, other: Dirty) {
        if other.full {
            self.full = true;
        }
        if let Some((lo, hi)) = other.rows {
            self.mark_row(lo);
            self.mark_row(hi);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Screen {
    cols: usize,
    rows: usize,
    grid: Vec<Line>,
    scrollback: Scrollback,
    cursor: Cursor,
    saved_cursor: Option<SavedCursor>,
    scroll_region: ScrollRegion,
    pub modes: ScreenModes,
    tab_stops: TabStops,
    pending_wrap: bool,
    selection: Selection,
    urls: UrlExtractor,
    dirty: Dirty,
}

impl Screen {
    pub fn new(cols: usize, rows: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Screen {
            cols,
            rows,
            grid: (0..rows).map(|_| Line::new(cols)).collect(),
            scrollback: Scrollback::default(),
            cursor: Cursor::new(),
            saved_cursor: None,
            scroll_region: ScrollRegion::full(rows),
            modes: ScreenModes::default(),
            tab_stops: TabStops::new(cols),
            pending_wrap: false,
            selection: Selection::new(),
            urls: UrlExtractor::new(),
            dirty: Dirty::default(),
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    pub fn scroll_region(&self) -> ScrollRegion {
        self.scroll_region
    }

    pub fn urls(&self) -> &UrlExtractor {
        &self.urls
    }

    pub fn urls_mut(&mut self) -> &mut UrlExtractor {
        &mut self.urls
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_history_policy(&mut self, policy: HistoryPolicy) {
        let discarded = self.scrollback.set_max_lines(policy.max_lines());
        self.urls.history_lines_removed(discarded);
    }

    /// Drain the accumulated dirty region.
    pub fn take_dirty(&mut self) -> Dirty {
        std::mem::take(&mut self.dirty)
    }

    /// Mark the whole image as needing repaint (screen switches,
    /// reconnects).
    pub fn invalidate(&mut self) {
        self.dirty.mark_all();
    }

    /// Grid line by viewport row; negative rows index into scrollback
    /// (-1 is the newest scrollback row).
    pub fn line(&self, row: i64) -> Option<&Line> {
        if row >= 0 {
            self.grid.get(row as usize)
        } else {
            let back = self.scrollback.len() as i64 + row;
            if back < 0 {
                None
            } else {
                self.scrollback.get(back as usize)
            }
        }
    }

    /// Grid line by document row (0 = oldest scrollback row).
    pub fn document_line(&self, row: i64) -> Option<&Line> {
        self.line(row - self.scrollback.len() as i64)
    }

    /// Total document rows: scrollback plus the live grid.
    pub fn document_rows(&self) -> i64 {
        self.scrollback.len() as i64 + self.rows as i64
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.grid.get(row).and_then(|line| line.get(col))
    }

    /// The cursor position in document coordinates.
    pub fn cursor_coordinate(&self) -> Coordinate {
        Coordinate::new(
            self.scrollback.len() as i64 + self.cursor.row as i64,
            self.cursor.col,
        )
    }

    // --- character output -------------------------------------------------

    pub fn put_char(&mut self, c: char) {
        use unicode_width::UnicodeWidthChar;

        if self.urls.reading() {
            self.urls.append_url_text(c);
        }

        let width = c.width().unwrap_or(1);
        if width == 0 {
            // Combining marks fold into the previous cell's glyph slot;
            // without grapheme storage they are dropped.
            return;
        }

        if self.pending_wrap && self.modes.autowrap {
            self.pending_wrap = false;
            if let Some(line) = self.grid.get_mut(self.cursor.row) {
                line.wrapped = true;
            }
            self.cursor.col = 0;
            self.linefeed();
        }

        let row = self.cursor.row;
        let col = self.cursor.col;
        let pen = self.cursor.pen;

        if self.modes.insert_mode {
            if let Some(line) = self.grid.get_mut(row) {
                line.insert_cells(col, width);
            }
        }

        let mut cell = Cell::new(c, pen);
        if width == 2 {
            cell.flags.insert(CellFlags::WIDE);
        }

        if let Some(line) = self.grid.get_mut(row) {
            line.set(col, cell);
            if width == 2 && col + 1 < self.cols {
                let mut spacer = Cell::blank(pen.bg);
                spacer.flags.insert(CellFlags::WIDE_SPACER);
                line.set(col + 1, spacer);
            }
        }
        self.dirty.mark_row(row);

        let new_col = col + width;
        if new_col >= self.cols {
            self.cursor.col = self.cols - 1;
            self.pending_wrap = true;
        } else {
            self.cursor.col = new_col;
        }
    }

    pub fn linefeed(&mut self) {
        self.pending_wrap = false;
        if self.cursor.row == self.scroll_region.bottom {
            self.scroll_up(1);
        } else if self.cursor.row < self.rows - 1 {
            self.cursor.row += 1;
        }
        if self.modes.linefeed_mode {
            self.cursor.col = 0;
        }
    }

    pub fn reverse_index(&mut self) {
        self.pending_wrap = false;
        if self.cursor.row == self.scroll_region.top {
            self.scroll_down(1);
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
        }
    }

    pub fn carriage_return(&mut self) {
        self.pending_wrap = false;
        self.cursor.col = 0;
    }

    pub fn backspace(&mut self) {
        self.pending_wrap = false;
        self.cursor.col = self.cursor.col.saturating_sub(1);
    }

    pub fn tab(&mut self) {
        self.pending_wrap = false;
        let next = self.tab_stops.next_stop(self.cursor.col);
        self.cursor.col = next.min(self.cols - 1);
    }

    pub fn set_tab_stop(&mut self) {
        self.tab_stops.set(self.cursor.col);
    }

    pub fn clear_tab_stop(&mut self, mode: u16) {
        match mode {
            0 => self.tab_stops.clear(self.cursor.col),
            3 => self.tab_stops.clear_all(),
            _ => {}
        }
    }

    // --- scrolling --------------------------------------------------------

    pub fn scroll_up(&mut self, count: usize) {
        let top = self.scroll_region.top;
        let bottom = self.scroll_region.bottom;
        if count == 0 || top > bottom {
            return;
        }
        let count = count.min(bottom - top + 1);

        // Rows scrolling off the top of the full region enter history.
        if top == 0 {
            let mut evicted = 0;
            for i in 0..count {
                if let Some(line) = self.grid.get(i).cloned() {
                    evicted += self.scrollback.push(line);
                }
            }
            self.urls.history_lines_removed(evicted);
        }

        let bg = self.cursor.pen.bg;
        for i in top..=bottom {
            if i + count <= bottom {
                self.grid[i] = self.grid[i + count].clone();
            } else {
                self.grid[i] = Line::new(self.cols);
                self.grid[i].clear_with_bg(bg);
            }
        }
        self.dirty.mark_all();
    }

    pub fn scroll_down(&mut self, count: usize) {
        let top = self.scroll_region.top;
        let bottom = self.scroll_region.bottom;
        if count == 0 || top > bottom {
            return;
        }
        let count = count.min(bottom - top + 1);

        let bg = self.cursor.pen.bg;
        for i in (top..=bottom).rev() {
            if i >= top + count {
                self.grid[i] = self.grid[i - count].clone();
            } else {
                self.grid[i] = Line::new(self.cols);
                self.grid[i].clear_with_bg(bg);
            }
        }
        self.dirty.mark_all();
    }

    // --- cursor motion ----------------------------------------------------

    pub fn move_cursor_to(&mut self, row: usize, col: usize) {
        self.pending_wrap = false;
        let (min_row, max_row) = if self.modes.origin_mode {
            (self.scroll_region.top, self.scroll_region.bottom)
        } else {
            (0, self.rows - 1)
        };
        let row = if self.modes.origin_mode {
            self.scroll_region.top + row
        } else {
            row
        };
        self.cursor.row = row.clamp(min_row, max_row);
        self.cursor.col = col.min(self.cols - 1);
    }

    pub fn move_cursor_up(&mut self, n: usize) {
        self.pending_wrap = false;
        let min_row = if self.modes.origin_mode {
            self.scroll_region.top
        } else {
            0
        };
        self.cursor.row = self.cursor.row.saturating_sub(n).max(min_row);
    }

    pub fn move_cursor_down(&mut self, n: usize) {
        self.pending_wrap = false;
        let max_row = if self.modes.origin_mode {
            self.scroll_region.bottom
        } else {
            self.rows - 1
        };
        self.cursor.row = (self.cursor.row + n).min(max_row);
    }

    pub fn move_cursor_forward(&mut self, n: usize) {
        self.pending_wrap = false;
        self.cursor.col = (self.cursor.col + n).min(self.cols - 1);
    }

    pub fn move_cursor_backward(&mut self, n: usize) {
        self.pending_wrap = false;
        self.cursor.col = self.cursor.col.saturating_sub(n);
    }

    pub fn move_cursor_to_col(&mut self, col: usize) {
        self.pending_wrap = false;
        self.cursor.col = col.min(self.cols - 1);
    }

    pub fn move_cursor_to_row(&mut self, row: usize) {
        let col = self.cursor.col;
        self.move_cursor_to(row, col);
    }

    // --- erasing and editing ----------------------------------------------

    pub fn erase_in_display(&mut self, mode: u16) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        let bg = self.cursor.pen.bg;

        match mode {
            0 => {
                if let Some(line) = self.grid.get_mut(row) {
                    line.clear_range_with_bg(col, self.cols, bg);
                }
                for r in (row + 1)..self.rows {
                    self.grid[r].clear_with_bg(bg);
                }
                self.dirty.mark_all();
            }
            1 => {
                for r in 0..row {
                    self.grid[r].clear_with_bg(bg);
                }
                if let Some(line) = self.grid.get_mut(row) {
                    line.clear_range_with_bg(0, col + 1, bg);
                }
                self.dirty.mark_all();
            }
            2 => self.clear_entire_screen(),
            3 => {
                let removed = self.scrollback.len();
                self.scrollback.clear();
                self.urls.history_lines_removed(removed);
                self.dirty.mark_all();
            }
            _ => {}
        }
    }

    pub fn erase_in_line(&mut self, mode: u16) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        let cols = self.cols;
        let bg = self.cursor.pen.bg;

        if let Some(line) = self.grid.get_mut(row) {
            match mode {
                0 => line.clear_range_with_bg(col, cols, bg),
                1 => line.clear_range_with_bg(0, col + 1, bg),
                2 => line.clear_with_bg(bg),
                _ => return,
            }
            self.dirty.mark_row(row);
        }
    }

    pub fn erase_chars(&mut self, count: usize) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        let end = (col + count).min(self.cols);
        let bg = self.cursor.pen.bg;
        if let Some(line) = self.grid.get_mut(row) {
            line.clear_range_with_bg(col, end, bg);
            self.dirty.mark_row(row);
        }
    }

    pub fn insert_lines(&mut self, count: usize) {
        self.pending_wrap = false;
        let row = self.cursor.row;
        let bottom = self.scroll_region.bottom;
        if !self.scroll_region.contains(row) {
            return;
        }
        let count = count.min(bottom - row + 1);
        for _ in 0..count {
            self.grid.remove(bottom);
            self.grid.insert(row, Line::new(self.cols));
        }
        self.dirty.mark_all();
    }

    pub fn delete_lines(&mut self, count: usize) {
        self.pending_wrap = false;
        let row = self.cursor.row;
        let bottom = self.scroll_region.bottom;
        if !self.scroll_region.contains(row) {
            return;
        }
        let count = count.min(bottom - row + 1);
        for _ in 0..count {
            self.grid.remove(row);
            self.grid.insert(bottom, Line::new(self.cols));
        }
        self.dirty.mark_all();
    }

    pub fn insert_chars(&mut self, count: usize) {
        self.pending_wrap = false;
        let row = self.cursor.row;
        let col = self.cursor.col;
        if let Some(line) = self.grid.get_mut(row) {
            line.insert_cells(col, count);
            self.dirty.mark_row(row);
        }
    }

    pub fn delete_chars(&mut self, count: usize) {
        self.pending_wrap = false;
        let row = self.cursor.row;
        let col = self.cursor.col;
        if let Some(line) = self.grid.get_mut(row) {
            line.delete_cells(col, count);
            self.dirty.mark_row(row);
        }
    }

    // --- region, cursor save, lifecycle -----------------------------------

    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let top = top.min(self.rows - 1);
        let bottom = bottom.min(self.rows - 1);
        if top < bottom {
            self.scroll_region = ScrollRegion { top, bottom };
            self.move_cursor_to(0, 0);
        }
    }

    pub fn reset_scroll_region(&mut self) {
        self.scroll_region = ScrollRegion::full(self.rows);
    }

    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some(SavedCursor::capture(
            &self.cursor,
            self.modes.origin_mode,
            self.modes.autowrap,
        ));
    }

    pub fn restore_cursor(&mut self) {
        if let Some(saved) = self.saved_cursor {
            self.cursor.row = saved.row.min(self.rows - 1);
            self.cursor.col = saved.col.min(self.cols - 1);
            self.cursor.pen = saved.pen;
            self.modes.origin_mode = saved.origin_mode;
            self.modes.autowrap = saved.autowrap;
        }
        self.pending_wrap = false;
    }

    /// Erase the visible grid. Selection and extracted URLs go with it.
    pub fn clear_entire_screen(&mut self) {
        let bg = self.cursor.pen.bg;
        for line in &mut self.grid {
            line.clear_with_bg(bg);
        }
        self.selection.clear();
        self.urls.clear();
        self.dirty.mark_all();
    }

    pub fn resize(&mut self, new_cols: usize, new_rows: usize) {
        let new_cols = new_cols.max(1);
        let new_rows = new_rows.max(1);
        if new_cols == self.cols && new_rows == self.rows {
            return;
        }

        for line in &mut self.grid {
            line.resize(new_cols);
        }

        while self.grid.len() < new_rows {
            self.grid.push(Line::new(new_cols));
        }
        let mut evicted = 0;
        while self.grid.len() > new_rows {
            let line = self.grid.remove(0);
            evicted += self.scrollback.push(line);
            self.cursor.row = self.cursor.row.saturating_sub(1);
        }
        self.urls.history_lines_removed(evicted);

        self.cols = new_cols;
        self.rows = new_rows;
        self.cursor.row = self.cursor.row.min(new_rows - 1);
        self.cursor.col = self.cursor.col.min(new_cols - 1);
        self.scroll_region = ScrollRegion::full(new_rows);
        self.tab_stops.resize(new_cols);
        self.pending_wrap = false;
        self.selection.clear();
        self.dirty.mark_all();
    }

    pub fn reset(&mut self) {
        if self.urls.reading() {
            self.urls.abort_url_input();
        }
        self.cursor = Cursor::new();
        self.saved_cursor = None;
        self.modes = ScreenModes::default();
        self.scroll_region = ScrollRegion::full(self.rows);
        self.tab_stops = TabStops::new(self.cols);
        self.pending_wrap = false;
        for line in &mut self.grid {
            line.clear();
        }
        self.selection.clear();
        self.dirty.mark_all();
    }

    // --- URL envelope hooks -----------------------------------------------

    pub fn toggle_url_input(&mut self) {
        let at = self.cursor_coordinate();
        self.urls.toggle_url_input(at);
    }

    pub fn abort_url_input(&mut self) {
        self.urls.abort_url_input();
    }

    pub fn set_url(&mut self, url: &str) {
        self.urls.set_url(url);
    }

    // --- selection --------------------------------------------------------

    pub fn selection_begin(&mut self, col: usize, row: i64, column_mode: bool) {
        let mode = if column_mode {
            SelectionMode::Column
        } else {
            SelectionMode::Normal
        };
        self.selection.start(row, col, mode);
        self.dirty.mark_all();
    }

    pub fn selection_extend(&mut self, col: usize, row: i64) {
        self.selection.extend_to(row, col);
        self.dirty.mark_all();
    }

    pub fn set_selection_options(&mut self, preserve_line_breaks: bool) {
        self.selection.preserve_line_breaks = preserve_line_breaks;
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.dirty.mark_all();
    }

    pub fn is_selected(&self, col: usize, row: i64) -> bool {
        self.selection.contains(row, col)
    }

    /// Select an explicit span (used by search to highlight a match).
    /// Rows are viewport-relative, end column inclusive.
    pub fn select_span(&mut self, begin: SelectionPoint, end: SelectionPoint) {
        self.selection.start(begin.row, begin.col, SelectionMode::Normal);
        self.selection.extend_to(end.row, end.col);
        self.dirty.mark_all();
    }

    /// Text covered by the current selection. Rows are joined with
    /// newlines when `preserve_line_breaks` is set, single spaces
    /// otherwise; soft-wrapped rows always join without a break.
    pub fn selected_text(&self) -> String {
        if !self.selection.is_active() {
            return String::new();
        }
        let (start, end) = self.selection.normalized();
        let mut out = String::new();

        for row in start.row..=end.row {
            let line = match self.line(row) {
                Some(line) => line,
                None => continue,
            };
            let (from, to) = match self.selection.mode {
                SelectionMode::Column => {
                    (start.col.min(end.col), start.col.max(end.col))
                }
                SelectionMode::Normal => {
                    let from = if row == start.row { start.col } else { 0 };
                    let to = if row == end.row { end.col } else { line.len() };
                    (from, to)
                }
            };

            let mut text: String = line
                .cells()
                .iter()
                .enumerate()
                .filter(|(col, cell)| *col >= from && *col <= to && !cell.is_wide_spacer())
                .map(|(_, cell)| cell.ch)
                .collect();
            text.truncate(text.trim_end().len());
            out.push_str(&text);

            if row < end.row {
                if line.wrapped {
                    // Soft wrap: the logical line continues.
                } else if self.selection.preserve_line_breaks {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
        }
        out
    }
}

impl Default for Screen {
    fn default() -> Self {
        Screen::new(crate::DEFAULT_COLS, crate::DEFAULT_ROWS)
    }
}
