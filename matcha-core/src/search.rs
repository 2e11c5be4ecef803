//! Text search across the screen and its scrollback.
//!
//! Search is row-by-row over document rows (scrollback first, then the
//! live grid), with a stateful cursor so repeated calls walk through
//! successive matches without re-matching the same location. There is
//! no wrap-around: hitting the boundary reports no match.

use regex::RegexBuilder;

use crate::links::Coordinate;
use crate::screen::Screen;

/// One search request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub pattern: String,
    pub forward: bool,
    pub case_sensitive: bool,
    pub regex: bool,
}

impl SearchQuery {
    fn compile(&self) -> Option<regex::Regex> {
        let pattern = if self.regex {
            self.pattern.clone()
        } else {
            regex::escape(&self.pattern)
        };
        RegexBuilder::new(&pattern)
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|err| {
                log::debug!("unusable search pattern {:?}: {}", self.pattern, err);
                err
            })
            .ok()
    }
}

/// Stateful search cursor. Positions are document coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSearch {
    /// Where the next match may start (forward) or before which it must
    /// start (backward). `None` means the relevant buffer boundary.
    pos: Option<Coordinate>,
}

impl TextSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the cursor to the buffer boundary.
    pub fn begin(&mut self) {
        self.pos = None;
    }

    /// Reset the cursor to an explicit starting coordinate (typically
    /// the current selection).
    pub fn begin_at(&mut self, at: Coordinate) {
        self.pos = Some(at);
    }

    /// Find the next match, advancing the cursor past it. Returns the
    /// inclusive begin/end coordinates of the match.
    pub fn find_next(
        &mut self,
        screen: &Screen,
        query: &SearchQuery,
    ) -> Option<(Coordinate, Coordinate)> {
        if query.pattern.is_empty() {
            return None;
        }
        let re = query.compile()?;
        let total = screen.document_rows();

        let found = if query.forward {
            self.scan_forward(screen, &re, total)
        } else {
            self.scan_backward(screen, &re, total)
        };

        if let Some((begin, _)) = found {
            // Forward scans resume just past the match begin; backward
            // scans treat it as an exclusive upper bound.
            self.pos = if query.forward {
                Some(Coordinate::new(begin.row, begin.col + 1))
            } else {
                Some(begin)
            };
        }
        found
    }

    fn scan_forward(
        &self,
        screen: &Screen,
        re: &regex::Regex,
        total: i64,
    ) -> Option<(Coordinate, Coordinate)> {
        let start = self.pos.unwrap_or(Coordinate::new(0, 0));
        for row in start.row.max(0)..total {
            let min_col = if row == start.row { start.col } else { 0 };
            let (text, map) = row_text(screen, row);
            for m in re.find_iter(&text) {
                if m.end() <= m.start() {
                    continue;
                }
                let begin_col = map.col_at(m.start());
                let end_col = map.col_before(m.end());
                if begin_col >= min_col {
                    return Some((
                        Coordinate::new(row, begin_col),
                        Coordinate::new(row, end_col),
                    ));
                }
            }
        }
        None
    }

    fn scan_backward(
        &self,
        screen: &Screen,
        re: &regex::Regex,
        total: i64,
    ) -> Option<(Coordinate, Coordinate)> {
        let limit = self.pos;
        let start_row = limit.map(|c| c.row).unwrap_or(total - 1);
        for row in (0..=start_row.min(total - 1)).rev() {
            let max_col = match limit {
                Some(c) if c.row == row => Some(c.col),
                _ => None,
            };
            let (text, map) = row_text(screen, row);
            let mut best = None;
            for m in re.find_iter(&text) {
                if m.end() <= m.start() {
                    continue;
                }
                let begin_col = map.col_at(m.start());
                let end_col = map.col_before(m.end());
                if max_col.map_or(true, |mc| begin_col < mc) {
                    best = Some((
                        Coordinate::new(row, begin_col),
                        Coordinate::new(row, end_col),
                    ));
                }
            }
            if best.is_some() {
                return best;
            }
        }
        None
    }
}

/// Maps byte offsets in the row string back to grid columns.
struct ColumnMap {
    /// (byte offset of the char in the row string, grid column).
    entries: Vec<(usize, usize)>,
}

impl ColumnMap {
    /// Column of the char starting at `byte_offset`.
    fn col_at(&self, byte_offset: usize) -> usize {
        self.entries
            .iter()
            .find(|(b, _)| *b == byte_offset)
            .map(|(_, col)| *col)
            .unwrap_or(0)
    }

    /// Column of the last char starting before `byte_end`.
    fn col_before(&self, byte_end: usize) -> usize {
        self.entries
            .iter()
            .take_while(|(b, _)| *b < byte_end)
            .last()
            .map(|(_, col)| *col)
            .unwrap_or(0)
    }
}

/// Row text plus its byte-offset -> column table.
fn row_text(screen: &Screen, document_row: i64) -> (String, ColumnMap) {
    let mut text = String::new();
    let mut entries = Vec::new();
    if let Some(line) = screen.document_line(document_row) {
        for (col, cell) in line.cells().iter().enumerate() {
            if cell.is_wide_spacer() {
                continue;
            }
            entries.push((text.len(), col));
            text.push(cell.ch);
        }
    }
    (text, ColumnMap { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen_with(rows: &[&str]) -> Screen {
        let mut screen = Screen::new(40, rows.len().max(2));
        for (i, row) in rows.iter().enumerate() {
            screen.move_cursor_to(i, 0);
            for c in row.chars() {
                screen.put_char(c);
            }
        }
        screen
    }

    fn query(pattern: &str) -> SearchQuery {
        SearchQuery {
            pattern: pattern.into(),
            forward: true,
            case_sensitive: true,
            regex: false,
        }
    }

    #[test]
    fn test_forward_walks_matches_then_stops() {
        let screen = screen_with(&["hello world hello"]);
        let mut search = TextSearch::new();
        search.begin();
        let q = query("hello");

        let first = search.find_next(&screen, &q).unwrap();
        assert_eq!(first.0, Coordinate::new(0, 0));
        assert_eq!(first.1, Coordinate::new(0, 4));

        let second = search.find_next(&screen, &q).unwrap();
        assert_eq!(second.0, Coordinate::new(0, 12));

        assert!(search.find_next(&screen, &q).is_none());
    }

    #[test]
    fn test_case_insensitive() {
        let screen = screen_with(&["Hello"]);
        let mut search = TextSearch::new();
        search.begin();
        let mut q = query("hello");
        assert!(search.find_next(&screen, &q).is_none());

        search.begin();
        q.case_sensitive = false;
        assert!(search.find_next(&screen, &q).is_some());
    }

    #[test]
    fn test_regex_mode() {
        let screen = screen_with(&["error: code 42"]);
        let mut search = TextSearch::new();
        search.begin();
        let q = SearchQuery {
            pattern: r"code \d+".into(),
            forward: true,
            case_sensitive: true,
            regex: true,
        };
        let hit = search.find_next(&screen, &q).unwrap();
        assert_eq!(hit.0, Coordinate::new(0, 7));
        assert_eq!(hit.1, Coordinate::new(0, 13));
    }

    #[test]
    fn test_invalid_regex_finds_nothing() {
        let screen = screen_with(&["anything"]);
        let mut search = TextSearch::new();
        search.begin();
        let q = SearchQuery {
            pattern: "[unclosed".into(),
            forward: true,
            case_sensitive: true,
            regex: true,
        };
        assert!(search.find_next(&screen, &q).is_none());
    }

    #[test]
    fn test_backward_search() {
        let screen = screen_with(&["aaa", "bbb", "aaa"]);
        let mut search = TextSearch::new();
        search.begin();
        let q = SearchQuery {
            pattern: "aaa".into(),
            forward: false,
            case_sensitive: true,
            regex: false,
        };
        let first = search.find_next(&screen, &q).unwrap();
        assert_eq!(first.0.row, 2);
        let second = search.find_next(&screen, &q).unwrap();
        assert_eq!(second.0.row, 0);
        assert!(search.find_next(&screen, &q).is_none());
    }

    #[test]
    fn test_search_reaches_scrollback() {
        let mut screen = Screen::new(10, 2);
        for c in "needle".chars() {
            screen.put_char(c);
        }
        // Scroll the row into history.
        screen.cursor_mut().row = 1;
        screen.linefeed();
        screen.linefeed();
        assert!(screen.scrollback().len() >= 1);

        let mut search = TextSearch::new();
        search.begin();
        let hit = search.find_next(&screen, &query("needle")).unwrap();
        assert_eq!(hit.0.row, 0);
    }
}
