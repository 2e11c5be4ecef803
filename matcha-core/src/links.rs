//! Escape-sequence URL extraction.
//!
//! Applications can mark a span of output as a hyperlink by wrapping it
//! in an escape envelope. The extractor is a small state machine fed by
//! the screen: a toggle opens a link record at the current cursor
//! position, printed characters accumulate as its display text, the URL
//! itself arrives as one unit, and the closing toggle commits the
//! record into a per-screen history used for click handling.
//!
//! Coordinates are document rows: row 0 is the oldest retained
//! scrollback row, row `history_len` is the top row of the live grid.

use serde::{Deserialize, Serialize};

/// A (row, column) pair addressing a cell in scrollback or the live grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub row: i64,
    pub col: usize,
}

impl Coordinate {
    pub fn new(row: i64, col: usize) -> Self {
        Coordinate { row, col }
    }
}

/// A committed URL span: the link target, the text it was rendered
/// with, and the document coordinates it covers. Never mutated after
/// commit; removed only by history truncation or `clear`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtractedUrl {
    pub url: String,
    pub text: String,
    pub begin: Coordinate,
    pub end: Coordinate,
}

/// State machine recognizing the hyperlink escape envelope.
#[derive(Debug, Clone, Default)]
pub struct UrlExtractor {
    /// Whether a URL span is currently open.
    reading: bool,
    /// Set when an in-progress URL is aborted: the stray closing toggle
    /// that follows must not open a new span.
    ignore_next_toggle: bool,
    /// The record being built. Fields are meaningless unless `reading`.
    current: ExtractedUrl,
    history: Vec<ExtractedUrl>,
    allowed_schemas: Vec<String>,
}

impl UrlExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// URI scheme prefixes accepted at commit time, e.g.
    /// `["https://", "file://"]`. An empty list accepts nothing.
    pub fn set_allowed_link_schema(&mut self, schemas: Vec<String>) {
        self.allowed_schemas = schemas;
    }

    pub fn reading(&self) -> bool {
        self.reading
    }

    /// Start or finish a URL span at the given cursor coordinate.
    pub fn toggle_url_input(&mut self, at: Coordinate) {
        if self.ignore_next_toggle {
            self.ignore_next_toggle = false;
            return;
        }

        if self.reading {
            self.current.end = at;
            self.commit();
            self.reading = false;
        } else {
            self.current = ExtractedUrl {
                begin: at,
                ..Default::default()
            };
            self.reading = true;
        }
    }

    /// Discard the span being read. The matching close toggle, if it
    /// still arrives, is swallowed.
    pub fn abort_url_input(&mut self) {
        if !self.reading {
            return;
        }
        self.reading = false;
        self.current = ExtractedUrl::default();
        self.ignore_next_toggle = true;
    }

    /// Append one character of display text. No-op unless reading.
    pub fn append_url_text(&mut self, c: char) {
        if self.reading {
            self.current.text.push(c);
        }
    }

    /// The URL arrives as one unit, unlike the display text.
    pub fn set_url(&mut self, url: &str) {
        if self.reading {
            self.current.url = url.to_string();
        }
    }

    /// All committed URL spans, oldest first.
    pub fn history(&self) -> &[ExtractedUrl] {
        &self.history
    }

    /// Wipe history and reset to idle. Triggered when the owning screen
    /// is cleared.
    pub fn clear(&mut self) {
        self.history.clear();
        self.reading = false;
        self.ignore_next_toggle = false;
        self.current = ExtractedUrl::default();
    }

    /// The screen discarded the oldest `n` scrollback rows. Entries
    /// beginning inside the discarded range are dropped whole (spans
    /// straddling the boundary are not clipped); survivors shift up.
    pub fn history_lines_removed(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let n = n as i64;
        self.history.retain(|url| url.begin.row >= n);
        for url in &mut self.history {
            url.begin.row -= n;
            url.end.row -= n;
        }
        if self.reading {
            self.current.begin.row -= n;
        }
    }

    fn commit(&mut self) {
        let url = std::mem::take(&mut self.current);
        let accepted = self
            .allowed_schemas
            .iter()
            .any(|schema| url.url.starts_with(schema.as_str()));
        if accepted {
            self.history.push(url);
        } else {
            log::debug!("dropping URL with unapproved scheme: {:?}", url.url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> UrlExtractor {
        let mut ex = UrlExtractor::new();
        ex.set_allowed_link_schema(vec!["https://".into(), "file://".into()]);
        ex
    }

    #[test]
    fn test_toggle_twice_commits_one_url() {
        let mut ex = extractor();
        ex.toggle_url_input(Coordinate::new(3, 4));
        ex.set_url("https://example.com");
        for c in "example".chars() {
            ex.append_url_text(c);
        }
        ex.toggle_url_input(Coordinate::new(3, 11));

        assert_eq!(ex.history().len(), 1);
        let url = &ex.history()[0];
        assert_eq!(url.url, "https://example.com");
        assert_eq!(url.text, "example");
        assert!(url.begin < url.end);
    }

    #[test]
    fn test_abort_swallows_exactly_one_toggle() {
        let mut ex = extractor();
        ex.toggle_url_input(Coordinate::new(0, 0));
        ex.set_url("https://example.com");
        ex.abort_url_input();
        assert!(!ex.reading());

        // The stray closing toggle of the aborted span.
        ex.toggle_url_input(Coordinate::new(0, 5));
        assert!(!ex.reading());
        assert!(ex.history().is_empty());

        // The next toggle opens a fresh span again.
        ex.toggle_url_input(Coordinate::new(1, 0));
        assert!(ex.reading());
    }

    #[test]
    fn test_append_while_idle_is_noop() {
        let mut ex = extractor();
        ex.append_url_text('x');
        ex.toggle_url_input(Coordinate::new(0, 0));
        ex.set_url("https://example.com");
        ex.toggle_url_input(Coordinate::new(0, 1));
        assert_eq!(ex.history()[0].text, "");
    }

    #[test]
    fn test_unapproved_scheme_dropped_at_commit() {
        let mut ex = UrlExtractor::new();
        ex.set_allowed_link_schema(vec!["https://".into()]);

        ex.toggle_url_input(Coordinate::new(0, 0));
        ex.set_url("ftp://example.com");
        ex.toggle_url_input(Coordinate::new(0, 3));

        ex.toggle_url_input(Coordinate::new(1, 0));
        ex.set_url("https://example.com");
        ex.toggle_url_input(Coordinate::new(1, 3));

        assert_eq!(ex.history().len(), 1);
        assert_eq!(ex.history()[0].url, "https://example.com");
    }

    #[test]
    fn test_history_lines_removed_drops_and_shifts() {
        let mut ex = extractor();
        for row in [0i64, 2, 5] {
            ex.toggle_url_input(Coordinate::new(row, 0));
            ex.set_url("https://example.com");
            ex.toggle_url_input(Coordinate::new(row, 8));
        }

        ex.history_lines_removed(3);

        assert_eq!(ex.history().len(), 1);
        assert_eq!(ex.history()[0].begin, Coordinate::new(2, 0));
        assert_eq!(ex.history()[0].end, Coordinate::new(2, 8));
    }

    #[test]
    fn test_history_lines_removed_drops_straddling_span() {
        let mut ex = extractor();
        ex.toggle_url_input(Coordinate::new(1, 0));
        ex.set_url("https://example.com");
        ex.toggle_url_input(Coordinate::new(4, 8));

        // Span begins inside the discarded range: removed whole.
        ex.history_lines_removed(2);
        assert!(ex.history().is_empty());
    }

    #[test]
    fn test_extracted_url_round_trips_through_json() {
        let mut ex = extractor();
        ex.toggle_url_input(Coordinate::new(2, 1));
        ex.set_url("https://example.com");
        ex.toggle_url_input(Coordinate::new(2, 9));

        let json = serde_json::to_string(&ex.history()[0]).unwrap();
        let back: ExtractedUrl = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ex.history()[0]);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut ex = extractor();
        ex.toggle_url_input(Coordinate::new(0, 0));
        ex.set_url("https://example.com");
        ex.toggle_url_input(Coordinate::new(0, 5));
        assert_eq!(ex.history().len(), 1);

        ex.toggle_url_input(Coordinate::new(1, 0));
        ex.clear();
        assert!(ex.history().is_empty());
        assert!(!ex.reading());
    }
}
