//! Matcha Terminal Core
//!
//! Platform-independent screen model for a terminal emulation engine:
//! - Cell representation with character and attributes
//! - Single-buffer screen grid with scrollback (the engine owns a
//!   primary/alternate pair of these)
//! - Escape-sequence URL extraction history
//! - Text selection and scrollback search
//!
//! This crate has NO GUI or transport dependencies and can be driven
//! headlessly for testing.

pub mod cell;
pub mod color;
pub mod cursor;
pub mod fmt;
pub mod line;
pub mod links;
pub mod screen;
pub mod scrollback;
pub mod search;
pub mod selection;

pub use cell::{Cell, CellFlags};
pub use color::{Color, NamedColor, Rgb};
pub use cursor::{Cursor, CursorStyle, SavedCursor};
pub use fmt::{LineFormatter, PlainTextFormatter};
pub use line::Line;
pub use links::{Coordinate, ExtractedUrl, UrlExtractor};
pub use screen::{HistoryPolicy, Screen};
pub use scrollback::Scrollback;
pub use search::{SearchQuery, TextSearch};
pub use selection::{Selection, SelectionMode, SelectionPoint};

/// Default terminal geometry used when no view has reported a size yet.
pub const DEFAULT_COLS: usize = 80;
pub const DEFAULT_ROWS: usize = 24;
