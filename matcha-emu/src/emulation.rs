//! The emulation engine.
//!
//! `Emulation` owns the primary/alternate screen pair and everything
//! around them: the codec decoder, the protocol implementation doing
//! the actual dispatch, the refresh coordinator and the attached
//! views. Raw bytes come in through `on_receive_block`; decoded
//! characters flow through the protocol; screen mutations accumulate
//! as dirty regions that `pump` flushes to views.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Instant;

use matcha_core::fmt::LineFormatter;
use matcha_core::links::Coordinate;
use matcha_core::screen::{HistoryPolicy, Screen};
use matcha_core::search::{SearchQuery, TextSearch};
use matcha_core::selection::SelectionPoint;
use matcha_core::{DEFAULT_COLS, DEFAULT_ROWS};
use matcha_parser::{Codec, Decoder};

use crate::event::{EmulationEvent, NotifyLevel};
use crate::keymap::KeymapSelection;
use crate::refresh::{RefreshBatch, RefreshCoordinator};
use crate::views::{TermView, ViewId, ViewRegistry};

/// Which of the two screen buffers is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenIndex {
    Primary,
    Alternate,
}

impl ScreenIndex {
    pub fn index(self) -> usize {
        match self {
            ScreenIndex::Primary => 0,
            ScreenIndex::Alternate => 1,
        }
    }
}

/// What a protocol implementation sees of the engine while
/// dispatching: the screen pair, the active selector, and the
/// outbound event/response queues.
pub struct ProtocolContext<'a> {
    pub screens: &'a mut [Screen; 2],
    pub active: &'a mut ScreenIndex,
    pub events: &'a mut Vec<EmulationEvent>,
    pub output: &'a mut Vec<u8>,
    /// Whether the transport codec is UTF-8 (protocol variants differ
    /// on multi-byte-safe transports).
    pub utf8: bool,
}

impl ProtocolContext<'_> {
    pub fn screen(&mut self) -> &mut Screen {
        &mut self.screens[self.active.index()]
    }

    pub fn screen_ref(&self) -> &Screen {
        &self.screens[self.active.index()]
    }

    /// Switch the active screen, keeping the other one intact for
    /// later restoration.
    pub fn set_screen(&mut self, index: ScreenIndex) {
        if *self.active != index {
            *self.active = index;
            self.screens[index.index()].invalidate();
        }
    }

    pub fn emit(&mut self, event: EmulationEvent) {
        self.events.push(event);
    }

    /// Queue response bytes for the child process.
    pub fn respond(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }
}

/// One terminal protocol level. The engine holds exactly one
/// implementation, chosen at construction.
pub trait Protocol {
    /// Dispatch one decoded character. This is the core state machine;
    /// incomplete sequences at the end of a block are buffered inside
    /// the implementation and resume on the next character.
    fn on_receive_char(&mut self, ctx: &mut ProtocolContext<'_>, c: char);

    /// Protocol-level mode toggle. Unknown modes are ignored.
    fn set_mode(&mut self, ctx: &mut ProtocolContext<'_>, mode: u16);

    /// Counterpart of `set_mode`.
    fn reset_mode(&mut self, ctx: &mut ProtocolContext<'_>, mode: u16);

    /// Encode text typed by the user into transport bytes.
    fn send_text(&mut self, ctx: &mut ProtocolContext<'_>, text: &str);

    /// Full protocol reset (RIS).
    fn reset(&mut self, ctx: &mut ProtocolContext<'_>);

    /// The erase character advertised to the transport layer.
    fn erase_char(&self) -> u8 {
        0x08
    }
}

pub struct Emulation {
    screens: [Screen; 2],
    active: ScreenIndex,
    connected: bool,
    listening: bool,
    busy_selecting: bool,
    decoder: Decoder,
    protocol: Option<Box<dyn Protocol>>,
    refresh: RefreshCoordinator,
    views: ViewRegistry,
    keymap: KeymapSelection,
    history_policy: HistoryPolicy,
    search: TextSearch,
    events: Vec<EmulationEvent>,
    output: Vec<u8>,
    char_buf: Vec<char>,
}

impl Emulation {
    pub fn new(protocol: Box<dyn Protocol>) -> Self {
        let mut alternate = Screen::new(DEFAULT_COLS, DEFAULT_ROWS);
        // Full-screen applications do not accumulate scrollback.
        alternate.set_history_policy(HistoryPolicy::None);

        Emulation {
            screens: [Screen::new(DEFAULT_COLS, DEFAULT_ROWS), alternate],
            active: ScreenIndex::Primary,
            connected: true,
            listening: true,
            busy_selecting: false,
            decoder: Decoder::new(Codec::Utf8),
            protocol: Some(protocol),
            refresh: RefreshCoordinator::new(),
            views: ViewRegistry::new(),
            keymap: KeymapSelection::new(),
            history_policy: HistoryPolicy::Bounded(
                matcha_core::scrollback::DEFAULT_SCROLLBACK_LINES,
            ),
            search: TextSearch::new(),
            events: Vec::new(),
            output: Vec::new(),
            char_buf: Vec::new(),
        }
    }

    // --- byte intake ------------------------------------------------------

    /// Feed a block of raw transport bytes. While disconnected the
    /// block is dropped whole: no decode state advances and no screen
    /// state mutates.
    pub fn on_receive_block(&mut self, bytes: &[u8]) {
        if !self.connected {
            return;
        }
        if bytes.is_empty() {
            return;
        }

        // The zmodem start signature rides in-band.
        if bytes.windows(4).any(|w| w == b"\x18B00") {
            self.events.push(EmulationEvent::ZmodemDetected);
        }
        self.events
            .push(EmulationEvent::SessionState(NotifyLevel::Activity));

        let mut chars = std::mem::take(&mut self.char_buf);
        chars.clear();
        self.decoder.decode(bytes, &mut chars);

        self.with_protocol(|protocol, ctx| {
            for &c in &chars {
                protocol.on_receive_char(ctx, c);
            }
        });

        self.char_buf = chars;
        self.sync_dirty();
    }

    /// Dispatch a single already-decoded character.
    pub fn on_receive_char(&mut self, c: char) {
        if !self.connected {
            return;
        }
        self.with_protocol(|protocol, ctx| protocol.on_receive_char(ctx, c));
        self.sync_dirty();
    }

    // --- protocol hooks ---------------------------------------------------

    pub fn set_mode(&mut self, mode: u16) {
        self.with_protocol(|protocol, ctx| protocol.set_mode(ctx, mode));
        self.sync_dirty();
    }

    pub fn reset_mode(&mut self, mode: u16) {
        self.with_protocol(|protocol, ctx| protocol.reset_mode(ctx, mode));
        self.sync_dirty();
    }

    pub fn reset(&mut self) {
        self.with_protocol(|protocol, ctx| protocol.reset(ctx));
        self.sync_dirty();
    }

    pub fn erase_char(&self) -> u8 {
        self.protocol
            .as_ref()
            .map(|protocol| protocol.erase_char())
            .unwrap_or(0x08)
    }

    // --- screens ----------------------------------------------------------

    pub fn set_screen(&mut self, index: ScreenIndex) {
        if self.active != index {
            self.active = index;
            self.screens[index.index()].invalidate();
            self.sync_dirty();
        }
    }

    pub fn active_screen(&self) -> ScreenIndex {
        self.active
    }

    pub fn screen(&self) -> &Screen {
        &self.screens[self.active.index()]
    }

    pub fn screen_at(&self, index: ScreenIndex) -> &Screen {
        &self.screens[index.index()]
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screens[self.active.index()]
    }

    pub fn clear_entire_screen(&mut self) {
        self.screen_mut().clear_entire_screen();
        self.sync_dirty();
    }

    /// (lines, columns) of the emulation image.
    pub fn image_size(&self) -> (usize, usize) {
        let screen = self.screen();
        (screen.rows(), screen.cols())
    }

    /// URI scheme prefixes accepted by the URL extractors of both
    /// screens.
    pub fn set_allowed_link_schema(&mut self, schemas: Vec<String>) {
        for screen in &mut self.screens {
            screen.urls_mut().set_allowed_link_schema(schemas.clone());
        }
    }

    /// Request a column-count change; views react to the event.
    pub fn set_columns(&mut self, columns: usize) {
        self.events
            .push(EmulationEvent::ColumnsChanged { columns });
    }

    pub fn set_history(&mut self, policy: HistoryPolicy) {
        self.history_policy = policy;
        self.screens[ScreenIndex::Primary.index()].set_history_policy(policy);
    }

    pub fn history(&self) -> HistoryPolicy {
        self.history_policy
    }

    /// Stream scrollback plus the visible grid of the active screen
    /// through a formatter.
    pub fn stream_history(
        &self,
        out: &mut dyn Write,
        formatter: &mut dyn LineFormatter,
    ) -> io::Result<()> {
        let screen = self.screen();
        for row in 0..screen.document_rows() {
            if let Some(line) = screen.document_line(row) {
                formatter.format_line(line, out)?;
            }
        }
        Ok(())
    }

    // --- connection and input gating --------------------------------------

    /// While disconnected, received blocks do not mutate any state;
    /// reconnecting repaints in full.
    pub fn set_connect(&mut self, connected: bool) {
        self.connected = connected;
        if connected {
            self.screens[self.active.index()].invalidate();
            self.sync_dirty();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_listen_to_key_press(&mut self, listening: bool) {
        self.listening = listening;
    }

    /// Encode user-typed text into transport bytes (drained with
    /// `take_output`). Ignored while key input is not being listened
    /// to.
    pub fn send_text(&mut self, text: &str) {
        if !self.listening {
            return;
        }
        let owned = text.to_string();
        self.with_protocol(move |protocol, ctx| protocol.send_text(ctx, &owned));
    }

    // --- codec and keymap -------------------------------------------------

    pub fn set_codec(&mut self, codec: Codec) {
        self.decoder.set_codec(codec);
        self.events
            .push(EmulationEvent::NegotiateUtf8(codec.is_utf8()));
    }

    /// Select codec by numeric id (0 = locale, 1 = UTF-8). Unknown ids
    /// keep the previous codec.
    pub fn set_codec_id(&mut self, id: i32) {
        match Codec::from_id(id) {
            Ok(codec) => self.set_codec(codec),
            Err(err) => log::debug!("{}", err),
        }
    }

    /// Select codec by name. Unknown names keep the previous codec.
    pub fn set_codec_name(&mut self, name: &str) {
        match Codec::from_name(name) {
            Ok(codec) => self.set_codec(codec),
            Err(err) => log::debug!("{}", err),
        }
    }

    pub fn codec(&self) -> Codec {
        self.decoder.codec()
    }

    pub fn utf8(&self) -> bool {
        self.decoder.codec().is_utf8()
    }

    pub fn set_keymap_id(&mut self, id: i32) {
        self.keymap.set_by_id(id);
    }

    pub fn set_keymap_name(&mut self, name: &str) {
        self.keymap.set_by_name(name);
    }

    pub fn keymap_no(&self) -> i32 {
        self.keymap.id()
    }

    pub fn keymap(&self) -> &'static str {
        self.keymap.name()
    }

    // --- views and refresh ------------------------------------------------

    pub fn add_view(&mut self, view: &Rc<RefCell<dyn TermView>>) -> ViewId {
        self.views.add(view)
    }

    pub fn remove_view(&mut self, id: ViewId) {
        self.views.remove(id);
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// A view reported a resize. Both screens track the new geometry
    /// eagerly so whichever becomes active next is already consistent,
    /// and every OTHER attached view hears about the change.
    pub fn on_image_size_change(&mut self, origin: Option<ViewId>, lines: usize, columns: usize) {
        if lines == 0 || columns == 0 {
            return;
        }
        let (cur_lines, cur_columns) = self.image_size();
        if (cur_lines, cur_columns) == (lines, columns) {
            return;
        }
        for screen in &mut self.screens {
            screen.resize(columns, lines);
        }
        if let Some(id) = origin {
            self.views.set_geometry(id, lines, columns);
        }
        self.events
            .push(EmulationEvent::ImageSizeChanged { lines, columns });
        self.views.broadcast_size(origin, lines, columns);
        self.sync_dirty();
    }

    /// Drive the refresh coordinator: flush a pending batch to all
    /// views if a deadline has passed. Returns whether a flush
    /// happened.
    pub fn pump(&mut self, now: Instant) -> bool {
        match self.refresh.poll(now) {
            Some(dirty) => {
                let (lines, columns) = self.image_size();
                let batch = RefreshBatch {
                    dirty,
                    lines,
                    columns,
                };
                self.views.broadcast_content(&batch);
                true
            }
            None => false,
        }
    }

    /// When the host event loop should next call `pump`.
    pub fn next_refresh_deadline(&self) -> Option<Instant> {
        self.refresh.next_deadline()
    }

    // --- selection ---------------------------------------------------------

    pub fn on_selection_begin(&mut self, x: usize, y: i64, column_mode: bool) {
        self.screen_mut().selection_begin(x, y, column_mode);
        self.sync_dirty();
    }

    pub fn on_selection_extend(&mut self, x: usize, y: i64) {
        self.screen_mut().selection_extend(x, y);
        self.sync_dirty();
    }

    pub fn set_selection(&mut self, preserve_line_breaks: bool) {
        self.screen_mut()
            .set_selection_options(preserve_line_breaks);
    }

    pub fn clear_selection(&mut self) {
        self.screen_mut().clear_selection();
        self.sync_dirty();
    }

    pub fn test_is_selected(&self, x: usize, y: i64) -> bool {
        self.screen().is_selected(x, y)
    }

    pub fn copy_selection(&self) -> String {
        self.screen().selected_text()
    }

    pub fn is_busy_selecting(&mut self, busy: bool) {
        self.busy_selecting = busy;
    }

    pub fn busy_selecting(&self) -> bool {
        self.busy_selecting
    }

    // --- search -------------------------------------------------------------

    /// Reset the search cursor to the current selection, or the buffer
    /// boundary when nothing is selected.
    pub fn find_text_begin(&mut self) {
        let screen = &self.screens[self.active.index()];
        if screen.selection().is_active() {
            let (start, _) = screen.selection().normalized();
            let doc_row = screen.scrollback().len() as i64 + start.row;
            self.search.begin_at(Coordinate::new(doc_row, start.col));
        } else {
            self.search.begin();
        }
    }

    /// Find and select the next match. Returns whether one was found;
    /// repeated calls never re-match the same location and stop at the
    /// buffer boundary.
    pub fn find_text_next(
        &mut self,
        pattern: &str,
        forward: bool,
        case_sensitive: bool,
        regex: bool,
    ) -> bool {
        let query = SearchQuery {
            pattern: pattern.to_string(),
            forward,
            case_sensitive,
            regex,
        };

        let span = {
            let screen = &self.screens[self.active.index()];
            let history = screen.scrollback().len() as i64;
            self.search.find_next(screen, &query).map(|(begin, end)| {
                (
                    SelectionPoint::new(begin.row - history, begin.col),
                    SelectionPoint::new(end.row - history, end.col),
                )
            })
        };

        match span {
            Some((begin, end)) => {
                self.screen_mut().select_span(begin, end);
                self.sync_dirty();
                true
            }
            None => false,
        }
    }

    // --- event and output queues --------------------------------------------

    pub fn take_events(&mut self) -> Vec<EmulationEvent> {
        std::mem::take(&mut self.events)
    }

    /// Bytes queued for the child process (responses, typed text).
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    // --- internals ----------------------------------------------------------

    fn with_protocol<R>(
        &mut self,
        f: impl FnOnce(&mut dyn Protocol, &mut ProtocolContext<'_>) -> R,
    ) -> Option<R> {
        let mut protocol = self.protocol.take()?;
        let utf8 = self.decoder.codec().is_utf8();
        let result = {
            let mut ctx = ProtocolContext {
                screens: &mut self.screens,
                active: &mut self.active,
                events: &mut self.events,
                output: &mut self.output,
                utf8,
            };
            f(protocol.as_mut(), &mut ctx)
        };
        self.protocol = Some(protocol);
        Some(result)
    }

    fn sync_dirty(&mut self) {
        let dirty = self.screens[self.active.index()].take_dirty();
        self.refresh.mark(dirty, Instant::now());
    }
}
