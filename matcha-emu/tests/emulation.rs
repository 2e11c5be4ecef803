//! End-to-end tests driving the emulation through raw byte blocks,
//! the way a transport would.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use proptest::prelude::*;

use matcha_core::screen::HistoryPolicy;
use matcha_emu::{Emulation, RefreshBatch, TermView, Vt102};

fn emulation() -> Emulation {
    Emulation::new(Box::new(Vt102::new()))
}

/// Deterministic fingerprint of externally observable screen state.
fn render(emu: &Emulation) -> String {
    let screen = emu.screen();
    let mut out = String::new();
    for row in 0..screen.rows() {
        out.push_str(&screen.line(row as i64).map(|l| l.text()).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(&format!(
        "cursor={},{} history={} urls={}",
        screen.cursor().row,
        screen.cursor().col,
        screen.scrollback().len(),
        screen.urls().history().len(),
    ));
    out
}

// --- split invariance ------------------------------------------------------

fn fragment() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        Just(b"hello world ".to_vec()),
        Just("h\u{e9}llo \u{4e16}\u{754c} ".as_bytes().to_vec()),
        Just(b"\r\n".to_vec()),
        Just(b"\x1b[2J".to_vec()),
        Just(b"\x1b[31;1m".to_vec()),
        Just(b"\x1b[10;10H".to_vec()),
        Just(b"\x1b[?1049h".to_vec()),
        Just(b"\x1b[?1049l".to_vec()),
        Just(b"\x1b]8;;https://example.com\x1b\\link\x1b]8;;\x1b\\".to_vec()),
        prop::collection::vec(any::<u8>(), 1..12),
    ]
}

proptest! {
    /// Decoding a stream in one block or in arbitrary pieces must
    /// produce identical screen state.
    #[test]
    fn split_invariance(
        fragments in prop::collection::vec(fragment(), 1..16),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let bytes: Vec<u8> = fragments.concat();

        let mut whole = emulation();
        whole.on_receive_block(&bytes);

        let mut pieces = emulation();
        let mut points: Vec<usize> = cuts.iter().map(|ix| ix.index(bytes.len() + 1)).collect();
        points.sort_unstable();
        points.dedup();
        let mut prev = 0;
        for point in points {
            pieces.on_receive_block(&bytes[prev..point]);
            prev = point;
        }
        pieces.on_receive_block(&bytes[prev..]);

        prop_assert_eq!(render(&whole), render(&pieces));
    }
}

#[test]
fn escape_split_at_every_boundary() {
    let seq: &[u8] = "ab\x1b[2;2Hcd\x1b[31m\u{e9}\u{4e2d}\x1b]8;;https://example.com\x1b\\x\x1b]8;;\x1b\\"
        .as_bytes();

    let mut whole = emulation();
    whole.on_receive_block(seq);
    let expected = render(&whole);

    for i in 0..=seq.len() {
        let mut split = emulation();
        split.on_receive_block(&seq[..i]);
        split.on_receive_block(&seq[i..]);
        assert_eq!(render(&split), expected, "split at byte {}", i);
    }
}

// --- link extraction -------------------------------------------------------

#[test]
fn hyperlink_envelope_commits_one_url_in_document_order() {
    let mut emu = emulation();
    emu.set_allowed_link_schema(vec!["https://".into()]);

    emu.on_receive_block(b"\x1b]8;;https://example.com\x1b\\spans\r\nlines\x1b]8;;\x1b\\");

    let urls = emu.screen().urls().history();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].begin < urls[0].end);
    assert_eq!(urls[0].begin.row, 0);
    assert_eq!(urls[0].end.row, 1);
}

#[test]
fn allowed_schema_filtering_at_commit() {
    let mut emu = emulation();
    emu.set_allowed_link_schema(vec!["https://".into()]);

    emu.on_receive_block(b"\x1b]8;;ftp://example.com\x1b\\nope\x1b]8;;\x1b\\ ");
    emu.on_receive_block(b"\x1b]8;;https://example.com\x1b\\yes\x1b]8;;\x1b\\");

    let urls = emu.screen().urls().history();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].url, "https://example.com");
}

#[test]
fn history_truncation_removes_and_shifts_urls() {
    let mut emu = emulation();
    emu.on_image_size_change(None, 2, 40);
    emu.set_history(HistoryPolicy::Bounded(2));
    emu.set_allowed_link_schema(vec!["https://".into()]);

    // Two links on consecutive rows.
    emu.on_receive_block(b"\x1b]8;;https://first.example\x1b\\one\x1b]8;;\x1b\\\r\n");
    emu.on_receive_block(b"\x1b]8;;https://second.example\x1b\\two\x1b]8;;\x1b\\\r\n");
    assert_eq!(emu.screen().urls().history().len(), 2);
    let second_row_before = emu.screen().urls().history()[1].begin.row;

    // Scroll until the first link's row is evicted from the bounded
    // scrollback.
    for _ in 0..2 {
        emu.on_receive_block(b"filler\r\n");
    }

    let urls = emu.screen().urls().history();
    assert_eq!(urls.len(), 1, "first link evicted with its row");
    assert_eq!(urls[0].url, "https://second.example");
    assert!(urls[0].begin.row < second_row_before);
}

// --- refresh debounce ------------------------------------------------------

struct CountingView {
    batches: Vec<RefreshBatch>,
    sizes: Vec<(usize, usize)>,
}

impl TermView for CountingView {
    fn content_changed(&mut self, batch: &RefreshBatch) {
        self.batches.push(*batch);
    }

    fn image_size_changed(&mut self, lines: usize, columns: usize) {
        self.sizes.push((lines, columns));
    }
}

fn counting_view() -> Rc<RefCell<CountingView>> {
    Rc::new(RefCell::new(CountingView {
        batches: Vec::new(),
        sizes: Vec::new(),
    }))
}

#[test]
fn burst_of_blocks_flushes_once() {
    let mut emu = emulation();
    let view = counting_view();
    let dynamic: Rc<RefCell<dyn TermView>> = view.clone();
    emu.add_view(&dynamic);

    for i in 0..100 {
        emu.on_receive_block(format!("line {}\r\n", i).as_bytes());
    }

    // Nothing flushes before a deadline passes.
    assert_eq!(view.borrow().batches.len(), 0);

    let later = Instant::now() + Duration::from_millis(100);
    assert!(emu.pump(later));
    assert!(!emu.pump(later));
    assert_eq!(view.borrow().batches.len(), 1);
}

#[test]
fn view_fanout_shares_one_emulation() {
    let mut emu = emulation();
    let a = counting_view();
    let b = counting_view();
    let a_dyn: Rc<RefCell<dyn TermView>> = a.clone();
    let b_dyn: Rc<RefCell<dyn TermView>> = b.clone();
    let a_id = emu.add_view(&a_dyn);
    emu.add_view(&b_dyn);

    // A resize reported by one view reaches only the others.
    emu.on_image_size_change(Some(a_id), 30, 100);
    assert!(a.borrow().sizes.is_empty());
    assert_eq!(b.borrow().sizes, vec![(30, 100)]);
    assert_eq!(emu.image_size(), (30, 100));

    // Content updates reach everyone.
    emu.on_receive_block(b"shared");
    assert!(emu.pump(Instant::now() + Duration::from_secs(1)));
    assert_eq!(a.borrow().batches.len(), 1);
    assert_eq!(b.borrow().batches.len(), 1);
    assert_eq!(a.borrow().batches[0].columns, 100);
}

#[test]
fn dropped_view_never_faults_the_engine() {
    let mut emu = emulation();
    let a = counting_view();
    let a_dyn: Rc<RefCell<dyn TermView>> = a.clone();
    emu.add_view(&a_dyn);
    assert_eq!(emu.view_count(), 1);

    drop(a_dyn);
    drop(a);
    emu.on_receive_block(b"text");
    assert!(emu.pump(Instant::now() + Duration::from_secs(1)));
    assert_eq!(emu.view_count(), 0);
}

// --- connection gating -----------------------------------------------------

#[test]
fn disconnected_input_leaves_screen_untouched() {
    let mut emu = emulation();
    emu.on_receive_block(b"kept");
    let before = render(&emu);

    emu.set_connect(false);
    emu.on_receive_block(b"\x1b[2J\x1b[H\x1b]8;;https://x\x1b\\junk\x07\xff\xfe");
    assert_eq!(render(&emu), before);

    emu.set_connect(true);
    emu.on_receive_block(b" resumed");
    assert_ne!(render(&emu), before);
    assert!(emu.screen().line(0).unwrap().text().contains("resumed"));
}

// --- search ----------------------------------------------------------------

#[test]
fn find_text_walks_forward_without_rematching() {
    let mut emu = emulation();
    emu.on_receive_block(b"hello world hello");

    emu.find_text_begin();
    assert!(emu.find_text_next("hello", true, true, false));
    assert!(emu.test_is_selected(0, 0));
    assert!(emu.test_is_selected(4, 0));
    assert!(!emu.test_is_selected(5, 0));

    assert!(emu.find_text_next("hello", true, true, false));
    assert!(emu.test_is_selected(12, 0));
    assert!(emu.test_is_selected(16, 0));

    assert!(!emu.find_text_next("hello", true, true, false));
}

#[test]
fn find_text_searches_scrollback() {
    let mut emu = emulation();
    emu.on_image_size_change(None, 2, 40);
    emu.on_receive_block(b"needle in history\r\n\r\n\r\n\r\n");
    assert!(emu.screen().scrollback().len() >= 2);

    emu.find_text_begin();
    assert!(emu.find_text_next("needle", true, true, false));
    // The match row sits in scrollback, above the viewport.
    let (start, _) = emu.screen().selection().normalized();
    assert!(start.row < 0);
}

#[test]
fn copy_selection_returns_match_text() {
    let mut emu = emulation();
    emu.on_receive_block(b"alpha beta gamma");
    emu.on_selection_begin(6, 0, false);
    emu.on_selection_extend(9, 0);
    assert_eq!(emu.copy_selection(), "beta");

    emu.clear_selection();
    assert!(!emu.test_is_selected(7, 0));
    assert_eq!(emu.copy_selection(), "");
}
