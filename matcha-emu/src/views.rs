//! View fan-out.
//!
//! The emulation pushes size and content updates to every attached
//! display surface. Views are held weakly: destroying a view while it
//! is attached must never fault the engine, so entries are pruned when
//! their target has gone away.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::refresh::RefreshBatch;

/// A display surface attached to the emulation. The surface itself
/// (painting, fonts, input) lives outside this core.
pub trait TermView {
    /// A batch of content changes is ready to repaint.
    fn content_changed(&mut self, batch: &RefreshBatch);
    /// The shared emulation geometry changed (another view resized, or
    /// the protocol switched column counts).
    fn image_size_changed(&mut self, lines: usize, columns: usize);
}

/// Stable handle for an attached view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(u64);

struct ViewEntry {
    id: ViewId,
    view: Weak<RefCell<dyn TermView>>,
    /// Last geometry this view reported.
    lines: usize,
    columns: usize,
}

/// The set of attached views and their last-known geometry.
#[derive(Default)]
pub struct ViewRegistry {
    entries: Vec<ViewEntry>,
    next_id: u64,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, view: &Rc<RefCell<dyn TermView>>) -> ViewId {
        let id = ViewId(self.next_id);
        self.next_id += 1;
        self.entries.push(ViewEntry {
            id,
            view: Rc::downgrade(view),
            lines: 0,
            columns: 0,
        });
        id
    }

    pub fn remove(&mut self, id: ViewId) {
        self.entries.retain(|entry| entry.id != id);
    }

    /// Number of still-live attached views.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.view.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_geometry(&mut self, id: ViewId, lines: usize, columns: usize) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) {
            entry.lines = lines;
            entry.columns = columns;
        }
    }

    pub fn broadcast_content(&mut self, batch: &RefreshBatch) {
        self.for_each_live(None, |view| view.content_changed(batch));
    }

    /// Tell every view except `origin` (the one that caused the
    /// change) about the new geometry.
    pub fn broadcast_size(&mut self, origin: Option<ViewId>, lines: usize, columns: usize) {
        self.for_each_live(origin, |view| view.image_size_changed(lines, columns));
    }

    fn for_each_live(&mut self, skip: Option<ViewId>, mut f: impl FnMut(&mut dyn TermView)) {
        // Pruning happens here rather than eagerly: a view dropped
        // between notifications is simply absent from the next one.
        self.entries.retain(|entry| {
            if Some(entry.id) == skip {
                return entry.view.strong_count() > 0;
            }
            match entry.view.upgrade() {
                Some(view) => {
                    f(&mut *view.borrow_mut());
                    true
                }
                None => {
                    log::debug!("pruning dead view {:?}", entry.id);
                    false
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matcha_core::screen::Dirty;

    #[derive(Default)]
    struct RecordingView {
        batches: usize,
        sizes: Vec<(usize, usize)>,
    }

    impl TermView for RecordingView {
        fn content_changed(&mut self, _batch: &RefreshBatch) {
            self.batches += 1;
        }

        fn image_size_changed(&mut self, lines: usize, columns: usize) {
            self.sizes.push((lines, columns));
        }
    }

    fn batch() -> RefreshBatch {
        RefreshBatch {
            dirty: Dirty {
                rows: Some((0, 0)),
                full: false,
            },
            lines: 24,
            columns: 80,
        }
    }

    fn attach(registry: &mut ViewRegistry) -> (Rc<RefCell<RecordingView>>, ViewId) {
        let view = Rc::new(RefCell::new(RecordingView::default()));
        let dynamic: Rc<RefCell<dyn TermView>> = view.clone();
        let id = registry.add(&dynamic);
        (view, id)
    }

    #[test]
    fn test_broadcast_reaches_all_views() {
        let mut registry = ViewRegistry::new();
        let (a, _) = attach(&mut registry);
        let (b, _) = attach(&mut registry);

        registry.broadcast_content(&batch());
        assert_eq!(a.borrow().batches, 1);
        assert_eq!(b.borrow().batches, 1);
    }

    #[test]
    fn test_dead_view_is_pruned_not_faulted() {
        let mut registry = ViewRegistry::new();
        let (a, _) = attach(&mut registry);
        let (b, _) = attach(&mut registry);
        assert_eq!(registry.len(), 2);

        drop(b);
        registry.broadcast_content(&batch());
        assert_eq!(a.borrow().batches, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_detaches() {
        let mut registry = ViewRegistry::new();
        let (a, id) = attach(&mut registry);
        registry.remove(id);
        registry.broadcast_content(&batch());
        assert_eq!(a.borrow().batches, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_size_broadcast_skips_origin() {
        let mut registry = ViewRegistry::new();
        let (a, a_id) = attach(&mut registry);
        let (b, _) = attach(&mut registry);

        registry.broadcast_size(Some(a_id), 30, 100);
        assert!(a.borrow().sizes.is_empty());
        assert_eq!(b.borrow().sizes, vec![(30, 100)]);
    }
}
