//! Matcha Terminal Emulation Engine
//!
//! The driver on top of `matcha-core` and `matcha-parser`: it receives
//! raw transport bytes, decodes them through the selected codec,
//! dispatches characters into a protocol implementation that mutates
//! the active screen buffer, batches dirty regions behind a
//! dual-deadline debounce, and fans notifications out to attached
//! views.
//!
//! Everything runs on one logical thread; the only time-flavored piece
//! is the refresh coordinator, which tracks plain deadlines driven by
//! the host event loop.

pub mod emulation;
pub mod event;
pub mod keymap;
pub mod refresh;
pub mod views;
pub mod vt102;

pub use emulation::{Emulation, Protocol, ProtocolContext, ScreenIndex};
pub use event::{EmulationEvent, NotifyLevel};
pub use keymap::KeymapSelection;
pub use refresh::{RefreshBatch, RefreshCoordinator};
pub use views::{TermView, ViewId, ViewRegistry};
pub use vt102::Vt102;
