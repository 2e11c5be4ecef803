//! Side-channel events emitted by the emulation.
//!
//! The engine queues these while processing output; the embedder
//! drains them with `Emulation::take_events` and reacts (retitling a
//! tab, ringing a bell, locking the transport). None of them touch
//! screen content.

/// Session activity level reported to the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Normal,
    Bell,
    Activity,
    Silence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmulationEvent {
    /// A title change request. Category follows the OSC command number
    /// (0 = icon and window, 1 = icon, 2 = window).
    TitleChanged { category: i32, text: String },
    /// The emulation geometry changed.
    ImageSizeChanged { lines: usize, columns: usize },
    /// The protocol switched column count (DECCOLM).
    ColumnsChanged { columns: usize },
    /// Activity/bell state for session indicators.
    SessionState(NotifyLevel),
    /// Tab text color request (-1 resets).
    TabColorChanged(i32),
    /// The application asked to pause or resume the transport
    /// (XOFF/XON).
    LockTransport(bool),
    /// The application selected or deselected UTF-8 transport.
    NegotiateUtf8(bool),
    /// A zmodem transfer start signature appeared in the stream.
    ZmodemDetected,
    /// The application requested a terminal resize.
    ResizeRequest { lines: usize, columns: usize },
}
