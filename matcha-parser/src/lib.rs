//! Matcha Terminal Parser
//!
//! Streaming recognition of terminal control and escape sequences,
//! VT500-series state machine shape. The parser consumes DECODED
//! characters (the codec adapter in this crate turns raw transport
//! bytes into chars first) and produces semantic actions for the
//! emulation engine. It is chunk-boundary safe: a sequence split across
//! feeds resumes where it left off, and malformed input is consumed and
//! dropped without ever corrupting parser state.

pub mod action;
pub mod codec;
pub mod params;
pub mod parser;

pub use action::{c0, c1, Action, CsiAction, EscAction, OscAction};
pub use codec::{Codec, CodecError, Decoder};
pub use params::Params;
pub use parser::Parser;
