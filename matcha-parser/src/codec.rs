//! Codec adapter: raw transport bytes to characters.
//!
//! The emulation decodes the byte stream before dispatching characters
//! into the parser. Decoding is streaming-safe: a multi-byte sequence
//! split across deliveries is reassembled across `decode` calls.
//! Switching codec takes effect on the next call and never
//! reinterprets already-decoded output.

use thiserror::Error;

/// Identity of a supported codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Locale fallback, decoded as Latin-1 (one byte, one char).
    Locale,
    /// UTF-8.
    #[default]
    Utf8,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown codec id {0}")]
    UnknownId(i32),
    #[error("unknown codec name {0:?}")]
    UnknownName(String),
}

impl Codec {
    /// Lookup by the numeric ids the protocol exposes: 0 = locale
    /// default, 1 = UTF-8.
    pub fn from_id(id: i32) -> Result<Self, CodecError> {
        match id {
            0 => Ok(Codec::Locale),
            1 => Ok(Codec::Utf8),
            other => Err(CodecError::UnknownId(other)),
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name.to_ascii_lowercase().as_str() {
            "locale" | "latin-1" | "latin1" | "iso-8859-1" => Ok(Codec::Locale),
            "utf-8" | "utf8" => Ok(Codec::Utf8),
            _ => Err(CodecError::UnknownName(name.to_string())),
        }
    }

    pub fn id(self) -> i32 {
        match self {
            Codec::Locale => 0,
            Codec::Utf8 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Locale => "locale",
            Codec::Utf8 => "utf-8",
        }
    }

    pub fn is_utf8(self) -> bool {
        self == Codec::Utf8
    }
}

/// Streaming decoder for the selected codec.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    codec: Codec,
    utf8: Utf8Assembler,
}

impl Decoder {
    pub fn new(codec: Codec) -> Self {
        Decoder {
            codec,
            utf8: Utf8Assembler::default(),
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Select a different codec. Any half-assembled sequence from the
    /// previous codec is dropped.
    pub fn set_codec(&mut self, codec: Codec) {
        if codec != self.codec {
            self.codec = codec;
            self.utf8.reset();
        }
    }

    /// Decode a block of bytes, appending characters to `out`.
    pub fn decode(&mut self, bytes: &[u8], out: &mut Vec<char>) {
        match self.codec {
            Codec::Locale => {
                // Latin-1: every byte maps directly to the codepoint.
                out.extend(bytes.iter().map(|&b| b as char));
            }
            Codec::Utf8 => {
                for &byte in bytes {
                    match self.utf8.feed(byte) {
                        Utf8Step::Pending => {}
                        Utf8Step::Char(c) => out.push(c),
                        Utf8Step::Invalid => out.push('\u{FFFD}'),
                        Utf8Step::InvalidThenRetry => {
                            out.push('\u{FFFD}');
                            // The offending byte may itself start a new
                            // sequence.
                            match self.utf8.feed(byte) {
                                Utf8Step::Char(c) => out.push(c),
                                Utf8Step::Invalid => out.push('\u{FFFD}'),
                                _ => {}
                            }
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Utf8Step {
    /// Need more bytes.
    Pending,
    /// A character completed.
    Char(char),
    /// Invalid sequence; emit a replacement.
    Invalid,
    /// The pending sequence was invalidated by this byte; emit a
    /// replacement, then feed the byte again.
    InvalidThenRetry,
}

/// Incremental UTF-8 assembly with overlong/surrogate/range rejection.
#[derive(Debug, Clone, Default)]
struct Utf8Assembler {
    buffer: [u8; 4],
    len: usize,
    expected: usize,
}

impl Utf8Assembler {
    fn reset(&mut self) {
        self.len = 0;
        self.expected = 0;
    }

    fn feed(&mut self, byte: u8) -> Utf8Step {
        if self.len == 0 {
            return match byte {
                0x00..=0x7F => Utf8Step::Char(byte as char),
                0xC0..=0xDF => self.start(byte, 2),
                0xE0..=0xEF => self.start(byte, 3),
                0xF0..=0xF7 => self.start(byte, 4),
                _ => Utf8Step::Invalid,
            };
        }

        if byte & 0b1100_0000 != 0b1000_0000 {
            // Not a continuation byte: the pending sequence dies here
            // and the byte gets reprocessed on its own.
            self.reset();
            return Utf8Step::InvalidThenRetry;
        }

        self.buffer[self.len] = byte;
        self.len += 1;
        if self.len < self.expected {
            return Utf8Step::Pending;
        }

        let step = self.complete();
        self.reset();
        step
    }

    fn start(&mut self, byte: u8, expected: usize) -> Utf8Step {
        self.buffer[0] = byte;
        self.len = 1;
        self.expected = expected;
        Utf8Step::Pending
    }

    fn complete(&self) -> Utf8Step {
        let cp = match self.expected {
            2 => ((self.buffer[0] & 0x1F) as u32) << 6 | (self.buffer[1] & 0x3F) as u32,
            3 => {
                ((self.buffer[0] & 0x0F) as u32) << 12
                    | ((self.buffer[1] & 0x3F) as u32) << 6
                    | (self.buffer[2] & 0x3F) as u32
            }
            4 => {
                ((self.buffer[0] & 0x07) as u32) << 18
                    | ((self.buffer[1] & 0x3F) as u32) << 12
                    | ((self.buffer[2] & 0x3F) as u32) << 6
                    | (self.buffer[3] & 0x3F) as u32
            }
            _ => return Utf8Step::Invalid,
        };

        let overlong = match self.expected {
            2 => cp < 0x80,
            3 => cp < 0x800,
            _ => cp < 0x10000,
        };
        if overlong || (0xD800..=0xDFFF).contains(&cp) || cp > 0x10FFFF {
            return Utf8Step::Invalid;
        }
        char::from_u32(cp).map(Utf8Step::Char).unwrap_or(Utf8Step::Invalid)
    }
}
