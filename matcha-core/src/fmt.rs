//! History streaming through a pluggable formatter.
//!
//! The emulation can stream its scrollback and visible content into any
//! writer; the formatter decides how cell attributes are rendered (the
//! interesting formatters live outside this core).

use std::io::{self, Write};

use crate::line::Line;

/// Renders one row of cells into a writer.
pub trait LineFormatter {
    fn format_line(&mut self, line: &Line, out: &mut dyn Write) -> io::Result<()>;
}

/// Formatter discarding all attributes, emitting plain text with
/// newlines on hard line ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextFormatter;

impl LineFormatter for PlainTextFormatter {
    fn format_line(&mut self, line: &Line, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(line.text().as_bytes())?;
        if !line.wrapped {
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Cell, Pen};

    #[test]
    fn test_plain_text_formatter() {
        let mut line = Line::new(10);
        for (i, c) in "hi".chars().enumerate() {
            line.set(i, Cell::new(c, Pen::default()));
        }

        let mut out = Vec::new();
        PlainTextFormatter
            .format_line(&line, &mut out)
            .expect("write to vec");
        assert_eq!(out, b"hi\n");
    }

    #[test]
    fn test_wrapped_line_omits_newline() {
        let mut line = Line::new(4);
        line.set(0, Cell::new('a', Pen::default()));
        line.wrapped = true;

        let mut out = Vec::new();
        PlainTextFormatter
            .format_line(&line, &mut out)
            .expect("write to vec");
        assert_eq!(out, b"a");
    }
}
