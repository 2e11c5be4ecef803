//! Escape-sequence state machine.
//!
//! Follows the VT500-series parser shape (Paul Williams' state
//! diagram), operating on decoded characters: byte-to-char decoding,
//! including multi-byte reassembly, happens in the codec adapter before
//! characters reach this machine. Sequences split across feeds resume
//! on the next feed; malformed sequences are consumed up to a
//! recognizable terminator and dropped.

use crate::action::{c0, c1, Action, CsiAction, EscAction, OscAction};
use crate::params::Params;

/// Cap on collected OSC payload, so hostile output cannot balloon the
/// buffer.
const MAX_OSC_LEN: usize = 4096;
/// Cap on collected intermediate bytes.
const MAX_INTERMEDIATES: usize = 4;
/// Cap on raw parameter bytes.
const MAX_PARAM_BYTES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Normal character processing.
    Ground,
    /// After ESC.
    Escape,
    /// ESC with intermediate bytes collected.
    EscapeIntermediate,
    /// After CSI.
    CsiEntry,
    /// CSI parameter bytes.
    CsiParam,
    /// CSI intermediate bytes.
    CsiIntermediate,
    /// Invalid CSI: consume until the final byte.
    CsiIgnore,
    /// OSC payload.
    OscString,
    /// DCS payload: consumed and discarded.
    DcsString,
    /// SOS/PM/APC payload: consumed and discarded.
    SosPmApcString,
}

#[derive(Debug)]
pub struct Parser {
    state: State,
    intermediates: Vec<u8>,
    params_bytes: Vec<u8>,
    osc_buffer: String,
    csi_private: bool,
    /// An ESC was seen inside a string state; the next char decides
    /// between ST and a new escape sequence.
    string_esc: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            state: State::Ground,
            intermediates: Vec::with_capacity(MAX_INTERMEDIATES),
            params_bytes: Vec::with_capacity(64),
            osc_buffer: String::new(),
            csi_private: false,
            string_esc: false,
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Ground;
        self.clear_seq();
    }

    /// Whether the parser sits in the middle of a sequence (useful for
    /// tests asserting chunk-boundary behavior).
    pub fn mid_sequence(&self) -> bool {
        self.state != State::Ground
    }

    /// Parse a slice of decoded characters, collecting actions.
    pub fn parse(&mut self, input: &[char]) -> Vec<Action> {
        let mut actions = Vec::new();
        for &c in input {
            self.advance(c, &mut actions);
        }
        actions
    }

    /// Advance the state machine by one character.
    pub fn advance(&mut self, c: char, actions: &mut Vec<Action>) {
        let code = c as u32;

        // C1 controls interrupt anything except string payloads, where
        // ST terminates instead.
        if (0x80..=0x9F).contains(&code) {
            match self.state {
                State::OscString if code == c1::ST => {
                    self.dispatch_osc(actions);
                    self.state = State::Ground;
                }
                State::DcsString | State::SosPmApcString if code == c1::ST => {
                    self.state = State::Ground;
                }
                _ => self.handle_c1(code),
            }
            return;
        }

        match self.state {
            State::Ground => self.ground(c, actions),
            State::Escape => self.escape(c, actions),
            State::EscapeIntermediate => self.escape_intermediate(c, actions),
            State::CsiEntry => self.csi_entry(c, actions),
            State::CsiParam => self.csi_param(c, actions),
            State::CsiIntermediate => self.csi_intermediate(c, actions),
            State::CsiIgnore => self.csi_ignore(c, actions),
            State::OscString => self.osc_string(c, actions),
            State::DcsString | State::SosPmApcString => self.string_consume(c, actions),
        }
    }

    fn handle_c1(&mut self, code: u32) {
        self.clear_seq();
        match code {
            c1::CSI => self.state = State::CsiEntry,
            c1::OSC => self.state = State::OscString,
            c1::DCS => self.state = State::DcsString,
            c1::SOS | c1::PM | c1::APC => self.state = State::SosPmApcString,
            _ => self.state = State::Ground,
        }
    }

    fn clear_seq(&mut self) {
        self.intermediates.clear();
        self.params_bytes.clear();
        self.osc_buffer.clear();
        self.csi_private = false;
        self.string_esc = false;
    }

    fn ground(&mut self, c: char, actions: &mut Vec<Action>) {
        let code = c as u32;
        match code {
            0x00..=0x1A | 0x1C..=0x1F => actions.push(Action::Execute(code as u8)),
            0x1B => {
                self.clear_seq();
                self.state = State::Escape;
            }
            0x7F => {}
            _ => actions.push(Action::Print(c)),
        }
    }

    fn escape(&mut self, c: char, actions: &mut Vec<Action>) {
        match c as u32 {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => actions.push(Action::Execute(c as u8)),
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => self.clear_seq(),
            0x7F => {}
            0x5B => {
                // '['
                self.clear_seq();
                self.state = State::CsiEntry;
            }
            0x5D => {
                // ']'
                self.clear_seq();
                self.state = State::OscString;
            }
            0x50 => {
                // 'P'
                self.clear_seq();
                self.state = State::DcsString;
            }
            0x58 | 0x5E | 0x5F => {
                // 'X', '^', '_'
                self.clear_seq();
                self.state = State::SosPmApcString;
            }
            0x20..=0x2F => {
                self.intermediates.push(c as u8);
                self.state = State::EscapeIntermediate;
            }
            0x30..=0x7E => {
                actions.push(Action::Esc(EscAction {
                    intermediates: std::mem::take(&mut self.intermediates),
                    final_byte: c as u8,
                }));
                self.state = State::Ground;
            }
            _ => self.state = State::Ground,
        }
    }

    fn escape_intermediate(&mut self, c: char, actions: &mut Vec<Action>) {
        match c as u32 {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => actions.push(Action::Execute(c as u8)),
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => {
                self.clear_seq();
                self.state = State::Escape;
            }
            0x7F => {}
            0x20..=0x2F => {
                if self.intermediates.len() < MAX_INTERMEDIATES {
                    self.intermediates.push(c as u8);
                }
            }
            0x30..=0x7E => {
                actions.push(Action::Esc(EscAction {
                    intermediates: std::mem::take(&mut self.intermediates),
                    final_byte: c as u8,
                }));
                self.state = State::Ground;
            }
            _ => self.state = State::Ground,
        }
    }

    fn csi_entry(&mut self, c: char, actions: &mut Vec<Action>) {
        match c as u32 {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => actions.push(Action::Execute(c as u8)),
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => {
                self.clear_seq();
                self.state = State::Escape;
            }
            0x7F => {}
            0x3C..=0x3F => {
                // Private markers '<' '=' '>' '?'.
                self.csi_private = c == '?';
                self.state = State::CsiParam;
            }
            0x30..=0x3B => {
                self.params_bytes.push(c as u8);
                self.state = State::CsiParam;
            }
            0x20..=0x2F => {
                self.intermediates.push(c as u8);
                self.state = State::CsiIntermediate;
            }
            0x40..=0x7E => {
                self.dispatch_csi(c as u8, actions);
                self.state = State::Ground;
            }
            _ => self.state = State::Ground,
        }
    }

    fn csi_param(&mut self, c: char, actions: &mut Vec<Action>) {
        match c as u32 {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => actions.push(Action::Execute(c as u8)),
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => {
                self.clear_seq();
                self.state = State::Escape;
            }
            0x7F => {}
            0x30..=0x3B => {
                if self.params_bytes.len() < MAX_PARAM_BYTES {
                    self.params_bytes.push(c as u8);
                }
            }
            0x3C..=0x3F => self.state = State::CsiIgnore,
            0x20..=0x2F => {
                self.intermediates.push(c as u8);
                self.state = State::CsiIntermediate;
            }
            0x40..=0x7E => {
                self.dispatch_csi(c as u8, actions);
                self.state = State::Ground;
            }
            _ => self.state = State::Ground,
        }
    }

    fn csi_intermediate(&mut self, c: char, actions: &mut Vec<Action>) {
        match c as u32 {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => actions.push(Action::Execute(c as u8)),
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => {
                self.clear_seq();
                self.state = State::Escape;
            }
            0x7F => {}
            0x20..=0x2F => {
                if self.intermediates.len() < MAX_INTERMEDIATES {
                    self.intermediates.push(c as u8);
                }
            }
            0x30..=0x3F => self.state = State::CsiIgnore,
            0x40..=0x7E => {
                self.dispatch_csi(c as u8, actions);
                self.state = State::Ground;
            }
            _ => self.state = State::Ground,
        }
    }

    fn csi_ignore(&mut self, c: char, actions: &mut Vec<Action>) {
        match c as u32 {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => actions.push(Action::Execute(c as u8)),
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => {
                self.clear_seq();
                self.state = State::Escape;
            }
            0x40..=0x7E => self.state = State::Ground,
            _ => {}
        }
    }

    fn dispatch_csi(&mut self, final_byte: u8, actions: &mut Vec<Action>) {
        let params = Params::parse(&self.params_bytes);
        actions.push(Action::Csi(CsiAction {
            params: params.to_vec(),
            intermediates: std::mem::take(&mut self.intermediates),
            final_byte,
            private: self.csi_private,
        }));
    }

    fn osc_string(&mut self, c: char, actions: &mut Vec<Action>) {
        if self.string_esc {
            self.string_esc = false;
            if c == '\\' {
                // ESC \ = ST.
                self.dispatch_osc(actions);
                self.state = State::Ground;
            } else {
                // ESC aborting the string and opening a new sequence.
                log::debug!("OSC aborted by ESC, dropping {} chars", self.osc_buffer.len());
                self.clear_seq();
                self.state = State::Escape;
                self.advance(c, actions);
            }
            return;
        }

        match c as u32 {
            code if code == c0::BEL as u32 => {
                self.dispatch_osc(actions);
                self.state = State::Ground;
            }
            0x1B => self.string_esc = true,
            0x18 | 0x1A => self.state = State::Ground,
            0x00..=0x1F => {}
            _ => {
                if self.osc_buffer.len() < MAX_OSC_LEN {
                    self.osc_buffer.push(c);
                }
            }
        }
    }

    fn dispatch_osc(&mut self, actions: &mut Vec<Action>) {
        let buffer = std::mem::take(&mut self.osc_buffer);
        let (head, payload) = match buffer.split_once(';') {
            Some((head, payload)) => (head, payload),
            None => (buffer.as_str(), ""),
        };

        let mut command: u16 = 0;
        for b in head.bytes() {
            if b.is_ascii_digit() {
                command = command.saturating_mul(10).saturating_add((b - b'0') as u16);
            }
        }

        actions.push(Action::Osc(OscAction {
            command,
            payload: payload.to_string(),
        }));
    }

    /// DCS/SOS/PM/APC payloads are recognized and thrown away.
    fn string_consume(&mut self, c: char, actions: &mut Vec<Action>) {
        if self.string_esc {
            self.string_esc = false;
            if c == '\\' {
                self.state = State::Ground;
            } else {
                self.clear_seq();
                self.state = State::Escape;
                self.advance(c, actions);
            }
            return;
        }
        match c as u32 {
            0x1B => self.string_esc = true,
            0x18 | 0x1A => self.state = State::Ground,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(parser: &mut Parser, s: &str) -> Vec<Action> {
        let chars: Vec<char> = s.chars().collect();
        parser.parse(&chars)
    }

    fn printed(actions: &[Action]) -> String {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Print(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_plain_text() {
        let mut parser = Parser::new();
        let actions = parse_str(&mut parser, "hello");
        assert_eq!(printed(&actions), "hello");
    }

    #[test]
    fn test_c0_execute() {
        let mut parser = Parser::new();
        let actions = parse_str(&mut parser, "a\nb");
        assert_eq!(actions[1], Action::Execute(0x0A));
    }

    #[test]
    fn test_csi_cursor_position() {
        let mut parser = Parser::new();
        let actions = parse_str(&mut parser, "\x1b[10;20H");
        assert_eq!(
            actions,
            vec![Action::Csi(CsiAction {
                params: vec![10, 20],
                intermediates: vec![],
                final_byte: b'H',
                private: false,
            })]
        );
    }

    #[test]
    fn test_csi_private_mode() {
        let mut parser = Parser::new();
        let actions = parse_str(&mut parser, "\x1b[?1049h");
        match &actions[0] {
            Action::Csi(csi) => {
                assert!(csi.private);
                assert_eq!(csi.params, vec![1049]);
                assert_eq!(csi.final_byte, b'h');
            }
            other => panic!("expected CSI, got {:?}", other),
        }
    }

    #[test]
    fn test_esc_dispatch() {
        let mut parser = Parser::new();
        let actions = parse_str(&mut parser, "\x1bM");
        assert_eq!(
            actions,
            vec![Action::Esc(EscAction {
                intermediates: vec![],
                final_byte: b'M',
            })]
        );
    }

    #[test]
    fn test_osc_bel_terminated() {
        let mut parser = Parser::new();
        let actions = parse_str(&mut parser, "\x1b]0;my title\x07");
        assert_eq!(
            actions,
            vec![Action::Osc(OscAction {
                command: 0,
                payload: "my title".into(),
            })]
        );
    }

    #[test]
    fn test_osc_st_terminated() {
        let mut parser = Parser::new();
        let actions = parse_str(&mut parser, "\x1b]8;;https://example.com\x1b\\");
        assert_eq!(
            actions,
            vec![Action::Osc(OscAction {
                command: 8,
                payload: ";https://example.com".into(),
            })]
        );
    }

    #[test]
    fn test_sequence_split_across_feeds() {
        let mut parser = Parser::new();
        let first = parse_str(&mut parser, "\x1b[3");
        assert!(first.is_empty());
        assert!(parser.mid_sequence());

        let second = parse_str(&mut parser, "8;5;2m");
        assert_eq!(second.len(), 1);
        match &second[0] {
            Action::Csi(csi) => assert_eq!(csi.params, vec![38, 5, 2]),
            other => panic!("expected CSI, got {:?}", other),
        }
    }

    #[test]
    fn test_can_aborts_sequence() {
        let mut parser = Parser::new();
        let actions = parse_str(&mut parser, "\x1b[12\x18X");
        assert_eq!(printed(&actions), "X");
    }

    #[test]
    fn test_invalid_csi_consumed_silently() {
        let mut parser = Parser::new();
        // Params after an intermediate byte are invalid: the sequence is
        // consumed through the final byte without dispatching.
        let actions = parse_str(&mut parser, "\x1b[1 2mX");
        assert_eq!(actions.len(), 1);
        assert_eq!(printed(&actions), "X");
    }

    #[test]
    fn test_dcs_payload_discarded() {
        let mut parser = Parser::new();
        let actions = parse_str(&mut parser, "\x1bPq#0;1;2\x1b\\after");
        assert_eq!(printed(&actions), "after");
    }

    #[test]
    fn test_esc_inside_osc_starts_new_sequence() {
        let mut parser = Parser::new();
        let actions = parse_str(&mut parser, "\x1b]0;partial\x1b[2J");
        assert_eq!(
            actions,
            vec![Action::Csi(CsiAction {
                params: vec![2],
                intermediates: vec![],
                final_byte: b'J',
                private: false,
            })]
        );
    }

    #[test]
    fn test_non_ascii_inside_csi_aborts() {
        let mut parser = Parser::new();
        let actions = parse_str(&mut parser, "\x1b[1é");
        assert!(actions.is_empty());
        assert!(!parser.mid_sequence());
    }

    #[test]
    fn test_unicode_print_in_ground() {
        let mut parser = Parser::new();
        let actions = parse_str(&mut parser, "héllo 世界");
        assert_eq!(printed(&actions), "héllo 世界");
    }

    #[test]
    fn test_osc_payload_bounded() {
        let mut parser = Parser::new();
        let long = "x".repeat(MAX_OSC_LEN * 2);
        let actions = parse_str(&mut parser, &format!("\x1b]0;{}\x07", long));
        match &actions[0] {
            Action::Osc(osc) => assert!(osc.payload.len() <= MAX_OSC_LEN),
            other => panic!("expected OSC, got {:?}", other),
        }
    }
}
