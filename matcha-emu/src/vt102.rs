//! VT102/xterm-level protocol implementation.
//!
//! Feeds decoded characters through the escape-sequence parser and
//! dispatches the resulting actions onto the active screen. Malformed
//! or unknown sequences are consumed without effect; nothing the child
//! process writes can corrupt engine state.

use matcha_core::color::{Color, NamedColor, Rgb};
use matcha_core::screen::Screen;
use matcha_parser::{c0, Action, CsiAction, EscAction, OscAction, Parser};

use crate::emulation::{Protocol, ProtocolContext, ScreenIndex};
use crate::event::{EmulationEvent, NotifyLevel};

pub struct Vt102 {
    parser: Parser,
    actions: Vec<Action>,
    app_cursor: bool,
    app_keypad: bool,
    bracketed_paste: bool,
}

impl Vt102 {
    pub fn new() -> Self {
        Vt102 {
            parser: Parser::new(),
            actions: Vec::new(),
            app_cursor: false,
            app_keypad: false,
            bracketed_paste: false,
        }
    }

    /// DECCKM state, consumed by the input layer when encoding cursor
    /// keys.
    pub fn app_cursor_keys(&self) -> bool {
        self.app_cursor
    }

    /// DECNKM state.
    pub fn app_keypad(&self) -> bool {
        self.app_keypad
    }

    /// Whether pasted text should be wrapped in bracketed-paste
    /// markers.
    pub fn bracketed_paste(&self) -> bool {
        self.bracketed_paste
    }

    fn handle_action(&mut self, ctx: &mut ProtocolContext<'_>, action: Action) {
        match action {
            Action::Print(c) => ctx.screen().put_char(c),
            Action::Execute(byte) => self.execute(ctx, byte),
            Action::Csi(csi) => self.dispatch_csi(ctx, csi),
            Action::Esc(esc) => self.dispatch_esc(ctx, esc),
            Action::Osc(osc) => self.dispatch_osc(ctx, osc),
        }
    }

    fn execute(&mut self, ctx: &mut ProtocolContext<'_>, byte: u8) {
        match byte {
            c0::BEL => ctx.emit(EmulationEvent::SessionState(NotifyLevel::Bell)),
            c0::BS => ctx.screen().backspace(),
            c0::HT => ctx.screen().tab(),
            c0::LF | c0::VT | c0::FF => ctx.screen().linefeed(),
            c0::CR => ctx.screen().carriage_return(),
            c0::XON => ctx.emit(EmulationEvent::LockTransport(false)),
            c0::XOFF => ctx.emit(EmulationEvent::LockTransport(true)),
            c0::SO | c0::SI => log::debug!("charset shift ignored"),
            _ => log::trace!("control 0x{:02x} ignored", byte),
        }
    }

    fn dispatch_esc(&mut self, ctx: &mut ProtocolContext<'_>, esc: EscAction) {
        match (esc.intermediates.as_slice(), esc.final_byte) {
            ([], b'D') => ctx.screen().linefeed(),
            ([], b'E') => {
                ctx.screen().carriage_return();
                ctx.screen().linefeed();
            }
            ([], b'H') => ctx.screen().set_tab_stop(),
            ([], b'M') => ctx.screen().reverse_index(),
            ([], b'7') => ctx.screen().save_cursor(),
            ([], b'8') => ctx.screen().restore_cursor(),
            ([], b'c') => self.reset(ctx),
            ([], b'=') => self.app_keypad = true,
            ([], b'>') => self.app_keypad = false,
            ([b'%'], b'G') => ctx.emit(EmulationEvent::NegotiateUtf8(true)),
            ([b'%'], b'@') => ctx.emit(EmulationEvent::NegotiateUtf8(false)),
            ([b'(' | b')' | b'*' | b'+'], _) => log::debug!("charset designation ignored"),
            (intermediates, final_byte) => {
                log::debug!(
                    "unhandled ESC {:?} 0x{:02x}",
                    intermediates,
                    final_byte
                );
            }
        }
    }

    fn dispatch_csi(&mut self, ctx: &mut ProtocolContext<'_>, csi: CsiAction) {
        if csi.private {
            match csi.final_byte {
                b'h' => {
                    for i in 0..csi.params.len().max(1) {
                        self.set_private_mode(ctx, csi.param(i, 0), true);
                    }
                }
                b'l' => {
                    for i in 0..csi.params.len().max(1) {
                        self.set_private_mode(ctx, csi.param(i, 0), false);
                    }
                }
                _ => log::debug!("unhandled private CSI 0x{:02x}", csi.final_byte),
            }
            return;
        }

        if !csi.intermediates.is_empty() {
            log::debug!(
                "CSI with intermediates {:?} ignored",
                csi.intermediates
            );
            return;
        }

        match csi.final_byte {
            b'@' => ctx.screen().insert_chars(csi.param_or_one(0) as usize),
            b'A' => ctx.screen().move_cursor_up(csi.param_or_one(0) as usize),
            b'B' | b'e' => ctx.screen().move_cursor_down(csi.param_or_one(0) as usize),
            b'C' | b'a' => ctx
                .screen()
                .move_cursor_forward(csi.param_or_one(0) as usize),
            b'D' => ctx
                .screen()
                .move_cursor_backward(csi.param_or_one(0) as usize),
            b'E' => {
                let n = csi.param_or_one(0) as usize;
                ctx.screen().move_cursor_down(n);
                ctx.screen().carriage_return();
            }
            b'F' => {
                let n = csi.param_or_one(0) as usize;
                ctx.screen().move_cursor_up(n);
                ctx.screen().carriage_return();
            }
            b'G' | b'`' => ctx
                .screen()
                .move_cursor_to_col(csi.param_or_one(0) as usize - 1),
            b'H' | b'f' => {
                let row = csi.param_or_one(0) as usize - 1;
                let col = csi.param_or_one(1) as usize - 1;
                ctx.screen().move_cursor_to(row, col);
            }
            b'I' => {
                for _ in 0..csi.param_or_one(0) {
                    ctx.screen().tab();
                }
            }
            b'J' => ctx.screen().erase_in_display(csi.param(0, 0)),
            b'K' => ctx.screen().erase_in_line(csi.param(0, 0)),
            b'L' => ctx.screen().insert_lines(csi.param_or_one(0) as usize),
            b'M' => ctx.screen().delete_lines(csi.param_or_one(0) as usize),
            b'P' => ctx.screen().delete_chars(csi.param_or_one(0) as usize),
            b'S' => ctx.screen().scroll_up(csi.param_or_one(0) as usize),
            b'T' => ctx.screen().scroll_down(csi.param_or_one(0) as usize),
            b'X' => ctx.screen().erase_chars(csi.param_or_one(0) as usize),
            b'c' => {
                // DA: advertise VT100 with advanced video option.
                ctx.respond(b"\x1b[?1;2c");
            }
            b'd' => ctx
                .screen()
                .move_cursor_to_row(csi.param_or_one(0) as usize - 1),
            b'g' => ctx.screen().clear_tab_stop(csi.param(0, 0)),
            b'h' => {
                for i in 0..csi.params.len().max(1) {
                    self.set_ansi_mode(ctx.screen(), csi.param(i, 0), true);
                }
            }
            b'l' => {
                for i in 0..csi.params.len().max(1) {
                    self.set_ansi_mode(ctx.screen(), csi.param(i, 0), false);
                }
            }
            b'm' => Self::apply_sgr(ctx.screen(), &csi.params),
            b'n' => match csi.param(0, 0) {
                5 => ctx.respond(b"\x1b[0n"),
                6 => {
                    let (row, col) = {
                        let cursor = ctx.screen_ref().cursor();
                        (cursor.row + 1, cursor.col + 1)
                    };
                    ctx.respond(format!("\x1b[{};{}R", row, col).as_bytes());
                }
                other => log::debug!("unhandled DSR {}", other),
            },
            b'r' => {
                let rows = ctx.screen_ref().rows();
                let top = csi.param_or_one(0) as usize - 1;
                let bottom = csi.param(1, rows as u16) as usize - 1;
                ctx.screen().set_scroll_region(top, bottom);
            }
            b's' => ctx.screen().save_cursor(),
            b't' => {
                if csi.param(0, 0) == 8 {
                    ctx.emit(EmulationEvent::ResizeRequest {
                        lines: csi.param(1, 0) as usize,
                        columns: csi.param(2, 0) as usize,
                    });
                } else {
                    log::debug!("window op {} ignored", csi.param(0, 0));
                }
            }
            b'u' => ctx.screen().restore_cursor(),
            other => log::debug!("unhandled CSI 0x{:02x}", other),
        }
    }

    fn dispatch_osc(&mut self, ctx: &mut ProtocolContext<'_>, osc: OscAction) {
        match osc.command {
            0 | 1 | 2 => ctx.emit(EmulationEvent::TitleChanged {
                category: osc.command as i32,
                text: osc.payload,
            }),
            8 => {
                // Hyperlink envelope: payload is "params;uri". Every
                // marker toggles the extractor; the URI (when present)
                // lands on the freshly opened record.
                let uri = match osc.payload.split_once(';') {
                    Some((_params, uri)) => uri.to_string(),
                    None => osc.payload,
                };
                let screen = ctx.screen();
                screen.toggle_url_input();
                if !uri.is_empty() {
                    screen.set_url(&uri);
                }
            }
            28 => ctx.emit(EmulationEvent::TabColorChanged(
                osc.payload.trim().parse().unwrap_or(-1),
            )),
            104 | 110 | 111 | 112 => {}
            other => log::debug!("unhandled OSC {}", other),
        }
    }

    /// DEC private modes (DECSET/DECRST). Unknown modes are ignored.
    fn set_private_mode(&mut self, ctx: &mut ProtocolContext<'_>, mode: u16, enable: bool) -> bool {
        match mode {
            1 => self.app_cursor = enable,
            3 => {
                let columns = if enable { 132 } else { 80 };
                ctx.emit(EmulationEvent::ColumnsChanged { columns });
            }
            6 => {
                ctx.screen().modes.origin_mode = enable;
                ctx.screen().move_cursor_to(0, 0);
            }
            7 => ctx.screen().modes.autowrap = enable,
            25 => ctx.screen().cursor_mut().visible = enable,
            47 => self.switch_screen(ctx, enable, false, false),
            1047 => self.switch_screen(ctx, enable, true, false),
            1048 => {
                if enable {
                    ctx.screen().save_cursor();
                } else {
                    ctx.screen().restore_cursor();
                }
            }
            1049 => self.switch_screen(ctx, enable, true, true),
            2004 => self.bracketed_paste = enable,
            1000..=1006 => log::debug!("mouse mode {} not tracked", mode),
            other => {
                log::debug!("private mode {} ignored", other);
                return false;
            }
        }
        true
    }

    /// ANSI modes (SM/RM). Unknown modes are ignored.
    fn set_ansi_mode(&mut self, screen: &mut Screen, mode: u16, enable: bool) -> bool {
        match mode {
            4 => screen.modes.insert_mode = enable,
            20 => screen.modes.linefeed_mode = enable,
            other => {
                log::debug!("ansi mode {} ignored", other);
                return false;
            }
        }
        true
    }

    fn switch_screen(
        &mut self,
        ctx: &mut ProtocolContext<'_>,
        to_alternate: bool,
        clear_on_enter: bool,
        save_cursor: bool,
    ) {
        if to_alternate {
            if *ctx.active == ScreenIndex::Alternate {
                return;
            }
            if save_cursor {
                ctx.screen().save_cursor();
            }
            ctx.set_screen(ScreenIndex::Alternate);
            if clear_on_enter {
                ctx.screen().clear_entire_screen();
                ctx.screen().move_cursor_to(0, 0);
            }
        } else {
            if *ctx.active == ScreenIndex::Primary {
                return;
            }
            ctx.set_screen(ScreenIndex::Primary);
            if save_cursor {
                ctx.screen().restore_cursor();
            }
        }
    }

    fn apply_sgr(screen: &mut Screen, params: &[u16]) {
        use matcha_core::cell::CellFlags;

        let params: &[u16] = if params.is_empty() { &[0] } else { params };
        let pen = &mut screen.cursor_mut().pen;

        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => pen.reset(),
                1 => pen.flags.insert(CellFlags::BOLD),
                2 => pen.flags.insert(CellFlags::FAINT),
                3 => pen.flags.insert(CellFlags::ITALIC),
                4 => pen.flags.insert(CellFlags::UNDERLINE),
                5 | 6 => pen.flags.insert(CellFlags::BLINK),
                7 => pen.flags.insert(CellFlags::INVERSE),
                8 => pen.flags.insert(CellFlags::HIDDEN),
                9 => pen.flags.insert(CellFlags::STRIKETHROUGH),
                22 => {
                    pen.flags.remove(CellFlags::BOLD);
                    pen.flags.remove(CellFlags::FAINT);
                }
                23 => pen.flags.remove(CellFlags::ITALIC),
                24 => pen.flags.remove(CellFlags::UNDERLINE),
                25 => pen.flags.remove(CellFlags::BLINK),
                27 => pen.flags.remove(CellFlags::INVERSE),
                28 => pen.flags.remove(CellFlags::HIDDEN),
                29 => pen.flags.remove(CellFlags::STRIKETHROUGH),
                30..=37 => {
                    if let Some(color) = NamedColor::from_sgr_normal(params[i] - 30) {
                        pen.fg = Color::Named(color);
                    }
                }
                38 => {
                    if let Some((color, consumed)) = Self::extended_color(&params[i + 1..]) {
                        pen.fg = color;
                        i += consumed;
                    } else {
                        break;
                    }
                }
                39 => pen.fg = Color::Default,
                40..=47 => {
                    if let Some(color) = NamedColor::from_sgr_normal(params[i] - 40) {
                        pen.bg = Color::Named(color);
                    }
                }
                48 => {
                    if let Some((color, consumed)) = Self::extended_color(&params[i + 1..]) {
                        pen.bg = color;
                        i += consumed;
                    } else {
                        break;
                    }
                }
                49 => pen.bg = Color::Default,
                90..=97 => {
                    if let Some(color) = NamedColor::from_sgr_bright(params[i] - 90) {
                        pen.fg = Color::Named(color);
                    }
                }
                100..=107 => {
                    if let Some(color) = NamedColor::from_sgr_bright(params[i] - 100) {
                        pen.bg = Color::Named(color);
                    }
                }
                other => log::trace!("SGR {} ignored", other),
            }
            i += 1;
        }
    }

    /// Parse the tail of an SGR 38/48: `5;index` or `2;r;g;b`.
    /// Returns the color and how many parameters were consumed.
    fn extended_color(rest: &[u16]) -> Option<(Color, usize)> {
        match rest.first().copied() {
            Some(5) => rest
                .get(1)
                .map(|&idx| (Color::Indexed(idx.min(255) as u8), 2)),
            Some(2) => match (rest.get(1), rest.get(2), rest.get(3)) {
                (Some(&r), Some(&g), Some(&b)) => Some((
                    Color::Rgb(Rgb::new(
                        r.min(255) as u8,
                        g.min(255) as u8,
                        b.min(255) as u8,
                    )),
                    4,
                )),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Default for Vt102 {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for Vt102 {
    fn on_receive_char(&mut self, ctx: &mut ProtocolContext<'_>, c: char) {
        let mut actions = std::mem::take(&mut self.actions);
        actions.clear();
        self.parser.advance(c, &mut actions);
        for action in actions.drain(..) {
            self.handle_action(ctx, action);
        }
        self.actions = actions;
    }

    fn set_mode(&mut self, ctx: &mut ProtocolContext<'_>, mode: u16) {
        if !self.set_private_mode(ctx, mode, true) {
            self.set_ansi_mode(ctx.screen(), mode, true);
        }
    }

    fn reset_mode(&mut self, ctx: &mut ProtocolContext<'_>, mode: u16) {
        if !self.set_private_mode(ctx, mode, false) {
            self.set_ansi_mode(ctx.screen(), mode, false);
        }
    }

    fn send_text(&mut self, ctx: &mut ProtocolContext<'_>, text: &str) {
        if ctx.utf8 {
            ctx.output.extend_from_slice(text.as_bytes());
        } else {
            // Latin-1 transport: unmappable characters degrade to '?'.
            for c in text.chars() {
                let code = c as u32;
                ctx.output.push(if code < 0x100 { code as u8 } else { b'?' });
            }
        }
    }

    fn reset(&mut self, ctx: &mut ProtocolContext<'_>) {
        self.parser.reset();
        self.app_cursor = false;
        self.app_keypad = false;
        self.bracketed_paste = false;
        for screen in ctx.screens.iter_mut() {
            screen.reset();
        }
        ctx.set_screen(ScreenIndex::Primary);
        ctx.screens[ScreenIndex::Primary.index()].invalidate();
    }
}
