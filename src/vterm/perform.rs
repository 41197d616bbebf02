// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! `vte::Perform` implementation for [`Screen`].
//!
//! The `vte` state machine tokenizes the child's byte stream and dispatches
//! here; this module translates sequence parameters and routes to the
//! corresponding [`Screen`] operation. It accepts the xterm superset needed
//! by common terminal programs (vim, htop, shell prompts); anything
//! unrecognised is consumed silently.
//!
//! ```text
//! Child process ─▶ PTY master ─▶ VTerm::write ─▶ vte::Parser
//!                                                    │
//!                      print()/execute()/csi_dispatch()/osc_dispatch()/esc_dispatch()
//!                                                    │
//!                                              Screen mutations ─▶ damage callbacks
//! ```

use vte::{Params, Perform};

use super::{protocol, screen::{MouseProtocolMode, Screen}};

/// First sub-parameter of the `idx`-th parameter, with `0` and absent both
/// mapping to `default` (VT100 movement-count semantics).
fn count(params: &Params, idx: usize, default: u16) -> u16 {
    match params.iter().nth(idx).and_then(|p| p.first().copied()) {
        None | Some(0) => default,
        Some(value) => value,
    }
}

/// First sub-parameter of the `idx`-th parameter, `0` preserved (selector
/// semantics, e.g. erase modes).
fn selector(params: &Params, idx: usize) -> u16 {
    params
        .iter()
        .nth(idx)
        .and_then(|p| p.first().copied())
        .unwrap_or(0)
}

impl Perform for Screen {
    fn print(&mut self, ch: char) {
        let ch = if self.dec_graphics {
            translate_dec_graphics(ch)
        } else {
            ch
        };
        self.print_char(ch);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            protocol::BACKSPACE => self.backspace(),
            protocol::TAB => self.tab_forward(1),
            protocol::LINE_FEED | protocol::VERTICAL_TAB | protocol::FORM_FEED => {
                self.linefeed();
            }
            protocol::CARRIAGE_RETURN => self.carriage_return(),
            protocol::BEL => {}
            _ => {}
        }
    }

    fn csi_dispatch(
        &mut self,
        params: &Params,
        intermediates: &[u8],
        _ignore: bool,
        action: char,
    ) {
        if intermediates.first() == Some(&b'?') {
            match action {
                protocol::SM_SET_MODE => self.set_private_modes(params, true),
                protocol::RM_RESET_MODE => self.set_private_modes(params, false),
                // DECSED/DECSEL: no protection attributes are tracked, so
                // selective erase behaves like plain erase.
                protocol::ED_ERASE_DISPLAY => self.erase_display(selector(params, 0)),
                protocol::EL_ERASE_LINE => self.erase_line(selector(params, 0)),
                _ => {}
            }
            return;
        }
        if !intermediates.is_empty() {
            return;
        }

        match action {
            protocol::CUU_CURSOR_UP => self.cursor_up(count(params, 0, 1)),
            protocol::CUD_CURSOR_DOWN => self.cursor_down(count(params, 0, 1)),
            protocol::CUF_CURSOR_FORWARD => self.cursor_forward(count(params, 0, 1)),
            protocol::CUB_CURSOR_BACKWARD => self.cursor_backward(count(params, 0, 1)),
            protocol::CNL_CURSOR_NEXT_LINE => self.cursor_next_line(count(params, 0, 1)),
            protocol::CPL_CURSOR_PREV_LINE => self.cursor_prev_line(count(params, 0, 1)),
            protocol::CHA_CURSOR_COLUMN => self.cursor_col(count(params, 0, 1) - 1),
            protocol::VPA_VERTICAL_POSITION => self.cursor_row(count(params, 0, 1) - 1),
            protocol::CUP_CURSOR_POSITION | protocol::HVP_CURSOR_POSITION => {
                let row = count(params, 0, 1) - 1;
                let col = count(params, 1, 1) - 1;
                self.cursor_to(row, col);
            }
            protocol::CHT_FORWARD_TAB => self.tab_forward(count(params, 0, 1)),
            protocol::CBT_BACKWARD_TAB => self.tab_backward(count(params, 0, 1)),
            protocol::TBC_TAB_CLEAR => self.clear_tab_stop(selector(params, 0)),

            protocol::ED_ERASE_DISPLAY => self.erase_display(selector(params, 0)),
            protocol::EL_ERASE_LINE => self.erase_line(selector(params, 0)),
            protocol::ECH_ERASE_CHAR => self.erase_chars(count(params, 0, 1)),

            protocol::ICH_INSERT_CHAR => self.insert_chars(count(params, 0, 1)),
            protocol::DCH_DELETE_CHAR => self.delete_chars(count(params, 0, 1)),
            protocol::IL_INSERT_LINE => self.insert_lines(count(params, 0, 1)),
            protocol::DL_DELETE_LINE => self.delete_lines(count(params, 0, 1)),

            protocol::SU_SCROLL_UP => self.scroll_up(count(params, 0, 1)),
            protocol::SD_SCROLL_DOWN => self.scroll_down(count(params, 0, 1)),

            protocol::DECSTBM_SET_MARGINS => {
                let rows = self.rows();
                let top = count(params, 0, 1) - 1;
                let bottom = count(params, 1, rows) - 1;
                self.set_scroll_region(top, bottom);
            }

            protocol::SCP_SAVE_CURSOR => self.save_cursor(),
            protocol::RCP_RESTORE_CURSOR => self.restore_cursor(),

            protocol::SGR_SET_GRAPHICS => self.apply_sgr(params),

            protocol::DSR_DEVICE_STATUS => match selector(params, 0) {
                5 => self.respond(b"\x1b[0n"),
                6 => {
                    let pos = self.cursor_pos();
                    let report = format!("\x1b[{};{}R", pos.row + 1, pos.col + 1);
                    self.respond(report.as_bytes());
                }
                _ => {}
            },

            // Anything else is consumed without effect.
            _ => {}
        }
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        let Some(&code) = params.first() else { return };
        let text = params
            .get(1)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default();
        match code {
            protocol::OSC_TITLE_AND_ICON => {
                self.set_title(&text);
                self.set_icon_name(&text);
            }
            protocol::OSC_ICON_NAME => self.set_icon_name(&text),
            protocol::OSC_TITLE => self.set_title(&text),
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        if intermediates == protocol::G0_CHARSET_INTERMEDIATE {
            match byte {
                protocol::CHARSET_ASCII => self.dec_graphics = false,
                protocol::CHARSET_DEC_GRAPHICS => self.dec_graphics = true,
                _ => {}
            }
            return;
        }
        if !intermediates.is_empty() {
            return;
        }

        match byte {
            protocol::DECSC_SAVE_CURSOR => self.save_cursor(),
            protocol::DECRC_RESTORE_CURSOR => self.restore_cursor(),
            protocol::IND_INDEX_DOWN => self.linefeed(),
            protocol::NEL_NEXT_LINE => self.next_line(),
            protocol::HTS_SET_TAB => self.set_tab_stop(),
            protocol::RI_REVERSE_INDEX_UP => self.reverse_linefeed(),
            protocol::RIS_RESET_TERMINAL => self.reset(),
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _c: char) {
        // DCS (sixel, ReGIS, ...) is not supported; the payload is dropped.
    }

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}
}

impl Screen {
    fn set_private_modes(&mut self, params: &Params, on: bool) {
        for param in params.iter() {
            let Some(&mode) = param.first() else { continue };
            match mode {
                protocol::DECCKM_APPLICATION_CURSOR_KEYS => {
                    self.set_application_cursor_keys(on);
                }
                protocol::DECAWM_AUTOWRAP => self.set_autowrap(on),
                protocol::DECTCEM_CURSOR_VISIBLE => self.set_cursor_visible(on),
                protocol::ALT_SCREEN_47 | protocol::ALT_SCREEN_1047 => {
                    if on {
                        self.enter_alt_screen(false);
                    } else {
                        self.leave_alt_screen(false);
                    }
                }
                protocol::SAVE_CURSOR_1048 => {
                    if on {
                        self.save_cursor();
                    } else {
                        self.restore_cursor();
                    }
                }
                protocol::ALT_SCREEN_SAVE_CURSOR_1049 => {
                    if on {
                        self.enter_alt_screen(true);
                    } else {
                        self.leave_alt_screen(true);
                    }
                }
                protocol::MOUSE_PRESS => self.set_mouse_protocol(if on {
                    MouseProtocolMode::PressRelease
                } else {
                    MouseProtocolMode::None
                }),
                protocol::MOUSE_PRESS_RELEASE => self.set_mouse_protocol(if on {
                    MouseProtocolMode::ButtonMotion
                } else {
                    MouseProtocolMode::None
                }),
                protocol::MOUSE_ANY_MOTION => self.set_mouse_protocol(if on {
                    MouseProtocolMode::AnyMotion
                } else {
                    MouseProtocolMode::None
                }),
                protocol::MOUSE_SGR_ENCODING => self.set_sgr_mouse(on),
                protocol::BRACKETED_PASTE => self.set_bracketed_paste(on),
                _ => {}
            }
        }
    }

    fn apply_sgr(&mut self, params: &Params) {
        use super::cell::{Color, StyleFlags};
        use super::protocol::*;

        let list: Vec<&[u16]> = params.iter().collect();
        if list.is_empty() {
            self.pen.reset();
            return;
        }

        let mut i = 0;
        while i < list.len() {
            let param = list[i];
            let code = param.first().copied().unwrap_or(0);
            match code {
                SGR_RESET => self.pen.reset(),
                SGR_BOLD => self.pen.attrs.insert(StyleFlags::BOLD),
                SGR_DIM => self.pen.attrs.insert(StyleFlags::DIM),
                SGR_ITALIC => self.pen.attrs.insert(StyleFlags::ITALIC),
                SGR_UNDERLINE => self.pen.attrs.insert(StyleFlags::UNDERLINE),
                SGR_BLINK | SGR_RAPID_BLINK => self.pen.attrs.insert(StyleFlags::BLINK),
                SGR_REVERSE => self.pen.attrs.insert(StyleFlags::INVERSE),
                SGR_HIDDEN => self.pen.attrs.insert(StyleFlags::HIDDEN),
                SGR_STRIKETHROUGH => self.pen.attrs.insert(StyleFlags::STRIKETHROUGH),
                SGR_RESET_BOLD_DIM => {
                    self.pen.attrs.remove(StyleFlags::BOLD);
                    self.pen.attrs.remove(StyleFlags::DIM);
                }
                SGR_RESET_ITALIC => self.pen.attrs.remove(StyleFlags::ITALIC),
                SGR_RESET_UNDERLINE => self.pen.attrs.remove(StyleFlags::UNDERLINE),
                SGR_RESET_BLINK => self.pen.attrs.remove(StyleFlags::BLINK),
                SGR_RESET_REVERSE => self.pen.attrs.remove(StyleFlags::INVERSE),
                SGR_RESET_HIDDEN => self.pen.attrs.remove(StyleFlags::HIDDEN),
                SGR_RESET_STRIKETHROUGH => {
                    self.pen.attrs.remove(StyleFlags::STRIKETHROUGH);
                }

                SGR_FG_BLACK..=SGR_FG_WHITE => {
                    self.pen.fg = Color::Indexed((code - SGR_FG_BLACK) as u8);
                }
                SGR_FG_DEFAULT => self.pen.fg = Color::Default,
                SGR_BG_BLACK..=SGR_BG_WHITE => {
                    self.pen.bg = Color::Indexed((code - SGR_BG_BLACK) as u8);
                }
                SGR_BG_DEFAULT => self.pen.bg = Color::Default,
                SGR_FG_BRIGHT_BLACK..=SGR_FG_BRIGHT_WHITE => {
                    self.pen.fg = Color::Indexed((code - SGR_FG_BRIGHT_BLACK + 8) as u8);
                }
                SGR_BG_BRIGHT_BLACK..=SGR_BG_BRIGHT_WHITE => {
                    self.pen.bg = Color::Indexed((code - SGR_BG_BRIGHT_BLACK + 8) as u8);
                }

                SGR_FG_EXTENDED | SGR_BG_EXTENDED => {
                    let (color, consumed) = parse_extended_color(&list, i);
                    if let Some(color) = color {
                        if code == SGR_FG_EXTENDED {
                            self.pen.fg = color;
                        } else {
                            self.pen.bg = color;
                        }
                    }
                    i += consumed;
                    continue;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Parse a 38/48 extended color at `list[start]`, handling both the colon
/// sub-parameter form (`38:5:196`) and the legacy semicolon form
/// (`38;5;196`). Returns the color and how many list entries were consumed.
fn parse_extended_color(
    list: &[&[u16]],
    start: usize,
) -> (Option<super::cell::Color>, usize) {
    use super::cell::Color;
    use super::protocol::{SGR_COLOR_MODE_INDEXED, SGR_COLOR_MODE_RGB};

    let param = list[start];
    if param.len() > 1 {
        // Colon form: everything is in the sub-parameter slice.
        let color = match param.get(1) {
            Some(&SGR_COLOR_MODE_INDEXED) => {
                param.get(2).map(|&idx| Color::Indexed(idx as u8))
            }
            Some(&SGR_COLOR_MODE_RGB) => match (param.get(2), param.get(3), param.get(4)) {
                (Some(&r), Some(&g), Some(&b)) => {
                    Some(Color::Rgb(r as u8, g as u8, b as u8))
                }
                _ => None,
            },
            _ => None,
        };
        return (color, 1);
    }

    let first = |idx: usize| list.get(idx).and_then(|p| p.first().copied());
    match first(start + 1) {
        Some(SGR_COLOR_MODE_INDEXED) => {
            let color = first(start + 2).map(|idx| Color::Indexed(idx as u8));
            (color, 3)
        }
        Some(SGR_COLOR_MODE_RGB) => {
            let color = match (first(start + 2), first(start + 3), first(start + 4)) {
                (Some(r), Some(g), Some(b)) => {
                    Some(super::cell::Color::Rgb(r as u8, g as u8, b as u8))
                }
                _ => None,
            };
            (color, 5)
        }
        _ => (None, 2),
    }
}

/// DEC Special Graphics (`ESC ( 0`) translation for box-drawing output.
fn translate_dec_graphics(ch: char) -> char {
    match ch {
        '`' => '◆',
        'a' => '▒',
        'f' => '°',
        'g' => '±',
        'j' => '┘',
        'k' => '┐',
        'l' => '┌',
        'm' => '└',
        'n' => '┼',
        'o' => '⎺',
        'p' => '⎻',
        'q' => '─',
        'r' => '⎼',
        's' => '⎽',
        't' => '├',
        'u' => '┤',
        'v' => '┴',
        'w' => '┬',
        'x' => '│',
        'y' => '≤',
        'z' => '≥',
        '{' => 'π',
        '|' => '≠',
        '}' => '£',
        '~' => '·',
        _ => ch,
    }
}
