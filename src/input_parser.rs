// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Parses raw terminal input bytes into abstract key and mouse events.
//!
//! This is the inverse of [`crate::encode_input`]: a small state machine
//! that recognises CSI-prefixed sequences for arrows, function keys and
//! modifier parameters, `ESC O` (SS3) forms, SGR-encoded mouse reports, and
//! plain or Alt-prefixed characters. Unrecognised sequences produce no
//! events. Resize notifications do not travel in the byte stream; they
//! arrive out of band from the host terminal event source.

use crossterm::event::{KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::key::Key;

/// One event decoded from the host terminal byte stream.
#[derive(Clone, Debug, PartialEq)]
pub enum TermInput {
    Key(Key),
    Mouse(MouseEvent),
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Ground,
    /// Seen `ESC`, deciding between a bare Esc, Alt-char, CSI, and SS3.
    Escape,
    /// Collecting CSI parameter/intermediate bytes.
    Csi(Vec<u8>),
    /// Seen `ESC O`.
    Ss3,
    /// Collecting a multi-byte UTF-8 scalar.
    Utf8 { buf: Vec<u8>, need: usize },
}

/// Incremental decoder for host terminal input.
#[derive(Debug, Default)]
pub struct InputParser {
    state: State,
}

impl InputParser {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Feed a chunk of bytes, returning every event completed by it.
    ///
    /// A chunk ending right after `ESC` is reported as the Esc key: the
    /// chunk boundary stands in for the inter-byte timeout a terminal
    /// driver would use. Incomplete CSI/SS3 sequences stay pending across
    /// chunks.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<TermInput> {
        let mut out = Vec::new();
        for &byte in bytes {
            self.advance(byte, &mut out);
        }
        if matches!(self.state, State::Escape) {
            out.push(TermInput::Key(Key::plain(KeyCode::Esc)));
            self.state = State::Ground;
        }
        out
    }

    fn advance(&mut self, byte: u8, out: &mut Vec<TermInput>) {
        match std::mem::take(&mut self.state) {
            State::Ground => self.ground(byte, out),
            State::Escape => match byte {
                b'[' => self.state = State::Csi(Vec::new()),
                b'O' => self.state = State::Ss3,
                0x1b => {
                    out.push(TermInput::Key(Key::plain(KeyCode::Esc)));
                    self.state = State::Escape;
                }
                b if b.is_ascii() && !b.is_ascii_control() => {
                    out.push(TermInput::Key(Key::new(
                        KeyCode::Char(b as char),
                        KeyModifiers::ALT,
                    )));
                }
                _ => {}
            },
            State::Csi(mut buf) => {
                if (0x40..=0x7e).contains(&byte) {
                    if let Some(event) = decode_csi(&buf, byte) {
                        out.push(event);
                    }
                } else if buf.len() < 32 {
                    buf.push(byte);
                    self.state = State::Csi(buf);
                }
                // Overlong sequences are dropped wholesale.
            }
            State::Ss3 => {
                if let Some(code) = decode_ss3(byte) {
                    out.push(TermInput::Key(Key::plain(code)));
                }
            }
            State::Utf8 { mut buf, need } => {
                if byte & 0xc0 == 0x80 {
                    buf.push(byte);
                    if buf.len() == need {
                        if let Ok(s) = std::str::from_utf8(&buf) {
                            if let Some(ch) = s.chars().next() {
                                out.push(TermInput::Key(Key::plain(KeyCode::Char(ch))));
                            }
                        }
                    } else {
                        self.state = State::Utf8 { buf, need };
                    }
                } else {
                    // Broken sequence; reinterpret this byte from ground.
                    self.ground(byte, out);
                }
            }
        }
    }

    fn ground(&mut self, byte: u8, out: &mut Vec<TermInput>) {
        let key = match byte {
            0x1b => {
                self.state = State::Escape;
                return;
            }
            b'\r' => Key::plain(KeyCode::Enter),
            b'\t' => Key::plain(KeyCode::Tab),
            0x7f => Key::plain(KeyCode::Backspace),
            0x00 => Key::new(KeyCode::Char(' '), KeyModifiers::CONTROL),
            // Remaining C0 controls are Ctrl-letter chords.
            0x01..=0x1a => Key::new(
                KeyCode::Char((byte - 1 + b'a') as char),
                KeyModifiers::CONTROL,
            ),
            0x1c..=0x1f => return,
            b if b < 0x80 => Key::plain(KeyCode::Char(b as char)),
            b => {
                let need = match b {
                    0xc0..=0xdf => 2,
                    0xe0..=0xef => 3,
                    0xf0..=0xf7 => 4,
                    _ => return,
                };
                self.state = State::Utf8 {
                    buf: vec![b],
                    need,
                };
                return;
            }
        };
        out.push(TermInput::Key(key));
    }
}

fn decode_csi(buf: &[u8], final_byte: u8) -> Option<TermInput> {
    if buf.first() == Some(&b'<') {
        return decode_sgr_mouse(&buf[1..], final_byte);
    }

    let params: Vec<u16> = std::str::from_utf8(buf)
        .ok()?
        .split(';')
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;

    let mods = match final_byte {
        b'~' => params.get(1),
        _ => params.get(1).filter(|_| params.first() == Some(&1)),
    }
    .map_or(KeyModifiers::NONE, |p| decode_modifier_mask(*p));

    let code = match final_byte {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'Z' => KeyCode::BackTab,
        b'~' => match params.first()? {
            2 => KeyCode::Insert,
            3 => KeyCode::Delete,
            5 => KeyCode::PageUp,
            6 => KeyCode::PageDown,
            11 => KeyCode::F(1),
            12 => KeyCode::F(2),
            13 => KeyCode::F(3),
            14 => KeyCode::F(4),
            15 => KeyCode::F(5),
            17 => KeyCode::F(6),
            18 => KeyCode::F(7),
            19 => KeyCode::F(8),
            20 => KeyCode::F(9),
            21 => KeyCode::F(10),
            23 => KeyCode::F(11),
            24 => KeyCode::F(12),
            _ => return None,
        },
        _ => return None,
    };

    Some(TermInput::Key(Key::new(code, mods)))
}

fn decode_ss3(byte: u8) -> Option<KeyCode> {
    Some(match byte {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        _ => return None,
    })
}

/// xterm sends `1 + mask`; see [`crate::encode_input::modifier_mask`].
fn decode_modifier_mask(param: u16) -> KeyModifiers {
    let mask = param.saturating_sub(1);
    let mut mods = KeyModifiers::NONE;
    if mask & 1 != 0 {
        mods |= KeyModifiers::SHIFT;
    }
    if mask & 2 != 0 {
        mods |= KeyModifiers::ALT;
    }
    if mask & 4 != 0 {
        mods |= KeyModifiers::CONTROL;
    }
    mods
}

fn decode_sgr_mouse(buf: &[u8], final_byte: u8) -> Option<TermInput> {
    let params: Vec<u16> = std::str::from_utf8(buf)
        .ok()?
        .split(';')
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    let [button, column, row] = params.as_slice() else {
        return None;
    };

    let mut modifiers = KeyModifiers::NONE;
    if button & 4 != 0 {
        modifiers |= KeyModifiers::SHIFT;
    }
    if button & 8 != 0 {
        modifiers |= KeyModifiers::ALT;
    }
    if button & 16 != 0 {
        modifiers |= KeyModifiers::CONTROL;
    }

    let pressed = final_byte == b'M';
    let kind = match button & !0b1_1100 {
        0 if pressed => MouseEventKind::Down(MouseButton::Left),
        0 => MouseEventKind::Up(MouseButton::Left),
        1 if pressed => MouseEventKind::Down(MouseButton::Middle),
        1 => MouseEventKind::Up(MouseButton::Middle),
        2 if pressed => MouseEventKind::Down(MouseButton::Right),
        2 => MouseEventKind::Up(MouseButton::Right),
        32 => MouseEventKind::Drag(MouseButton::Left),
        33 => MouseEventKind::Drag(MouseButton::Middle),
        34 => MouseEventKind::Drag(MouseButton::Right),
        35 => MouseEventKind::Moved,
        64 => MouseEventKind::ScrollUp,
        65 => MouseEventKind::ScrollDown,
        _ => return None,
    };

    Some(TermInput::Mouse(MouseEvent {
        kind,
        column: column.checked_sub(1)?,
        row: row.checked_sub(1)?,
        modifiers,
    }))
}
