// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Encodes abstract key and mouse events into the byte sequences a child
//! process attached to a PTY expects.
//!
//! Named keys map to canonical xterm sequences with the standard `1 + mask`
//! modifier parameter (shift=1, alt=2, ctrl=4). Cursor keys switch from CSI
//! to SS3 when the child has enabled application cursor keys (DECCKM).
//! `Char` with Ctrl maps through the legacy X11 control table; Alt prefixes
//! `ESC`.

use std::fmt::Write as _;

use crossterm::event::{KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::key::Key;

pub const CSI: &str = "\x1b[";
pub const SS3: &str = "\x1bO";

/// Terminal modes that influence how a key is encoded.
#[derive(Clone, Copy, Debug, Default)]
pub struct EncodeModes {
    /// DECCKM: cursor keys send SS3 sequences instead of CSI.
    pub application_cursor_keys: bool,
    /// LNM: Enter sends CR LF instead of CR.
    pub newline_mode: bool,
}

/// Encode a key for a PTY-attached child. Returns the (possibly empty) byte
/// sequence; keys with no terminal representation encode to nothing.
#[must_use]
pub fn encode_key(key: &Key, modes: EncodeModes) -> Vec<u8> {
    let mut buf = String::new();
    let code = key.code();

    // Uppercase and punctuation already encode the shift state.
    let mods = match code {
        KeyCode::Char(c)
            if (c.is_ascii_punctuation() || c.is_ascii_uppercase())
                && key.mods().contains(KeyModifiers::SHIFT) =>
        {
            key.mods().difference(KeyModifiers::SHIFT)
        }
        _ => key.mods(),
    };

    match code {
        KeyCode::Char(c) if mods.contains(KeyModifiers::CONTROL) => {
            if let Some(ctrl) = ctrl_mapping(c) {
                if mods.contains(KeyModifiers::ALT) {
                    buf.push('\x1b');
                }
                buf.push(ctrl);
            }
        }

        KeyCode::Char(c) if mods.contains(KeyModifiers::ALT) => {
            buf.push('\x1b');
            buf.push(c);
        }

        KeyCode::Char(c) => buf.push(c),

        KeyCode::Enter | KeyCode::Esc | KeyCode::Backspace => {
            let c = match code {
                KeyCode::Enter => '\r',
                KeyCode::Esc => '\x1b',
                // Backspace sends the default VERASE, which is the DEL
                // codepoint.
                KeyCode::Backspace => '\x7f',
                _ => unreachable!(),
            };
            if mods.contains(KeyModifiers::ALT) {
                buf.push('\x1b');
            }
            buf.push(c);
            if modes.newline_mode && code == KeyCode::Enter {
                buf.push('\n');
            }
        }

        KeyCode::Tab => {
            if mods.contains(KeyModifiers::ALT) {
                buf.push('\x1b');
            }
            let mods = mods.difference(KeyModifiers::ALT);
            if mods == KeyModifiers::SHIFT {
                buf.push_str("\x1b[Z");
            } else {
                buf.push('\t');
            }
        }

        KeyCode::BackTab => buf.push_str("\x1b[Z"),

        KeyCode::Up
        | KeyCode::Down
        | KeyCode::Right
        | KeyCode::Left
        | KeyCode::Home
        | KeyCode::End => {
            let c = match code {
                KeyCode::Up => 'A',
                KeyCode::Down => 'B',
                KeyCode::Right => 'C',
                KeyCode::Left => 'D',
                KeyCode::Home => 'H',
                KeyCode::End => 'F',
                _ => unreachable!(),
            };
            if mods.is_empty() {
                let intro = if modes.application_cursor_keys { SS3 } else { CSI };
                let _ = write!(buf, "{intro}{c}");
            } else {
                let _ = write!(buf, "{}1;{}{}", CSI, 1 + modifier_mask(mods), c);
            }
        }

        KeyCode::Insert | KeyCode::Delete | KeyCode::PageUp | KeyCode::PageDown => {
            let n = match code {
                KeyCode::Insert => 2,
                KeyCode::Delete => 3,
                KeyCode::PageUp => 5,
                KeyCode::PageDown => 6,
                _ => unreachable!(),
            };
            if mods.is_empty() {
                let _ = write!(buf, "\x1b[{n}~");
            } else {
                let _ = write!(buf, "\x1b[{};{}~", n, 1 + modifier_mask(mods));
            }
        }

        KeyCode::F(n @ 1..=4) if mods.is_empty() => {
            // F1-F4 are SS3 when unmodified.
            let c = match n {
                1 => 'P',
                2 => 'Q',
                3 => 'R',
                4 => 'S',
                _ => unreachable!(),
            };
            let _ = write!(buf, "{SS3}{c}");
        }

        KeyCode::F(n @ 1..=12) => {
            let base = match n {
                1 => 11,
                2 => 12,
                3 => 13,
                4 => 14,
                5 => 15,
                6 => 17,
                7 => 18,
                8 => 19,
                9 => 20,
                10 => 21,
                11 => 23,
                12 => 24,
                _ => unreachable!(),
            };
            if mods.is_empty() {
                let _ = write!(buf, "\x1b[{base}~");
            } else {
                let _ = write!(buf, "\x1b[{};{}~", base, 1 + modifier_mask(mods));
            }
        }

        // Keys with no terminal representation.
        _ => {}
    }

    buf.into_bytes()
}

/// Encode a key for a pipe-attached child: only keys with a literal byte
/// form are delivered, everything else is dropped.
#[must_use]
pub fn encode_key_simple(key: &Key) -> Option<Vec<u8>> {
    match key.code() {
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            Some(c.encode_utf8(&mut buf).as_bytes().to_vec())
        }
        KeyCode::Enter => Some(b"\n".to_vec()),
        KeyCode::Tab => Some(b"\t".to_vec()),
        KeyCode::Backspace => Some(b"\x7f".to_vec()),
        KeyCode::Esc => Some(b"\x1b".to_vec()),
        _ => None,
    }
}

/// xterm modifier parameter mask: shift=1, alt=2, ctrl=4.
#[must_use]
pub fn modifier_mask(mods: KeyModifiers) -> u8 {
    let mut mask = 0;
    if mods.contains(KeyModifiers::SHIFT) {
        mask |= 1;
    }
    if mods.contains(KeyModifiers::ALT) {
        mask |= 2;
    }
    if mods.contains(KeyModifiers::CONTROL) {
        mask |= 4;
    }
    mask
}

/// Map a character to its Ctrl equivalent. Inherits the legacy X11 aliases
/// (e.g. `Ctrl-2` is NUL) that xterm carries.
#[must_use]
pub fn ctrl_mapping(c: char) -> Option<char> {
    Some(match c {
        '@' | '`' | ' ' | '2' => '\x00',
        'a'..='z' => ((c as u8 - b'a') + 1) as char,
        'A'..='Z' => ((c as u8 - b'A') + 1) as char,
        '[' | '3' | '{' => '\x1b',
        '\\' | '4' | '|' => '\x1c',
        ']' | '5' | '}' => '\x1d',
        '^' | '6' | '~' => '\x1e',
        '_' | '7' | '/' => '\x1f',
        '8' | '?' => '\x7f',
        _ => return None,
    })
}

/// Encode a mouse event as an SGR (1006) report for a child that enabled
/// mouse tracking. Coordinates are zero-based pane-relative and converted to
/// the protocol's one-based form.
#[must_use]
pub fn encode_mouse_event(event: &MouseEvent) -> Vec<u8> {
    let button = match event.kind {
        MouseEventKind::Down(btn) | MouseEventKind::Up(btn) => match btn {
            MouseButton::Left => 0,
            MouseButton::Right => 2,
            MouseButton::Middle => 1,
        },
        MouseEventKind::Drag(btn) => match btn {
            MouseButton::Left => 32,
            MouseButton::Right => 34,
            MouseButton::Middle => 33,
        },
        MouseEventKind::ScrollUp => 64,
        MouseEventKind::ScrollDown => 65,
        MouseEventKind::Moved | MouseEventKind::ScrollLeft | MouseEventKind::ScrollRight => {
            return Vec::new();
        }
    };

    let suffix = match event.kind {
        MouseEventKind::Up(_) => 'm',
        _ => 'M',
    };

    format!(
        "\x1b[<{};{};{}{}",
        button,
        event.column + 1,
        event.row + 1,
        suffix
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(spec: &str) -> Vec<u8> {
        encode_key(&Key::parse(spec).unwrap(), EncodeModes::default())
    }

    #[test]
    fn test_plain_chars() {
        assert_eq!(encode("x"), b"x");
        assert_eq!(encode("<Space>"), b" ");
        // UTF-8 passes through.
        assert_eq!(encode("ф"), "ф".as_bytes());
    }

    #[test]
    fn test_ctrl_chars() {
        assert_eq!(encode("<C-c>"), b"\x03");
        assert_eq!(encode("<C-a>"), b"\x01");
        assert_eq!(encode("<C-Space>"), b"\x00");
        assert_eq!(encode("<C-M-x>"), b"\x1b\x18");
    }

    #[test]
    fn test_alt_prefixes_escape() {
        assert_eq!(encode("<M-f>"), b"\x1bf");
        assert_eq!(encode("<M-Enter>"), b"\x1b\r");
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(encode("<Enter>"), b"\r");
        assert_eq!(encode("<BS>"), b"\x7f");
        assert_eq!(encode("<Tab>"), b"\t");
        assert_eq!(encode("<S-Tab>"), b"\x1b[Z");
        assert_eq!(encode("<Up>"), b"\x1b[A");
        assert_eq!(encode("<Del>"), b"\x1b[3~");
        assert_eq!(encode("<PageUp>"), b"\x1b[5~");
    }

    #[test]
    fn test_modifier_parameters() {
        assert_eq!(encode("<C-Up>"), b"\x1b[1;5A");
        assert_eq!(encode("<S-Left>"), b"\x1b[1;2D");
        assert_eq!(encode("<C-PageDown>"), b"\x1b[6;5~");
    }

    #[test]
    fn test_application_cursor_keys() {
        let modes = EncodeModes {
            application_cursor_keys: true,
            ..Default::default()
        };
        assert_eq!(encode_key(&Key::parse("<Up>").unwrap(), modes), b"\x1bOA");
        // Modified cursor keys stay CSI even in application mode.
        assert_eq!(
            encode_key(&Key::parse("<C-Up>").unwrap(), modes),
            b"\x1b[1;5A"
        );
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(encode("<F1>"), b"\x1bOP");
        assert_eq!(encode("<F4>"), b"\x1bOS");
        assert_eq!(encode("<F5>"), b"\x1b[15~");
        assert_eq!(encode("<F12>"), b"\x1b[24~");
        assert_eq!(encode("<S-F1>"), b"\x1b[11;2~");
    }

    #[test]
    fn test_simple_target_subset() {
        assert_eq!(
            encode_key_simple(&Key::parse("x").unwrap()),
            Some(b"x".to_vec())
        );
        assert_eq!(
            encode_key_simple(&Key::parse("<Enter>").unwrap()),
            Some(b"\n".to_vec())
        );
        assert_eq!(encode_key_simple(&Key::parse("<Up>").unwrap()), None);
        assert_eq!(encode_key_simple(&Key::parse("<F3>").unwrap()), None);
    }

    #[test]
    fn test_sgr_mouse() {
        let press = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 4,
            row: 9,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(encode_mouse_event(&press), b"\x1b[<0;5;10M");

        let release = MouseEvent {
            kind: MouseEventKind::Up(MouseButton::Left),
            ..press
        };
        assert_eq!(encode_mouse_event(&release), b"\x1b[<0;5;10m");

        let scroll = MouseEvent {
            kind: MouseEventKind::ScrollUp,
            ..press
        };
        assert_eq!(encode_mouse_event(&scroll), b"\x1b[<64;5;10M");
    }
}
