// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Key model shared by keymaps, the input codec, and the remote control
//! protocol.
//!
//! A [`Key`] is a crossterm key code plus a modifier mask, with a textual
//! form (`<C-a>`, `<S-Tab>`, `q`) used in keymap definitions, `send-keys`
//! stop declarations, and `{c: send-key, key: ...}` remote commands.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Key {
    code: KeyCode,
    mods: KeyModifiers,
}

impl Key {
    #[must_use]
    pub fn new(code: KeyCode, mods: KeyModifiers) -> Self {
        let mods = match code {
            // Shift is implied by an uppercase/shifted character; keeping the
            // bit would make `X` and `<S-X>` distinct keymap entries.
            KeyCode::Char(_) => mods.difference(KeyModifiers::SHIFT),
            _ => mods,
        };
        Self { code, mods }
    }

    #[must_use]
    pub fn plain(code: KeyCode) -> Self { Self::new(code, KeyModifiers::NONE) }

    #[must_use]
    pub fn code(&self) -> KeyCode { self.code }

    #[must_use]
    pub fn mods(&self) -> KeyModifiers { self.mods }

    /// Parse a key spec: a bare character (`q`) or an angle-bracket form
    /// with optional `C-`/`S-`/`M-` modifier prefixes (`<C-a>`, `<S-Tab>`).
    ///
    /// # Errors
    ///
    /// Returns an error when the spec names no known key.
    pub fn parse(text: &str) -> miette::Result<Key> {
        let mut chars = text.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            return Ok(Key::plain(KeyCode::Char(ch)));
        }

        let inner = text
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or_else(|| miette::miette!("Invalid key spec: '{}'", text))?;

        let mut mods = KeyModifiers::NONE;
        let mut rest = inner;
        loop {
            rest = match rest.split_at_checked(2) {
                Some(("C-", tail)) => {
                    mods |= KeyModifiers::CONTROL;
                    tail
                }
                Some(("S-", tail)) => {
                    mods |= KeyModifiers::SHIFT;
                    tail
                }
                Some(("M-", tail)) => {
                    mods |= KeyModifiers::ALT;
                    tail
                }
                _ => break,
            };
        }

        let code = parse_code(rest)
            .ok_or_else(|| miette::miette!("Unknown key '{}' in spec '{}'", rest, text))?;
        Ok(Key::new(code, mods))
    }
}

fn parse_code(name: &str) -> Option<KeyCode> {
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return Some(KeyCode::Char(ch));
    }

    let code = match name.to_ascii_lowercase().as_str() {
        "bs" | "backspace" => KeyCode::Backspace,
        "enter" | "cr" => KeyCode::Enter,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        "tab" => KeyCode::Tab,
        "backtab" => KeyCode::BackTab,
        "del" | "delete" => KeyCode::Delete,
        "insert" | "ins" => KeyCode::Insert,
        "nul" => KeyCode::Null,
        "esc" => KeyCode::Esc,
        "space" => KeyCode::Char(' '),
        "lt" => KeyCode::Char('<'),
        "gt" => KeyCode::Char('>'),
        "minus" => KeyCode::Char('-'),
        _ => {
            let n = name.strip_prefix(['f', 'F'])?.parse::<u8>().ok()?;
            if (1..=12).contains(&n) {
                KeyCode::F(n)
            } else {
                return None;
            }
        }
    };
    Some(code)
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Bare printable characters without modifiers need no brackets.
        if self.mods.is_empty() {
            if let KeyCode::Char(ch) = self.code {
                if !matches!(ch, ' ' | '<' | '>' | '-') {
                    return write!(f, "{ch}");
                }
            }
        }

        write!(f, "<")?;
        if self.mods.contains(KeyModifiers::CONTROL) {
            write!(f, "C-")?;
        }
        if self.mods.contains(KeyModifiers::SHIFT) {
            write!(f, "S-")?;
        }
        if self.mods.contains(KeyModifiers::ALT) {
            write!(f, "M-")?;
        }
        match self.code {
            KeyCode::Backspace => write!(f, "BS")?,
            KeyCode::Enter => write!(f, "Enter")?,
            KeyCode::Left => write!(f, "Left")?,
            KeyCode::Right => write!(f, "Right")?,
            KeyCode::Up => write!(f, "Up")?,
            KeyCode::Down => write!(f, "Down")?,
            KeyCode::Home => write!(f, "Home")?,
            KeyCode::End => write!(f, "End")?,
            KeyCode::PageUp => write!(f, "PageUp")?,
            KeyCode::PageDown => write!(f, "PageDown")?,
            KeyCode::Tab => write!(f, "Tab")?,
            KeyCode::BackTab => write!(f, "BackTab")?,
            KeyCode::Delete => write!(f, "Del")?,
            KeyCode::Insert => write!(f, "Insert")?,
            KeyCode::Null => write!(f, "Nul")?,
            KeyCode::Esc => write!(f, "Esc")?,
            KeyCode::F(n) => write!(f, "F{n}")?,
            KeyCode::Char(' ') => write!(f, "Space")?,
            KeyCode::Char('<') => write!(f, "LT")?,
            KeyCode::Char('>') => write!(f, "GT")?,
            KeyCode::Char('-') => write!(f, "Minus")?,
            KeyCode::Char(ch) => write!(f, "{ch}")?,
            other => write!(f, "{other:?}")?,
        }
        write!(f, ">")
    }
}

impl From<KeyEvent> for Key {
    fn from(event: KeyEvent) -> Self { Key::new(event.code, event.modifiers) }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Key::parse(&text).map_err(|e| de::Error::custom(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_char() {
        assert_eq!(Key::parse("q").unwrap(), Key::plain(KeyCode::Char('q')));
        assert_eq!(Key::parse("й").unwrap(), Key::plain(KeyCode::Char('й')));
    }

    #[test]
    fn test_parse_modifiers() {
        assert_eq!(
            Key::parse("<C-a>").unwrap(),
            Key::new(KeyCode::Char('a'), KeyModifiers::CONTROL)
        );
        assert_eq!(
            Key::parse("<C-M-Up>").unwrap(),
            Key::new(KeyCode::Up, KeyModifiers::CONTROL | KeyModifiers::ALT)
        );
        assert_eq!(
            Key::parse("<S-Tab>").unwrap(),
            Key::new(KeyCode::Tab, KeyModifiers::SHIFT)
        );
    }

    #[test]
    fn test_parse_named_keys() {
        assert_eq!(Key::parse("<Enter>").unwrap(), Key::plain(KeyCode::Enter));
        assert_eq!(Key::parse("<Space>").unwrap(), Key::plain(KeyCode::Char(' ')));
        assert_eq!(Key::parse("<F5>").unwrap(), Key::plain(KeyCode::F(5)));
        assert_eq!(Key::parse("<pagedown>").unwrap(), Key::plain(KeyCode::PageDown));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Key::parse("<NoSuchKey>").is_err());
        assert!(Key::parse("<F99>").is_err());
        assert!(Key::parse("ab").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for spec in ["q", "<C-a>", "<C-S-M-Left>", "<Enter>", "<Space>", "<F12>", "<M-x>"] {
            let key = Key::parse(spec).unwrap();
            assert_eq!(Key::parse(&key.to_string()).unwrap(), key);
        }
    }

    #[test]
    fn test_shift_dropped_for_chars() {
        let from_event = Key::from(KeyEvent::new(KeyCode::Char('Q'), KeyModifiers::SHIFT));
        assert_eq!(from_event, Key::plain(KeyCode::Char('Q')));
    }

    #[test]
    fn test_serde_as_string() {
        let key = Key::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let yaml = serde_yaml::to_string(&key).unwrap();
        assert_eq!(yaml.trim(), "<C-c>");
        let back: Key = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, key);
    }
}
