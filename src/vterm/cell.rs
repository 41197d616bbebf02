// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Cell, color, and style types for the in-memory screen grid.

/// Color of a cell's foreground or background.
///
/// `Default` means "whatever the painter's reset color is" and is distinct
/// from any palette entry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Color {
    #[default]
    Default,
    /// 8/16/256-color palette index.
    Indexed(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

/// Style attribute bitmask for one cell.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StyleFlags(u16);

impl StyleFlags {
    pub const BOLD: StyleFlags = StyleFlags(1 << 0);
    pub const DIM: StyleFlags = StyleFlags(1 << 1);
    pub const ITALIC: StyleFlags = StyleFlags(1 << 2);
    pub const UNDERLINE: StyleFlags = StyleFlags(1 << 3);
    pub const INVERSE: StyleFlags = StyleFlags(1 << 4);
    pub const HIDDEN: StyleFlags = StyleFlags(1 << 5);
    pub const STRIKETHROUGH: StyleFlags = StyleFlags(1 << 6);
    pub const BLINK: StyleFlags = StyleFlags(1 << 7);
    /// Marks the trailing half of a double-width character; the scalar
    /// itself lives in the preceding cell.
    pub const WIDE_CONTINUATION: StyleFlags = StyleFlags(1 << 8);

    #[must_use]
    pub const fn empty() -> Self { StyleFlags(0) }

    #[must_use]
    pub const fn contains(self, other: StyleFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: StyleFlags) { self.0 |= other.0; }

    pub fn remove(&mut self, other: StyleFlags) { self.0 &= !other.0; }

    pub fn set(&mut self, other: StyleFlags, on: bool) {
        if on {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool { self.0 == 0 }
}

/// One cell of the screen grid: a Unicode scalar plus its colors and style.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
    pub attrs: StyleFlags,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::Default,
            bg: Color::Default,
            attrs: StyleFlags::empty(),
        }
    }
}

impl Cell {
    /// A blank cell carrying the given background (erase honors the current
    /// background color, per BCE).
    #[must_use]
    pub fn blank(bg: Color) -> Self {
        Self {
            bg,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_wide_continuation(&self) -> bool {
        self.attrs.contains(StyleFlags::WIDE_CONTINUATION)
    }
}

/// The attributes applied to newly printed cells; mutated by SGR sequences.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Pen {
    pub fg: Color,
    pub bg: Color,
    pub attrs: StyleFlags,
}

impl Pen {
    #[must_use]
    pub fn cell(&self, ch: char) -> Cell {
        Cell {
            ch,
            fg: self.fg,
            bg: self.bg,
            attrs: self.attrs,
        }
    }

    pub fn reset(&mut self) { *self = Pen::default(); }
}

/// Zero-based cursor/grid position.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Pos {
    pub row: u16,
    pub col: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_flags_ops() {
        let mut attrs = StyleFlags::empty();
        assert!(attrs.is_empty());

        attrs.insert(StyleFlags::BOLD);
        attrs.insert(StyleFlags::UNDERLINE);
        assert!(attrs.contains(StyleFlags::BOLD));
        assert!(attrs.contains(StyleFlags::UNDERLINE));
        assert!(!attrs.contains(StyleFlags::ITALIC));

        attrs.remove(StyleFlags::BOLD);
        assert!(!attrs.contains(StyleFlags::BOLD));

        attrs.set(StyleFlags::INVERSE, true);
        assert!(attrs.contains(StyleFlags::INVERSE));
        attrs.set(StyleFlags::INVERSE, false);
        assert!(!attrs.contains(StyleFlags::INVERSE));
    }

    #[test]
    fn test_blank_cell_keeps_background() {
        let blank = Cell::blank(Color::Indexed(4));
        assert_eq!(blank.ch, ' ');
        assert_eq!(blank.fg, Color::Default);
        assert_eq!(blank.bg, Color::Indexed(4));
        assert!(blank.attrs.is_empty());
    }

    #[test]
    fn test_pen_stamps_cells() {
        let pen = Pen {
            fg: Color::Rgb(1, 2, 3),
            bg: Color::Indexed(7),
            attrs: StyleFlags::BOLD,
        };
        let cell = pen.cell('x');
        assert_eq!(cell.ch, 'x');
        assert_eq!(cell.fg, Color::Rgb(1, 2, 3));
        assert_eq!(cell.bg, Color::Indexed(7));
        assert!(cell.attrs.contains(StyleFlags::BOLD));
    }
}
