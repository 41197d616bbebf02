// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Public surface of the in-memory terminal emulator.
//!
//! A [`VTerm`] couples a `vte` parser with a [`Screen`] grid. Feeding bytes
//! with [`VTerm::write`] always consumes the whole buffer and leaves the
//! grid in the state a VT-100/xterm-style terminal would show; responses the
//! child expects (device status reports) are emitted through the output
//! callback.

use vte::Parser;

use super::{cell::{Cell, Pos},
            screen::{DamageRect, MouseProtocolMode, Prop, Screen}};

/// Default bound for the scrollback ring, in lines.
pub const DEFAULT_SCROLLBACK: usize = 1000;

pub struct VTerm {
    parser: Parser,
    screen: Screen,
}

impl std::fmt::Debug for VTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VTerm").field("screen", &self.screen).finish()
    }
}

impl VTerm {
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        Self::with_scrollback(rows, cols, DEFAULT_SCROLLBACK)
    }

    #[must_use]
    pub fn with_scrollback(rows: u16, cols: u16, scrollback_limit: usize) -> Self {
        Self {
            parser: Parser::new(),
            screen: Screen::new(rows, cols, scrollback_limit),
        }
    }

    /// Parse a chunk of child output into the screen. All bytes are
    /// consumed; damage/prop/scrollback callbacks fire as mutations commit,
    /// and the cursor-moved callback fires once at the end if the cursor
    /// ended up elsewhere.
    pub fn write(&mut self, bytes: &[u8]) {
        let before = self.screen.cursor_pos();
        for &byte in bytes {
            self.parser.advance(&mut self.screen, byte);
        }
        let after = self.screen.cursor_pos();
        if before != after {
            if let Some(cb) = self.screen.callbacks.cursor_moved.as_mut() {
                cb(after);
            }
        }
    }

    /// Resize the grid; content is preserved relative to the cursor, long
    /// lines are truncated at the right edge, and the cursor is clamped.
    pub fn set_size(&mut self, rows: u16, cols: u16) { self.screen.set_size(rows, cols); }

    #[must_use]
    pub fn screen(&self) -> &Screen { &self.screen }

    // ------------------------------------------------------------------
    // Scrollback view.
    // ------------------------------------------------------------------

    pub fn scroll_view_up(&mut self, lines: usize) {
        let offset = self.screen.scrollback_offset().saturating_add(lines);
        self.screen.set_scrollback_offset(offset);
    }

    pub fn scroll_view_down(&mut self, lines: usize) {
        let offset = self.screen.scrollback_offset().saturating_sub(lines);
        self.screen.set_scrollback_offset(offset);
    }

    pub fn reset_view(&mut self) { self.screen.set_scrollback_offset(0); }

    // ------------------------------------------------------------------
    // Callback slots.
    // ------------------------------------------------------------------

    /// Bytes the emulator wants written back to the child (DSR replies).
    pub fn set_output_callback(&mut self, f: impl FnMut(&[u8]) + 'static) {
        self.screen.callbacks.output = Some(Box::new(f));
    }

    pub fn set_damage_callback(&mut self, f: impl FnMut(DamageRect) + 'static) {
        self.screen.callbacks.damage = Some(Box::new(f));
    }

    pub fn set_cursor_moved_callback(&mut self, f: impl FnMut(Pos) + 'static) {
        self.screen.callbacks.cursor_moved = Some(Box::new(f));
    }

    pub fn set_rect_moved_callback(&mut self, f: impl FnMut(DamageRect, i16) + 'static) {
        self.screen.callbacks.rect_moved = Some(Box::new(f));
    }

    pub fn set_prop_changed_callback(&mut self, f: impl FnMut(&Prop) + 'static) {
        self.screen.callbacks.prop_changed = Some(Box::new(f));
    }

    pub fn set_sb_push_callback(&mut self, f: impl FnMut(&[Cell]) + 'static) {
        self.screen.callbacks.sb_push = Some(Box::new(f));
    }

    pub fn set_sb_pop_callback(&mut self, f: impl FnMut(&[Cell]) + 'static) {
        self.screen.callbacks.sb_pop = Some(Box::new(f));
    }

    // ------------------------------------------------------------------
    // Convenience accessors used by the supervisor and painter.
    // ------------------------------------------------------------------

    #[must_use]
    pub fn mouse_protocol(&self) -> MouseProtocolMode { self.screen.mouse_protocol() }

    #[must_use]
    pub fn application_cursor_keys(&self) -> bool { self.screen.application_cursor_keys() }

    #[must_use]
    pub fn title(&self) -> &str { self.screen.title() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vterm::cell::{Color, StyleFlags};
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, rc::Rc};

    fn grid_text(vt: &VTerm) -> Vec<String> {
        (0..vt.screen().rows())
            .map(|r| {
                (0..vt.screen().cols())
                    .filter_map(|c| vt.screen().cell(r, c))
                    .filter(|cell| !cell.is_wide_continuation())
                    .map(|cell| cell.ch)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_plain_text_lands_on_grid() {
        let mut vt = VTerm::new(3, 10);
        vt.write(b"hi\r\nthere");
        assert_eq!(grid_text(&vt), vec!["hi        ", "there     ", "          "]);
    }

    #[test]
    fn test_utf8_passes_through() {
        let mut vt = VTerm::new(2, 10);
        vt.write("héllo →".as_bytes());
        assert_eq!(vt.screen().cell(0, 1).unwrap().ch, 'é');
        assert_eq!(vt.screen().cell(0, 6).unwrap().ch, '→');
    }

    #[test]
    fn test_cursor_movement_sequences() {
        let mut vt = VTerm::new(5, 20);
        vt.write(b"\x1b[3;5Hx");
        assert_eq!(vt.screen().cell(2, 4).unwrap().ch, 'x');

        vt.write(b"\x1b[2A\x1b[3Dy");
        assert_eq!(vt.screen().cell(0, 2).unwrap().ch, 'y');
    }

    #[test]
    fn test_sgr_colors_and_attrs() {
        let mut vt = VTerm::new(2, 20);
        vt.write(b"\x1b[1;31;44mA\x1b[0mB");

        let styled = vt.screen().cell(0, 0).unwrap();
        assert_eq!(styled.fg, Color::Indexed(1));
        assert_eq!(styled.bg, Color::Indexed(4));
        assert!(styled.attrs.contains(StyleFlags::BOLD));

        let plain = vt.screen().cell(0, 1).unwrap();
        assert_eq!(plain.fg, Color::Default);
        assert_eq!(plain.bg, Color::Default);
        assert!(plain.attrs.is_empty());
    }

    #[test]
    fn test_sgr_extended_colors() {
        let mut vt = VTerm::new(2, 20);
        vt.write(b"\x1b[38;5;196ma\x1b[48;2;10;20;30mb\x1b[38:5:21mc");
        assert_eq!(vt.screen().cell(0, 0).unwrap().fg, Color::Indexed(196));
        assert_eq!(vt.screen().cell(0, 1).unwrap().bg, Color::Rgb(10, 20, 30));
        assert_eq!(vt.screen().cell(0, 2).unwrap().fg, Color::Indexed(21));
    }

    #[test]
    fn test_bright_palette() {
        let mut vt = VTerm::new(2, 10);
        vt.write(b"\x1b[91mx\x1b[102my");
        assert_eq!(vt.screen().cell(0, 0).unwrap().fg, Color::Indexed(9));
        assert_eq!(vt.screen().cell(0, 1).unwrap().bg, Color::Indexed(10));
    }

    #[test]
    fn test_erase_and_edit_sequences() {
        let mut vt = VTerm::new(2, 10);
        vt.write(b"abcdefghij\x1b[1;4H\x1b[K");
        assert_eq!(grid_text(&vt)[0], "abc       ");

        vt.write(b"\x1b[1;1H\x1b[2Ppp");
        assert_eq!(grid_text(&vt)[0], "cpp       ");
    }

    #[test]
    fn test_osc_title() {
        let mut vt = VTerm::new(2, 10);
        vt.write(b"\x1b]2;my title\x07");
        assert_eq!(vt.title(), "my title");

        vt.write(b"\x1b]0;both\x1b\\");
        assert_eq!(vt.title(), "both");
        assert_eq!(vt.screen().icon_name(), "both");
    }

    #[test]
    fn test_alt_screen_round_trip() {
        let mut vt = VTerm::new(3, 10);
        vt.write(b"main");
        vt.write(b"\x1b[?1049h");
        assert!(vt.screen().alt_screen());
        vt.write(b"alt!");
        assert_eq!(grid_text(&vt)[0], "alt!      ");

        vt.write(b"\x1b[?1049l");
        assert!(!vt.screen().alt_screen());
        assert_eq!(grid_text(&vt)[0], "main      ");
        // Cursor restored to where it was on the primary screen.
        assert_eq!(vt.screen().cursor_pos(), Pos { row: 0, col: 4 });
    }

    #[test]
    fn test_private_modes_tracked() {
        let mut vt = VTerm::new(2, 10);
        vt.write(b"\x1b[?1h\x1b[?1000h\x1b[?1006h\x1b[?2004h\x1b[?25l");
        assert!(vt.application_cursor_keys());
        assert_eq!(vt.mouse_protocol(), MouseProtocolMode::PressRelease);
        assert!(vt.screen().sgr_mouse());
        assert!(vt.screen().bracketed_paste());
        assert!(!vt.screen().cursor_visible());
    }

    #[test]
    fn test_dsr_cursor_report_via_output_callback() {
        let mut vt = VTerm::new(5, 20);
        let out: Rc<RefCell<Vec<u8>>> = Rc::default();
        let sink = out.clone();
        vt.set_output_callback(move |bytes| sink.borrow_mut().extend_from_slice(bytes));

        vt.write(b"\x1b[4;7H\x1b[6n");
        assert_eq!(&*out.borrow(), b"\x1b[4;7R");
    }

    #[test]
    fn test_scroll_region_and_scrollback() {
        let mut vt = VTerm::new(4, 10);
        vt.write(b"a\r\nb\r\nc\r\nd");
        // Full-screen scroll pushes history.
        vt.write(b"\r\ne");
        assert_eq!(vt.screen().scrollback_len(), 1);

        // A region not anchored at the top must not feed scrollback.
        vt.write(b"\x1b[2;3r\x1b[2;1H\r\n\r\n\r\n");
        assert_eq!(vt.screen().scrollback_len(), 1);
        vt.write(b"\x1b[r");
    }

    #[test]
    fn test_unknown_sequences_consumed_silently() {
        let mut vt = VTerm::new(2, 10);
        vt.write(b"a\x1b[?9999h\x1b[>1u\x1bP+q544e\x1b\\b");
        assert_eq!(grid_text(&vt)[0], "ab        ");
    }

    /// `write(A); write(B)` must equal `write(A ++ B)` for any split point,
    /// including splits inside escape sequences and UTF-8 scalars.
    #[test]
    fn test_write_split_equivalence() {
        let stream: &[u8] =
            "x\x1b[2;3Hyé\x1b[1;31mz\x1b]2;t\x07→\x1b[?1049h!\x1b[?1049l".as_bytes();

        let mut whole = VTerm::new(4, 12);
        whole.write(stream);
        let reference = grid_text(&whole);
        let cursor = whole.screen().cursor_pos();

        for split in 0..=stream.len() {
            let mut parts = VTerm::new(4, 12);
            parts.write(&stream[..split]);
            parts.write(&stream[split..]);
            assert_eq!(grid_text(&parts), reference, "split at {split}");
            assert_eq!(parts.screen().cursor_pos(), cursor, "split at {split}");
        }
    }

    /// After any write, the cursor stays in bounds and every in-grid cell
    /// is addressable.
    #[test]
    fn test_cursor_bounds_and_cell_totality() {
        let nasty: &[&[u8]] = &[
            b"\x1b[999;999H",
            b"\x1b[999B",
            b"\x1b[999C",
            b"\r\n\r\n\r\n\r\n\r\n\r\n",
            b"wide:\xe4\xbd\xa0\xe5\xa5\xbd",
            b"\x1b[999A\x1b[999D",
            b"\x1b[2J\x1b[H",
            b"\x1b[5;2r\x1b[999;999H",
        ];
        let mut vt = VTerm::new(5, 8);
        for bytes in nasty {
            vt.write(bytes);
            let pos = vt.screen().cursor_pos();
            assert!(pos.row < 5, "row {} out of bounds", pos.row);
            assert!(pos.col < 8, "col {} out of bounds", pos.col);
            for r in 0..5 {
                for c in 0..8 {
                    assert!(vt.screen().cell(r, c).is_some());
                }
            }
        }
    }

    #[test]
    fn test_scrollback_stays_bounded() {
        let mut vt = VTerm::with_scrollback(2, 4, 10);
        for _ in 0..100 {
            vt.write(b"line\r\n");
        }
        assert!(vt.screen().scrollback_len() <= 10);
    }

    #[test]
    fn test_damage_callback_counts() {
        let mut vt = VTerm::new(3, 10);
        let count: Rc<RefCell<usize>> = Rc::default();
        let sink = count.clone();
        vt.set_damage_callback(move |_| *sink.borrow_mut() += 1);

        vt.write(b"abc");
        assert_eq!(*count.borrow(), 3);
    }

    #[test]
    fn test_cursor_moved_fires_once_per_write() {
        let mut vt = VTerm::new(3, 10);
        let moves: Rc<RefCell<Vec<Pos>>> = Rc::default();
        let sink = moves.clone();
        vt.set_cursor_moved_callback(move |pos| sink.borrow_mut().push(pos));

        vt.write(b"abc\x1b[2;2H");
        assert_eq!(&*moves.borrow(), &[Pos { row: 1, col: 1 }]);

        // No movement, no callback.
        vt.write(b"\x1b[2;2H");
        assert_eq!(moves.borrow().len(), 1);
    }

    #[test]
    fn test_dec_graphics_charset() {
        let mut vt = VTerm::new(2, 10);
        vt.write(b"\x1b(0qqx\x1b(Bq");
        assert_eq!(vt.screen().cell(0, 0).unwrap().ch, '─');
        assert_eq!(vt.screen().cell(0, 2).unwrap().ch, '│');
        assert_eq!(vt.screen().cell(0, 3).unwrap().ch, 'q');
    }
}
