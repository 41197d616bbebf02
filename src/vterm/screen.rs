// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! The screen grid behind the VT parser: cell storage, cursor, scroll
//! region, alternate screen, scrollback ring, and damage accounting.
//!
//! Every mutation computes a damage rectangle clipped to the grid and fires
//! the damage callback *after* the mutation is committed. Scroll-up in the
//! main screen evicts the top line into the scrollback ring (bounded by
//! `scrollback_limit`); scroll-down reclaims lines from the ring. The
//! alternate screen never touches scrollback.

use std::collections::VecDeque;

use unicode_width::UnicodeWidthChar;

use super::cell::{Cell, Pen, Pos, StyleFlags};

pub type Line = Vec<Cell>;

/// A changed region of the grid; `row_end`/`col_end` are exclusive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DamageRect {
    pub row_start: u16,
    pub col_start: u16,
    pub row_end: u16,
    pub col_end: u16,
}

/// Mouse reporting mode requested by the child via DECSET.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MouseProtocolMode {
    #[default]
    None,
    /// 1000: report press and release.
    PressRelease,
    /// 1002: press/release plus drag motion.
    ButtonMotion,
    /// 1003: all motion.
    AnyMotion,
}

/// A terminal property change observable by the host.
#[derive(Clone, Debug, PartialEq)]
pub enum Prop {
    Title(String),
    IconName(String),
    AltScreen(bool),
    CursorVisible(bool),
    MouseProtocol(MouseProtocolMode),
    SgrMouse(bool),
    BracketedPaste(bool),
    ApplicationCursorKeys(bool),
}

#[derive(Default)]
pub(crate) struct Callbacks {
    pub damage: Option<Box<dyn FnMut(DamageRect)>>,
    pub cursor_moved: Option<Box<dyn FnMut(Pos)>>,
    pub rect_moved: Option<Box<dyn FnMut(DamageRect, i16)>>,
    pub prop_changed: Option<Box<dyn FnMut(&Prop)>>,
    pub sb_push: Option<Box<dyn FnMut(&[Cell])>>,
    pub sb_pop: Option<Box<dyn FnMut(&[Cell])>>,
    pub output: Option<Box<dyn FnMut(&[u8])>>,
}

#[derive(Clone, Copy, Debug, Default)]
struct SavedCursor {
    pos: Pos,
    pen: Pen,
}

pub struct Screen {
    rows: u16,
    cols: u16,
    grid: Vec<Line>,
    /// Primary grid stashed away while the alternate screen is active.
    saved_primary: Option<Vec<Line>>,

    cursor: Pos,
    saved_cursor: Option<SavedCursor>,
    pub(crate) pen: Pen,
    /// DECAWM deferred wrap: set after printing into the last column, so the
    /// cursor never leaves `[0, cols)`.
    pending_wrap: bool,

    /// Inclusive scroll region bounds.
    scroll_top: u16,
    scroll_bottom: u16,

    tabs: Vec<bool>,

    scrollback: VecDeque<Line>,
    scrollback_limit: usize,
    /// View offset in lines; 0 shows the live grid.
    scrollback_offset: usize,

    // Terminal properties.
    title: String,
    icon_name: String,
    alt_screen: bool,
    cursor_visible: bool,
    autowrap: bool,
    application_cursor_keys: bool,
    mouse_protocol: MouseProtocolMode,
    sgr_mouse: bool,
    bracketed_paste: bool,
    pub(crate) dec_graphics: bool,

    pub(crate) callbacks: Callbacks,
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("cursor", &self.cursor)
            .field("alt_screen", &self.alt_screen)
            .field("scrollback_len", &self.scrollback.len())
            .finish()
    }
}

fn blank_grid(rows: u16, cols: u16) -> Vec<Line> {
    vec![vec![Cell::default(); cols as usize]; rows as usize]
}

fn default_tabs(cols: u16) -> Vec<bool> {
    (0..cols).map(|c| c % 8 == 0).collect()
}

impl Screen {
    #[must_use]
    pub fn new(rows: u16, cols: u16, scrollback_limit: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            rows,
            cols,
            grid: blank_grid(rows, cols),
            saved_primary: None,
            cursor: Pos::default(),
            saved_cursor: None,
            pen: Pen::default(),
            pending_wrap: false,
            scroll_top: 0,
            scroll_bottom: rows - 1,
            tabs: default_tabs(cols),
            scrollback: VecDeque::new(),
            scrollback_limit,
            scrollback_offset: 0,
            title: String::new(),
            icon_name: String::new(),
            alt_screen: false,
            cursor_visible: true,
            autowrap: true,
            application_cursor_keys: false,
            mouse_protocol: MouseProtocolMode::None,
            sgr_mouse: false,
            bracketed_paste: false,
            dec_graphics: false,
            callbacks: Callbacks::default(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors.
    // ------------------------------------------------------------------

    #[must_use]
    pub fn rows(&self) -> u16 { self.rows }

    #[must_use]
    pub fn cols(&self) -> u16 { self.cols }

    #[must_use]
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.grid.get(row as usize)?.get(col as usize)
    }

    /// Cell at a view position, accounting for the scrollback offset: the
    /// top `offset` visible rows come from the tail of the scrollback ring.
    #[must_use]
    pub fn visible_cell(&self, row: u16, col: u16) -> Option<&Cell> {
        let offset = self.scrollback_offset;
        let row = row as usize;
        if row < offset {
            let from_tail = offset - row;
            let idx = self.scrollback.len().checked_sub(from_tail)?;
            self.scrollback.get(idx)?.get(col as usize)
        } else {
            self.grid.get(row - offset)?.get(col as usize)
        }
    }

    #[must_use]
    pub fn cursor_pos(&self) -> Pos { self.cursor }

    #[must_use]
    pub fn cursor_visible(&self) -> bool { self.cursor_visible }

    #[must_use]
    pub fn title(&self) -> &str { &self.title }

    #[must_use]
    pub fn icon_name(&self) -> &str { &self.icon_name }

    #[must_use]
    pub fn alt_screen(&self) -> bool { self.alt_screen }

    #[must_use]
    pub fn application_cursor_keys(&self) -> bool { self.application_cursor_keys }

    #[must_use]
    pub fn mouse_protocol(&self) -> MouseProtocolMode { self.mouse_protocol }

    #[must_use]
    pub fn sgr_mouse(&self) -> bool { self.sgr_mouse }

    #[must_use]
    pub fn bracketed_paste(&self) -> bool { self.bracketed_paste }

    #[must_use]
    pub fn scrollback_len(&self) -> usize { self.scrollback.len() }

    #[must_use]
    pub fn scrollback_offset(&self) -> usize { self.scrollback_offset }

    // ------------------------------------------------------------------
    // Damage and callback plumbing.
    // ------------------------------------------------------------------

    fn fire_damage(&mut self, row_start: u16, col_start: u16, row_end: u16, col_end: u16) {
        let rect = DamageRect {
            row_start: row_start.min(self.rows),
            col_start: col_start.min(self.cols),
            row_end: row_end.min(self.rows),
            col_end: col_end.min(self.cols),
        };
        if rect.row_start >= rect.row_end || rect.col_start >= rect.col_end {
            return;
        }
        if let Some(cb) = self.callbacks.damage.as_mut() {
            cb(rect);
        }
    }

    fn damage_rows(&mut self, row_start: u16, row_end: u16) {
        let cols = self.cols;
        self.fire_damage(row_start, 0, row_end, cols);
    }

    pub(crate) fn damage_all(&mut self) {
        let (rows, cols) = (self.rows, self.cols);
        self.fire_damage(0, 0, rows, cols);
    }

    fn fire_prop(&mut self, prop: Prop) {
        if let Some(cb) = self.callbacks.prop_changed.as_mut() {
            cb(&prop);
        }
    }

    pub(crate) fn respond(&mut self, bytes: &[u8]) {
        if let Some(cb) = self.callbacks.output.as_mut() {
            cb(bytes);
        }
    }

    // ------------------------------------------------------------------
    // Printing.
    // ------------------------------------------------------------------

    pub(crate) fn print_char(&mut self, ch: char) {
        let width = match ch.width() {
            Some(w @ 1..) => w as u16,
            // Zero-width scalars (combining marks) are not stored; the grid
            // holds one scalar per cell.
            _ => return,
        };

        if self.pending_wrap && self.autowrap {
            self.carriage_return();
            self.linefeed();
        }
        self.pending_wrap = false;

        // A wide character that does not fit in the line wraps early (or
        // sticks to the edge when autowrap is off).
        if self.cursor.col + width > self.cols {
            if self.autowrap {
                self.carriage_return();
                self.linefeed();
            } else {
                self.cursor.col = self.cols - width.min(self.cols);
            }
        }

        let row = self.cursor.row;
        let col = self.cursor.col;
        let cell = self.pen.cell(ch);
        self.put_cell(row, col, cell);
        if width == 2 && col + 1 < self.cols {
            let mut cont = self.pen.cell(' ');
            cont.attrs.insert(StyleFlags::WIDE_CONTINUATION);
            self.put_cell(row, col + 1, cont);
        }
        self.fire_damage(row, col, row + 1, col + width);

        if col + width >= self.cols {
            self.cursor.col = self.cols - 1;
            self.pending_wrap = true;
        } else {
            self.cursor.col = col + width;
        }
    }

    fn put_cell(&mut self, row: u16, col: u16, cell: Cell) {
        if let Some(slot) = self
            .grid
            .get_mut(row as usize)
            .and_then(|line| line.get_mut(col as usize))
        {
            *slot = cell;
        }
    }

    // ------------------------------------------------------------------
    // Cursor movement.
    // ------------------------------------------------------------------

    fn clamp_row(&self, row: u16) -> u16 { row.min(self.rows - 1) }

    fn clamp_col(&self, col: u16) -> u16 { col.min(self.cols - 1) }

    pub(crate) fn cursor_up(&mut self, n: u16) {
        self.pending_wrap = false;
        // Stop at the top margin when starting inside the region.
        let limit = if self.cursor.row >= self.scroll_top { self.scroll_top } else { 0 };
        self.cursor.row = self.cursor.row.saturating_sub(n.max(1)).max(limit);
    }

    pub(crate) fn cursor_down(&mut self, n: u16) {
        self.pending_wrap = false;
        let limit = if self.cursor.row <= self.scroll_bottom {
            self.scroll_bottom
        } else {
            self.rows - 1
        };
        self.cursor.row = self.cursor.row.saturating_add(n.max(1)).min(limit);
    }

    pub(crate) fn cursor_forward(&mut self, n: u16) {
        self.pending_wrap = false;
        self.cursor.col = self.clamp_col(self.cursor.col.saturating_add(n.max(1)));
    }

    pub(crate) fn cursor_backward(&mut self, n: u16) {
        self.pending_wrap = false;
        self.cursor.col = self.cursor.col.saturating_sub(n.max(1));
    }

    pub(crate) fn cursor_to(&mut self, row: u16, col: u16) {
        self.pending_wrap = false;
        self.cursor = Pos {
            row: self.clamp_row(row),
            col: self.clamp_col(col),
        };
    }

    pub(crate) fn cursor_col(&mut self, col: u16) {
        self.pending_wrap = false;
        self.cursor.col = self.clamp_col(col);
    }

    pub(crate) fn cursor_row(&mut self, row: u16) {
        self.pending_wrap = false;
        self.cursor.row = self.clamp_row(row);
    }

    pub(crate) fn cursor_next_line(&mut self, n: u16) {
        self.cursor_down(n);
        self.cursor.col = 0;
    }

    pub(crate) fn cursor_prev_line(&mut self, n: u16) {
        self.cursor_up(n);
        self.cursor.col = 0;
    }

    pub(crate) fn save_cursor(&mut self) {
        self.saved_cursor = Some(SavedCursor {
            pos: self.cursor,
            pen: self.pen,
        });
    }

    pub(crate) fn restore_cursor(&mut self) {
        let saved = self.saved_cursor.unwrap_or_default();
        self.cursor = Pos {
            row: self.clamp_row(saved.pos.row),
            col: self.clamp_col(saved.pos.col),
        };
        self.pen = saved.pen;
        self.pending_wrap = false;
    }

    // ------------------------------------------------------------------
    // Control characters.
    // ------------------------------------------------------------------

    pub(crate) fn backspace(&mut self) {
        self.pending_wrap = false;
        self.cursor.col = self.cursor.col.saturating_sub(1);
    }

    pub(crate) fn carriage_return(&mut self) {
        self.pending_wrap = false;
        self.cursor.col = 0;
    }

    /// IND: move down one line, scrolling when at the bottom margin.
    pub(crate) fn linefeed(&mut self) {
        self.pending_wrap = false;
        if self.cursor.row == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.rows {
            self.cursor.row += 1;
        }
    }

    /// RI: move up one line, scrolling down when at the top margin.
    pub(crate) fn reverse_linefeed(&mut self) {
        self.pending_wrap = false;
        if self.cursor.row == self.scroll_top {
            self.scroll_down(1);
        } else {
            self.cursor.row = self.cursor.row.saturating_sub(1);
        }
    }

    pub(crate) fn next_line(&mut self) {
        self.linefeed();
        self.cursor.col = 0;
    }

    pub(crate) fn tab_forward(&mut self, n: u16) {
        self.pending_wrap = false;
        for _ in 0..n.max(1) {
            let next = (self.cursor.col + 1..self.cols)
                .find(|&c| self.tabs.get(c as usize).copied().unwrap_or(false));
            self.cursor.col = next.unwrap_or(self.cols - 1);
        }
    }

    pub(crate) fn tab_backward(&mut self, n: u16) {
        self.pending_wrap = false;
        for _ in 0..n.max(1) {
            let prev = (0..self.cursor.col)
                .rev()
                .find(|&c| self.tabs.get(c as usize).copied().unwrap_or(false));
            self.cursor.col = prev.unwrap_or(0);
        }
    }

    pub(crate) fn set_tab_stop(&mut self) {
        if let Some(slot) = self.tabs.get_mut(self.cursor.col as usize) {
            *slot = true;
        }
    }

    pub(crate) fn clear_tab_stop(&mut self, mode: u16) {
        match mode {
            0 => {
                if let Some(slot) = self.tabs.get_mut(self.cursor.col as usize) {
                    *slot = false;
                }
            }
            3 => self.tabs.iter_mut().for_each(|slot| *slot = false),
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Erase operations.
    // ------------------------------------------------------------------

    pub(crate) fn erase_display(&mut self, mode: u16) {
        let blank = Cell::blank(self.pen.bg);
        let (row, col) = (self.cursor.row, self.cursor.col);
        match mode {
            0 => {
                self.erase_line_span(row, col, self.cols, blank);
                for r in row + 1..self.rows {
                    self.erase_line_span(r, 0, self.cols, blank);
                }
                let rows = self.rows;
                self.damage_rows(row, rows);
            }
            1 => {
                for r in 0..row {
                    self.erase_line_span(r, 0, self.cols, blank);
                }
                self.erase_line_span(row, 0, col + 1, blank);
                self.damage_rows(0, row + 1);
            }
            2 => {
                for r in 0..self.rows {
                    self.erase_line_span(r, 0, self.cols, blank);
                }
                self.damage_all();
            }
            3 => {
                self.scrollback.clear();
                self.scrollback_offset = 0;
                self.damage_all();
            }
            _ => {}
        }
    }

    pub(crate) fn erase_line(&mut self, mode: u16) {
        let blank = Cell::blank(self.pen.bg);
        let (row, col) = (self.cursor.row, self.cursor.col);
        let (start, end) = match mode {
            0 => (col, self.cols),
            1 => (0, col + 1),
            2 => (0, self.cols),
            _ => return,
        };
        self.erase_line_span(row, start, end, blank);
        self.fire_damage(row, start, row + 1, end);
    }

    pub(crate) fn erase_chars(&mut self, n: u16) {
        let blank = Cell::blank(self.pen.bg);
        let (row, col) = (self.cursor.row, self.cursor.col);
        let end = col.saturating_add(n.max(1)).min(self.cols);
        self.erase_line_span(row, col, end, blank);
        self.fire_damage(row, col, row + 1, end);
    }

    fn erase_line_span(&mut self, row: u16, col_start: u16, col_end: u16, blank: Cell) {
        if let Some(line) = self.grid.get_mut(row as usize) {
            for col in col_start..col_end.min(self.cols) {
                line[col as usize] = blank;
            }
        }
    }

    // ------------------------------------------------------------------
    // Character and line editing.
    // ------------------------------------------------------------------

    pub(crate) fn insert_chars(&mut self, n: u16) {
        let n = n.max(1).min(self.cols - self.cursor.col) as usize;
        let (row, col) = (self.cursor.row, self.cursor.col);
        let blank = Cell::blank(self.pen.bg);
        if let Some(line) = self.grid.get_mut(row as usize) {
            let tail = col as usize..self.cols as usize;
            line[tail].rotate_right(n);
            for cell in &mut line[col as usize..col as usize + n] {
                *cell = blank;
            }
        }
        let cols = self.cols;
        self.fire_damage(row, col, row + 1, cols);
    }

    pub(crate) fn delete_chars(&mut self, n: u16) {
        let n = n.max(1).min(self.cols - self.cursor.col) as usize;
        let (row, col) = (self.cursor.row, self.cursor.col);
        let blank = Cell::blank(self.pen.bg);
        if let Some(line) = self.grid.get_mut(row as usize) {
            let tail = col as usize..self.cols as usize;
            line[tail].rotate_left(n);
            let from = self.cols as usize - n;
            for cell in &mut line[from..] {
                *cell = blank;
            }
        }
        let cols = self.cols;
        self.fire_damage(row, col, row + 1, cols);
    }

    pub(crate) fn insert_lines(&mut self, n: u16) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let n = n.max(1).min(self.scroll_bottom - row + 1);
        self.shift_lines_down(row, self.scroll_bottom, n);
        let bottom = self.scroll_bottom;
        self.damage_rows(row, bottom + 1);
    }

    pub(crate) fn delete_lines(&mut self, n: u16) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let n = n.max(1).min(self.scroll_bottom - row + 1);
        self.shift_lines_up(row, self.scroll_bottom, n, false);
        let bottom = self.scroll_bottom;
        self.damage_rows(row, bottom + 1);
    }

    // ------------------------------------------------------------------
    // Scrolling.
    // ------------------------------------------------------------------

    /// Scroll the region up by `n` lines; in the primary screen with the
    /// region anchored at the top, evicted lines feed the scrollback ring.
    pub(crate) fn scroll_up(&mut self, n: u16) {
        let n = n.max(1).min(self.scroll_bottom - self.scroll_top + 1);
        let keep_history = !self.alt_screen && self.scroll_top == 0;
        self.shift_lines_up(self.scroll_top, self.scroll_bottom, n, keep_history);
        let (top, bottom, cols) = (self.scroll_top, self.scroll_bottom, self.cols);
        if let Some(cb) = self.callbacks.rect_moved.as_mut() {
            cb(
                DamageRect {
                    row_start: top,
                    col_start: 0,
                    row_end: bottom + 1,
                    col_end: cols,
                },
                -(i16::try_from(n).unwrap_or(i16::MAX)),
            );
        }
        self.damage_rows(top, bottom + 1);
    }

    /// Scroll the region down by `n` lines; in the primary screen with the
    /// region anchored at the top, lines are reclaimed from the scrollback.
    pub(crate) fn scroll_down(&mut self, n: u16) {
        let n = n.max(1).min(self.scroll_bottom - self.scroll_top + 1);
        let reclaim = !self.alt_screen && self.scroll_top == 0;
        for _ in 0..n {
            self.shift_lines_down(self.scroll_top, self.scroll_bottom, 1);
            if reclaim {
                if let Some(mut line) = self.scrollback.pop_back() {
                    if let Some(cb) = self.callbacks.sb_pop.as_mut() {
                        cb(&line);
                    }
                    line.resize(self.cols as usize, Cell::default());
                    self.grid[self.scroll_top as usize] = line;
                }
            }
        }
        let (top, bottom, cols) = (self.scroll_top, self.scroll_bottom, self.cols);
        if let Some(cb) = self.callbacks.rect_moved.as_mut() {
            cb(
                DamageRect {
                    row_start: top,
                    col_start: 0,
                    row_end: bottom + 1,
                    col_end: cols,
                },
                i16::try_from(n).unwrap_or(i16::MAX),
            );
        }
        self.damage_rows(top, bottom + 1);
    }

    fn shift_lines_up(&mut self, top: u16, bottom: u16, n: u16, keep_history: bool) {
        for _ in 0..n {
            let line = self.grid.remove(top as usize);
            if keep_history {
                self.push_scrollback(line);
            }
            self.grid
                .insert(bottom as usize, vec![Cell::blank(self.pen.bg); self.cols as usize]);
        }
    }

    fn shift_lines_down(&mut self, top: u16, bottom: u16, n: u16) {
        for _ in 0..n {
            self.grid.remove(bottom as usize);
            self.grid
                .insert(top as usize, vec![Cell::blank(self.pen.bg); self.cols as usize]);
        }
    }

    fn push_scrollback(&mut self, line: Line) {
        if self.scrollback_limit == 0 {
            return;
        }
        if let Some(cb) = self.callbacks.sb_push.as_mut() {
            cb(&line);
        }
        self.scrollback.push_back(line);
        while self.scrollback.len() > self.scrollback_limit {
            self.scrollback.pop_front();
        }
        // Keep the view anchored on the same history lines.
        if self.scrollback_offset > 0 {
            self.scrollback_offset = (self.scrollback_offset + 1).min(self.scrollback.len());
        }
    }

    pub(crate) fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let top = self.clamp_row(top);
        let bottom = self.clamp_row(bottom);
        if top >= bottom {
            // Degenerate region resets to the full screen.
            self.scroll_top = 0;
            self.scroll_bottom = self.rows - 1;
        } else {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        }
        self.cursor_to(0, 0);
    }

    // ------------------------------------------------------------------
    // Scrollback view.
    // ------------------------------------------------------------------

    /// Set the view offset into scrollback (0 = live grid), clamped to the
    /// ring length. Damages the whole view when the offset changes.
    pub fn set_scrollback_offset(&mut self, offset: usize) {
        let offset = offset.min(self.scrollback.len());
        if offset != self.scrollback_offset {
            self.scrollback_offset = offset;
            self.damage_all();
        }
    }

    // ------------------------------------------------------------------
    // Modes and properties.
    // ------------------------------------------------------------------

    pub(crate) fn set_cursor_visible(&mut self, on: bool) {
        if self.cursor_visible != on {
            self.cursor_visible = on;
            self.fire_prop(Prop::CursorVisible(on));
        }
    }

    pub(crate) fn set_autowrap(&mut self, on: bool) {
        self.autowrap = on;
        if !on {
            self.pending_wrap = false;
        }
    }

    pub(crate) fn set_application_cursor_keys(&mut self, on: bool) {
        if self.application_cursor_keys != on {
            self.application_cursor_keys = on;
            self.fire_prop(Prop::ApplicationCursorKeys(on));
        }
    }

    pub(crate) fn set_mouse_protocol(&mut self, mode: MouseProtocolMode) {
        if self.mouse_protocol != mode {
            self.mouse_protocol = mode;
            self.fire_prop(Prop::MouseProtocol(mode));
        }
    }

    pub(crate) fn set_sgr_mouse(&mut self, on: bool) {
        if self.sgr_mouse != on {
            self.sgr_mouse = on;
            self.fire_prop(Prop::SgrMouse(on));
        }
    }

    pub(crate) fn set_bracketed_paste(&mut self, on: bool) {
        if self.bracketed_paste != on {
            self.bracketed_paste = on;
            self.fire_prop(Prop::BracketedPaste(on));
        }
    }

    pub(crate) fn set_title(&mut self, title: &str) {
        if self.title != title {
            self.title = title.to_string();
            self.fire_prop(Prop::Title(title.to_string()));
        }
    }

    pub(crate) fn set_icon_name(&mut self, name: &str) {
        if self.icon_name != name {
            self.icon_name = name.to_string();
            self.fire_prop(Prop::IconName(name.to_string()));
        }
    }

    /// Enter the alternate screen; the primary grid and its scrollback are
    /// preserved untouched until the child switches back.
    pub(crate) fn enter_alt_screen(&mut self, save_cursor: bool) {
        if self.alt_screen {
            return;
        }
        if save_cursor {
            self.save_cursor();
        }
        let primary = std::mem::replace(&mut self.grid, blank_grid(self.rows, self.cols));
        self.saved_primary = Some(primary);
        self.alt_screen = true;
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
        self.scrollback_offset = 0;
        self.cursor = Pos::default();
        self.pending_wrap = false;
        self.fire_prop(Prop::AltScreen(true));
        self.damage_all();
    }

    pub(crate) fn leave_alt_screen(&mut self, restore_cursor: bool) {
        if !self.alt_screen {
            return;
        }
        if let Some(primary) = self.saved_primary.take() {
            self.grid = primary;
        }
        self.alt_screen = false;
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
        if restore_cursor {
            self.restore_cursor();
        }
        self.fire_prop(Prop::AltScreen(false));
        self.damage_all();
    }

    /// RIS: back to the initial state (grid, cursor, pen, modes); the
    /// scrollback ring survives.
    pub(crate) fn reset(&mut self) {
        self.grid = blank_grid(self.rows, self.cols);
        self.saved_primary = None;
        self.alt_screen = false;
        self.cursor = Pos::default();
        self.saved_cursor = None;
        self.pen.reset();
        self.pending_wrap = false;
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
        self.tabs = default_tabs(self.cols);
        self.scrollback_offset = 0;
        self.set_cursor_visible(true);
        self.autowrap = true;
        self.set_application_cursor_keys(false);
        self.set_mouse_protocol(MouseProtocolMode::None);
        self.set_sgr_mouse(false);
        self.set_bracketed_paste(false);
        self.dec_graphics = false;
        self.damage_all();
    }

    // ------------------------------------------------------------------
    // Resize.
    // ------------------------------------------------------------------

    /// Change the grid size, preserving content relative to the cursor:
    /// when the height shrinks, lines are dropped from the top first (into
    /// scrollback on the primary screen) so the cursor line stays visible;
    /// lines longer than the new width are truncated at the right edge.
    pub fn set_size(&mut self, new_rows: u16, new_cols: u16) {
        let new_rows = new_rows.max(1);
        let new_cols = new_cols.max(1);
        if new_rows == self.rows && new_cols == self.cols {
            return;
        }

        for line in &mut self.grid {
            line.resize(new_cols as usize, Cell::default());
        }
        if let Some(primary) = self.saved_primary.as_mut() {
            for line in primary.iter_mut() {
                line.resize(new_cols as usize, Cell::default());
            }
        }

        if new_rows < self.rows {
            let mut excess = self.rows - new_rows;
            // Drop from the top only as far as needed to keep the cursor.
            let from_top = excess.min(self.cursor.row.saturating_sub(new_rows - 1));
            for _ in 0..from_top {
                let line = self.grid.remove(0);
                if !self.alt_screen {
                    self.push_scrollback(line);
                }
            }
            self.cursor.row -= from_top;
            excess -= from_top;
            self.grid.truncate(self.grid.len() - excess as usize);
        } else {
            for _ in self.rows..new_rows {
                self.grid.push(vec![Cell::default(); new_cols as usize]);
            }
        }
        if let Some(primary) = self.saved_primary.as_mut() {
            primary.resize(new_rows as usize, vec![Cell::default(); new_cols as usize]);
        }

        self.rows = new_rows;
        self.cols = new_cols;
        self.scroll_top = 0;
        self.scroll_bottom = new_rows - 1;
        self.tabs = default_tabs(new_cols);
        self.cursor = Pos {
            row: self.clamp_row(self.cursor.row),
            col: self.clamp_col(self.cursor.col),
        };
        self.pending_wrap = false;
        self.scrollback_offset = self.scrollback_offset.min(self.scrollback.len());
        self.damage_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, rc::Rc};

    fn screen() -> Screen { Screen::new(4, 10, 100) }

    fn row_text(screen: &Screen, row: u16) -> String {
        (0..screen.cols())
            .filter_map(|c| screen.cell(row, c))
            .filter(|cell| !cell.is_wide_continuation())
            .map(|cell| cell.ch)
            .collect()
    }

    fn print_str(screen: &mut Screen, text: &str) {
        for ch in text.chars() {
            screen.print_char(ch);
        }
    }

    #[test]
    fn test_print_advances_cursor() {
        let mut s = screen();
        print_str(&mut s, "hi");
        assert_eq!(row_text(&s, 0), "hi        ");
        assert_eq!(s.cursor_pos(), Pos { row: 0, col: 2 });
    }

    #[test]
    fn test_deferred_wrap_keeps_cursor_in_bounds() {
        let mut s = screen();
        print_str(&mut s, "0123456789");
        // Cursor parks on the last column until the next print.
        assert_eq!(s.cursor_pos(), Pos { row: 0, col: 9 });
        s.print_char('x');
        assert_eq!(s.cursor_pos(), Pos { row: 1, col: 1 });
        assert_eq!(row_text(&s, 1), "x         ");
    }

    #[test]
    fn test_wide_char_occupies_two_cells() {
        let mut s = screen();
        s.print_char('你');
        assert_eq!(s.cursor_pos(), Pos { row: 0, col: 2 });
        assert_eq!(s.cell(0, 0).unwrap().ch, '你');
        assert!(s.cell(0, 1).unwrap().is_wide_continuation());
    }

    #[test]
    fn test_linefeed_at_bottom_scrolls_into_scrollback() {
        let mut s = screen();
        for i in 0..4 {
            print_str(&mut s, &format!("line{i}"));
            if i < 3 {
                s.carriage_return();
                s.linefeed();
            }
        }
        assert_eq!(s.scrollback_len(), 0);

        s.carriage_return();
        s.linefeed();
        print_str(&mut s, "line4");
        assert_eq!(s.scrollback_len(), 1);
        assert_eq!(row_text(&s, 0), "line1     ");
        assert_eq!(row_text(&s, 3), "line4     ");
    }

    #[test]
    fn test_scrollback_bounded() {
        let mut s = Screen::new(2, 4, 3);
        for _ in 0..10 {
            s.linefeed();
        }
        assert!(s.scrollback_len() <= 3);
    }

    #[test]
    fn test_scroll_down_reclaims_history() {
        let mut s = screen();
        print_str(&mut s, "top");
        for _ in 0..4 {
            s.linefeed();
        }
        assert_eq!(s.scrollback_len(), 1);

        s.scroll_down(1);
        assert_eq!(s.scrollback_len(), 0);
        assert_eq!(row_text(&s, 0), "top       ");
    }

    #[test]
    fn test_erase_line_modes() {
        let mut s = screen();
        print_str(&mut s, "abcdefghij");
        s.cursor_to(0, 4);

        s.erase_line(0);
        assert_eq!(row_text(&s, 0), "abcd      ");

        print_str(&mut s, "efghij");
        s.cursor_to(0, 2);
        s.erase_line(1);
        assert_eq!(row_text(&s, 0), "   defghij");

        s.erase_line(2);
        assert_eq!(row_text(&s, 0), "          ");
    }

    #[test]
    fn test_erase_display_from_cursor() {
        let mut s = screen();
        for r in 0..4 {
            s.cursor_to(r, 0);
            print_str(&mut s, "xxxxxxxxxx");
        }
        s.cursor_to(1, 5);
        s.erase_display(0);
        assert_eq!(row_text(&s, 0), "xxxxxxxxxx");
        assert_eq!(row_text(&s, 1), "xxxxx     ");
        assert_eq!(row_text(&s, 2), "          ");
        assert_eq!(row_text(&s, 3), "          ");
    }

    #[test]
    fn test_insert_delete_chars() {
        let mut s = screen();
        print_str(&mut s, "abcdef");
        s.cursor_to(0, 2);

        s.insert_chars(2);
        assert_eq!(row_text(&s, 0), "ab  cdef  ");

        s.delete_chars(2);
        assert_eq!(row_text(&s, 0), "abcdef    ");
    }

    #[test]
    fn test_insert_delete_lines_respect_region() {
        let mut s = screen();
        for r in 0..4 {
            s.cursor_to(r, 0);
            print_str(&mut s, &format!("row{r}"));
        }
        s.set_scroll_region(1, 2);

        s.cursor_to(1, 0);
        s.delete_lines(1);
        assert_eq!(row_text(&s, 0), "row0      ");
        assert_eq!(row_text(&s, 1), "row2      ");
        assert_eq!(row_text(&s, 2), "          ");
        assert_eq!(row_text(&s, 3), "row3      ");

        s.insert_lines(1);
        assert_eq!(row_text(&s, 1), "          ");
        assert_eq!(row_text(&s, 2), "row2      ");
        assert_eq!(row_text(&s, 3), "row3      ");
    }

    #[test]
    fn test_alt_screen_preserves_primary() {
        let mut s = screen();
        print_str(&mut s, "primary");
        s.enter_alt_screen(true);
        assert!(s.alt_screen());
        assert_eq!(row_text(&s, 0), "          ");

        print_str(&mut s, "alt");
        for _ in 0..10 {
            s.linefeed();
        }
        // The alternate screen never feeds scrollback.
        assert_eq!(s.scrollback_len(), 0);

        s.leave_alt_screen(true);
        assert!(!s.alt_screen());
        assert_eq!(row_text(&s, 0), "primary   ");
    }

    #[test]
    fn test_tab_stops() {
        let mut s = Screen::new(2, 20, 0);
        s.tab_forward(1);
        assert_eq!(s.cursor_pos().col, 8);
        s.tab_forward(1);
        assert_eq!(s.cursor_pos().col, 16);
        s.tab_forward(1);
        assert_eq!(s.cursor_pos().col, 19);

        s.tab_backward(2);
        assert_eq!(s.cursor_pos().col, 8);

        s.cursor_col(4);
        s.set_tab_stop();
        s.cursor_col(0);
        s.tab_forward(1);
        assert_eq!(s.cursor_pos().col, 4);

        s.clear_tab_stop(3);
        s.cursor_col(0);
        s.tab_forward(1);
        assert_eq!(s.cursor_pos().col, 19);
    }

    #[test]
    fn test_damage_fired_after_commit() {
        let mut s = screen();
        let rects: Rc<RefCell<Vec<DamageRect>>> = Rc::default();
        let sink = rects.clone();
        s.callbacks.damage = Some(Box::new(move |rect| sink.borrow_mut().push(rect)));

        s.print_char('a');
        let seen = rects.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0],
            DamageRect {
                row_start: 0,
                col_start: 0,
                row_end: 1,
                col_end: 1
            }
        );
    }

    #[test]
    fn test_damage_clipped_to_grid() {
        let mut s = screen();
        let rects: Rc<RefCell<Vec<DamageRect>>> = Rc::default();
        let sink = rects.clone();
        s.callbacks.damage = Some(Box::new(move |rect| sink.borrow_mut().push(rect)));

        s.cursor_to(3, 8);
        s.erase_chars(50);
        let seen = rects.borrow();
        assert_eq!(seen.last().unwrap().col_end, 10);
        assert_eq!(seen.last().unwrap().row_end, 4);
    }

    #[test]
    fn test_resize_truncates_and_clamps() {
        let mut s = screen();
        print_str(&mut s, "0123456789");
        s.cursor_to(3, 9);
        s.set_size(2, 5);

        assert_eq!(s.rows(), 2);
        assert_eq!(s.cols(), 5);
        let pos = s.cursor_pos();
        assert!(pos.row < 2 && pos.col < 5);
        // Dropped top lines land in scrollback.
        assert_eq!(s.scrollback_len(), 2);
        // Every in-bounds cell stays addressable.
        for r in 0..2 {
            for c in 0..5 {
                assert!(s.cell(r, c).is_some());
            }
        }
    }

    #[test]
    fn test_resize_idempotent() {
        let mut s = screen();
        print_str(&mut s, "hello");
        s.set_size(6, 20);
        let cursor = s.cursor_pos();
        let snapshot: Vec<String> = (0..6).map(|r| row_text(&s, r)).collect();

        s.set_size(6, 20);
        assert_eq!(s.cursor_pos(), cursor);
        assert_eq!((0..6).map(|r| row_text(&s, r)).collect::<Vec<_>>(), snapshot);
    }

    #[test]
    fn test_scrollback_view_offset() {
        let mut s = screen();
        print_str(&mut s, "old");
        for _ in 0..4 {
            s.linefeed();
        }
        assert_eq!(s.scrollback_len(), 1);

        s.set_scrollback_offset(1);
        assert_eq!(s.visible_cell(0, 0).unwrap().ch, 'o');

        s.set_scrollback_offset(0);
        assert_eq!(s.visible_cell(0, 0).unwrap().ch, ' ');

        // Clamped to the ring length.
        s.set_scrollback_offset(999);
        assert_eq!(s.scrollback_offset(), 1);
    }

    #[test]
    fn test_prop_callbacks_fire_on_change_only() {
        let mut s = screen();
        let props: Rc<RefCell<Vec<Prop>>> = Rc::default();
        let sink = props.clone();
        s.callbacks.prop_changed = Some(Box::new(move |prop| sink.borrow_mut().push(prop.clone())));

        s.set_cursor_visible(false);
        s.set_cursor_visible(false);
        s.set_title("vim");
        assert_eq!(
            &*props.borrow(),
            &[Prop::CursorVisible(false), Prop::Title("vim".into())]
        );
    }
}
