// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! UI state: focus, wrapping selection, and the cached terminal size.

use ratatui::layout::Rect;

/// Which pane receives keyboard input.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Focus {
    #[default]
    Procs,
    Term,
}

impl Focus {
    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            Focus::Procs => Focus::Term,
            Focus::Term => Focus::Procs,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct UiState {
    pub focus: Focus,
    selected: usize,
    /// Full terminal size as last reported by the backend.
    pub term_size: Rect,
    /// Area of the output pane computed by the last layout pass; child PTY
    /// sizes follow it.
    pub term_area: Rect,
    pub procs_area: Rect,
}

impl UiState {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn selected(&self) -> usize { self.selected }

    /// Clamp the selection into `[0, len)`; used after removals.
    pub fn clamp_selected(&mut self, len: usize) {
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    pub fn select(&mut self, index: usize, len: usize) {
        if index < len {
            self.selected = index;
        }
    }

    /// Move selection down, wrapping from the last entry to the first.
    pub fn select_next(&mut self, len: usize) {
        if len > 0 {
            self.selected = (self.selected + 1) % len;
        }
    }

    /// Move selection up, wrapping from the first entry to the last.
    pub fn select_prev(&mut self, len: usize) {
        if len > 0 {
            self.selected = self.selected.checked_sub(1).unwrap_or(len - 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_wraps_both_ways() {
        let mut ui = UiState::new();
        ui.select_prev(3);
        assert_eq!(ui.selected(), 2);
        ui.select_next(3);
        assert_eq!(ui.selected(), 0);
        ui.select_next(3);
        assert_eq!(ui.selected(), 1);
    }

    /// Iterating `next` N times from any start returns to that start.
    #[test]
    fn test_wrap_cycle_property() {
        for len in 1..=5 {
            for start in 0..len {
                let mut ui = UiState::new();
                ui.select(start, len);
                for _ in 0..len {
                    ui.select_next(len);
                }
                assert_eq!(ui.selected(), start, "len={len} start={start}");
            }
        }
    }

    #[test]
    fn test_empty_list_is_inert() {
        let mut ui = UiState::new();
        ui.select_next(0);
        ui.select_prev(0);
        ui.select(3, 0);
        assert_eq!(ui.selected(), 0);
    }

    #[test]
    fn test_clamp_after_removal() {
        let mut ui = UiState::new();
        ui.select(4, 5);
        ui.clamp_selected(3);
        assert_eq!(ui.selected(), 2);
        ui.clamp_selected(0);
        assert_eq!(ui.selected(), 0);
    }

    #[test]
    fn test_focus_toggle() {
        assert_eq!(Focus::Procs.toggle(), Focus::Term);
        assert_eq!(Focus::Term.toggle(), Focus::Procs);
    }
}
