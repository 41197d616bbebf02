// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Painter glue: layout and per-frame rendering of the process list pane,
//! the output pane, and the help row.
//!
//! The render pass reads `ui.focus`, `ui.selected`, and the selected
//! process's state directly each frame; the render scheduler has already
//! coalesced damage, so no incremental change tracking is needed here.

// Attach.
pub mod help_bar;
pub mod procs_pane;
pub mod state;
pub mod term_pane;

// Re-export.
pub use state::{Focus, UiState};

use ratatui::{layout::{Constraint, Direction, Layout, Rect},
              Frame};

use crate::{keymap::Keymap, proc::Proc};

/// Width of the process list pane, including its border.
pub const PROCS_PANE_WIDTH: u16 = 30;
/// Height of the help row at the bottom.
pub const HELP_BAR_HEIGHT: u16 = 1;

/// Screen regions of one frame. `term_inner` excludes the output pane's
/// border and is the size child PTYs are kept at.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Areas {
    pub procs: Rect,
    pub term: Rect,
    pub term_inner: Rect,
    pub help: Rect,
}

/// Compute the frame layout for a terminal of `size`. Pure; the engine
/// calls it outside the draw closure to size PTYs before spawning.
#[must_use]
pub fn compute_areas(size: Rect) -> Areas {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(HELP_BAR_HEIGHT)])
        .split(size);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(PROCS_PANE_WIDTH), Constraint::Min(3)])
        .split(rows[0]);

    let term = cols[1];
    Areas {
        procs: cols[0],
        term,
        term_inner: term.inner(ratatui::layout::Margin::new(1, 1)),
        help: rows[1],
    }
}

/// Paint one frame.
pub fn render(frame: &mut Frame<'_>, ui: &UiState, procs: &[Proc], keymap: &Keymap) {
    let areas = compute_areas(frame.area());

    procs_pane::render(frame, areas.procs, ui, procs);
    term_pane::render(frame, areas.term, ui, procs.get(ui.selected()));
    help_bar::render(frame, areas.help, ui, keymap);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_partitions_frame() {
        let areas = compute_areas(Rect::new(0, 0, 120, 40));
        assert_eq!(areas.procs.width, PROCS_PANE_WIDTH);
        assert_eq!(areas.term.width, 120 - PROCS_PANE_WIDTH);
        assert_eq!(areas.help.height, HELP_BAR_HEIGHT);
        assert_eq!(areas.term.height + areas.help.height, 40);
        // Inner area excludes the border on each side.
        assert_eq!(areas.term_inner.width, areas.term.width - 2);
        assert_eq!(areas.term_inner.height, areas.term.height - 2);
    }

    #[test]
    fn test_layout_survives_tiny_terminal() {
        let areas = compute_areas(Rect::new(0, 0, 4, 2));
        // Degenerate but never panicking; inner rects collapse to zero.
        assert!(areas.term_inner.width <= areas.term.width);
        assert!(areas.term_inner.height <= areas.term.height);
    }
}
