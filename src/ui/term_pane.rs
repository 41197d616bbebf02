// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! The output pane: blits the selected process's emulator grid (or its
//! line buffer for pipe procs) into the frame, converting cell colors and
//! style bits to the painter's model.

use ratatui::{layout::{Position, Rect},
              style::{Color, Modifier, Style},
              text::Line,
              widgets::{Block, Borders, Paragraph},
              Frame};

use crate::{proc::{Proc, ProcStatus},
            vterm::{self, StyleFlags, VTerm}};

use super::state::{Focus, UiState};

fn convert_color(color: vterm::Color) -> Color {
    match color {
        vterm::Color::Default => Color::Reset,
        vterm::Color::Indexed(idx) => Color::Indexed(idx),
        vterm::Color::Rgb(r, g, b) => Color::Rgb(r, g, b),
    }
}

fn convert_attrs(attrs: StyleFlags) -> Modifier {
    let mut modifier = Modifier::empty();
    if attrs.contains(StyleFlags::BOLD) {
        modifier |= Modifier::BOLD;
    }
    if attrs.contains(StyleFlags::DIM) {
        modifier |= Modifier::DIM;
    }
    if attrs.contains(StyleFlags::ITALIC) {
        modifier |= Modifier::ITALIC;
    }
    if attrs.contains(StyleFlags::UNDERLINE) {
        modifier |= Modifier::UNDERLINED;
    }
    if attrs.contains(StyleFlags::INVERSE) {
        modifier |= Modifier::REVERSED;
    }
    if attrs.contains(StyleFlags::HIDDEN) {
        modifier |= Modifier::HIDDEN;
    }
    if attrs.contains(StyleFlags::STRIKETHROUGH) {
        modifier |= Modifier::CROSSED_OUT;
    }
    if attrs.contains(StyleFlags::BLINK) {
        modifier |= Modifier::SLOW_BLINK;
    }
    modifier
}

pub fn render(frame: &mut Frame<'_>, area: Rect, ui: &UiState, proc: Option<&Proc>) {
    let border_style = if ui.focus == Focus::Term {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let title = match proc {
        Some(proc) => {
            let vt_title = proc.vterm().map(VTerm::title).unwrap_or_default();
            if vt_title.is_empty() {
                format!(" {} ", proc.name)
            } else {
                format!(" {} - {} ", proc.name, vt_title)
            }
        }
        None => " no process ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(proc) = proc else { return };
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    if let Some(vt) = proc.vterm() {
        render_grid(frame, inner, ui, vt);
    } else if let Some(lines) = proc.lines() {
        render_lines(frame, inner, lines);
    } else {
        render_down_notice(frame, inner, proc);
    }
}

/// Walk the emulator grid cell-by-cell into the frame buffer.
fn render_grid(frame: &mut Frame<'_>, inner: Rect, ui: &UiState, vt: &VTerm) {
    let screen = vt.screen();
    let rows = screen.rows().min(inner.height);
    let cols = screen.cols().min(inner.width);
    let buf = frame.buffer_mut();

    for row in 0..rows {
        for col in 0..cols {
            let Some(cell) = screen.visible_cell(row, col) else {
                continue;
            };
            let position = Position::new(inner.x + col, inner.y + row);
            let Some(target) = buf.cell_mut(position) else {
                continue;
            };
            if cell.is_wide_continuation() {
                // The wide scalar in the previous cell renders over this
                // column.
                target.set_skip(true);
                continue;
            }
            target.set_char(cell.ch);
            target.set_style(
                Style::default()
                    .fg(convert_color(cell.fg))
                    .bg(convert_color(cell.bg))
                    .add_modifier(convert_attrs(cell.attrs)),
            );
        }
    }

    // The hardware cursor tracks the child only when the terminal pane is
    // focused, showing the live grid.
    if ui.focus == Focus::Term
        && screen.cursor_visible()
        && screen.scrollback_offset() == 0
    {
        let pos = screen.cursor_pos();
        if pos.row < rows && pos.col < cols {
            frame.set_cursor_position(Position::new(inner.x + pos.col, inner.y + pos.row));
        }
    }
}

/// Pipe procs show their most recent completed lines plus the line still
/// being accumulated.
fn render_lines(frame: &mut Frame<'_>, inner: Rect, lines: &crate::proc::LineBuffer) {
    let height = inner.height as usize;
    let mut shown: Vec<Line<'_>> = Vec::with_capacity(height);

    let completed = lines.lines();
    let completed_rows = height.saturating_sub(usize::from(!lines.last_line().is_empty()));
    let skip = completed.len().saturating_sub(completed_rows);
    for line in completed.iter().skip(skip) {
        shown.push(Line::raw(line.as_str()));
    }
    if !lines.last_line().is_empty() {
        shown.push(Line::raw(lines.last_line()));
    }

    frame.render_widget(Paragraph::new(shown), inner);
}

fn render_down_notice(frame: &mut Frame<'_>, inner: Rect, proc: &Proc) {
    debug_assert_eq!(proc.status(), ProcStatus::Stopped);
    let mut notice = match proc.last_exit() {
        Some(info) if !info.success => format!("DOWN (exit {})", info.code),
        Some(_) => "DOWN (exit 0)".to_string(),
        None => "DOWN".to_string(),
    };
    if let Some(error) = proc.last_error() {
        notice.push_str(": ");
        notice.push_str(error);
    }
    let style = Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM);
    frame.render_widget(Paragraph::new(notice).style(style), inner);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_conversion() {
        assert_eq!(convert_color(vterm::Color::Default), Color::Reset);
        assert_eq!(convert_color(vterm::Color::Indexed(14)), Color::Indexed(14));
        assert_eq!(
            convert_color(vterm::Color::Rgb(1, 2, 3)),
            Color::Rgb(1, 2, 3)
        );
    }

    #[test]
    fn test_attr_conversion() {
        let mut attrs = StyleFlags::empty();
        attrs.insert(StyleFlags::BOLD);
        attrs.insert(StyleFlags::INVERSE);
        let modifier = convert_attrs(attrs);
        assert!(modifier.contains(Modifier::BOLD));
        assert!(modifier.contains(Modifier::REVERSED));
        assert!(!modifier.contains(Modifier::ITALIC));
    }
}
