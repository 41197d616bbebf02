// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! The process list pane: one row per declared process with an UP/DOWN
//! badge, highlighted selection, and a border that signals focus.

use ratatui::{layout::Rect,
              style::{Color, Modifier, Style},
              text::{Line, Span},
              widgets::{Block, Borders, List, ListItem, ListState},
              Frame};

use crate::proc::{Proc, ProcStatus};

use super::state::{Focus, UiState};

fn badge(proc: &Proc) -> Span<'static> {
    match proc.status() {
        ProcStatus::Running => Span::styled(" UP ", Style::default().fg(Color::Green)),
        ProcStatus::Stopping => {
            Span::styled("stop", Style::default().fg(Color::Yellow))
        }
        // Stopped procs (including spawn failures) show a subdued badge.
        ProcStatus::Stopped => Span::styled(
            "DOWN",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
        ),
    }
}

pub fn render(frame: &mut Frame<'_>, area: Rect, ui: &UiState, procs: &[Proc]) {
    let border_style = if ui.focus == Focus::Procs {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title("Processes");

    let items: Vec<ListItem<'_>> = procs
        .iter()
        .map(|proc| {
            let name_style = if proc.is_stopped() {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            let exit_note = match (proc.status(), proc.last_exit()) {
                (ProcStatus::Stopped, Some(info)) if !info.success => {
                    format!(" ({})", info.code)
                }
                _ => String::new(),
            };
            ListItem::new(Line::from(vec![
                badge(proc),
                Span::raw(" "),
                Span::styled(proc.name.clone(), name_style),
                Span::styled(exit_note, Style::default().fg(Color::Red)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("");

    let mut list_state = ListState::default();
    if !procs.is_empty() {
        list_state.select(Some(ui.selected()));
    }
    frame.render_stateful_widget(list, area, &mut list_state);
}
