// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! The one-row help bar: key hints for the active focus scope.

use ratatui::{layout::Rect,
              style::{Color, Modifier, Style},
              text::{Line, Span},
              widgets::Paragraph,
              Frame};

use crate::{event::AppEvent, keymap::Keymap};

use super::state::{Focus, UiState};

fn hint_entries(focus: Focus) -> &'static [(&'static str, AppEvent)] {
    match focus {
        Focus::Procs => &[
            ("quit", AppEvent::Quit),
            ("next", AppEvent::NextProc),
            ("prev", AppEvent::PrevProc),
            ("start", AppEvent::StartProc),
            ("kill", AppEvent::KillProc),
            ("restart", AppEvent::RestartProc),
            ("term", AppEvent::FocusTerm),
        ],
        Focus::Term => &[("procs", AppEvent::FocusProcs)],
    }
}

pub fn render(frame: &mut Frame<'_>, area: Rect, ui: &UiState, keymap: &Keymap) {
    let key_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let label_style = Style::default().fg(Color::DarkGray);

    let mut spans: Vec<Span<'_>> = Vec::new();
    for (label, event) in hint_entries(ui.focus) {
        let Some(key) = keymap.key_for(ui.focus, event) else {
            continue;
        };
        if !spans.is_empty() {
            spans.push(Span::styled("  ", label_style));
        }
        spans.push(Span::styled(key.to_string(), key_style));
        spans.push(Span::styled(format!(":{label}"), label_style));
    }
    if ui.focus == Focus::Term {
        spans.push(Span::styled(
            "  (other keys go to the process)",
            label_style,
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
