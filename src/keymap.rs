// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Keymaps: two finite maps from [`Key`] to [`AppEvent`], one per focus
//! scope. Keys not found in the term-scope map are forwarded verbatim to
//! the focused process.

use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyModifiers};

use crate::{event::AppEvent, key::Key, ui::state::Focus};

#[derive(Debug)]
pub struct Keymap {
    procs: HashMap<Key, AppEvent>,
    term: HashMap<Key, AppEvent>,
}

impl Default for Keymap {
    fn default() -> Self {
        let mut map = Keymap {
            procs: HashMap::new(),
            term: HashMap::new(),
        };

        map.bind_procs(Key::plain(KeyCode::Char('q')), AppEvent::Quit);
        // Escape hatch for children that ignore their stop mode.
        map.bind_procs(
            Key::new(KeyCode::Char('q'), KeyModifiers::CONTROL),
            AppEvent::ForceQuit,
        );
        map.bind_procs(
            Key::new(KeyCode::Char('a'), KeyModifiers::CONTROL),
            AppEvent::FocusTerm,
        );
        map.bind_procs(Key::plain(KeyCode::Char('j')), AppEvent::NextProc);
        map.bind_procs(Key::plain(KeyCode::Down), AppEvent::NextProc);
        map.bind_procs(Key::plain(KeyCode::Char('k')), AppEvent::PrevProc);
        map.bind_procs(Key::plain(KeyCode::Up), AppEvent::PrevProc);
        map.bind_procs(Key::plain(KeyCode::Char('s')), AppEvent::StartProc);
        map.bind_procs(Key::plain(KeyCode::Char('x')), AppEvent::KillProc);
        map.bind_procs(Key::plain(KeyCode::Char('r')), AppEvent::RestartProc);
        map.bind_procs(Key::plain(KeyCode::Enter), AppEvent::FocusTerm);
        map.bind_procs(
            Key::new(KeyCode::Char('u'), KeyModifiers::CONTROL),
            AppEvent::ScrollUp,
        );
        map.bind_procs(
            Key::new(KeyCode::Char('d'), KeyModifiers::CONTROL),
            AppEvent::ScrollDown,
        );
        map.bind_procs(Key::plain(KeyCode::PageUp), AppEvent::ScrollUp);
        map.bind_procs(Key::plain(KeyCode::PageDown), AppEvent::ScrollDown);
        for i in 0..9u32 {
            let digit = char::from_digit(i + 1, 10).unwrap_or('1');
            map.bind_procs(
                Key::new(KeyCode::Char(digit), KeyModifiers::ALT),
                AppEvent::SelectProc { index: i as usize },
            );
        }

        map.bind_term(
            Key::new(KeyCode::Char('a'), KeyModifiers::CONTROL),
            AppEvent::FocusProcs,
        );

        map
    }
}

impl Keymap {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn bind_procs(&mut self, key: Key, event: AppEvent) {
        self.procs.insert(key, event);
    }

    pub fn bind_term(&mut self, key: Key, event: AppEvent) {
        self.term.insert(key, event);
    }

    /// Look the key up in the map active for `focus`.
    #[must_use]
    pub fn resolve(&self, focus: Focus, key: &Key) -> Option<&AppEvent> {
        match focus {
            Focus::Procs => self.procs.get(key),
            Focus::Term => self.term.get(key),
        }
    }

    /// The first key bound to `event` in the given scope, for help output.
    #[must_use]
    pub fn key_for(&self, focus: Focus, event: &AppEvent) -> Option<&Key> {
        let map = match focus {
            Focus::Procs => &self.procs,
            Focus::Term => &self.term,
        };
        map.iter().find(|(_, bound)| *bound == event).map(|(k, _)| k)
    }
}
