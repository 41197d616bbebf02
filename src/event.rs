// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Application events: the actions a keymap can bind and, identically, the
//! commands the remote control protocol accepts.
//!
//! The wire form is one YAML document per line with a `c` tag, e.g.
//! `{c: select-proc, index: 2}` or `{c: send-key, key: "<C-c>"}`.

use serde::{Deserialize, Serialize};

use crate::key::Key;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "c", rename_all = "kebab-case")]
pub enum AppEvent {
    Quit,
    ForceQuit,

    ToggleFocus,
    FocusProcs,
    FocusTerm,

    NextProc,
    PrevProc,
    SelectProc { index: usize },

    StartProc,
    /// Stop via the declaration's stop mode (soft).
    TermProc,
    /// Stop immediately via the OS (hard).
    KillProc,
    RestartProc,
    ForceRestartProc,

    AddProc { cmd: String, name: Option<String> },
    RemoveProc { id: usize },
    RenameProc { name: String },

    ScrollUp,
    ScrollDown,
    ScrollUpLines { n: usize },
    ScrollDownLines { n: usize },

    SendKey { key: Key },

    Batch { cmds: Vec<AppEvent> },
}
