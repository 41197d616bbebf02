// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! devmux: a terminal multiplexer for development workflows.
//!
//! The core is the process/terminal subsystem: each declared process is
//! supervised by a [`proc::Proc`] that owns either a PTY plus an in-memory
//! [`vterm::VTerm`] emulator, or a line-buffered pipe pair. A single main
//! task multiplexes child output, host input, and remote commands, and a
//! coalescing [`render::RenderScheduler`] drives the ratatui painter.
//!
//! ```text
//! child bytes ─▶ PTY reader ─▶ Proc ─▶ VTerm (grid + damage)
//!                                         │
//!                               render scheduler ─▶ painter (selected proc)
//!
//! host input ─▶ keymap dispatch ─▶ engine action │ key codec ─▶ child stdin
//! ```

// Attach.
pub mod app;
pub mod cli;
pub mod config;
pub mod encode_input;
pub mod event;
pub mod input_parser;
pub mod key;
pub mod keymap;
pub mod listener;
pub mod package_json;
pub mod proc;
pub mod render;
pub mod server;
pub mod ui;
pub mod vterm;

// Re-export.
pub use config::{Config, ProcDecl, StopSignal};
pub use event::AppEvent;
pub use key::Key;
pub use keymap::Keymap;
pub use listener::{Subscribers, Subscription, SubscriptionSet};
pub use proc::{ExitInfo, Proc, ProcEvent, ProcId, ProcStatus};
pub use render::RenderScheduler;
pub use vterm::VTerm;
