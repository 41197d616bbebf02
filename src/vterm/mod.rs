// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! In-memory VT-100/xterm-compatible terminal emulator.
//!
//! Each supervised process with a PTY owns one [`VTerm`]: a `vte`-driven
//! parser over a cell grid with cursor, styles, scroll regions, alternate
//! screen, a bounded scrollback ring, and damage accounting. The host wires
//! callback slots (damage, cursor, props, scrollback, output-to-child) to
//! integrate with the render scheduler.
//!
//! ```text
//! PTY master bytes ──▶ VTerm::write ──▶ Screen grid mutations
//!                                           │
//!                          damage / prop / scrollback callbacks
//!                                           │
//!                              render scheduler ──▶ painter
//! ```
//!
//! Not a full terminal: no sixel, no ligatures, no rendering of its own.
//! Unknown sequences are consumed silently so a misbehaving child can never
//! wedge the parser.

// Attach.
pub mod cell;
pub mod perform;
pub mod protocol;
pub mod screen;
#[allow(clippy::module_inception)]
pub mod vterm;

// Re-export.
pub use cell::{Cell, Color, Pen, Pos, StyleFlags};
pub use screen::{DamageRect, Line, MouseProtocolMode, Prop, Screen};
pub use vterm::{VTerm, DEFAULT_SCROLLBACK};
