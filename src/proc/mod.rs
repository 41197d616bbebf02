// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Process supervision: one [`Proc`] per declared process, owning either a
//! PTY + virtual terminal pair or a line-buffered pipe pair, with a
//! Stopped → Running → Stopping state machine.
//!
//! ```text
//!         start()         exit
//! Stopped ───────▶ Running ────▶ Stopped
//!    ▲                │  stop()
//!    │ exit           ▼
//!    └──────────── Stopping   (kill() can still be issued in Stopping)
//! ```
//!
//! All supervisor state lives on the main task; the blocking I/O tasks in
//! [`pty`] and [`simple`] re-enter it through the shared `(ProcId,
//! ProcEvent)` channel.

// Attach.
#[allow(clippy::module_inception)]
pub mod proc;
pub mod pty;
pub mod simple;

// Re-export.
pub use proc::{Proc, ProcStatus};
pub use pty::{KillMode, PtySession};
pub use simple::{LineBuffer, SimpleSession};

/// Stable id of a supervised process; survives renames and restarts.
pub type ProcId = usize;

/// Exit summary of a child, normalized across platforms and transports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExitInfo {
    pub success: bool,
    pub code: u32,
}

/// Events the I/O tasks send back into the supervisor.
#[derive(Debug)]
pub enum ProcEvent {
    /// A chunk of child output, in input order.
    Output(Vec<u8>),
    /// The child was reaped.
    Exited(ExitInfo),
    /// A deferred autorestart (crash-loop damping) is due.
    AutorestartDue,
    /// A soft stop went unanswered within the escalation delay; the
    /// supervisor falls back to a hard kill.
    StopTimeout,
}
