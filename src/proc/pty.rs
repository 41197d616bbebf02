// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! PTY adapter: OS-portable allocation of a pty pair, child spawn, resize,
//! signalling, and exit observation.
//!
//! A spawned session runs three tasks:
//!
//! 1. a blocking reader (`spawn_blocking`) that pulls child output from the
//!    master and re-enters the executor as [`ProcEvent::Output`] messages;
//!    PTY file descriptors only offer synchronous `Read`, so a dedicated
//!    blocking-pool thread keeps the async runtime unblocked;
//! 2. a blocking writer that owns the master half and serialises all input
//!    and resize operations;
//! 3. a blocking waiter that reaps the child and reports
//!    [`ProcEvent::Exited`].
//!
//! The slave half is dropped right after the spawn, so the reader observes
//! EOF as soon as the child exits (or is killed), which is also how pending
//! reads are cancelled on quit.

use std::io::{Read, Write};

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc::UnboundedSender;

use super::{ExitInfo, ProcEvent, ProcId};

/// Read buffer size for the blocking reader task.
const READ_BUFFER_SIZE: usize = 4096;

/// Input operations handled by the writer task that owns the master.
#[derive(Debug)]
pub enum PtyInput {
    Write(Vec<u8>),
    Resize(PtySize),
    Close,
}

/// Graduated kill modes; see [`PtySession::kill`] and the supervisor's stop
/// escalation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KillMode {
    /// SIGINT now; SIGTERM after 5 s; SIGKILL after a further 5 s.
    SoftInterrupt,
    /// SIGTERM now; SIGKILL after 5 s.
    SoftTerminate,
    /// Immediate OS-level kill on every platform.
    HardKill,
}

/// Delay before each escalation step of a soft kill.
pub const KILL_ESCALATION_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// A live PTY-attached child. Dropping the input sender (or sending
/// [`PtyInput::Close`]) shuts the writer down and releases the master.
pub struct PtySession {
    input_tx: std::sync::mpsc::Sender<PtyInput>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession").field("pid", &self.pid).finish()
    }
}

impl PtySession {
    /// Allocate a pty pair of the given size and spawn `cmd` attached to
    /// it. Output and exit events arrive on `event_tx` tagged with `id`.
    ///
    /// # Errors
    ///
    /// Fails with a bad-size error when rows or cols are zero, or with the
    /// OS error when the pty cannot be opened or the command cannot be
    /// spawned.
    pub fn spawn(
        id: ProcId,
        cmd: CommandBuilder,
        size: PtySize,
        event_tx: UnboundedSender<(ProcId, ProcEvent)>,
    ) -> miette::Result<Self> {
        if size.rows == 0 || size.cols == 0 {
            miette::bail!("Bad PTY size: {}x{}", size.rows, size.cols);
        }

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(size)
            .map_err(|e| miette::miette!("Failed to open PTY: {}", e))?;

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| miette::miette!("Failed to spawn command: {}", e))?;
        let pid = child.process_id();
        let killer = child.clone_killer();

        // The child holds its own slave fds; dropping ours lets the reader
        // observe EOF the moment the child exits.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| miette::miette!("Failed to clone PTY reader: {}", e))?;

        let (input_tx, input_rx) = std::sync::mpsc::channel::<PtyInput>();

        spawn_reader_task(id, reader, event_tx.clone());
        spawn_writer_task(pair.master, input_rx);
        spawn_waiter_task(id, child, event_tx);

        Ok(Self {
            input_tx,
            killer,
            pid,
        })
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> { self.pid }

    /// A clone of the input-sender half, for callbacks that must write to
    /// the child without owning the session.
    #[must_use]
    pub fn input_sender(&self) -> std::sync::mpsc::Sender<PtyInput> {
        self.input_tx.clone()
    }

    /// Queue bytes for the child's input. A full or closed channel is
    /// logged and the bytes are dropped; the session stays usable.
    pub fn write(&self, bytes: Vec<u8>) {
        if self.input_tx.send(PtyInput::Write(bytes)).is_err() {
            tracing::warn!("PTY input channel closed; dropping write");
        }
    }

    /// Queue a resize of the pty. Idempotent; failures are logged by the
    /// writer task and the next resize retries.
    pub fn resize(&self, rows: u16, cols: u16) {
        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        if self.input_tx.send(PtyInput::Resize(size)).is_err() {
            tracing::warn!("PTY input channel closed; dropping resize");
        }
    }

    /// Stop the writer task and release the master after the child has been
    /// reaped.
    pub fn close(&self) { let _unused = self.input_tx.send(PtyInput::Close); }

    /// Immediate OS-level kill of the child.
    pub fn kill(&mut self) {
        if let Err(e) = self.killer.kill() {
            tracing::warn!("Failed to kill child (pid {:?}): {}", self.pid, e);
        }
    }

    /// Post a Unix signal to the child. No-op when the pid is unknown.
    #[cfg(unix)]
    pub fn send_signal(&self, signal: i32) {
        if let Some(pid) = self.pid {
            send_signal_to_pid(pid, signal);
        }
    }
}

#[cfg(unix)]
pub(crate) fn send_signal_to_pid(pid: u32, signal: i32) {
    // SAFETY: plain kill(2); the worst a stale pid can do is hit a process
    // we did not intend, which the non-negative pid check below bounds to
    // a single process id.
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc != 0 {
        tracing::debug!(
            "kill({}, {}) failed: {}",
            pid,
            signal,
            std::io::Error::last_os_error()
        );
    }
}

fn spawn_reader_task(
    id: ProcId,
    mut reader: Box<dyn Read + Send>,
    event_tx: UnboundedSender<(ProcId, ProcEvent)>,
) {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf) {
                // EOF or error: the PTY is gone; the waiter reports the
                // real exit status.
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if event_tx
                        .send((id, ProcEvent::Output(buf[..n].to_vec())))
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
    });
}

fn spawn_writer_task(
    master: Box<dyn MasterPty + Send>,
    input_rx: std::sync::mpsc::Receiver<PtyInput>,
) {
    tokio::task::spawn_blocking(move || {
        let mut writer = match master.take_writer() {
            Ok(writer) => writer,
            Err(e) => {
                tracing::warn!("Failed to take PTY writer: {}", e);
                return;
            }
        };

        // ConPTY may ignore a resize arriving in a brief window after the
        // spawn; re-apply the first one after a short delay.
        #[cfg(windows)]
        let mut first_resize_done = false;

        while let Ok(input) = input_rx.recv() {
            match input {
                PtyInput::Write(bytes) => {
                    if let Err(e) = writer.write_all(&bytes).and_then(|()| writer.flush())
                    {
                        // Byte drop is logged; the child stays running.
                        tracing::warn!("PTY write failed, dropping {} bytes: {}", bytes.len(), e);
                    }
                }
                PtyInput::Resize(size) => {
                    if let Err(e) = master.resize(size) {
                        tracing::warn!("PTY resize failed: {}", e);
                    }
                    #[cfg(windows)]
                    if !first_resize_done {
                        first_resize_done = true;
                        std::thread::sleep(std::time::Duration::from_millis(200));
                        if let Err(e) = master.resize(size) {
                            tracing::warn!("PTY resize retry failed: {}", e);
                        }
                    }
                }
                PtyInput::Close => break,
            }
        }
        // Master drops here, after the child has been reaped.
        drop(master);
    });
}

fn spawn_waiter_task(
    id: ProcId,
    mut child: Box<dyn portable_pty::Child + Send + Sync>,
    event_tx: UnboundedSender<(ProcId, ProcEvent)>,
) {
    tokio::task::spawn_blocking(move || {
        let info = match child.wait() {
            Ok(status) => ExitInfo {
                success: status.success(),
                code: status.exit_code(),
            },
            Err(e) => {
                tracing::warn!("wait() failed for pid {:?}: {}", child.process_id(), e);
                ExitInfo {
                    success: false,
                    code: 1,
                }
            }
        };
        let _unused = event_tx.send((id, ProcEvent::Exited(info)));
    });
}
