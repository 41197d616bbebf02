// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! The per-process supervisor: kind selection, the lifecycle state machine,
//! input/resize fan-out, and stop escalation.

use std::{cell::Cell,
          rc::Rc,
          time::{Duration, Instant}};

use crossterm::event::{MouseEvent, MouseEventKind};
use portable_pty::PtySize;
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

use crate::{config::{ProcDecl, StopSignal},
            encode_input::{encode_key, encode_key_simple, encode_mouse_event, EncodeModes},
            key::Key,
            listener::{Subscribers, SubscriptionSet},
            vterm::{MouseProtocolMode, VTerm}};

use super::{pty::{KillMode, PtyInput, PtySession, KILL_ESCALATION_DELAY},
            simple::{LineBuffer, SimpleSession},
            ExitInfo, ProcEvent, ProcId};

/// Lines scrolled per mouse wheel notch when the child has not claimed the
/// mouse.
const WHEEL_SCROLL_LINES: usize = 3;

/// Minimum time a process must have been alive for an immediate
/// autorestart; earlier exits are restarted only after the remainder of
/// this window has passed.
const AUTORESTART_MIN_ALIVE: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ProcStatus {
    #[default]
    Stopped,
    Running,
    Stopping,
}

/// The live transport/emulation strategy. Exactly one kind exists while the
/// status is Running or Stopping; none in Stopped.
enum ProcKind {
    Vterm {
        session: PtySession,
        vt: VTerm,
        /// Set by the VTerm damage/prop callbacks; drained after each write.
        damaged: Rc<Cell<bool>>,
        on_update: Subscribers<()>,
    },
    Simple {
        session: SimpleSession,
        lines: LineBuffer,
        on_update: Subscribers<()>,
    },
}

impl ProcKind {
    fn on_update(&self) -> &Subscribers<()> {
        match self {
            ProcKind::Vterm { on_update, .. } | ProcKind::Simple { on_update, .. } => {
                on_update
            }
        }
    }

    fn pid(&self) -> Option<u32> {
        match self {
            ProcKind::Vterm { session, .. } => session.pid(),
            ProcKind::Simple { session, .. } => session.pid(),
        }
    }
}

pub struct Proc {
    id: ProcId,
    pub name: String,
    decl: ProcDecl,
    status: ProcStatus,
    rows: u16,
    cols: u16,
    scrollback_len: usize,

    event_tx: UnboundedSender<(ProcId, ProcEvent)>,

    kind: Option<ProcKind>,
    /// Subscriptions wired to the live kind; dropped when it is replaced.
    kind_subs: SubscriptionSet,

    on_state_change: Subscribers<ProcStatus>,
    on_rerender: Subscribers<()>,

    started_at: Option<Instant>,
    to_restart: bool,
    last_exit: Option<ExitInfo>,
    last_error: Option<String>,
    /// Soft-stop escalation timers; aborted when the exit is observed.
    escalation: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Proc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proc")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("size", &(self.rows, self.cols))
            .finish()
    }
}

impl Proc {
    #[must_use]
    pub fn new(
        id: ProcId,
        decl: ProcDecl,
        event_tx: UnboundedSender<(ProcId, ProcEvent)>,
        rows: u16,
        cols: u16,
        scrollback_len: usize,
    ) -> Self {
        Self {
            id,
            name: decl.name.clone(),
            decl,
            status: ProcStatus::Stopped,
            rows: rows.max(1),
            cols: cols.max(1),
            scrollback_len,
            event_tx,
            kind: None,
            kind_subs: SubscriptionSet::new(),
            on_state_change: Subscribers::new(),
            on_rerender: Subscribers::new(),
            started_at: None,
            to_restart: false,
            last_exit: None,
            last_error: None,
            escalation: None,
        }
    }

    // ------------------------------------------------------------------
    // Accessors.
    // ------------------------------------------------------------------

    #[must_use]
    pub fn id(&self) -> ProcId { self.id }

    #[must_use]
    pub fn status(&self) -> ProcStatus { self.status }

    #[must_use]
    pub fn decl(&self) -> &ProcDecl { &self.decl }

    #[must_use]
    pub fn is_stopped(&self) -> bool { self.status == ProcStatus::Stopped }

    #[must_use]
    pub fn has_kind(&self) -> bool { self.kind.is_some() }

    #[must_use]
    pub fn last_exit(&self) -> Option<ExitInfo> { self.last_exit }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }

    /// The virtual terminal, when the live kind is PTY-backed.
    #[must_use]
    pub fn vterm(&self) -> Option<&VTerm> {
        match self.kind.as_ref()? {
            ProcKind::Vterm { vt, .. } => Some(vt),
            ProcKind::Simple { .. } => None,
        }
    }

    /// The line buffer, when the live kind is pipe-backed.
    #[must_use]
    pub fn lines(&self) -> Option<&LineBuffer> {
        match self.kind.as_ref()? {
            ProcKind::Simple { lines, .. } => Some(lines),
            ProcKind::Vterm { .. } => None,
        }
    }

    #[must_use]
    pub fn on_state_change(&self) -> &Subscribers<ProcStatus> { &self.on_state_change }

    #[must_use]
    pub fn on_rerender(&self) -> &Subscribers<()> { &self.on_rerender }

    fn set_status(&mut self, status: ProcStatus) {
        if self.status != status {
            self.status = status;
            tracing::debug!("Proc '{}' -> {:?}", self.name, status);
            self.on_state_change.emit(&status);
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle.
    // ------------------------------------------------------------------

    /// Stopped → Running. A no-op in any other state. A spawn failure
    /// leaves the proc Stopped with a synthetic nonzero exit recorded.
    pub fn start(&mut self) {
        if self.status != ProcStatus::Stopped {
            return;
        }

        match self.spawn_kind() {
            Ok(kind) => {
                let rerender = self.on_rerender.clone();
                self.kind_subs
                    .push(kind.on_update().subscribe(move |()| rerender.emit(&())));
                self.kind = Some(kind);
                self.started_at = Some(Instant::now());
                self.last_error = None;
                self.set_status(ProcStatus::Running);
            }
            Err(e) => {
                tracing::warn!("Failed to start '{}': {}", self.name, e);
                self.last_error = Some(e.to_string());
                self.last_exit = Some(ExitInfo {
                    success: false,
                    code: 1,
                });
                self.on_rerender.emit(&());
            }
        }
    }

    fn spawn_kind(&self) -> miette::Result<ProcKind> {
        if self.decl.tty {
            let cmd = self.decl.command_builder()?;
            let size = PtySize {
                rows: self.rows,
                cols: self.cols,
                pixel_width: 0,
                pixel_height: 0,
            };
            let session = PtySession::spawn(self.id, cmd, size, self.event_tx.clone())?;

            let mut vt = VTerm::with_scrollback(self.rows, self.cols, self.scrollback_len);
            let damaged = Rc::new(Cell::new(false));
            let flag = damaged.clone();
            vt.set_damage_callback(move |_| flag.set(true));
            let flag = damaged.clone();
            vt.set_prop_changed_callback(move |_| flag.set(true));
            // The output callback carries only the input-sender half, so no
            // Proc ↔ VTerm ownership cycle forms.
            let input_tx = session.input_sender();
            vt.set_output_callback(move |bytes| {
                let _unused = input_tx.send(PtyInput::Write(bytes.to_vec()));
            });

            Ok(ProcKind::Vterm {
                session,
                vt,
                damaged,
                on_update: Subscribers::new(),
            })
        } else {
            let session = SimpleSession::spawn(self.id, &self.decl, self.event_tx.clone())?;
            Ok(ProcKind::Simple {
                session,
                lines: LineBuffer::new(self.scrollback_len),
                on_update: Subscribers::new(),
            })
        }
    }

    /// Running → Stopping via the declaration's stop mode. No-op in
    /// Stopped; in Stopping the escalation already underway is left alone
    /// ([`Proc::kill`] forces).
    pub fn stop(&mut self) {
        if self.status != ProcStatus::Running {
            return;
        }
        self.set_status(ProcStatus::Stopping);
        match self.decl.stop.clone() {
            StopSignal::Sigint => self.kill_with_mode(KillMode::SoftInterrupt),
            StopSignal::Sigterm => self.kill_with_mode(KillMode::SoftTerminate),
            StopSignal::Sigkill => self.kill_with_mode(KillMode::HardKill),
            StopSignal::HardKill => self.kill_with_mode(KillMode::HardKill),
            StopSignal::SendKeys(keys) => {
                for key in keys {
                    self.send_key(&key);
                }
                // The child may ignore the keys; fall back to a hard kill
                // on the same schedule as the signal ladders.
                self.spawn_stop_timeout();
            }
        }
    }

    /// Hard-kill fallback for stop modes without a signal ladder: if the
    /// exit is not observed within [`KILL_ESCALATION_DELAY`], re-enter the
    /// main task with a stop-timeout event. Aborted when the exit arrives.
    fn spawn_stop_timeout(&mut self) {
        if let Some(old) = self.escalation.take() {
            old.abort();
        }
        let event_tx = self.event_tx.clone();
        let id = self.id;
        self.escalation = Some(tokio::spawn(async move {
            tokio::time::sleep(KILL_ESCALATION_DELAY).await;
            let _unused = event_tx.send((id, ProcEvent::StopTimeout));
        }));
    }

    /// Immediate hard kill; valid in Running and Stopping.
    pub fn kill(&mut self) {
        if self.status == ProcStatus::Stopped {
            return;
        }
        if self.status == ProcStatus::Running {
            self.set_status(ProcStatus::Stopping);
        }
        self.kill_with_mode(KillMode::HardKill);
    }

    /// Apply a kill mode. Soft modes post the first signal immediately and
    /// escalate on timers that are cancelled when the exit is observed; on
    /// Windows soft is equivalent to hard.
    pub fn kill_with_mode(&mut self, mode: KillMode) {
        #[cfg(unix)]
        match mode {
            KillMode::SoftInterrupt => {
                self.signal(libc::SIGINT);
                self.spawn_escalation(vec![libc::SIGTERM, libc::SIGKILL]);
            }
            KillMode::SoftTerminate => {
                self.signal(libc::SIGTERM);
                self.spawn_escalation(vec![libc::SIGKILL]);
            }
            KillMode::HardKill => self.kill_now(),
        }

        #[cfg(not(unix))]
        {
            let _ = mode;
            self.kill_now();
        }
    }

    fn kill_now(&mut self) {
        match self.kind.as_mut() {
            Some(ProcKind::Vterm { session, .. }) => session.kill(),
            Some(ProcKind::Simple { session, .. }) => session.kill(),
            None => {}
        }
    }

    #[cfg(unix)]
    fn signal(&self, signal: i32) {
        match self.kind.as_ref() {
            Some(ProcKind::Vterm { session, .. }) => session.send_signal(signal),
            Some(ProcKind::Simple { session, .. }) => session.send_signal(signal),
            None => {}
        }
    }

    /// Escalation ladder: after each [`KILL_ESCALATION_DELAY`], post the
    /// next signal. The task is aborted when the child's exit is observed.
    #[cfg(unix)]
    fn spawn_escalation(&mut self, signals: Vec<i32>) {
        if let Some(old) = self.escalation.take() {
            old.abort();
        }
        let Some(pid) = self.kind.as_ref().and_then(ProcKind::pid) else {
            return;
        };
        self.escalation = Some(tokio::spawn(async move {
            for signal in signals {
                tokio::time::sleep(KILL_ESCALATION_DELAY).await;
                tracing::debug!("Escalating: kill({pid}, {signal})");
                super::pty::send_signal_to_pid(pid, signal);
            }
        }));
    }

    /// Stop (soft or hard), then start again once the Stopped transition is
    /// observed. In Stopped this is just a start.
    pub fn restart(&mut self, hard: bool) {
        match self.status {
            ProcStatus::Stopped => self.start(),
            ProcStatus::Running => {
                self.to_restart = true;
                if hard {
                    self.kill();
                } else {
                    self.stop();
                }
            }
            ProcStatus::Stopping => {
                self.to_restart = true;
                if hard {
                    self.kill();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Events from the I/O tasks.
    // ------------------------------------------------------------------

    pub fn handle_event(&mut self, event: ProcEvent) {
        match event {
            ProcEvent::Output(bytes) => self.handle_output(&bytes),
            ProcEvent::Exited(info) => self.handle_exit(info),
            ProcEvent::AutorestartDue => {
                if self.status == ProcStatus::Stopped {
                    self.start();
                }
            }
            ProcEvent::StopTimeout => {
                if self.status == ProcStatus::Stopping {
                    tracing::warn!("Proc '{}' ignored its stop keys; killing", self.name);
                    self.kill();
                }
            }
        }
    }

    fn handle_output(&mut self, bytes: &[u8]) {
        match self.kind.as_mut() {
            Some(ProcKind::Vterm {
                vt,
                damaged,
                on_update,
                ..
            }) => {
                vt.write(bytes);
                if damaged.take() {
                    on_update.emit(&());
                }
            }
            Some(ProcKind::Simple {
                lines, on_update, ..
            }) => {
                if lines.push_bytes(bytes) {
                    on_update.emit(&());
                }
            }
            // Output raced the exit event; the kind is gone.
            None => {}
        }
    }

    fn handle_exit(&mut self, info: ExitInfo) {
        if self.status == ProcStatus::Stopped {
            self.last_exit = Some(info);
            return;
        }

        if let Some(escalation) = self.escalation.take() {
            escalation.abort();
        }

        let was_running = self.status == ProcStatus::Running;
        if let Some(kind) = self.kind.take() {
            if let ProcKind::Vterm { session, .. } = &kind {
                session.close();
            }
            drop(kind);
        }
        self.kind_subs.clear();
        self.last_exit = Some(info);
        self.set_status(ProcStatus::Stopped);

        if self.to_restart {
            self.to_restart = false;
            self.start();
        } else if was_running && self.decl.autorestart {
            let alive = self
                .started_at
                .map_or(Duration::ZERO, |started| started.elapsed());
            if alive >= AUTORESTART_MIN_ALIVE {
                self.start();
            } else {
                // Crash-loop damping: defer the restart to the 1 s mark.
                let delay = AUTORESTART_MIN_ALIVE - alive;
                let event_tx = self.event_tx.clone();
                let id = self.id;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _unused = event_tx.send((id, ProcEvent::AutorestartDue));
                });
            }
        }

        self.on_rerender.emit(&());
    }

    // ------------------------------------------------------------------
    // Input and resize fan-out.
    // ------------------------------------------------------------------

    /// Update the cached size and propagate to the live kind. The pipe kind
    /// ignores resizes.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.rows = rows.max(1);
        self.cols = cols.max(1);
        if let Some(ProcKind::Vterm { session, vt, .. }) = self.kind.as_mut() {
            session.resize(self.rows, self.cols);
            vt.set_size(self.rows, self.cols);
        }
    }

    /// Encode and deliver a key. Discarded in Stopped. Typing while scrolled
    /// back snaps the view to the live grid first.
    pub fn send_key(&mut self, key: &Key) {
        if self.status == ProcStatus::Stopped {
            return;
        }
        match self.kind.as_mut() {
            Some(ProcKind::Vterm { session, vt, .. }) => {
                if vt.screen().scrollback_offset() > 0 {
                    vt.reset_view();
                }
                let modes = EncodeModes {
                    application_cursor_keys: vt.application_cursor_keys(),
                    newline_mode: false,
                };
                let bytes = encode_key(key, modes);
                if !bytes.is_empty() {
                    session.write(bytes);
                }
            }
            Some(ProcKind::Simple { session, .. }) => {
                if let Some(bytes) = encode_key_simple(key) {
                    session.write(bytes);
                }
            }
            None => {}
        }
        self.emit_if_damaged();
    }

    /// Route a pane-relative mouse event: forwarded as an SGR report when
    /// the child claimed the mouse, otherwise the wheel drives the
    /// scrollback view.
    pub fn handle_mouse(&mut self, event: MouseEvent) {
        let Some(ProcKind::Vterm { session, vt, .. }) = self.kind.as_mut() else {
            return;
        };

        let mode = vt.mouse_protocol();
        if mode != MouseProtocolMode::None && vt.screen().sgr_mouse() {
            if mouse_event_in_mode(&event.kind, mode) {
                let bytes = encode_mouse_event(&event);
                if !bytes.is_empty() {
                    session.write(bytes);
                }
            }
        } else {
            match event.kind {
                MouseEventKind::ScrollUp => vt.scroll_view_up(WHEEL_SCROLL_LINES),
                MouseEventKind::ScrollDown => vt.scroll_view_down(WHEEL_SCROLL_LINES),
                _ => {}
            }
        }
        self.emit_if_damaged();
    }

    pub fn scroll_up_lines(&mut self, n: usize) {
        if let Some(ProcKind::Vterm { vt, .. }) = self.kind.as_mut() {
            vt.scroll_view_up(n);
        }
        self.emit_if_damaged();
    }

    pub fn scroll_down_lines(&mut self, n: usize) {
        if let Some(ProcKind::Vterm { vt, .. }) = self.kind.as_mut() {
            vt.scroll_view_down(n);
        }
        self.emit_if_damaged();
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up_lines((self.rows / 2).max(1) as usize);
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down_lines((self.rows / 2).max(1) as usize);
    }

    fn emit_if_damaged(&mut self) {
        if let Some(ProcKind::Vterm {
            damaged, on_update, ..
        }) = self.kind.as_ref()
        {
            if damaged.take() {
                on_update.emit(&());
            }
        }
    }
}

/// Whether the child's tracking mode wants this event kind at all.
fn mouse_event_in_mode(kind: &MouseEventKind, mode: MouseProtocolMode) -> bool {
    match kind {
        MouseEventKind::Down(_)
        | MouseEventKind::Up(_)
        | MouseEventKind::ScrollUp
        | MouseEventKind::ScrollDown => true,
        MouseEventKind::Drag(_) => {
            matches!(mode, MouseProtocolMode::ButtonMotion | MouseProtocolMode::AnyMotion)
        }
        MouseEventKind::Moved => matches!(mode, MouseProtocolMode::AnyMotion),
        MouseEventKind::ScrollLeft | MouseEventKind::ScrollRight => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use tokio::time::{timeout, Duration};

    fn decl_shell(shell: &str) -> ProcDecl { ProcDecl::from_shell(shell, shell) }

    fn new_proc(
        decl: ProcDecl,
    ) -> (Proc, UnboundedReceiver<(ProcId, ProcEvent)>) {
        let (tx, rx) = unbounded_channel();
        (Proc::new(1, decl, tx, 10, 40, 100), rx)
    }

    /// Pump supervisor events until the predicate holds or time runs out.
    async fn pump_until(
        proc: &mut Proc,
        rx: &mut UnboundedReceiver<(ProcId, ProcEvent)>,
        deadline: Duration,
        mut pred: impl FnMut(&Proc) -> bool,
    ) -> bool {
        let result = timeout(deadline, async {
            loop {
                if pred(proc) {
                    return;
                }
                let Some((_, event)) = rx.recv().await else { return };
                proc.handle_event(event);
            }
        })
        .await;
        result.is_ok() && pred(proc)
    }

    #[tokio::test]
    async fn test_kind_live_iff_running_or_stopping() {
        let (mut proc, mut rx) = new_proc(decl_shell("sleep 30"));
        assert!(proc.is_stopped());
        assert!(!proc.has_kind());

        proc.start();
        assert_eq!(proc.status(), ProcStatus::Running);
        assert!(proc.has_kind());

        proc.kill();
        assert_eq!(proc.status(), ProcStatus::Stopping);
        assert!(proc.has_kind());

        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(10), Proc::is_stopped)
                .await
        );
        assert!(!proc.has_kind());
    }

    #[tokio::test]
    async fn test_start_and_stop_are_noops_in_wrong_states() {
        let (mut proc, mut rx) = new_proc(decl_shell("sleep 30"));

        // stop() on Stopped is a no-op.
        proc.stop();
        assert!(proc.is_stopped());

        proc.start();
        let pid_before = proc.kind.as_ref().and_then(ProcKind::pid);
        // start() on Running is a no-op: same child keeps running.
        proc.start();
        assert_eq!(proc.kind.as_ref().and_then(ProcKind::pid), pid_before);

        proc.kill();
        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(10), Proc::is_stopped)
                .await
        );
    }

    #[tokio::test]
    async fn test_state_transitions_observed_in_causal_order() {
        use std::{cell::RefCell, rc::Rc};

        let (mut proc, mut rx) = new_proc(decl_shell("sleep 30"));
        let seen: Rc<RefCell<Vec<ProcStatus>>> = Rc::default();
        let sink = seen.clone();
        let _sub = proc
            .on_state_change()
            .subscribe(move |status| sink.borrow_mut().push(*status));

        proc.start();
        proc.kill();
        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(10), Proc::is_stopped)
                .await
        );

        assert_eq!(
            &*seen.borrow(),
            &[ProcStatus::Running, ProcStatus::Stopping, ProcStatus::Stopped]
        );
    }

    #[tokio::test]
    async fn test_exit_recorded_with_status() {
        let (mut proc, mut rx) = new_proc(decl_shell("exit 7"));
        proc.start();
        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(10), Proc::is_stopped)
                .await
        );
        let info = proc.last_exit().unwrap();
        assert!(!info.success);
        assert_eq!(info.code, 7);
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_stopped_with_error() {
        let decl = ProcDecl {
            cmd: crate::config::CmdSpec::Cmd(vec!["/nonexistent-devmux-binary".into()]),
            ..decl_shell("x")
        };
        let (mut proc, _rx) = new_proc(decl);
        proc.start();
        assert!(proc.is_stopped());
        assert!(!proc.has_kind());
        assert!(proc.last_error().is_some());
        let info = proc.last_exit().unwrap();
        assert!(!info.success);
    }

    #[tokio::test]
    async fn test_output_feeds_vterm_and_fires_rerender() {
        use std::{cell::Cell, rc::Rc};

        let (mut proc, mut rx) = new_proc(decl_shell("printf 'hi\\n'"));
        let rendered: Rc<Cell<u32>> = Rc::default();
        let sink = rendered.clone();
        let _sub = proc.on_rerender().subscribe(move |()| sink.set(sink.get() + 1));

        proc.start();
        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(10), |p| {
                p.is_stopped()
            })
            .await
        );
        assert!(rendered.get() > 0, "output must trigger rerender");
        // The grid retains the output after the exit?  No: the kind is gone
        // in Stopped, so the painter shows the DOWN badge instead.
        assert!(proc.vterm().is_none());
    }

    #[tokio::test]
    async fn test_vterm_shows_child_output_while_running() {
        let (mut proc, mut rx) = new_proc(decl_shell("printf 'hi'; sleep 30"));
        proc.start();

        let saw_output = pump_until(&mut proc, &mut rx, Duration::from_secs(10), |p| {
            p.vterm()
                .map(|vt| {
                    vt.screen().cell(0, 0).map(|c| c.ch) == Some('h')
                        && vt.screen().cell(0, 1).map(|c| c.ch) == Some('i')
                })
                .unwrap_or(false)
        })
        .await;
        assert!(saw_output, "child output must land on the grid");

        proc.kill();
        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(10), Proc::is_stopped)
                .await
        );
    }

    #[tokio::test]
    async fn test_restart_cycles_through_stopped() {
        let (mut proc, mut rx) = new_proc(decl_shell("sleep 30"));
        proc.start();
        let first_pid = proc.kind.as_ref().and_then(ProcKind::pid);

        proc.restart(true);
        // After the old child dies the proc must come back up by itself.
        let restarted = pump_until(&mut proc, &mut rx, Duration::from_secs(10), |p| {
            p.status() == ProcStatus::Running
                && p.kind.as_ref().and_then(ProcKind::pid) != first_pid
        })
        .await;
        assert!(restarted, "restart must spawn a fresh child");

        proc.kill();
        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(10), Proc::is_stopped)
                .await
        );
    }

    #[tokio::test]
    async fn test_autorestart_after_unexpected_exit() {
        use std::{cell::RefCell, rc::Rc};

        let decl = ProcDecl {
            autorestart: true,
            ..decl_shell("false")
        };
        let (mut proc, mut rx) = new_proc(decl);

        let seen: Rc<RefCell<Vec<ProcStatus>>> = Rc::default();
        let sink = seen.clone();
        let _sub = proc
            .on_state_change()
            .subscribe(move |status| sink.borrow_mut().push(*status));

        proc.start();
        // Two Stopped transitions with a Running phase between them.
        let cycled = pump_until(&mut proc, &mut rx, Duration::from_secs(5), |_| {
            seen.borrow()
                .iter()
                .filter(|s| **s == ProcStatus::Stopped)
                .count()
                >= 2
        })
        .await;
        assert!(cycled, "autorestart must cycle: {:?}", seen.borrow());

        let stopped_runs: Vec<ProcStatus> = seen.borrow().clone();
        assert!(stopped_runs
            .windows(2)
            .any(|w| w == [ProcStatus::Stopped, ProcStatus::Running]));
    }

    #[tokio::test]
    async fn test_send_key_discarded_when_stopped() {
        let (mut proc, _rx) = new_proc(decl_shell("cat"));
        // Nothing to deliver to; must not panic or spawn anything.
        proc.send_key(&Key::parse("x").unwrap());
        assert!(proc.is_stopped());
    }

    #[tokio::test]
    async fn test_key_echoed_by_cat_lands_in_vterm() {
        let (mut proc, mut rx) = new_proc(decl_shell("cat"));
        proc.start();

        proc.send_key(&Key::parse("x").unwrap());
        proc.send_key(&Key::parse("<Enter>").unwrap());

        // The PTY echoes the keystrokes; they must appear on the grid.
        let echoed = pump_until(&mut proc, &mut rx, Duration::from_secs(10), |p| {
            p.vterm()
                .map(|vt| vt.screen().cell(0, 0).map(|c| c.ch) == Some('x'))
                .unwrap_or(false)
        })
        .await;
        assert!(echoed, "echo of forwarded key must reach the emulator");

        proc.kill();
        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(10), Proc::is_stopped)
                .await
        );
    }

    #[tokio::test]
    async fn test_resize_propagates_to_vterm() {
        let (mut proc, mut rx) = new_proc(decl_shell("sleep 30"));
        proc.start();

        proc.resize(20, 90);
        let vt = proc.vterm().unwrap();
        assert_eq!(vt.screen().rows(), 20);
        assert_eq!(vt.screen().cols(), 90);

        // Idempotent.
        proc.resize(20, 90);
        let vt = proc.vterm().unwrap();
        assert_eq!((vt.screen().rows(), vt.screen().cols()), (20, 90));

        proc.kill();
        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(10), Proc::is_stopped)
                .await
        );
    }

    #[tokio::test]
    async fn test_simple_kind_collects_lines_and_ignores_resize() {
        let decl = ProcDecl {
            tty: false,
            ..decl_shell("printf 'one\\ntwo\\n'; sleep 30")
        };
        let (mut proc, mut rx) = new_proc(decl);
        proc.start();
        assert!(proc.vterm().is_none());

        let got_lines = pump_until(&mut proc, &mut rx, Duration::from_secs(10), |p| {
            p.lines().map(|l| l.lines().len() >= 2).unwrap_or(false)
        })
        .await;
        assert!(got_lines);
        let lines = proc.lines().unwrap();
        assert_eq!(lines.lines().front().unwrap(), "one");

        proc.resize(50, 200);
        assert!(proc.lines().is_some());

        proc.kill();
        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(10), Proc::is_stopped)
                .await
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_soft_stop_interrupts_child() {
        let decl = ProcDecl {
            stop: StopSignal::Sigint,
            ..decl_shell("sleep 30")
        };
        let (mut proc, mut rx) = new_proc(decl);
        proc.start();

        proc.stop();
        assert_eq!(proc.status(), ProcStatus::Stopping);
        // SIGINT alone must end sleep well before the SIGTERM escalation.
        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(4), Proc::is_stopped)
                .await,
            "SIGINT should stop the child without escalation"
        );
    }

    #[tokio::test]
    async fn test_send_keys_stop_arms_timeout_and_kills() {
        // An empty key list never reaches the child, so only the timeout
        // fallback can end it.
        let decl = ProcDecl {
            stop: StopSignal::SendKeys(Vec::new()),
            ..decl_shell("sleep 30")
        };
        let (mut proc, mut rx) = new_proc(decl);
        proc.start();

        proc.stop();
        assert_eq!(proc.status(), ProcStatus::Stopping);
        assert!(proc.escalation.is_some(), "send-keys stop must arm a timeout");

        // Fire the timeout without waiting out the delay.
        proc.handle_event(ProcEvent::StopTimeout);
        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(10), Proc::is_stopped)
                .await,
            "stop timeout must fall back to a hard kill"
        );
    }

    #[tokio::test]
    async fn test_stop_timeout_ignored_outside_stopping() {
        let (mut proc, mut rx) = new_proc(decl_shell("sleep 30"));
        proc.start();

        // A stale timeout must not kill a proc that is merely Running.
        proc.handle_event(ProcEvent::StopTimeout);
        assert_eq!(proc.status(), ProcStatus::Running);

        proc.kill();
        assert!(
            pump_until(&mut proc, &mut rx, Duration::from_secs(10), Proc::is_stopped)
                .await
        );
        proc.handle_event(ProcEvent::StopTimeout);
        assert!(proc.is_stopped());
    }
}
