// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Engine and main event loop: owns the process array, the UI state, the
//! keymap, and the render scheduler, and multiplexes input events, process
//! I/O, remote commands, and frame requests on one task.
//!
//! All mutable core state lives here and is touched only from this task;
//! the blocking PTY reads re-enter through the proc event channel, so no
//! locks guard the emulators or the UI state.

use std::{cell::Cell, io::Stdout, rc::Rc};

use crossterm::{event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream,
                        KeyEventKind, MouseEvent, MouseEventKind},
                execute,
                terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen,
                           LeaveAlternateScreen}};
use futures::StreamExt;
use miette::IntoDiagnostic;
use ratatui::{backend::{Backend, CrosstermBackend},
              layout::Rect,
              Terminal};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{config::{Config, ProcDecl},
            event::AppEvent,
            key::Key,
            keymap::Keymap,
            listener::Subscription,
            proc::{Proc, ProcEvent, ProcId},
            render::RenderScheduler,
            server::{self, ServerTask},
            ui::{self, Focus, UiState}};

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Hard ceiling on a graceful quit: the longest stop ladder is two
/// escalation delays, so anything still alive after this is force-killed
/// and the loop exits.
const QUIT_HARD_DEADLINE: std::time::Duration = std::time::Duration::from_secs(12);

/// Run the multiplexer: set the host terminal up, run the engine, and
/// restore the terminal on every exit path.
///
/// # Errors
///
/// Returns an error for pre-UI failures (server bind, terminal setup) and
/// catastrophic painter failures; per-process errors stay inside the loop.
pub async fn run(config: Config) -> miette::Result<()> {
    let mut server_task = match &config.server {
        Some(addr) => Some(server::spawn(addr.clone()).await?),
        None => None,
    };

    let _guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal: Tui = Terminal::new(backend).into_diagnostic()?;

    let mut app = App::new(config);
    if let Some(commands) = server_task.as_mut().and_then(ServerTask::take_commands) {
        app.attach_remote(commands);
    }
    let result = app.main_loop(&mut terminal).await;

    if let Some(server_task) = server_task {
        server_task.shutdown();
    }
    result
}

/// Restores the host terminal (raw mode, alternate screen, mouse capture)
/// when dropped, so panics and early returns cannot leave it wedged.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> miette::Result<Self> {
        enable_raw_mode().into_diagnostic()?;
        execute!(std::io::stdout(), EnterAlternateScreen, EnableMouseCapture)
            .into_diagnostic()?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _unused = disable_raw_mode();
        let _unused = execute!(
            std::io::stdout(),
            LeaveAlternateScreen,
            DisableMouseCapture,
            crossterm::cursor::Show
        );
    }
}

pub struct App {
    config: Config,
    keymap: Keymap,
    ui: UiState,

    procs: Vec<Proc>,
    next_proc_id: ProcId,
    /// Mirror of the selected proc's id, read by the per-proc rerender
    /// listeners.
    selected_id: Rc<Cell<Option<ProcId>>>,
    proc_subs: Vec<Subscription>,

    proc_tx: UnboundedSender<(ProcId, ProcEvent)>,
    proc_rx: UnboundedReceiver<(ProcId, ProcEvent)>,
    remote_rx: Option<UnboundedReceiver<AppEvent>>,

    scheduler: RenderScheduler,

    quitting: bool,
    /// Armed by [`App::quit`]; when it elapses, remaining procs are
    /// force-killed so the loop always terminates.
    quit_deadline: Option<tokio::time::Instant>,
    force_quit: bool,
}

impl App {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let (proc_tx, proc_rx) = unbounded_channel();
        Self {
            config,
            keymap: Keymap::new(),
            ui: UiState::new(),
            procs: Vec::new(),
            next_proc_id: 1,
            selected_id: Rc::new(Cell::new(None)),
            proc_subs: Vec::new(),
            proc_tx,
            proc_rx,
            remote_rx: None,
            scheduler: RenderScheduler::new(),
            quitting: false,
            quit_deadline: None,
            force_quit: false,
        }
    }

    /// Wire the remote control command stream into the event loop.
    pub fn attach_remote(&mut self, commands: UnboundedReceiver<AppEvent>) {
        self.remote_rx = Some(commands);
    }

    async fn main_loop<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> miette::Result<()> {
        // Initial render first: child PTY sizes derive from the layout, so
        // the UI sizing must be known before any spawn.
        let (cols, rows) = crossterm::terminal::size().into_diagnostic()?;
        self.handle_resize(cols, rows);
        self.draw(terminal)?;

        self.start_procs();
        self.draw(terminal)?;

        let mut input = EventStream::new();

        loop {
            tokio::select! {
                maybe_event = input.next() => match maybe_event {
                    Some(Ok(event)) => self.handle_term_event(event),
                    Some(Err(e)) => tracing::warn!("Input stream error: {e}"),
                    None => {
                        tracing::debug!("Input stream ended");
                        self.handle_app_event(AppEvent::ForceQuit);
                    }
                },
                Some((id, event)) = self.proc_rx.recv() => {
                    self.dispatch_proc_event(id, event);
                },
                Some(command) = recv_remote(&mut self.remote_rx) => {
                    tracing::debug!("Remote command: {command:?}");
                    self.handle_app_event(command);
                },
                () = self.scheduler.next_render() => {
                    self.draw(terminal)?;
                },
                () = deadline_elapsed(self.quit_deadline) => {
                    self.on_quit_deadline();
                },
            }

            if self.force_quit {
                break;
            }
            if self.quitting && self.procs.iter().all(Proc::is_stopped) {
                break;
            }
        }

        Ok(())
    }

    /// Construct every declared proc and start the autostart ones.
    fn start_procs(&mut self) {
        let decls: Vec<ProcDecl> = self.config.procs.clone();
        for decl in decls {
            let autostart = decl.autostart;
            self.add_proc(decl, autostart);
        }
        self.sync_selected_id();
    }

    fn add_proc(&mut self, decl: ProcDecl, start: bool) {
        let id = self.next_proc_id;
        self.next_proc_id += 1;

        let area = self.ui.term_area;
        let mut proc = Proc::new(
            id,
            decl,
            self.proc_tx.clone(),
            area.height,
            area.width,
            self.config.scrollback_len,
        );

        // Re-render only when this proc is the selected one; bursts from
        // background procs must not produce frames.
        let scheduler = self.scheduler.clone();
        let selected = self.selected_id.clone();
        self.proc_subs.push(proc.on_rerender().subscribe(move |()| {
            if selected.get() == Some(id) {
                scheduler.schedule();
            }
        }));
        // State badges are visible in the list pane for every proc.
        let scheduler = self.scheduler.clone();
        self.proc_subs
            .push(proc.on_state_change().subscribe(move |_| scheduler.schedule()));

        if start {
            proc.start();
        }
        self.procs.push(proc);
        self.sync_selected_id();
        self.scheduler.schedule();
    }

    fn sync_selected_id(&mut self) {
        self.ui.clamp_selected(self.procs.len());
        self.selected_id
            .set(self.procs.get(self.ui.selected()).map(Proc::id));
    }

    fn selected_proc_mut(&mut self) -> Option<&mut Proc> {
        let index = self.ui.selected();
        self.procs.get_mut(index)
    }

    fn dispatch_proc_event(&mut self, id: ProcId, event: ProcEvent) {
        if let Some(proc) = self.procs.iter_mut().find(|p| p.id() == id) {
            proc.handle_event(event);
        }
    }

    fn draw<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> miette::Result<()> {
        let ui_state = &self.ui;
        let procs = &self.procs;
        let keymap = &self.keymap;
        terminal
            .draw(|frame| ui::render(frame, ui_state, procs, keymap))
            .into_diagnostic()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Input dispatch.
    // ------------------------------------------------------------------

    fn handle_term_event(&mut self, event: Event) {
        match event {
            Event::Key(key_event) => {
                if key_event.kind == KeyEventKind::Release {
                    return;
                }
                self.handle_key(Key::from(key_event));
            }
            Event::Resize(cols, rows) => self.handle_resize(cols, rows),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            _ => {}
        }
    }

    /// Keymap lookup in the active scope; unbound keys go to the focused
    /// process when the terminal pane has focus, and are dropped otherwise.
    fn handle_key(&mut self, key: Key) {
        if let Some(action) = self.keymap.resolve(self.ui.focus, &key).cloned() {
            self.handle_app_event(action);
        } else if self.ui.focus == Focus::Term {
            if let Some(proc) = self.selected_proc_mut() {
                proc.send_key(&key);
            }
        }
    }

    fn handle_resize(&mut self, cols: u16, rows: u16) {
        let size = Rect::new(0, 0, cols, rows);
        let areas = ui::compute_areas(size);
        self.ui.term_size = size;
        self.ui.term_area = areas.term_inner;
        self.ui.procs_area = areas.procs;

        let (rows, cols) = (areas.term_inner.height, areas.term_inner.width);
        for proc in &mut self.procs {
            proc.resize(rows, cols);
        }
        self.scheduler.schedule();
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let pos = ratatui::layout::Position::new(mouse.column, mouse.row);
        if self.ui.procs_area.contains(pos) {
            match mouse.kind {
                MouseEventKind::Down(_) => {
                    // Rows start below the pane border.
                    let row = mouse.row.saturating_sub(self.ui.procs_area.y + 1);
                    let index = row as usize;
                    if index < self.procs.len() {
                        self.ui.select(index, self.procs.len());
                        self.sync_selected_id();
                        self.scheduler.schedule();
                    }
                }
                MouseEventKind::ScrollUp => self.handle_app_event(AppEvent::PrevProc),
                MouseEventKind::ScrollDown => self.handle_app_event(AppEvent::NextProc),
                _ => {}
            }
        } else if self.ui.term_area.contains(pos) {
            let area = self.ui.term_area;
            let translated = MouseEvent {
                column: mouse.column - area.x,
                row: mouse.row - area.y,
                ..mouse
            };
            if let Some(proc) = self.selected_proc_mut() {
                proc.handle_mouse(translated);
            }
        }
    }

    // ------------------------------------------------------------------
    // Actions (keymap and remote commands).
    // ------------------------------------------------------------------

    pub fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Quit => self.quit(),
            AppEvent::ForceQuit => {
                for proc in &mut self.procs {
                    proc.kill();
                }
                self.force_quit = true;
            }

            AppEvent::ToggleFocus => {
                self.ui.focus = self.ui.focus.toggle();
                self.scheduler.schedule();
            }
            AppEvent::FocusProcs => {
                self.ui.focus = Focus::Procs;
                self.scheduler.schedule();
            }
            AppEvent::FocusTerm => {
                self.ui.focus = Focus::Term;
                self.scheduler.schedule();
            }

            AppEvent::NextProc => {
                self.ui.select_next(self.procs.len());
                self.sync_selected_id();
                self.scheduler.schedule();
            }
            AppEvent::PrevProc => {
                self.ui.select_prev(self.procs.len());
                self.sync_selected_id();
                self.scheduler.schedule();
            }
            AppEvent::SelectProc { index } => {
                self.ui.select(index, self.procs.len());
                self.sync_selected_id();
                self.scheduler.schedule();
            }

            AppEvent::StartProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.start();
                }
            }
            AppEvent::TermProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.stop();
                }
            }
            AppEvent::KillProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.kill();
                }
            }
            AppEvent::RestartProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.restart(false);
                }
            }
            AppEvent::ForceRestartProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.restart(true);
                }
            }

            AppEvent::AddProc { cmd, name } => {
                let name = name.unwrap_or_else(|| cmd.clone());
                self.add_proc(ProcDecl::from_shell(name, cmd), true);
            }
            AppEvent::RemoveProc { id } => self.remove_proc(id),
            AppEvent::RenameProc { name } => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.name = name;
                    self.scheduler.schedule();
                }
            }

            AppEvent::ScrollUp => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.scroll_half_page_up();
                }
            }
            AppEvent::ScrollDown => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.scroll_half_page_down();
                }
            }
            AppEvent::ScrollUpLines { n } => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.scroll_up_lines(n);
                }
            }
            AppEvent::ScrollDownLines { n } => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.scroll_down_lines(n);
                }
            }

            AppEvent::SendKey { key } => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.send_key(&key);
                }
            }

            AppEvent::Batch { cmds } => {
                for cmd in cmds {
                    self.handle_app_event(cmd);
                }
            }
        }
    }

    /// Issue a stop on every proc; the loop completes once all Stopped
    /// transitions are observed, or once the hard deadline force-kills the
    /// stragglers. Stop errors never block completion.
    fn quit(&mut self) {
        if self.quitting {
            return;
        }
        self.quitting = true;
        self.quit_deadline = Some(tokio::time::Instant::now() + QUIT_HARD_DEADLINE);
        for proc in &mut self.procs {
            proc.stop();
        }
        self.scheduler.schedule();
    }

    fn on_quit_deadline(&mut self) {
        tracing::warn!("Quit deadline reached; force-killing remaining procs");
        for proc in &mut self.procs {
            proc.kill();
        }
        self.force_quit = true;
    }

    fn remove_proc(&mut self, id: ProcId) {
        let Some(index) = self.procs.iter().position(|p| p.id() == id) else {
            tracing::warn!("remove-proc: no proc with id {id}");
            return;
        };
        let mut proc = self.procs.remove(index);
        if !proc.is_stopped() {
            proc.kill();
            // The exit event still arrives on the shared channel but finds
            // no proc; the child is already dead by then.
        }
        self.sync_selected_id();
        self.scheduler.schedule();
    }
}

/// Receive from the remote command stream, pending forever when absent.
async fn recv_remote(rx: &mut Option<UnboundedReceiver<AppEvent>>) -> Option<AppEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Sleep until the quit deadline, pending forever while none is armed.
async fn deadline_elapsed(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
