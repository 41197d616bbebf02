// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Pipe-based process transport for declarations with `tty: false`.
//!
//! The child runs with piped stdio instead of a PTY; its combined
//! stdout/stderr is accumulated into a line buffer (no emulation), and the
//! painter shows the most recent completed lines.

use std::collections::VecDeque;
use std::process::Stdio;

use miette::IntoDiagnostic;
use tokio::{io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
            process::Command,
            sync::mpsc::{unbounded_channel, UnboundedSender}};

use crate::config::ProcDecl;

use super::{ExitInfo, ProcEvent, ProcId};

/// Accumulates raw output bytes into completed lines.
///
/// Invariants: stored lines never contain `\n`; `\r` is dropped; a `\n`
/// closes the last-line buffer and pushes it onto the deque (oldest at the
/// front, bounded by `limit`).
#[derive(Debug)]
pub struct LineBuffer {
    lines: VecDeque<String>,
    last: String,
    /// Trailing bytes of an incomplete UTF-8 scalar from the previous chunk.
    pending: Vec<u8>,
    limit: usize,
}

impl LineBuffer {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            last: String::new(),
            pending: Vec::new(),
            limit,
        }
    }

    /// Feed a chunk of output. Returns true when anything changed.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return false;
        }

        self.pending.extend_from_slice(bytes);
        let buf = std::mem::take(&mut self.pending);

        let (text, rest) = match std::str::from_utf8(&buf) {
            Ok(text) => (text, &[][..]),
            Err(e) if e.error_len().is_none() => {
                // The chunk ends mid-scalar; keep the tail for next time.
                let valid = e.valid_up_to();
                (
                    std::str::from_utf8(&buf[..valid]).unwrap_or(""),
                    &buf[valid..],
                )
            }
            Err(_) => {
                // Genuinely invalid bytes; replace and move on.
                self.push_str(&String::from_utf8_lossy(&buf));
                return true;
            }
        };

        let text = text.to_string();
        self.pending = rest.to_vec();
        self.push_str(&text);
        true
    }

    fn push_str(&mut self, text: &str) {
        for ch in text.chars() {
            match ch {
                '\n' => {
                    let line = std::mem::take(&mut self.last);
                    self.lines.push_back(line);
                    while self.lines.len() > self.limit {
                        self.lines.pop_front();
                    }
                }
                '\r' => {}
                ch => self.last.push(ch),
            }
        }
    }

    /// Completed lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> &VecDeque<String> { &self.lines }

    /// The line still being accumulated (no `\n` seen yet).
    #[must_use]
    pub fn last_line(&self) -> &str { &self.last }
}

/// A live piped child.
#[derive(Debug)]
pub struct SimpleSession {
    input_tx: UnboundedSender<Vec<u8>>,
    kill_tx: UnboundedSender<()>,
    pid: Option<u32>,
}

impl SimpleSession {
    /// Spawn the declaration with piped stdio. Output and exit events
    /// arrive on `event_tx` tagged with `id`.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the child cannot be spawned.
    pub fn spawn(
        id: ProcId,
        decl: &ProcDecl,
        event_tx: UnboundedSender<(ProcId, ProcEvent)>,
    ) -> miette::Result<Self> {
        let (program, args) = decl.program_and_args()?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(env) = &decl.env {
            for (name, value) in env {
                match value {
                    Some(value) => {
                        cmd.env(name, value);
                    }
                    None => {
                        cmd.env_remove(name);
                    }
                }
            }
        }
        if let Some(cwd) = &decl.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().into_diagnostic()?;
        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            spawn_pipe_reader(id, stdout, event_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_pipe_reader(id, stderr, event_tx.clone());
        }

        let (input_tx, mut input_rx) = unbounded_channel::<Vec<u8>>();
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                while let Some(bytes) = input_rx.recv().await {
                    if let Err(e) = stdin.write_all(&bytes).await {
                        tracing::warn!("Pipe write failed, dropping {} bytes: {}", bytes.len(), e);
                    }
                    let _unused = stdin.flush().await;
                }
            });
        }

        let (kill_tx, mut kill_rx) = unbounded_channel::<()>();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    status = child.wait() => {
                        let info = match status {
                            Ok(status) => ExitInfo {
                                success: status.success(),
                                code: status
                                    .code()
                                    .map_or(u32::from(!status.success()), |c| c as u32),
                            },
                            Err(e) => {
                                tracing::warn!("wait() failed for piped child: {}", e);
                                ExitInfo { success: false, code: 1 }
                            }
                        };
                        let _unused = event_tx.send((id, ProcEvent::Exited(info)));
                        break;
                    }
                    Some(()) = kill_rx.recv() => {
                        if let Err(e) = child.start_kill() {
                            tracing::warn!("Failed to kill piped child: {}", e);
                        }
                    }
                }
            }
        });

        Ok(Self {
            input_tx,
            kill_tx,
            pid,
        })
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> { self.pid }

    /// Queue literal bytes for the child's stdin.
    pub fn write(&self, bytes: Vec<u8>) {
        if self.input_tx.send(bytes).is_err() {
            tracing::warn!("Pipe input channel closed; dropping write");
        }
    }

    /// Hard-kill the child.
    pub fn kill(&self) { let _unused = self.kill_tx.send(()); }

    #[cfg(unix)]
    pub fn send_signal(&self, signal: i32) {
        if let Some(pid) = self.pid {
            super::pty::send_signal_to_pid(pid, signal);
        }
    }
}

fn spawn_pipe_reader(
    id: ProcId,
    mut pipe: impl AsyncRead + Unpin + Send + 'static,
    event_tx: UnboundedSender<(ProcId, ProcEvent)>,
) {
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match pipe.read(&mut buf).await {
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_newline_closes_line() {
        let mut buf = LineBuffer::new(10);
        assert!(buf.push_bytes(b"hel"));
        assert_eq!(buf.last_line(), "hel");
        assert!(buf.lines().is_empty());

        buf.push_bytes(b"lo\nworld");
        assert_eq!(buf.lines().front().unwrap(), "hello");
        assert_eq!(buf.last_line(), "world");
    }

    #[test]
    fn test_carriage_returns_dropped() {
        let mut buf = LineBuffer::new(10);
        buf.push_bytes(b"a\r\nb\rc\n");
        let lines: Vec<&String> = buf.lines().iter().collect();
        assert_eq!(lines, ["a", "bc"]);
        assert!(buf.lines().iter().all(|l| !l.contains('\n') && !l.contains('\r')));
    }

    #[test]
    fn test_line_limit_evicts_oldest() {
        let mut buf = LineBuffer::new(2);
        buf.push_bytes(b"1\n2\n3\n");
        let lines: Vec<&String> = buf.lines().iter().collect();
        assert_eq!(lines, ["2", "3"]);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut buf = LineBuffer::new(10);
        let text = "жук\n".as_bytes();
        buf.push_bytes(&text[..3]);
        buf.push_bytes(&text[3..]);
        assert_eq!(buf.lines().front().unwrap(), "жук");
    }

    #[test]
    fn test_empty_chunk_reports_no_change() {
        let mut buf = LineBuffer::new(10);
        assert!(!buf.push_bytes(b""));
    }

    #[tokio::test]
    async fn test_simple_session_round_trip() {
        use tokio::time::{timeout, Duration};

        let decl = ProcDecl {
            tty: false,
            ..ProcDecl::from_shell("cat", "cat")
        };
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let session = SimpleSession::spawn(1, &decl, tx).unwrap();

        session.write(b"echo-me\n".to_vec());

        let mut output = Vec::new();
        let got = timeout(Duration::from_secs(10), async {
            loop {
                match rx.recv().await.unwrap() {
                    (_, ProcEvent::Output(bytes)) => {
                        output.extend(bytes);
                        if String::from_utf8_lossy(&output).contains("echo-me") {
                            break;
                        }
                    }
                    (_, ProcEvent::Exited(_)) => break,
                    (_, ProcEvent::AutorestartDue) | (_, ProcEvent::StopTimeout) => {}
                }
            }
        })
        .await;
        assert!(got.is_ok(), "child never echoed");

        session.kill();
        let exited = timeout(Duration::from_secs(10), async {
            loop {
                if let (_, ProcEvent::Exited(_)) = rx.recv().await.unwrap() {
                    break;
                }
            }
        })
        .await;
        assert!(exited.is_ok(), "kill must terminate the child");
    }
}
