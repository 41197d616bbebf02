// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Remote control server: accepts TCP connections and parses one YAML
//! command document per line into [`AppEvent`]s for the engine.

use miette::IntoDiagnostic;
use tokio::{io::{AsyncBufReadExt, BufReader},
            net::TcpListener,
            sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
            task::JoinHandle};

use crate::event::AppEvent;

/// Default listen/connect address for the control socket.
pub const DEFAULT_ADDR: &str = "127.0.0.1:4050";

/// A running control server; shut down explicitly or when dropped.
pub struct ServerTask {
    handle: JoinHandle<()>,
    commands: Option<UnboundedReceiver<AppEvent>>,
}

impl ServerTask {
    /// The command stream for the engine. Yields `None` after the first
    /// call.
    pub fn take_commands(&mut self) -> Option<UnboundedReceiver<AppEvent>> {
        self.commands.take()
    }

    pub fn shutdown(self) { self.handle.abort(); }
}

impl Drop for ServerTask {
    fn drop(&mut self) { self.handle.abort(); }
}

/// Bind the control socket. Binding happens before the TUI starts, so a
/// busy port is reported as a fatal startup error.
///
/// # Errors
///
/// Returns an error when the address cannot be bound.
pub async fn spawn(addr: String) -> miette::Result<ServerTask> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| miette::miette!("Cannot bind control socket {}: {}", addr, e))?;
    tracing::info!("Control server listening on {addr}");

    let (tx, rx) = unbounded_channel();
    let handle = tokio::spawn(accept_loop(listener, tx));

    Ok(ServerTask {
        handle,
        commands: Some(rx),
    })
}

async fn accept_loop(listener: TcpListener, tx: UnboundedSender<AppEvent>) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Control socket accept failed: {e}");
                continue;
            }
        };
        tracing::debug!("Control connection from {peer}");

        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(socket).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_yaml::from_str::<AppEvent>(line) {
                            Ok(event) => {
                                if tx.send(event).is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Bad control command '{line}': {e}");
                            }
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        tracing::debug!("Control connection error: {e}");
                        return;
                    }
                }
            }
        });
    }
}

/// Send one command to a running instance and return. Used by `--ctl`.
///
/// # Errors
///
/// Returns an error when the command does not parse or the instance is
/// unreachable.
pub async fn send_command(addr: &str, yaml: &str) -> miette::Result<()> {
    use tokio::io::AsyncWriteExt;

    // Validate locally so typos are reported without a round trip.
    let event: AppEvent = serde_yaml::from_str(yaml)
        .map_err(|e| miette::miette!("Invalid control command: {}", e))?;

    // JSON is single-line YAML, which keeps the framing line-delimited.
    let mut line = serde_json::to_string(&event).into_diagnostic()?;
    line.push('\n');

    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .map_err(|e| miette::miette!("Cannot reach control socket {}: {}", addr, e))?;
    stream.write_all(line.as_bytes()).await.into_diagnostic()?;
    stream.shutdown().await.into_diagnostic()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_spawn_binds_and_hands_out_commands_once() {
        let mut server = spawn("127.0.0.1:0".to_string()).await.unwrap();
        assert!(server.take_commands().is_some());
        assert!(server.take_commands().is_none());
        server.shutdown();
    }

    #[tokio::test]
    async fn test_round_trip_over_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, mut rx) = unbounded_channel();
        let handle = tokio::spawn(accept_loop(listener, tx));

        send_command(&addr, "{c: select-proc, index: 3}").await.unwrap();
        send_command(&addr, "{c: quit}").await.unwrap();

        let first = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, AppEvent::SelectProc { index: 3 });
        let second = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second, AppEvent::Quit);

        handle.abort();
    }

    #[tokio::test]
    async fn test_invalid_command_rejected_client_side() {
        let result = send_command("127.0.0.1:1", "{c: no-such-command}").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_bad_lines_skipped_server_side() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, mut rx) = unbounded_channel();
        let handle = tokio::spawn(accept_loop(listener, tx));

        use tokio::io::AsyncWriteExt;
        let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
        stream
            .write_all(b"this is not yaml: [\n{c: focus-term}\n")
            .await
            .unwrap();
        stream.shutdown().await.unwrap();

        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, AppEvent::FocusTerm);

        handle.abort();
    }
}
