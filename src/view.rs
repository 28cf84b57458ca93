/// Line-oriented console surface used as the application's main view.
///
/// `close()` only flips a watch channel, so it is safe to call from the
/// signal delivery thread; the `run` loop notices and returns.
use crate::runtime::RuntimeInfo;
use crate::shutdown::MainView;
use std::io::BufRead;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

/// Why [`ConsoleView::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `close()` was called, by a command or a stop request.
    Closed,
    /// The input stream ended (EOF on stdin).
    InputEnded,
}

pub struct ConsoleView {
    closed: watch::Sender<bool>,
}

impl Default for ConsoleView {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleView {
    pub fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self { closed }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Serve commands from `input`, writing replies to `out`, until closed or
    /// the input ends.
    pub async fn run<W>(
        &self,
        mut input: mpsc::Receiver<String>,
        mut out: W,
    ) -> std::io::Result<ExitReason>
    where
        W: AsyncWrite + Unpin,
    {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(ExitReason::Closed);
        }

        out.write_all(b"lifeline ready, type `help` for commands\n")
            .await?;
        out.flush().await?;

        loop {
            tokio::select! {
                changed = closed.changed() => {
                    // The sender lives in `self`, so this only errors if we are being torn down.
                    if changed.is_err() || *closed.borrow() {
                        out.write_all(b"shutting down\n").await?;
                        out.flush().await?;
                        return Ok(ExitReason::Closed);
                    }
                }
                line = input.recv() => {
                    let Some(line) = line else {
                        tracing::debug!("console input ended");
                        return Ok(ExitReason::InputEnded);
                    };
                    if let Some(reply) = self.dispatch(line.trim()) {
                        out.write_all(reply.as_bytes()).await?;
                        out.flush().await?;
                    }
                }
            }
        }
    }

    /// Handle one command line. Returns the text to print, if any.
    fn dispatch(&self, command: &str) -> Option<String> {
        match command {
            "" => None,
            "help" => Some("commands: help, version, info, quit\n".to_string()),
            "version" => Some(format!("lifeline {}\n", env!("CARGO_PKG_VERSION"))),
            "info" => Some(format_info(&RuntimeInfo::collect())),
            "quit" | "exit" => {
                self.close();
                None
            }
            other => Some(format!("unknown command: {other} (try `help`)\n")),
        }
    }
}

impl MainView for ConsoleView {
    fn close(&self) {
        tracing::debug!("console view close requested");
        self.closed.send_replace(true);
    }
}

/// Render runtime facts as `key: value` lines.
pub fn format_info(info: &RuntimeInfo) -> String {
    let executable = info
        .executable
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "version: {}\npid: {}\nplatform: {}/{} ({}-bit)\nexecutable: {}\nlocale: {}\n",
        info.version, info.pid, info.os, info.arch, info.pointer_width, executable, info.locale
    )
}

/// Read stdin on a dedicated thread and forward lines.
///
/// A blocking thread rather than `tokio::io::stdin`, which would keep the
/// runtime alive on shutdown while a read is pending.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    let spawned = std::thread::Builder::new()
        .name("lifeline-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        // The receiver sees a closed channel and `run` reports end of input.
        tracing::warn!(error = %e, "failed to spawn stdin reader");
    }
    rx
}
