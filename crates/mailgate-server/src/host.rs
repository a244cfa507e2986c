//! Host messaging channel — line-delimited JSON over stdin/stdout.
//!
//! The dispatcher runs as a child process of the host. Requests come in one
//! JSON object per stdin line; completion replies go out the same way on
//! stdout. EOF on stdin means the host unloaded us.

use crate::dispatch::Dispatcher;
use crate::idle::IDLE_TIMEOUT;
use crate::protocol::{Reply, Request};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Notify};

/// Run the channel loop until the host disconnects or the idle stop fires.
pub async fn run(
    dispatcher: Dispatcher,
    stop: Arc<Notify>,
    mut replies: mpsc::Receiver<Reply>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    // Ready: arm the idle timer before the first request.
    dispatcher.arm_idle();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read from the host channel")? {
                    Some(line) => handle_line(&dispatcher, &line),
                    None => {
                        log::info!("Host channel closed, shutting down");
                        break;
                    }
                }
            }
            Some(reply) = replies.recv() => {
                write_reply(&mut stdout, &reply).await?;
            }
            _ = stop.notified() => {
                log::info!("Idle for {}s, stopping", IDLE_TIMEOUT.as_secs());
                break;
            }
        }
    }

    dispatcher.shutdown();
    Ok(())
}

async fn write_reply(stdout: &mut tokio::io::Stdout, reply: &Reply) -> Result<()> {
    let mut line = serde_json::to_string(reply).context("Failed to serialize reply")?;
    line.push('\n');
    stdout
        .write_all(line.as_bytes())
        .await
        .context("Failed to write to the host channel")?;
    stdout
        .flush()
        .await
        .context("Failed to flush the host channel")?;
    Ok(())
}

fn handle_line(dispatcher: &Dispatcher, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            log::warn!("Ignoring malformed request: {err}");
            return;
        }
    };

    if request.command != "send" {
        log::debug!("Ignoring command '{}'", request.command);
        return;
    }

    dispatcher.receive(request);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn dispatcher() -> (Dispatcher, mpsc::Receiver<Reply>) {
        let stop = Arc::new(Notify::new());
        let (tx, rx) = mpsc::channel(16);
        (Dispatcher::new(ServerConfig::default(), tx, stop), rx)
    }

    #[test]
    fn malformed_lines_are_ignored() {
        let (dispatcher, mut rx) = dispatcher();
        handle_line(&dispatcher, "not json at all");
        handle_line(&dispatcher, "{\"command\": \"send\", \"message\":");
        handle_line(&dispatcher, "");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn foreign_commands_are_ignored() {
        let (dispatcher, mut rx) = dispatcher();
        handle_line(
            &dispatcher,
            r#"{"command": "status", "message": {"text": "hi"}}"#,
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_without_message_is_a_noop() {
        let (dispatcher, mut rx) = dispatcher();
        handle_line(&dispatcher, r#"{"command": "send", "callback": "cb-1"}"#);
        assert!(rx.try_recv().is_err());
    }
}
