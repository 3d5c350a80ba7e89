//! JSON-lines Unix-socket listener.
//!
//! One request per line, one response per line. Stale socket files are
//! removed before binding, and the accept loop drains when shutdown is
//! requested. Anything beyond line framing (HTTP, auth, request
//! timeouts) is a transport concern outside the engine's contract.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use crate::dispatch::dispatch;
use crate::protocol::{CommandRequest, CommandResponse};
use crate::state::SharedState;

/// Binds the command socket, removing a stale socket file first.
///
/// # Errors
///
/// Returns an error if the socket cannot be bound.
pub fn bind(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("removing stale socket {}", path.display()))?;
    }
    UnixListener::bind(path).with_context(|| format!("binding socket {}", path.display()))
}

/// Serves commands until shutdown is requested.
///
/// # Errors
///
/// Returns an error only on accept failures; per-connection errors are
/// logged and dropped.
pub async fn serve(listener: UnixListener, state: SharedState) -> Result<()> {
    info!("command socket ready");

    loop {
        if state.is_shutdown_requested() {
            info!("shutdown requested, closing command socket");
            return Ok(());
        }

        let (stream, _addr) = tokio::select! {
            accepted = listener.accept() => accepted.context("accepting connection")?,
            () = shutdown_tick(&state) => continue,
        };

        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, &state).await {
                warn!(%err, "connection closed with error");
            }
        });
    }
}

/// Polls the shutdown flag so the accept loop can drain without a signal.
async fn shutdown_tick(state: &SharedState) {
    while !state.is_shutdown_requested() {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

async fn handle_connection(stream: UnixStream, state: &SharedState) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<CommandRequest>(&line) {
            Ok(request) => {
                debug!(?request, "dispatching command");
                dispatch(state, request).await
            }
            Err(err) => CommandResponse::Error {
                message: format!("malformed request: {err}"),
            },
        };

        let mut payload = serde_json::to_vec(&response)?;
        payload.push(b'\n');
        write_half.write_all(&payload).await?;
    }

    Ok(())
}
