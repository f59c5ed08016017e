// carta-spawner/src/probe.rs
// Liveness probe: open a websocket to the worker's advertised port, send a
// PING text frame and expect PONG back within the caller's deadline.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("expected PONG, got {0}")]
    UnexpectedReply(String),
    #[error("connection closed before reply")]
    Closed,
}

/// Checks that the worker on `port` answers PING with PONG.
pub async fn probe_worker(port: u16, deadline: Duration) -> Result<(), ProbeError> {
    match tokio::time::timeout(deadline, probe_inner(port)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(deadline)),
    }
}

async fn probe_inner(port: u16) -> Result<(), ProbeError> {
    let url = format!("ws://localhost:{}", port);
    let (mut ws, _) = connect_async(&url).await?;

    ws.send(Message::text("PING")).await?;

    match ws.next().await {
        Some(Ok(Message::Text(reply))) if reply.as_str() == "PONG" => Ok(()),
        Some(Ok(other)) => Err(ProbeError::UnexpectedReply(format!("{:?}", other))),
        Some(Err(e)) => Err(e.into()),
        None => Err(ProbeError::Closed),
    }
}
