// carta-controller/src/session/endpoint.rs
// A session's attachment to one worker: the outbound connection, a bounded
// send queue drained by a single send pump, and a receive pump that
// forwards worker frames to the client send queue.

use axum::extract::ws::Message as ClientMessage;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use carta_proto::{decode_header, encode_frame, messages, EventType, FrameError};

use crate::spawner_client::WorkerInfo;

/// Outbound send queue capacity per worker. A full queue blocks the
/// producer; that backpressure is the signal that the worker is too slow.
pub const SEND_QUEUE_CAPACITY: usize = 100;

type WorkerSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("could not connect to worker at {url}: {source}")]
    Dial {
        url: String,
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[error("worker dial aborted by session shutdown")]
    Cancelled,
    #[error("worker send queue is closed")]
    QueueClosed,
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// An OPEN_FILE held back until the worker acknowledges the viewer
/// registration, keeping the original request id for correlation.
pub struct DeferredOpen {
    pub request: messages::OpenFile,
    pub request_id: u32,
}

/// Session-owned handle to one worker connection.
pub struct WorkerEndpoint {
    worker_id: String,
    label: String,
    send_tx: mpsc::Sender<Message>,
}

impl WorkerEndpoint {
    /// Dials the worker and starts both pumps. The dial is raced against
    /// the session's cancellation so a client disconnect aborts it.
    pub async fn connect(
        info: &WorkerInfo,
        deferred: Option<DeferredOpen>,
        client_tx: mpsc::Sender<ClientMessage>,
        cancel: CancellationToken,
    ) -> Result<WorkerEndpoint, EndpointError> {
        let url = format!("ws://{}:{}", info.address, info.port);
        let connect = tokio::select! {
            result = connect_async(&url) => result,
            _ = cancel.cancelled() => return Err(EndpointError::Cancelled),
        };
        let (socket, _) = connect.map_err(|source| EndpointError::Dial {
            url: url.clone(),
            source,
        })?;

        let label = match &deferred {
            Some(open) => format!("worker:{}", open.request.file_id),
            None => "shared-worker".to_string(),
        };
        debug!("Connected to {} at {}", label, url);

        let (sink, stream) = socket.split();
        let (send_tx, send_rx) = mpsc::channel(SEND_QUEUE_CAPACITY);

        tokio::spawn(send_pump(send_rx, sink, label.clone()));
        tokio::spawn(receive_pump(
            stream,
            send_tx.clone(),
            client_tx,
            deferred,
            label.clone(),
            cancel,
        ));

        Ok(WorkerEndpoint {
            worker_id: info.worker_id.clone(),
            label,
            send_tx,
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Enqueues one encoded frame for this worker. Blocks when the queue
    /// is full (backpressure).
    pub async fn enqueue(&self, frame: Vec<u8>) -> Result<(), EndpointError> {
        debug!("Proxying message from session to {}", self.label);
        self.send_tx
            .send(Message::binary(frame))
            .await
            .map_err(|_| EndpointError::QueueClosed)
    }

    /// Shuts the endpoint down: a close frame unblocks the receive pump,
    /// and dropping the queue sender drains the send pump.
    pub async fn disconnect(self) {
        let _ = self.send_tx.send(Message::Close(None)).await;
        debug!("Disconnected {}", self.label);
    }
}

/// Drains the send queue and writes each item to the worker socket. A
/// failed write drops that frame only; the pump keeps going until the
/// queue closes.
async fn send_pump(
    mut send_rx: mpsc::Receiver<Message>,
    mut sink: SplitSink<WorkerSocket, Message>,
    label: String,
) {
    while let Some(msg) = send_rx.recv().await {
        let len = msg.len();
        if let Err(e) = sink.send(msg).await {
            warn!("Error sending message to {}: {}", label, e);
            continue;
        }
        debug!(
            "Sent message of {} bytes to {}, {} buffered messages remaining",
            len,
            label,
            send_rx.len()
        );
    }
    debug!("Send pump for {} stopped", label);
}

/// Reads worker frames: answers liveness pings, releases the deferred
/// OPEN_FILE on REGISTER_VIEWER_ACK, and forwards everything else to the
/// client in receive order.
async fn receive_pump(
    mut stream: SplitStream<WorkerSocket>,
    send_tx: mpsc::Sender<Message>,
    client_tx: mpsc::Sender<ClientMessage>,
    mut deferred: Option<DeferredOpen>,
    label: String,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            next = stream.next() => next,
            _ = cancel.cancelled() => break,
        };
        let Some(result) = next else { break };
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Error reading message from {}: {}", label, e);
                break;
            }
        };

        match msg {
            // Worker-initiated liveness check.
            Message::Text(text) if text.as_str() == "PING" => {
                if send_tx.send(Message::text("PONG")).await.is_err() {
                    break;
                }
            }
            Message::Text(text) => {
                warn!("Ignoring non-binary message from {}: {}", label, text);
            }
            Message::Binary(data) => {
                let header = match decode_header(&data) {
                    Ok(header) => header,
                    Err(e) => {
                        warn!("Dropping frame from {}: {}", label, e);
                        continue;
                    }
                };

                if header.event_type == EventType::RegisterViewerAck as u16 {
                    if let Some(open) = deferred.take() {
                        // The worker is registered; release the held-back
                        // OPEN_FILE instead of forwarding the ack.
                        info!(
                            "Proxying OPEN_FILE to {} after REGISTER_VIEWER_ACK",
                            label
                        );
                        match encode_frame(&open.request, EventType::OpenFile, open.request_id) {
                            Ok(frame) => {
                                if send_tx.send(Message::binary(frame)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Failed to encode deferred OPEN_FILE for {}: {}", label, e);
                            }
                        }
                        continue;
                    }
                }

                debug!(
                    "Proxying message for event type {} from {} to client",
                    header.event_type, label
                );
                if client_tx.send(ClientMessage::Binary(data)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // Protocol-level ping/pong is handled by the library.
            _ => {}
        }
    }
    debug!("Receive pump for {} stopped", label);
}
