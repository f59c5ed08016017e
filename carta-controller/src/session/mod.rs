// carta-controller/src/session/mod.rs
// Per-client session state: owns the shared worker, the per-file worker
// map, and the routing of every inbound frame.

pub mod endpoint;

use std::collections::HashMap;

use axum::extract::ws::Message as ClientMessage;
use prost::Message;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use carta_proto::{
    decode_header, encode_frame, encode_raw, extract_file_id, frame::HEADER_LEN, messages,
    registry, EventType, FrameError, FrameHeader,
};

use crate::auth::AuthenticatedUser;
use crate::session::endpoint::{DeferredOpen, EndpointError, WorkerEndpoint};
use crate::spawner_client::SpawnerClient;

/// Client send queue capacity. Matches the per-worker queue; a slow client
/// backpressures the receive pumps instead of growing memory.
pub const CLIENT_QUEUE_CAPACITY: usize = 100;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("missing worker connection")]
    MissingWorker,
    #[error("shared worker already registered")]
    AlreadyRegistered,
    #[error("invalid or missing request id")]
    InvalidRequestId,
    #[error("error parsing message: {0}")]
    Payload(#[from] prost::DecodeError),
    #[error("error starting worker: {0}")]
    WorkerStartup(#[source] anyhow::Error),
    #[error("error getting worker status: {0}")]
    WorkerStatus(#[source] anyhow::Error),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("no worker available to handle message")]
    NoWorker,
}

/// Worker routing state, mutated only under one lock because dispatch runs
/// one task per inbound frame.
#[derive(Default)]
struct RoutingTable {
    shared: Option<WorkerEndpoint>,
    files: HashMap<i32, WorkerEndpoint>,
}

/// One client connection's view of the backend.
pub struct Session {
    user: AuthenticatedUser,
    spawner: SpawnerClient,
    base_folder: String,
    client_tx: mpsc::Sender<ClientMessage>,
    routes: Mutex<RoutingTable>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(
        client_tx: mpsc::Sender<ClientMessage>,
        spawner: SpawnerClient,
        base_folder: String,
        user: AuthenticatedUser,
    ) -> Self {
        Self {
            user,
            spawner,
            base_folder,
            client_tx,
            routes: Mutex::new(RoutingTable::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Handles one inbound binary frame. Errors are recoverable: the
    /// caller logs them and the session stays up.
    pub async fn dispatch(&self, data: Vec<u8>) -> Result<(), SessionError> {
        // The prefix picks the handler and matches requests to responses.
        let header = decode_header(&data)?;
        let payload = &data[HEADER_LEN..];

        match header.known_type() {
            Some(EventType::RegisterViewer) => self.handle_register_viewer(header, payload).await,
            Some(EventType::OpenFile) => self.handle_open_file(header, payload).await,
            Some(EventType::EmptyEvent) => self.handle_status().await,
            _ => self.handle_proxied(header, payload).await,
        }
    }

    fn check_request_id(header: &FrameHeader) -> Result<(), SessionError> {
        if header.request_id == 0 {
            return Err(SessionError::InvalidRequestId);
        }
        Ok(())
    }

    /// REGISTER_VIEWER is the first message of a session; it brings up the
    /// shared worker and is the only opcode allowed before one exists.
    async fn handle_register_viewer(
        &self,
        header: FrameHeader,
        payload: &[u8],
    ) -> Result<(), SessionError> {
        Self::check_request_id(&header)?;
        let register = messages::RegisterViewer::decode(payload)?;

        if self.routes.lock().await.shared.is_some() {
            return Err(SessionError::AlreadyRegistered);
        }

        let info = self
            .spawner
            .start_worker(&self.base_folder, &self.user.username)
            .await
            .map_err(SessionError::WorkerStartup)?;
        info!(
            "Worker {} started for session {} and is available at {}:{}",
            info.worker_id, register.session_id, info.address, info.port
        );

        let endpoint = WorkerEndpoint::connect(
            &info,
            None,
            self.client_tx.clone(),
            self.cancel.child_token(),
        )
        .await?;

        // The ack flows back through the endpoint's receive pump and on to
        // the client.
        let frame = encode_frame(&register, EventType::RegisterViewer, header.request_id)?;
        endpoint.enqueue(frame).await?;

        let mut routes = self.routes.lock().await;
        if routes.shared.is_some() {
            // Lost a race against a concurrent registration; this worker
            // is surplus.
            drop(routes);
            let worker_id = endpoint.worker_id().to_string();
            endpoint.disconnect().await;
            if let Err(e) = self.spawner.shutdown_worker(&worker_id).await {
                warn!("Error shutting down worker {}: {}", worker_id, e);
            }
            return Err(SessionError::AlreadyRegistered);
        }
        routes.shared = Some(endpoint);
        Ok(())
    }

    /// OPEN_FILE spins up a dedicated worker for the file. The worker
    /// protocol requires a viewer registration first, so the parsed
    /// OPEN_FILE rides along as the endpoint's deferred request and a
    /// synthesized REGISTER_VIEWER goes out immediately.
    async fn handle_open_file(
        &self,
        header: FrameHeader,
        payload: &[u8],
    ) -> Result<(), SessionError> {
        Self::check_request_id(&header)?;
        if self.routes.lock().await.shared.is_none() {
            return Err(SessionError::MissingWorker);
        }
        let open = messages::OpenFile::decode(payload)?;
        let file_id = open.file_id;

        let info = self
            .spawner
            .start_worker(&self.base_folder, &self.user.username)
            .await
            .map_err(SessionError::WorkerStartup)?;
        info!(
            "Worker {} started for file {} and is available at {}:{}",
            info.worker_id, file_id, info.address, info.port
        );

        let deferred = DeferredOpen {
            request: open,
            request_id: header.request_id,
        };
        let endpoint = WorkerEndpoint::connect(
            &info,
            Some(deferred),
            self.client_tx.clone(),
            self.cancel.child_token(),
        )
        .await?;

        let register = messages::RegisterViewer::default();
        let frame = encode_frame(&register, EventType::RegisterViewer, header.request_id)?;
        endpoint.enqueue(frame).await?;

        let replaced = {
            let mut routes = self.routes.lock().await;
            routes.files.insert(file_id, endpoint)
        };
        if let Some(old) = replaced {
            warn!("Replacing worker for already-open file {}", file_id);
            let worker_id = old.worker_id().to_string();
            old.disconnect().await;
            if let Err(e) = self.spawner.shutdown_worker(&worker_id).await {
                warn!("Error shutting down worker {}: {}", worker_id, e);
            }
        }
        Ok(())
    }

    /// EMPTY_EVENT doubles as a status query against the spawner; nothing
    /// is forwarded to the client.
    async fn handle_status(&self) -> Result<(), SessionError> {
        let worker_id = {
            let routes = self.routes.lock().await;
            routes
                .shared
                .as_ref()
                .map(|endpoint| endpoint.worker_id().to_string())
        };
        let Some(worker_id) = worker_id else {
            return Err(SessionError::MissingWorker);
        };

        let status = self
            .spawner
            .worker_status(&worker_id)
            .await
            .map_err(SessionError::WorkerStatus)?;
        info!(
            "Worker status: Alive: {}, Reachable: {}",
            status.alive, status.is_reachable
        );
        Ok(())
    }

    /// Everything else proxies to a worker: the per-file worker when the
    /// payload names a mapped file, the shared worker otherwise.
    async fn handle_proxied(&self, header: FrameHeader, payload: &[u8]) -> Result<(), SessionError> {
        // Dispatch stripped the header, so rebuild the frame.
        let frame = encode_raw(header.event_type, header.request_id, payload);
        let file_id = extract_file_id(header.event_type, payload);

        let event_name = registry::descriptor(header.event_type)
            .map(|d| d.name)
            .unwrap_or("UNKNOWN");

        let routes = self.routes.lock().await;
        let target = match file_id {
            Some(id) => match routes.files.get(&id) {
                Some(endpoint) => {
                    debug!(
                        "Proxying {} (opcode {}) from client to worker:{}",
                        event_name, header.event_type, id
                    );
                    endpoint
                }
                None => {
                    debug!(
                        "Proxying {} (opcode {}) from client to shared-worker (file {} not mapped)",
                        event_name, header.event_type, id
                    );
                    routes.shared.as_ref().ok_or(SessionError::NoWorker)?
                }
            },
            None => {
                debug!(
                    "Proxying {} (opcode {}) from client to shared-worker",
                    event_name, header.event_type
                );
                routes.shared.as_ref().ok_or(SessionError::NoWorker)?
            }
        };

        target.enqueue(frame).await?;
        Ok(())
    }

    /// Tears the session down: aborts in-flight dials, closes every
    /// endpoint, and asks the spawner to stop every worker this session
    /// owns. Per-worker shutdown failures are logged and ignored.
    pub async fn disconnect(&self) {
        self.cancel.cancel();

        let (shared, files) = {
            let mut routes = self.routes.lock().await;
            (routes.shared.take(), std::mem::take(&mut routes.files))
        };

        let mut worker_ids = Vec::new();
        if let Some(endpoint) = shared {
            worker_ids.push(endpoint.worker_id().to_string());
            endpoint.disconnect().await;
        }
        for (_, endpoint) in files {
            worker_ids.push(endpoint.worker_id().to_string());
            endpoint.disconnect().await;
        }

        for worker_id in worker_ids {
            match self.spawner.shutdown_worker(&worker_id).await {
                Ok(()) => info!("Shut down worker with UUID: {}", worker_id),
                Err(e) => warn!("Error shutting down worker {}: {}", worker_id, e),
            }
        }
    }
}
