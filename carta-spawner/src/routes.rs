// carta-spawner/src/routes.rs
// REST surface: spawn a worker, list workers, query one, stop one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use carta_config::SpawnerConfig;

use crate::error::ApiError;
use crate::probe;
use crate::process::{self, SpawnedWorker};
use crate::registry::{WorkerHandle, WorkerRegistry};

/// Probe deadline right after a spawn.
const SPAWN_PROBE_DEADLINE: Duration = Duration::from_secs(2);
/// Probe deadline on a status query against a live worker.
const STATUS_PROBE_DEADLINE: Duration = Duration::from_secs(1);

/// Shared state behind the REST handlers.
#[derive(Clone)]
pub struct SpawnerState {
    pub workers: Arc<Mutex<WorkerRegistry>>,
    pub config: Arc<SpawnerConfig>,
}

impl SpawnerState {
    pub fn new(config: SpawnerConfig) -> Self {
        Self {
            workers: Arc::new(Mutex::new(WorkerRegistry::default())),
            config: Arc::new(config),
        }
    }

    /// Hostname advertised to the controller for dialing workers.
    fn advertised_hostname(&self) -> &str {
        if self.config.hostname.is_empty() {
            "localhost"
        } else {
            &self.config.hostname
        }
    }
}

pub fn router(state: SpawnerState) -> Router {
    Router::new()
        .route("/", post(spawn_worker))
        .route("/workers", get(list_workers))
        .route("/worker/{id}", get(worker_status).delete(stop_worker))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRequest {
    pub base_folder: String,
    #[serde(default)]
    pub username: Option<String>,
}

fn server_timing(entries: &[(&str, Duration)]) -> HeaderMap {
    let value = entries
        .iter()
        .map(|(name, d)| format!("{};dur={}", name, d.as_millis()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&value) {
        headers.insert("server-timing", v);
    }
    headers
}

/// POST /: launch a worker, wait for readiness, health check it, and
/// register it under a fresh id.
async fn spawn_worker(State(state): State<SpawnerState>, body: String) -> Response {
    let req: SpawnRequest = match serde_json::from_str(&body) {
        Ok(req) => req,
        Err(e) => return ApiError::bad_request(e.to_string()).into_response(),
    };

    let timeout = Duration::from_secs(state.config.timeout_secs);
    let start = Instant::now();
    let spawned = match process::spawn_worker(
        &state.config.worker_process,
        &req.base_folder,
        timeout,
    )
    .await
    {
        Ok(spawned) => spawned,
        Err(e) => {
            error!("Error spawning worker: {}", e);
            return ApiError::internal("Error spawning worker").into_response();
        }
    };
    let spawn_time = start.elapsed();
    let SpawnedWorker { mut child, port } = spawned;

    let start = Instant::now();
    if let Err(e) = probe::probe_worker(port, SPAWN_PROBE_DEADLINE).await {
        error!("Error connecting to worker: {}", e);
        if let Err(e) = child.kill().await {
            error!("Error killing worker: {}", e);
        }
        return ApiError::internal("Error connecting to worker").into_response();
    }
    let check_time = start.elapsed();

    let worker_id = Uuid::new_v4();
    info!("Started worker {} on port {}", worker_id, port);
    state
        .workers
        .lock()
        .await
        .insert(WorkerHandle::new(worker_id, port, req.username, child));

    let headers = server_timing(&[("spawn-time", spawn_time), ("check-time", check_time)]);
    (
        headers,
        Json(json!({
            "port": port,
            "address": state.advertised_hostname(),
            "workerId": worker_id,
        })),
    )
        .into_response()
}

/// GET /workers: ids of all registered workers, possibly empty.
async fn list_workers(State(state): State<SpawnerState>) -> Json<Vec<String>> {
    Json(state.workers.lock().await.ids())
}

/// GET /worker/{id}: liveness and reachability of one worker.
async fn worker_status(State(state): State<SpawnerState>, Path(id): Path<String>) -> Response {
    let Ok(worker_id) = Uuid::parse_str(&id) else {
        return ApiError::not_found("Worker not found").into_response();
    };

    // Copy everything out of the handle so the lock is not held across
    // the probe; a slow worker must not stall the other handlers.
    let (alive, port, pid, exited_cleanly) = {
        let mut registry = state.workers.lock().await;
        let Some(handle) = registry.get_mut(&worker_id) else {
            return ApiError::not_found("Worker not found").into_response();
        };
        let alive = handle.alive();
        (alive, handle.port, handle.pid, handle.exited_cleanly())
    };

    let mut body = json!({
        "port": port,
        "address": state.advertised_hostname(),
        "workerId": worker_id,
        "pid": pid,
        "alive": alive,
    });

    if alive {
        let start = Instant::now();
        let reachable = probe::probe_worker(port, STATUS_PROBE_DEADLINE).await.is_ok();
        body["isReachable"] = json!(reachable);
        if reachable {
            let headers = server_timing(&[("check-time", start.elapsed())]);
            return (headers, Json(body)).into_response();
        }
        error!("Worker {} is alive but unreachable", worker_id);
    } else {
        body["exitedCleanly"] = json!(exited_cleanly);
    }

    Json(body).into_response()
}

/// DELETE /worker/{id}: kill the child; the entry is removed on success.
async fn stop_worker(State(state): State<SpawnerState>, Path(id): Path<String>) -> Response {
    let Ok(worker_id) = Uuid::parse_str(&id) else {
        return ApiError::not_found("Worker not found").into_response();
    };

    let mut registry = state.workers.lock().await;
    let Some(handle) = registry.get_mut(&worker_id) else {
        return ApiError::not_found("Worker not found").into_response();
    };

    match handle.child.start_kill() {
        Ok(()) => {
            let _ = handle.child.wait().await;
            registry.remove(&worker_id);
            info!("Stopped worker {}", worker_id);
            Json(json!({ "msg": "Worker stopped" })).into_response()
        }
        Err(e) => {
            error!("Error stopping worker {}: {}", worker_id, e);
            ApiError::internal("Error stopping worker").into_response()
        }
    }
}
