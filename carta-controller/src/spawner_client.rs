// carta-controller/src/spawner_client.rs
// HTTP client for the spawner's worker lifecycle API.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::json;

/// Connection details for a freshly spawned worker.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInfo {
    pub port: u16,
    pub address: String,
    pub worker_id: String,
}

/// Liveness report for one worker.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub port: u16,
    pub address: String,
    pub worker_id: String,
    pub pid: u32,
    pub alive: bool,
    #[serde(default)]
    pub is_reachable: bool,
    #[serde(default)]
    pub exited_cleanly: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    msg: String,
}

/// Typed client for the spawner REST API.
#[derive(Clone)]
pub struct SpawnerClient {
    http: reqwest::Client,
    base_url: String,
}

impl SpawnerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Asks the spawner to launch a worker rooted at `base_folder` for the
    /// given user.
    pub async fn start_worker(&self, base_folder: &str, username: &str) -> Result<WorkerInfo> {
        let resp = self
            .http
            .post(&self.base_url)
            .json(&json!({ "baseFolder": base_folder, "username": username }))
            .send()
            .await
            .context("failed to reach spawner")?;

        if resp.status().is_success() {
            resp.json().await.context("failed to parse worker info")
        } else {
            Err(anyhow!(
                "failed to start worker: {}",
                Self::error_message(resp).await
            ))
        }
    }

    /// Fetches liveness and reachability for a worker.
    pub async fn worker_status(&self, worker_id: &str) -> Result<WorkerStatus> {
        let url = format!("{}/worker/{}", self.base_url, worker_id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("failed to reach spawner")?;

        if resp.status().is_success() {
            resp.json().await.context("failed to parse worker status")
        } else {
            Err(anyhow!(
                "failed to get worker status: {}",
                Self::error_message(resp).await
            ))
        }
    }

    /// Asks the spawner to stop a worker process.
    pub async fn shutdown_worker(&self, worker_id: &str) -> Result<()> {
        let url = format!("{}/worker/{}", self.base_url, worker_id);
        let resp = self
            .http
            .delete(&url)
            .send()
            .await
            .context("failed to reach spawner")?;

        if !resp.status().is_success() {
            bail!(
                "failed to shutdown worker: {}",
                Self::error_message(resp).await
            );
        }
        Ok(())
    }

    /// Lists the ids of all workers the spawner currently tracks.
    pub async fn list_workers(&self) -> Result<Vec<String>> {
        let url = format!("{}/workers", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("failed to reach spawner")?;

        if resp.status().is_success() {
            resp.json().await.context("failed to parse worker list")
        } else {
            bail!("failed to get workers: {}", Self::error_message(resp).await);
        }
    }

    async fn error_message(resp: reqwest::Response) -> String {
        let status = resp.status();
        match resp.json::<ErrorResponse>().await {
            Ok(body) => body.msg,
            Err(_) => format!("spawner returned {}", status),
        }
    }
}
