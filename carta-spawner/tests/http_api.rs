// carta-spawner/tests/http_api.rs
// End-to-end tests for the spawner REST surface, using a shell script as a
// stand-in worker and an in-process websocket listener for the probe.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use carta_config::SpawnerConfig;
use carta_spawner::{routes, SpawnerState};

/// Serves the spawner router on an ephemeral port and returns its base URL.
async fn start_spawner(config: SpawnerConfig) -> (String, SpawnerState) {
    let state = SpawnerState::new(config);
    let app = routes::router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

/// Accepts websocket connections on an ephemeral port and answers PING with
/// PONG, like a real worker's liveness endpoint. Returns the bound port.
async fn start_pong_listener() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    if let Message::Text(t) = msg {
                        if t.as_str() == "PING" {
                            let _ = ws.send(Message::text("PONG")).await;
                        }
                    }
                }
            });
        }
    });
    port
}

/// Writes an executable script that advertises `port` in the readiness log
/// line and then sleeps, imitating a worker that came up on that port.
fn fake_worker_script(dir: &tempfile::TempDir, port: u16) -> String {
    let path = dir.path().join("fake-worker.sh");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    writeln!(
        file,
        "echo 'Listening on port {} with top level folder /tmp'",
        port
    )
    .unwrap();
    writeln!(file, "exec sleep 60").unwrap();
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().to_string()
}

#[tokio::test]
async fn test_spawn_list_status_stop_lifecycle() {
    let worker_port = start_pong_listener().await;
    let dir = tempfile::tempdir().unwrap();
    let script = fake_worker_script(&dir, worker_port);

    let (base, _state) = start_spawner(SpawnerConfig {
        port: 0,
        hostname: String::new(),
        worker_process: script,
        timeout_secs: 5,
    })
    .await;

    let client = reqwest::Client::new();

    // Spawn.
    let resp = client
        .post(&base)
        .json(&serde_json::json!({ "baseFolder": "/tmp", "username": "obs" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let timing = resp
        .headers()
        .get("server-timing")
        .expect("Server-Timing header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(timing.contains("spawn-time;dur="));
    assert!(timing.contains("check-time;dur="));

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["port"], worker_port);
    assert_eq!(body["address"], "localhost");
    let worker_id = body["workerId"].as_str().unwrap().to_string();

    // List.
    let workers: Vec<String> = client
        .get(format!("{}/workers", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(workers, vec![worker_id.clone()]);

    // Status: alive and reachable.
    let status: Value = client
        .get(format!("{}/worker/{}", base, worker_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["alive"], true);
    assert_eq!(status["isReachable"], true);
    assert_eq!(status["workerId"], worker_id.as_str());
    assert!(status["pid"].as_u64().unwrap() > 0);

    // Stop.
    let resp = client
        .delete(format!("{}/worker/{}", base, worker_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let workers: Vec<String> = client
        .get(format!("{}/workers", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(workers.is_empty());
}

#[tokio::test]
async fn test_spawn_timeout_returns_500_and_kills_child() {
    // The stand-in worker stays silent, so readiness times out.
    let (base, _state) = start_spawner(SpawnerConfig {
        port: 0,
        hostname: String::new(),
        worker_process: "/bin/sleep".to_string(),
        timeout_secs: 1,
    })
    .await;

    let client = reqwest::Client::new();
    let start = Instant::now();
    let resp = client
        .post(&base)
        .json(&serde_json::json!({ "baseFolder": "/tmp" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    // Bounded by the spawn timeout, not the probe deadline on top of it.
    assert!(start.elapsed() < Duration::from_secs(4));
    let body: Value = resp.json().await.unwrap();
    assert!(body["msg"].as_str().unwrap().contains("spawning"));

    let workers: Vec<String> = client
        .get(format!("{}/workers", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(workers.is_empty());
}

#[tokio::test]
async fn test_malformed_spawn_body_is_rejected() {
    let (base, _state) = start_spawner(SpawnerConfig {
        port: 0,
        hostname: String::new(),
        worker_process: "/bin/sleep".to_string(),
        timeout_secs: 1,
    })
    .await;

    let resp = reqwest::Client::new()
        .post(&base)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_unknown_worker_is_404() {
    let (base, _state) = start_spawner(SpawnerConfig {
        port: 0,
        hostname: String::new(),
        worker_process: "/bin/sleep".to_string(),
        timeout_secs: 1,
    })
    .await;

    let client = reqwest::Client::new();
    for method in ["get", "delete"] {
        let url = format!("{}/worker/{}", base, uuid::Uuid::new_v4());
        let resp = match method {
            "get" => client.get(&url).send().await.unwrap(),
            _ => client.delete(&url).send().await.unwrap(),
        };
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["msg"], "Worker not found");
    }

    // A non-UUID id is also just an unknown worker.
    let resp = client
        .get(format!("{}/worker/not-a-uuid", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
