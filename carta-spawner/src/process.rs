// carta-spawner/src/process.rs
// Worker process launch and readiness detection. The worker binds a
// kernel-assigned port and advertises it in a log line; no out-of-band
// rendezvous exists, so readiness detection scrapes stdout and stderr.

use std::process::Stdio;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

lazy_static! {
    static ref LISTEN_RE: Regex =
        Regex::new(r"Listening on port (\d+) with top level folder").unwrap();
}

#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("failed to start worker: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to capture worker {0} pipe")]
    Pipe(&'static str),
    #[error("worker did not become ready within {0:?}")]
    NotReady(Duration),
}

/// A launched worker whose advertised port has been detected.
pub struct SpawnedWorker {
    pub child: Child,
    pub port: u16,
}

/// Parses the worker readiness log line and returns the advertised port.
pub fn parse_port_from_line(line: &str) -> Option<u16> {
    LISTEN_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn worker_args(base_folder: &str) -> Vec<String> {
    let mut args = vec![
        "--no_frontend".to_string(),
        "--verbosity".to_string(),
        "5".to_string(),
        "--exit_timeout".to_string(),
        "10".to_string(),
        "--initial_timeout".to_string(),
        "20".to_string(),
        "--idle_timeout".to_string(),
        "300".to_string(),
    ];
    if !base_folder.is_empty() {
        args.push("--base".to_string());
        args.push(base_folder.to_string());
    }
    args.push("--debug_no_auth".to_string());
    args
}

/// Starts a worker process and waits for its readiness log line. The first
/// port matched on either stream wins; on timeout the child is killed and
/// reaped before returning.
pub async fn spawn_worker(
    worker_path: &str,
    base_folder: &str,
    timeout: Duration,
) -> Result<SpawnedWorker, SpawnError> {
    let args = worker_args(base_folder);
    info!("Spawning worker process: {} {:?}", worker_path, args);

    let mut child = Command::new(worker_path)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child.stdout.take().ok_or(SpawnError::Pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(SpawnError::Pipe("stderr"))?;

    // Single-slot readiness channel; scanners use a lossy try_send so a
    // second match never blocks.
    let (ready_tx, mut ready_rx) = mpsc::channel::<u16>(1);
    tokio::spawn(scan_stream(stdout, "stdout", ready_tx.clone()));
    tokio::spawn(scan_stream(stderr, "stderr", ready_tx));

    match tokio::time::timeout(timeout, ready_rx.recv()).await {
        Ok(Some(port)) => {
            info!("Detected worker port from log: {}", port);
            Ok(SpawnedWorker { child, port })
        }
        // Timed out, or both scanners ended without a match (early exit).
        Ok(None) | Err(_) => {
            warn!("Worker did not report readiness within {:?}, killing", timeout);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill unready worker: {}", e);
            }
            Err(SpawnError::NotReady(timeout))
        }
    }
}

/// Forwards one output stream line by line and watches for the readiness
/// log line. Runs until the stream closes.
async fn scan_stream<R: AsyncRead + Unpin>(
    stream: R,
    name: &'static str,
    ready_tx: mpsc::Sender<u16>,
) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("[worker {}] {}", name, line);
        if let Some(port) = parse_port_from_line(&line) {
            let _ = ready_tx.try_send(port);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_readiness_line() {
        let line = "[info] Listening on port 41233 with top level folder /home/obs/data";
        assert_eq!(parse_port_from_line(line), Some(41233));
    }

    #[test]
    fn test_ignores_other_lines() {
        assert_eq!(parse_port_from_line("Session 1 connected"), None);
        assert_eq!(parse_port_from_line("Listening on port with top level folder"), None);
    }

    #[test]
    fn test_base_folder_is_optional() {
        let with = worker_args("/data");
        assert!(with.windows(2).any(|w| w == ["--base", "/data"]));
        let without = worker_args("");
        assert!(!without.iter().any(|a| a == "--base"));
    }

    #[tokio::test]
    async fn test_scan_detects_port_from_stdout() {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg("echo 'Listening on port 45678 with top level folder /tmp'; sleep 5")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        tokio::spawn(scan_stream(stdout, "stdout", tx));
        let port = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(port, Some(45678));
        let _ = child.kill().await;
    }

    #[tokio::test]
    async fn test_spawn_fails_when_child_exits_without_readiness() {
        // /bin/sh rejects the worker flags and exits immediately; both
        // scanners end without a match, so this must fail rather than hang.
        let result = spawn_worker("/bin/sh", "", Duration::from_secs(5)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_spawn_timeout_kills_child() {
        // `sleep` accepts the worker flags as arguments it never reads and
        // stays silent, so readiness must time out.
        let result = spawn_worker("/bin/sleep", "", Duration::from_millis(300)).await;
        assert!(matches!(result, Err(SpawnError::NotReady(_))));
    }
}
