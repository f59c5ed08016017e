// carta-spawner/src/registry.rs
// Supervised worker handles and the id → handle registry. The registry is
// only touched from the request handlers and the shutdown drain, behind
// one lock.

use std::collections::HashMap;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tracing::{info, warn};
use uuid::Uuid;

/// Grace period between SIGTERM and SIGKILL during the shutdown drain.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Terminating,
    Exited { clean: bool },
}

/// One supervised worker process.
pub struct WorkerHandle {
    pub id: Uuid,
    pub port: u16,
    pub username: Option<String>,
    pub pid: u32,
    pub child: Child,
    pub state: ProcessState,
}

impl WorkerHandle {
    pub fn new(id: Uuid, port: u16, username: Option<String>, child: Child) -> Self {
        let pid = child.id().unwrap_or(0);
        Self {
            id,
            port,
            username,
            pid,
            child,
            state: ProcessState::Running,
        }
    }

    /// True while the child has not been reaped. Reaps on the way if the
    /// child has exited, recording whether the exit was clean.
    pub fn alive(&mut self) -> bool {
        if let ProcessState::Exited { .. } = self.state {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.state = ProcessState::Exited {
                    clean: status.success(),
                };
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Failed to poll worker {}: {}", self.id, e);
                false
            }
        }
    }

    pub fn exited_cleanly(&self) -> bool {
        matches!(self.state, ProcessState::Exited { clean: true })
    }

    /// Graceful termination: SIGTERM, wait out the grace period, then
    /// SIGKILL and reap.
    pub async fn terminate(&mut self) {
        if !self.alive() {
            return;
        }
        self.state = ProcessState::Terminating;

        if let Err(e) = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
            warn!("Failed to send SIGTERM to worker {}: {}", self.id, e);
        } else {
            match tokio::time::timeout(DRAIN_GRACE, self.child.wait()).await {
                Ok(Ok(status)) => {
                    info!("Worker {} exited: {}", self.id, status);
                    self.state = ProcessState::Exited {
                        clean: status.success(),
                    };
                    return;
                }
                Ok(Err(e)) => warn!("Failed to wait for worker {}: {}", self.id, e),
                Err(_) => info!("Worker {} did not exit in time, force killing", self.id),
            }
        }

        if let Err(e) = self.child.kill().await {
            warn!("Failed to force kill worker {}: {}", self.id, e);
        }
        self.state = ProcessState::Exited { clean: false };
    }
}

/// Registry of all workers this spawner has launched and not yet removed.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<Uuid, WorkerHandle>,
}

impl WorkerRegistry {
    pub fn insert(&mut self, handle: WorkerHandle) {
        self.workers.insert(handle.id, handle);
    }

    pub fn ids(&self) -> Vec<String> {
        self.workers.keys().map(|id| id.to_string()).collect()
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut WorkerHandle> {
        self.workers.get_mut(id)
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<WorkerHandle> {
        self.workers.remove(id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Drains the registry, gracefully terminating every live worker.
    pub async fn shutdown_all(&mut self) {
        let count = self.workers.len();
        if count > 0 {
            info!("Shutting down {} worker(s)", count);
        }
        for (_, mut handle) in self.workers.drain() {
            handle.terminate().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    fn spawn_sleeper() -> Child {
        Command::new("/bin/sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    #[tokio::test]
    async fn test_alive_tracks_exit() {
        let child = Command::new("/bin/true").spawn().unwrap();
        let mut handle = WorkerHandle::new(Uuid::new_v4(), 1234, None, child);

        // Give the child a moment to exit.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!handle.alive());
        assert!(handle.exited_cleanly());
        // Stays dead on repeated polls.
        assert!(!handle.alive());
    }

    #[tokio::test]
    async fn test_terminate_reaps_live_child() {
        let child = spawn_sleeper();
        let mut handle = WorkerHandle::new(Uuid::new_v4(), 1234, None, child);
        assert!(handle.alive());

        handle.terminate().await;
        assert!(matches!(handle.state, ProcessState::Exited { .. }));
        assert!(!handle.alive());
    }

    #[tokio::test]
    async fn test_shutdown_all_empties_registry() {
        let mut registry = WorkerRegistry::default();
        registry.insert(WorkerHandle::new(
            Uuid::new_v4(),
            1,
            None,
            spawn_sleeper(),
        ));
        registry.insert(WorkerHandle::new(
            Uuid::new_v4(),
            2,
            Some("obs".to_string()),
            spawn_sleeper(),
        ));
        assert_eq!(registry.len(), 2);

        registry.shutdown_all().await;
        assert!(registry.is_empty());
    }
}
