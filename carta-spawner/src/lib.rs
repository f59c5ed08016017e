// carta-spawner/src/lib.rs
// Worker process lifecycle service: spawns worker binaries on request,
// detects their kernel-assigned port from their own log output, health
// checks them, and supervises them until shutdown.

pub mod error;
pub mod probe;
pub mod process;
pub mod registry;
pub mod routes;

pub use registry::{ProcessState, WorkerHandle, WorkerRegistry};
pub use routes::SpawnerState;
