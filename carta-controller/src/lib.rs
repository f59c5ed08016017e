// carta-controller/src/lib.rs
// Session-routing gateway: authenticates a frontend client over one
// websocket, provisions workers through the spawner, and multiplexes the
// binary protocol between the client and its workers.

pub mod auth;
pub mod gateway;
pub mod session;
pub mod spawner_client;

pub use gateway::AppState;
