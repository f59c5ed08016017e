// carta-controller/src/gateway.rs
// WebSocket front door: upgrades the client connection, binds the
// authenticated identity into a new session, and drives the read loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::ws::{Message, WebSocket},
    extract::{ConnectInfo, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use futures::stream::SplitSink;
use futures::StreamExt;
use futures_util::SinkExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::auth::{self, AuthenticatedUser, Authenticator};
use crate::session::{Session, CLIENT_QUEUE_CAPACITY};
use crate::spawner_client::SpawnerClient;

/// State shared across connections.
#[derive(Clone)]
pub struct AppState {
    pub spawner: SpawnerClient,
    pub base_folder: String,
    pub authenticator: Arc<dyn Authenticator>,
}

/// Builds the gateway router: the websocket endpoint behind the identity
/// middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::attach_identity,
        ))
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    info!("WebSocket upgrade request from {}", addr);
    ws.on_upgrade(move |socket| handle_socket(socket, state, user, addr))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    user: AuthenticatedUser,
    addr: SocketAddr,
) {
    let connection_start = Instant::now();
    let (sender, mut receiver) = socket.split();

    info!("Client connected from {} as {}", addr, user.username);

    // Single writer: the PONG path and every worker receive pump feed the
    // same queue, so client writes never interleave.
    let (client_tx, client_rx) = mpsc::channel::<Message>(CLIENT_QUEUE_CAPACITY);
    tokio::spawn(client_send_pump(client_rx, sender));

    let session = Arc::new(Session::new(
        client_tx.clone(),
        state.spawner.clone(),
        state.base_folder.clone(),
        user,
    ));

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) if text.as_str() == "PING" => {
                if client_tx.send(Message::Text("PONG".into())).await.is_err() {
                    break;
                }
            }
            Ok(Message::Text(text)) => {
                warn!("Ignoring non-binary message: {}", text);
            }
            Ok(Message::Binary(data)) => {
                // Dispatch on its own task so a slow frame does not block
                // the read loop; handlers enqueue into bounded FIFOs to
                // keep per-worker ordering.
                let session = session.clone();
                tokio::spawn(async move {
                    if let Err(e) = session.dispatch(data.to_vec()).await {
                        warn!("Failed to handle message: {}", e);
                    }
                });
            }
            Ok(Message::Close(_)) => {
                info!("Client initiated close");
                break;
            }
            // Protocol-level ping/pong is answered by the library.
            Ok(_) => {}
            Err(e) => {
                error!("Error reading message: {}", e);
                break;
            }
        }
    }

    drop(client_tx);
    session.disconnect().await;

    info!(
        "Client disconnected from {} after {:.2}s",
        addr,
        connection_start.elapsed().as_secs_f64()
    );
}

/// Drains the client send queue onto the socket. Write errors drop that
/// frame; the pump keeps draining so producers never block on a dead
/// socket.
async fn client_send_pump(mut client_rx: mpsc::Receiver<Message>, mut sender: SplitSink<WebSocket, Message>) {
    while let Some(msg) = client_rx.recv().await {
        if let Err(e) = sender.send(msg).await {
            warn!("Error sending message to client: {}", e);
        }
    }
}
