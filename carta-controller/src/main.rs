// carta-controller/src/main.rs
// Controller entry point.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use carta_config::{Config, LogLevel};
use carta_controller::auth;
use carta_controller::gateway::{self, AppState};
use carta_controller::spawner_client::SpawnerClient;

#[derive(Parser)]
#[command(name = "carta-controller")]
#[command(about = "Session-routing gateway for the astronomy viewer")]
struct Cli {
    /// TCP server port
    #[arg(long)]
    port: Option<u16>,
    /// Hostname to listen on
    #[arg(long)]
    hostname: Option<String>,
    /// Address of the process spawner
    #[arg(long)]
    spawner_address: Option<String>,
    /// Base folder for data files
    #[arg(long)]
    base_folder: Option<String>,
    /// Directory with the built frontend
    #[arg(long)]
    frontend_dir: Option<String>,
    /// Authentication mode: none|pam|oidc|both
    #[arg(long)]
    auth_mode: Option<String>,
    /// Log level: debug|info|warn|error
    #[arg(long)]
    log_level: Option<String>,
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Highest-precedence config overrides, "key:value,key:value"
    #[arg(long = "override", value_name = "k:v,k:v")]
    override_values: Option<String>,
}

fn init_tracing(level: LogLevel) -> anyhow::Result<()> {
    let max_level = match level {
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(max_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM signal handler")
            .recv()
            .await;
    };
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, stopping server...");
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref(), cli.override_values.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Flags beat every other layer.
    if let Some(port) = cli.port {
        config.controller.port = port;
    }
    if let Some(hostname) = cli.hostname {
        config.controller.hostname = hostname;
    }
    if let Some(spawner_address) = cli.spawner_address {
        config.controller.spawner_address = spawner_address;
    }
    if let Some(base_folder) = cli.base_folder {
        config.controller.base_folder = base_folder;
    }
    if let Some(frontend_dir) = cli.frontend_dir {
        config.controller.frontend_dir = frontend_dir;
    }
    if let Some(mode) = cli.auth_mode {
        match mode.parse() {
            Ok(mode) => config.controller.auth_mode = mode,
            Err(e) => {
                eprintln!("{:#}", e);
                std::process::exit(1);
            }
        }
    }
    if let Some(level) = cli.log_level {
        match level.parse() {
            Ok(level) => config.log_level = level,
            Err(e) => {
                eprintln!("{:#}", e);
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = init_tracing(config.log_level) {
        eprintln!("Failed to initialize logging: {:#}", e);
        std::process::exit(1);
    }

    let instance_id = Uuid::new_v4();
    info!("Starting controller with UUID: {}", instance_id);

    let authenticator = match auth::build_authenticator(config.controller.auth_mode) {
        Ok(authenticator) => authenticator,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    // Default the base folder to the user's home directory.
    if config.controller.base_folder.trim().is_empty() {
        config.controller.base_folder =
            std::env::var("HOME").unwrap_or_else(|_| "/".to_string());
    }

    let state = AppState {
        spawner: SpawnerClient::new(config.controller.spawner_address.clone()),
        base_folder: config.controller.base_folder.clone(),
        authenticator,
    };

    let mut app = gateway::router(state);

    // Serve the frontend bundle when a directory is configured; unknown
    // paths fall back to index.html for SPA routes.
    if !config.controller.frontend_dir.is_empty() {
        let dir = PathBuf::from(&config.controller.frontend_dir);
        if !dir.is_dir() {
            error!("Frontend directory not found: {}", dir.display());
            std::process::exit(1);
        }
        info!("Serving frontend from {}", dir.display());
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(&dir).fallback(index));
    } else {
        info!("No frontend directory configured: serving the WebSocket endpoint only");
    }
    let app = app.layer(TraceLayer::new_for_http());

    let addr = format!(
        "{}:{}",
        config.controller.hostname, config.controller.port
    );
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Server listening on {}", addr);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
