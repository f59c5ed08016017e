// carta-spawner/src/main.rs
// Spawner service entry point.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use carta_config::{Config, LogLevel};
use carta_spawner::SpawnerState;

/// Deadline for the HTTP listener to close after the worker drain.
const LISTENER_CLOSE_DEADLINE: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "carta-spawner")]
#[command(about = "Worker process lifecycle service")]
struct Cli {
    /// HTTP server port
    #[arg(long)]
    port: Option<u16>,
    /// Hostname to listen on (and advertise to the controller)
    #[arg(long)]
    hostname: Option<String>,
    /// Path to the worker binary
    #[arg(long)]
    worker_process: Option<String>,
    /// Spawn readiness timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
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

fn init_tracing(level: LogLevel) -> Result<()> {
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
        config.spawner.port = port;
    }
    if let Some(hostname) = cli.hostname {
        config.spawner.hostname = hostname;
    }
    if let Some(worker_process) = cli.worker_process {
        config.spawner.worker_process = worker_process;
    }
    if let Some(timeout) = cli.timeout {
        config.spawner.timeout_secs = timeout;
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
    info!("Started spawner with UUID: {}", instance_id);

    let addr = format!("{}:{}", config.spawner.hostname, config.spawner.port);
    let state = SpawnerState::new(config.spawner);
    let app = carta_spawner::routes::router(state.clone()).layer(TraceLayer::new_for_http());

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Starting spawner on {}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
        {
            error!("Server error: {}", e);
        }
    });

    shutdown_signal().await;
    info!("Signal received, shutting down...");

    // Drain the workers first, then close the listener under a deadline.
    state.workers.lock().await.shutdown_all().await;

    let _ = shutdown_tx.send(());
    if tokio::time::timeout(LISTENER_CLOSE_DEADLINE, server).await.is_err() {
        warn!("HTTP listener did not close in time");
    } else {
        info!("HTTP server shut down gracefully");
    }

    info!("Spawner exited gracefully");
}
