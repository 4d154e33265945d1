use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bodyscan_api::config::ServerConfig;
use bodyscan_api::router::build_app_router;
use bodyscan_api::state::AppState;

const DEFAULT_LOG_FILTER: &str = "bodyscan_api=debug,bodyscan_core=debug,tower_http=debug";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        program = %config.measurement.computation.program,
        script = ?config.measurement.computation.script_path,
        debug = config.measurement.debug,
        "Configuration loaded",
    );

    prepare_storage(&config).await;

    let app = build_app_router(AppState::new(config.clone()), &config);

    let addr = SocketAddr::new(
        config.host.parse().expect("HOST must be an IP address"),
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {addr}: {e}"));
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped");
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Create the work and output directories, panicking on failure.
async fn prepare_storage(config: &ServerConfig) {
    for dir in [&config.measurement.work_dir, &config.measurement.output_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .unwrap_or_else(|e| panic!("Failed to create {}: {e}", dir.display()));
    }
}

/// Resolve on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let interrupt = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => tracing::info!("SIGINT received, shutting down"),
        () = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
