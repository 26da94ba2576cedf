//! mlserve inference service.
//!
//! - Loads models from `registry.models_dir` at startup
//! - Serves `/predict` plus operational endpoints
//! - Records metrics off the response path; flushes them on shutdown

use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

use mlserve_gateway::{app_state, background, config, router};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::var("MLSERVE_CONFIG").unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.into());
    let cfg = config::load_from_file(&path).expect("config load failed");
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .expect("server.listen must be a valid SocketAddr");

    let (state, metrics_worker) = app_state::AppState::new(cfg);
    let tasks = background::spawn_all(&state);
    let app = router::build_router(state.clone());

    tracing::info!(%listen, "mlserve-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen).await.expect("failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    for task in tasks {
        task.abort();
    }
    state.pipeline().flush().await;
    drop(state);
    metrics_worker.abort();
    tracing::info!("mlserve-gateway stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
}
