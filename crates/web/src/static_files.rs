//! Static file serving

use std::future::Future;
use std::path::{Path, PathBuf};

use axum::{response::IntoResponse, routing::get, Json, Router};
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Service name reported by the health endpoint
pub const SERVICE_NAME: &str = "dashcheck-serve";

/// Build the router serving `root`.
///
/// Directory requests resolve to their `index.html`. `/health` answers the
/// harness's readiness probe.
pub fn router(root: impl AsRef<Path>) -> Router {
    let files = ServeDir::new(root.as_ref()).append_index_html_on_directories(true);

    Router::new()
        .route("/health", get(health_handler))
        .fallback_service(files)
        .layer(TraceLayer::new_for_http())
}

/// Serve `root` on an already bound listener until `shutdown` resolves.
pub async fn serve_listener<F>(listener: TcpListener, root: PathBuf, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if !root.is_dir() {
        anyhow::bail!("static root is not a directory: {}", root.display());
    }

    info!(
        "Serving {} on http://{}",
        root.display(),
        listener.local_addr()?
    );

    axum::serve(listener, router(&root))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Static file server stopped");
    Ok(())
}

/// Bind `addr` and serve `root` until `shutdown` resolves.
///
/// `addr` may name a host, e.g. `("localhost", 8000)`; the first resolved
/// address that binds is used.
pub async fn serve<A, F>(addr: A, root: PathBuf, shutdown: F) -> anyhow::Result<()>
where
    A: ToSocketAddrs,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    serve_listener(listener, root, shutdown).await
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
    }))
}
