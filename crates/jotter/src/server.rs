//! Static asset server.
//!
//! Serves one directory over HTTP so the browser UI can load. Every request is
//! logged through `tower-http`'s trace layer; directories resolve to their
//! `index.html`. There are no API routes.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::Router;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Build the router serving `dir`.
#[must_use]
pub fn router(dir: impl AsRef<Path>) -> Router {
    let assets = ServeDir::new(dir.as_ref()).append_index_html_on_directories(true);
    Router::new()
        .fallback_service(assets)
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address is invalid, cannot be bound, or the server
/// fails while running.
pub async fn serve(config: &Config) -> Result<()> {
    let addr = config.socket_addr()?;
    let dir = config.asset_dir();
    let listener = bind(addr).await?;

    serve_on(listener, dir, shutdown_signal()).await
}

/// Bind a listener, mapping failures to [`Error::ServerBind`].
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| Error::ServerBind { addr, source })
}

/// Serve `dir` on an already bound listener until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails while running.
pub async fn serve_on<F>(listener: TcpListener, dir: PathBuf, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr()?;
    info!("Serving {} at http://{}", dir.display(), local);

    axum::serve(listener, router(&dir))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Listening for Ctrl-C failed: {}", err);
        std::future::pending::<()>().await;
    }
}
