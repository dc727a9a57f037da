//! Read-only static preview of a generated project

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::Router;
use eyre::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// A running preview server
pub struct PreviewServer {
    pub addr: SocketAddr,
    pub root: PathBuf,
    handle: JoinHandle<()>,
}

impl PreviewServer {
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Stop serving
    pub fn shutdown(self) {
        debug!(addr = %self.addr, "PreviewServer::shutdown: called");
        self.handle.abort();
    }

    /// Wait until the server task ends
    pub async fn wait(self) {
        if let Err(e) = self.handle.await
            && !e.is_cancelled()
        {
            error!("Preview server task failed: {e}");
        }
    }
}

/// Router serving files from `root`, with `index.html` for directories
pub fn router(root: &Path) -> Router {
    let serve = ServeDir::new(root).append_index_html_on_directories(true);
    Router::new().fallback_service(serve).layer(TraceLayer::new_for_http())
}

/// Bind `addr` (port 0 picks a free port) and serve `root` on a background task
pub async fn serve(root: &Path, addr: SocketAddr) -> Result<PreviewServer> {
    debug!(?root, %addr, "serve: called");
    if !root.is_dir() {
        return Err(eyre::eyre!("Preview directory not found: {}", root.display()));
    }

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind preview server on {}", addr))?;
    let addr = listener.local_addr()?;
    let app = router(root);

    info!("Serving {} at http://{}/", root.display(), addr);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Preview server error: {e}");
        }
    });

    Ok(PreviewServer {
        addr,
        root: root.to_path_buf(),
        handle,
    })
}
