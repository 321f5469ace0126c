use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub mod handlers;
mod pagination;

pub use pagination::Pagination;

use crate::AppContext;

/// Serves the job intake and status API until ctrl-c.
pub async fn start_server(ctx: Arc<AppContext>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = handlers::router(ctx);

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
