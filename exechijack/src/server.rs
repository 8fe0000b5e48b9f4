use std::net::SocketAddr;

use axum::{routing::get, Router};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::store::{get_all_hijacks, get_hijacks_by_pid, ReportStorage};

pub fn create_app(storage: ReportStorage) -> Router {
    Router::new()
        .route("/hijacks", get(get_all_hijacks))
        .route("/hijacks/:pid", get(get_hijacks_by_pid))
        .with_state(storage)
}

pub async fn start_http_server(
    storage: ReportStorage,
    addr: SocketAddr,
) -> anyhow::Result<JoinHandle<()>> {
    let app = create_app(storage);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on http://{}", listener.local_addr()?);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    info!("API endpoints:");
    info!("  GET /hijacks - retained hijack reports, oldest first");
    info!("  GET /hijacks/:pid - hijack reports for a specific PID");

    Ok(server_handle)
}
