//! Runtime lifecycle: bind the listener, serve, and shut down.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

fn bind_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Serve `app` on `port` (0 picks a free one). Returns the port actually bound.
pub async fn start_server(app: axum::Router, port: u16) -> Result<(u16, axum_server::Handle)> {
    let addr = bind_addr(port);
    let listener = std::net::TcpListener::bind(addr)
        .with_context(|| format!("Cannot listen on {addr}; choose another PORT or --port"))?;
    listener
        .set_nonblocking(true)
        .context("Listener rejected non-blocking mode")?;
    let bound = listener.local_addr()?.port();

    let handle = axum_server::Handle::new();
    let serve_handle = handle.clone();
    tokio::spawn(async move {
        let served = axum_server::from_tcp(listener)
            .handle(serve_handle)
            .serve(app.into_make_service())
            .await;
        if let Err(e) = served {
            tracing::error!(error = %e, port = bound, "HTTP listener stopped");
        }
    });

    Ok((bound, handle))
}

/// Serve until Ctrl+C or `shutdown` fires, then drain in-flight requests.
pub async fn run_until_shutdown(
    server_handle: axum_server::Handle,
    shutdown: CancellationToken,
) -> Result<()> {
    let signal_token = shutdown.clone();
    let ctrl_c_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::error!("Failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Ctrl+C received - initiating graceful shutdown");
        signal_token.cancel();
    });

    shutdown.cancelled().await;
    ctrl_c_task.abort();

    // Stop accepting new connections
    server_handle.graceful_shutdown(Some(DRAIN_TIMEOUT));
    tracing::info!(
        connections = server_handle.connection_count(),
        "Server stopped accepting new connections"
    );

    Ok(())
}
