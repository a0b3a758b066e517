use anyhow::{Context, Result};
use clap::Parser;
use docrelay::bridge::BridgeConnector;
use docrelay::common::config::{load_config, ConfigOverrides};
use docrelay::server::{self, runtime, AppState};
use docrelay::session::{AuthStore, SessionHandle, SessionManager};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "docrelay")]
#[command(about = "Relay uploaded PDFs to a chat recipient", version)]
struct Cli {
    /// Listen port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Credential folder (overrides AUTH_FOLDER)
    #[arg(long, value_name = "DIR")]
    auth_folder: Option<PathBuf>,

    /// Messaging gateway base URL
    #[arg(long, value_name = "URL")]
    bridge_url: Option<String>,

    /// Config file instead of the per-user default
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            auth_folder: self.auth_folder,
            bridge_url: self.bridge_url,
            config_file: self.config,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docrelay=info".into()),
        )
        .init();
}

/// Panics in request or session tasks are logged, never fatal.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "Uncaught panic");
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    install_panic_hook();

    let cli = Cli::parse();
    let config = load_config(&cli.overrides())?;

    let handle = SessionHandle::new();
    let shutdown = CancellationToken::new();

    let connector = BridgeConnector::new(&config.bridge)?;
    let manager = Arc::new(SessionManager::new(
        connector,
        AuthStore::new(&config.auth_folder),
        handle.clone(),
        config.session,
        config.pairing.clone(),
    ));
    let supervisor = manager.spawn(shutdown.child_token());

    let state = AppState::new(handle, &config);
    let app = server::create_router(&state);
    let (port, server_handle) = runtime::start_server(app, config.port)
        .await
        .context("Failed to start HTTP server")?;
    tracing::info!(port, "Server running");

    runtime::run_until_shutdown(server_handle, shutdown).await?;

    if let Err(e) = supervisor.await {
        tracing::error!(error = %e, "session supervisor task failed");
    }
    tracing::info!("Shutdown complete");

    Ok(())
}
