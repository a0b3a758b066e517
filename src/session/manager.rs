//! Session supervisor: connect, observe, persist credentials, reconnect.
//!
//! ```text
//! Uninitialized -> Connecting -> Open
//! Open -> Connecting            (recoverable close, after reconnect delay)
//! Connecting|Open -> Terminal   (logged out; no automatic exit)
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::auth_store::{AuthStore, CredentialBundle};
use super::handle::{SessionHandle, SessionPhase};
use super::pairing;
use super::socket::{
    Connection, ConnectionState, ConnectionUpdate, Connector, Disconnect, DisconnectReason,
    SocketEvent,
};
use crate::common::config::{PairingSettings, SessionSettings};

/// How an observed socket ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Reconnect(DisconnectReason),
    LoggedOut,
    Shutdown,
}

pub struct SessionManager<C: Connector> {
    connector: C,
    store: AuthStore,
    handle: SessionHandle,
    settings: SessionSettings,
    pairing: PairingSettings,
}

impl<C: Connector> SessionManager<C> {
    pub fn new(
        connector: C,
        store: AuthStore,
        handle: SessionHandle,
        settings: SessionSettings,
        pairing: PairingSettings,
    ) -> Self {
        Self {
            connector,
            store,
            handle,
            settings,
            pairing,
        }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Build a fresh socket from persisted credentials and install it.
    pub async fn start(&self) -> Result<mpsc::Receiver<SocketEvent>> {
        let credentials = self
            .store
            .load()
            .await
            .context("Failed to load credentials")?;
        if credentials.is_fresh() {
            tracing::info!("No saved credentials, pairing will be required");
        }

        let Connection { socket, events } = self
            .connector
            .connect(credentials)
            .await
            .context("Failed to open messaging socket")?;

        let (generation, previous) = self.handle.install(socket);
        if let Some(old) = previous {
            old.close().await;
        }
        tracing::info!(generation, "session starting");

        Ok(events)
    }

    /// Supervise the session until logout or cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let events = match self.start().await {
                Ok(events) => events,
                Err(err) => {
                    let delay = self.settings.startup_retry_delay();
                    tracing::error!(
                        error = ?err,
                        retry_in_ms = delay.as_millis() as u64,
                        "session init error"
                    );
                    if !sleep_or_cancel(delay, &cancel).await {
                        break;
                    }
                    continue;
                }
            };

            match self.observe(events, &cancel).await {
                CloseOutcome::Reconnect(reason) => {
                    let delay = self.settings.reconnect_delay();
                    tracing::info!(
                        ?reason,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting"
                    );
                    if !sleep_or_cancel(delay, &cancel).await {
                        break;
                    }
                }
                CloseOutcome::LoggedOut => {
                    tracing::warn!("Logged out. Scan a new QR to pair again");
                    break;
                }
                CloseOutcome::Shutdown => break,
            }
        }

        if self.handle.is_connected() {
            self.handle.set_phase(SessionPhase::Connecting);
        }
        if let Some(socket) = self.handle.take() {
            socket.close().await;
        }
        tracing::debug!(phase = ?self.handle.phase(), "session supervisor stopped");
    }

    /// Consume socket events until the connection closes.
    pub async fn observe(
        &self,
        mut events: mpsc::Receiver<SocketEvent>,
        cancel: &CancellationToken,
    ) -> CloseOutcome {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return CloseOutcome::Shutdown,
                event = events.recv() => event,
            };

            let Some(event) = event else {
                tracing::warn!("socket event stream ended without a close");
                self.handle.set_phase(SessionPhase::Connecting);
                return CloseOutcome::Reconnect(DisconnectReason::Unknown(None));
            };

            match event {
                SocketEvent::Credentials(bundle) => self.persist(&bundle).await,
                SocketEvent::Connection(update) => {
                    if let Some(outcome) = self.on_connection_update(update) {
                        return outcome;
                    }
                }
            }
        }
    }

    fn on_connection_update(&self, update: ConnectionUpdate) -> Option<CloseOutcome> {
        if let Some(qr) = update.qr.as_deref() {
            pairing::announce(qr, &self.pairing);
        }

        match update.connection? {
            ConnectionState::Connecting => {
                self.handle.set_phase(SessionPhase::Connecting);
                None
            }
            ConnectionState::Open => {
                self.handle.set_phase(SessionPhase::Open);
                tracing::info!("Session connected");
                None
            }
            ConnectionState::Close => {
                let disconnect = update.last_disconnect.unwrap_or_default();
                let reason = disconnect.reason();
                log_disconnect(&disconnect, reason);

                if reason.is_terminal() {
                    self.handle.set_phase(SessionPhase::Terminal);
                    Some(CloseOutcome::LoggedOut)
                } else {
                    self.handle.set_phase(SessionPhase::Connecting);
                    Some(CloseOutcome::Reconnect(reason))
                }
            }
        }
    }

    /// Every rotation is written immediately, no batching.
    async fn persist(&self, bundle: &CredentialBundle) {
        if let Err(e) = self.store.save(bundle).await {
            tracing::error!(error = %e, "failed to persist credentials");
        }
    }

    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}

fn log_disconnect(disconnect: &Disconnect, reason: DisconnectReason) {
    tracing::warn!(
        status_code = ?disconnect.status_code,
        ?reason,
        message = %disconnect.message,
        "session closed"
    );
}

/// Returns false if cancelled before the delay elapsed.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
