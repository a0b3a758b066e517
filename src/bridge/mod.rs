//! [`Connector`] backed by a messaging gateway sidecar.
//!
//! The gateway embeds the messaging library and exposes sessions over HTTP:
//!
//! - `POST   /sessions`               create from a credential bundle
//! - `GET    /sessions/{id}/events`   long-poll for connection/credential events
//! - `POST   /sessions/{id}/messages` send one document
//! - `DELETE /sessions/{id}`          tear down

pub mod protocol;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::config::BridgeSettings;
use crate::session::{
    Connection, ConnectionState, ConnectionUpdate, Connector, CredentialBundle, Disconnect,
    DispatchError, DocumentMessage, MessageReceipt, Socket, SocketEvent, UserIdentity,
};
use protocol::{
    BridgeEvent, CreateSessionRequest, CreateSessionResponse, SendDocumentRequest,
    SendDocumentResponse,
};

const EVENT_BUFFER: usize = 64;

pub struct BridgeConnector {
    client: reqwest::Client,
    base_url: String,
    poll_timeout: Duration,
}

impl BridgeConnector {
    pub fn new(settings: &BridgeSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            poll_timeout: Duration::from_secs(settings.poll_timeout_secs),
        })
    }
}

#[async_trait]
impl Connector for BridgeConnector {
    async fn connect(&self, credentials: CredentialBundle) -> Result<Connection> {
        let created: CreateSessionResponse = self
            .client
            .post(format!("{}/sessions", self.base_url))
            .json(&CreateSessionRequest {
                credentials: &credentials,
            })
            .send()
            .await
            .context("Failed to reach messaging gateway")?
            .error_for_status()
            .context("Gateway refused to create session")?
            .json()
            .await
            .context("Invalid create-session response")?;

        tracing::debug!(session_id = %created.id, "gateway session created");

        let socket = Arc::new(BridgeSocket {
            client: self.client.clone(),
            session_url: format!("{}/sessions/{}", self.base_url, created.id),
            user: RwLock::new(None),
            closed: CancellationToken::new(),
        });

        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(poll_events(socket.clone(), tx, self.poll_timeout));

        Ok(Connection { socket, events })
    }
}

pub struct BridgeSocket {
    client: reqwest::Client,
    session_url: String,
    user: RwLock<Option<UserIdentity>>,
    closed: CancellationToken,
}

impl BridgeSocket {
    fn set_user(&self, user: Option<UserIdentity>) {
        let mut slot = match self.user.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = user;
    }
}

#[async_trait]
impl Socket for BridgeSocket {
    fn user(&self) -> Option<UserIdentity> {
        match self.user.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn send_document(
        &self,
        jid: &str,
        message: DocumentMessage,
    ) -> Result<MessageReceipt, DispatchError> {
        if self.closed.is_cancelled() {
            return Err(DispatchError::Closed);
        }

        let body = SendDocumentRequest {
            jid,
            document: STANDARD.encode(&message.document),
            mimetype: &message.mimetype,
            file_name: &message.file_name,
        };

        let response = self
            .client
            .post(format!("{}/messages", self.session_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected(format!("{status}: {detail}")));
        }

        let sent: SendDocumentResponse = response
            .json()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        Ok(MessageReceipt {
            message_id: sent.id,
        })
    }

    async fn close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();

        if let Err(e) = self.client.delete(&self.session_url).send().await {
            tracing::debug!(error = %e, "gateway session teardown failed");
        }
    }
}

/// Forward gateway events until the socket closes or the receiver goes away.
async fn poll_events(
    socket: Arc<BridgeSocket>,
    tx: mpsc::Sender<SocketEvent>,
    poll_timeout: Duration,
) {
    let url = format!("{}/events", socket.session_url);
    let timeout_secs = poll_timeout.as_secs().to_string();

    loop {
        let request = socket
            .client
            .get(&url)
            .query(&[("timeout", timeout_secs.as_str())])
            .timeout(poll_timeout + Duration::from_secs(5))
            .send();

        let batch = tokio::select! {
            _ = socket.closed.cancelled() => return,
            result = request => fetch_batch(result).await,
        };

        let events = match batch {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "gateway event poll failed");
                socket.set_user(None);
                let _ = tx.send(lost_connection(e.to_string())).await;
                return;
            }
        };

        for event in events {
            let (event, closed) = match event {
                BridgeEvent::ConnectionUpdate { update, user } => {
                    if user.is_some() {
                        socket.set_user(user);
                    }
                    let closed = update.connection == Some(ConnectionState::Close);
                    if closed {
                        socket.set_user(None);
                    }
                    (SocketEvent::Connection(update), closed)
                }
                BridgeEvent::CredsUpdate { credentials } => {
                    (SocketEvent::Credentials(credentials), false)
                }
            };

            if tx.send(event).await.is_err() || closed {
                return;
            }
        }
    }
}

async fn fetch_batch(
    result: reqwest::Result<reqwest::Response>,
) -> reqwest::Result<Vec<BridgeEvent>> {
    result?.error_for_status()?.json().await
}

/// Close event with no status code, treated as recoverable.
fn lost_connection(message: String) -> SocketEvent {
    SocketEvent::Connection(ConnectionUpdate {
        connection: Some(ConnectionState::Close),
        qr: None,
        last_disconnect: Some(Disconnect {
            status_code: None,
            message,
        }),
    })
}
