//! Boundary to the external messaging library.
//!
//! Everything behind [`Connector`] and [`Socket`] (handshake, pairing,
//! encryption, message encoding) is owned by the library. The session
//! manager only sees typed events arriving on a channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::auth_store::CredentialBundle;

/// Connection state as reported by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// Why the remote side dropped the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    ConnectionClosed,
    ConnectionLost,
    ConnectionReplaced,
    LoggedOut,
    BadSession,
    RestartRequired,
    MultideviceMismatch,
    Forbidden,
    UnavailableService,
    Unknown(Option<u16>),
}

impl DisconnectReason {
    pub fn from_status_code(code: Option<u16>) -> Self {
        match code {
            Some(428) => Self::ConnectionClosed,
            // 408 is shared by "connection lost" and "timed out"
            Some(408) => Self::ConnectionLost,
            Some(440) => Self::ConnectionReplaced,
            Some(401) => Self::LoggedOut,
            Some(500) => Self::BadSession,
            Some(515) => Self::RestartRequired,
            Some(411) => Self::MultideviceMismatch,
            Some(403) => Self::Forbidden,
            Some(503) => Self::UnavailableService,
            other => Self::Unknown(other),
        }
    }

    /// Only an explicit logout ends the session for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disconnect {
    #[serde(default, rename = "statusCode")]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub message: String,
}

impl Disconnect {
    pub fn reason(&self) -> DisconnectReason {
        DisconnectReason::from_status_code(self.status_code)
    }
}

/// Authenticated account the socket is logged in as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    #[serde(default)]
    pub connection: Option<ConnectionState>,
    /// Pairing payload, present only while unauthenticated
    #[serde(default)]
    pub qr: Option<String>,
    #[serde(default, rename = "lastDisconnect")]
    pub last_disconnect: Option<Disconnect>,
}

#[derive(Debug, Clone)]
pub enum SocketEvent {
    Connection(ConnectionUpdate),
    Credentials(CredentialBundle),
}

/// One outbound document message.
#[derive(Debug, Clone)]
pub struct DocumentMessage {
    pub document: Vec<u8>,
    pub mimetype: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReceipt {
    pub message_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("socket closed")]
    Closed,
    #[error("session changed before dispatch")]
    SessionReplaced,
    #[error("failed to read staged file: {0}")]
    Read(#[from] std::io::Error),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected by messaging network: {0}")]
    Rejected(String),
}

/// Live connection to the messaging network.
#[async_trait]
pub trait Socket: Send + Sync {
    /// Identity once authenticated, `None` while pairing.
    fn user(&self) -> Option<UserIdentity>;

    async fn send_document(
        &self,
        jid: &str,
        message: DocumentMessage,
    ) -> Result<MessageReceipt, DispatchError>;

    async fn close(&self);
}

/// A freshly built socket plus the events it will emit.
pub struct Connection {
    pub socket: Arc<dyn Socket>,
    pub events: mpsc::Receiver<SocketEvent>,
}

/// Builds sockets from a credential bundle.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, credentials: CredentialBundle) -> anyhow::Result<Connection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_logged_out_is_terminal() {
        assert!(DisconnectReason::from_status_code(Some(401)).is_terminal());
        for code in [Some(428), Some(408), Some(440), Some(500), Some(515), None, Some(999)] {
            assert!(
                !DisconnectReason::from_status_code(code).is_terminal(),
                "{code:?} should reconnect"
            );
        }
    }

    #[test]
    fn connection_update_deserializes_library_shape() {
        let update: ConnectionUpdate = serde_json::from_str(
            r#"{"connection":"close","lastDisconnect":{"statusCode":401,"message":"logged out"}}"#,
        )
        .expect("parse update");

        assert_eq!(update.connection, Some(ConnectionState::Close));
        assert_eq!(
            update.last_disconnect.map(|d| d.reason()),
            Some(DisconnectReason::LoggedOut)
        );
        assert!(update.qr.is_none());
    }
}
