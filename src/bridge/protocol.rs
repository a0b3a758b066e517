//! JSON shapes exchanged with the messaging gateway.

use serde::{Deserialize, Serialize};

use crate::session::{CredentialBundle, ConnectionUpdate, UserIdentity};

#[derive(Debug, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub credentials: &'a CredentialBundle,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionResponse {
    pub id: String,
}

/// One event from the gateway's long-poll stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeEvent {
    #[serde(rename = "connection.update")]
    ConnectionUpdate {
        #[serde(flatten)]
        update: ConnectionUpdate,
        #[serde(default)]
        user: Option<UserIdentity>,
    },
    #[serde(rename = "creds.update")]
    CredsUpdate { credentials: CredentialBundle },
}

#[derive(Debug, Serialize)]
pub struct SendDocumentRequest<'a> {
    pub jid: &'a str,
    /// Base64 of the file body
    pub document: String,
    pub mimetype: &'a str,
    #[serde(rename = "fileName")]
    pub file_name: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SendDocumentResponse {
    pub id: String,
}
