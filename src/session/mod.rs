//! Lifecycle of the single messaging session.

pub mod auth_store;
pub mod handle;
pub mod manager;
pub mod pairing;
pub mod socket;

pub use auth_store::{AuthStore, CredentialBundle, StorageError};
pub use handle::{SessionHandle, SessionLease, SessionPhase};
pub use manager::{CloseOutcome, SessionManager};
pub use socket::{
    Connection, ConnectionState, ConnectionUpdate, Connector, Disconnect, DisconnectReason,
    DispatchError, DocumentMessage, MessageReceipt, Socket, SocketEvent, UserIdentity,
};
