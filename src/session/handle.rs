//! Process-wide connection handle.
//!
//! The supervisor swaps sockets in and out; request handlers only read.
//! Every install bumps a generation so a handler can tell whether the socket
//! it leased is still the live one.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

use super::socket::Socket;

/// Lifecycle of the single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Uninitialized,
    Connecting,
    Open,
    /// Logged out remotely; only re-pairing gets out of here.
    Terminal,
}

impl SessionPhase {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionPhase::Open)
    }
}

/// Socket checked out for one request.
#[derive(Clone)]
pub struct SessionLease {
    pub socket: Arc<dyn Socket>,
    pub generation: u64,
}

struct Installed {
    socket: Arc<dyn Socket>,
    generation: u64,
}

struct HandleInner {
    current: RwLock<Option<Installed>>,
    phase: watch::Sender<SessionPhase>,
    generation: AtomicU64,
}

#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<HandleInner>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(SessionPhase::Uninitialized);
        Self {
            inner: Arc::new(HandleInner {
                current: RwLock::new(None),
                phase,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        *self.inner.phase.borrow()
    }

    /// Readiness flag read by request handlers.
    pub fn is_connected(&self) -> bool {
        self.phase().is_ready()
    }

    /// Subscribe to phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.inner.phase.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Replace whatever socket is installed and return the one it displaced.
    pub fn install(&self, socket: Arc<dyn Socket>) -> (u64, Option<Arc<dyn Socket>>) {
        let mut current = match self.inner.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Session handle lock poisoned during install, recovering");
                poisoned.into_inner()
            }
        };
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = current.replace(Installed { socket, generation });
        self.set_phase(SessionPhase::Connecting);
        tracing::debug!(generation, "socket installed");
        (generation, previous.map(|p| p.socket))
    }

    /// Drop the installed socket, returning it so the caller can close it.
    pub fn take(&self) -> Option<Arc<dyn Socket>> {
        let mut current = match self.inner.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Session handle lock poisoned during take, recovering");
                poisoned.into_inner()
            }
        };
        current.take().map(|i| i.socket)
    }

    pub fn set_phase(&self, phase: SessionPhase) {
        self.inner.phase.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            tracing::debug!(from = ?*current, to = ?phase, "session phase");
            *current = phase;
            true
        });
    }

    /// Lease the live socket if it is open and authenticated.
    pub fn acquire(&self) -> Option<SessionLease> {
        if !self.is_connected() {
            return None;
        }

        let current = match self.inner.current.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Session handle lock poisoned during acquire, recovering");
                poisoned.into_inner()
            }
        };
        let installed = current.as_ref()?;
        installed.socket.user()?;

        Some(SessionLease {
            socket: installed.socket.clone(),
            generation: installed.generation,
        })
    }

    /// Whether a lease still points at the open, installed socket.
    pub fn is_current(&self, lease: &SessionLease) -> bool {
        self.is_connected() && self.generation() == lease.generation
    }
}
