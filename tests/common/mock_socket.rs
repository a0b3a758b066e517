use async_trait::async_trait;
use docrelay::session::{
    DispatchError, DocumentMessage, MessageReceipt, Socket, UserIdentity,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct SentDocument {
    pub jid: String,
    pub file_name: String,
    pub mimetype: String,
    pub body: Vec<u8>,
}

/// In-memory socket that records dispatches and can fail on demand.
pub struct MockSocket {
    user: Option<UserIdentity>,
    fail_at: Option<usize>,
    attempts: AtomicUsize,
    sent: Mutex<Vec<SentDocument>>,
    closed: AtomicBool,
}

impl MockSocket {
    pub fn authenticated() -> Self {
        Self {
            user: Some(UserIdentity {
                id: "910000000000@s.whatsapp.net".to_string(),
                name: Some("relay".to_string()),
            }),
            fail_at: None,
            attempts: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            user: None,
            ..Self::authenticated()
        }
    }

    /// Fail the dispatch attempt with this 0-based index.
    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::authenticated()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentDocument> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Socket for MockSocket {
    fn user(&self) -> Option<UserIdentity> {
        self.user.clone()
    }

    async fn send_document(
        &self,
        jid: &str,
        message: DocumentMessage,
    ) -> Result<MessageReceipt, DispatchError> {
        let index = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(index) {
            return Err(DispatchError::Transport(
                "simulated network failure".to_string(),
            ));
        }

        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentDocument {
                jid: jid.to_string(),
                file_name: message.file_name,
                mimetype: message.mimetype,
                body: message.document,
            });

        Ok(MessageReceipt {
            message_id: format!("msg-{index}"),
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
