use std::sync::Arc;

use crate::common::config::{AppConfig, DeliverySettings};
use crate::session::SessionHandle;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub delivery: Arc<DeliverySettings>,
    pub body_limit: usize,
}

impl AppState {
    pub fn new(session: SessionHandle, config: &AppConfig) -> Self {
        Self {
            session,
            delivery: Arc::new(config.delivery.clone()),
            body_limit: config.request_body_limit(),
        }
    }
}
