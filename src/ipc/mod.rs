//! Correlated request/response channel over window messaging.
//!
//! This module provides an async request client that handles:
//! - Request/response correlation by id
//! - Per-path timeouts
//! - Dropping stale responses for requests that already gave up

/// Closed enums for every inbound and outbound window message.
pub mod messages;
/// Request/response envelope types.
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio::time::timeout;

use crate::transport::{MessageTransport, TransportError};

pub use types::*;

/// Request channel errors.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Timeout waiting for response to {path}")]
    Timeout { path: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request {id} was abandoned before a response arrived")]
    Abandoned { id: RequestId },
}

/// Request waiting for its response.
struct PendingRequest {
    path: String,
    sender: oneshot::Sender<HostResponse>,
}

/// Request client that calls back into the host window.
pub struct RequestChannel {
    transport: Arc<dyn MessageTransport>,

    /// Pending requests waiting for responses.
    pending: Arc<Mutex<HashMap<RequestId, PendingRequest>>>,

    timeouts: RequestTimeouts,
}

impl RequestChannel {
    pub fn new(transport: Arc<dyn MessageTransport>, timeouts: RequestTimeouts) -> Self {
        Self {
            transport,
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeouts,
        }
    }

    /// Send a request to `path` and wait for the correlated response.
    pub async fn request(&self, path: &str, payload: Value) -> Result<HostResponse, RequestError> {
        let (tx, rx) = oneshot::channel();

        // Register before posting so a synchronous reply cannot be missed.
        let id = {
            let mut pending = self.pending.lock().await;
            let mut id = RequestId::generate();
            while pending.contains_key(&id) {
                id = RequestId::generate();
            }
            pending.insert(
                id.clone(),
                PendingRequest {
                    path: path.to_string(),
                    sender: tx,
                },
            );
            id
        };

        let envelope = RequestEnvelope::new(id.clone(), path, payload);
        let message = match serde_json::to_value(&envelope) {
            Ok(message) => message,
            Err(e) => {
                self.cleanup_pending(&id).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.transport.post_message(message) {
            self.cleanup_pending(&id).await;
            return Err(e.into());
        }

        let path_timeout = self.timeouts.get(path);
        match timeout(path_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.cleanup_pending(&id).await;
                Err(RequestError::Abandoned { id })
            }
            Err(_) => {
                self.cleanup_pending(&id).await;
                log::warn!("Request {} to {} timed out after {:?}", id, path, path_timeout);
                Err(RequestError::Timeout {
                    path: path.to_string(),
                })
            }
        }
    }

    /// Route an inbound window message.
    ///
    /// Returns `true` when the message was a response envelope, whether or
    /// not a pending request was waiting for it.
    pub async fn handle_message(&self, message: &Value) -> bool {
        let Some(envelope) = ResponseEnvelope::from_message(message) else {
            return false;
        };

        let request = self.pending.lock().await.remove(&envelope.id);
        match request {
            Some(request) => {
                log::debug!("Response {} for {}", envelope.id, request.path);
                let _ = request.sender.send(envelope.into());
            }
            None => {
                log::warn!("Received response for unknown request id: {}", envelope.id);
            }
        }
        true
    }

    /// Number of requests still waiting for a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    async fn cleanup_pending(&self, id: &RequestId) {
        self.pending.lock().await.remove(id);
    }
}
