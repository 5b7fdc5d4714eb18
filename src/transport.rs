//! Window messaging substrate.
//!
//! The widget and the integration bridge never touch a browser `window`
//! directly. Outbound traffic goes through a [`MessageTransport`] and
//! inbound traffic arrives on a [`MessageBus`], so both can be driven by
//! synthetic messages in tests or by a real `postMessage` shim when embedded.

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

/// Capacity of the inbound broadcast channel.
const BUS_CAPACITY: usize = 256;

/// Errors raised when a message cannot be posted.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("target window is not available")]
    TargetUnavailable,

    #[error("transport closed")]
    Closed,
}

/// Outbound half of the window messaging channel.
///
/// One post delivers one message atomically; callers may interleave posts
/// freely.
pub trait MessageTransport: Send + Sync {
    fn post_message(&self, message: Value) -> Result<(), TransportError>;
}

/// In-process transport backed by an unbounded channel.
///
/// The receiver side sees every posted message in post order.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<Value>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        (Self { outbound }, receiver)
    }
}

impl MessageTransport for ChannelTransport {
    fn post_message(&self, message: Value) -> Result<(), TransportError> {
        self.outbound
            .send(message)
            .map_err(|_| TransportError::Closed)
    }
}

/// Inbound message fan-out, the equivalent of `window.addEventListener('message')`.
#[derive(Debug, Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<Value>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Deliver a message to every current subscriber.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, message: Value) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_transport_preserves_post_order() {
        let (transport, mut receiver) = ChannelTransport::new();
        transport.post_message(json!({"n": 1})).unwrap();
        transport.post_message(json!({"n": 2})).unwrap();

        assert_eq!(receiver.try_recv().unwrap()["n"], 1);
        assert_eq!(receiver.try_recv().unwrap()["n"], 2);
    }

    #[test]
    fn channel_transport_reports_closed_receiver() {
        let (transport, receiver) = ChannelTransport::new();
        drop(receiver);

        let err = transport.post_message(json!({})).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn bus_without_subscribers_drops_messages() {
        let bus = MessageBus::new();
        assert_eq!(bus.publish(json!({"type": "noop"})), 0);

        let mut receiver = bus.subscribe();
        assert_eq!(bus.publish(json!({"type": "ping"})), 1);
        assert_eq!(receiver.try_recv().unwrap()["type"], "ping");
    }
}
