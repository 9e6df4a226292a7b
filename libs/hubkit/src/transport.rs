//! Contracts the core requires from the connection transport.
//!
//! The transport owns sockets, framing and group membership storage. The core
//! only needs two narrow capabilities from it:
//! - [`MessageSender`]: deliver a named message with positional arguments to a [`Target`]
//! - [`GroupManager`]: add or remove a connection from a named group
//!
//! [`ClientSender`] binds a sender to one target. It is the send primitive every
//! generated client proxy is constructed over.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::target::Target;

/// Outbound invocation of a client method.
///
/// `target` is the message name peers subscribe to; it equals the client
/// interface method (or its `#[hub(name = "...")]` override) that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubMessage {
    pub target: String,
    pub arguments: Vec<Value>,
}

impl HubMessage {
    pub fn new(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            target: target.into(),
            arguments,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to serialize argument for '{message}': {source}")]
    Serialize {
        message: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("connection '{connection_id}' is closed")]
    ConnectionClosed { connection_id: String },

    #[error("connection '{connection_id}' is not known to the transport")]
    UnknownConnection { connection_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Delivers messages to addressable targets.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, target: &Target, message: HubMessage) -> Result<(), TransportError>;
}

/// Group membership storage.
#[async_trait]
pub trait GroupManager: Send + Sync {
    async fn add_to_group(&self, connection_id: &str, group: &str) -> Result<(), TransportError>;

    async fn remove_from_group(
        &self,
        connection_id: &str,
        group: &str,
    ) -> Result<(), TransportError>;
}

/// A [`MessageSender`] bound to one [`Target`].
#[derive(Clone)]
pub struct ClientSender {
    sender: Arc<dyn MessageSender>,
    target: Target,
}

impl ClientSender {
    pub fn new(sender: Arc<dyn MessageSender>, target: Target) -> Self {
        Self { sender, target }
    }

    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Send `message` with `arguments` in the given order.
    ///
    /// # Errors
    /// Propagates whatever the underlying transport reports.
    pub async fn send(&self, message: &str, arguments: Vec<Value>) -> Result<(), TransportError> {
        tracing::trace!(message, target = %self.target, args = arguments.len(), "sending client message");
        self.sender
            .send(&self.target, HubMessage::new(message, arguments))
            .await
    }
}

impl std::fmt::Debug for ClientSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSender")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Target, HubMessage)>>);

    #[async_trait]
    impl MessageSender for Recorder {
        async fn send(&self, target: &Target, message: HubMessage) -> Result<(), TransportError> {
            self.0.lock().push((target.clone(), message));
            Ok(())
        }
    }

    #[tokio::test]
    async fn client_sender_forwards_name_args_and_target() {
        let recorder = Arc::new(Recorder::default());
        let sender = ClientSender::new(recorder.clone(), Target::Group("weather".to_owned()));

        sender
            .send("ReceiveWeatherUpdate", vec![json!(1), json!("two")])
            .await
            .unwrap();

        let sent = recorder.0.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Target::Group("weather".to_owned()));
        assert_eq!(sent[0].1.target, "ReceiveWeatherUpdate");
        assert_eq!(sent[0].1.arguments, vec![json!(1), json!("two")]);
    }

    #[test]
    fn hub_message_serializes_with_target_and_arguments() {
        let msg = HubMessage::new("Ping", vec![json!(true)]);
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v, json!({"target": "Ping", "arguments": [true]}));
    }
}
