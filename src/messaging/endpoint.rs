//! Send and receive endpoints.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::envelope::{BrokeredMessage, LockToken};
use super::error::MessagingError;

/// Acknowledgement semantics of a subscription client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveMode {
    /// At-least-once: received messages stay locked until completed or
    /// abandoned.
    #[default]
    PeekLock,
    /// Messages are removed from the subscription as they are received.
    ReceiveAndDelete,
}

/// Send endpoint bound to a topic.
///
/// Unlike a queue sender, every subscription of the topic gets its own copy
/// of each message sent.
pub trait TopicClient: Send + Sync {
    fn path(&self) -> &str;

    /// Send a single message to the topic.
    fn send(&self, message: BrokeredMessage) -> Result<(), MessagingError>;

    /// Send multiple messages.
    ///
    /// Default implementation sends messages sequentially.
    /// Implementations may override for batch optimization.
    fn send_batch(&self, messages: Vec<BrokeredMessage>) -> Result<(), MessagingError> {
        for message in messages {
            self.send(message)?;
        }
        Ok(())
    }

    /// Release the endpoint. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Receive endpoint bound to a topic/subscription pair.
///
/// This is a pull-based interface.
pub trait SubscriptionClient: Send + Sync {
    fn topic_path(&self) -> &str;

    /// Subscription name.
    fn name(&self) -> &str;

    fn mode(&self) -> ReceiveMode;

    /// Wait up to `timeout` for the next message.
    fn receive(&self, timeout: Duration) -> Result<Option<BrokeredMessage>, MessagingError>;

    /// Settle a peek-locked message as processed.
    fn complete(&self, lock_token: &LockToken) -> Result<(), MessagingError>;

    /// Release a peek-locked message for redelivery.
    fn abandon(&self, lock_token: &LockToken) -> Result<(), MessagingError>;

    /// Release the endpoint. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}
