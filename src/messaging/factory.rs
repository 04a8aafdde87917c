//! Messaging factory contract.

use std::io::Read;
use std::sync::Arc;

use super::endpoint::{ReceiveMode, SubscriptionClient, TopicClient};
use super::envelope::BrokeredMessage;
use super::error::MessagingError;

/// Creates endpoints and envelopes against one transport.
///
/// A factory is open from construction until [`close`](Self::close); once
/// closed every creation call fails with [`MessagingError::FactoryClosed`]
/// and it never reopens. Endpoints created by the factory are closed with
/// it.
///
/// Implementations might include:
/// - `InMemoryMessagingFactory` - For testing and single-process scenarios
/// - A broker SDK binding (Azure Service Bus, NATS, Kafka, ...)
pub trait MessagingFactory: Send + Sync {
    /// Receive endpoint for `name` on `topic_path`.
    fn create_subscription_client(
        &self,
        topic_path: &str,
        name: &str,
        mode: ReceiveMode,
    ) -> Result<Arc<dyn SubscriptionClient>, MessagingError>;

    /// Send endpoint for `path`.
    fn create_topic_client(&self, path: &str) -> Result<Arc<dyn TopicClient>, MessagingError>;

    /// Wrap `length` bytes of `body` in an envelope.
    ///
    /// The reader is only borrowed and is not read past `length`.
    fn create_brokered_message(
        &self,
        body: &mut dyn Read,
        length: u64,
    ) -> Result<BrokeredMessage, MessagingError>;

    /// Release every transport resource. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}
