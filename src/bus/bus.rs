//! Service Bus - publishes to a topic and receives from a subscription.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use tracing::debug;

use super::BusConfiguration;
use crate::messaging::{
    BrokeredMessage, MessagingError, MessagingFactory, SubscriptionClient, TopicClient,
};

/// The bus as seen by application code.
///
/// One instance per container, registered by
/// [`BusContainer::register_bus`](crate::container::BusContainer::register_bus).
pub trait ServiceBus: Send + Sync {
    fn configuration(&self) -> &BusConfiguration;

    /// Send a message to the configured topic.
    fn publish(&self, message: BrokeredMessage) -> Result<(), MessagingError>;

    /// Wrap `length` bytes of `body` in an envelope and publish it.
    fn publish_stream(&self, body: &mut dyn Read, length: u64) -> Result<(), MessagingError>;

    /// Wait up to `timeout` for the next message on the configured subscription.
    fn receive(&self, timeout: Duration) -> Result<Option<BrokeredMessage>, MessagingError>;

    /// Settle a received message as processed.
    fn complete(&self, message: &BrokeredMessage) -> Result<(), MessagingError>;

    /// Return a received message for redelivery.
    fn abandon(&self, message: &BrokeredMessage) -> Result<(), MessagingError>;
}

/// [`ServiceBus`] over a [`MessagingFactory`].
///
/// Endpoints are created on first use and cached. Messages received without
/// a lock token (receive-and-delete) are already settled, so completing or
/// abandoning them is a no-op.
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use bus_composition::bus::{BusConfiguration, MessageBus, ServiceBus};
/// use bus_composition::messaging::{create_messaging_factory, BrokeredMessage};
///
/// let configuration = BusConfiguration::new("orders", "billing");
/// let factory = create_messaging_factory(&configuration).unwrap();
/// let bus = MessageBus::new(configuration, factory);
///
/// bus.publish(BrokeredMessage::from_text("placed")).unwrap();
/// let message = bus.receive(Duration::from_millis(100)).unwrap().unwrap();
/// bus.complete(&message).unwrap();
/// ```
pub struct MessageBus {
    configuration: BusConfiguration,
    factory: Arc<dyn MessagingFactory>,
    topic: OnceCell<Arc<dyn TopicClient>>,
    subscription: OnceCell<Arc<dyn SubscriptionClient>>,
}

impl MessageBus {
    pub fn new(configuration: BusConfiguration, factory: Arc<dyn MessagingFactory>) -> Self {
        Self {
            configuration,
            factory,
            topic: OnceCell::new(),
            subscription: OnceCell::new(),
        }
    }

    pub fn factory(&self) -> &Arc<dyn MessagingFactory> {
        &self.factory
    }

    /// Close the endpoints this bus created. The factory stays open.
    pub fn close(&self) {
        if let Some(topic) = self.topic.get() {
            topic.close();
        }
        if let Some(subscription) = self.subscription.get() {
            subscription.close();
        }
    }

    fn topic_client(&self) -> Result<&Arc<dyn TopicClient>, MessagingError> {
        self.topic.get_or_try_init(|| {
            debug!(topic = %self.configuration.topic_path, "opening topic client");
            self.factory
                .create_topic_client(&self.configuration.topic_path)
        })
    }

    fn subscription_client(&self) -> Result<&Arc<dyn SubscriptionClient>, MessagingError> {
        self.subscription.get_or_try_init(|| {
            debug!(
                topic = %self.configuration.topic_path,
                subscription = %self.configuration.subscription_name,
                "opening subscription client"
            );
            self.factory.create_subscription_client(
                &self.configuration.topic_path,
                &self.configuration.subscription_name,
                self.configuration.receive_mode,
            )
        })
    }
}

impl ServiceBus for MessageBus {
    fn configuration(&self) -> &BusConfiguration {
        &self.configuration
    }

    fn publish(&self, message: BrokeredMessage) -> Result<(), MessagingError> {
        self.topic_client()?.send(message)
    }

    fn publish_stream(&self, body: &mut dyn Read, length: u64) -> Result<(), MessagingError> {
        let message = self.factory.create_brokered_message(body, length)?;
        self.publish(message)
    }

    fn receive(&self, timeout: Duration) -> Result<Option<BrokeredMessage>, MessagingError> {
        self.subscription_client()?.receive(timeout)
    }

    fn complete(&self, message: &BrokeredMessage) -> Result<(), MessagingError> {
        match message.lock_token() {
            Some(token) => self.subscription_client()?.complete(&token),
            None => Ok(()),
        }
    }

    fn abandon(&self, message: &BrokeredMessage) -> Result<(), MessagingError> {
        match message.lock_token() {
            Some(token) => self.subscription_client()?.abandon(&token),
            None => Ok(()),
        }
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::messaging::{InMemoryMessagingFactory, InMemoryNamespace, ReceiveMode};

    fn bus(mode: ReceiveMode) -> (MessageBus, InMemoryNamespace) {
        let namespace = InMemoryNamespace::new();
        namespace.create_topic("orders");
        namespace.create_subscription("orders", "billing").unwrap();
        let factory = Arc::new(InMemoryMessagingFactory::new(namespace.clone()));
        let configuration = BusConfiguration::new("orders", "billing").with_receive_mode(mode);
        (MessageBus::new(configuration, factory), namespace)
    }

    #[test]
    fn publish_stream_wraps_payload() {
        let (bus, namespace) = bus(ReceiveMode::PeekLock);
        let mut body: &[u8] = b"payload-and-trailer";

        bus.publish_stream(&mut body, 7).unwrap();
        assert_eq!(namespace.pending_count("orders", "billing"), 1);
        assert_eq!(body, b"-and-trailer");

        let message = bus.receive(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(message.body_str(), Some("payload"));
        bus.complete(&message).unwrap();
        assert_eq!(namespace.locked_count("orders", "billing"), 0);
    }

    #[test]
    fn settling_unlocked_message_is_noop() {
        let (bus, _) = bus(ReceiveMode::ReceiveAndDelete);
        bus.publish(BrokeredMessage::from_text("x")).unwrap();

        let message = bus.receive(Duration::from_millis(10)).unwrap().unwrap();
        assert!(message.lock_token().is_none());
        bus.complete(&message).unwrap();
        bus.abandon(&message).unwrap();
    }

    #[test]
    fn endpoints_are_created_once() {
        let namespace = InMemoryNamespace::new();
        namespace.create_topic("orders");
        namespace.create_subscription("orders", "billing").unwrap();
        let factory = Arc::new(InMemoryMessagingFactory::new(namespace));
        let bus = MessageBus::new(BusConfiguration::new("orders", "billing"), factory.clone());

        bus.publish(BrokeredMessage::from_text("a")).unwrap();
        bus.publish(BrokeredMessage::from_text("b")).unwrap();
        bus.receive(Duration::from_millis(10)).unwrap();
        assert_eq!(factory.open_endpoints(), 2);

        bus.close();
        assert_eq!(factory.open_endpoints(), 0);
        assert!(!factory.is_closed());
    }

    #[test]
    fn missing_topic_surfaces_on_first_use() {
        let factory = Arc::new(InMemoryMessagingFactory::new(InMemoryNamespace::new()));
        let bus = MessageBus::new(BusConfiguration::new("nowhere", "nobody"), factory);

        assert!(bus.publish(BrokeredMessage::from_text("x")).is_err());
    }
}
