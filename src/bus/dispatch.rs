//! Handler dispatch - receive, resolve a handler, settle.

use std::error::Error;

use thiserror::Error;
use tracing::{debug, warn};

use super::ServiceBus;
use crate::container::{BusContainer, ConstructorArgs, ResolutionError};
use crate::messaging::{BrokeredMessage, MessagingError};

/// Named constructor argument carrying the received [`BrokeredMessage`](crate::messaging::BrokeredMessage).
pub const MESSAGE_ARGUMENT: &str = "message";

/// Processes one received message.
///
/// Handlers are resolved from the container per message, with the message
/// bound to the [`MESSAGE_ARGUMENT`] constructor parameter. Register them
/// with [`Lifetime::PerCall`](crate::container::Lifetime::PerCall): a
/// singleton handler is constructed once, so it keeps the first message it
/// was built with.
///
/// ```ignore
/// impl Component for OrderPlacedHandler {
///     fn construct(resolver: &Resolver<'_>) -> Result<Self, ResolutionError> {
///         Ok(Self {
///             message: resolver.value::<BrokeredMessage>(MESSAGE_ARGUMENT)?,
///             ledger: resolver.resolve::<dyn Ledger>()?,
///         })
///     }
/// }
/// ```
pub trait MessageHandler: Send + Sync {
    fn handle(&self) -> Result<(), Box<dyn Error + Send + Sync>>;
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error("handler resolution failed: {0}")]
    Resolution(#[from] ResolutionError),
    #[error("handler failed for message {message_id}: {source}")]
    Handler {
        message_id: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// Receive the next message and run handler `H` on it.
///
/// Returns `Ok(false)` when nothing arrived within the configured receive
/// timeout. The message is completed when the handler succeeds and abandoned
/// when either resolving or running the handler fails. A failed abandon is
/// logged; the resolution or handler error is still the one returned.
pub fn dispatch_next<H, C>(bus: &dyn ServiceBus, container: &C) -> Result<bool, DispatchError>
where
    H: ?Sized + MessageHandler + 'static,
    C: BusContainer,
{
    let Some(message) = bus.receive(bus.configuration().receive_timeout())? else {
        return Ok(false);
    };

    let args = ConstructorArgs::new().with(MESSAGE_ARGUMENT, message.clone());
    let handler = match container.resolve::<H>(&args) {
        Ok(handler) => handler,
        Err(err) => {
            warn!(
                message_id = message.message_id(),
                error = %err,
                "handler resolution failed, abandoning message"
            );
            abandon(bus, &message);
            return Err(err.into());
        }
    };

    match handler.handle() {
        Ok(()) => {
            bus.complete(&message)?;
            debug!(message_id = message.message_id(), "message handled");
            Ok(true)
        }
        Err(source) => {
            warn!(
                message_id = message.message_id(),
                delivery_count = message.delivery_count(),
                error = %source,
                "handler failed, abandoning message"
            );
            abandon(bus, &message);
            Err(DispatchError::Handler {
                message_id: message.message_id().to_string(),
                source,
            })
        }
    }
}

fn abandon(bus: &dyn ServiceBus, message: &BrokeredMessage) {
    if let Err(err) = bus.abandon(message) {
        warn!(
            message_id = message.message_id(),
            error = %err,
            "abandon failed"
        );
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::bus::{BusConfiguration, MessageBus};
    use crate::container::{Component, Lifetime, Resolver, ServiceContainer};
    use std::io::Read;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::bus::ServiceBus;
    use crate::messaging::{
        InMemoryMessagingFactory, InMemoryNamespace, ReceiveMode, TransportError,
    };

    struct Echo {
        message: BrokeredMessage,
    }

    impl Component for Echo {
        fn construct(resolver: &Resolver<'_>) -> Result<Self, ResolutionError> {
            Ok(Self {
                message: resolver.value(MESSAGE_ARGUMENT)?,
            })
        }
    }

    impl MessageHandler for Echo {
        fn handle(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
            match self.message.body_str() {
                Some("fail") => Err("refused".into()),
                _ => Ok(()),
            }
        }
    }

    fn setup() -> (MessageBus, InMemoryNamespace) {
        let namespace = InMemoryNamespace::new();
        namespace.create_topic("orders");
        namespace.create_subscription("orders", "billing").unwrap();
        let factory = Arc::new(InMemoryMessagingFactory::new(namespace.clone()));
        let mut configuration = BusConfiguration::new("orders", "billing")
            .with_receive_mode(ReceiveMode::PeekLock);
        configuration.receive_timeout_ms = 10;
        (MessageBus::new(configuration, factory), namespace)
    }

    #[test]
    fn idle_when_nothing_arrives() {
        let (bus, _) = setup();
        let mut container = ServiceContainer::new();
        container.register::<Echo, Echo>(Lifetime::PerCall);
        container.build();

        assert!(!dispatch_next::<Echo, _>(&bus, &container).unwrap());
    }

    #[test]
    fn handler_failure_abandons() {
        let (bus, namespace) = setup();
        let mut container = ServiceContainer::new();
        container.register::<Echo, Echo>(Lifetime::PerCall);
        container.build();

        bus.publish(BrokeredMessage::from_text("fail")).unwrap();
        let err = dispatch_next::<Echo, _>(&bus, &container).unwrap_err();
        assert!(matches!(err, DispatchError::Handler { .. }));
        assert_eq!(namespace.pending_count("orders", "billing"), 1);
        assert_eq!(namespace.locked_count("orders", "billing"), 0);
    }

    #[test]
    fn unresolvable_handler_abandons() {
        let (bus, namespace) = setup();
        let mut container = ServiceContainer::new();
        container.build();

        bus.publish(BrokeredMessage::from_text("ok")).unwrap();
        let err = dispatch_next::<Echo, _>(&bus, &container).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Resolution(ResolutionError::NotRegistered { .. })
        ));
        assert_eq!(namespace.pending_count("orders", "billing"), 1);
    }

    /// Delivers one queued message; every settlement fails.
    struct Unsettleable {
        configuration: BusConfiguration,
        queued: Mutex<Option<BrokeredMessage>>,
    }

    impl Unsettleable {
        fn holding(body: &str) -> Self {
            Self {
                configuration: BusConfiguration::default(),
                queued: Mutex::new(Some(BrokeredMessage::from_text(body))),
            }
        }

        fn lock_lost() -> MessagingError {
            TransportError::LockLost("expired".into()).into()
        }
    }

    impl ServiceBus for Unsettleable {
        fn configuration(&self) -> &BusConfiguration {
            &self.configuration
        }

        fn publish(&self, _: BrokeredMessage) -> Result<(), MessagingError> {
            Ok(())
        }

        fn publish_stream(&self, _: &mut dyn Read, _: u64) -> Result<(), MessagingError> {
            Ok(())
        }

        fn receive(&self, _: Duration) -> Result<Option<BrokeredMessage>, MessagingError> {
            Ok(self.queued.lock().unwrap().take())
        }

        fn complete(&self, _: &BrokeredMessage) -> Result<(), MessagingError> {
            Err(Self::lock_lost())
        }

        fn abandon(&self, _: &BrokeredMessage) -> Result<(), MessagingError> {
            Err(Self::lock_lost())
        }
    }

    #[test]
    fn handler_error_survives_failed_abandon() {
        let bus = Unsettleable::holding("fail");
        let mut container = ServiceContainer::new();
        container.register::<Echo, Echo>(Lifetime::PerCall);
        container.build();

        let err = dispatch_next::<Echo, _>(&bus, &container).unwrap_err();
        assert!(matches!(err, DispatchError::Handler { .. }));
    }

    #[test]
    fn resolution_error_survives_failed_abandon() {
        let bus = Unsettleable::holding("ok");
        let mut container = ServiceContainer::new();
        container.build();

        let err = dispatch_next::<Echo, _>(&bus, &container).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Resolution(ResolutionError::NotRegistered { .. })
        ));
    }
}
