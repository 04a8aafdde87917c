//! Transport registry
//!
//! Auto-registration of messaging transports using linkme distributed slices.
//! Transports register themselves via `#[linkme::distributed_slice]` and are
//! looked up by the name configured in [`BusConfiguration::transport`].

use std::sync::Arc;

use super::error::{MessagingError, TransportError};
use super::factory::MessagingFactory;
use crate::bus::BusConfiguration;

/// Registry entry for a messaging transport.
///
/// Each transport registers itself with this entry using
/// `#[linkme::distributed_slice(MESSAGING_TRANSPORTS)]`.
pub struct TransportEntry {
    /// Unique transport name (e.g., "memory")
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Factory function creating a messaging factory for a configuration
    pub factory: fn(&BusConfiguration) -> Result<Arc<dyn MessagingFactory>, MessagingError>,
}

#[linkme::distributed_slice]
pub static MESSAGING_TRANSPORTS: [TransportEntry] = [..];

/// Create the messaging factory named by `configuration.transport`.
///
/// # Example
///
/// ```
/// use bus_composition::bus::BusConfiguration;
/// use bus_composition::messaging::create_messaging_factory;
///
/// let configuration = BusConfiguration::default();
/// let factory = create_messaging_factory(&configuration).unwrap();
/// assert!(!factory.is_closed());
/// ```
pub fn create_messaging_factory(
    configuration: &BusConfiguration,
) -> Result<Arc<dyn MessagingFactory>, MessagingError> {
    let name = configuration.transport.as_str();

    match MESSAGING_TRANSPORTS.iter().find(|entry| entry.name == name) {
        Some(entry) => (entry.factory)(configuration),
        None => Err(TransportError::UnknownTransport {
            name: name.to_string(),
            available: MESSAGING_TRANSPORTS.iter().map(|e| e.name).collect(),
        }
        .into()),
    }
}

/// `(name, description)` of every registered transport.
pub fn list_transports() -> Vec<(&'static str, &'static str)> {
    MESSAGING_TRANSPORTS
        .iter()
        .map(|e| (e.name, e.description))
        .collect()
}

#[cfg(feature = "memory")]
#[linkme::distributed_slice(MESSAGING_TRANSPORTS)]
static MEMORY_TRANSPORT: TransportEntry = TransportEntry {
    name: "memory",
    description: "In-process topics and subscriptions",
    factory: memory_factory,
};

/// Fresh namespace with the configured topic and subscription provisioned.
#[cfg(feature = "memory")]
fn memory_factory(
    configuration: &BusConfiguration,
) -> Result<Arc<dyn MessagingFactory>, MessagingError> {
    use super::in_memory::{InMemoryMessagingFactory, InMemoryNamespace};

    let namespace = InMemoryNamespace::new();
    namespace.create_topic(&configuration.topic_path);
    namespace.create_subscription(&configuration.topic_path, &configuration.subscription_name)?;
    Ok(Arc::new(InMemoryMessagingFactory::new(namespace)))
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;

    #[test]
    fn memory_transport_is_registered() {
        let transports = list_transports();
        assert!(
            transports.iter().any(|(name, _)| *name == "memory"),
            "registered transports: {:?}",
            transports
        );
    }

    #[test]
    fn unknown_transport_lists_alternatives() {
        let configuration = BusConfiguration::default().with_transport("carrier-pigeon");

        match create_messaging_factory(&configuration) {
            Err(MessagingError::Transport(TransportError::UnknownTransport { name, available })) => {
                assert_eq!(name, "carrier-pigeon");
                assert!(available.contains(&"memory"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("unknown transport resolved"),
        }
    }
}
