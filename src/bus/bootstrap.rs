//! Bus bootstrap.

use tracing::info;

use super::BusConfiguration;
use crate::container::BusContainer;

/// Register the bus singleton, then build the container.
///
/// Safe to call on a container that already carries a bus: the existing
/// registration is kept and only the build runs. The container must already
/// hold (or receive in this build) a
/// [`MessagingFactory`](crate::messaging::MessagingFactory) registration for
/// the bus to resolve.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use bus_composition::bus::{bootstrap, BusConfiguration, ServiceBus};
/// use bus_composition::container::{BusContainer, ConstructorArgs, ServiceContainer};
/// use bus_composition::messaging::{create_messaging_factory, MessagingFactory};
///
/// let configuration = BusConfiguration::default();
/// let factory = create_messaging_factory(&configuration).unwrap();
///
/// let mut container = ServiceContainer::new();
/// container.register_instance::<dyn MessagingFactory>(factory);
/// bootstrap(&mut container, configuration);
///
/// let bus = container.resolve::<dyn ServiceBus>(&ConstructorArgs::new()).unwrap();
/// assert_eq!(bus.configuration().topic_path, "bus");
/// ```
pub fn bootstrap<C: BusContainer>(container: &mut C, configuration: BusConfiguration) {
    info!(
        transport = %configuration.transport,
        topic = %configuration.topic_path,
        subscription = %configuration.subscription_name,
        "bootstrapping bus"
    );
    container.register_bus(configuration);
    container.build();
}
