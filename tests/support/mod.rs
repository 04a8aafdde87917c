//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use bus_composition::bus::BusConfiguration;
use bus_composition::container::{Component, ResolutionError, Resolver};
use bus_composition::implements;
use bus_composition::messaging::{InMemoryMessagingFactory, InMemoryNamespace};

pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

/// Clock that always reads zero; resolvable from the graph.
pub struct ZeroClock;

impl Component for ZeroClock {
    fn construct(_: &Resolver<'_>) -> Result<Self, ResolutionError> {
        Ok(ZeroClock)
    }
}

impl Clock for ZeroClock {
    fn now(&self) -> u64 {
        0
    }
}

implements!(ZeroClock => dyn Clock);

pub trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

/// Two constructor parameters: `prefix` (value, defaults to "hello") and
/// `clock` (dependency on `dyn Clock`).
pub struct Greeting {
    pub prefix: String,
    pub clock: Arc<dyn Clock>,
}

impl Component for Greeting {
    fn construct(resolver: &Resolver<'_>) -> Result<Self, ResolutionError> {
        Ok(Self {
            prefix: resolver.value_or("prefix", "hello".to_string())?,
            clock: resolver.dependency::<dyn Clock>("clock")?,
        })
    }
}

impl Greeter for Greeting {
    fn greet(&self, name: &str) -> String {
        format!("{} {} @{}", self.prefix, name, self.clock.now())
    }
}

implements!(Greeting => dyn Greeter);

pub fn configuration(topic: &str, subscription: &str) -> BusConfiguration {
    let mut configuration = BusConfiguration::new(topic, subscription);
    configuration.receive_timeout_ms = 50;
    configuration
}

/// Namespace with `topic` and its `subscriptions` provisioned.
pub fn namespace(topic: &str, subscriptions: &[&str]) -> InMemoryNamespace {
    let namespace = InMemoryNamespace::new();
    namespace.create_topic(topic);
    for name in subscriptions {
        namespace
            .create_subscription(topic, name)
            .expect("topic was just created");
    }
    namespace
}

pub fn factory(topic: &str, subscriptions: &[&str]) -> Arc<InMemoryMessagingFactory> {
    Arc::new(InMemoryMessagingFactory::new(namespace(topic, subscriptions)))
}
