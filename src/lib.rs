//! Composition layer for a topic/subscription service bus.
//!
//! - [`container`]: register / build / resolve lifecycle for bus components
//! - [`messaging`]: topic and subscription endpoints over a pluggable transport
//! - [`bus`]: the bus runtime, its bootstrap and handler dispatch

pub mod bus;
pub mod config;
pub mod container;
pub mod logging;
pub mod messaging;

pub use bus::{bootstrap, BusConfiguration, MessageBus, ServiceBus};
pub use config::{ConfigError, ConfigLoader, Settings};
pub use container::{
    BusContainer, Component, ConstructorArgs, Lifetime, ResolutionError, ServiceContainer,
    ServiceKey,
};
pub use messaging::{BrokeredMessage, MessagingError, MessagingFactory, ReceiveMode};
