//! Bus configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::messaging::ReceiveMode;

/// Everything the bus needs to reach its transport.
///
/// The container treats this as opaque and hands it to the bus unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfiguration {
    /// Registered transport name (see `messaging::list_transports`).
    pub transport: String,
    /// Transport specific connection string; unused by the in-memory transport.
    pub connection_string: Option<String>,
    /// Topic the bus publishes to and subscribes on.
    pub topic_path: String,
    /// Subscription the bus receives from.
    pub subscription_name: String,
    pub receive_mode: ReceiveMode,
    /// Default wait for [`ServiceBus::receive`](super::ServiceBus::receive).
    pub receive_timeout_ms: u64,
}

impl Default for BusConfiguration {
    fn default() -> Self {
        Self {
            transport: "memory".to_string(),
            connection_string: None,
            topic_path: "bus".to_string(),
            subscription_name: "default".to_string(),
            receive_mode: ReceiveMode::PeekLock,
            receive_timeout_ms: 1000,
        }
    }
}

impl BusConfiguration {
    pub fn new(topic_path: impl Into<String>, subscription_name: impl Into<String>) -> Self {
        Self {
            topic_path: topic_path.into(),
            subscription_name: subscription_name.into(),
            ..Self::default()
        }
    }

    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = transport.into();
        self
    }

    pub fn with_receive_mode(mut self, mode: ReceiveMode) -> Self {
        self.receive_mode = mode;
        self
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}
