//! Messaging factory - endpoints and envelopes over a pluggable transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 MessagingFactory (trait)                     │
//! │  create_topic_client / create_subscription_client           │
//! │  create_brokered_message / close                            │
//! └─────────────────────────────────────────────────────────────┘
//!          │                               │
//!          ▼                               ▼
//! ┌──────────────────┐          ┌──────────────────────────┐
//! │ TopicClient      │          │ SubscriptionClient       │
//! │ send / close     │          │ receive / complete /     │
//! │                  │          │ abandon / close          │
//! └──────────────────┘          └──────────────────────────┘
//!          │                               │
//!          ▼                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │ InMemoryNamespace (included)  │  broker bindings (external)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transports are discovered by name through [`MESSAGING_TRANSPORTS`].

mod endpoint;
mod envelope;
mod error;
mod factory;
#[cfg(feature = "memory")]
mod in_memory;
mod registry;

pub use endpoint::{ReceiveMode, SubscriptionClient, TopicClient};
pub use envelope::{BrokeredMessage, LockToken};
pub use error::{MessagingError, TransportError};
pub use factory::MessagingFactory;
#[cfg(feature = "memory")]
pub use in_memory::{
    InMemoryMessagingFactory, InMemoryNamespace, InMemorySubscriptionClient, InMemoryTopicClient,
};
pub use registry::{
    create_messaging_factory, list_transports, TransportEntry, MESSAGING_TRANSPORTS,
};
