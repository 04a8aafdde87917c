//! Service Bus - runtime, bootstrap and handler dispatch
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              bootstrap(container, configuration)             │
//! │  register_bus() once, then build()                          │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │             ServiceBus (singleton in container)              │
//! │  publish / publish_stream / receive / complete / abandon    │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                     │
//!          ▼                                     ▼
//! ┌──────────────────────┐          ┌───────────────────────────┐
//! │  MessagingFactory    │          │ dispatch_next::<Handler>  │
//! │  (resolved from the  │          │ resolves a handler per    │
//! │   container)         │          │ message, settles it       │
//! └──────────────────────┘          └───────────────────────────┘
//! ```

mod bootstrap;
#[allow(clippy::module_inception)]
mod bus;
mod configuration;
mod dispatch;

pub use bootstrap::bootstrap;
pub use bus::{MessageBus, ServiceBus};
pub use configuration::BusConfiguration;
pub use dispatch::{dispatch_next, DispatchError, MessageHandler, MESSAGE_ARGUMENT};
