//! Resolution container - register / build / resolve lifecycle.
//!
//! Components are registered against a service contract, buffered until
//! `build`, and then resolved by the bus runtime, optionally with named
//! constructor arguments.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │               BusContainer (trait)                        │
//! │  register / register_factory / register_instance         │
//! │  build / is_registered / resolve / register_bus          │
//! └──────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │ ServiceContainer                                          │
//! │  RegistryBuilder (pending)  ──build──▶  Registry (store)  │
//! │  Ownership: SelfOwned | CallerOwned                       │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod args;
mod component;
#[allow(clippy::module_inception)]
mod container;
mod error;
mod key;
mod lifetime;
mod registry;

pub use args::ConstructorArgs;
pub use component::{Component, Implements, Instance};
pub use container::{BusContainer, Ownership, ServiceContainer};
pub use error::ResolutionError;
pub use key::ServiceKey;
pub use lifetime::Lifetime;
pub use registry::{Registry, RegistryBuilder, RegistrationInfo, Resolver};
