//! Resolution container used by the bus runtime.

use std::sync::Arc;

use tracing::debug;

use super::args::ConstructorArgs;
use super::component::{Component, Implements, Instance};
use super::error::ResolutionError;
use super::key::ServiceKey;
use super::lifetime::Lifetime;
use super::registry::{Registry, RegistryBuilder, Resolver};
use crate::bus::{BusConfiguration, MessageBus, ServiceBus};
use crate::messaging::MessagingFactory;

/// Capabilities the bus runtime needs from a container.
///
/// Registration is a configuration-time activity and takes `&mut self`;
/// resolution takes `&self` and may run on many threads once built.
pub trait BusContainer {
    /// Buffer a mapping from service `S` to implementation `I`.
    fn register<S, I>(&mut self, lifetime: Lifetime)
    where
        S: ?Sized + Send + Sync + 'static,
        I: Component + Implements<S>;

    /// Buffer a closure that constructs service `S`.
    fn register_factory<S, F>(&mut self, lifetime: Lifetime, factory: F)
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<S>, ResolutionError> + Send + Sync + 'static;

    /// Buffer an existing instance as the singleton for service `S`.
    fn register_instance<S>(&mut self, instance: Arc<S>)
    where
        S: ?Sized + Send + Sync + 'static;

    /// Resolve by service key; the type-erased counterpart of [`resolve`](Self::resolve).
    fn resolve_service(
        &self,
        service: &ServiceKey,
        args: &ConstructorArgs,
    ) -> Result<Instance, ResolutionError>;

    /// Commit every buffered registration.
    fn build(&mut self);

    /// Whether a committed registration exists for `service`.
    ///
    /// Always false before the first [`build`](Self::build).
    fn is_registered(&self, service: &ServiceKey) -> bool;

    /// Whether a registration for `service` is buffered but not yet built.
    fn is_pending(&self, service: &ServiceKey) -> bool;

    /// Resolve service `S`, passing `args` to its constructor.
    fn resolve<S>(&self, args: &ConstructorArgs) -> Result<Arc<S>, ResolutionError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.resolve_service(&ServiceKey::of::<S>(), args)?
            .into_service::<S>()
    }

    /// Register the bus singleton unless one is already registered.
    ///
    /// The bus is constructed on first resolution from `configuration` and the
    /// [`MessagingFactory`] registered in this container. Calling this again
    /// is a no-op.
    fn register_bus(&mut self, configuration: BusConfiguration) {
        let service = ServiceKey::of::<dyn ServiceBus>();
        if self.is_registered(&service) || self.is_pending(&service) {
            debug!(service = %service, "bus already registered");
            return;
        }

        debug!(topic = %configuration.topic_path, "registering bus");
        self.register_factory::<dyn ServiceBus, _>(Lifetime::Singleton, move |resolver| {
            let factory = resolver.resolve::<dyn MessagingFactory>()?;
            let bus: Arc<dyn ServiceBus> = Arc::new(MessageBus::new(configuration.clone(), factory));
            Ok(bus)
        });
    }
}

/// Who owns a container's backing [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Created by the container on its first build.
    SelfOwned,
    /// Supplied by the caller; builds merge into it.
    CallerOwned,
}

enum Backing {
    SelfOwned(Option<Arc<Registry>>),
    CallerOwned(Arc<Registry>),
}

/// Hand-rolled container backed by a [`Registry`].
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use bus_composition::container::{
///     BusContainer, Component, ConstructorArgs, Lifetime, ResolutionError, Resolver,
///     ServiceContainer,
/// };
/// use bus_composition::implements;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".into()
///     }
/// }
/// impl Component for English {
///     fn construct(_: &Resolver<'_>) -> Result<Self, ResolutionError> {
///         Ok(English)
///     }
/// }
/// implements!(English => dyn Greeter);
///
/// let mut container = ServiceContainer::new();
/// container.register::<dyn Greeter, English>(Lifetime::Singleton);
/// container.build();
///
/// let greeter = container.resolve::<dyn Greeter>(&ConstructorArgs::new()).unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// ```
pub struct ServiceContainer {
    backing: Backing,
    pending: RegistryBuilder,
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceContainer {
    /// A self-owned container; its registry is created by the first build.
    pub fn new() -> Self {
        Self {
            backing: Backing::SelfOwned(None),
            pending: RegistryBuilder::new(),
        }
    }

    /// A container that commits into a registry owned by the caller.
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self {
            backing: Backing::CallerOwned(registry),
            pending: RegistryBuilder::new(),
        }
    }

    pub fn ownership(&self) -> Ownership {
        match self.backing {
            Backing::SelfOwned(_) => Ownership::SelfOwned,
            Backing::CallerOwned(_) => Ownership::CallerOwned,
        }
    }

    /// The backing registry, if one exists yet.
    pub fn registry(&self) -> Option<&Arc<Registry>> {
        match &self.backing {
            Backing::SelfOwned(registry) => registry.as_ref(),
            Backing::CallerOwned(registry) => Some(registry),
        }
    }

    /// Number of buffered registrations.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl BusContainer for ServiceContainer {
    fn register<S, I>(&mut self, lifetime: Lifetime)
    where
        S: ?Sized + Send + Sync + 'static,
        I: Component + Implements<S>,
    {
        self.pending.register::<S, I>(lifetime);
    }

    fn register_factory<S, F>(&mut self, lifetime: Lifetime, factory: F)
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<S>, ResolutionError> + Send + Sync + 'static,
    {
        self.pending.register_factory::<S, F>(lifetime, factory);
    }

    fn register_instance<S>(&mut self, instance: Arc<S>)
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.pending.register_instance::<S>(instance);
    }

    fn resolve_service(
        &self,
        service: &ServiceKey,
        args: &ConstructorArgs,
    ) -> Result<Instance, ResolutionError> {
        match self.registry() {
            Some(registry) => registry.resolve_service(service, args),
            None => Err(ResolutionError::NotBuilt {
                service: service.to_string(),
            }),
        }
    }

    fn build(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();

        match &mut self.backing {
            Backing::SelfOwned(slot @ None) => {
                *slot = Some(Arc::new(pending.build()));
                debug!(registrations = count, "built registry");
            }
            Backing::SelfOwned(Some(registry)) | Backing::CallerOwned(registry) => {
                pending.update(registry.as_ref());
                debug!(registrations = count, "merged registrations into registry");
            }
        }
    }

    fn is_registered(&self, service: &ServiceKey) -> bool {
        self.registry()
            .is_some_and(|registry| registry.is_registered(service))
    }

    fn is_pending(&self, service: &ServiceKey) -> bool {
        self.pending.contains(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;

    impl Component for Widget {
        fn construct(_: &Resolver<'_>) -> Result<Self, ResolutionError> {
            Ok(Widget)
        }
    }

    #[test]
    fn self_owned_registry_created_on_first_build() {
        let mut container = ServiceContainer::new();
        assert_eq!(container.ownership(), Ownership::SelfOwned);
        assert!(container.registry().is_none());

        container.register::<Widget, Widget>(Lifetime::PerCall);
        assert_eq!(container.pending(), 1);
        assert!(!container.is_registered(&ServiceKey::of::<Widget>()));
        assert!(container.is_pending(&ServiceKey::of::<Widget>()));

        container.build();
        assert!(container.registry().is_some());
        assert_eq!(container.pending(), 0);
        assert!(container.is_registered(&ServiceKey::of::<Widget>()));
    }

    #[test]
    fn second_build_reuses_registry() {
        let mut container = ServiceContainer::new();
        container.build();
        let first = container.registry().cloned().unwrap();

        container.register::<Widget, Widget>(Lifetime::Singleton);
        container.build();

        let second = container.registry().cloned().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_registered(&ServiceKey::of::<Widget>()));
    }

    #[test]
    fn resolve_before_build_fails() {
        let mut container = ServiceContainer::new();
        container.register::<Widget, Widget>(Lifetime::Singleton);
        assert!(matches!(
            container.resolve::<Widget>(&ConstructorArgs::new()),
            Err(ResolutionError::NotBuilt { .. })
        ));
    }
}
