//! Backing store for committed registrations and their singletons.
//!
//! `RegistryBuilder` buffers registrations; `build` turns the buffer into a
//! fresh `Registry`, `update` merges it into an existing one. A `Registry` is
//! safe to resolve from many threads at once.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::OnceCell;
use tracing::trace;

use super::args::{ConstructorArgs, NO_ARGS};
use super::component::{Component, Implements, Instance};
use super::error::ResolutionError;
use super::key::ServiceKey;
use super::lifetime::Lifetime;

type Factory = Arc<dyn Fn(&Resolver<'_>) -> Result<Instance, ResolutionError> + Send + Sync>;

fn factory<F>(f: F) -> Factory
where
    F: Fn(&Resolver<'_>) -> Result<Instance, ResolutionError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A single service → implementation mapping waiting to be committed.
struct Registration {
    service: ServiceKey,
    implementation: &'static str,
    lifetime: Lifetime,
    factory: Factory,
}

impl Registration {
    fn component<S, I>(lifetime: Lifetime) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Component + Implements<S>,
    {
        Self {
            service: ServiceKey::of::<S>(),
            implementation: std::any::type_name::<I>(),
            lifetime,
            factory: factory(|resolver| {
                let component = I::construct(resolver)?;
                let service = <I as Implements<S>>::upcast(Arc::new(component));
                Ok(Instance::new::<S>(service))
            }),
        }
    }

    fn closure<S, F>(lifetime: Lifetime, construct: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<S>, ResolutionError> + Send + Sync + 'static,
    {
        Self {
            service: ServiceKey::of::<S>(),
            implementation: "<factory>",
            lifetime,
            factory: factory(move |resolver| construct(resolver).map(Instance::new::<S>)),
        }
    }

    fn instance<S>(instance: Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let instance = Instance::new::<S>(instance);
        Self {
            service: ServiceKey::of::<S>(),
            implementation: "<instance>",
            lifetime: Lifetime::Singleton,
            factory: factory(move |_| Ok(instance.clone())),
        }
    }
}

/// Description of a committed registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationInfo {
    pub service: ServiceKey,
    pub implementation: &'static str,
    pub lifetime: Lifetime,
}

/// Buffer of registrations not yet visible to resolution.
///
/// Later registrations for the same service shadow earlier ones.
#[derive(Default)]
pub struct RegistryBuilder {
    pending: Vec<Registration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map service `S` to implementation `I`.
    pub fn register<S, I>(&mut self, lifetime: Lifetime) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Component + Implements<S>,
    {
        self.pending.push(Registration::component::<S, I>(lifetime));
        self
    }

    /// Map service `S` to a construction closure.
    pub fn register_factory<S, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<S>, ResolutionError> + Send + Sync + 'static,
    {
        self.pending
            .push(Registration::closure::<S, F>(lifetime, factory));
        self
    }

    /// Map service `S` to an already constructed instance.
    pub fn register_instance<S>(&mut self, instance: Arc<S>) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.pending.push(Registration::instance::<S>(instance));
        self
    }

    pub fn contains(&self, service: &ServiceKey) -> bool {
        self.pending.iter().any(|r| r.service == *service)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Create a new registry holding the buffered registrations.
    pub fn build(self) -> Registry {
        let registry = Registry::new();
        registry.commit(self.pending);
        registry
    }

    /// Merge the buffered registrations into an existing registry.
    pub fn update(self, registry: &Registry) {
        registry.commit(self.pending);
    }
}

struct Entry {
    registration: Registration,
    instance: OnceCell<Instance>,
}

/// Committed registrations plus the singletons they have produced.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<ServiceKey, Arc<Entry>>>,
}

impl Registry {
    /// An empty registry, e.g. to hand to a caller-owned container.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, service: &ServiceKey) -> bool {
        self.read().contains_key(service)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Committed registrations, in no particular order.
    pub fn registrations(&self) -> Vec<RegistrationInfo> {
        self.read()
            .values()
            .map(|entry| RegistrationInfo {
                service: entry.registration.service,
                implementation: entry.registration.implementation,
                lifetime: entry.registration.lifetime,
            })
            .collect()
    }

    pub fn resolve<S>(&self, args: &ConstructorArgs) -> Result<Arc<S>, ResolutionError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.resolve_service(&ServiceKey::of::<S>(), args)?
            .into_service::<S>()
    }

    pub fn resolve_service(
        &self,
        service: &ServiceKey,
        args: &ConstructorArgs,
    ) -> Result<Instance, ResolutionError> {
        self.resolve_in(service, args, Vec::new())
    }

    fn resolve_in(
        &self,
        service: &ServiceKey,
        args: &ConstructorArgs,
        mut path: Vec<ServiceKey>,
    ) -> Result<Instance, ResolutionError> {
        if path.contains(service) {
            let chain = path
                .iter()
                .chain(std::iter::once(service))
                .map(|key| key.name())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(ResolutionError::Circular { chain });
        }

        // Clone the entry out so the map lock is not held while constructing.
        let entry = self
            .read()
            .get(service)
            .cloned()
            .ok_or_else(|| ResolutionError::not_registered(service))?;

        path.push(*service);
        let resolver = Resolver {
            registry: self,
            service: *service,
            args,
            path,
        };

        let registration = &entry.registration;
        match registration.lifetime {
            Lifetime::PerCall => (registration.factory)(&resolver),
            Lifetime::Singleton => entry
                .instance
                .get_or_try_init(|| {
                    let instance = (registration.factory)(&resolver)?;
                    trace!(
                        service = %registration.service,
                        implementation = registration.implementation,
                        "constructed singleton"
                    );
                    Ok::<_, ResolutionError>(instance)
                })
                .cloned(),
        }
    }

    fn commit(&self, registrations: Vec<Registration>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for registration in registrations {
            entries.insert(
                registration.service,
                Arc::new(Entry {
                    registration,
                    instance: OnceCell::new(),
                }),
            );
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ServiceKey, Arc<Entry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handed to component constructors.
///
/// Gives access to the registration graph and to the named arguments of the
/// current resolution call.
pub struct Resolver<'a> {
    registry: &'a Registry,
    service: ServiceKey,
    args: &'a ConstructorArgs,
    path: Vec<ServiceKey>,
}

impl<'a> Resolver<'a> {
    /// The service currently being constructed.
    pub fn service(&self) -> ServiceKey {
        self.service
    }

    pub fn args(&self) -> &ConstructorArgs {
        self.args
    }

    /// Resolve a dependency from the registration graph.
    pub fn resolve<S>(&self) -> Result<Arc<S>, ResolutionError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.registry
            .resolve_in(&ServiceKey::of::<S>(), &NO_ARGS, self.path.clone())?
            .into_service::<S>()
    }

    /// Resolve a dependency if it is registered, `None` otherwise.
    pub fn optional<S>(&self) -> Result<Option<Arc<S>>, ResolutionError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        if self.registry.is_registered(&ServiceKey::of::<S>()) {
            self.resolve::<S>().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Constructor parameter `name` of service type `S`.
    ///
    /// A named argument holding an `Arc<S>` overrides the graph; without
    /// one the dependency resolves from the graph.
    pub fn dependency<S>(&self, name: &str) -> Result<Arc<S>, ResolutionError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        match self.args.get::<Arc<S>>(name) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(self.parameter_type::<Arc<S>>(name)),
            None => self.resolve::<S>(),
        }
    }

    /// Required value parameter; only satisfiable from named arguments.
    pub fn value<T>(&self, name: &str) -> Result<T, ResolutionError>
    where
        T: Clone + Send + Sync + 'static,
    {
        match self.args.get::<T>(name) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(self.parameter_type::<T>(name)),
            None => Err(ResolutionError::MissingParameter {
                service: self.service.to_string(),
                parameter: name.to_string(),
            }),
        }
    }

    /// Value parameter with a fallback when no argument was supplied.
    pub fn value_or<T>(&self, name: &str, default: T) -> Result<T, ResolutionError>
    where
        T: Clone + Send + Sync + 'static,
    {
        match self.args.get::<T>(name) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(self.parameter_type::<T>(name)),
            None => Ok(default),
        }
    }

    fn parameter_type<T>(&self, name: &str) -> ResolutionError {
        ResolutionError::ParameterType {
            service: self.service.to_string(),
            parameter: name.to_string(),
            expected: std::any::type_name::<T>(),
        }
    }
}
