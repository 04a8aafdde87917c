//! Component construction and service upcasting.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::error::ResolutionError;
use super::key::ServiceKey;
use super::registry::Resolver;

/// A type the container knows how to construct.
///
/// `construct` plays the role of the constructor: it pulls dependencies and
/// named arguments out of the [`Resolver`].
///
/// ```
/// use std::sync::Arc;
/// use bus_composition::container::{Component, ResolutionError, Resolver};
///
/// struct Clock;
/// impl Component for Clock {
///     fn construct(_: &Resolver<'_>) -> Result<Self, ResolutionError> {
///         Ok(Clock)
///     }
/// }
///
/// struct Scheduler {
///     clock: Arc<Clock>,
///     interval_ms: u64,
/// }
///
/// impl Component for Scheduler {
///     fn construct(resolver: &Resolver<'_>) -> Result<Self, ResolutionError> {
///         Ok(Scheduler {
///             clock: resolver.dependency::<Clock>("clock")?,
///             interval_ms: resolver.value_or("interval_ms", 1_000u64)?,
///         })
///     }
/// }
/// ```
pub trait Component: Sized + Send + Sync + 'static {
    fn construct(resolver: &Resolver<'_>) -> Result<Self, ResolutionError>;
}

/// Declares that `Self` can stand in for the service contract `S`.
///
/// Every type implements it for itself. Trait-object contracts are declared
/// with [`implements!`](crate::implements).
pub trait Implements<S: ?Sized>: Send + Sync + 'static {
    fn upcast(self: Arc<Self>) -> Arc<S>;
}

impl<T: Send + Sync + 'static> Implements<T> for T {
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Declare the service contracts an implementation satisfies.
///
/// # Example
/// ```
/// use bus_composition::implements;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
/// trait Named: Send + Sync {}
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".into()
///     }
/// }
/// impl Named for English {}
///
/// implements!(English => dyn Greeter, dyn Named);
/// ```
#[macro_export]
macro_rules! implements {
    ($implementation:ty => $( $service:ty ),+ $(,)?) => {
        $(
            impl $crate::container::Implements<$service> for $implementation {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$service> {
                    self
                }
            }
        )+
    };
}

/// A resolved instance with its concrete type erased.
///
/// Returned by the non-generic resolution path; [`downcast`](Self::downcast)
/// recovers the `Arc<S>` for the service it was registered under.
#[derive(Clone)]
pub struct Instance {
    service: ServiceKey,
    value: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    pub(crate) fn new<S: ?Sized + Send + Sync + 'static>(service: Arc<S>) -> Self {
        let value: Arc<dyn Any + Send + Sync> = Arc::new(service);
        Self {
            service: ServiceKey::of::<S>(),
            value,
        }
    }

    /// The service this instance was resolved for.
    pub fn service(&self) -> ServiceKey {
        self.service
    }

    pub fn downcast<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        self.value.downcast_ref::<Arc<S>>().cloned()
    }

    /// Like [`downcast`](Self::downcast), reporting a mismatch as an error.
    pub fn into_service<S: ?Sized + Send + Sync + 'static>(self) -> Result<Arc<S>, ResolutionError> {
        self.downcast::<S>()
            .ok_or_else(|| ResolutionError::TypeMismatch {
                service: self.service.to_string(),
                requested: std::any::type_name::<S>(),
            })
    }

    /// True when both handles point at the same constructed instance.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}
