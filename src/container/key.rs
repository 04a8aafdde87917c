//! Service identity tokens.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a service contract inside a container.
///
/// Derived from the contract type (usually a `dyn Trait`), compared by
/// `TypeId` and displayed by type name. Used wherever a service has to be
/// named without a generic parameter, e.g. [`is_registered`] or the
/// non-generic [`resolve_service`].
///
/// ```
/// use bus_composition::container::ServiceKey;
///
/// trait Greeter: Send + Sync {}
///
/// let key = ServiceKey::of::<dyn Greeter>();
/// assert_eq!(key, ServiceKey::of::<dyn Greeter>());
/// assert_ne!(key, ServiceKey::of::<String>());
/// ```
///
/// [`is_registered`]: super::BusContainer::is_registered
/// [`resolve_service`]: super::BusContainer::resolve_service
#[derive(Clone, Copy)]
pub struct ServiceKey {
    id: TypeId,
    name: &'static str,
}

impl ServiceKey {
    /// Key for the service contract `S`.
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
        }
    }

    /// Fully qualified type name of the contract.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceKey").field(&self.name).finish()
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
