//! Named constructor arguments supplied at resolution time.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Named values handed to the constructor of the component being resolved.
///
/// Arguments apply only to the component directly requested; its own
/// dependencies still resolve from the registration graph. A component
/// reads them through [`Resolver::value`] and [`Resolver::dependency`].
///
/// ```
/// use std::sync::Arc;
/// use bus_composition::container::ConstructorArgs;
///
/// let args = ConstructorArgs::new()
///     .with("retries", 3u32)
///     .with("label", String::from("orders"));
///
/// assert_eq!(args.len(), 2);
/// assert!(args.contains("retries"));
/// ```
///
/// [`Resolver::value`]: super::Resolver::value
/// [`Resolver::dependency`]: super::Resolver::dependency
#[derive(Clone, Default)]
pub struct ConstructorArgs {
    entries: Vec<(String, Arc<dyn Any + Send + Sync>)>,
}

/// Arguments for dependencies resolved on a component's behalf.
pub(crate) static NO_ARGS: ConstructorArgs = ConstructorArgs {
    entries: Vec::new(),
};

impl ConstructorArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named argument. A later argument with the same name wins.
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        let name = name.into();
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, Arc::new(value)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.raw(name).is_some()
    }

    /// Argument names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn raw(&self, name: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_ref())
    }

    /// Typed lookup. `None` if absent, `Some(None)` if present with another type.
    pub(crate) fn get<T: Any>(&self, name: &str) -> Option<Option<&T>> {
        self.raw(name).map(|value| value.downcast_ref::<T>())
    }
}

impl fmt::Debug for ConstructorArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_argument_replaces_earlier() {
        let args = ConstructorArgs::new().with("n", 1u8).with("n", 2u8);
        assert_eq!(args.len(), 1);
        assert_eq!(args.get::<u8>("n"), Some(Some(&2)));
    }

    #[test]
    fn typed_lookup_distinguishes_missing_and_mismatched() {
        let args = ConstructorArgs::new().with("name", String::from("a"));
        assert!(args.get::<String>("other").is_none());
        assert_eq!(args.get::<u32>("name"), Some(None));
        assert_eq!(args.get::<String>("name"), Some(Some(&String::from("a"))));
    }
}
