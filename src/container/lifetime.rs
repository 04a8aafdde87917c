//! Instance lifetimes.

use serde::{Deserialize, Serialize};

/// How long a resolved instance lives.
///
/// - **Singleton**: one instance per registration, created on first
///   resolution and shared by every later caller. This is the default.
/// - **PerCall**: a fresh instance for every resolution, never cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// New instance per resolution.
    PerCall,
    /// One shared instance, constructed lazily.
    #[default]
    Singleton,
}

impl Lifetime {
    /// Build a lifetime from a "per instance" flag.
    pub fn per_instance(per_instance: bool) -> Self {
        if per_instance {
            Lifetime::PerCall
        } else {
            Lifetime::Singleton
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Lifetime::Singleton)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_singleton() {
        assert_eq!(Lifetime::default(), Lifetime::Singleton);
        assert!(Lifetime::default().is_shared());
    }

    #[test]
    fn per_instance_flag() {
        assert_eq!(Lifetime::per_instance(true), Lifetime::PerCall);
        assert_eq!(Lifetime::per_instance(false), Lifetime::Singleton);
    }
}
