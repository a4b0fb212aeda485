//! Binding lifetime definitions.

use std::fmt;

/// Lifetime policy controlling how instances are created and shared.
///
/// # Examples
///
/// ```rust
/// use modular_di::{Resolver, Scope};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Request { id: u32 }
///
/// let scope = Scope::root("app");
/// scope.add_singleton(|_| Ok(Database { url: "postgres://localhost".to_string() })).unwrap();
/// scope.add_factory(|_| Ok(Request { id: 7 })).unwrap();
/// scope.commit().unwrap();
///
/// // Singleton: same instance on every resolution
/// let db1 = scope.get::<Database>().unwrap();
/// let db2 = scope.get::<Database>().unwrap();
/// assert!(Arc::ptr_eq(&db1, &db2));
///
/// // Factory: a new instance every time
/// let r1 = scope.get::<Request>().unwrap();
/// let r2 = scope.get::<Request>().unwrap();
/// assert!(!Arc::ptr_eq(&r1, &r2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// New instance per resolution, never cached
    Factory,
    /// One instance per scope, built eagerly when the scope commits
    Singleton,
    /// One instance per scope, built on first resolution
    LazySingleton,
    /// Caller-supplied value, returned as-is and never disposed by the container
    Instance,
}

impl Lifetime {
    /// Returns `true` if resolved values are kept in the lifetime store.
    #[inline]
    pub fn is_cached(&self) -> bool {
        !matches!(self, Lifetime::Factory)
    }

    /// Returns `true` if the value is materialized at commit time.
    #[inline]
    pub fn is_eager(&self) -> bool {
        matches!(self, Lifetime::Singleton | Lifetime::Instance)
    }

    /// Returns `true` if the container owns teardown of the value.
    #[inline]
    pub fn is_managed(&self) -> bool {
        !matches!(self, Lifetime::Instance)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Factory => write!(f, "Factory"),
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::LazySingleton => write!(f, "LazySingleton"),
            Lifetime::Instance => write!(f, "Instance"),
        }
    }
}
