//! Resolver traits for service resolution.

use std::any::Any;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::Key;

/// Core resolver trait for object-safe resolution.
///
/// Implemented by [`Scope`](crate::Scope) and by the
/// [`ResolverContext`](crate::ResolverContext) handed to factories. Most code
/// should use the generic methods of [`Resolver`] instead.
pub trait ResolverCore {
    /// Resolves the instance bound to `key`, type-erased.
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>>;

    /// Returns `true` if `key` is bound anywhere in the reachable scope chain.
    fn can_resolve(&self, key: &Key) -> bool;
}

/// High-level resolver interface with generic methods for type-safe resolution.
///
/// # Examples
///
/// ```
/// use modular_di::{Resolver, Scope};
///
/// struct Config { port: u16 }
/// struct Server { port: u16 }
///
/// let scope = Scope::root("app");
/// scope.add_instance(Config { port: 8080 }).unwrap();
/// scope.add_lazy_singleton(|r| Ok(Server { port: r.get::<Config>()?.port })).unwrap();
/// scope.commit().unwrap();
///
/// assert_eq!(scope.get::<Server>().unwrap().port, 8080);
/// assert!(scope.try_get::<String>().unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete type.
    fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let key = Key::of::<T>();
        let any = self.resolve_any(&key)?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a concrete type, returning `Ok(None)` when `T` itself is not bound.
    ///
    /// Errors raised while building `T` (a missing dependency, a cycle)
    /// still propagate.
    fn try_get<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        if !self.can_resolve(&Key::of::<T>()) {
            return Ok(None);
        }
        self.get::<T>().map(Some)
    }

    /// Resolves a concrete type, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics with the [`DiError`] message if resolution fails.
    fn get_required<T: Send + Sync + 'static>(&self) -> Arc<T> {
        match self.get::<T>() {
            Ok(value) => value,
            Err(err) => panic!("failed to resolve {}: {}", std::any::type_name::<T>(), err),
        }
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
