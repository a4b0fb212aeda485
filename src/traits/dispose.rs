//! Disposal trait for resource cleanup.

use crate::error::BoxError;

/// Trait for synchronous resource disposal.
///
/// Implement this for instances that need structured teardown (flushing
/// caches, closing connections) and opt the binding in with
/// [`Bind::disposable`](crate::Bind::disposable). The container calls
/// `dispose` exactly once per materialized instance: when its scope is torn
/// down, or when the instance is explicitly unbound, never both.
///
/// Returning an error, or panicking, does not stop the sweep; the failure is
/// collected into a [`DisposalError`](crate::DisposalError).
///
/// # Examples
///
/// ```
/// use modular_di::{Bind, Dispose, BoxError, Scope};
///
/// struct Cache {
///     name: String,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> Result<(), BoxError> {
///         println!("Flushing cache: {}", self.name);
///         Ok(())
///     }
/// }
///
/// let scope = Scope::root("app");
/// scope
///     .register(Bind::lazy_singleton(|_| Ok(Cache { name: "user_cache".to_string() })).disposable())
///     .unwrap();
/// scope.commit().unwrap();
/// scope.dispose_recursive().unwrap();
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self) -> Result<(), BoxError>;
}
