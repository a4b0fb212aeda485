//! Modules: reusable groups of registrations.

use crate::error::DiResult;
use crate::scope::Scope;

/// A group of bindings registered into a scope as one unit.
///
/// The [`ScopeManager`](crate::ScopeManager) calls the application module
/// every time it builds a new generation, so `register` must be repeatable.
/// Plain closures taking `&Scope` are modules too.
///
/// # Example
///
/// ```rust
/// use modular_di::{DiResult, Module, Resolver, Scope};
///
/// #[derive(Default)]
/// struct UserConfig;
///
/// struct UserService;
/// impl UserService {
///     fn new(_config: std::sync::Arc<UserConfig>) -> Self { Self }
/// }
///
/// struct UserModule;
///
/// impl Module for UserModule {
///     fn register(&self, scope: &Scope) -> DiResult<()> {
///         scope.add_instance(UserConfig::default())?;
///         scope.add_lazy_singleton(|r| Ok(UserService::new(r.get::<UserConfig>()?)))?;
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let scope = Scope::root("app");
/// scope.add_module(&UserModule)?.add_module(&|s: &Scope| -> DiResult<()> {
///     s.add_instance(42u32)?;
///     Ok(())
/// })?;
/// scope.commit()?;
/// assert!(scope.get::<UserService>().is_ok());
/// # Ok(())
/// # }
/// ```
pub trait Module: Send + Sync {
    /// Registers this module's bindings into `scope`.
    fn register(&self, scope: &Scope) -> DiResult<()>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Module for F
where
    F: Fn(&Scope) -> DiResult<()> + Send + Sync,
{
    fn register(&self, scope: &Scope) -> DiResult<()> {
        self(scope)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

impl Scope {
    /// Registers every binding of `module` into this scope.
    pub fn add_module<M: Module + ?Sized>(&self, module: &M) -> DiResult<&Self> {
        tracing::debug!(scope = %self.tag(), module = module.name(), "registering module");
        module.register(self)?;
        Ok(self)
    }
}
