//! Scope manager: owns the core and inner scopes of one container generation.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ContainerConfig;
use crate::error::{DiError, DiResult, DisposalError};
use crate::module::Module;
use crate::reactive::{self, Consumer};
use crate::scope::{Scope, ScopeOptions};
use crate::traits::Resolver;

/// Identifies one initialized generation of a [`ScopeManager`].
///
/// Always bound in the core scope. Ids increase by one per successful
/// [`ScopeManager::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation {
    id: u64,
}

impl Generation {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Owns the two scopes of a running container.
///
/// The *core* scope carries infrastructure bindings and a [`Generation`]
/// instance. The *inner* scope is a child of core that holds the
/// application module's bindings; core includes it, so resolving through
/// the manager reaches both.
///
/// # Examples
///
/// ```
/// use modular_di::{DiError, DiResult, Resolver, Scope, ScopeManager};
///
/// struct Greeter { name: String }
///
/// let mut manager = ScopeManager::new(|scope: &Scope| -> DiResult<()> {
///     scope.add_lazy_singleton(|_| Ok(Greeter { name: "world".to_string() }))?;
///     Ok(())
/// });
/// assert!(matches!(manager.get::<Greeter>(), Err(DiError::NotInitialized(_))));
///
/// manager.initialize().unwrap();
/// assert_eq!(manager.get::<Greeter>().unwrap().name, "world");
///
/// manager.dispose().unwrap();
/// assert!(!manager.is_initialized());
/// ```
pub struct ScopeManager {
    app: Arc<dyn Module>,
    infrastructure: Vec<Arc<dyn Module>>,
    config: ContainerConfig,
    core: Option<Scope>,
    inner: Option<Scope>,
    generation: u64,
}

impl ScopeManager {
    /// Creates an uninitialized manager for the given application module.
    pub fn new<M: Module + 'static>(app: M) -> Self {
        Self {
            app: Arc::new(app),
            infrastructure: Vec::new(),
            config: ContainerConfig::default(),
            core: None,
            inner: None,
            generation: 0,
        }
    }

    /// Adds a module registered into the core scope on every initialize.
    pub fn with_infrastructure<M: Module + 'static>(mut self, module: M) -> Self {
        self.infrastructure.push(Arc::new(module));
        self
    }

    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Tears down any live generation, then builds a fresh one.
    ///
    /// Disposal failures of the previous generation are logged and do not
    /// stop initialization. If building the new scopes fails, whatever was
    /// built is torn down again and the manager stays uninitialized.
    pub fn initialize(&mut self) -> DiResult<()> {
        if let Err(err) = self.dispose() {
            warn!(error = %err, "previous generation disposed with failures");
        }

        let generation = self.generation + 1;
        let (core, inner) = match self.build(generation) {
            Ok(scopes) => scopes,
            Err(err) => {
                warn!(generation, error = %err, "initialization failed");
                return Err(err);
            }
        };

        self.core = Some(core);
        self.inner = Some(inner);
        self.generation = generation;
        info!(generation, "container initialized");
        Ok(())
    }

    fn build(&self, generation: u64) -> DiResult<(Scope, Scope)> {
        self.config.validate()?;
        let options = ScopeOptions::from(&self.config);

        let core = Scope::with_options(self.config.core_tag.clone(), options);
        if let Err(err) = self.populate_core(&core, generation) {
            teardown(&core);
            return Err(err);
        }

        let inner = core.child_with(
            self.config.inner_tag.clone(),
            ScopeOptions {
                no_parent_binds: self.config.no_parent_binds,
                ..options
            },
        );
        let wired = inner
            .add_module(self.app.as_ref())
            .and_then(|_| inner.commit())
            .and_then(|_| core.include(&inner));
        if let Err(err) = wired {
            teardown(&inner);
            teardown(&core);
            return Err(err);
        }
        Ok((core, inner))
    }

    fn populate_core(&self, core: &Scope, generation: u64) -> DiResult<()> {
        core.add_instance(Generation { id: generation })?;
        for module in &self.infrastructure {
            core.add_module(module.as_ref())?;
        }
        core.commit()
    }

    /// Disposes inner then core and forgets both.
    ///
    /// Failures from both scopes are returned together. Calling this on an
    /// uninitialized manager does nothing.
    pub fn dispose(&mut self) -> DiResult<()> {
        let inner = self.inner.take();
        let core = self.core.take();
        if inner.is_none() && core.is_none() {
            return Ok(());
        }

        let mut errors = DisposalError::new();
        for scope in [inner, core].into_iter().flatten() {
            match scope.dispose_recursive() {
                Ok(()) => {}
                Err(DiError::Disposal(failures)) => errors.absorb(failures),
                Err(other) => warn!(scope = scope.tag(), error = %other, "unexpected disposal error"),
            }
        }
        info!(generation = self.generation, failures = errors.len(), "container disposed");
        errors.into_result().map_err(DiError::from)
    }

    /// The core scope.
    pub fn injector(&self) -> DiResult<&Scope> {
        self.core.as_ref().ok_or(DiError::NotInitialized("core scope"))
    }

    /// The inner (application) scope.
    pub fn inner_injector(&self) -> DiResult<&Scope> {
        self.inner.as_ref().ok_or(DiError::NotInitialized("inner scope"))
    }

    pub fn is_initialized(&self) -> bool {
        self.core.is_some() && self.inner.is_some()
    }

    /// The live generation, or `None` when uninitialized.
    pub fn generation(&self) -> Option<Generation> {
        self.is_initialized().then_some(Generation { id: self.generation })
    }

    // ----- Pass-throughs to the core scope -----

    pub fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.injector()?.get::<T>()
    }

    pub fn try_get<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.injector()?.try_get::<T>()
    }

    pub fn read<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.injector()?.read::<T>()
    }

    pub fn watch<T: Send + Sync + 'static>(&self, consumer: &Consumer) -> DiResult<Arc<T>> {
        self.injector()?.watch::<T>(consumer)
    }

    pub fn unwatch(&self, consumer: &Consumer) -> DiResult<()> {
        self.injector()?.unwatch(consumer);
        Ok(())
    }

    pub fn replace_instance<T: Send + Sync + 'static>(&self, value: T) -> DiResult<()> {
        self.injector()?.replace_instance(value)
    }

    pub fn dispose_instance<T: Send + Sync + 'static>(&self) -> DiResult<bool> {
        self.injector()?.dispose_instance::<T>()
    }

    /// Delivers pending re-notifications from both scopes.
    ///
    /// A consumer watching types in both scopes is still notified once,
    /// with whichever key changed last. Returns 0 when uninitialized.
    pub fn tick(&self) -> usize {
        let batch = [self.inner.as_ref(), self.core.as_ref()]
            .into_iter()
            .flatten()
            .flat_map(Scope::drain_notifications);
        reactive::deliver(batch)
    }
}

fn teardown(scope: &Scope) {
    if let Err(err) = scope.dispose_recursive() {
        warn!(scope = scope.tag(), error = %err, "partial scope teardown failed");
    }
}

impl fmt::Debug for ScopeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeManager")
            .field("generation", &self.generation)
            .field("initialized", &self.is_initialized())
            .field("infrastructure", &self.infrastructure.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Drop for ScopeManager {
    fn drop(&mut self) {
        if self.is_initialized() {
            if let Err(err) = self.dispose() {
                warn!(error = %err, "dispose on drop failed");
            }
        }
    }
}
