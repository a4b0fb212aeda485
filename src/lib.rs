//! # modular-di
//!
//! Scoped, lifecycle-aware dependency injection with generation-safe
//! teardown and reactive re-notification.
//!
//! ## Features
//!
//! - **Four lifetimes**: Factory, Singleton (eager), LazySingleton and Instance
//! - **Scope trees**: child scopes fall back to their parent; a scope can include another
//! - **Sealed registries**: registration closes when a scope commits
//! - **Ordered teardown**: instances are disposed newest first and failures are aggregated
//! - **Circular dependency detection**: cycles fail with the full resolution path
//! - **Reactive bridge**: consumers watch instances and are re-notified once per tick
//!
//! ## Quick Start
//!
//! ```rust
//! use modular_di::{Resolver, Scope};
//! use std::sync::Arc;
//!
//! // Define your services
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! // Register services
//! let scope = Scope::root("app");
//! scope.add_instance(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! }).unwrap();
//! scope.add_factory(|r| Ok(UserService { db: r.get::<Database>()? })).unwrap();
//!
//! // Seal the registry and resolve
//! scope.commit().unwrap();
//! let user_service = scope.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Lifetimes
//!
//! - **Factory**: built fresh on every resolution
//! - **Singleton**: built once when the owning scope commits
//! - **LazySingleton**: built once on first resolution
//! - **Instance**: a caller-supplied value, never disposed by the container
//!
//! ## Container Generations
//!
//! A [`ScopeManager`] owns a *core* scope (infrastructure) and an *inner*
//! scope (application). Every [`initialize`](ScopeManager::initialize)
//! disposes the previous generation before building the next, so no
//! instance survives a restart.
//!
//! ```rust
//! use modular_di::{Bind, BoxError, Dispose, DiResult, Scope, ScopeManager};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! static CLOSED: AtomicUsize = AtomicUsize::new(0);
//!
//! struct Connection;
//! impl Dispose for Connection {
//!     fn dispose(&self) -> Result<(), BoxError> {
//!         CLOSED.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! let mut manager = ScopeManager::new(|scope: &Scope| -> DiResult<()> {
//!     scope.register(Bind::lazy_singleton(|_| Ok(Connection)).disposable())?;
//!     Ok(())
//! });
//!
//! manager.initialize().unwrap();
//! let first: Arc<Connection> = manager.get().unwrap();
//!
//! manager.initialize().unwrap();
//! let second: Arc<Connection> = manager.get().unwrap();
//!
//! assert!(!Arc::ptr_eq(&first, &second));
//! assert_eq!(CLOSED.load(Ordering::SeqCst), 1);
//! ```
//!
//! ## Reactive Observers
//!
//! ```rust
//! use modular_di::{Bind, Consumer, DiResult, Key, Notifier, Scope, ScopeManager};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! struct Cart { changed: Notifier }
//!
//! let mut manager = ScopeManager::new(|scope: &Scope| -> DiResult<()> {
//!     scope.register(Bind::lazy_singleton(|_| Ok(Cart { changed: Notifier::new() }))
//!         .notifier(|cart: &Cart| &cart.changed))?;
//!     Ok(())
//! });
//! manager.initialize().unwrap();
//!
//! let rebuilds = Arc::new(AtomicUsize::new(0));
//! let counter = rebuilds.clone();
//! let view = Consumer::new(move |_: &Key| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! let cart = manager.watch::<Cart>(&view).unwrap();
//! cart.changed.notify();
//! cart.changed.notify();
//! manager.tick();
//! assert_eq!(rebuilds.load(Ordering::SeqCst), 1);
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod manager;
pub mod module;
pub mod reactive;
pub mod traits;

// Internal modules
mod internal;
mod registration;
mod scope;
mod store;

// Re-export core types
pub use config::ContainerConfig;
pub use error::{BoxError, DiError, DiResult, DisposalError, DisposeFailure};
pub use key::{key_of_type, Key};
pub use lifetime::Lifetime;
pub use manager::{Generation, ScopeManager};
pub use module::Module;
pub use reactive::{ChangeCallback, Consumer, ConsumerId, EventChannel, Listenable, Notifier, Subscription};
pub use registration::Bind;
pub use scope::{ResolverContext, Scope, ScopeOptions, ScopeState};
pub use traits::{Dispose, Resolver, ResolverCore};
