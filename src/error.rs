//! Error types for the dependency injection container.

use std::fmt;

/// Boxed error returned by user code, such as a failing [`Dispose`](crate::Dispose) impl.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependency injection errors
///
/// Registration and resolution errors are returned to the caller immediately.
/// Disposal failures are collected across a whole teardown sweep and surface
/// once as [`DiError::Disposal`].
///
/// # Examples
///
/// ```rust
/// use modular_di::{DiError, Resolver, Scope};
///
/// let scope = Scope::root("app");
/// scope.commit().unwrap();
/// match scope.get::<String>() {
///     Err(DiError::Unresolved(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
    /// Registration attempted on a committed scope
    #[error("Scope '{0}' is sealed; registrations are closed after commit")]
    ScopeSealed(String),
    /// Scope manager accessed while no generation is live
    #[error("Container not initialized: {0}")]
    NotInitialized(&'static str),
    /// No registration found in the reachable scope chain
    #[error("Service not registered: {0}")]
    Unresolved(&'static str),
    /// Resolution cycle detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Conflicting registration while overrides are disallowed
    #[error("Duplicate registration for: {0}")]
    DuplicateRegistration(&'static str),
    /// Aggregate of failures raised while disposing instances
    #[error(transparent)]
    Disposal(#[from] DisposalError),
    /// Resolution attempted on a scope that has not been committed
    #[error("Scope '{0}' is not committed yet")]
    ScopeNotCommitted(String),
    /// Resolution attempted on a scope that began disposal
    #[error("Scope '{0}' has been disposed")]
    ScopeDisposed(String),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Maximum resolution depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// `replace_instance` called on a binding that never caches a value
    #[error("Cannot replace {0}: Factory bindings have no live instance")]
    NotReplaceable(&'static str),
    /// Invalid configuration value
    #[error("Invalid configuration for {key}: {message}")]
    InvalidConfig { key: String, message: String },
}

/// A single failed `dispose()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposeFailure {
    /// Tag of the scope that owned the instance
    pub scope: String,
    /// Type name of the instance
    pub type_name: &'static str,
    /// Error or panic message
    pub message: String,
}

impl fmt::Display for DisposeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.scope, self.type_name, self.message)
    }
}

/// Failures collected during one disposal sweep.
///
/// Every instance gets its chance to dispose before this is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{} disposal failure(s): {}", .failures.len(), DisplayList(.failures))]
pub struct DisposalError {
    failures: Vec<DisposeFailure>,
}

struct DisplayList<'a>(&'a [DisposeFailure]);

impl fmt::Display for DisplayList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl DisposalError {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, failure: DisposeFailure) {
        self.failures.push(failure);
    }

    /// Appends the failures of another sweep.
    pub(crate) fn absorb(&mut self, other: DisposalError) {
        self.failures.extend(other.failures);
    }

    /// The individual failures in disposal order.
    pub fn failures(&self) -> &[DisposeFailure] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// `Ok(())` when nothing failed.
    pub(crate) fn into_result(self) -> Result<(), DisposalError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Result type for DI operations
pub type DiResult<T> = Result<T, DiError>;
