//! Resolver context handed to factories.

use std::sync::Arc;

use super::ScopeInner;
use crate::error::DiResult;
use crate::internal::ResolutionPath;
use crate::key::Key;
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

/// Context passed to factory functions for resolving dependencies.
///
/// The context is bound to the scope that owns the registration being built,
/// so a factory in a parent scope never sees bindings of the child that
/// triggered it. All resolutions made through one context share the visiting
/// path of the outer resolution, which is how cycles are detected.
///
/// # Examples
///
/// ```
/// use modular_di::{Resolver, Scope};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let scope = Scope::root("app");
/// scope.add_instance(Database { url: "postgres://localhost".to_string() }).unwrap();
/// scope.add_factory(|r| Ok(UserService { db: r.get::<Database>()? })).unwrap();
/// scope.commit().unwrap();
///
/// assert_eq!(scope.get::<UserService>().unwrap().db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    scope: &'a Arc<ScopeInner>,
    path: &'a ResolutionPath,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(scope: &'a Arc<ScopeInner>, path: &'a ResolutionPath) -> Self {
        Self { scope, path }
    }

    /// Tag of the scope that owns the registration being built.
    pub fn scope_tag(&self) -> &str {
        &self.scope.tag
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.scope.resolve_in(key, self.path)
    }

    fn can_resolve(&self, key: &Key) -> bool {
        self.scope.locate(key).is_some()
    }
}
