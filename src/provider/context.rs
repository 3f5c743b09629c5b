//! Resolver context for dependency injection.
//!
//! This module contains the ResolverContext type which provides
//! the interface for factory functions to resolve dependencies.

use crate::error::DiResult;
use crate::internal::Frame;
use crate::key::Key;
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

use super::{ProviderInner, Scope};

/// Context passed to factory functions for resolving dependencies.
///
/// A `ResolverContext` is bound to the context the outer request was made
/// in: the root provider, or one scope. Dependencies resolved through it land
/// in the same scope cache and creation list, and the context remembers
/// which services are under construction on this call path so that cycles
/// are reported instead of recursing forever.
///
/// Singleton factories always receive a root-bound context, even when the
/// singleton was first requested from inside a scope.
///
/// # Examples
///
/// ```
/// use jobscope::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() }).unwrap();
/// services
///     .add_transient_factory::<UserService, _>(|resolver| {
///         Ok(UserService { db: resolver.get::<Database>()? })
///     })
///     .unwrap();
///
/// let provider = services.build();
/// assert_eq!(provider.get_required::<UserService>().db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    pub(crate) provider: &'a ProviderInner,
    pub(crate) scope: Option<&'a Scope>,
    pub(crate) frame: Option<&'a Frame<'a>>,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(
        provider: &'a ProviderInner,
        scope: Option<&'a Scope>,
        frame: Option<&'a Frame<'a>>,
    ) -> Self {
        Self { provider, scope, frame }
    }

    /// Returns `true` if this context resolves inside a scope.
    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    /// Type names of the services currently under construction, outermost first.
    pub fn resolution_path(&self) -> Vec<&'static str> {
        self.frame.map(Frame::path).unwrap_or_default()
    }
}

impl<'a> ResolverCore for ResolverContext<'a> {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.provider.resolve_in(key, self.scope, self.frame)
    }

    fn has_registration(&self, key: &Key) -> bool {
        self.provider.registry.contains_key(key)
    }
}
