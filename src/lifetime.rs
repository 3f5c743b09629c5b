//! Service lifetime definitions.

use std::fmt;

/// Service lifetimes controlling instance caching behavior
///
/// Every registration carries exactly one lifetime, fixed for the life of the
/// provider. The lifetime decides where a constructed instance is cached and
/// who owns its teardown.
///
/// # Examples
///
/// ```rust
/// use jobscope::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository { db: Arc<Database> }
/// struct RequestModel;
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() }).unwrap();
/// services
///     .add_scoped_factory::<Repository, _>(|r| Ok(Repository { db: r.get::<Database>()? }))
///     .unwrap();
/// services.add_transient_factory::<RequestModel, _>(|_| Ok(RequestModel)).unwrap();
///
/// let provider = services.build();
///
/// // Singleton: same instance across scopes
/// let db1 = provider.get_required::<Database>();
/// let scope1 = provider.create_scope().unwrap();
/// let db2 = scope1.get_required::<Database>();
/// assert!(Arc::ptr_eq(&db1, &db2));
///
/// // Scoped: same within scope, different across scopes
/// let repo1a = scope1.get_required::<Repository>();
/// let repo1b = scope1.get_required::<Repository>();
/// assert!(Arc::ptr_eq(&repo1a, &repo1b));
///
/// let scope2 = provider.create_scope().unwrap();
/// let repo2 = scope2.get_required::<Repository>();
/// assert!(!Arc::ptr_eq(&repo1a, &repo2));
///
/// // Transient: always different instances
/// let model1 = scope1.get_required::<RequestModel>();
/// let model2 = scope1.get_required::<RequestModel>();
/// assert!(!Arc::ptr_eq(&model1, &model2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Single instance per root provider, cached forever
    ///
    /// Created on first request in the root context, even when the request
    /// comes from inside a scope, and shared by every scope and thread.
    /// Teardown (if declared) runs when the provider is disposed.
    Singleton,
    /// Single instance per scope, cached for scope lifetime
    ///
    /// Created once per scope on first request; owned and torn down by that
    /// scope. Resolving from the root context is governed by
    /// [`RootScopedPolicy`](crate::RootScopedPolicy).
    Scoped,
    /// New instance per resolution, never cached
    ///
    /// When resolved through a scope, the scope still owns the instance and
    /// tears it down on release.
    Transient,
}

impl Lifetime {
    /// Returns `true` if resolutions under this lifetime are cached.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Lifetime::Singleton | Lifetime::Scoped)
    }

    /// Returns `true` if an instance created inside a scope is owned by that scope.
    #[inline]
    pub fn is_scope_owned(&self) -> bool {
        matches!(self, Lifetime::Scoped | Lifetime::Transient)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::Scoped => write!(f, "Scoped"),
            Lifetime::Transient => write!(f, "Transient"),
        }
    }
}
