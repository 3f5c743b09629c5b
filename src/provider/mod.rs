//! Service provider module for dependency injection.
//!
//! This module contains the ServiceProvider type (the root resolution
//! context) and the resolution algorithm shared by the root and by scopes.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::{ProviderOptions, RootScopedPolicy};
use crate::error::{DiError, DiResult};
use crate::internal::{DisposeBag, Frame, Tracked};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Registration, Registry};
use crate::traits::ResolverCore;

pub mod context;
pub mod scope;

pub use context::ResolverContext;
pub use scope::{Scope, ScopeId};

/// Service provider for resolving dependencies from the DI container.
///
/// The `ServiceProvider` is the root resolution context. It resolves
/// singletons (cached for its whole life) and transients, creates
/// [`Scope`]s for scoped services, and owns the teardown of singletons and
/// scope-less transients that declared a teardown hook.
///
/// # Thread Safety
///
/// ServiceProvider is fully thread-safe and can be cloned cheaply (it uses
/// `Arc` internally); every clone shares the same registry and caches.
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
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(Database { url: "postgres://localhost".to_string() }).unwrap();
/// collection
///     .add_transient_factory::<UserService, _>(|resolver| {
///         Ok(UserService { db: resolver.get::<Database>()? })
///     })
///     .unwrap();
///
/// let provider = collection.build();
/// let user_service = provider.get_required::<UserService>();
/// assert_eq!(user_service.db.url, "postgres://localhost");
/// ```
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    pub(crate) registry: Registry,
    pub(crate) options: ProviderOptions,
    root_disposers: Mutex<DisposeBag>,
    disposed: AtomicBool,
}

impl ServiceProvider {
    pub(crate) fn new(registry: Registry, mut options: ProviderOptions) -> Self {
        options.max_depth = options.max_depth.max(1);
        debug!(
            services = registry.len(),
            scoped = registry.scoped_count(),
            root_scoped = ?options.root_scoped,
            "service provider built"
        );
        Self {
            inner: Arc::new(ProviderInner {
                registry,
                options,
                root_disposers: Mutex::new(DisposeBag::default()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ProviderInner {
        &self.inner
    }

    /// Creates a new scope for resolving scoped services.
    ///
    /// Each scope has its own, initially empty, cache of scoped services and
    /// its own creation list, while singletons still come from this provider.
    ///
    /// # Errors
    ///
    /// Fails with [`DiError::ScopeCreationFailed`] once the provider has been
    /// disposed.
    ///
    /// # Examples
    ///
    /// ```
    /// use jobscope::{ServiceCollection, Resolver};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// struct RequestId(usize);
    ///
    /// let counter = Arc::new(AtomicUsize::new(0));
    /// let c = counter.clone();
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection
    ///     .add_scoped_factory::<RequestId, _>(move |_| Ok(RequestId(c.fetch_add(1, Ordering::SeqCst))))
    ///     .unwrap();
    ///
    /// let provider = collection.build();
    /// let scope1 = provider.create_scope().unwrap();
    /// let scope2 = provider.create_scope().unwrap();
    ///
    /// let req1a = scope1.get_required::<RequestId>();
    /// let req1b = scope1.get_required::<RequestId>();
    /// let req2 = scope2.get_required::<RequestId>();
    ///
    /// assert!(Arc::ptr_eq(&req1a, &req1b));
    /// assert!(!Arc::ptr_eq(&req1a, &req2));
    /// ```
    pub fn create_scope(&self) -> DiResult<Scope> {
        if self.is_disposed() {
            return Err(DiError::ScopeCreationFailed(
                "service provider has been disposed".to_string(),
            ));
        }
        let scope = Scope::new(self.clone());
        debug!(scope_id = %scope.id(), "scope created");
        Ok(scope)
    }

    /// Tears down every root-owned instance that declared a teardown hook,
    /// newest first.
    ///
    /// Root-owned instances are singletons, and transients created outside
    /// any scope (resolved from the provider itself, or as dependencies of a
    /// singleton factory).
    ///
    /// Afterwards the provider is closed: root resolution, and resolution
    /// from existing scopes of singletons or of root-owned disposable
    /// transients, fail with
    /// [`DiError::ProviderDisposed`], and [`create_scope`](Self::create_scope)
    /// fails. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Every failing hook is collected into one [`DiError::ScopeTeardown`];
    /// a failure never stops the remaining hooks.
    pub fn dispose(&self) -> DiResult<()> {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let bag = std::mem::take(&mut *self.inner.root_disposers.lock());
        debug!(instances = bag.len(), "disposing service provider");
        bag.run_all_reverse()
    }

    /// Returns `true` once [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Returns `true` if `T` has a registration.
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.inner.registry.contains_key(&Key::of::<T>())
    }

    /// Returns the lifetime registered for `key`, if any.
    pub fn lifetime_of(&self, key: &Key) -> Option<Lifetime> {
        self.inner.registry.lookup(key).ok().map(|reg| reg.lifetime)
    }

    /// Options this provider was built with.
    pub fn options(&self) -> &ProviderOptions {
        &self.inner.options
    }
}

impl ProviderInner {
    /// Resolves `key` in the root context (`scope == None`) or in `scope`.
    ///
    /// `parent` is the chain of services already under construction on this
    /// call path; it is `None` for a top-level request.
    pub(crate) fn resolve_in(
        &self,
        key: &Key,
        scope: Option<&Scope>,
        parent: Option<&Frame<'_>>,
    ) -> DiResult<AnyArc> {
        let reg = self.registry.lookup(key)?;
        let frame = Frame::enter(*key, parent, self.options.max_depth)?;
        trace!(service = reg.name(), lifetime = %reg.lifetime, scoped = scope.is_some(), "resolving");

        match reg.lifetime {
            Lifetime::Singleton => self.resolve_root_cached(reg, &frame),
            Lifetime::Scoped => match scope {
                Some(scope) => scope.resolve_scoped(reg, &frame),
                None => match self.options.root_scoped {
                    RootScopedPolicy::Reject => Err(DiError::WrongLifetime(
                        "Cannot resolve scoped service from root provider",
                    )),
                    RootScopedPolicy::RootSingleton => self.resolve_root_cached(reg, &frame),
                },
            },
            Lifetime::Transient => {
                // Root-owned transients with a teardown hook are disposed with
                // the provider, so none may be created after it.
                if scope.is_none() && reg.teardown.is_some() && self.disposed.load(Ordering::Acquire) {
                    return Err(DiError::ProviderDisposed);
                }
                let ctx = ResolverContext::new(self, scope, Some(&frame));
                let instance = (reg.ctor)(&ctx)?;
                match scope {
                    Some(scope) => scope.track(reg, &instance),
                    None if reg.teardown.is_some() => self.track_root(reg, &instance),
                    None => {}
                }
                Ok(instance)
            }
        }
    }

    /// Resolution against the registration's root cell.
    ///
    /// Concurrent first resolutions block on the cell while one thread runs
    /// the factory; all of them receive that thread's instance. The factory
    /// always runs in the root context.
    fn resolve_root_cached(&self, reg: &Registration, frame: &Frame<'_>) -> DiResult<AnyArc> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(DiError::ProviderDisposed);
        }
        if let Some(instance) = reg.root_cell.get() {
            trace!(service = reg.name(), "root cache hit");
            return Ok(instance.clone());
        }

        reg.root_cell
            .get_or_try_init(|| {
                let ctx = ResolverContext::new(self, None, Some(frame));
                let instance = (reg.ctor)(&ctx)?;
                if reg.teardown.is_some() {
                    self.track_root(reg, &instance);
                }
                debug!(service = reg.name(), lifetime = %reg.lifetime, "root instance constructed");
                Ok(instance)
            })
            .cloned()
    }

    /// Hands an instance's teardown to the provider's creation list.
    fn track_root(&self, reg: &Registration, instance: &AnyArc) {
        self.root_disposers.lock().push(Tracked {
            service: reg.name(),
            instance: instance.clone(),
            teardown: reg.teardown.clone(),
        });
    }
}

impl Clone for ServiceProvider {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("services", &self.inner.registry.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Drop for ServiceProvider {
    fn drop(&mut self) {
        // Check if this is the last reference to the inner provider
        if Arc::strong_count(&self.inner) == 1
            && self.inner.options.warn_on_undisposed
            && !self.is_disposed()
        {
            let bag = self.inner.root_disposers.lock();
            if !bag.is_empty() {
                warn!(pending = bag.len(), "ServiceProvider dropped with undisposed instances. Call dispose() before dropping.");
            }
        }
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        if self.is_disposed() {
            return Err(DiError::ProviderDisposed);
        }
        self.inner.resolve_in(key, None, None)
    }

    fn has_registration(&self, key: &Key) -> bool {
        self.inner.registry.contains_key(key)
    }
}
