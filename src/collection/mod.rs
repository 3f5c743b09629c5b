//! Service collection module for dependency injection.
//!
//! This module contains the ServiceCollection type used to register services
//! and build service providers.

use std::sync::Arc;

use crate::config::ProviderOptions;
use crate::error::DiResult;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::provider::{ResolverContext, ServiceProvider};
use crate::registration::{AnyArc, Registration, Registry, TeardownFn};
use crate::traits::{Dispose, DisposeError};

/// Mutable registry of services, consumed by [`build`](ServiceCollection::build).
///
/// Each service type can be registered once; a second registration for the
/// same type fails with [`DiError::DuplicateRegistration`](crate::DiError).
/// Factories receive a [`ResolverContext`] for resolving their own
/// dependencies and return `DiResult<T>` so construction failures propagate.
///
/// # Examples
///
/// ```
/// use jobscope::{ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// struct Settings { greeting: String }
/// struct Greeter { settings: Arc<Settings> }
///
/// fn main() -> DiResult<()> {
///     let mut services = ServiceCollection::new();
///     services
///         .add_singleton(Settings { greeting: "hello".into() })?
///         .add_transient_factory::<Greeter, _>(|r| Ok(Greeter { settings: r.get::<Settings>()? }))?;
///
///     let provider = services.build();
///     assert_eq!(provider.get::<Greeter>()?.settings.greeting, "hello");
///     Ok(())
/// }
/// ```
pub struct ServiceCollection {
    registry: Registry,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    // ----- Concrete Type Registrations -----

    /// Registers an already constructed singleton.
    ///
    /// Every resolution returns the same `Arc`. Pre-built values have no
    /// teardown hook; register a disposable factory if one is needed.
    pub fn add_singleton<T: 'static + Send + Sync>(&mut self, value: T) -> DiResult<&mut Self> {
        let arc: AnyArc = Arc::new(value);
        let ctor = move |_: &ResolverContext| -> DiResult<AnyArc> { Ok(arc.clone()) };
        self.insert(Registration::new(
            Key::of::<T>(),
            Lifetime::Singleton,
            Arc::new(ctor),
            None,
        ))
    }

    /// Registers a singleton factory that creates the instance on first request.
    ///
    /// The factory runs at most once per provider, even under concurrent
    /// first resolution, and always in the root context.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use jobscope::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct Pool { db: Arc<Database> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Database { url: "postgres://localhost".into() }).unwrap();
    /// services
    ///     .add_singleton_factory::<Pool, _>(|r| Ok(Pool { db: r.get::<Database>()? }))
    ///     .unwrap();
    ///
    /// let provider = services.build();
    /// let a = provider.get_required::<Pool>();
    /// let b = provider.get_required::<Pool>();
    /// assert!(Arc::ptr_eq(&a, &b));
    /// ```
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> DiResult<&mut Self>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, factory)
    }

    /// Registers a scoped factory: one instance per scope.
    ///
    /// Resolving a scoped service from the root provider fails unless the
    /// provider was built with [`RootScopedPolicy::RootSingleton`](crate::RootScopedPolicy).
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> DiResult<&mut Self>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, factory)
    }

    /// Registers a transient factory: a new instance on every resolution.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> DiResult<&mut Self>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Transient, factory)
    }

    /// Registers a factory with an explicit lifetime.
    pub fn add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> DiResult<&mut Self>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.insert(Registration::new(Key::of::<T>(), lifetime, erase(factory), None))
    }

    /// Registers a factory whose instances are torn down through [`Dispose`].
    ///
    /// Scoped and transient instances are disposed when the scope that
    /// created them is released. Singletons, and transients created outside
    /// any scope, are disposed with the provider.
    pub fn add_disposable_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> DiResult<&mut Self>
    where
        T: Dispose,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        let teardown: TeardownFn = Arc::new(|instance: &AnyArc| -> Result<(), DisposeError> {
            match instance.downcast_ref::<T>() {
                Some(value) => value.dispose(),
                None => Ok(()),
            }
        });
        self.insert(Registration::new(
            Key::of::<T>(),
            lifetime,
            erase(factory),
            Some(teardown),
        ))
    }

    /// Registers a factory with an arbitrary teardown hook.
    ///
    /// Useful for types that cannot implement [`Dispose`] themselves.
    pub fn add_factory_with_teardown<T, F, D>(
        &mut self,
        lifetime: Lifetime,
        factory: F,
        teardown: D,
    ) -> DiResult<&mut Self>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
        D: Fn(&T) -> Result<(), DisposeError> + Send + Sync + 'static,
    {
        let teardown: TeardownFn = Arc::new(move |instance: &AnyArc| -> Result<(), DisposeError> {
            match instance.downcast_ref::<T>() {
                Some(value) => teardown(value),
                None => Ok(()),
            }
        });
        self.insert(Registration::new(
            Key::of::<T>(),
            lifetime,
            erase(factory),
            Some(teardown),
        ))
    }

    // ----- TryAdd Registrations -----

    /// Registers a factory only if `T` is not registered yet.
    ///
    /// Returns `true` if the registration was added.
    pub fn try_add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> bool
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        !self.contains::<T>() && self.add_factory(lifetime, factory).is_ok()
    }

    /// Registers a pre-built singleton only if `T` is not registered yet.
    pub fn try_add_singleton<T: 'static + Send + Sync>(&mut self, value: T) -> bool {
        !self.contains::<T>() && self.add_singleton(value).is_ok()
    }

    // ----- Introspection -----

    /// Returns `true` if `T` has a registration.
    pub fn contains<T: 'static>(&self) -> bool {
        self.registry.contains_key(&Key::of::<T>())
    }

    /// Returns the lifetime registered for `T`, if any.
    pub fn lifetime_of<T: 'static>(&self) -> Option<Lifetime> {
        self.registry.lookup(&Key::of::<T>()).ok().map(|reg| reg.lifetime)
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    // ----- Build -----

    /// Freezes the registrations into a provider with default options.
    pub fn build(self) -> ServiceProvider {
        self.build_with_options(ProviderOptions::default())
    }

    /// Freezes the registrations into a provider.
    ///
    /// The registry is immutable from here on; the collection is consumed.
    pub fn build_with_options(mut self, options: ProviderOptions) -> ServiceProvider {
        self.registry.finalize();
        ServiceProvider::new(self.registry, options)
    }

    fn insert(&mut self, registration: Registration) -> DiResult<&mut Self> {
        self.registry.register(registration)?;
        Ok(self)
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

fn erase<T, F>(factory: F) -> crate::registration::Ctor
where
    T: 'static + Send + Sync,
    F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
{
    Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> {
        let value: AnyArc = Arc::new(factory(ctx)?);
        Ok(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiError;

    struct Marker;

    #[test]
    fn duplicate_type_is_rejected() {
        let mut services = ServiceCollection::new();
        services.add_transient_factory::<Marker, _>(|_| Ok(Marker)).unwrap();

        let err = services
            .add_scoped_factory::<Marker, _>(|_| Ok(Marker))
            .err()
            .unwrap();
        assert!(matches!(err, DiError::DuplicateRegistration(_)));
        assert_eq!(services.lifetime_of::<Marker>(), Some(Lifetime::Transient));
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn try_add_keeps_first_registration() {
        let mut services = ServiceCollection::new();
        assert!(services.try_add_singleton(1u32));
        assert!(!services.try_add_singleton(2u32));
        assert!(!services.try_add_factory::<u32, _>(Lifetime::Transient, |_| Ok(3)));
        assert_eq!(services.lifetime_of::<u32>(), Some(Lifetime::Singleton));
    }

    #[test]
    fn empty_collection() {
        let services = ServiceCollection::default();
        assert!(services.is_empty());
        assert!(!services.contains::<Marker>());
    }
}
