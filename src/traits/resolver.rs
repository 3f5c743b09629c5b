//! Resolver traits for service resolution.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::registration::AnyArc;

/// Core resolver trait for object-safe service resolution.
///
/// Implemented by [`ServiceProvider`](crate::ServiceProvider) (root context),
/// [`Scope`](crate::Scope) (scope context) and
/// [`ResolverContext`](crate::ResolverContext) (the context handed to
/// factories, which also carries the chain of services under construction).
///
/// Most users should use the [`Resolver`] trait instead, which provides
/// typed methods built on top of this one.
pub trait ResolverCore: Send + Sync {
    /// Resolves a single service by key.
    ///
    /// # Returns
    ///
    /// * `Ok(AnyArc)` - The resolved service wrapped in `Arc<dyn Any>`
    /// * `Err(DiError)` - Resolution error (not found, wrong lifetime, circular, closed scope, etc.)
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc>;

    /// Returns `true` if `key` has a registration in the underlying provider.
    fn has_registration(&self, key: &Key) -> bool;
}

/// High-level resolver interface with generic methods for type-safe service resolution.
///
/// Implemented for every [`ResolverCore`], so providers, scopes and factory
/// contexts are interchangeable for resolution within their own context.
///
/// # Examples
///
/// ```
/// use jobscope::{ServiceCollection, Resolver};
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(42usize).unwrap();
///
/// let provider = collection.build();
/// let number = provider.get_required::<usize>();
/// assert_eq!(*number, 42);
/// assert!(provider.try_get::<u8>().unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service type.
    ///
    /// # Examples
    ///
    /// ```
    /// use jobscope::{ServiceCollection, Resolver};
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection.add_singleton("configuration".to_string()).unwrap();
    ///
    /// let provider = collection.build();
    /// let config = provider.get::<String>().unwrap();
    /// assert_eq!(&*config, "configuration");
    /// ```
    fn get<T: 'static + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let key = Key::of::<T>();
        let any = self.resolve_any(&key)?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a concrete service type, panicking on failure.
    ///
    /// Convenience for call sites where a missing registration is a
    /// programming error. Factories should prefer [`get`](Self::get) with `?`.
    fn get_required<T: 'static + Send + Sync>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }

    /// Resolves a concrete service type, returning `None` if `T` itself is not registered.
    ///
    /// Errors other than `T` being unregistered (including an unregistered
    /// dependency of `T`) are still returned.
    fn try_get<T: 'static + Send + Sync>(&self) -> DiResult<Option<Arc<T>>> {
        if !self.has_registration(&Key::of::<T>()) {
            return Ok(None);
        }
        self.get::<T>().map(Some)
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
