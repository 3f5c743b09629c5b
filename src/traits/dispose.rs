//! Disposal trait for resource cleanup.

/// Boxed error returned by a failing teardown hook.
pub type DisposeError = Box<dyn std::error::Error + Send + Sync>;

/// Trait for synchronous resource disposal.
///
/// Implement this trait for services that need structured teardown (e.g.,
/// flushing caches, closing connections) and register them with
/// [`ServiceCollection::add_disposable_factory`](crate::ServiceCollection::add_disposable_factory).
/// Hooks run in reverse creation order when the owning scope is released,
/// or when the provider is disposed for singletons.
///
/// A hook that returns an error (or panics) does not stop the remaining
/// hooks; all failures are reported together.
///
/// # Examples
///
/// ```
/// use jobscope::{Dispose, DisposeError, Lifetime, ServiceCollection, Resolver};
///
/// struct Cache {
///     name: String,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> Result<(), DisposeError> {
///         println!("Flushing cache: {}", self.name);
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_disposable_factory::<Cache, _>(Lifetime::Scoped, |_| {
///         Ok(Cache { name: "user_cache".to_string() })
///     })
///     .unwrap();
///
/// let provider = services.build();
/// let scope = provider.create_scope().unwrap();
/// let _cache = scope.get_required::<Cache>();
/// scope.release().unwrap();
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self) -> Result<(), DisposeError>;
}
