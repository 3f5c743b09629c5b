//! Error types for the dependency injection container.

use thiserror::Error;

use crate::provider::ScopeId;

/// Dependency injection errors
///
/// Represents the various error conditions that can occur during service
/// registration, resolution, scope teardown, or job binding.
///
/// # Examples
///
/// ```rust
/// use jobscope::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build();
/// match provider.get::<String>() {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use jobscope::DiError;
///
/// let circular = DiError::Circular(vec!["ServiceA", "ServiceB", "ServiceA"]);
/// assert_eq!(circular.to_string(), "Circular dependency: ServiceA -> ServiceB -> ServiceA");
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Service not registered
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// A registration for the same type already exists
    #[error("Service already registered: {0}")]
    DuplicateRegistration(&'static str),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Invalid lifetime resolution (e.g., scoped from root)
    #[error("Lifetime error: {0}")]
    WrongLifetime(&'static str),
    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Resolution attempted through a scope that was already released
    #[error("Scope {0} is closed")]
    ScopeClosed(ScopeId),
    /// Root provider was disposed; singletons are no longer available
    #[error("Service provider has been disposed")]
    ProviderDisposed,
    /// A scope could not be created or bound to an invocation
    #[error("Scope creation failed: {0}")]
    ScopeCreationFailed(String),
    /// One or more teardown hooks failed while releasing a scope
    #[error("Scope teardown failed for {} service(s): {}", .0.len(), join_teardown(.0))]
    ScopeTeardown(Vec<TeardownError>),
    /// A factory reported a failure while constructing its service
    #[error("Factory for {service} failed: {message}")]
    Factory {
        service: &'static str,
        message: String,
    },
    /// Options could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DiError {
    /// Builds a [`DiError::Factory`] for the service type `T`.
    ///
    /// Intended for use inside factories that can fail for reasons of their own.
    ///
    /// ```rust
    /// use jobscope::{DiError, ServiceCollection, Resolver};
    ///
    /// struct Connection;
    ///
    /// let mut services = ServiceCollection::new();
    /// services
    ///     .add_transient_factory::<Connection, _>(|_| Err(DiError::factory::<Connection>("refused")))
    ///     .unwrap();
    ///
    /// let provider = services.build();
    /// assert!(matches!(provider.get::<Connection>(), Err(DiError::Factory { .. })));
    /// ```
    pub fn factory<T: ?Sized>(message: impl Into<String>) -> Self {
        DiError::Factory {
            service: std::any::type_name::<T>(),
            message: message.into(),
        }
    }

    /// Returns the individual teardown failures if this is a [`DiError::ScopeTeardown`].
    pub fn teardown_failures(&self) -> &[TeardownError] {
        match self {
            DiError::ScopeTeardown(failures) => failures,
            _ => &[],
        }
    }
}

/// A single failed teardown hook, collected while releasing a scope or provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service}: {message}")]
pub struct TeardownError {
    /// Type name of the service whose hook failed
    pub service: &'static str,
    /// Error message, or the panic payload if the hook panicked
    pub message: String,
}

fn join_teardown(failures: &[TeardownError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for DI operations
///
/// A convenience type alias for `Result<T, DiError>` used throughout jobscope.
pub type DiResult<T> = Result<T, DiError>;
