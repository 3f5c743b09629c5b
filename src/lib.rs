//! # jobscope
//!
//! Dependency injection with explicit service lifetimes and scope-per-invocation
//! activation for scheduled jobs.
//!
//! ## Features
//!
//! - **Typed lifetimes**: Singleton, Scoped, and Transient services
//! - **Scopes**: isolated caches for scoped services with ordered teardown
//! - **Thread-safe**: singletons and scoped services are constructed exactly once under contention
//! - **Circular dependency detection**: cycles fail with the full resolution path
//! - **Job activation**: [`ScopedJobFactory`] gives every job run its own scope
//!
//! ## Quick Start
//!
//! ```rust
//! use jobscope::{ServiceCollection, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut services = ServiceCollection::new();
//! services
//!     .add_singleton(Database {
//!         connection_string: "postgres://localhost".to_string(),
//!     })
//!     .unwrap();
//! services
//!     .add_transient_factory::<UserService, _>(|resolver| {
//!         Ok(UserService {
//!             db: resolver.get::<Database>()?,
//!         })
//!     })
//!     .unwrap();
//!
//! let provider = services.build();
//! let user_service = provider.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: Created once and shared across the entire application
//! - **Scoped**: Created once per scope (one scope per job execution)
//! - **Transient**: Created fresh on every resolution
//!
//! ## Scoped Job Activation
//!
//! ```rust
//! use jobscope::{Dispose, DisposeError, Lifetime, ScopedJobFactory, ServiceCollection, Resolver};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! static CLOSED: AtomicUsize = AtomicUsize::new(0);
//!
//! struct Connection;
//! impl Dispose for Connection {
//!     fn dispose(&self) -> Result<(), DisposeError> {
//!         CLOSED.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! struct SyncJob { conn: Arc<Connection> }
//!
//! let mut services = ServiceCollection::new();
//! services
//!     .add_disposable_factory::<Connection, _>(Lifetime::Scoped, |_| Ok(Connection))
//!     .unwrap();
//! services
//!     .add_transient_factory::<SyncJob, _>(|r| Ok(SyncJob { conn: r.get()? }))
//!     .unwrap();
//!
//! let jobs = ScopedJobFactory::new(services.build());
//! let job = jobs.begin_invocation::<SyncJob>().unwrap();
//! // ... run the job ...
//! jobs.end_invocation(&job).unwrap();
//! assert_eq!(CLOSED.load(Ordering::SeqCst), 1);
//! ```

// Module declarations
pub mod collection;
pub mod config;
pub mod error;
pub mod jobs;
pub mod key;
pub mod lifetime;
pub mod provider;
pub mod traits;

// Internal modules
mod internal;
mod registration;

// Re-exports
pub use collection::ServiceCollection;
pub use config::{ProviderOptions, RootScopedPolicy};
pub use error::{DiError, DiResult, TeardownError};
pub use jobs::{Invocation, JobFactory, ScopedJobFactory};
pub use key::{key_of_type, InstanceId, Key};
pub use lifetime::Lifetime;
pub use provider::{ResolverContext, Scope, ScopeId, ServiceProvider};
pub use registration::AnyArc;
pub use traits::{Dispose, DisposeError, Resolver, ResolverCore};
