//! Scoped service resolution and lifecycle management.
//!
//! This module contains the Scope type: an isolated resolution context with
//! its own cache of scoped services and its own creation list, torn down in
//! reverse creation order when the scope is released.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::error::{DiError, DiResult};
use crate::internal::{DisposeBag, Frame, Tracked};
use crate::key::Key;
use crate::registration::{AnyArc, Registration};
use crate::traits::ResolverCore;

use super::{ResolverContext, ServiceProvider};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a scope, used in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) u64);

impl ScopeId {
    fn next() -> Self {
        Self(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of the id.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Open,
    Closed,
}

/// Scoped service container for unit-of-work dependency resolution.
///
/// A `Scope` provides isolated dependency resolution for scoped services while
/// still accessing singleton services from the root provider. One scope per
/// job execution (or per request) gives every unit of work its own
/// connections, contexts and buffers, shared within that unit and torn down
/// when it ends.
///
/// # Lifetime Behavior
///
/// - **Singleton**: Resolved and cached in the root provider (shared across all scopes)
/// - **Scoped**: Resolved and cached within this specific scope
/// - **Transient**: Created fresh on every resolution, owned by this scope
///
/// Every Scoped and Transient instance created through this scope, directly
/// or as a nested dependency, is recorded in creation order.
/// [`release`](Scope::release) runs their teardown hooks newest first.
///
/// # Examples
///
/// ```
/// use jobscope::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct DatabaseConnection(String);
/// struct UserService { db: Arc<DatabaseConnection> }
///
/// let mut collection = ServiceCollection::new();
/// collection
///     .add_scoped_factory::<DatabaseConnection, _>(|_| Ok(DatabaseConnection("connection-123".to_string())))
///     .unwrap();
/// collection
///     .add_transient_factory::<UserService, _>(|resolver| {
///         Ok(UserService { db: resolver.get::<DatabaseConnection>()? })
///     })
///     .unwrap();
///
/// let provider = collection.build();
/// let scope = provider.create_scope().unwrap();
///
/// let a = scope.get_required::<UserService>();
/// let b = scope.get_required::<UserService>();
/// assert!(!Arc::ptr_eq(&a, &b));
/// assert!(Arc::ptr_eq(&a.db, &b.db));
///
/// scope.release().unwrap();
/// assert!(scope.get::<UserService>().is_err());
/// ```
pub struct Scope {
    id: ScopeId,
    root: ServiceProvider,
    cells: Box<[OnceCell<AnyArc>]>,
    /// Held for reading by every top-level resolution, for writing only
    /// while `release` flips the state.
    lifecycle: RwLock<Lifecycle>,
    tracked: Mutex<DisposeBag>,
}

impl Scope {
    pub(crate) fn new(root: ServiceProvider) -> Self {
        let slots = root.inner().registry.scoped_count();
        let cells = (0..slots)
            .map(|_| OnceCell::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            id: ScopeId::next(),
            root,
            cells,
            lifecycle: RwLock::new(Lifecycle::Open),
            tracked: Mutex::new(DisposeBag::default()),
        }
    }

    /// Identifier of this scope.
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// The provider this scope was created from.
    pub fn provider(&self) -> &ServiceProvider {
        &self.root
    }

    /// Returns `true` once the scope has been released.
    pub fn is_closed(&self) -> bool {
        *self.lifecycle.read() == Lifecycle::Closed
    }

    /// Number of instances this scope currently owns.
    pub fn tracked_len(&self) -> usize {
        self.tracked.lock().len()
    }

    /// Creates an independent sibling scope from the same root provider.
    ///
    /// The new scope shares singletons but none of this scope's scoped
    /// instances, and it is released independently.
    pub fn create_child(&self) -> DiResult<Scope> {
        self.root.create_scope()
    }

    /// Closes the scope and tears down everything it owns.
    ///
    /// Waits for in-flight resolutions on this scope to finish, marks the
    /// scope closed, then runs the teardown hook of every owned instance in
    /// reverse creation order. Later resolutions fail with
    /// [`DiError::ScopeClosed`]. Releasing an already closed scope is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DiError::ScopeTeardown`] listing every hook that failed or
    /// panicked. The scope is closed regardless.
    pub fn release(&self) -> DiResult<()> {
        let bag = {
            let mut state = self.lifecycle.write();
            if *state == Lifecycle::Closed {
                trace!(scope_id = %self.id, "scope already released");
                return Ok(());
            }
            *state = Lifecycle::Closed;
            std::mem::take(&mut *self.tracked.lock())
        };

        debug!(scope_id = %self.id, owned = bag.len(), "releasing scope");
        bag.run_all_reverse()
    }

    /// Scoped resolution against this scope's cell for `reg`.
    pub(crate) fn resolve_scoped(&self, reg: &Registration, frame: &Frame<'_>) -> DiResult<AnyArc> {
        let cell = reg
            .scoped_slot
            .and_then(|slot| self.cells.get(slot))
            .ok_or(DiError::WrongLifetime("scoped registration has no slot in this scope"))?;

        if let Some(instance) = cell.get() {
            trace!(scope_id = %self.id, service = reg.name(), "scope cache hit");
            return Ok(instance.clone());
        }

        cell.get_or_try_init(|| {
            let ctx = ResolverContext::new(self.root.inner(), Some(self), Some(frame));
            let instance = (reg.ctor)(&ctx)?;
            self.track(reg, &instance);
            debug!(scope_id = %self.id, service = reg.name(), "scoped instance constructed");
            Ok(instance)
        })
        .cloned()
    }

    /// Appends a newly created instance to the creation list.
    pub(crate) fn track(&self, reg: &Registration, instance: &AnyArc) {
        self.tracked.lock().push(Tracked {
            service: reg.name(),
            instance: instance.clone(),
            teardown: reg.teardown.clone(),
        });
    }
}

impl ResolverCore for Scope {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        // Recursive read so nested resolutions on this thread never queue
        // behind a pending release.
        let state = self.lifecycle.read_recursive();
        if *state == Lifecycle::Closed {
            return Err(DiError::ScopeClosed(self.id));
        }
        self.root.inner().resolve_in(key, Some(self), None)
    }

    fn has_registration(&self, key: &Key) -> bool {
        self.root.inner().registry.contains_key(key)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("tracked", &self.tracked_len())
            .finish()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        debug!(scope_id = %self.id, "scope dropped while open, releasing");
        if let Err(e) = self.release() {
            warn!(scope_id = %self.id, error = %e, "teardown failed while dropping scope");
        }
    }
}
