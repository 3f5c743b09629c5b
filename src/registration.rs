//! Service registration types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::provider::ResolverContext;
use crate::traits::DisposeError;

/// Type-erased shared instance, as stored in caches and creation lists.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

pub(crate) type TeardownFn = Arc<dyn Fn(&AnyArc) -> Result<(), DisposeError> + Send + Sync>;

/// Service registration with lifetime, constructor and optional teardown hook
pub(crate) struct Registration {
    pub(crate) key: Key,
    pub(crate) lifetime: Lifetime,
    pub(crate) ctor: Ctor,
    pub(crate) teardown: Option<TeardownFn>,
    /// Root-level cache cell. Holds the singleton instance, or the root
    /// instance of a scoped service under `RootScopedPolicy::RootSingleton`.
    pub(crate) root_cell: OnceCell<AnyArc>,
    /// Index into each scope's cell array, assigned by `Registry::finalize`.
    pub(crate) scoped_slot: Option<usize>,
}

impl Registration {
    pub(crate) fn new(key: Key, lifetime: Lifetime, ctor: Ctor, teardown: Option<TeardownFn>) -> Self {
        Self {
            key,
            lifetime,
            ctor,
            teardown,
            root_cell: OnceCell::new(),
            scoped_slot: None,
        }
    }

    #[inline]
    pub(crate) fn name(&self) -> &'static str {
        self.key.display_name()
    }
}

/// The lifetime registry: at most one registration per key.
///
/// Mutable only while owned by a `ServiceCollection`; once finalized it is
/// moved behind the provider's `Arc` and never written again.
pub(crate) struct Registry {
    entries: HashMap<Key, Registration>,
    scoped_count: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            scoped_count: 0,
        }
    }

    pub(crate) fn register(&mut self, registration: Registration) -> DiResult<()> {
        let key = registration.key;
        if self.entries.contains_key(&key) {
            return Err(DiError::DuplicateRegistration(key.display_name()));
        }
        self.entries.insert(key, registration);
        Ok(())
    }

    #[inline]
    pub(crate) fn lookup(&self, key: &Key) -> DiResult<&Registration> {
        self.entries
            .get(key)
            .ok_or(DiError::NotFound(key.display_name()))
    }

    #[inline]
    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn scoped_count(&self) -> usize {
        self.scoped_count
    }

    /// Assigns scoped slot indices so scopes can size their cell arrays once.
    pub(crate) fn finalize(&mut self) {
        let mut next_scoped_slot = 0;
        for reg in self.entries.values_mut() {
            if reg.lifetime == Lifetime::Scoped {
                reg.scoped_slot = Some(next_scoped_slot);
                next_scoped_slot += 1;
            }
        }
        self.scoped_count = next_scoped_slot;
    }
}
