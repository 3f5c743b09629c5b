//! Scope-per-invocation job activation.
//!
//! A scheduler asks [`ScopedJobFactory`] for a job instance each time a job
//! fires. The factory opens a fresh [`Scope`], resolves the job from it and
//! remembers which scope produced which instance. When the scheduler hands
//! the instance back, the matching scope is released, tearing down
//! everything the job's dependency graph created for that run.
//!
//! ```
//! use jobscope::{ServiceCollection, ScopedJobFactory, Resolver, DiResult};
//! use std::sync::Arc;
//!
//! struct DbContext;
//! struct ReportJob { db: Arc<DbContext> }
//!
//! fn main() -> DiResult<()> {
//!     let mut services = ServiceCollection::new();
//!     services
//!         .add_scoped_factory::<DbContext, _>(|_| Ok(DbContext))?
//!         .add_transient_factory::<ReportJob, _>(|r| Ok(ReportJob { db: r.get()? }))?;
//!
//!     let jobs = ScopedJobFactory::new(services.build());
//!
//!     let first = jobs.begin_invocation::<ReportJob>()?;
//!     let second = jobs.begin_invocation::<ReportJob>()?;
//!     assert!(!Arc::ptr_eq(&first.db, &second.db));
//!     assert_eq!(jobs.active_invocations(), 2);
//!
//!     jobs.end_invocation(&first)?;
//!     jobs.end_invocation(&second)?;
//!     assert_eq!(jobs.active_invocations(), 0);
//!     Ok(())
//! }
//! ```

use std::any::type_name;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::error::{DiError, DiResult};
use crate::key::{InstanceId, Key};
use crate::provider::{Scope, ServiceProvider};
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

/// Object-safe activation contract for schedulers.
///
/// `new_job` is called when a job fires, `return_job` once it has finished,
/// whatever its outcome.
pub trait JobFactory: Send + Sync {
    /// Opens a scope for one run and resolves the job registered under `job_type` from it.
    fn new_job(&self, job_type: &Key) -> DiResult<AnyArc>;

    /// Releases the run's scope. Returning a job twice is a no-op.
    fn return_job(&self, job: &AnyArc) -> DiResult<()>;
}

struct ActiveInvocation {
    // Keeps the allocation, and so the InstanceId, alive while tracked.
    _job: AnyArc,
    scope: Scope,
}

/// Binds every job invocation to its own scope.
///
/// The table of active invocations is a concurrent map keyed by the job
/// instance's identity; `begin_invocation` and `end_invocation` may be
/// called from any number of threads.
pub struct ScopedJobFactory {
    provider: ServiceProvider,
    active: DashMap<InstanceId, ActiveInvocation>,
}

impl ScopedJobFactory {
    /// Creates a factory with no active invocations over `provider`.
    pub fn new(provider: ServiceProvider) -> Self {
        Self {
            provider,
            active: DashMap::new(),
        }
    }

    /// The provider scopes are created from.
    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// Number of invocations that have begun and not yet ended.
    pub fn active_invocations(&self) -> usize {
        self.active.len()
    }

    /// Opens a scope and resolves a `J` from it.
    ///
    /// # Errors
    ///
    /// - [`DiError::ScopeCreationFailed`] if no scope can be opened, or if
    ///   the resolved instance is already bound to another invocation (a
    ///   job registered as a singleton).
    /// - Any resolution error for `J` or its dependencies. Whatever the
    ///   scope created before the failure is torn down first.
    pub fn begin_invocation<J: Send + Sync + 'static>(&self) -> DiResult<Arc<J>> {
        let (job, scope) = self.open(&Key::of::<J>())?;
        let typed = job
            .clone()
            .downcast::<J>()
            .map_err(|_| DiError::TypeMismatch(type_name::<J>()))?;
        self.bind(job, scope)?;
        Ok(typed)
    }

    /// Type-erased [`begin_invocation`](Self::begin_invocation).
    pub fn begin_invocation_by_key(&self, job_type: &Key) -> DiResult<AnyArc> {
        let (job, scope) = self.open(job_type)?;
        self.bind(job.clone(), scope)?;
        Ok(job)
    }

    /// Ends the invocation `job` belongs to and releases its scope.
    ///
    /// Returns the scope's teardown result. An instance that is not tracked
    /// (never begun, or already ended) is ignored.
    pub fn end_invocation<J: ?Sized>(&self, job: &Arc<J>) -> DiResult<()> {
        let id = InstanceId::of(job);
        match self.active.remove(&id) {
            Some((_, invocation)) => {
                debug!(job = %id, scope_id = %invocation.scope.id(), "invocation ended");
                invocation.scope.release()
            }
            None => {
                trace!(job = %id, "end_invocation for untracked instance ignored");
                Ok(())
            }
        }
    }

    /// Type-erased [`end_invocation`](Self::end_invocation).
    pub fn end_invocation_any(&self, job: &AnyArc) -> DiResult<()> {
        self.end_invocation(job)
    }

    /// Begins an invocation and wraps it in a guard that ends it on drop.
    pub fn start<J: Send + Sync + 'static>(&self) -> DiResult<Invocation<'_, J>> {
        let job = self.begin_invocation::<J>()?;
        Ok(Invocation {
            factory: self,
            job,
            ended: false,
        })
    }

    /// Ends every active invocation, as on scheduler shutdown.
    ///
    /// All scopes are released even if some teardowns fail; failures are
    /// returned together.
    pub fn end_all(&self) -> DiResult<()> {
        let ids: Vec<InstanceId> = self.active.iter().map(|entry| *entry.key()).collect();
        debug!(active = ids.len(), "ending all invocations");

        let mut failures = Vec::new();
        for id in ids {
            if let Some((_, invocation)) = self.active.remove(&id) {
                if let Err(e) = invocation.scope.release() {
                    failures.extend(e.teardown_failures().iter().cloned());
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::ScopeTeardown(failures))
        }
    }

    fn open(&self, job_type: &Key) -> DiResult<(AnyArc, Scope)> {
        let scope = self.provider.create_scope().map_err(|e| match e {
            DiError::ScopeCreationFailed(_) => e,
            other => DiError::ScopeCreationFailed(other.to_string()),
        })?;
        // On error `scope` drops here, releasing whatever it created.
        let job = scope.resolve_any(job_type)?;
        Ok((job, scope))
    }

    fn bind(&self, job: AnyArc, scope: Scope) -> DiResult<()> {
        let id = InstanceId::of(&job);
        let scope_id = scope.id();

        let rejected = match self.active.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(ActiveInvocation { _job: job, scope });
                None
            }
            Entry::Occupied(_) => Some(scope),
        };

        // Shard lock is released; tear the rejected scope down outside it.
        match rejected {
            None => {
                debug!(job = %id, scope_id = %scope_id, "invocation begun");
                Ok(())
            }
            Some(scope) => {
                if let Err(e) = scope.release() {
                    warn!(scope_id = %scope_id, error = %e, "teardown failed for rejected invocation scope");
                }
                Err(DiError::ScopeCreationFailed(format!(
                    "job instance {} is already bound to an active invocation",
                    id
                )))
            }
        }
    }
}

impl JobFactory for ScopedJobFactory {
    fn new_job(&self, job_type: &Key) -> DiResult<AnyArc> {
        self.begin_invocation_by_key(job_type)
    }

    fn return_job(&self, job: &AnyArc) -> DiResult<()> {
        self.end_invocation_any(job)
    }
}

impl fmt::Debug for ScopedJobFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedJobFactory")
            .field("active", &self.active.len())
            .finish()
    }
}

/// A running invocation; ends it when dropped.
///
/// Dereferences to the job. Use [`finish`](Invocation::finish) to observe the
/// teardown result; on drop, teardown failures are only logged.
pub struct Invocation<'f, J: Send + Sync + 'static> {
    factory: &'f ScopedJobFactory,
    job: Arc<J>,
    ended: bool,
}

impl<'f, J: Send + Sync + 'static> Invocation<'f, J> {
    /// The job instance bound to this invocation's scope.
    pub fn job(&self) -> &Arc<J> {
        &self.job
    }

    /// Ends the invocation and returns the scope's teardown result.
    pub fn finish(mut self) -> DiResult<()> {
        self.ended = true;
        self.factory.end_invocation(&self.job)
    }
}

impl<'f, J: Send + Sync + 'static> Deref for Invocation<'f, J> {
    type Target = J;

    fn deref(&self) -> &J {
        &self.job
    }
}

impl<'f, J: Send + Sync + 'static> Drop for Invocation<'f, J> {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        if let Err(e) = self.factory.end_invocation(&self.job) {
            warn!(job = type_name::<J>(), error = %e, "teardown failed while dropping invocation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::ServiceCollection;
    use crate::lifetime::Lifetime;
    use crate::traits::Resolver;

    #[derive(Debug)]
    struct Work;

    fn factory(job_lifetime: Lifetime) -> ScopedJobFactory {
        let mut services = ServiceCollection::new();
        services.add_factory::<Work, _>(job_lifetime, |_| Ok(Work)).unwrap();
        ScopedJobFactory::new(services.build())
    }

    #[test]
    fn erased_and_typed_handles_share_identity() {
        let jobs = factory(Lifetime::Transient);
        let job = jobs.begin_invocation_by_key(&Key::of::<Work>()).unwrap();
        let typed = job.clone().downcast::<Work>().unwrap();
        assert_eq!(InstanceId::of(&job), InstanceId::of(&typed));

        jobs.end_invocation(&typed).unwrap();
        assert_eq!(jobs.active_invocations(), 0);
    }

    #[test]
    fn singleton_job_cannot_be_bound_twice() {
        let jobs = factory(Lifetime::Singleton);
        let first = jobs.begin_invocation::<Work>().unwrap();

        let err = jobs.begin_invocation::<Work>().unwrap_err();
        assert!(matches!(err, DiError::ScopeCreationFailed(_)));
        assert_eq!(jobs.active_invocations(), 1);

        jobs.end_invocation(&first).unwrap();
        assert_eq!(jobs.active_invocations(), 0);
    }

    #[test]
    fn guard_ends_invocation_on_drop() {
        let jobs = factory(Lifetime::Transient);
        {
            let run = jobs.start::<Work>().unwrap();
            let _: &Work = &run;
            assert_eq!(jobs.active_invocations(), 1);
        }
        assert_eq!(jobs.active_invocations(), 0);

        let run = jobs.start::<Work>().unwrap();
        run.finish().unwrap();
        assert_eq!(jobs.active_invocations(), 0);
    }

    #[test]
    fn object_safe_factory() {
        let jobs: Arc<dyn JobFactory> = Arc::new(factory(Lifetime::Transient));
        let job = jobs.new_job(&Key::of::<Work>()).unwrap();
        assert!(job.downcast_ref::<Work>().is_some());
        jobs.return_job(&job).unwrap();
        jobs.return_job(&job).unwrap();
    }

    #[test]
    fn unregistered_job_leaves_nothing_tracked() {
        let jobs = factory(Lifetime::Transient);
        let err = jobs.begin_invocation::<String>().unwrap_err();
        assert!(matches!(err, DiError::NotFound(_)));
        assert_eq!(jobs.active_invocations(), 0);
        assert!(jobs.provider().get::<Work>().is_ok());
    }
}
