/// Scope-per-invocation job activation tests
///
/// These tests drive `ScopedJobFactory` the way a scheduler does: begin an
/// invocation when a trigger fires, run the job, end the invocation.

use jobscope::{
    DiError, Dispose, DisposeError, JobFactory, Key, Lifetime, Resolver, ScopedJobFactory,
    ServiceCollection,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

struct WorkUnit {
    disposed: Arc<AtomicUsize>,
}

impl Dispose for WorkUnit {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct DbContext {
    closed: Arc<AtomicUsize>,
}

impl Dispose for DbContext {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ImportJob {
    db: Arc<DbContext>,
}

fn work_unit_factory(disposed: &Arc<AtomicUsize>) -> ScopedJobFactory {
    let d = disposed.clone();
    let mut sc = ServiceCollection::new();
    sc.add_disposable_factory::<WorkUnit, _>(Lifetime::Scoped, move |_| {
        Ok(WorkUnit { disposed: d.clone() })
    })
    .unwrap();
    ScopedJobFactory::new(sc.build())
}

fn import_job_factory(closed: &Arc<AtomicUsize>) -> ScopedJobFactory {
    let c = closed.clone();
    let mut sc = ServiceCollection::new();
    sc.add_disposable_factory::<DbContext, _>(Lifetime::Scoped, move |_| {
        Ok(DbContext { closed: c.clone() })
    })
    .unwrap();
    sc.add_transient_factory::<ImportJob, _>(|r| Ok(ImportJob { db: r.get()? }))
        .unwrap();
    ScopedJobFactory::new(sc.build())
}

#[test]
fn test_each_invocation_gets_its_own_scope() {
    let closed = Arc::new(AtomicUsize::new(0));
    let jobs = import_job_factory(&closed);

    let a = jobs.begin_invocation::<ImportJob>().unwrap();
    let b = jobs.begin_invocation::<ImportJob>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a.db, &b.db));
    assert_eq!(jobs.active_invocations(), 2);

    jobs.end_invocation(&a).unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(jobs.active_invocations(), 1);

    jobs.end_invocation(&b).unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 2);
    assert_eq!(jobs.active_invocations(), 0);
}

#[test]
fn test_double_end_releases_once() {
    let closed = Arc::new(AtomicUsize::new(0));
    let jobs = import_job_factory(&closed);

    let job = jobs.begin_invocation::<ImportJob>().unwrap();
    jobs.end_invocation(&job).unwrap();
    jobs.end_invocation(&job).unwrap();

    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(jobs.active_invocations(), 0);
}

#[test]
fn test_end_of_unknown_instance_is_ignored() {
    let closed = Arc::new(AtomicUsize::new(0));
    let jobs = import_job_factory(&closed);

    let stray = Arc::new(ImportJob {
        db: Arc::new(DbContext { closed: closed.clone() }),
    });
    jobs.end_invocation(&stray).unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 0);
}

#[test]
fn test_failed_resolution_releases_partial_scope() {
    let closed = Arc::new(AtomicUsize::new(0));
    let c = closed.clone();

    struct Report;
    struct BrokenJob;

    let mut sc = ServiceCollection::new();
    sc.add_disposable_factory::<DbContext, _>(Lifetime::Scoped, move |_| {
        Ok(DbContext { closed: c.clone() })
    })
    .unwrap();
    sc.add_transient_factory::<BrokenJob, _>(|r| {
        r.get::<DbContext>()?;
        r.get::<Report>()?; // never registered
        Ok(BrokenJob)
    })
    .unwrap();

    let jobs = ScopedJobFactory::new(sc.build());
    match jobs.begin_invocation::<BrokenJob>() {
        Err(DiError::NotFound(name)) => assert!(name.ends_with("Report")),
        Err(other) => panic!("unexpected error {}", other),
        Ok(_) => panic!("expected resolution failure"),
    }

    // The DbContext created before the failure was torn down
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(jobs.active_invocations(), 0);
}

#[test]
fn test_begin_after_dispose_fails() {
    let closed = Arc::new(AtomicUsize::new(0));
    let jobs = import_job_factory(&closed);
    jobs.provider().dispose().unwrap();

    assert!(matches!(
        jobs.begin_invocation::<ImportJob>(),
        Err(DiError::ScopeCreationFailed(_))
    ));
}

#[test]
fn test_teardown_failure_surfaces_on_end() {
    struct Leaky;

    let mut sc = ServiceCollection::new();
    sc.add_factory_with_teardown::<Leaky, _, _>(
        Lifetime::Transient,
        |_| Ok(Leaky),
        |_| Err("flush failed".into()),
    )
    .unwrap();
    let jobs = ScopedJobFactory::new(sc.build());

    let job = jobs.begin_invocation::<Leaky>().unwrap();
    let err = jobs.end_invocation(&job).unwrap_err();
    assert_eq!(err.teardown_failures().len(), 1);
    assert_eq!(jobs.active_invocations(), 0);

    // Already ended; nothing left to fail
    jobs.end_invocation(&job).unwrap();
}

#[test]
fn test_scheduler_through_trait_object() {
    let closed = Arc::new(AtomicUsize::new(0));
    let factory: Arc<dyn JobFactory> = Arc::new(import_job_factory(&closed));

    let job = factory.new_job(&Key::of::<ImportJob>()).unwrap();
    let typed = job.clone().downcast::<ImportJob>().unwrap();
    assert_eq!(typed.db.closed.load(Ordering::SeqCst), 0);

    // Returning the typed handle's erased twin ends the same invocation
    factory.return_job(&job).unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_invocation_guard() {
    let closed = Arc::new(AtomicUsize::new(0));
    let jobs = import_job_factory(&closed);

    {
        let run = jobs.start::<ImportJob>().unwrap();
        assert_eq!(run.db.closed.load(Ordering::SeqCst), 0);
        assert_eq!(jobs.active_invocations(), 1);
    }
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    let run = jobs.start::<ImportJob>().unwrap();
    let job = run.job().clone();
    run.finish().unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 2);

    // The guard already ended it
    jobs.end_invocation(&job).unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_end_all_releases_everything() {
    let closed = Arc::new(AtomicUsize::new(0));
    let jobs = import_job_factory(&closed);

    let handles: Vec<_> = (0..5)
        .map(|_| jobs.begin_invocation::<ImportJob>().unwrap())
        .collect();
    assert_eq!(jobs.active_invocations(), 5);

    jobs.end_all().unwrap();
    assert_eq!(jobs.active_invocations(), 0);
    assert_eq!(closed.load(Ordering::SeqCst), 5);

    for job in &handles {
        jobs.end_invocation(job).unwrap();
    }
    assert_eq!(closed.load(Ordering::SeqCst), 5);
}

#[test]
fn test_hundred_concurrent_invocations() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let jobs = Arc::new(work_unit_factory(&disposed));

    let threads = 100;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let jobs = jobs.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let unit = jobs.begin_invocation::<WorkUnit>()?;
                jobs.end_invocation(&unit)
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(jobs.active_invocations(), 0);
    assert_eq!(disposed.load(Ordering::SeqCst), threads);
}
