//! Parallel scheduled jobs using jobscope
//!
//! A tokio interval plays the role of a scheduler trigger. Each tick fans
//! out several concurrent job runs through `ScopedJobFactory`: every run gets
//! its own scope, so its `UnitOfWork` is never shared with a sibling run,
//! while the singleton `Metrics` is shared by all of them.

use jobscope::{
    DiResult, Dispose, DisposeError, JobFactory, Key, Lifetime, Resolver, ScopedJobFactory,
    ServiceCollection,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct Metrics {
    runs: AtomicUsize,
    units_closed: AtomicUsize,
}

struct UnitOfWork {
    id: usize,
    metrics: Arc<Metrics>,
}

impl Dispose for UnitOfWork {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.metrics.units_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct SyncJob {
    unit: Arc<UnitOfWork>,
    metrics: Arc<Metrics>,
}

impl SyncJob {
    async fn execute(&self, tick: usize) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.metrics.runs.fetch_add(1, Ordering::SeqCst);
        info!(tick, unit = self.unit.id, "job finished");
    }
}

fn build_factory() -> DiResult<ScopedJobFactory> {
    let next_unit = Arc::new(AtomicUsize::new(0));

    let mut services = ServiceCollection::new();
    services
        .add_singleton_factory::<Metrics, _>(|_| Ok(Metrics::default()))?
        .add_disposable_factory::<UnitOfWork, _>(Lifetime::Scoped, move |r| {
            Ok(UnitOfWork {
                id: next_unit.fetch_add(1, Ordering::SeqCst),
                metrics: r.get()?,
            })
        })?
        .add_transient_factory::<SyncJob, _>(|r| {
            Ok(SyncJob {
                unit: r.get()?,
                metrics: r.get()?,
            })
        })?;

    Ok(ScopedJobFactory::new(services.build()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let factory = Arc::new(build_factory()?);
    let mut trigger = tokio::time::interval(Duration::from_millis(200));

    for tick in 0..3 {
        trigger.tick().await;

        let mut runs = Vec::new();
        for _ in 0..4 {
            let factory = factory.clone();
            runs.push(tokio::spawn(async move {
                let job = factory.begin_invocation::<SyncJob>()?;
                job.execute(tick).await;
                factory.end_invocation(&job)
            }));
        }

        for run in runs {
            if let Err(e) = run.await? {
                warn!(tick, error = %e, "job invocation failed");
            }
        }
    }

    // The scheduler-facing contract works on type-erased handles.
    let scheduler: Arc<dyn JobFactory> = factory.clone();
    let job = scheduler.new_job(&Key::of::<SyncJob>())?;
    scheduler.return_job(&job)?;

    let metrics = factory.provider().get::<Metrics>()?;
    info!(
        runs = metrics.runs.load(Ordering::SeqCst),
        units_closed = metrics.units_closed.load(Ordering::SeqCst),
        active = factory.active_invocations(),
        "scheduler stopped"
    );

    factory.end_all()?;
    factory.provider().dispose()?;
    Ok(())
}
