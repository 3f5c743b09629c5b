//! Recurring console job using jobscope
//!
//! Every iteration opens a fresh scope, resolves the job graph from it, runs
//! the job and releases the scope. The output shows which dependencies are
//! shared between runs (singletons), within one run (scoped), or never
//! (transient).
//!
//! Run with `cargo run --example recurring_console -- 3` for three iterations
//! (default 3). Set `RUST_LOG=jobscope=debug` to watch scopes open and close.

use jobscope::{
    DiResult, Dispose, DisposeError, Lifetime, Resolver, ServiceCollection, ServiceProvider,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ===== Services =====

/// Lasts the lifetime of the application.
struct Logger;

impl Logger {
    fn line(&self, message: impl AsRef<str>) {
        println!("{}", message.as_ref());
    }
}

/// One unit of work; a new one per job run.
struct MyDbContext {
    id: usize,
}

static OPEN_CONTEXTS: AtomicUsize = AtomicUsize::new(0);

impl MyDbContext {
    fn open(id: usize) -> Self {
        OPEN_CONTEXTS.fetch_add(1, Ordering::SeqCst);
        Self { id }
    }
}

impl Dispose for MyDbContext {
    fn dispose(&self) -> Result<(), DisposeError> {
        OPEN_CONTEXTS.fetch_sub(1, Ordering::SeqCst);
        info!(context = self.id, "db context closed");
        Ok(())
    }
}

struct ChildDependency {
    logger: Arc<Logger>,
}

struct Dependency {
    db: Arc<MyDbContext>,
    child: Arc<ChildDependency>,
    logger: Arc<Logger>,
}

struct Job {
    db: Arc<MyDbContext>,
    dependency: Arc<Dependency>,
    child: Arc<ChildDependency>,
    logger: Arc<Logger>,
}

impl Job {
    async fn run(&self, previous: Option<&Job>) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.logger.line(format!("run at {} (db context #{})", now, self.db.id));

        if let Some(previous) = previous {
            if Arc::ptr_eq(&self.db, &previous.db) {
                self.logger.line("MyDbContext is the same as last run");
            }
            if Arc::ptr_eq(&self.dependency, &previous.dependency) {
                self.logger.line("Dependency is the same as last run");
            }
            if Arc::ptr_eq(&self.child, &previous.child) {
                self.logger.line("ChildDependency is the same as last run");
            }
            if Arc::ptr_eq(&self.logger, &previous.logger) {
                self.logger.line("Logger is the same as last run");
            }
        }

        if Arc::ptr_eq(&self.db, &self.dependency.db) {
            self.logger.line("Job.db and Job.dependency.db are the same");
        }
        if Arc::ptr_eq(&self.child, &self.dependency.child) {
            self.logger.line("Job.child and Job.dependency.child are the same");
        }
        if Arc::ptr_eq(&self.logger, &self.dependency.logger)
            && Arc::ptr_eq(&self.logger, &self.dependency.child.logger)
        {
            self.logger.line("Job.logger, Job.dependency.logger and Job.dependency.child.logger are the same");
        }
        self.logger.line("");

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

fn configure() -> DiResult<ServiceProvider> {
    let contexts = Arc::new(AtomicUsize::new(0));

    let mut services = ServiceCollection::new();
    services
        .add_transient_factory::<Job, _>(|r| {
            Ok(Job {
                db: r.get()?,
                dependency: r.get()?,
                child: r.get()?,
                logger: r.get()?,
            })
        })?
        .add_disposable_factory::<MyDbContext, _>(Lifetime::Scoped, move |_| {
            Ok(MyDbContext::open(contexts.fetch_add(1, Ordering::SeqCst) + 1))
        })?
        .add_transient_factory::<Dependency, _>(|r| {
            Ok(Dependency {
                db: r.get()?,
                child: r.get()?,
                logger: r.get()?,
            })
        })?
        .add_transient_factory::<ChildDependency, _>(|r| Ok(ChildDependency { logger: r.get()? }))?
        .add_singleton(Logger)?;

    Ok(services.build())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let iterations: usize = std::env::args()
        .nth(1)
        .map(|arg| arg.parse())
        .transpose()?
        .unwrap_or(3);

    let provider = configure()?;

    // Kept only to report which dependencies are the same across runs.
    let mut previous: Option<Arc<Job>> = None;

    for _ in 0..iterations {
        let scope = provider.create_scope()?;
        let job = scope.get::<Job>()?;
        job.run(previous.as_deref()).await;
        scope.release()?;
        previous = Some(job);

        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    info!(open_contexts = OPEN_CONTEXTS.load(Ordering::SeqCst), "done");
    provider.dispose()?;
    Ok(())
}
