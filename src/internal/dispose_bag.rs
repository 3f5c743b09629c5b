//! Internal disposal bag: the ordered creation list of a scope or provider.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{trace, warn};

use crate::error::{DiError, DiResult, TeardownError};
use crate::registration::{AnyArc, TeardownFn};

/// An instance owned by a scope (or, for singletons, by the root provider).
pub(crate) struct Tracked {
    pub(crate) service: &'static str,
    pub(crate) instance: AnyArc,
    pub(crate) teardown: Option<TeardownFn>,
}

/// Instances in creation order, torn down in reverse (LIFO).
///
/// Holding the `Arc` keeps every owned instance alive until teardown, even
/// if the caller dropped its handle long before.
#[derive(Default)]
pub(crate) struct DisposeBag {
    tracked: Vec<Tracked>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, tracked: Tracked) {
        self.tracked.push(tracked);
    }

    pub(crate) fn len(&self) -> usize {
        self.tracked.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Runs every teardown hook in reverse order.
    ///
    /// A hook that fails or panics is recorded and the remaining hooks still
    /// run. All failures come back as one `DiError::ScopeTeardown`.
    pub(crate) fn run_all_reverse(mut self) -> DiResult<()> {
        let mut failures = Vec::new();

        while let Some(Tracked { service, instance, teardown }) = self.tracked.pop() {
            let Some(teardown) = teardown else {
                continue;
            };
            trace!(service, "running teardown hook");

            let outcome = catch_unwind(AssertUnwindSafe(|| teardown(&instance)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            warn!(service, error = %message, "teardown hook failed");
            failures.push(TeardownError { service, message });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::ScopeTeardown(failures))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}
