use super::{Executor, Job};

/// Runs every job immediately, on the thread that submits it.
///
/// Useful for tests and for resolvers that are cheap or already cached.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncExecutor;

impl SyncExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Executor for SyncExecutor {
    fn spawn(&self, job: Job) {
        job();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_inline() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        SyncExecutor::new().spawn(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
