use super::{Executor, Job};
use crate::HikuError;
use tokio::runtime::{Builder, Handle, Runtime};

/// Runs jobs on a tokio runtime's blocking pool.
///
/// Resolvers are plain blocking functions, so jobs go through
/// `spawn_blocking` rather than onto the async workers.
///
/// An owned runtime must not be dropped from inside an async context.
#[derive(Debug)]
pub struct TokioExecutor {
    handle: Handle,
    _runtime: Option<Runtime>,
}

impl TokioExecutor {
    /// Build and own a multi-threaded runtime.
    pub fn new(workers: usize) -> Result<Self, HikuError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .max_blocking_threads(workers.max(1))
            .thread_name("hiku-tokio")
            .build()
            .map_err(|e| HikuError::IoError(format!("Cannot build tokio runtime: {}", e)))?;
        Ok(Self {
            handle: runtime.handle().clone(),
            _runtime: Some(runtime),
        })
    }

    /// Use an existing runtime.
    #[must_use]
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            _runtime: None,
        }
    }

    /// Use the runtime the caller is running in.
    pub fn current() -> Result<Self, HikuError> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|e| HikuError::IoError(format!("No tokio runtime: {}", e)))
    }
}

impl Executor for TokioExecutor {
    fn spawn(&self, job: Job) {
        drop(self.handle.spawn_blocking(job));
    }
}
