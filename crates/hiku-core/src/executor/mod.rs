//! # Executors
//!
//! Backends that run the engine's units of work.
//!
//! The engine only ever hands an executor self-contained jobs; results come
//! back to the coordinating thread over a channel owned by the engine, so an
//! executor never needs to know what a job computes.
//!
//! - `SyncExecutor`: runs jobs immediately on the caller
//! - `ThreadPoolExecutor`: fixed pool of OS threads
//! - `TokioExecutor` (feature `tokio`): tokio blocking pool

mod sync;
mod threads;
#[cfg(feature = "tokio")]
mod tokio;

pub use sync::SyncExecutor;
pub use threads::ThreadPoolExecutor;
#[cfg(feature = "tokio")]
pub use self::tokio::TokioExecutor;

use std::sync::Arc;

/// A self-contained unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run jobs.
///
/// A job that is dropped without being run is reported to the engine as
/// `HikuError::ExecutorShutdown`.
pub trait Executor: Send + Sync {
    fn spawn(&self, job: Job);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn spawn(&self, job: Job) {
        (**self).spawn(job);
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn spawn(&self, job: Job) {
        (**self).spawn(job);
    }
}
