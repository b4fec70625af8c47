use super::{Executor, Job};
use crate::HikuError;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Fixed-size pool of OS worker threads fed from a shared job channel.
///
/// Dropping the pool closes the channel and joins every worker after the
/// already queued jobs have run.
#[derive(Debug)]
pub struct ThreadPoolExecutor {
    sender: Option<Mutex<Sender<Job>>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPoolExecutor {
    /// Start `size` workers (at least one).
    pub fn new(size: usize) -> Result<Self, HikuError> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size.max(1))
            .map(|i| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("hiku-worker-{}", i))
                    .spawn(move || worker_loop(&receiver))
                    .map_err(|e| HikuError::IoError(format!("Cannot spawn worker: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(workers = workers.len(), "thread pool started");
        Ok(Self {
            sender: Some(Mutex::new(sender)),
            workers,
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>) {
    loop {
        let next = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        match next {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}

impl Executor for ThreadPoolExecutor {
    fn spawn(&self, job: Job) {
        let Some(sender) = &self.sender else {
            return;
        };
        let sent = sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(job);
        if sent.is_err() {
            tracing::warn!("thread pool is shut down, dropping job");
        }
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::warn!("worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_all_jobs_before_drop_returns() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = ThreadPoolExecutor::new(3).expect("pool");
        assert_eq!(pool.size(), 3);

        for _ in 0..50 {
            let c = Arc::clone(&counter);
            pool.spawn(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn zero_size_still_has_a_worker() {
        let pool = ThreadPoolExecutor::new(0).expect("pool");
        assert_eq!(pool.size(), 1);
    }
}
