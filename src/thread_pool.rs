//! Fixed-size worker pool.
//!
//! One unbounded FIFO of boxed tasks feeding `N` OS threads. There is no
//! per-task cancellation and no result plumbing; tasks communicate through
//! whatever shared state they capture. Created once at startup and passed
//! around as an `Arc`.
//!
//! A panicking task aborts the process. Panics here mean a broken internal
//! invariant (corrupt index, malformed refs), and continuing with a dead
//! worker would deadlock every caller waiting on an in-flight counter.

use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Shared worker pool with FIFO scheduling.
pub struct ThreadPool {
    tx: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    num_threads: usize,
}

impl ThreadPool {
    /// Spawns `num_threads` workers.
    ///
    /// # Panics
    ///
    /// Panics if `num_threads` is zero or a worker thread cannot be spawned.
    #[must_use]
    pub fn new(num_threads: usize) -> Self {
        assert!(num_threads > 0, "thread pool needs at least one worker");
        let (tx, rx) = crossbeam_channel::unbounded::<Task>();
        let workers = (0..num_threads)
            .map(|i| {
                let rx: Receiver<Task> = rx.clone();
                std::thread::Builder::new()
                    .name(format!("pool-{i}"))
                    .spawn(move || {
                        while let Ok(task) = rx.recv() {
                            let guard = std::panic::AssertUnwindSafe(task);
                            if std::panic::catch_unwind(guard).is_err() {
                                eprintln!("fatal: worker task panicked");
                                std::process::abort();
                            }
                        }
                    })
                    .expect("failed to spawn pool worker")
            })
            .collect();
        Self {
            tx: Some(tx),
            workers,
            num_threads,
        }
    }

    /// Number of worker threads.
    #[inline]
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Enqueues a task. Tasks run in FIFO order across the worker set.
    pub fn schedule<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .as_ref()
            .expect("pool already shut down")
            .send(Box::new(f))
            .expect("pool workers gone");
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Closing the channel lets workers drain the queue and exit.
        drop(self.tx.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
