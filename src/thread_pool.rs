// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A fixed-size worker pool used to parallelize `executeLatestQuery`
//! (spec.md §4.12).

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A handle to a submitted job's eventual completion.
pub struct JoinFuture<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> JoinFuture<T> {
    /// Blocks until the submitted job has run and returns its result.
    ///
    /// Returns `None` if the worker panicked before producing a result.
    pub fn join(self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

/// Fixed-size pool of worker threads draining a shared FIFO job queue.
pub struct ThreadPool {
    workers: Vec<JoinHandle<()>>,
    sender: Option<Sender<Job>>,
}

impl ThreadPool {
    /// Spawns `size` worker threads.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "thread pool size must be at least 1");

        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|id| Self::spawn_worker(id, Arc::clone(&receiver)))
            .collect();

        Self {
            workers,
            sender: Some(sender),
        }
    }

    fn spawn_worker(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name(format!("vints-worker-{id}"))
            .spawn(move || loop {
                let job = {
                    let queue = receiver.lock().expect("worker queue mutex poisoned");
                    queue.recv()
                };
                match job {
                    Ok(job) => job(),
                    Err(_) => break,
                }
            })
            .expect("failed to spawn worker thread")
    }

    /// Submits `job`, returning a future for its result.
    ///
    /// # Panics
    /// Panics if called after [`ThreadPool::shutdown`].
    pub fn submit<F, T>(&self, job: F) -> JoinFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = mpsc::channel();
        let wrapped: Job = Box::new(move || {
            let _ = result_tx.send(job());
        });
        self.sender
            .as_ref()
            .expect("thread pool used after shutdown")
            .send(wrapped)
            .expect("worker threads have all exited");
        JoinFuture { receiver: result_rx }
    }

    /// Drains the queue and joins every worker. Idempotent: calling this
    /// more than once is a no-op after the first call.
    pub fn shutdown(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn submit_runs_job_and_returns_result() {
        let pool = ThreadPool::new(2);
        let future = pool.submit(|| 21 * 2);
        assert_eq!(future.join(), Some(42));
    }

    #[test]
    fn jobs_are_parallelized_across_workers() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let futures: Vec<_> = (0..100)
            .map(|_| {
                let counter = Arc::clone(&counter);
                pool.submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for f in futures {
            f.join();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut pool = ThreadPool::new(2);
        pool.shutdown();
        pool.shutdown();
    }
}
