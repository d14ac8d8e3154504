//! Fixed-size pool of named worker threads fed through a bounded queue.

use std::io;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Requests beyond this many per worker block the submitter.
const QUEUED_JOBS_PER_WORKER: usize = 4;

pub struct WorkerPool {
    job_tx: Option<SyncSender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` workers (at least one).
    pub fn new(size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let (job_tx, job_rx) = mpsc::sync_channel::<Job>(size * QUEUED_JOBS_PER_WORKER);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let job_rx = Arc::clone(&job_rx);
            let handle = thread::Builder::new()
                .name(format!("songvault-worker-{index}"))
                .spawn(move || run_worker(&job_rx))?;
            workers.push(handle);
        }
        debug!("WorkerPool: started {size} worker(s)");

        Ok(Self {
            job_tx: Some(job_tx),
            workers,
        })
    }

    /// Queues `job`, blocking while the queue is full.
    ///
    /// Returns `false` if every worker has already exited.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.job_tx {
            Some(job_tx) => job_tx.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Waits for queued jobs to finish and stops every worker.
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Workers exit once the queue is drained and the sender is gone.
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            if handle.join().is_err() {
                warn!("WorkerPool: worker '{name}' panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(job_rx: &Mutex<Receiver<Job>>) {
    loop {
        let next = job_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .recv();
        match next {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WorkerPool;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_pool_runs_every_job_before_join_returns() {
        let pool = WorkerPool::new(3).expect("pool should start");
        let completed = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let completed = Arc::clone(&completed);
            assert!(pool.execute(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            }));
        }

        pool.join();

        assert_eq!(completed.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_pool_workers_are_named() {
        let pool = WorkerPool::new(2).expect("pool should start");
        let names = Arc::new(Mutex::new(HashSet::new()));
        for _ in 0..8 {
            let names = Arc::clone(&names);
            pool.execute(move || {
                let name = std::thread::current().name().unwrap_or("").to_string();
                names.lock().expect("names lock").insert(name);
            });
        }

        pool.join();

        let names = names.lock().expect("names lock");
        assert!(!names.is_empty());
        assert!(names.iter().all(|name| name.starts_with("songvault-worker-")));
    }

    #[test]
    fn test_zero_size_pool_still_has_one_worker() {
        let pool = WorkerPool::new(0).expect("pool should start");
        let completed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completed);
        pool.execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        pool.join();

        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }
}
