//! The fixed-size worker pool backing [`super::BusMode::Async`].
//!
//! One `crossbeam_channel` per worker; a message is routed to the worker
//! whose index equals `hash(source) % worker_count`, so every message
//! published for a given `source` is always processed by the same
//! worker thread and therefore in submission order — see the module-level
//! docs on `super` for why that is enough to satisfy the bus's ordering
//! invariant without a single global dispatch thread.
use crossbeam_channel::{unbounded, Sender};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread::JoinHandle;

type Task = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    senders: Vec<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        let mut senders = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (tx, rx) = unbounded::<Task>();
            let handle = std::thread::spawn(move || {
                while let Ok(task) = rx.recv() {
                    task();
                }
            });
            senders.push(tx);
            workers.push(handle);
        }
        WorkerPool { senders, workers }
    }

    pub fn submit(&self, source: &str, task: impl FnOnce() + Send + 'static) {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.senders.len();
        // The only failure mode is every receiver having been dropped,
        // which only happens after `self` itself is being torn down.
        let _ = self.senders[idx].send(Box::new(task));
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.senders.clear();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
