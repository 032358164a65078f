//! A bounded pool of workers consuming a task queue.
//!
//! Submission is non blocking; each worker pulls a task, waits for a rate limit
//! token when a limiter is configured, runs the task with the pool's cancellation
//! token and publishes the result. Shutdown cancels the token, closes the
//! submission channel, drains the workers and closes the result channel.

mod limiter;

pub use limiter::{CancelToken, RateLimiter};

use crate::{Error, ErrorKind, Value};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Why a submission was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    QueueFull,
    ShuttingDown,
}

/// The work unit: a closure run on a worker with the pool's cancellation token.
pub type Task = Box<dyn FnOnce(&CancelToken) -> Result<Value, Error> + Send + 'static>;

struct Job {
    task: Task,
    reply: Option<Sender<Result<Value, Error>>>,
}

#[derive(Default)]
struct Counters {
    queued: AtomicU64,
    processed: AtomicU64,
    errored: AtomicU64,
    depth: AtomicU64,
}

/// A point-in-time snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolMetrics {
    pub queued: u64,
    pub processed: u64,
    pub errored: u64,
    pub depth: u64,
    pub capacity: usize,
}

pub struct WorkerPool {
    name: String,
    tx: Option<Sender<Job>>,
    results_rx: Receiver<Result<Value, Error>>,
    workers: Vec<JoinHandle<()>>,
    cancel: CancelToken,
    counters: Arc<Counters>,
    queue_capacity: usize,
}

impl WorkerPool {
    pub fn new(name: &str, workers: usize, queue_size: usize, rate: Option<u32>) -> Self {
        let workers = workers.max(1);
        let queue_size = queue_size.max(1);
        let (tx, rx) = bounded::<Job>(queue_size);
        let (results_tx, results_rx) = unbounded();
        let cancel = CancelToken::new();
        let counters = Arc::new(Counters::default());
        let limiter = rate.map(|rate| Arc::new(RateLimiter::new(rate)));

        let handles = (0..workers)
            .map(|index| {
                let rx = rx.clone();
                let results_tx = results_tx.clone();
                let cancel = cancel.clone();
                let counters = counters.clone();
                let limiter = limiter.clone();
                let label = format!("{}-{}", name, index);
                std::thread::Builder::new()
                    .name(label)
                    .spawn(move || worker_loop(rx, results_tx, cancel, counters, limiter))
                    .expect("spawn pool worker")
            })
            .collect();

        Self {
            name: name.to_string(),
            tx: Some(tx),
            results_rx,
            workers: handles,
            cancel,
            counters,
            queue_capacity: queue_size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a task without blocking; its result is published on
    /// [results](Self::results).
    pub fn submit(&self, task: Task) -> Result<(), SubmitError> {
        let tx = self.tx.as_ref().ok_or(SubmitError::ShuttingDown)?;
        match tx.try_send(Job { task, reply: None }) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                self.counters.depth.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(SubmitError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(SubmitError::ShuttingDown),
        }
    }

    /// Queue a task and block until its result, or until the pool shuts down.
    pub fn submit_and_wait(&self, task: Task) -> Result<Value, Error> {
        let tx = self.tx.as_ref().ok_or_else(shutting_down)?;
        let (reply_tx, reply_rx) = bounded(1);
        tx.send(Job {
            task,
            reply: Some(reply_tx),
        })
        .map_err(|_| shutting_down())?;
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        self.counters.depth.fetch_add(1, Ordering::Relaxed);
        reply_rx.recv().unwrap_or_else(|_| Err(shutting_down()))
    }

    /// Results of fire-and-forget submissions, in completion order.
    pub fn results(&self) -> &Receiver<Result<Value, Error>> {
        &self.results_rx
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            queued: self.counters.queued.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
            errored: self.counters.errored.load(Ordering::Relaxed),
            depth: self.counters.depth.load(Ordering::Relaxed),
            capacity: self.queue_capacity,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Cancel outstanding work and wait for the workers to drain.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn shutting_down() -> Error {
    Error::new(
        ErrorKind::Operator,
        "worker pool is shutting down".to_string(),
    )
}

fn worker_loop(
    rx: Receiver<Job>,
    results_tx: Sender<Result<Value, Error>>,
    cancel: CancelToken,
    counters: Arc<Counters>,
    limiter: Option<Arc<RateLimiter>>,
) {
    while let Ok(job) = rx.recv() {
        counters.depth.fetch_sub(1, Ordering::Relaxed);

        let outcome = match &limiter {
            Some(limiter) => limiter.wait(&cancel).and_then(|_| (job.task)(&cancel)),
            None => (job.task)(&cancel),
        };

        match &outcome {
            Ok(_) => counters.processed.fetch_add(1, Ordering::Relaxed),
            Err(_) => counters.errored.fetch_add(1, Ordering::Relaxed),
        };

        // The receiver may already be gone during shutdown; the result is dropped.
        match job.reply {
            Some(reply) => {
                let _ = reply.send(outcome);
            }
            None => {
                let _ = results_tx.send(outcome);
            }
        }
    }
}
