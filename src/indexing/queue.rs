//! Task queues running index jobs.
//!
//! Enqueueing is fire-and-forget: callers never learn whether a job
//! succeeded. Jobs for the same entity may run in any order; the last write
//! to the index wins.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::config::IndexingConfig;
use crate::error::{Result, ScopeSearchError};
use crate::indexing::indexer::Indexer;
use crate::indexing::job::IndexJob;

/// The task substrate index jobs are handed to.
pub trait TaskQueue: Send + Sync {
    /// Schedule a job and return immediately.
    fn enqueue(&self, job: IndexJob);
}

/// Run a job, retrying a failure up to `max_retries` times. Returns whether
/// it eventually succeeded.
fn run_with_retries(indexer: &Indexer, job: &IndexJob, max_retries: u8) -> bool {
    let attempts = u32::from(max_retries) + 1;
    for attempt in 1..=attempts {
        match indexer.apply(job) {
            Ok(()) => return true,
            Err(err) if attempt < attempts => {
                log::warn!("{job} failed (attempt {attempt}/{attempts}): {err}");
            }
            Err(err) => {
                log::error!("{job} given up after {attempts} attempts: {err}");
            }
        }
    }
    false
}

/// Runs each job on the calling thread.
#[derive(Debug, Clone)]
pub struct InlineTaskQueue {
    indexer: Arc<Indexer>,
    max_retries: u8,
}

impl InlineTaskQueue {
    pub fn new(indexer: Arc<Indexer>, max_retries: u8) -> Self {
        InlineTaskQueue {
            indexer,
            max_retries,
        }
    }
}

impl TaskQueue for InlineTaskQueue {
    fn enqueue(&self, job: IndexJob) {
        run_with_retries(&self.indexer, &job, self.max_retries);
    }
}

/// Counters of a [`ChannelTaskQueue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub completed: u64,
    pub failed: u64,
}

/// Jobs drained from a channel by a pool of worker threads.
pub struct ChannelTaskQueue {
    sender: Mutex<Option<Sender<IndexJob>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    completed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl std::fmt::Debug for ChannelTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelTaskQueue")
            .field("workers", &self.workers.lock().len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl ChannelTaskQueue {
    /// Start `config.workers` worker threads.
    pub fn start(indexer: Arc<Indexer>, config: &IndexingConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(ScopeSearchError::invalid_argument(
                "indexing.workers must be greater than zero",
            ));
        }

        let (sender, receiver) = unbounded();
        let completed = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            workers.push(Self::spawn_worker(
                worker_id,
                receiver.clone(),
                Arc::clone(&indexer),
                config.max_retries,
                Arc::clone(&completed),
                Arc::clone(&failed),
            )?);
        }
        log::debug!("started {} indexing workers", config.workers);

        Ok(ChannelTaskQueue {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            completed,
            failed,
        })
    }

    fn spawn_worker(
        worker_id: usize,
        receiver: Receiver<IndexJob>,
        indexer: Arc<Indexer>,
        max_retries: u8,
        completed: Arc<AtomicU64>,
        failed: Arc<AtomicU64>,
    ) -> Result<thread::JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name(format!("index-worker-{worker_id}"))
            .spawn(move || {
                // Ends once the sender is dropped and the channel is drained.
                for job in receiver.iter() {
                    if run_with_retries(&indexer, &job, max_retries) {
                        completed.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })?;
        Ok(handle)
    }

    /// Jobs processed so far.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting jobs, let the workers drain the queue and wait for them.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                log::error!("indexing worker panicked");
            }
        }
    }
}

impl TaskQueue for ChannelTaskQueue {
    fn enqueue(&self, job: IndexJob) {
        match self.sender.lock().as_ref() {
            Some(sender) => {
                if sender.send(job).is_err() {
                    log::error!("indexing workers are gone, job dropped");
                }
            }
            None => log::warn!("{job} dropped: queue is shut down"),
        }
    }
}

impl Drop for ChannelTaskQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Collects jobs without running them.
#[derive(Debug, Default)]
pub struct RecordingTaskQueue {
    jobs: Mutex<Vec<IndexJob>>,
}

impl RecordingTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs enqueued so far.
    pub fn jobs(&self) -> Vec<IndexJob> {
        self.jobs.lock().clone()
    }

    /// Remove and return the jobs enqueued so far.
    pub fn take(&self) -> Vec<IndexJob> {
        std::mem::take(&mut *self.jobs.lock())
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TaskQueue for RecordingTaskQueue {
    fn enqueue(&self, job: IndexJob) {
        self.jobs.lock().push(job);
    }
}
