//! Admission control for page fetches
//!
//! The controller owns the in-flight bound, the global cool-down and the
//! retry budget. A batch of work items is handed to [`AdmissionController::submit`]
//! and comes back, one completion per item, through an [`Admission`] stream.
//!
//! A fixed pool of workers pulls attempts from a shared queue. Each worker
//! waits for the cool-down gate to be open, takes a semaphore permit, runs a
//! single fetch and reports the completion over a bounded mpsc channel. A
//! transient failure trips the cool-down and puts the item back on the queue
//! until its retries are used up.
//!
//! The channel holds at most `max_in_flight` completions. When the consumer
//! falls behind, workers block on sending, so at most twice the bound of
//! fetched bodies are held in memory.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchCause, FetchOutcome, Fetcher};
use crate::frontier::WorkItem;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Limits applied by the admission controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Maximum number of fetches in flight at once
    pub max_in_flight: usize,
    /// Pause applied to new admissions after a transient failure
    pub cooldown: Duration,
    /// How many times a transiently failing item is put back on the queue
    pub max_retries: u32,
}

impl AdmissionPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_in_flight: config.max_concurrent_fetches.max(1) as usize,
            cooldown: Duration::from_secs(config.cooldown_secs),
            max_retries: config.max_retries,
        }
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Terminal failure of one work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Never retried
    Permanent(FetchCause),
    /// Every attempt failed transiently; holds the last cause
    RetriesExhausted(FetchCause),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent(cause) => write!(f, "permanent failure: {}", cause),
            Self::RetriesExhausted(cause) => write!(f, "retries exhausted, last: {}", cause),
        }
    }
}

/// Final result for one submitted work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Fetched {
        item: WorkItem,
        body: String,
        attempts: u32,
    },
    Failed {
        item: WorkItem,
        failure: FetchFailure,
        attempts: u32,
    },
}

impl Completion {
    pub fn item(&self) -> &WorkItem {
        match self {
            Self::Fetched { item, .. } | Self::Failed { item, .. } => item,
        }
    }
}

/// Point-in-time copy of the admission counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionSnapshot {
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub fetches: u64,
    pub retries: u64,
    pub cooldowns: u64,
}

#[derive(Debug, Default)]
struct AdmissionStats {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    fetches: AtomicU64,
    retries: AtomicU64,
    cooldowns: AtomicU64,
}

impl AdmissionStats {
    /// Counts a fetch as in flight until the returned guard is dropped
    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.fetches.fetch_add(1, Ordering::Relaxed);
        InFlight(self)
    }

    fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            in_flight: self.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
            fetches: self.fetches.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            cooldowns: self.cooldowns.load(Ordering::Relaxed),
        }
    }
}

struct InFlight<'a>(&'a AdmissionStats);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Global pause on new admissions
#[derive(Debug, Default)]
struct CooldownGate {
    until: Mutex<Option<Instant>>,
}

impl CooldownGate {
    /// Closes the gate for at least `duration` from now
    ///
    /// An already longer pause is left as it is.
    fn trip(&self, duration: Duration) {
        let target = Instant::now() + duration;
        let mut until = lock(&self.until);
        if until.map_or(true, |current| current < target) {
            *until = Some(target);
        }
    }

    fn reopens_at(&self) -> Option<Instant> {
        let until = *lock(&self.until);
        until.filter(|at| *at > Instant::now())
    }

    fn is_open(&self) -> bool {
        self.reopens_at().is_none()
    }

    async fn wait(&self) {
        while let Some(at) = self.reopens_at() {
            tokio::time::sleep_until(at).await;
        }
    }
}

#[derive(Debug)]
struct Attempt {
    item: WorkItem,
    retries: u32,
}

/// Shared queue of attempts for one submitted batch
///
/// `outstanding` counts items without a reported completion. A worker only
/// stops once the queue is empty and nothing is outstanding, because an
/// attempt in flight may still be put back.
#[derive(Debug)]
struct WorkQueue {
    attempts: Mutex<VecDeque<Attempt>>,
    outstanding: AtomicUsize,
    notify: Notify,
}

impl WorkQueue {
    fn new(batch: Vec<WorkItem>) -> Self {
        let attempts: VecDeque<Attempt> = batch
            .into_iter()
            .map(|item| Attempt { item, retries: 0 })
            .collect();
        Self {
            outstanding: AtomicUsize::new(attempts.len()),
            attempts: Mutex::new(attempts),
            notify: Notify::new(),
        }
    }

    async fn next(&self) -> Option<Attempt> {
        loop {
            // Register before checking so a requeue or finish in between is not lost
            let notified = self.notify.notified();
            if let Some(attempt) = lock(&self.attempts).pop_front() {
                return Some(attempt);
            }
            if self.outstanding.load(Ordering::SeqCst) == 0 {
                return None;
            }
            notified.await;
        }
    }

    fn requeue(&self, attempt: Attempt) {
        lock(&self.attempts).push_back(attempt);
        self.notify.notify_one();
    }

    fn finish(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}

#[derive(Debug)]
struct Shared<F> {
    fetcher: F,
    policy: AdmissionPolicy,
    slots: Semaphore,
    gate: CooldownGate,
    stats: AdmissionStats,
}

/// Bounds concurrent fetches and applies the retry and cool-down policy
///
/// The bound and the cool-down are shared by every batch submitted through
/// the same controller.
#[derive(Debug)]
pub struct AdmissionController<F> {
    shared: Arc<Shared<F>>,
}

impl<F> Clone for AdmissionController<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: Fetcher> AdmissionController<F> {
    pub fn new(fetcher: F, policy: AdmissionPolicy) -> Self {
        let policy = AdmissionPolicy {
            max_in_flight: policy.max_in_flight.max(1),
            ..policy
        };
        Self {
            shared: Arc::new(Shared {
                fetcher,
                slots: Semaphore::new(policy.max_in_flight),
                policy,
                gate: CooldownGate::default(),
                stats: AdmissionStats::default(),
            }),
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.shared.policy
    }

    pub fn stats(&self) -> AdmissionSnapshot {
        self.shared.stats.snapshot()
    }

    /// Schedules a batch and returns the stream of its completions
    ///
    /// Every item yields exactly one completion. Nothing is dropped when the
    /// controller is saturated; excess items wait on the queue.
    pub fn submit(&self, batch: Vec<WorkItem>) -> Admission {
        let total = batch.len();
        let workers = self.shared.policy.max_in_flight.min(total);
        let queue = Arc::new(WorkQueue::new(batch));
        let (tx, rx) = mpsc::channel(self.shared.policy.max_in_flight);

        tracing::debug!("Admitting {} items with {} workers", total, workers);

        let handles = (0..workers)
            .map(|_| {
                tokio::spawn(run_worker(
                    Arc::clone(&self.shared),
                    Arc::clone(&queue),
                    tx.clone(),
                ))
            })
            .collect();

        Admission {
            completions: rx,
            workers: handles,
            total,
        }
    }
}

async fn run_worker<F: Fetcher>(
    shared: Arc<Shared<F>>,
    queue: Arc<WorkQueue>,
    completions: mpsc::Sender<Completion>,
) {
    while let Some(mut attempt) = queue.next().await {
        let outcome = {
            let _permit = loop {
                shared.gate.wait().await;
                let Ok(permit) = shared.slots.acquire().await else {
                    return;
                };
                // The gate may have closed while this worker queued for a slot
                if shared.gate.is_open() {
                    break permit;
                }
                drop(permit);
            };

            let _in_flight = shared.stats.enter();
            shared.fetcher.fetch(attempt.item.as_str()).await
        };

        let attempts = attempt.retries + 1;
        let completion = match outcome {
            FetchOutcome::Success(body) => Completion::Fetched {
                item: attempt.item,
                body,
                attempts,
            },
            FetchOutcome::PermanentFailure(cause) => {
                tracing::debug!("Permanent failure for {}: {}", attempt.item, cause);
                Completion::Failed {
                    item: attempt.item,
                    failure: FetchFailure::Permanent(cause),
                    attempts,
                }
            }
            FetchOutcome::TransientFailure(cause) => {
                shared.gate.trip(shared.policy.cooldown);
                shared.stats.cooldowns.fetch_add(1, Ordering::Relaxed);

                if attempt.retries < shared.policy.max_retries {
                    tracing::warn!(
                        "Transient failure for {} ({}), pausing admissions for {:?} (retry {}/{})",
                        attempt.item,
                        cause,
                        shared.policy.cooldown,
                        attempts,
                        shared.policy.max_retries
                    );
                    attempt.retries += 1;
                    shared.stats.retries.fetch_add(1, Ordering::Relaxed);
                    queue.requeue(attempt);
                    continue;
                }

                tracing::warn!("Giving up on {} after {} attempts: {}", attempt.item, attempts, cause);
                Completion::Failed {
                    item: attempt.item,
                    failure: FetchFailure::RetriesExhausted(cause),
                    attempts,
                }
            }
        };

        queue.finish();
        if completions.send(completion).await.is_err() {
            return;
        }
    }
}

/// Completion stream of one submitted batch
///
/// Dropping it aborts the workers; fetches already running are cancelled.
#[derive(Debug)]
pub struct Admission {
    completions: mpsc::Receiver<Completion>,
    workers: Vec<JoinHandle<()>>,
    total: usize,
}

impl Admission {
    /// Waits for the next completion; `None` once every item has completed
    pub async fn next(&mut self) -> Option<Completion> {
        self.completions.recv().await
    }

    /// Number of items in the batch
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}
