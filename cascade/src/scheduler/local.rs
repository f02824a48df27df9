// In-process scheduler implementation
//
// A reference implementation of the `Scheduler` contract so job trees can
// run end to end inside one process: a tick loop pops due entries off a
// priority queue, dispatches each firing on its own task, and requeues
// repeating triggers until their schedule is exhausted.

use crate::dispatch::Dispatcher;
use crate::errors::SchedulerError;
use crate::models::{JobDetail, JobKey};
use crate::schedule::FireTimes;
use crate::scheduler::Scheduler;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the in-process scheduler
#[derive(Debug, Clone)]
pub struct LocalSchedulerConfig {
    /// How often the tick loop checks for due firings (in milliseconds)
    pub tick_interval_ms: u64,
    /// Maximum number of firings started per tick
    pub max_firings_per_tick: usize,
}

impl Default for LocalSchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            max_firings_per_tick: 64,
        }
    }
}

/// A pending firing on the queue
#[derive(Debug)]
struct Entry {
    detail: JobDetail,
    next_fire: DateTime<Utc>,
    firings: u32,
}

// Max-heap ordering: the entry that fires soonest is the greatest; on
// ties the higher schedule priority wins.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .next_fire
            .cmp(&self.next_fire)
            .then_with(|| self.detail.schedule.priority.cmp(&other.detail.schedule.priority))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.next_fire == other.next_fire
            && self.detail.schedule.priority == other.detail.schedule.priority
    }
}

impl Eq for Entry {}

struct Inner {
    config: LocalSchedulerConfig,
    dispatcher: Arc<Dispatcher>,
    queue: Mutex<BinaryHeap<Entry>>,
    // Keys with a firing currently in flight, for allow_concurrent = false
    running: Mutex<HashSet<JobKey>>,
    accepting: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

/// In-process scheduler; cheap to clone, all clones share one queue
#[derive(Clone)]
pub struct LocalScheduler {
    inner: Arc<Inner>,
}

impl LocalScheduler {
    pub fn new(config: LocalSchedulerConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        Self {
            inner: Arc::new(Inner {
                config,
                dispatcher,
                queue: Mutex::new(BinaryHeap::new()),
                running: Mutex::new(HashSet::new()),
                accepting: AtomicBool::new(true),
                shutdown_tx,
            }),
        }
    }

    pub fn with_defaults(dispatcher: Arc<Dispatcher>) -> Self {
        Self::new(LocalSchedulerConfig::default(), dispatcher)
    }

    /// Run the tick loop on a background task
    pub fn spawn(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run().await })
    }

    /// Run the tick loop until `shutdown` is called
    #[instrument(skip(self))]
    pub async fn run(&self) {
        info!(
            tick_interval_ms = self.inner.config.tick_interval_ms,
            "Starting local scheduler"
        );

        let mut tick = interval(Duration::from_millis(self.inner.config.tick_interval_ms));
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.fire_due_entries();
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping local scheduler");
                    break;
                }
            }
        }

        info!("Local scheduler stopped");
    }

    /// Stop accepting submissions and end the tick loop; in-flight
    /// firings run to completion on their own tasks
    pub fn shutdown(&self) {
        self.inner.accepting.store(false, AtomicOrdering::SeqCst);
        let _ = self.inner.shutdown_tx.send(());
    }

    fn is_accepting(&self) -> bool {
        self.inner.accepting.load(AtomicOrdering::SeqCst)
    }

    /// Number of entries waiting on the queue
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn fire_due_entries(&self) {
        let now = Utc::now();
        let due = self.pop_due(now);
        if due.is_empty() {
            return;
        }
        debug!(count = due.len(), "Firing due entries");

        for entry in due {
            let key = entry.detail.spec.key.clone();

            // A definition that forbids concurrency waits for its
            // previous firing to finish; the entry stays due and is
            // retried on the next tick.
            if !entry.detail.spec.allow_concurrent {
                let mut running = self
                    .inner
                    .running
                    .lock()
                    .unwrap_or_else(|e| e.into_inner());
                if running.contains(&key) {
                    debug!(job_key = %key, "Previous firing still running, deferring");
                    drop(running);
                    self.push(entry);
                    continue;
                }
                running.insert(key.clone());
            }

            let scheduler = self.clone();
            tokio::spawn(async move { scheduler.fire(entry).await });
        }
    }

    async fn fire(&self, entry: Entry) {
        let key = entry.detail.spec.key.clone();

        match self
            .inner
            .dispatcher
            .execute(&entry.detail, entry.next_fire, self)
            .await
        {
            Ok(children) => {
                debug!(job_key = %key, children, "Job firing completed");
            }
            Err(e) => {
                error!(job_key = %key, error = %e, "Job firing failed");
            }
        }

        if !entry.detail.spec.allow_concurrent {
            self.inner
                .running
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&key);
        }

        self.requeue(entry);
    }

    /// Put a repeating entry back on the queue with its next fire time
    fn requeue(&self, entry: Entry) {
        if !self.is_accepting() {
            return;
        }
        let firings = entry.firings + 1;
        match entry
            .detail
            .schedule
            .next_fire_time(Some(entry.next_fire), firings)
        {
            Ok(Some(next_fire)) => {
                self.push(Entry {
                    detail: entry.detail,
                    next_fire,
                    firings,
                });
            }
            Ok(None) => {
                debug!(job_key = %entry.detail.spec.key, "Schedule exhausted, retiring job");
            }
            Err(e) => {
                warn!(job_key = %entry.detail.spec.key, error = %e, "Failed to compute next fire time");
            }
        }
    }

    fn push(&self, entry: Entry) {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }

    fn pop_due(&self, now: DateTime<Utc>) -> Vec<Entry> {
        let mut queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
        let mut due = Vec::new();
        while due.len() < self.inner.config.max_firings_per_tick {
            match queue.peek() {
                Some(entry) if entry.next_fire <= now => {
                    due.push(queue.pop().expect("peeked entry exists"));
                }
                _ => break,
            }
        }
        due
    }
}

#[async_trait]
impl Scheduler for LocalScheduler {
    async fn schedule(&self, detail: JobDetail) -> Result<DateTime<Utc>, SchedulerError> {
        if !self.is_accepting() {
            return Err(SchedulerError::ShutDown);
        }

        let next_fire = detail
            .schedule
            .next_fire_time(None, 0)?
            .ok_or_else(|| SchedulerError::Rejected {
                key: detail.spec.key.clone(),
                reason: "schedule has no upcoming fire time".to_string(),
            })?;

        debug!(
            job_key = %detail.spec.key,
            trigger = detail.schedule.trigger.kind(),
            fire_time = %next_fire,
            "Job accepted"
        );
        self.push(Entry {
            detail,
            next_fire,
            firings: 0,
        });
        Ok(next_fire)
    }
}
