//! In-process delayed job queue
//!
//! Background-enabled prompts are handed here instead of running inline.
//! Jobs are ordered by due time, then priority (lower first), then insertion
//! order. Nothing is persisted: jobs still queued at shutdown are lost.

use async_trait::async_trait;
use ffai_common::FormFields;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::FormRef;

/// Job type used for deferred prompt processing
pub const PROCESS_PROMPT_JOB: &str = "ffai_process_prompt";

pub type JobId = u64;

/// Data a job needs to re-run the processor
#[derive(Debug, Clone, PartialEq)]
pub struct JobPayload {
    pub fields: FormFields,
    pub form: FormRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJob {
    pub job_type: String,
    pub prompt_id: i64,
    pub form_id: i64,
    pub submission_id: i64,
    pub payload: JobPayload,
    pub delay: Duration,
    pub priority: i32,
}

/// Scheduled-job facility
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Queue `job`; None means it was not accepted and the caller should run
    /// the work itself
    async fn schedule(&self, job: ScheduledJob) -> Option<JobId>;
}

/// Executes jobs popped from the queue
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: ScheduledJob);
}

struct QueuedJob {
    due: Instant,
    priority: i32,
    seq: u64,
    id: JobId,
    job: ScheduledJob,
}

impl QueuedJob {
    fn key(&self) -> (Instant, i32, u64) {
        (self.due, self.priority, self.seq)
    }
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // Reversed: BinaryHeap is a max-heap, earliest key must pop first
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

struct QueueState {
    heap: BinaryHeap<QueuedJob>,
    next_seq: u64,
    shut_down: bool,
}

enum Next {
    Run(ScheduledJob),
    WaitUntil(Instant),
    WaitForWork,
}

pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                shut_down: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.heap.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stop accepting jobs and wake idle workers
    pub async fn shutdown(&self) {
        self.state.lock().await.shut_down = true;
        self.notify.notify_waiters();
    }

    async fn next(&self) -> Next {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        match state.heap.peek() {
            Some(top) if top.due <= now => match state.heap.pop() {
                Some(queued) => {
                    tracing::debug!(job_id = queued.id, "Job due");
                    Next::Run(queued.job)
                }
                None => Next::WaitForWork,
            },
            Some(top) => Next::WaitUntil(top.due),
            None => Next::WaitForWork,
        }
    }

    /// Spawn `count` workers feeding due jobs to `handler` until `cancel` fires
    pub fn spawn_workers(
        self: Arc<Self>,
        count: usize,
        handler: Arc<dyn JobHandler>,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        (0..count.max(1))
            .map(|worker| {
                let queue = self.clone();
                let handler = handler.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    queue.worker_loop(worker, handler, cancel).await;
                })
            })
            .collect()
    }

    async fn worker_loop(&self, worker: usize, handler: Arc<dyn JobHandler>, cancel: CancellationToken) {
        tracing::debug!(worker, "Job worker started");
        while !cancel.is_cancelled() {
            match self.next().await {
                Next::Run(job) => {
                    tracing::info!(
                        worker,
                        job_type = %job.job_type,
                        prompt_id = job.prompt_id,
                        submission_id = job.submission_id,
                        "Running scheduled job"
                    );
                    handler.run(job).await;
                }
                Next::WaitUntil(due) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep_until(due) => {}
                    }
                }
                Next::WaitForWork => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.notify.notified() => {}
                    }
                }
            }
        }
        tracing::debug!(worker, "Job worker stopped");
    }
}

#[async_trait]
impl JobScheduler for JobQueue {
    async fn schedule(&self, job: ScheduledJob) -> Option<JobId> {
        let mut state = self.state.lock().await;
        if state.shut_down {
            tracing::warn!(prompt_id = job.prompt_id, "Job queue shut down, job not accepted");
            return None;
        }
        if state.heap.len() >= self.capacity {
            tracing::warn!(prompt_id = job.prompt_id, capacity = self.capacity, "Job queue full, job not accepted");
            return None;
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let id = seq + 1;
        state.heap.push(QueuedJob {
            due: Instant::now() + job.delay,
            priority: job.priority,
            seq,
            id,
            job,
        });
        drop(state);

        self.notify.notify_one();
        Some(id)
    }
}
