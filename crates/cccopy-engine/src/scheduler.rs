//! FIFO task queue with generation-based cancellation
//!
//! Starting a new refresh bumps the generation counter; queued tasks from
//! older generations are discarded when dequeued, and in-flight results
//! are dropped at apply time. Nothing is interrupted — superseded work
//! simply becomes invisible.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::debug;

use crate::task::RefreshTask;

/// FIFO refresh queue shared between the scheduler side and the workers
#[derive(Debug, Default)]
pub struct RefreshScheduler {
    queue: Mutex<VecDeque<RefreshTask>>,
    notify: Notify,
    generation: AtomicU64,
    shutdown: AtomicBool,
}

impl RefreshScheduler {
    /// Create an empty scheduler at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new refresh generation, superseding all queued work.
    pub fn begin_generation(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, "New refresh generation");
        generation
    }

    /// The latest generation.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether `generation` is still the latest.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.current_generation()
    }

    /// Queue a classification task.
    pub fn submit(&self, task: RefreshTask) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(task);
        }
        self.notify.notify_one();
    }

    /// Number of queued tasks (superseded ones included until dequeue).
    pub fn pending(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Dequeue the next live task, waiting for work.
    ///
    /// Tasks from superseded generations are silently discarded. Returns
    /// `None` once the scheduler has been shut down.
    pub async fn next_task(&self) -> Option<RefreshTask> {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return None;
            }
            let popped = self.queue.lock().ok().and_then(|mut q| q.pop_front());
            match popped {
                Some(task) if self.is_current(task.generation) => return Some(task),
                Some(task) => {
                    debug!(
                        path = %task.rel_path,
                        generation = task.generation,
                        "Discarding superseded task"
                    );
                }
                None => {
                    // Bounded wait: a shutdown signaled between the empty
                    // pop and this await must not strand the worker.
                    let _ = tokio::time::timeout(
                        std::time::Duration::from_millis(200),
                        self.notify.notified(),
                    )
                    .await;
                }
            }
        }
    }

    /// Stop the queue; workers drain out with `None`.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
