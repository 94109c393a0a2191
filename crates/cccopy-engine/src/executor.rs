//! Background classification worker pool

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cccopy_sync::{Classifier, StateCache};

use crate::scheduler::RefreshScheduler;
use crate::task::{RefreshUpdate, UpdateResult};

/// Default number of classification workers
pub const DEFAULT_WORKER_COUNT: usize = 2;

/// Fixed pool of workers consuming the refresh queue.
///
/// Each worker classifies a path, updates the state cache and posts a
/// [`RefreshUpdate`] onto the result queue. Workers never call consumer
/// code directly and never panic into it: failures travel as
/// [`UpdateResult::Failed`].
#[derive(Debug)]
pub struct RefreshExecutor {
    handles: Vec<JoinHandle<()>>,
}

impl RefreshExecutor {
    /// Spawn `worker_count` workers over the shared queue.
    pub fn spawn(
        scheduler: Arc<RefreshScheduler>,
        classifier: Classifier,
        state_cache: Arc<StateCache>,
        update_tx: mpsc::UnboundedSender<RefreshUpdate>,
        worker_count: usize,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let mut handles = Vec::with_capacity(worker_count);
        for worker in 0..worker_count {
            let scheduler = Arc::clone(&scheduler);
            let classifier = classifier.clone();
            let state_cache = Arc::clone(&state_cache);
            let update_tx = update_tx.clone();
            handles.push(tokio::spawn(async move {
                debug!(worker, "Classification worker started");
                while let Some(task) = scheduler.next_task().await {
                    let result = match classifier.state_of(&task.rel_path).await {
                        Ok(Some(state)) => {
                            state_cache.insert(task.project_id, &task.rel_path, state);
                            UpdateResult::State(state)
                        }
                        Ok(None) => {
                            state_cache.invalidate(task.project_id, &task.rel_path);
                            UpdateResult::Vacant
                        }
                        Err(e) => {
                            warn!(path = %task.rel_path, error = %e, "Classification failed");
                            UpdateResult::Failed(e.to_string())
                        }
                    };
                    // A generation bump between dequeue and completion makes
                    // this result stale; the consumer re-checks on apply.
                    if !scheduler.is_current(task.generation) {
                        debug!(path = %task.rel_path, "Dropping superseded result");
                        continue;
                    }
                    let update = RefreshUpdate {
                        generation: task.generation,
                        rel_path: task.rel_path,
                        result,
                    };
                    if update_tx.send(update).is_err() {
                        // Consumer is gone; keep draining so shutdown stays clean.
                        debug!(worker, "Result queue closed");
                    }
                }
                debug!(worker, "Classification worker stopped");
            }));
        }
        info!(worker_count, "Refresh executor started");
        Self { handles }
    }

    /// Number of workers in the pool.
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to drain out after a scheduler shutdown.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
