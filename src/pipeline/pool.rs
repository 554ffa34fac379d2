//! Bounded worker pool
//!
//! A fixed number of workers pull from a pre-filled task queue and push
//! results onto a result queue that is drained while they run. The join
//! barrier at the end reaps every worker; dropping the `run` future aborts
//! them all.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `handler` over every item.
    ///
    /// The output is indexed by item position. A slot is `None` only when
    /// the worker handling that item panicked.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, handler: F) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let (task_tx, task_rx) = mpsc::channel(total);
        for task in items.into_iter().enumerate() {
            if task_tx.try_send(task).is_err() {
                error!("Task queue rejected an item");
            }
        }
        drop(task_tx);

        let tasks = Arc::new(Mutex::new(task_rx));
        let (result_tx, mut result_rx) = mpsc::channel(total);
        let handler = Arc::new(handler);

        let worker_count = self.workers.min(total);
        let mut workers = JoinSet::new();
        for worker in 0..worker_count {
            let tasks = Arc::clone(&tasks);
            let results = result_tx.clone();
            let handler = Arc::clone(&handler);
            workers.spawn(async move {
                let mut handled = 0usize;
                loop {
                    let next = tasks.lock().await.recv().await;
                    let Some((index, item)) = next else {
                        break;
                    };
                    let output = handler(item).await;
                    handled += 1;
                    if results.send((index, output)).await.is_err() {
                        break;
                    }
                }
                debug!(worker, handled, "Worker drained queue");
            });
        }
        drop(result_tx);

        let mut outputs: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
        while let Some((index, output)) = result_rx.recv().await {
            if let Some(slot) = outputs.get_mut(index) {
                *slot = Some(output);
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "Worker terminated abnormally");
            }
        }

        outputs
    }
}
