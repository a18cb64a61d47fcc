//! # Scan Worker Pool
//!
//! A fixed number of workers draining one [`PathQueue`]. Each worker loops
//! `dequeue → process → task_done` until the queue reports closed-and-empty.
//!
//! ## Failure model
//!
//! - A cancellation-class error from the processor ends that directory
//!   quietly; the run token is already cancelled, so the queue closes and
//!   every worker drains out.
//! - Any other error is fatal for the run: the failing worker cancels the
//!   run token (a child of the caller's token, so the caller is untouched),
//!   its siblings skip whatever is still buffered, and the first error is
//!   returned from [`ScanWorkerPool::run`].
//!
//! `task_done` is called for every dequeued task on every path, so the
//! pending counter can never be left non-zero by an early exit.

use crate::job::PathTask;
use crate::path_queue::PathQueue;
use crate::{Result, SyncError};
use async_trait::async_trait;
use core_async::sync::CancellationToken;
use core_async::task::JoinSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Per-directory unit of work run by the pool.
///
/// Implementations enqueue child directories on `queue` and must return
/// promptly with [`SyncError::Cancelled`] once `cancel` fires.
#[async_trait]
pub trait DirectoryProcessor: Send + Sync + 'static {
    async fn process(
        &self,
        task: &PathTask,
        queue: &PathQueue,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// How a pool run ended when no worker failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolExit {
    /// Every enqueued directory was processed
    Drained,
    /// The caller's token fired before the tree was exhausted
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanWorkerPool {
    workers: usize,
}

impl ScanWorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Walk the tree below `root` with `processor`.
    pub async fn run<P>(
        &self,
        root: PathTask,
        processor: Arc<P>,
        cancel: &CancellationToken,
    ) -> Result<PoolExit>
    where
        P: DirectoryProcessor,
    {
        let run_token = cancel.child_token();
        let queue = PathQueue::new(run_token.clone());
        let watcher = queue.watch_cancellation();

        if !queue.enqueue(root) {
            watcher.abort();
            return Ok(PoolExit::Cancelled);
        }

        let mut workers = JoinSet::new();
        for worker_id in 0..self.workers {
            workers.spawn(worker_loop(
                worker_id,
                Arc::clone(&queue),
                Arc::clone(&processor),
                run_token.clone(),
            ));
        }

        let mut first_error: Option<SyncError> = None;
        while let Some(joined) = workers.join_next().await {
            let outcome = joined.unwrap_or_else(|join_err| {
                error!(error = %join_err, "scan worker aborted");
                // A panicked worker never released its task; closing via the
                // token lets the others exit.
                run_token.cancel();
                Err(SyncError::Provider(format!("scan worker panicked: {join_err}")))
            });

            if let Err(err) = outcome {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        watcher.abort();

        match first_error {
            Some(err) => Err(err),
            None if cancel.is_cancelled() => Ok(PoolExit::Cancelled),
            None => Ok(PoolExit::Drained),
        }
    }
}

async fn worker_loop<P>(
    worker_id: usize,
    queue: Arc<PathQueue>,
    processor: Arc<P>,
    run_token: CancellationToken,
) -> Result<()>
where
    P: DirectoryProcessor,
{
    let mut processed = 0usize;

    while let Some(task) = queue.dequeue().await {
        let outcome = if run_token.is_cancelled() {
            Ok(())
        } else {
            processor.process(&task, &queue, &run_token).await
        };
        queue.task_done();

        match outcome {
            Ok(()) => processed += 1,
            Err(err) if err.is_cancelled() => {
                debug!(worker_id, dir_id = %task.dir_id, "directory abandoned on cancellation");
            }
            Err(err) => {
                warn!(worker_id, dir_id = %task.dir_id, path = %task.path, error = %err, "directory failed, stopping run");
                run_token.cancel();
                return Err(err);
            }
        }
    }

    debug!(worker_id, processed, "scan worker exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Walks a fixed id → children map.
    struct TreeWalker {
        children: HashMap<String, Vec<String>>,
        visited: Mutex<Vec<String>>,
        fail_on: Option<String>,
        cancel_on: Option<(String, CancellationToken)>,
    }

    impl TreeWalker {
        fn new(edges: &[(&str, &[&str])]) -> Self {
            Self {
                children: edges
                    .iter()
                    .map(|(id, kids)| {
                        (id.to_string(), kids.iter().map(|k| k.to_string()).collect())
                    })
                    .collect(),
                visited: Mutex::new(Vec::new()),
                fail_on: None,
                cancel_on: None,
            }
        }

        fn visited(&self) -> Vec<String> {
            let mut ids = self.visited.lock().unwrap().clone();
            ids.sort();
            ids
        }
    }

    #[async_trait]
    impl DirectoryProcessor for TreeWalker {
        async fn process(
            &self,
            task: &PathTask,
            queue: &PathQueue,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            self.visited.lock().unwrap().push(task.dir_id.clone());
            core_async::task::yield_now().await;

            if self.fail_on.as_deref() == Some(task.dir_id.as_str()) {
                return Err(SyncError::Provider("listing refused".to_string()));
            }
            if let Some((id, token)) = &self.cancel_on {
                if id == &task.dir_id {
                    token.cancel();
                    return Err(SyncError::Cancelled);
                }
            }

            for child in self.children.get(&task.dir_id).into_iter().flatten() {
                if !queue.enqueue(task.child(format!("{}/{child}", task.path), child.clone())) {
                    return Err(SyncError::Cancelled);
                }
            }
            Ok(())
        }
    }

    fn tree() -> TreeWalker {
        TreeWalker::new(&[
            ("root", &["a", "b", "c"]),
            ("a", &["a1", "a2"]),
            ("b", &["b1"]),
            ("a2", &["a21", "a22", "a23"]),
        ])
    }

    #[core_async::test]
    async fn test_every_directory_processed_once() {
        let walker = Arc::new(tree());
        let exit = ScanWorkerPool::new(4)
            .run(PathTask::root("", "root"), Arc::clone(&walker), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(exit, PoolExit::Drained);
        assert_eq!(
            walker.visited(),
            vec!["a", "a1", "a2", "a21", "a22", "a23", "b", "b1", "c", "root"]
        );
    }

    #[core_async::test]
    async fn test_single_worker_drains_tree() {
        let walker = Arc::new(tree());
        let exit = ScanWorkerPool::new(0)
            .run(PathTask::root("", "root"), Arc::clone(&walker), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(exit, PoolExit::Drained);
        assert_eq!(walker.visited().len(), 10);
    }

    #[core_async::test]
    async fn test_first_error_stops_run() {
        let mut walker = tree();
        walker.fail_on = Some("a".to_string());
        let walker = Arc::new(walker);
        let caller = CancellationToken::new();

        let err = ScanWorkerPool::new(2)
            .run(PathTask::root("", "root"), Arc::clone(&walker), &caller)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Provider(_)));
        // The run token is a child; the caller's token is untouched.
        assert!(!caller.is_cancelled());
        assert!(!walker.visited().contains(&"a21".to_string()));
    }

    #[core_async::test]
    async fn test_cancellation_mid_run_exits_cleanly() {
        let caller = CancellationToken::new();
        let mut walker = tree();
        walker.cancel_on = Some(("a".to_string(), caller.clone()));
        let walker = Arc::new(walker);

        let exit = ScanWorkerPool::new(3)
            .run(PathTask::root("", "root"), Arc::clone(&walker), &caller)
            .await
            .unwrap();

        assert_eq!(exit, PoolExit::Cancelled);
        assert!(!walker.visited().contains(&"a1".to_string()));
    }

    #[core_async::test]
    async fn test_already_cancelled_does_nothing() {
        let caller = CancellationToken::new();
        caller.cancel();
        let walker = Arc::new(tree());

        let exit = ScanWorkerPool::new(2)
            .run(PathTask::root("", "root"), Arc::clone(&walker), &caller)
            .await
            .unwrap();

        assert_eq!(exit, PoolExit::Cancelled);
        assert!(walker.visited().is_empty());
    }
}
