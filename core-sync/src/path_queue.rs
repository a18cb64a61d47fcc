//! # Path Queue
//!
//! Closeable, unbounded work queue of directories waiting for a listing pass.
//!
//! ## Accounting
//!
//! `pending` counts tasks that were enqueued but not yet marked done. Workers
//! call [`PathQueue::task_done`] exactly once per dequeued task, after any
//! children have been enqueued, so the counter can only reach zero once the
//! whole tree has been walked. Reaching zero closes the queue, which wakes
//! every blocked consumer and lets the workers exit.
//!
//! Cancellation closes the queue as well (see [`PathQueue::watch_cancellation`]).
//! Tasks still buffered at that point are handed out one last time so their
//! workers can release them without processing.

use crate::job::PathTask;
use core_async::sync::{CancellationToken, Notify};
use core_async::task::{self, JoinHandle};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<PathTask>,
    closed: bool,
}

#[derive(Debug)]
pub struct PathQueue {
    state: Mutex<QueueState>,
    available: Notify,
    pending: AtomicI64,
    cancel: CancellationToken,
}

impl PathQueue {
    pub fn new(cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
            pending: AtomicI64::new(0),
            cancel,
        })
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Critical sections never panic, so a poisoned lock still holds valid state.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a task. Returns `false` without blocking once the queue is closed
    /// or the run has been cancelled.
    pub fn enqueue(&self, task: PathTask) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            self.pending.fetch_add(1, Ordering::SeqCst);
            state.items.push_back(task);
        }

        self.available.notify_one();
        true
    }

    /// Wait for the next task. `None` means the queue is closed and drained,
    /// and the calling worker should exit.
    pub async fn dequeue(&self) -> Option<PathTask> {
        loop {
            let notified = self.available.notified();
            let mut notified = std::pin::pin!(notified);
            // Register before inspecting state so a close between the check
            // and the await still wakes us.
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(task) = state.items.pop_front() {
                    return Some(task);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Close the queue and wake every waiting consumer. Idempotent.
    pub fn close(&self) {
        let newly_closed = {
            let mut state = self.lock();
            !std::mem::replace(&mut state.closed, true)
        };

        if newly_closed {
            debug!(pending = self.pending(), "path queue closed");
        }
        self.available.notify_waiters();
    }

    /// Release one dequeued task; closes the queue when nothing is pending.
    pub fn task_done(&self) {
        let previous = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n > 0).then(|| n - 1));

        match previous {
            Ok(1) => self.close(),
            Ok(_) => {}
            Err(_) => warn!("task_done called with no pending tasks"),
        }
    }

    /// Close the queue as soon as the run's cancellation token fires.
    ///
    /// The returned handle should be aborted once the workers have exited.
    pub fn watch_cancellation(self: &Arc<Self>) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        task::spawn(async move {
            queue.cancel.cancelled().await;
            queue.close();
        })
    }

    pub fn pending(&self) -> i64 {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
