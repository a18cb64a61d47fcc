//! Task spawning and worker-group abstractions.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task::{self, JoinSet};
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     assert_eq!(handle.await.ok(), Some(42));
//!
//!     let mut set = JoinSet::new();
//!     for i in 0..4 {
//!         set.spawn(async move { i * 2 });
//!     }
//!     let mut total = 0;
//!     while let Some(Ok(value)) = set.join_next().await {
//!         total += value;
//!     }
//!     assert_eq!(total, 12);
//! }
//! ```

pub use tokio::task::{yield_now, JoinError, JoinHandle, JoinSet};

/// Spawns a new asynchronous task on the ambient Tokio runtime.
///
/// The spawned task may run on a different thread. The returned handle can be
/// awaited for the task's output or dropped to detach the task.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}
