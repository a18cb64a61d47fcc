//! Synchronization primitives.
//!
//! Thin re-exports of `tokio::sync` plus the `tokio_util` cancellation token.
//! All primitives are `Send + Sync` and async-aware, so holding a guard across
//! an `.await` never blocks the executor thread.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{CancellationToken, Mutex};
//!
//! async fn example() {
//!     let mutex = Mutex::new(42);
//!     *mutex.lock().await += 1;
//!
//!     let parent = CancellationToken::new();
//!     let child = parent.child_token();
//!     parent.cancel();
//!     assert!(child.is_cancelled());
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore, SemaphorePermit,
};

pub use tokio::sync::futures::Notified;

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
