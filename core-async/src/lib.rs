//! Async runtime abstraction layer for the STRM sync core.
//!
//! Every core-* crate goes through this crate instead of depending on Tokio
//! directly. Keeping the executor behind one seam means the scan engine and
//! the task sequencer agree on a single cancellation type, a single clock, and
//! a single way of spawning detached work.
//!
//! # Modules
//!
//! - `task`: Task spawning and worker groups
//! - `time`: Sleep, timeouts, intervals and the monotonic clock
//! - `sync`: Synchronization primitives and cancellation tokens
//! - `runtime`: Blocking entry points used by the attribute macros
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.ok(), Some(42));
//! }
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use sync::CancellationToken;
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
