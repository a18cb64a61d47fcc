//! Runtime utilities that abstract over the underlying async executor.
//!
//! Downstream crates (and the attribute macros) enter async code through these
//! functions so they never need to build a Tokio runtime themselves.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion using a lightweight runtime.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Runs the provided future on a runtime whose clock starts paused.
///
/// Timers auto-advance whenever every task is idle, so code that sleeps for
/// minutes of simulated time completes instantly and deterministically.
#[cfg(feature = "test-util")]
pub fn block_on_paused<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("core_async::runtime::block_on_paused: failed to build Tokio runtime")
        .block_on(future)
}
