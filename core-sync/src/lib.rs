//! # Remote Tree Scan Engine
//!
//! Mirrors a remote drive's directory tree into catalog records.
//!
//! ## Overview
//!
//! A scan walks the tree breadth-first through a paginated listing API with a
//! fixed pool of workers. Each directory is listed once, its subdirectories
//! are queued unless excluded, and its files are filtered, deduplicated
//! against the catalog store and grouped into videos with their side-car
//! assets. The preload variant walks directories only, a level or two deep,
//! to warm the directory cache ahead of incremental sync.
//!
//! ## Components
//!
//! - **Path Queue** (`path_queue`): Closeable work queue with pending-task accounting
//! - **Worker Pool** (`pool`): Fixed-size workers draining the queue, first error wins
//! - **Classifier** (`classifier`): Exclusion, allow/deny and file-kind rules
//! - **Catalog Cache** (`cache`): Per-run directory, exclusion and record caches
//! - **Depth Estimator** (`depth`): Preload depth from a reference breadcrumb
//! - **Retry** (`retry`): Bounded exponential backoff for listing calls
//! - **Full Scanner** (`scanner`) / **Preloader** (`preload`): Per-directory work
//! - **Sync Engine** (`engine`): Provider registry and run entry points

pub mod cache;
pub mod classifier;
pub mod depth;
pub mod engine;
pub mod error;
pub mod job;
pub mod path_queue;
pub mod pool;
pub mod preload;
pub mod retry;
pub mod scanner;

pub use cache::SyncCatalogCache;
pub use classifier::{EntryClass, FileClassifier, MediaRules};
pub use depth::{DepthEstimator, PRELOAD_DEPTH_RANGE};
pub use engine::{PreloadSummary, SyncEngine};
pub use error::{Result, SyncError};
pub use job::{BatchNo, PathTask, ScanJob, ScanStats, ScanSummary};
pub use path_queue::PathQueue;
pub use pool::{DirectoryProcessor, PoolExit, ScanWorkerPool};
pub use preload::DirectoryPreloader;
pub use retry::RetryPolicy;
pub use scanner::{sidecar_owner, FullScanner};
