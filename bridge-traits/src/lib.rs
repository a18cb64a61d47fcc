//! # Host Bridge Traits
//!
//! Contracts between the sync core and everything it does not own: the
//! remote drives it mirrors, the catalog database, the job scheduler, and the
//! notification fan-out.
//!
//! ## Traits
//!
//! ### Scanning
//! - [`RemoteStorage`](remote::RemoteStorage) - Paginated listings, existence probes, breadcrumbs
//! - [`CatalogStore`](catalog::CatalogStore) - Known-file checks and batch upserts
//!
//! ### Orchestration
//! - [`JobScheduler`](scheduler::JobScheduler) - Submit jobs, poll status, list targets, refresh libraries
//! - [`NotificationSink`](notification::NotificationSink) - Deliver completion alerts
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required bridge is
//! missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! let scheduler = builder.scheduler
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "JobScheduler".to_string(),
//!         message: "No job scheduler provided.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! must map their own cancellation signal to `BridgeError::Cancelled` so the
//! engine can tell a shutdown from a transient failure.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; scan workers share one drive
//! handle across tasks.

pub mod catalog;
pub mod error;
pub mod notification;
pub mod remote;
pub mod scheduler;
pub mod time;

pub use error::BridgeError;

pub use catalog::{CatalogStore, FileKind, FileRecord, SourceType};
pub use notification::{Notification, NotificationKind, NotificationPriority, NotificationSink};
pub use remote::{BreadcrumbSegment, RemoteDirectory, RemoteEntry, RemoteStorage};
pub use scheduler::{JobScheduler, JobStatus, TargetInfo, TaskKind};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
