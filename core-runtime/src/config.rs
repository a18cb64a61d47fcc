//! # Core Configuration Module
//!
//! Configuration for the sync core: scan tuning, orchestration timings, and
//! the host bridges the core cannot run without.
//!
//! ## Overview
//!
//! The builder collects settings and bridges, then `build()` fails fast when
//! a required bridge is absent or a setting is out of range. Settings structs
//! derive serde with field defaults, so a host can keep them in a JSON file
//! and only override what it cares about.
//!
//! ## Required Dependencies
//!
//! - `JobScheduler` - job submission, status polling, target listing
//! - `CatalogStore` - known-file checks and record upserts
//!
//! ## Optional Dependencies
//!
//! - `NotificationSink` - completion alerts (skipped silently when absent)
//! - `Clock` - notification timestamps (defaults to `SystemClock`)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, ScanSettings};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .scheduler(Arc::new(MyScheduler))
//!     .catalog_store(Arc::new(MyCatalog))
//!     .notifier(Arc::new(MyTelegramSink))
//!     .scan_settings(ScanSettings { worker_threads: 8, ..Default::default() })
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Fails: no scheduler or catalog store was injected
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{CatalogStore, Clock, JobScheduler, NotificationSink, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default event bus buffer size
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Retry policy for transient remote listing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per listing call, including the first
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles afterwards
    pub initial_backoff_ms: u64,
    /// Upper bound for a single backoff
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

/// Scan engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Workers draining the path queue during a full scan
    pub worker_threads: usize,
    /// Extra workers the preloader adds on top of `worker_threads`
    pub preload_extra_workers: usize,
    /// Entries requested per listing page
    pub page_size: usize,
    pub retry: RetrySettings,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            preload_extra_workers: 2,
            page_size: 1000,
            retry: RetrySettings::default(),
        }
    }
}

impl ScanSettings {
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::Config(
                "Scan worker count must be greater than 0".to_string(),
            ));
        }

        if self.page_size == 0 {
            return Err(Error::Config(
                "Listing page size must be greater than 0".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "Retry policy needs at least one attempt".to_string(),
            ));
        }

        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(Error::Config(format!(
                "Maximum backoff ({}ms) is below the initial backoff ({}ms)",
                self.retry.max_backoff_ms, self.retry.initial_backoff_ms
            )));
        }

        Ok(())
    }

    /// Worker count for the directory preloader.
    pub fn preload_workers(&self) -> usize {
        self.worker_threads + self.preload_extra_workers
    }
}

/// Delays the task sequencer inserts between dispatch, polling and effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskTimings {
    /// Pause after a single-stage dispatch before polling starts
    pub single_settle_secs: u64,
    /// Pause after each pipeline stage dispatch before polling starts
    pub stage_settle_secs: u64,
    /// Extra pause after the first pipeline stage completes
    pub first_stage_drain_secs: u64,
    pub poll_interval_secs: u64,
    /// Delay before the deferred library refresh fires
    pub refresh_delay_secs: u64,
}

impl Default for TaskTimings {
    fn default() -> Self {
        Self {
            single_settle_secs: 2,
            stage_settle_secs: 5,
            first_stage_drain_secs: 15,
            poll_interval_secs: 5,
            refresh_delay_secs: 30,
        }
    }
}

impl TaskTimings {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::Config(
                "Status poll interval must be greater than 0s".to_string(),
            ));
        }
        Ok(())
    }

    pub fn single_settle(&self) -> Duration {
        Duration::from_secs(self.single_settle_secs)
    }

    pub fn stage_settle(&self) -> Duration {
        Duration::from_secs(self.stage_settle_secs)
    }

    pub fn first_stage_drain(&self) -> Duration {
        Duration::from_secs(self.first_stage_drain_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_secs(self.refresh_delay_secs)
    }
}

/// Core configuration for the sync core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub scan: ScanSettings,
    pub timings: TaskTimings,
    /// Job scheduler (required)
    pub scheduler: Arc<dyn JobScheduler>,
    /// Catalog persistence (required)
    pub catalog_store: Arc<dyn CatalogStore>,
    /// Notification delivery (optional)
    pub notifier: Option<Arc<dyn NotificationSink>>,
    pub clock: Arc<dyn Clock>,
    pub event_capacity: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("scan", &self.scan)
            .field("timings", &self.timings)
            .field("scheduler", &"JobScheduler { ... }")
            .field("catalog_store", &"CatalogStore { ... }")
            .field(
                "notifier",
                &self.notifier.as_ref().map(|_| "NotificationSink { ... }"),
            )
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates settings ranges; bridges are checked by the builder.
    pub fn validate(&self) -> Result<()> {
        self.scan.validate()?;
        self.timings.validate()?;

        if self.event_capacity == 0 {
            return Err(Error::Config(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    scan: Option<ScanSettings>,
    timings: Option<TaskTimings>,
    scheduler: Option<Arc<dyn JobScheduler>>,
    catalog_store: Option<Arc<dyn CatalogStore>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    clock: Option<Arc<dyn Clock>>,
    event_capacity: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn scan_settings(mut self, settings: ScanSettings) -> Self {
        self.scan = Some(settings);
        self
    }

    pub fn task_timings(mut self, timings: TaskTimings) -> Self {
        self.timings = Some(timings);
        self
    }

    /// Sets the job scheduler implementation (required).
    pub fn scheduler(mut self, scheduler: Arc<dyn JobScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Sets the catalog store implementation (required).
    pub fn catalog_store(mut self, store: Arc<dyn CatalogStore>) -> Self {
        self.catalog_store = Some(store);
        self
    }

    /// Sets the notification sink (optional).
    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns [`Error::CapabilityMissing`] when the scheduler or catalog store
    /// was not provided, or [`Error::Config`] when a setting is out of range.
    pub fn build(self) -> Result<CoreConfig> {
        let scheduler = self.scheduler.ok_or_else(|| Error::CapabilityMissing {
            capability: "JobScheduler".to_string(),
            message: "A job scheduler is required to dispatch and poll sync/scrape jobs. \
                     Inject one with .scheduler()."
                .to_string(),
        })?;

        let catalog_store = self.catalog_store.ok_or_else(|| Error::CapabilityMissing {
            capability: "CatalogStore".to_string(),
            message: "A catalog store is required for known-file checks and record upserts. \
                     Inject one with .catalog_store()."
                .to_string(),
        })?;

        let config = CoreConfig {
            scan: self.scan.unwrap_or_default(),
            timings: self.timings.unwrap_or_default(),
            scheduler,
            catalog_store,
            notifier: self.notifier,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_capacity: self.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY),
        };

        config.validate()?;

        Ok(config)
    }
}
