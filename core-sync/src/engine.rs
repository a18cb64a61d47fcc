//! # Sync Engine
//!
//! Entry point for both scan variants. The engine owns the provider registry
//! and the long-lived collaborators; every call builds fresh per-run state
//! (queue, caches, counters), so concurrent runs for different jobs never
//! share anything mutable.
//!
//! ## Full scan
//!
//! 1. Validate the job and resolve the provider for its source type
//! 2. Confirm the source (and destination, if any) still exist remotely
//! 3. Walk the tree with [`FullScanner`] on a [`ScanWorkerPool`]
//! 4. Flush the collected records under the run's batch number
//!
//! ## Preload
//!
//! 1. Fetch the reference file's breadcrumb and estimate the depth
//! 2. Skip entirely when the depth is outside `1..=2`
//! 3. Walk directories only, down to that depth, and flush `Dir` records
//!
//! A cancelled run flushes nothing and returns a summary flagged `cancelled`,
//! wherever the cancellation lands; it is never reported as an error.

use crate::classifier::FileClassifier;
use crate::depth::DepthEstimator;
use crate::job::{BatchNo, ScanJob, ScanSummary};
use crate::pool::{PoolExit, ScanWorkerPool};
use crate::preload::DirectoryPreloader;
use crate::retry::RetryPolicy;
use crate::scanner::FullScanner;
use crate::{Result, SyncError};
use bridge_traits::{CatalogStore, FileRecord, RemoteStorage, SourceType};
use core_async::sync::{CancellationToken, RwLock};
use core_async::time::Instant;
use core_runtime::config::{CoreConfig, ScanSettings};
use core_runtime::events::{CoreEvent, EventBus, ScanEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of a directory preload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadSummary {
    /// Depth the walk was bounded to; `None` when the preload was skipped
    pub depth: Option<usize>,
    /// Directory records flushed to the catalog store
    pub directories: u64,
    pub cancelled: bool,
    /// Distinct directory ids skipped by an exclusion pattern
    pub excluded_directories: u64,
    /// Directory id → logical path for every directory seen, root included
    pub known_directories: HashMap<String, String>,
}

impl PreloadSummary {
    fn skipped() -> Self {
        Self::default()
    }

    /// Skipped for its depth; a run cancelled before the walk is not skipped.
    pub fn was_skipped(&self) -> bool {
        self.depth.is_none() && !self.cancelled
    }
}

pub struct SyncEngine {
    providers: RwLock<HashMap<SourceType, Arc<dyn RemoteStorage>>>,
    store: Arc<dyn CatalogStore>,
    settings: ScanSettings,
    events: EventBus,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn CatalogStore>, settings: ScanSettings, events: EventBus) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            store,
            settings,
            events,
        }
    }

    pub fn from_config(config: &CoreConfig, events: EventBus) -> Self {
        Self::new(config.catalog_store.clone(), config.scan, events)
    }

    /// Register the drive used for jobs of `source`, replacing any previous one.
    pub async fn register_provider(&self, source: SourceType, provider: Arc<dyn RemoteStorage>) {
        let mut providers = self.providers.write().await;
        providers.insert(source, provider);
        info!("Registered remote storage: {}", source);
    }

    pub async fn has_provider(&self, source: SourceType) -> bool {
        self.providers.read().await.contains_key(&source)
    }

    async fn provider_for(&self, source: SourceType) -> Result<Arc<dyn RemoteStorage>> {
        self.providers
            .read()
            .await
            .get(&source)
            .cloned()
            .ok_or_else(|| SyncError::ProviderNotRegistered(source.to_string()))
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.settings.retry.into()
    }

    fn emit(&self, event: ScanEvent) {
        self.events.emit(CoreEvent::Scan(event)).ok();
    }

    fn report_failure(&self, job_id: u32, err: &SyncError) {
        error!(job_id, error = %err, "scan failed");
        self.emit(ScanEvent::Failed {
            job_id,
            message: err.to_string(),
        });
    }

    /// Cancellation outside the walk (path checks, breadcrumb fetch, flush)
    /// ends the run the same way a cancelled walk does.
    fn report_early_cancel(&self, job_id: u32) {
        info!(job_id, "scan cancelled before completion");
        self.emit(ScanEvent::Cancelled {
            job_id,
            directories: 0,
        });
    }

    /// Walk the job's whole source tree and persist every new file record.
    #[instrument(skip(self, job, cancel), fields(job_id = job.job_id, source = %job.source))]
    pub async fn full_scan(&self, job: &ScanJob, cancel: &CancellationToken) -> Result<ScanSummary> {
        match self.run_full_scan(job, cancel).await {
            Err(err) if err.is_cancelled() => {
                self.report_early_cancel(job.job_id);
                Ok(ScanSummary::cancelled_before_walk(BatchNo::now()))
            }
            Err(err) => {
                self.report_failure(job.job_id, &err);
                Err(err)
            }
            ok => ok,
        }
    }

    async fn run_full_scan(&self, job: &ScanJob, cancel: &CancellationToken) -> Result<ScanSummary> {
        let started = Instant::now();
        job.validate()?;
        let provider = self.provider_for(job.source).await?;
        let classifier = FileClassifier::new(&job.rules)?;

        self.check_paths(job, provider.as_ref(), cancel).await?;

        let batch_no = BatchNo::now();
        info!(batch_no = %batch_no, source_path = %job.source_path, "full scan started");
        self.emit(ScanEvent::Started {
            job_id: job.job_id,
            batch_no: batch_no.to_string(),
            source_path: job.source_path.clone(),
        });

        let scanner = Arc::new(FullScanner::new(
            job.clone(),
            batch_no.clone(),
            provider,
            Arc::clone(&self.store),
            classifier,
            self.retry_policy(),
            self.settings.page_size,
        ));
        scanner
            .cache()
            .mark_exists(&job.source_path_id, &job.source_path);

        let pool = ScanWorkerPool::new(self.settings.worker_threads);
        let exit = pool
            .run(job.root_task(), Arc::clone(&scanner), cancel)
            .await?;

        if exit == PoolExit::Cancelled {
            let summary = scanner.stats().summary(batch_no, 0, true);
            info!(directories = summary.directories_listed, "full scan cancelled, nothing flushed");
            self.emit(ScanEvent::Cancelled {
                job_id: job.job_id,
                directories: summary.directories_listed,
            });
            return Ok(summary);
        }

        let records = scanner.cache().take_records();
        let record_count = records.len();
        self.flush(&batch_no, records).await?;

        let summary = scanner.stats().summary(batch_no, record_count, false);
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            directories = summary.directories_listed,
            excluded = summary.directories_excluded,
            files = summary.files_seen,
            known = summary.files_known,
            records = summary.records,
            duration_ms,
            "full scan completed"
        );
        self.emit(ScanEvent::Completed {
            job_id: job.job_id,
            batch_no: summary.batch_no.to_string(),
            directories: summary.directories_listed,
            records: summary.records,
            duration_ms,
        });

        Ok(summary)
    }

    async fn check_paths(
        &self,
        job: &ScanJob,
        provider: &dyn RemoteStorage,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !provider.path_exists(cancel, &job.source_path_id).await? {
            return Err(SyncError::SourceMissing {
                id: job.source_path_id.clone(),
                path: job.source_path.clone(),
            });
        }

        if let Some(dest_id) = &job.dest_path_id {
            if !provider.path_exists(cancel, dest_id).await? {
                return Err(SyncError::DestinationMissing {
                    id: dest_id.clone(),
                });
            }
        }

        Ok(())
    }

    async fn flush(&self, batch_no: &BatchNo, records: Vec<FileRecord>) -> Result<()> {
        if records.is_empty() {
            debug!(batch_no = %batch_no, "no new records to flush");
            return Ok(());
        }

        self.store
            .upsert_records(batch_no.as_str(), records)
            .await
            .map_err(|err| {
                if err.is_cancelled() {
                    SyncError::Cancelled
                } else {
                    SyncError::Catalog(err.to_string())
                }
            })
    }

    /// Shallow directory-only walk bounded by the reference file's depth.
    ///
    /// `reference_handle` is the content handle of any file known to live
    /// under the job's source root.
    #[instrument(skip(self, job, cancel), fields(job_id = job.job_id, source = %job.source))]
    pub async fn preload(
        &self,
        job: &ScanJob,
        reference_handle: &str,
        cancel: &CancellationToken,
    ) -> Result<PreloadSummary> {
        match self.run_preload(job, reference_handle, cancel).await {
            Err(err) if err.is_cancelled() => {
                self.report_early_cancel(job.job_id);
                Ok(PreloadSummary {
                    cancelled: true,
                    ..PreloadSummary::default()
                })
            }
            Err(err) => {
                self.report_failure(job.job_id, &err);
                Err(err)
            }
            ok => ok,
        }
    }

    async fn run_preload(
        &self,
        job: &ScanJob,
        reference_handle: &str,
        cancel: &CancellationToken,
    ) -> Result<PreloadSummary> {
        job.validate()?;
        let provider = self.provider_for(job.source).await?;
        let retry = self.retry_policy();

        let breadcrumb = retry
            .run(cancel, reference_handle, || {
                provider.file_detail_by_handle(cancel, reference_handle)
            })
            .await?;

        let estimator = DepthEstimator::new(job.source_path.clone());
        let Some(depth) = estimator.preload_depth(&breadcrumb) else {
            debug!(
                estimated = ?estimator.estimate(&breadcrumb),
                "reference depth outside preload range, skipping"
            );
            self.emit(ScanEvent::PreloadCompleted {
                job_id: job.job_id,
                depth: None,
                directories: 0,
            });
            return Ok(PreloadSummary::skipped());
        };

        let classifier = FileClassifier::new(&job.rules)?;
        let batch_no = BatchNo::now();
        let preloader = Arc::new(DirectoryPreloader::new(
            job.clone(),
            batch_no.clone(),
            provider,
            classifier,
            retry,
            depth,
        ));
        preloader
            .cache()
            .mark_exists(&job.source_path_id, &job.source_path);

        info!(depth, batch_no = %batch_no, "directory preload started");
        let pool = ScanWorkerPool::new(self.settings.preload_workers());
        let exit = pool
            .run(job.root_task(), Arc::clone(&preloader), cancel)
            .await?;

        let known_directories = preloader.cache().exists_snapshot();
        if exit == PoolExit::Cancelled {
            warn!(
                known = known_directories.len(),
                "directory preload cancelled, nothing flushed"
            );
            self.emit(ScanEvent::Cancelled {
                job_id: job.job_id,
                directories: known_directories.len() as u64,
            });
            return Ok(PreloadSummary {
                depth: Some(depth),
                directories: 0,
                cancelled: true,
                excluded_directories: preloader.cache().excluded_count() as u64,
                known_directories,
            });
        }

        let records = preloader.cache().take_records();
        let directories = records.len() as u64;
        self.flush(&batch_no, records).await?;

        info!(depth, directories, "directory preload completed");
        self.emit(ScanEvent::PreloadCompleted {
            job_id: job.job_id,
            depth: Some(depth),
            directories,
        });

        Ok(PreloadSummary {
            depth: Some(depth),
            directories,
            cancelled: false,
            excluded_directories: preloader.cache().excluded_count() as u64,
            known_directories,
        })
    }
}
