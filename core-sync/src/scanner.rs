//! # Full Scanner
//!
//! Per-directory work for a full scan: page through the remote listing,
//! recurse into non-excluded subdirectories, drop files that are refused or
//! already catalogued, and turn each directory's videos plus their side-car
//! assets into [`FileRecord`]s.
//!
//! ## Side-car ownership
//!
//! Images, NFOs and subtitles only make sense next to a video in the same
//! directory:
//!
//! - no video: every side-car in the directory is discarded
//! - one video: it owns every side-car
//! - several videos: a side-car belongs to the video whose stem prefixes the
//!   side-car's stem, compared case-insensitively; the longest matching stem
//!   wins, and side-cars matching no video are dropped

use crate::cache::SyncCatalogCache;
use crate::classifier::{stem, EntryClass, FileClassifier};
use crate::job::{join_logical, BatchNo, PathTask, ScanJob, ScanStats};
use crate::path_queue::PathQueue;
use crate::pool::DirectoryProcessor;
use crate::retry::RetryPolicy;
use crate::{Result, SyncError};
use async_trait::async_trait;
use bridge_traits::{CatalogStore, FileKind, FileRecord, RemoteEntry, RemoteStorage};
use core_async::sync::CancellationToken;
use std::sync::Arc;
use tracing::{debug, trace};

/// Files kept from one directory listing, waiting for correlation.
#[derive(Debug, Default)]
struct DirectoryBuckets {
    videos: Vec<RemoteEntry>,
    sidecars: Vec<(RemoteEntry, FileKind)>,
}

/// Pick the video that owns a side-car, per the rules in the module docs.
pub fn sidecar_owner<'a>(videos: &'a [RemoteEntry], sidecar_name: &str) -> Option<&'a RemoteEntry> {
    if let [only] = videos {
        return Some(only);
    }

    let sidecar_stem = stem(sidecar_name).to_lowercase();
    videos
        .iter()
        .map(|video| (video, stem(&video.name).to_lowercase()))
        .filter(|(_, video_stem)| sidecar_stem.starts_with(video_stem.as_str()))
        .max_by_key(|(_, video_stem)| video_stem.len())
        .map(|(video, _)| video)
}

pub struct FullScanner {
    job: ScanJob,
    batch_no: BatchNo,
    provider: Arc<dyn RemoteStorage>,
    store: Arc<dyn CatalogStore>,
    classifier: FileClassifier,
    retry: RetryPolicy,
    page_size: usize,
    cache: SyncCatalogCache,
    stats: ScanStats,
}

impl FullScanner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job: ScanJob,
        batch_no: BatchNo,
        provider: Arc<dyn RemoteStorage>,
        store: Arc<dyn CatalogStore>,
        classifier: FileClassifier,
        retry: RetryPolicy,
        page_size: usize,
    ) -> Self {
        Self {
            job,
            batch_no,
            provider,
            store,
            classifier,
            retry,
            page_size: page_size.max(1),
            cache: SyncCatalogCache::new(),
            stats: ScanStats::default(),
        }
    }

    pub fn cache(&self) -> &SyncCatalogCache {
        &self.cache
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub fn batch_no(&self) -> &BatchNo {
        &self.batch_no
    }

    fn visit_directory(
        &self,
        parent: &PathTask,
        entry: &RemoteEntry,
        queue: &PathQueue,
    ) -> Result<()> {
        if self.cache.is_excluded(&entry.id) {
            return Ok(());
        }
        if self.classifier.is_excluded(&entry.name) {
            if self.cache.exclude(&entry.id) {
                self.stats.directory_excluded();
                debug!(dir_id = %entry.id, name = %entry.name, "directory excluded");
            }
            return Ok(());
        }

        let child_path = join_logical(&parent.path, &entry.name);
        if self.cache.mark_exists(&entry.id, &child_path)
            && !queue.enqueue(parent.child(child_path, entry.id.clone()))
        {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    async fn visit_file(
        &self,
        parent: &PathTask,
        entry: RemoteEntry,
        buckets: &mut DirectoryBuckets,
    ) -> Result<()> {
        self.stats.file_seen();

        if !self.classifier.is_allowed(&entry.name, entry.size) {
            self.stats.file_rejected();
            trace!(name = %entry.name, size = entry.size, "file refused");
            return Ok(());
        }

        let full_path = join_logical(&parent.path, &entry.name);
        let known = self
            .store
            .file_exists(&full_path, self.job.job_id)
            .await
            .map_err(|err| {
                if err.is_cancelled() {
                    SyncError::Cancelled
                } else {
                    SyncError::Catalog(err.to_string())
                }
            })?;
        if known {
            self.stats.file_known();
            return Ok(());
        }

        match self.classifier.classify_entry(&entry).file_kind() {
            Some(FileKind::Video) => buckets.videos.push(entry),
            Some(kind) if kind.is_meta() => buckets.sidecars.push((entry, kind)),
            _ => {}
        }
        Ok(())
    }

    fn finalize_directory(&self, dir: &PathTask, buckets: DirectoryBuckets) {
        if buckets.videos.is_empty() {
            if !buckets.sidecars.is_empty() {
                debug!(
                    path = %dir.path,
                    orphans = buckets.sidecars.len(),
                    "no video in directory, dropping side-cars"
                );
            }
            return;
        }

        let mut records = Vec::with_capacity(buckets.videos.len() + buckets.sidecars.len());
        for video in &buckets.videos {
            records.push(self.build_record(dir, video, FileKind::Video, None));
        }
        for (sidecar, kind) in &buckets.sidecars {
            match sidecar_owner(&buckets.videos, &sidecar.name) {
                Some(owner) => {
                    let owner_id = join_logical(&dir.path, &owner.name);
                    records.push(self.build_record(dir, sidecar, *kind, Some(owner_id)));
                }
                None => trace!(name = %sidecar.name, "side-car matches no video"),
            }
        }

        self.cache.insert_all(records);
    }

    fn build_record(
        &self,
        dir: &PathTask,
        entry: &RemoteEntry,
        kind: FileKind,
        owner_id: Option<String>,
    ) -> FileRecord {
        let full_path = join_logical(&dir.path, &entry.name);
        FileRecord {
            local_path: self.job.local_path_for(&full_path),
            id: full_path,
            remote_id: entry.id.clone(),
            pick_code: entry.pick_code.clone(),
            name: entry.name.clone(),
            size: entry.size,
            path: dir.path.clone(),
            kind,
            source: self.job.source,
            parent_id: dir.dir_id.clone(),
            modified_at: entry.modified_at,
            is_video: kind == FileKind::Video,
            is_meta: kind.is_meta(),
            processed: false,
            batch_no: self.batch_no.to_string(),
            job_id: self.job.job_id,
            owner_id,
        }
    }
}

#[async_trait]
impl DirectoryProcessor for FullScanner {
    async fn process(
        &self,
        task: &PathTask,
        queue: &PathQueue,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut buckets = DirectoryBuckets::default();
        let mut offset = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let page = self
                .retry
                .run(cancel, &task.dir_id, || {
                    self.provider
                        .list_children(cancel, &task.dir_id, offset, self.page_size)
                })
                .await?;
            let fetched = page.len();

            for entry in page {
                match self.classifier.classify_entry(&entry) {
                    EntryClass::Directory => self.visit_directory(task, &entry, queue)?,
                    _ => self.visit_file(task, entry, &mut buckets).await?,
                }
            }

            if fetched == 0 || fetched < self.page_size {
                break;
            }
            offset += fetched;
        }

        self.stats.directory_listed();
        self.finalize_directory(task, buckets);
        Ok(())
    }
}
