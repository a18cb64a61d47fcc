//! # Directory Preloader
//!
//! Shallow, directory-only walk that warms the directory cache before an
//! incremental sync. It reuses the full scan's queue and worker pool but never
//! looks at files and never consults the catalog store: every child directory
//! becomes a `Dir` record and an entry in the exists-path cache.
//!
//! Directories at the depth bound are recorded but not listed.

use crate::cache::SyncCatalogCache;
use crate::classifier::FileClassifier;
use crate::job::{join_logical, BatchNo, PathTask, ScanJob};
use crate::path_queue::PathQueue;
use crate::pool::DirectoryProcessor;
use crate::retry::RetryPolicy;
use crate::{Result, SyncError};
use async_trait::async_trait;
use bridge_traits::{FileKind, FileRecord, RemoteDirectory, RemoteStorage};
use core_async::sync::CancellationToken;
use std::sync::Arc;
use tracing::debug;

pub struct DirectoryPreloader {
    job: ScanJob,
    batch_no: BatchNo,
    provider: Arc<dyn RemoteStorage>,
    classifier: FileClassifier,
    retry: RetryPolicy,
    max_depth: usize,
    cache: SyncCatalogCache,
}

impl DirectoryPreloader {
    pub fn new(
        job: ScanJob,
        batch_no: BatchNo,
        provider: Arc<dyn RemoteStorage>,
        classifier: FileClassifier,
        retry: RetryPolicy,
        max_depth: usize,
    ) -> Self {
        Self {
            job,
            batch_no,
            provider,
            classifier,
            retry,
            max_depth,
            cache: SyncCatalogCache::new(),
        }
    }

    pub fn cache(&self) -> &SyncCatalogCache {
        &self.cache
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn directory_record(
        &self,
        parent: &PathTask,
        dir: &RemoteDirectory,
        name: &str,
        path: &str,
    ) -> FileRecord {
        FileRecord {
            id: path.to_string(),
            remote_id: dir.id.clone(),
            pick_code: String::new(),
            name: name.to_string(),
            size: 0,
            path: parent.path.clone(),
            kind: FileKind::Dir,
            source: self.job.source,
            parent_id: parent.dir_id.clone(),
            modified_at: dir.modified_at,
            is_video: false,
            is_meta: false,
            processed: true,
            batch_no: self.batch_no.to_string(),
            job_id: self.job.job_id,
            owner_id: None,
            local_path: self.job.local_path_for(path),
        }
    }
}

#[async_trait]
impl DirectoryProcessor for DirectoryPreloader {
    async fn process(
        &self,
        task: &PathTask,
        queue: &PathQueue,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let children = self
            .retry
            .run(cancel, &task.dir_id, || {
                self.provider.dirs_by_path_id(cancel, &task.dir_id)
            })
            .await?;

        for dir in &children {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let name = dir
                .path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default();
            if self.cache.is_excluded(&dir.id) {
                continue;
            }
            if self.classifier.is_excluded(name) {
                self.cache.exclude(&dir.id);
                debug!(dir_id = %dir.id, name, "preload skipping excluded directory");
                continue;
            }

            let path = join_logical(&task.path, name);
            self.cache.insert(self.directory_record(task, dir, name, &path));

            let first_sighting = self.cache.mark_exists(&dir.id, &path);
            if first_sighting
                && task.depth + 1 < self.max_depth
                && !queue.enqueue(task.child(path, dir.id.clone()))
            {
                return Err(SyncError::Cancelled);
            }
        }

        Ok(())
    }
}
