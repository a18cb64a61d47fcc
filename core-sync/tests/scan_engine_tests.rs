//! End-to-end scan engine tests against an in-memory drive and catalog.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BreadcrumbSegment, BridgeError, CatalogStore, FileKind, FileRecord, RemoteDirectory,
    RemoteEntry, RemoteStorage, SourceType,
};
use core_async::sync::CancellationToken;
use core_runtime::config::{RetrySettings, ScanSettings};
use core_runtime::events::{CoreEvent, EventBus, ScanEvent};
use core_sync::{MediaRules, ScanJob, SyncEngine, SyncError};
use mockall::mock;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

// ============================================================================
// In-memory drive
// ============================================================================

#[derive(Default)]
struct FakeDrive {
    children: HashMap<String, Vec<RemoteEntry>>,
    paths: HashMap<String, String>,
    breadcrumbs: HashMap<String, Vec<BreadcrumbSegment>>,
    failures: Mutex<HashMap<String, u32>>,
    listings: Mutex<Vec<(String, usize)>>,
    dir_listings: Mutex<Vec<String>>,
    trip: Mutex<Option<(String, CancellationToken)>>,
}

impl FakeDrive {
    fn new(root_id: &str, root_path: &str) -> Self {
        let mut drive = Self::default();
        drive.paths.insert(root_id.to_string(), root_path.to_string());
        drive.children.insert(root_id.to_string(), Vec::new());
        drive
    }

    fn dir(mut self, parent: &str, id: &str, name: &str) -> Self {
        let path = format!("{}/{}", self.paths[parent], name);
        self.paths.insert(id.to_string(), path);
        self.children.insert(id.to_string(), Vec::new());
        self.children
            .get_mut(parent)
            .unwrap()
            .push(RemoteEntry::dir(id, name).with_modified_at(1_700_000_000));
        self
    }

    fn file(mut self, parent: &str, id: &str, name: &str, size: u64) -> Self {
        self.children
            .get_mut(parent)
            .unwrap()
            .push(RemoteEntry::file(id, name, size).with_modified_at(1_700_000_100));
        self
    }

    fn breadcrumb(mut self, handle: &str, names: &[&str]) -> Self {
        let segments = names
            .iter()
            .enumerate()
            .map(|(i, name)| BreadcrumbSegment::new(i.to_string(), *name))
            .collect();
        self.breadcrumbs.insert(handle.to_string(), segments);
        self
    }

    fn fail(self, dir_id: &str, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(dir_id.to_string(), times);
        self
    }

    /// Cancel `token` as soon as `dir_id` is listed.
    fn cancel_when_listing(self, dir_id: &str, token: CancellationToken) -> Self {
        *self.trip.lock().unwrap() = Some((dir_id.to_string(), token));
        self
    }

    /// Also list the existing directory `id` under `parent`.
    fn link(mut self, parent: &str, id: &str, name: &str) -> Self {
        self.children
            .get_mut(parent)
            .unwrap()
            .push(RemoteEntry::dir(id, name).with_modified_at(1_700_000_000));
        self
    }

    fn trip(&self, dir_id: &str) {
        if let Some((trip_id, token)) = self.trip.lock().unwrap().as_ref() {
            if trip_id == dir_id {
                token.cancel();
            }
        }
    }

    fn take_failure(&self, dir_id: &str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(dir_id) {
            Some(0) | None => false,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
        }
    }

    fn listed_offsets(&self, dir_id: &str) -> Vec<usize> {
        self.listings
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == dir_id)
            .map(|(_, offset)| *offset)
            .collect()
    }

    fn listed_dirs(&self) -> Vec<String> {
        self.listings
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteStorage for FakeDrive {
    async fn list_children(
        &self,
        cancel: &CancellationToken,
        dir_id: &str,
        offset: usize,
        limit: usize,
    ) -> BridgeResult<Vec<RemoteEntry>> {
        self.trip(dir_id);
        if cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        self.listings
            .lock()
            .unwrap()
            .push((dir_id.to_string(), offset));
        if self.take_failure(dir_id) {
            return Err(BridgeError::OperationFailed("HTTP 503".to_string()));
        }

        let entries = self
            .children
            .get(dir_id)
            .ok_or_else(|| BridgeError::NotFound(dir_id.to_string()))?;
        Ok(entries.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn path_exists(&self, cancel: &CancellationToken, id: &str) -> BridgeResult<bool> {
        if cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        Ok(self.paths.contains_key(id))
    }

    async fn file_detail_by_handle(
        &self,
        cancel: &CancellationToken,
        handle: &str,
    ) -> BridgeResult<Vec<BreadcrumbSegment>> {
        if cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        self.breadcrumbs
            .get(handle)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(handle.to_string()))
    }

    async fn dirs_by_path_id(
        &self,
        cancel: &CancellationToken,
        dir_id: &str,
    ) -> BridgeResult<Vec<RemoteDirectory>> {
        self.trip(dir_id);
        if cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        self.dir_listings.lock().unwrap().push(dir_id.to_string());
        if self.take_failure(dir_id) {
            return Err(BridgeError::OperationFailed("HTTP 429".to_string()));
        }

        Ok(self
            .children
            .get(dir_id)
            .into_iter()
            .flatten()
            .filter(|entry| entry.is_dir)
            .map(|entry| RemoteDirectory {
                id: entry.id.clone(),
                path: self.paths[&entry.id].clone(),
                modified_at: entry.modified_at,
            })
            .collect())
    }
}

// ============================================================================
// In-memory catalog
// ============================================================================

#[derive(Default)]
struct MemoryCatalog {
    known: HashSet<String>,
    batches: Mutex<Vec<(String, Vec<FileRecord>)>>,
}

impl MemoryCatalog {
    fn with_known(paths: &[&str]) -> Self {
        Self {
            known: paths.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    fn batches(&self) -> Vec<(String, Vec<FileRecord>)> {
        self.batches.lock().unwrap().clone()
    }

    fn records(&self) -> Vec<FileRecord> {
        self.batches()
            .into_iter()
            .flat_map(|(_, records)| records)
            .collect()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn file_exists(&self, full_path: &str, _job_id: u32) -> BridgeResult<bool> {
        Ok(self.known.contains(full_path))
    }

    async fn upsert_records(&self, batch_no: &str, records: Vec<FileRecord>) -> BridgeResult<()> {
        self.batches
            .lock()
            .unwrap()
            .push((batch_no.to_string(), records));
        Ok(())
    }
}

mock! {
    Catalog {}

    #[async_trait]
    impl CatalogStore for Catalog {
        async fn file_exists(&self, full_path: &str, job_id: u32) -> BridgeResult<bool>;
        async fn upsert_records(&self, batch_no: &str, records: Vec<FileRecord>) -> BridgeResult<()>;
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn settings(workers: usize, page_size: usize) -> ScanSettings {
    ScanSettings {
        worker_threads: workers,
        preload_extra_workers: 1,
        page_size,
        retry: RetrySettings {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 800,
        },
    }
}

async fn engine_with(
    drive: Arc<FakeDrive>,
    store: Arc<dyn CatalogStore>,
    settings: ScanSettings,
) -> (SyncEngine, EventBus) {
    let events = EventBus::new(64);
    let engine = SyncEngine::new(store, settings, events.clone());
    engine.register_provider(SourceType::Cloud115, drive).await;
    (engine, events)
}

fn movies_job() -> ScanJob {
    ScanJob::new(7, SourceType::Cloud115, "/Movies", "100", "/media/strm")
}

fn scan_events(rx: &mut core_async::sync::broadcast::Receiver<CoreEvent>) -> Vec<ScanEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Scan(scan) = event {
            events.push(scan);
        }
    }
    events
}

fn record<'a>(records: &'a [FileRecord], id: &str) -> &'a FileRecord {
    records
        .iter()
        .find(|r| r.id == id)
        .unwrap_or_else(|| panic!("no record {id} in {records:?}"))
}

// ============================================================================
// Full scan
// ============================================================================

#[core_async::test]
async fn test_video_with_sidecars_produces_linked_records() {
    let drive = Arc::new(
        FakeDrive::new("100", "/Movies")
            .dir("100", "101", "Heat (1995)")
            .file("101", "f1", "movie.mkv", 4_000_000_000)
            .file("101", "f2", "movie.nfo", 2_000)
            .file("101", "f3", "movie.jpg", 300_000)
            .file("101", "f4", "readme.txt", 10),
    );
    let store = Arc::new(MemoryCatalog::default());
    let (engine, events) = engine_with(drive, store.clone(), settings(2, 100)).await;
    let mut rx = events.subscribe();

    let summary = engine
        .full_scan(&movies_job(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!summary.cancelled);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.directories_listed, 2);
    assert_eq!(summary.files_seen, 4);
    assert_eq!(summary.files_rejected, 1);

    let batches = store.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0, summary.batch_no.as_str());

    let records = store.records();
    let video = record(&records, "/Movies/Heat (1995)/movie.mkv");
    assert_eq!(video.kind, FileKind::Video);
    assert!(video.is_video);
    assert!(!video.processed);
    assert_eq!(video.owner_id, None);
    assert_eq!(video.pick_code, "pc-f1");
    assert_eq!(video.parent_id, "101");
    assert_eq!(video.path, "/Movies/Heat (1995)");
    assert_eq!(video.local_path, "/media/strm/Heat (1995)/movie.mkv");
    assert_eq!(video.job_id, 7);
    assert_eq!(video.batch_no, summary.batch_no.as_str());

    for sidecar in ["movie.nfo", "movie.jpg"] {
        let rec = record(&records, &format!("/Movies/Heat (1995)/{sidecar}"));
        assert!(rec.is_meta);
        assert_eq!(rec.owner_id.as_deref(), Some(video.id.as_str()));
    }

    let events = scan_events(&mut rx);
    assert!(matches!(events.first(), Some(ScanEvent::Started { job_id: 7, .. })));
    assert!(matches!(
        events.last(),
        Some(ScanEvent::Completed { records: 3, .. })
    ));
}

#[core_async::test]
async fn test_sidecars_without_video_are_dropped() {
    let drive = Arc::new(
        FakeDrive::new("100", "/Movies")
            .dir("100", "101", "Unsorted")
            .file("101", "f1", "info.nfo", 100)
            .file("101", "f2", "poster.jpg", 100)
            .dir("100", "102", "Alien")
            .file("102", "f3", "Alien.mp4", 1_000),
    );
    let store = Arc::new(MemoryCatalog::default());
    let (engine, _events) = engine_with(drive, store.clone(), settings(3, 100)).await;

    let summary = engine
        .full_scan(&movies_job(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.records, 1);
    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "/Movies/Alien/Alien.mp4");
    assert!(records.iter().all(|r| !r.path.ends_with("Unsorted")));
}

#[core_async::test]
async fn test_each_directory_listed_once_in_page_order() {
    let mut drive = FakeDrive::new("100", "/Movies");
    for i in 0..5 {
        drive = drive
            .dir("100", &format!("d{i}"), &format!("Film {i}"))
            .file(&format!("d{i}"), &format!("v{i}"), &format!("Film {i}.mkv"), 10);
    }
    let drive = Arc::new(drive.dir("d0", "d0a", "Extras"));
    let store = Arc::new(MemoryCatalog::default());
    let (engine, _events) = engine_with(drive.clone(), store.clone(), settings(4, 2)).await;

    let summary = engine
        .full_scan(&movies_job(), &CancellationToken::new())
        .await
        .unwrap();

    // Five children at two per page: offsets 0, 2, 4.
    assert_eq!(drive.listed_offsets("100"), vec![0, 2, 4]);
    let mut first_pages: Vec<String> = drive
        .listings
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, offset)| *offset == 0)
        .map(|(id, _)| id.clone())
        .collect();
    first_pages.sort();
    let mut deduped = first_pages.clone();
    deduped.dedup();
    assert_eq!(first_pages, deduped);
    assert_eq!(first_pages.len(), 7);

    assert_eq!(summary.directories_listed, 7);
    assert_eq!(summary.records, 5);
}

#[core_async::test]
async fn test_excluded_directories_are_never_listed() {
    let drive = Arc::new(
        FakeDrive::new("100", "/Movies")
            .dir("100", "200", "@eaDir")
            .file("200", "t1", "thumb.mkv", 10)
            .dir("100", "201", ".recycle")
            .dir("100", "202", "Sample")
            .dir("100", "203", "Ran")
            .file("203", "v1", "Ran.mkv", 10),
    );
    let store = Arc::new(MemoryCatalog::default());
    let (engine, _events) = engine_with(drive.clone(), store.clone(), settings(2, 50)).await;

    let job = movies_job().with_rules(MediaRules {
        exclude_patterns: vec!["@eaDir".into(), ".*".into(), "sample".into()],
        ..MediaRules::default()
    });
    let summary = engine
        .full_scan(&job, &CancellationToken::new())
        .await
        .unwrap();

    let listed = drive.listed_dirs();
    for excluded in ["200", "201", "202"] {
        assert!(!listed.contains(&excluded.to_string()), "{excluded} was listed");
    }
    assert_eq!(summary.directories_excluded, 3);
    assert_eq!(store.records().len(), 1);
}

#[core_async::test]
async fn test_known_files_are_skipped() {
    let drive = Arc::new(
        FakeDrive::new("100", "/Movies")
            .file("100", "v1", "Old.mkv", 10)
            .file("100", "n1", "Old.nfo", 10)
            .file("100", "v2", "New.mkv", 10),
    );
    let store = Arc::new(MemoryCatalog::with_known(&["/Movies/Old.mkv", "/Movies/Old.nfo"]));
    let (engine, _events) = engine_with(drive, store.clone(), settings(1, 100)).await;

    let summary = engine
        .full_scan(&movies_job(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.files_known, 2);
    let ids: Vec<_> = store.records().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["/Movies/New.mkv".to_string()]);
}

#[core_async::test]
async fn test_fully_known_tree_flushes_nothing() {
    let drive = Arc::new(FakeDrive::new("100", "/Movies").file("100", "v1", "Old.mkv", 10));
    let mut store = MockCatalog::new();
    store
        .expect_file_exists()
        .withf(|path, job_id| path == "/Movies/Old.mkv" && *job_id == 7)
        .times(1)
        .returning(|_, _| Ok(true));
    store.expect_upsert_records().never();

    let (engine, _events) = engine_with(drive, Arc::new(store), settings(2, 100)).await;
    let summary = engine
        .full_scan(&movies_job(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.records, 0);
    assert_eq!(summary.files_known, 1);
}

#[core_async::test(paused)]
async fn test_transient_listing_errors_are_retried() {
    let drive = Arc::new(
        FakeDrive::new("100", "/Movies")
            .dir("100", "101", "Heat")
            .file("101", "v1", "Heat.mkv", 10)
            .fail("101", 2),
    );
    let store = Arc::new(MemoryCatalog::default());
    let (engine, _events) = engine_with(drive.clone(), store.clone(), settings(2, 100)).await;

    let summary = engine
        .full_scan(&movies_job(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(drive.listed_offsets("101"), vec![0, 0, 0]);
    assert_eq!(summary.records, 1);
}

#[core_async::test(paused)]
async fn test_retry_exhaustion_fails_whole_run() {
    let drive = Arc::new(
        FakeDrive::new("100", "/Movies")
            .dir("100", "101", "Heat")
            .file("101", "v1", "Heat.mkv", 10)
            .file("100", "v2", "Root.mkv", 10)
            .fail("101", 10),
    );
    let store = Arc::new(MemoryCatalog::default());
    let (engine, events) = engine_with(drive.clone(), store.clone(), settings(2, 100)).await;
    let mut rx = events.subscribe();

    let err = engine
        .full_scan(&movies_job(), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        SyncError::RetriesExhausted {
            dir_id, attempts, ..
        } => {
            assert_eq!(dir_id, "101");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert!(store.batches().is_empty());
    assert!(scan_events(&mut rx)
        .iter()
        .any(|e| matches!(e, ScanEvent::Failed { job_id: 7, .. })));
}

#[core_async::test]
async fn test_cancellation_mid_run_flushes_nothing() {
    let caller = CancellationToken::new();
    let drive = Arc::new(
        FakeDrive::new("100", "/Movies")
            .file("100", "v0", "Root.mkv", 10)
            .dir("100", "101", "A")
            .dir("101", "102", "B")
            .file("102", "v1", "Deep.mkv", 10)
            .cancel_when_listing("101", caller.clone()),
    );
    let store = Arc::new(MemoryCatalog::default());
    let (engine, events) = engine_with(drive.clone(), store.clone(), settings(2, 100)).await;
    let mut rx = events.subscribe();

    let summary = engine.full_scan(&movies_job(), &caller).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.records, 0);
    assert!(store.batches().is_empty());
    assert!(!drive.listed_dirs().contains(&"102".to_string()));
    assert!(scan_events(&mut rx)
        .iter()
        .any(|e| matches!(e, ScanEvent::Cancelled { job_id: 7, .. })));
}

#[core_async::test]
async fn test_cancel_before_walk_returns_cancelled_summary() {
    let drive = Arc::new(FakeDrive::new("100", "/Movies").file("100", "v1", "Heat.mkv", 10));
    let store = Arc::new(MemoryCatalog::default());
    let (engine, events) = engine_with(drive.clone(), store.clone(), settings(2, 100)).await;
    let mut rx = events.subscribe();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = engine.full_scan(&movies_job(), &cancel).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.directories_listed, 0);
    assert!(drive.listed_dirs().is_empty());
    assert!(store.batches().is_empty());

    let events = scan_events(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ScanEvent::Cancelled { job_id: 7, directories: 0 })));
    assert!(!events.iter().any(|e| matches!(e, ScanEvent::Failed { .. })));
}

#[core_async::test]
async fn test_missing_source_aborts_before_listing() {
    let drive = Arc::new(FakeDrive::new("100", "/Movies"));
    let store = Arc::new(MemoryCatalog::default());
    let (engine, _events) = engine_with(drive.clone(), store, settings(2, 100)).await;

    let job = ScanJob::new(7, SourceType::Cloud115, "/Gone", "999", "/media/strm");
    let err = engine
        .full_scan(&job, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::SourceMissing { ref id, .. } if id == "999"));
    assert!(drive.listed_dirs().is_empty());
}

#[core_async::test]
async fn test_missing_destination_aborts() {
    let drive = Arc::new(FakeDrive::new("100", "/Movies"));
    let store = Arc::new(MemoryCatalog::default());
    let (engine, _events) = engine_with(drive, store, settings(2, 100)).await;

    let job = movies_job().with_destination("555");
    let err = engine
        .full_scan(&job, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::DestinationMissing { ref id } if id == "555"));
}

#[core_async::test]
async fn test_unregistered_source_type() {
    let drive = Arc::new(FakeDrive::new("100", "/Movies"));
    let store = Arc::new(MemoryCatalog::default());
    let (engine, _events) = engine_with(drive, store, settings(2, 100)).await;

    let job = ScanJob::new(7, SourceType::BaiduPan, "/Movies", "100", "/media/strm");
    let err = engine
        .full_scan(&job, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ProviderNotRegistered(ref s) if s == "baidupan"));
    assert!(engine.has_provider(SourceType::Cloud115).await);
}

#[test]
fn test_job_loads_from_json_with_default_rules() {
    let job: ScanJob = serde_json::from_str(
        r#"{
            "job_id": 3,
            "source": "open_list",
            "source_path": "/Anime",
            "source_path_id": "42",
            "dest_path_id": null,
            "target_path": "/media/anime",
            "rules": { "min_video_size_mb": 100 }
        }"#,
    )
    .unwrap();

    assert_eq!(job.source, SourceType::OpenList);
    assert_eq!(job.rules.min_video_size_mb, 100);
    assert_eq!(job.rules.exclude_patterns, MediaRules::default().exclude_patterns);
}

// ============================================================================
// Preload
// ============================================================================

fn preload_drive() -> FakeDrive {
    FakeDrive::new("100", "/Movies")
        .dir("100", "101", "A")
        .dir("101", "102", "B")
        .dir("102", "103", "C")
        .dir("100", "104", "@eaDir")
        .file("101", "v1", "x.mkv", 10)
}

#[core_async::test]
async fn test_preload_walks_to_estimated_depth() {
    let drive = Arc::new(preload_drive().breadcrumb("pc-v1", &["root", "Movies", "A", "x.mkv"]));
    let store = Arc::new(MemoryCatalog::default());
    let (engine, events) = engine_with(drive.clone(), store.clone(), settings(2, 100)).await;
    let mut rx = events.subscribe();

    let summary = engine
        .preload(&movies_job(), "pc-v1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.depth, Some(2));
    assert_eq!(summary.directories, 2);
    assert!(!summary.cancelled);

    let records = store.records();
    let a = record(&records, "/Movies/A");
    assert_eq!(a.kind, FileKind::Dir);
    assert!(a.processed);
    assert_eq!(a.parent_id, "100");
    assert_eq!(a.path, "/Movies");
    assert_eq!(a.local_path, "/media/strm/A");
    let b = record(&records, "/Movies/A/B");
    assert_eq!(b.parent_id, "101");
    assert!(records.iter().all(|r| r.id != "/Movies/A/B/C"));

    // The bound directory is recorded but never listed.
    let listed = drive.dir_listings.lock().unwrap().clone();
    assert!(!listed.contains(&"102".to_string()));
    assert!(!listed.contains(&"104".to_string()));

    assert_eq!(summary.known_directories.get("102").map(String::as_str), Some("/Movies/A/B"));
    assert!(summary.known_directories.contains_key("100"));
    assert!(scan_events(&mut rx).iter().any(|e| matches!(
        e,
        ScanEvent::PreloadCompleted {
            depth: Some(2),
            directories: 2,
            ..
        }
    )));
}

#[core_async::test]
async fn test_preload_skipped_for_deep_reference() {
    let drive = Arc::new(
        preload_drive().breadcrumb("pc-deep", &["root", "Movies", "A", "B", "C", "x.mkv"]),
    );
    let store = Arc::new(MemoryCatalog::default());
    let (engine, _events) = engine_with(drive.clone(), store.clone(), settings(2, 100)).await;

    let summary = engine
        .preload(&movies_job(), "pc-deep", &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.was_skipped());
    assert!(store.batches().is_empty());
    assert!(drive.dir_listings.lock().unwrap().is_empty());
}

#[core_async::test]
async fn test_preload_skipped_for_reference_outside_root() {
    let drive = Arc::new(preload_drive().breadcrumb("pc-x", &["root", "Shows", "x.mkv"]));
    let store = Arc::new(MemoryCatalog::default());
    let (engine, _events) = engine_with(drive.clone(), store.clone(), settings(2, 100)).await;

    let summary = engine
        .preload(&movies_job(), "pc-x", &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.was_skipped());
    assert!(drive.dir_listings.lock().unwrap().is_empty());
}

#[core_async::test(paused)]
async fn test_preload_failure_aborts_run() {
    let drive = Arc::new(
        preload_drive()
            .breadcrumb("pc-v1", &["root", "Movies", "A", "x.mkv"])
            .fail("101", 10),
    );
    let store = Arc::new(MemoryCatalog::default());
    let (engine, _events) = engine_with(drive, store.clone(), settings(2, 100)).await;

    let err = engine
        .preload(&movies_job(), "pc-v1", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::RetriesExhausted { ref dir_id, .. } if dir_id == "101"));
    assert!(store.batches().is_empty());
}

#[core_async::test]
async fn test_preload_cancelled_mid_walk_flushes_nothing() {
    let cancel = CancellationToken::new();
    let drive = Arc::new(
        preload_drive()
            .breadcrumb("pc-v1", &["root", "Movies", "A", "x.mkv"])
            .cancel_when_listing("101", cancel.clone()),
    );
    let store = Arc::new(MemoryCatalog::default());
    let (engine, events) = engine_with(drive.clone(), store.clone(), settings(2, 100)).await;
    let mut rx = events.subscribe();

    let summary = engine
        .preload(&movies_job(), "pc-v1", &cancel)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert!(!summary.was_skipped());
    assert_eq!(summary.directories, 0);
    assert!(summary.known_directories.contains_key("101"));
    assert!(store.batches().is_empty());
    assert!(!drive.dir_listings.lock().unwrap().contains(&"101".to_string()));
    assert!(scan_events(&mut rx)
        .iter()
        .any(|e| matches!(e, ScanEvent::Cancelled { job_id: 7, .. })));
}

#[core_async::test]
async fn test_preload_cancelled_before_breadcrumb() {
    let drive = Arc::new(preload_drive().breadcrumb("pc-v1", &["root", "Movies", "A", "x.mkv"]));
    let store = Arc::new(MemoryCatalog::default());
    let (engine, _events) = engine_with(drive.clone(), store.clone(), settings(2, 100)).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = engine.preload(&movies_job(), "pc-v1", &cancel).await.unwrap();

    assert!(summary.cancelled);
    assert!(!summary.was_skipped());
    assert!(drive.dir_listings.lock().unwrap().is_empty());
    assert!(store.batches().is_empty());
}

#[core_async::test]
async fn test_preload_never_queries_existence_store() {
    let drive = Arc::new(preload_drive().breadcrumb("pc-v1", &["root", "Movies", "A", "x.mkv"]));
    let mut store = MockCatalog::new();
    store.expect_file_exists().never();
    store
        .expect_upsert_records()
        .withf(|_, records| records.iter().all(|r| r.kind == FileKind::Dir))
        .times(1)
        .returning(|_, _| Ok(()));

    let (engine, _events) = engine_with(drive, Arc::new(store), settings(2, 100)).await;
    let summary = engine
        .preload(&movies_job(), "pc-v1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.directories, 2);
}

#[core_async::test]
async fn test_preload_excluded_directory_seen_twice() {
    // "@eaDir" (104) sits under the root and is linked again under A.
    let drive = Arc::new(
        preload_drive()
            .link("101", "104", "@eaDir")
            .breadcrumb("pc-v1", &["root", "Movies", "A", "x.mkv"]),
    );
    let store = Arc::new(MemoryCatalog::default());
    let (engine, _events) = engine_with(drive.clone(), store.clone(), settings(2, 100)).await;

    let summary = engine
        .preload(&movies_job(), "pc-v1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.excluded_directories, 1);
    assert!(!summary.known_directories.contains_key("104"));
    assert!(store.records().iter().all(|r| r.remote_id != "104"));
    assert!(!drive.dir_listings.lock().unwrap().contains(&"104".to_string()));
    assert_eq!(summary.directories, 2);
}
