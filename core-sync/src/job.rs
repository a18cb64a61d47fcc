//! # Scan Job Model
//!
//! Value types shared by the full scanner and the directory preloader: the
//! job description handed in by the scheduler, the per-directory work item,
//! the batch correlation token and the run summary.

use crate::classifier::MediaRules;
use crate::{Result, SyncError};
use bridge_traits::SourceType;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Logical paths
// ============================================================================

/// Join two `/`-separated logical path fragments.
pub fn join_logical(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if base.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{name}")
    }
}

/// Path of `full` relative to `root`, without a leading separator.
///
/// Returns `None` when `full` is not inside `root`. Both sides are compared
/// without leading or trailing separators.
pub fn relative_logical<'a>(root: &str, full: &'a str) -> Option<&'a str> {
    let root = root.trim_matches('/');
    let full = full.trim_start_matches('/');
    if root.is_empty() {
        return Some(full.trim_end_matches('/'));
    }
    let rest = full.strip_prefix(root)?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix('/').map(|r| r.trim_end_matches('/'))
}

// ============================================================================
// Work items
// ============================================================================

/// One directory waiting for a listing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTask {
    /// Logical path of the directory
    pub path: String,
    /// Remote directory id
    pub dir_id: String,
    /// Levels below the scan root; the root itself is 0
    pub depth: usize,
}

impl PathTask {
    pub fn root(path: impl Into<String>, dir_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            dir_id: dir_id.into(),
            depth: 0,
        }
    }

    pub fn child(&self, path: impl Into<String>, dir_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            dir_id: dir_id.into(),
            depth: self.depth + 1,
        }
    }
}

/// Correlation token stamped on every record of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchNo(String);

impl BatchNo {
    /// Millisecond-resolution local timestamp, e.g. `20240315083005123`.
    pub fn now() -> Self {
        Self(Local::now().format("%Y%m%d%H%M%S%3f").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BatchNo {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for BatchNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Job description
// ============================================================================

/// A sync target as the engine needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJob {
    pub job_id: u32,
    pub source: SourceType,
    /// Logical path of the remote root being mirrored
    pub source_path: String,
    /// Remote id of that root
    pub source_path_id: String,
    /// Remote id of the organise destination, when the job moves files
    pub dest_path_id: Option<String>,
    /// Local directory placeholders are written under
    pub target_path: String,
    #[serde(default)]
    pub rules: MediaRules,
}

impl ScanJob {
    pub fn new(
        job_id: u32,
        source: SourceType,
        source_path: impl Into<String>,
        source_path_id: impl Into<String>,
        target_path: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            source,
            source_path: source_path.into(),
            source_path_id: source_path_id.into(),
            dest_path_id: None,
            target_path: target_path.into(),
            rules: MediaRules::default(),
        }
    }

    pub fn with_destination(mut self, dest_path_id: impl Into<String>) -> Self {
        self.dest_path_id = Some(dest_path_id.into());
        self
    }

    pub fn with_rules(mut self, rules: MediaRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_path_id.is_empty() {
            return Err(SyncError::InvalidJob(format!(
                "job {} has no source directory id",
                self.job_id
            )));
        }
        if self.target_path.is_empty() {
            return Err(SyncError::InvalidJob(format!(
                "job {} has no local target path",
                self.job_id
            )));
        }
        Ok(())
    }

    pub fn root_task(&self) -> PathTask {
        PathTask::root(self.source_path.clone(), self.source_path_id.clone())
    }

    /// Local placeholder location for a remote logical path.
    ///
    /// Paths outside the source root are placed under the target by their
    /// full logical path.
    pub fn local_path_for(&self, full_path: &str) -> String {
        let relative = relative_logical(&self.source_path, full_path)
            .unwrap_or_else(|| full_path.trim_start_matches('/'));
        join_logical(&self.target_path, relative)
    }
}

// ============================================================================
// Run summary
// ============================================================================

/// Counters updated concurrently by scan workers.
#[derive(Debug, Default)]
pub struct ScanStats {
    directories_listed: AtomicU64,
    directories_excluded: AtomicU64,
    files_seen: AtomicU64,
    files_known: AtomicU64,
    files_rejected: AtomicU64,
}

impl ScanStats {
    pub fn directory_listed(&self) {
        self.directories_listed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn directory_excluded(&self) {
        self.directories_excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_seen(&self) {
        self.files_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_known(&self) {
        self.files_known.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_rejected(&self) {
        self.files_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn directories_listed(&self) -> u64 {
        self.directories_listed.load(Ordering::Relaxed)
    }

    pub fn summary(&self, batch_no: BatchNo, records: usize, cancelled: bool) -> ScanSummary {
        ScanSummary {
            batch_no,
            directories_listed: self.directories_listed.load(Ordering::Relaxed),
            directories_excluded: self.directories_excluded.load(Ordering::Relaxed),
            files_seen: self.files_seen.load(Ordering::Relaxed),
            files_known: self.files_known.load(Ordering::Relaxed),
            files_rejected: self.files_rejected.load(Ordering::Relaxed),
            records: records as u64,
            cancelled,
        }
    }
}

/// What a finished (or cancelled) run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub batch_no: BatchNo,
    pub directories_listed: u64,
    pub directories_excluded: u64,
    pub files_seen: u64,
    /// Files skipped because the catalog already has them
    pub files_known: u64,
    /// Files refused by the allow/deny policy
    pub files_rejected: u64,
    /// Records handed to the catalog store
    pub records: u64,
    pub cancelled: bool,
}

impl ScanSummary {
    /// A run cancelled before its walk started.
    pub fn cancelled_before_walk(batch_no: BatchNo) -> Self {
        ScanStats::default().summary(batch_no, 0, true)
    }
}
