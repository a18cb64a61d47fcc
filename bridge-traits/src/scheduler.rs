//! Job Scheduling Abstraction
//!
//! The task sequencer never runs scans itself. It submits jobs to the host's
//! scheduler, observes their status, and asks the host for configured targets.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Kind of work a job performs against a target directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Mirror the remote tree into placeholders
    Sync,
    /// Scrape metadata for newly discovered media
    Scrape,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Sync => "sync",
            TaskKind::Scrape => "scrape",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a dispatched job as reported by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Waiting,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// A job is done once it has left the queue and the worker.
    pub fn is_done(&self) -> bool {
        !matches!(self, JobStatus::Waiting | JobStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// A configured sync or scrape directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub id: u32,
    /// Display path used in notifications
    pub path: String,
    /// Media type label passed to pending-file counts (e.g. "movie", "tvshow")
    pub media_type: String,
}

/// Job scheduler trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::scheduler::{JobScheduler, TaskKind};
///
/// async fn sync_everything(scheduler: &dyn JobScheduler) -> Result<()> {
///     for target in scheduler.list_targets(TaskKind::Sync).await? {
///         scheduler.submit_job(target.id, TaskKind::Sync).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait JobScheduler: Send + Sync {
    /// Every configured target for a task kind.
    async fn list_targets(&self, kind: TaskKind) -> Result<Vec<TargetInfo>>;

    /// One configured target, `None` when the id is unknown.
    async fn get_target(&self, kind: TaskKind, id: u32) -> Result<Option<TargetInfo>>;

    /// Flag a sync target so its next run ignores incremental state.
    async fn mark_full_resync(&self, id: u32) -> Result<()>;

    /// Queue a job; returns once the scheduler has accepted it.
    async fn submit_job(&self, id: u32, kind: TaskKind) -> Result<()>;

    async fn job_status(&self, id: u32, kind: TaskKind) -> Result<JobStatus>;

    /// Files discovered by earlier syncs that still await scraping.
    async fn count_pending_scrape_files(&self, id: u32, media_type: &str) -> Result<u64>;

    /// Ask the media server to rescan the library fed by a sync target.
    async fn refresh_library(&self, sync_target_id: u32) -> Result<()>;
}
