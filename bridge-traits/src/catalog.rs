//! Catalog Store Abstraction
//!
//! The persistent side of a scan: existence checks used for dedup, and the
//! batch upsert that receives a finished run's records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BridgeError, Result};

/// Kind of a catalogued remote item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Dir,
    Video,
    Image,
    Nfo,
    Subtitle,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Dir => "dir",
            FileKind::Video => "video",
            FileKind::Image => "image",
            FileKind::Nfo => "nfo",
            FileKind::Subtitle => "subtitle",
        }
    }

    /// Side-car kinds travel with a video and are flagged as metadata.
    pub fn is_meta(&self) -> bool {
        matches!(self, FileKind::Image | FileKind::Nfo | FileKind::Subtitle)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend a record was listed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Cloud115,
    BaiduPan,
    OpenList,
    Local,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Cloud115 => "115",
            SourceType::BaiduPan => "baidupan",
            SourceType::OpenList => "openlist",
            SourceType::Local => "local",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "115" => Ok(SourceType::Cloud115),
            "baidupan" => Ok(SourceType::BaiduPan),
            "openlist" => Ok(SourceType::OpenList),
            "local" => Ok(SourceType::Local),
            other => Err(BridgeError::NotFound(format!("source type '{other}'"))),
        }
    }
}

/// One classified remote item ready for persistence.
///
/// Records are immutable once built; a run collects them in memory and hands
/// them to [`CatalogStore::upsert_records`] in one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Full logical path, unique within a job
    pub id: String,
    /// Remote id of the item itself
    pub remote_id: String,
    pub pick_code: String,
    pub name: String,
    pub size: u64,
    /// Logical path of the containing directory
    pub path: String,
    pub kind: FileKind,
    pub source: SourceType,
    pub parent_id: String,
    pub modified_at: i64,
    pub is_video: bool,
    pub is_meta: bool,
    pub processed: bool,
    pub batch_no: String,
    pub job_id: u32,
    /// Id of the video a side-car belongs to
    pub owner_id: Option<String>,
    /// Placeholder location under the local target root
    pub local_path: String,
}

/// Catalog persistence trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::CatalogStore;
///
/// async fn is_new(store: &dyn CatalogStore, path: &str, job_id: u32) -> bool {
///     !store.file_exists(path, job_id).await.unwrap_or(false)
/// }
/// ```
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Whether a file with this full logical path is already catalogued for the job.
    async fn file_exists(&self, full_path: &str, job_id: u32) -> Result<bool>;

    /// Insert or update every record produced by one batch.
    async fn upsert_records(&self, batch_no: &str, records: Vec<FileRecord>) -> Result<()>;
}
